//! Camera state and view management.

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{Result, Vol3dError};

/// Near clipping plane, in box-normalized units.
pub const NEAR: f32 = 0.01;
/// Far clipping plane, in box-normalized units.
pub const FAR: f32 = 10.0;

/// Closest the camera may dolly toward its target.
const MIN_DISTANCE: f32 = 1e-3;

/// Smallest sine allowed between the up vector and the view direction.
const MIN_UP_SINE: f32 = 1e-4;

/// The five caller-configured camera inputs.
///
/// Changing any of them recreates the camera and discards interactive state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Camera position in box space.
    pub position: Vec3,
    /// Point the camera orbits around.
    pub target: Vec3,
    /// Up vector.
    pub up: Vec3,
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    /// Dolly speed for wheel and middle-button zoom.
    pub zoom_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, -2.0),
            target: Vec3::ZERO,
            up: Vec3::new(0.0, -1.0, 0.0),
            fov_degrees: 45.0,
            zoom_speed: 0.15,
        }
    }
}

impl CameraConfig {
    /// Checks that the configuration describes a usable camera.
    ///
    /// # Errors
    ///
    /// Returns [`Vol3dError::InvalidParameter`] if the position coincides with the
    /// target, the up vector is zero or parallel to the view direction, the field of view is outside (0, 180) degrees,
    /// or the zoom speed is negative.
    pub fn validate(&self) -> Result<()> {
        if !(self.position.is_finite() && self.target.is_finite()) {
            return Err(Vol3dError::invalid_parameter(
                "cameraPosition",
                self.position,
                "position and target must be finite",
            ));
        }
        if self.position.distance_squared(self.target) < MIN_DISTANCE * MIN_DISTANCE {
            return Err(Vol3dError::invalid_parameter(
                "cameraPosition",
                self.position,
                "position must differ from the target",
            ));
        }
        if !self.up.is_finite() || self.up.length_squared() == 0.0 {
            return Err(Vol3dError::invalid_parameter(
                "cameraUp",
                self.up,
                "up vector must be non-zero",
            ));
        }
        let forward = (self.target - self.position).normalize();
        if forward.cross(self.up.normalize()).length_squared() < MIN_UP_SINE * MIN_UP_SINE {
            return Err(Vol3dError::invalid_parameter(
                "cameraUp",
                self.up,
                "up vector must not be parallel to the view direction",
            ));
        }
        if !(self.fov_degrees > 0.0 && self.fov_degrees < 180.0) {
            return Err(Vol3dError::invalid_parameter(
                "cameraFovDegrees",
                self.fov_degrees,
                "expected a value in (0, 180)",
            ));
        }
        if !(self.zoom_speed.is_finite() && self.zoom_speed >= 0.0) {
            return Err(Vol3dError::invalid_parameter(
                "orbitZoomSpeed",
                self.zoom_speed,
                "expected a non-negative value",
            ));
        }
        Ok(())
    }
}

/// A perspective camera looking at the volume box.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Camera position in box space.
    pub position: Vec3,
    /// Point the camera is looking at.
    pub target: Vec3,
    /// Up vector.
    pub up: Vec3,
    /// Field of view in radians.
    pub fov: f32,
    /// Aspect ratio (width / height).
    pub aspect_ratio: f32,
    /// Near clipping plane.
    pub near: f32,
    /// Far clipping plane.
    pub far: f32,
    /// Dolly speed.
    pub zoom_speed: f32,
}

impl Camera {
    /// Creates a camera from its configuration.
    pub fn from_config(config: &CameraConfig, aspect_ratio: f32) -> Self {
        Self {
            position: config.position,
            target: config.target,
            up: config.up.normalize_or(Vec3::Y),
            fov: config.fov_degrees.to_radians(),
            aspect_ratio,
            near: NEAR,
            far: FAR,
            zoom_speed: config.zoom_speed,
        }
    }

    /// Sets the aspect ratio. Degenerate ratios from a zero-sized surface are ignored.
    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        if aspect_ratio.is_finite() && aspect_ratio > 0.0 {
            self.aspect_ratio = aspect_ratio;
        }
    }

    /// Returns the view matrix.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Returns the projection matrix, mapping depth to [0, 1].
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect_ratio, self.near, self.far)
    }

    /// Returns the combined view-projection matrix.
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Returns the camera's forward direction.
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or(Vec3::NEG_Z)
    }

    /// Returns the camera's right direction.
    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.up).normalize_or(Vec3::X)
    }

    /// Returns the up direction projected to be orthogonal to the view direction.
    pub fn screen_up(&self) -> Vec3 {
        self.right().cross(self.forward())
    }

    /// Returns the distance from the camera to its target.
    pub fn distance(&self) -> f32 {
        self.position.distance(self.target)
    }

    /// Returns the field of view in degrees.
    pub fn fov_degrees(&self) -> f32 {
        self.fov.to_degrees()
    }

    /// Orbits the camera around the target without clamping at the poles.
    ///
    /// `yaw` rotates about the up vector and `pitch` about the right vector, both in
    /// radians. The up vector is carried along with the pitch rotation, so dragging
    /// past the pole keeps rotating rather than stopping.
    pub fn orbit(&mut self, yaw: f32, pitch: f32) {
        let right = self.right();
        let rotation =
            Quat::from_axis_angle(self.up, -yaw) * Quat::from_axis_angle(right, -pitch);

        let offset = self.position - self.target;
        self.position = self.target + rotation * offset;
        self.up = (rotation * self.up).normalize_or(self.up);
    }

    /// Pans the camera and target together by a world-space offset along the
    /// screen axes.
    pub fn pan(&mut self, right: f32, up: f32) {
        let offset = self.right() * right + self.screen_up() * up;
        self.position += offset;
        self.target += offset;
    }

    /// Moves the camera along its view direction, scaling the target distance by
    /// `scale`. A scale below 1 moves closer.
    pub fn dolly(&mut self, scale: f32) {
        if !(scale.is_finite() && scale > 0.0) {
            return;
        }
        let direction = self.forward();
        let distance = (self.distance() * scale).max(MIN_DISTANCE);
        self.position = self.target - direction * distance;
    }

    /// Returns the world-space height of the view plane through the target.
    pub fn view_height_at_target(&self) -> f32 {
        2.0 * self.distance() * (self.fov * 0.5).tan()
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::from_config(&CameraConfig::default(), 1.0)
    }
}
