//! Camera interaction: orbit, pan, and dolly driven by pointer input.

use glam::{UVec2, Vec2, Vec3};

use crate::camera::{Camera, CameraConfig};
use crate::dispatcher::{Dispatcher, ListenerId};
use crate::error::Result;

/// Pointer buttons the controller distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// Modifier keys held when a drag starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub alt: bool,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl Modifiers {
    /// Returns whether these modifiers turn a primary drag into a pan.
    pub fn pans(self) -> bool {
        self.alt || self.ctrl || self.meta
    }
}

/// Which source currently owns the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraRegime {
    /// Position, target, up, fov, and zoom speed come straight from the caller.
    Configured,
    /// User input has moved the camera since it was last configured.
    Interactive,
}

/// Read-only view of the camera sent to listeners after every interactive change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraChange {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
}

impl CameraChange {
    fn of(camera: &Camera) -> Self {
        Self {
            position: camera.position,
            target: camera.target,
            up: camera.up,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DragMode {
    Orbit,
    Pan,
    Dolly,
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    mode: DragMode,
    last: Vec2,
}

/// Owns the camera and turns pointer input into camera motion.
#[derive(Debug)]
pub struct CameraController {
    config: CameraConfig,
    camera: Camera,
    regime: CameraRegime,
    viewport: UVec2,
    drag: Option<Drag>,
    rotate_speed: f32,
    changes: Dispatcher<CameraChange>,
}

impl CameraController {
    /// Creates a controller for a viewport of `viewport` physical pixels.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Vol3dError::InvalidParameter`] if `config` is unusable.
    pub fn new(config: CameraConfig, viewport: UVec2) -> Result<Self> {
        config.validate()?;
        let viewport = viewport.max(UVec2::ONE);
        Ok(Self {
            config,
            camera: Camera::from_config(&config, aspect(viewport)),
            regime: CameraRegime::Configured,
            viewport,
            drag: None,
            rotate_speed: 1.0,
            changes: Dispatcher::new(),
        })
    }

    /// Replaces the configured camera inputs.
    ///
    /// When any input differs from the current configuration the camera is recreated,
    /// interactive state is discarded, and the controller returns to
    /// [`CameraRegime::Configured`]. Returns whether the camera was recreated.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Vol3dError::InvalidParameter`] and keeps the current camera if
    /// `config` is unusable.
    pub fn configure(&mut self, config: CameraConfig) -> Result<bool> {
        if config == self.config {
            return Ok(false);
        }
        config.validate()?;

        log::info!(
            "Camera configured: position {}, target {}, up {}, fov {}",
            config.position,
            config.target,
            config.up,
            config.fov_degrees
        );
        self.config = config;
        self.camera = Camera::from_config(&config, aspect(self.viewport));
        self.regime = CameraRegime::Configured;
        self.drag = None;
        Ok(true)
    }

    /// Updates the projection for a resized render surface.
    ///
    /// The regime is unchanged.
    pub fn set_aspect_ratio(&mut self, viewport: UVec2) {
        self.viewport = viewport.max(UVec2::ONE);
        self.camera.set_aspect_ratio(aspect(self.viewport));
    }

    /// Starts a drag at `position` (physical pixels).
    pub fn pointer_down(&mut self, button: PointerButton, modifiers: Modifiers, position: Vec2) {
        let mode = match button {
            PointerButton::Primary if modifiers.pans() => DragMode::Pan,
            PointerButton::Primary => DragMode::Orbit,
            PointerButton::Secondary => DragMode::Pan,
            PointerButton::Middle => DragMode::Dolly,
        };
        self.drag = Some(Drag {
            mode,
            last: position,
        });
    }

    /// Continues the active drag, if any.
    ///
    /// Each call that moves the camera is one discrete step and emits exactly one
    /// change notification, which is also returned.
    pub fn pointer_move(&mut self, position: Vec2) -> Option<CameraChange> {
        let drag = self.drag.as_mut()?;
        let delta = position - drag.last;
        drag.last = position;
        if delta == Vec2::ZERO {
            return None;
        }
        let mode = drag.mode;

        let height = self.viewport.y as f32;
        match mode {
            DragMode::Orbit => {
                let scale = std::f32::consts::TAU / height * self.rotate_speed;
                self.camera.orbit(delta.x * scale, delta.y * scale);
            }
            DragMode::Pan => {
                let per_pixel = self.camera.view_height_at_target() / height;
                self.camera.pan(-delta.x * per_pixel, delta.y * per_pixel);
            }
            DragMode::Dolly => {
                let step = self.zoom_scale();
                self.camera.dolly(if delta.y > 0.0 { 1.0 / step } else { step });
            }
        }
        Some(self.emit())
    }

    /// Ends the active drag. Returns whether a drag was active.
    pub fn pointer_up(&mut self) -> bool {
        self.drag.take().is_some()
    }

    /// Dollies in response to a wheel event. Positive `delta` zooms in.
    pub fn wheel(&mut self, delta: f32) -> Option<CameraChange> {
        if delta == 0.0 || !delta.is_finite() {
            return None;
        }
        let step = self.zoom_scale();
        self.camera.dolly(if delta > 0.0 { step } else { 1.0 / step });
        Some(self.emit())
    }

    /// Registers a camera-change listener.
    pub fn add_listener(&self, listener: impl Fn(&CameraChange) + 'static) -> ListenerId {
        self.changes.add(listener)
    }

    /// Unregisters a camera-change listener.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.changes.remove(id)
    }

    /// Returns the camera-change dispatcher.
    pub fn changes(&self) -> &Dispatcher<CameraChange> {
        &self.changes
    }

    /// Returns the live camera.
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Returns the last configuration applied.
    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Returns the current regime.
    pub fn regime(&self) -> CameraRegime {
        self.regime
    }

    /// Returns whether a drag is active.
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    fn zoom_scale(&self) -> f32 {
        0.95f32.powf(self.camera.zoom_speed)
    }

    fn emit(&mut self) -> CameraChange {
        self.regime = CameraRegime::Interactive;
        let change = CameraChange::of(&self.camera);
        self.changes.notify(&change);
        change
    }
}

fn aspect(viewport: UVec2) -> f32 {
    viewport.x as f32 / viewport.y as f32
}
