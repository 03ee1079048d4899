//! Viewer configuration.

use std::time::Duration;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::camera::CameraConfig;
use crate::color::validate_rgb;
use crate::error::Result;
use crate::params::RenderParams;
use crate::transfer_function::TransferParams;

/// Initial settings for a viewer.
///
/// Every field has a default, so a JSON document only needs the fields it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerOptions {
    /// Window title.
    pub title: String,

    /// Initial window width in logical pixels.
    pub width: u32,

    /// Initial window height in logical pixels.
    pub height: u32,

    /// Ray-marching parameters.
    pub render: RenderParams,

    /// Transfer function controls.
    pub transfer: TransferParams,

    /// Camera position, target, up, fov, and zoom speed.
    pub camera: CameraConfig,

    /// Surface color, serialized as `#rrggbb`.
    #[serde(with = "crate::color::hex")]
    pub surface_color: Vec3,

    /// Whether an attached surface starts visible.
    pub use_surface: bool,

    /// Delay after the last resize event before resizing, in milliseconds.
    pub resize_debounce_ms: u64,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            title: "vol3d".to_string(),
            width: 1280,
            height: 720,
            render: RenderParams::default(),
            transfer: TransferParams::default(),
            camera: CameraConfig::default(),
            surface_color: Vec3::new(0.0, 1.0, 0.0),
            use_surface: false,
            resize_debounce_ms: 200,
        }
    }
}

impl ViewerOptions {
    /// Parses and validates options from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Vol3dError::Config`] for malformed JSON and
    /// [`crate::Vol3dError::InvalidParameter`] for out-of-range values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Serializes the options as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Vol3dError::Config`] if serialization fails.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks every nested parameter group.
    ///
    /// # Errors
    ///
    /// Returns the first [`crate::Vol3dError::InvalidParameter`] found.
    pub fn validate(&self) -> Result<()> {
        self.render.validate()?;
        self.transfer.validate()?;
        self.camera.validate()?;
        validate_rgb("surfaceColor", self.surface_color)?;
        Ok(())
    }

    pub fn resize_delay(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }
}
