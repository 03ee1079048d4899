//! Error types for vol3d-rs.

use thiserror::Error;

/// The main error type for vol3d-rs operations.
#[derive(Error, Debug)]
pub enum Vol3dError {
    /// Volume dimensions are inconsistent with the data buffer in a way the depth
    /// auto-fix cannot repair.
    #[error("invalid volume dimensions: {0}")]
    InvalidDimensions(String),

    /// A scalar control is outside its documented domain.
    #[error("invalid value {value} for '{name}': {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// The GPU capability level needed for 3D-texture ray marching is unavailable.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// A GPU allocation failed.
    #[error("GPU resource exhaustion: {0}")]
    ResourceExhaustion(String),

    /// Any other rendering failure.
    #[error("render error: {0}")]
    Render(String),

    /// Malformed viewer configuration.
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

impl Vol3dError {
    /// Shorthand for building an [`Vol3dError::InvalidParameter`].
    pub fn invalid_parameter(
        name: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// A specialized Result type for vol3d-rs operations.
pub type Result<T> = std::result::Result<T, Vol3dError>;
