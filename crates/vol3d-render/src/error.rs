//! Rendering error types.

use thiserror::Error;
use vol3d_core::Vol3dError;

/// Errors that can occur during rendering operations.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Failed to create wgpu adapter.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// Failed to create wgpu device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// Failed to create surface.
    #[error("failed to create surface: {0}")]
    SurfaceCreationFailed(#[from] wgpu::CreateSurfaceError),

    /// The adapter lacks a capability needed for 3D-texture ray marching.
    #[error("missing GPU capability: {0}")]
    UnsupportedCapability(String),

    /// Texture creation failed.
    #[error("texture creation failed: {0}")]
    TextureCreationFailed(String),

    /// Buffer creation failed.
    #[error("buffer creation failed: {0}")]
    BufferCreationFailed(String),

    /// The device rejected a command or resource description.
    #[error("GPU validation error: {0}")]
    Validation(String),

    /// Surface lost.
    #[error("surface lost")]
    SurfaceLost,

    /// Surface outdated.
    #[error("surface outdated")]
    SurfaceOutdated,

    /// Out of memory.
    #[error("out of memory")]
    OutOfMemory,

    /// Timeout waiting for GPU.
    #[error("timeout waiting for GPU")]
    Timeout,
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;

impl From<RenderError> for Vol3dError {
    fn from(error: RenderError) -> Self {
        match error {
            RenderError::AdapterCreationFailed
            | RenderError::DeviceCreationFailed(_)
            | RenderError::SurfaceCreationFailed(_)
            | RenderError::UnsupportedCapability(_) => Vol3dError::UnsupportedPlatform(error.to_string()),
            RenderError::TextureCreationFailed(_)
            | RenderError::BufferCreationFailed(_)
            | RenderError::OutOfMemory => Vol3dError::ResourceExhaustion(error.to_string()),
            RenderError::Validation(_)
            | RenderError::SurfaceLost
            | RenderError::SurfaceOutdated
            | RenderError::Timeout => Vol3dError::Render(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        assert!(matches!(
            Vol3dError::from(RenderError::AdapterCreationFailed),
            Vol3dError::UnsupportedPlatform(_)
        ));
        assert!(matches!(
            Vol3dError::from(RenderError::OutOfMemory),
            Vol3dError::ResourceExhaustion(_)
        ));
        assert!(matches!(
            Vol3dError::from(RenderError::TextureCreationFailed("too big".into())),
            Vol3dError::ResourceExhaustion(_)
        ));
        assert!(matches!(
            Vol3dError::from(RenderError::SurfaceLost),
            Vol3dError::Render(_)
        ));
    }
}
