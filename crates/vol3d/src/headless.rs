//! Headless rendering.
//!
//! Renders a volume to an image buffer or file without opening a window. Useful
//! for integration tests, batch processing, and automated screenshots.

use std::path::Path;
use std::sync::Arc;

use pollster::FutureExt;
use vol3d_core::{Result, SurfaceMesh, ViewerOptions, Volume};
use vol3d_render::RenderEngine;

use crate::viewer::Viewer;

/// Creates a viewer backed by an off-screen target of `width` x `height` pixels.
///
/// # Errors
///
/// Returns [`vol3d_core::Vol3dError::UnsupportedPlatform`] when no adapter can
/// sample 3D textures.
pub fn headless_viewer(width: u32, height: u32, options: &ViewerOptions) -> Result<Viewer> {
    let engine = RenderEngine::new_headless(width, height).block_on()?;
    Viewer::new(engine, options)
}

/// Renders one frame of `volume`, with an optional surface, to RGBA8 pixels.
///
/// The returned buffer is `width * height * 4` bytes, rows top to bottom.
///
/// # Example
/// ```no_run
/// use vol3d::*;
///
/// let volume = Volume::new(vec![128u8; 32 * 32 * 32], UVec3::splat(32), Vec3::ONE).unwrap();
/// let pixels = render_to_image(volume, None, &ViewerOptions::default(), 256, 256).unwrap();
/// assert_eq!(pixels.len(), 256 * 256 * 4);
/// ```
pub fn render_to_image(
    volume: Volume,
    surface: Option<Arc<SurfaceMesh>>,
    options: &ViewerOptions,
    width: u32,
    height: u32,
) -> Result<Vec<u8>> {
    let mut viewer = headless_viewer(width, height, options)?;
    if surface.is_some() {
        viewer.attach_surface(surface)?;
    }
    viewer.set_volume(volume)?;
    Ok(viewer.capture_frame()?.pixels)
}

/// Renders one frame of `volume` and saves it as a PNG or JPEG file.
pub fn render_to_file(
    path: impl AsRef<Path>,
    volume: Volume,
    surface: Option<Arc<SurfaceMesh>>,
    options: &ViewerOptions,
    width: u32,
    height: u32,
) -> Result<()> {
    let pixels = render_to_image(volume, surface, options, width, height)?;
    vol3d_render::save_image(path, &pixels, width, height)?;
    Ok(())
}
