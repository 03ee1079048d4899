//! Off-screen color and depth targets written by the surface pass.

use glam::UVec2;

use crate::engine::RenderEngine;
use crate::error::RenderResult;

/// Color format of the surface prepass.
pub const SURFACE_COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
/// Depth format of the surface prepass.
pub const SURFACE_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// The color and depth the surface pass leaves for the volume pass to read.
///
/// Both textures are recreated only when the render resolution changes.
pub struct SurfaceTarget {
    size: UVec2,
    color_texture: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,
}

impl SurfaceTarget {
    pub fn new(device: &wgpu::Device, size: UVec2) -> Self {
        let size = size.max(UVec2::ONE);
        let (color_texture, color_view) = create(device, size, SURFACE_COLOR_FORMAT, "surface color");
        let (depth_texture, depth_view) = create(device, size, SURFACE_DEPTH_FORMAT, "surface depth");
        Self {
            size,
            color_texture,
            color_view,
            depth_texture,
            depth_view,
        }
    }

    /// Recreates the textures if `size` differs from the current size.
    ///
    /// Returns whether the textures were recreated. On allocation failure the
    /// current textures are kept.
    pub fn ensure_size(&mut self, engine: &RenderEngine, size: UVec2) -> RenderResult<bool> {
        let size = size.max(UVec2::ONE);
        if size == self.size {
            return Ok(false);
        }
        let resized = engine.scoped("surface target", |device| Self::new(device, size))?;
        let old = std::mem::replace(self, resized);
        old.color_texture.destroy();
        old.depth_texture.destroy();
        log::debug!("Surface target resized to {}x{}", size.x, size.y);
        Ok(true)
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn color_view(&self) -> &wgpu::TextureView {
        &self.color_view
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth_view
    }
}

fn create(
    device: &wgpu::Device,
    size: UVec2,
    format: wgpu::TextureFormat,
    label: &str,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: size.x,
            height: size.y,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}
