//! The transfer function lookup texture.

use vol3d_core::{TransferTable, TABLE_SIZE};

const WIDTH: u32 = TABLE_SIZE as u32;

/// A 256x1 RGBA8 texture holding the current [`TransferTable`].
///
/// Sampled with linear filtering and clamp-to-edge addressing, so the ray marcher
/// can look up fractional sample values.
pub struct TransferTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

impl TransferTexture {
    /// Creates the texture and fills it with `table`.
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, table: &TransferTable) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("transfer function texture"),
            size: extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("transfer function sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let transfer = Self {
            texture,
            view,
            sampler,
        };
        transfer.upload(queue, table);
        transfer
    }

    /// Replaces the texture contents with `table`. The next frame samples the new values.
    pub fn upload(&self, queue: &wgpu::Queue, table: &TransferTable) {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            table.as_bytes(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(WIDTH * 4),
                rows_per_image: None,
            },
            extent(),
        );
        log::debug!("Uploaded transfer function {table:?}");
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }
}

fn extent() -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: WIDTH,
        height: 1,
        depth_or_array_layers: 1,
    }
}
