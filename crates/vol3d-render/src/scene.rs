//! GPU-resident scene: the volume texture, its box proxy, the light rig, and the
//! optional surface.

use std::sync::Arc;

use glam::{UVec3, Vec3};
use vol3d_core::{LightRig, SurfaceMesh, Volume};
use wgpu::util::DeviceExt;

use crate::engine::RenderEngine;
use crate::error::{RenderError, RenderResult};
use crate::surface_mesh_render::SurfaceMeshBuffers;

/// Light rig as the shaders see it.
/// Layout must match WGSL `Lights` exactly (96 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniforms {
    /// Unit directions toward each light, w unused.
    pub directions: [[f32; 4]; 3],
    /// Light colors, w unused.
    pub colors: [[f32; 4]; 3],
}

impl From<&LightRig> for LightUniforms {
    fn from(rig: &LightRig) -> Self {
        Self {
            directions: rig.lights.map(|l| l.direction.extend(0.0).to_array()),
            colors: rig.lights.map(|l| l.color.extend(0.0).to_array()),
        }
    }
}

/// Generates the 36 vertices of a box `[-size/2, size/2]`, outward faces wound
/// counter-clockwise.
fn generate_box(size: Vec3) -> Vec<[f32; 3]> {
    // Face order: +X, -X, +Y, -Y, +Z, -Z
    let faces: [[[f32; 3]; 4]; 6] = [
        [[0.5, -0.5, -0.5], [0.5, 0.5, -0.5], [0.5, 0.5, 0.5], [0.5, -0.5, 0.5]],
        [[-0.5, -0.5, 0.5], [-0.5, 0.5, 0.5], [-0.5, 0.5, -0.5], [-0.5, -0.5, -0.5]],
        [[-0.5, 0.5, -0.5], [-0.5, 0.5, 0.5], [0.5, 0.5, 0.5], [0.5, 0.5, -0.5]],
        [[-0.5, -0.5, 0.5], [-0.5, -0.5, -0.5], [0.5, -0.5, -0.5], [0.5, -0.5, 0.5]],
        [[-0.5, -0.5, 0.5], [0.5, -0.5, 0.5], [0.5, 0.5, 0.5], [-0.5, 0.5, 0.5]],
        [[0.5, -0.5, -0.5], [-0.5, -0.5, -0.5], [-0.5, 0.5, -0.5], [0.5, 0.5, -0.5]],
    ];

    let mut positions = Vec::with_capacity(36);
    for verts in &faces {
        // Two triangles per face: 0-1-2 and 0-2-3
        for vi in [0, 1, 2, 0, 2, 3] {
            positions.push((Vec3::from_array(verts[vi]) * size).to_array());
        }
    }
    positions
}

/// Number of vertices in the box proxy.
pub const BOX_VERTEX_COUNT: u32 = 36;

/// A loaded volume and the GPU resources built from it.
pub struct VolumeResources {
    volume: Volume,
    box_size: Vec3,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    box_buffer: wgpu::Buffer,
}

impl VolumeResources {
    fn create(engine: &RenderEngine, volume: Volume) -> RenderResult<Self> {
        let size = volume.size();
        let max = engine.device.limits().max_texture_dimension_3d;
        if size.max_element() > max {
            return Err(RenderError::TextureCreationFailed(format!(
                "volume {}x{}x{} exceeds the 3D texture limit of {max}",
                size.x, size.y, size.z
            )));
        }

        let box_size = volume.box_size();
        let (texture, view, box_buffer) = engine.scoped("volume texture", |device| {
            let texture = create_volume_texture(device, &engine.queue, &volume);
            let view = texture.create_view(&wgpu::TextureViewDescriptor {
                dimension: Some(wgpu::TextureViewDimension::D3),
                ..Default::default()
            });
            let box_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("volume box proxy"),
                contents: bytemuck::cast_slice(&generate_box(box_size)),
                usage: wgpu::BufferUsages::VERTEX,
            });
            (texture, view, box_buffer)
        })?;

        Ok(Self {
            volume,
            box_size,
            texture,
            view,
            box_buffer,
        })
    }

    fn destroy(&self) {
        self.texture.destroy();
        self.box_buffer.destroy();
    }

    pub fn volume(&self) -> &Volume {
        &self.volume
    }

    pub fn box_size(&self) -> Vec3 {
        self.box_size
    }

    pub fn size(&self) -> UVec3 {
        self.volume.size()
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn box_buffer(&self) -> &wgpu::Buffer {
        &self.box_buffer
    }
}

fn create_volume_texture(device: &wgpu::Device, queue: &wgpu::Queue, volume: &Volume) -> wgpu::Texture {
    let size = volume.size();
    let extent = wgpu::Extent3d {
        width: size.x,
        height: size.y,
        depth_or_array_layers: size.z,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("volume texture"),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D3,
        format: wgpu::TextureFormat::R8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        volume.data(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(size.x),
            rows_per_image: Some(size.y),
        },
        extent,
    );
    texture
}

struct AttachedSurface {
    mesh: Arc<SurfaceMesh>,
    buffers: SurfaceMeshBuffers,
}

/// Owns every GPU resource of the fixed scene.
///
/// Replacing the volume or the surface releases the previous resources once the
/// new ones are created successfully; a failed replacement leaves the old ones bound.
pub struct SceneResources {
    volume: Option<VolumeResources>,
    volume_sampler: wgpu::Sampler,
    lights: LightRig,
    light_buffer: wgpu::Buffer,
    surface: Option<AttachedSurface>,
    surface_visible: bool,
    surface_color: Vec3,
}

impl SceneResources {
    pub fn new(device: &wgpu::Device, surface_color: Vec3, surface_visible: bool) -> Self {
        let volume_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("volume sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let lights = LightRig::default();
        let light_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("light rig"),
            contents: bytemuck::cast_slice(&[LightUniforms::from(&lights)]),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        Self {
            volume: None,
            volume_sampler,
            lights,
            light_buffer,
            surface: None,
            surface_visible,
            surface_color,
        }
    }

    /// Uploads `volume` and rebuilds the box proxy, replacing any loaded volume.
    pub fn load_volume(&mut self, engine: &RenderEngine, volume: Volume) -> RenderResult<()> {
        let resources = VolumeResources::create(engine, volume)?;
        let size = resources.size();
        log::info!(
            "Loaded volume {}x{}x{}, box {}",
            size.x,
            size.y,
            size.z,
            resources.box_size
        );
        if let Some(old) = self.volume.replace(resources) {
            old.destroy();
        }
        Ok(())
    }

    /// Replaces the surface, or detaches it with `None`. Visibility is kept.
    pub fn attach_surface(
        &mut self,
        engine: &RenderEngine,
        mesh: Option<Arc<SurfaceMesh>>,
    ) -> RenderResult<()> {
        let attached = match mesh {
            Some(mesh) => {
                let buffers = engine.scoped("surface buffers", |device| SurfaceMeshBuffers::new(device, &mesh))?;
                log::info!(
                    "Attached surface with {} vertices, {} triangles",
                    mesh.vertices().len(),
                    mesh.triangles().len()
                );
                Some(AttachedSurface { mesh, buffers })
            }
            None => {
                log::info!("Detached surface");
                None
            }
        };

        if let Some(old) = std::mem::replace(&mut self.surface, attached) {
            old.buffers.destroy();
        }
        Ok(())
    }

    /// Sets the surface color without touching geometry or visibility.
    pub fn set_surface_color(&mut self, color: Vec3) {
        self.surface_color = color;
    }

    pub fn set_surface_visible(&mut self, visible: bool) {
        self.surface_visible = visible;
    }

    pub fn surface_color(&self) -> Vec3 {
        self.surface_color
    }

    pub fn surface_visible(&self) -> bool {
        self.surface_visible
    }

    pub fn surface_mesh(&self) -> Option<&Arc<SurfaceMesh>> {
        self.surface.as_ref().map(|s| &s.mesh)
    }

    /// Returns the surface buffers when a surface is attached and visible.
    pub fn drawn_surface(&self) -> Option<(&SurfaceMesh, &SurfaceMeshBuffers)> {
        if !self.surface_visible {
            return None;
        }
        self.surface.as_ref().map(|s| (s.mesh.as_ref(), &s.buffers))
    }

    /// Returns whether the surface prepass runs this frame.
    pub fn surface_drawn(&self) -> bool {
        self.drawn_surface().is_some()
    }

    pub fn volume(&self) -> Option<&VolumeResources> {
        self.volume.as_ref()
    }

    pub fn volume_sampler(&self) -> &wgpu::Sampler {
        &self.volume_sampler
    }

    pub fn lights(&self) -> &LightRig {
        &self.lights
    }

    pub fn light_buffer(&self) -> &wgpu::Buffer {
        &self.light_buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_uniforms_size() {
        assert_eq!(std::mem::size_of::<LightUniforms>(), 96);
    }

    #[test]
    fn test_light_uniforms_from_rig() {
        let rig = LightRig::default();
        let uniforms = LightUniforms::from(&rig);
        assert_eq!(uniforms.colors[2], [0.7, 0.8, 1.0, 0.0]);
        assert_eq!(uniforms.directions[0][3], 0.0);
    }

    #[test]
    fn test_box_is_scaled_and_centered() {
        let size = Vec3::new(1.0, 0.5, 0.25);
        let positions = generate_box(size);
        assert_eq!(positions.len(), BOX_VERTEX_COUNT as usize);
        let max = positions.iter().fold(Vec3::splat(f32::MIN), |m, p| m.max(Vec3::from_array(*p)));
        let min = positions.iter().fold(Vec3::splat(f32::MAX), |m, p| m.min(Vec3::from_array(*p)));
        assert_eq!(max, size * 0.5);
        assert_eq!(min, -size * 0.5);
    }

    #[test]
    fn test_box_faces_wind_outward() {
        let positions: Vec<Vec3> = generate_box(Vec3::ONE).into_iter().map(Vec3::from_array).collect();
        for tri in positions.chunks(3) {
            let normal = (tri[1] - tri[0]).cross(tri[2] - tri[0]);
            let center = (tri[0] + tri[1] + tri[2]) / 3.0;
            assert!(normal.dot(center) > 0.0, "face at {center} winds inward");
        }
    }
}
