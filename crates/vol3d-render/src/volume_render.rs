//! The volume ray-casting pass.

use vol3d_core::{Camera, RenderParams};

use crate::engine::FRAME_FORMAT;
use crate::scene::{SceneResources, VolumeResources, BOX_VERTEX_COUNT};
use crate::surface_target::SurfaceTarget;
use crate::transfer_texture::TransferTexture;

/// Uniforms for the ray-casting shader.
/// Layout must match WGSL `VolumeUniforms` exactly (160 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct VolumeUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    /// Unit view direction, used to turn surface depth into ray distance.
    pub camera_forward: [f32; 4],
    pub box_size: [f32; 4],
    /// Volume resolution in voxels.
    pub volume_size: [f32; 4],
    pub dt_scale: f32,
    pub alpha_scale: f32,
    pub final_gamma: f32,
    pub near: f32,
    pub far: f32,
    /// 0 = off, 1 = on
    pub use_lighting: u32,
    /// 0 = off, 1 = on
    pub mirror_x: u32,
    /// 1 when the surface prepass ran this frame
    pub use_surface: u32,
}

impl VolumeUniforms {
    pub fn new(camera: &Camera, params: &RenderParams, volume: &VolumeResources, use_surface: bool) -> Self {
        Self {
            view_proj: camera.view_projection_matrix().to_cols_array_2d(),
            camera_position: camera.position.extend(1.0).to_array(),
            camera_forward: camera.forward().extend(0.0).to_array(),
            box_size: volume.box_size().extend(0.0).to_array(),
            volume_size: volume.size().as_vec3().extend(0.0).to_array(),
            dt_scale: params.dt_scale,
            alpha_scale: params.alpha_scale,
            final_gamma: params.final_gamma,
            near: camera.near,
            far: camera.far,
            use_lighting: u32::from(params.use_lighting),
            mirror_x: u32::from(params.use_volume_mirror_x),
            use_surface: u32::from(use_surface),
        }
    }
}

/// Draws the back faces of the box proxy with the ray-casting program.
pub struct VolumeRenderPass {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
}

impl VolumeRenderPass {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniform = |binding: u32, visibility: wgpu::ShaderStages| wgpu::BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let texture = |binding: u32, view_dimension, sample_type| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type,
                view_dimension,
                multisampled: false,
            },
            count: None,
        };
        let sampler = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };
        let filterable = wgpu::TextureSampleType::Float { filterable: true };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Volume Bind Group Layout"),
            entries: &[
                uniform(0, wgpu::ShaderStages::VERTEX_FRAGMENT),
                // Light rig
                uniform(1, wgpu::ShaderStages::FRAGMENT),
                texture(2, wgpu::TextureViewDimension::D3, filterable),
                sampler(3),
                // Transfer function
                texture(4, wgpu::TextureViewDimension::D2, filterable),
                sampler(5),
                // Surface prepass color and depth
                texture(6, wgpu::TextureViewDimension::D2, filterable),
                texture(7, wgpu::TextureViewDimension::D2, wgpu::TextureSampleType::Depth),
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Volume Raycast Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/volume_raycast.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Volume Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Volume Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x3],
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: FRAME_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            // Back faces only, so every covered pixel runs once, also with the camera inside.
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Front),
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Volume Uniform Buffer"),
            size: std::mem::size_of::<VolumeUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            pipeline,
            bind_group_layout,
            uniform_buffer,
        }
    }

    pub fn update_uniforms(&self, queue: &wgpu::Queue, uniforms: &VolumeUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[*uniforms]));
    }

    /// Clears `output` to black and ray-casts the loaded volume into it.
    ///
    /// Pixels outside the box footprint, and rays that end before entering it,
    /// stay black.
    pub fn render(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        output: &wgpu::TextureView,
        scene: &SceneResources,
        transfer: &TransferTexture,
        surface_target: &SurfaceTarget,
    ) {
        let bind_group = scene.volume().map(|volume| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Volume Bind Group"),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: self.uniform_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: scene.light_buffer().as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(volume.view()),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::Sampler(scene.volume_sampler()),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: wgpu::BindingResource::TextureView(transfer.view()),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: wgpu::BindingResource::Sampler(transfer.sampler()),
                    },
                    wgpu::BindGroupEntry {
                        binding: 6,
                        resource: wgpu::BindingResource::TextureView(surface_target.color_view()),
                    },
                    wgpu::BindGroupEntry {
                        binding: 7,
                        resource: wgpu::BindingResource::TextureView(surface_target.depth_view()),
                    },
                ],
            })
        });

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Volume Raycast Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            ..Default::default()
        });

        if let (Some(volume), Some(bind_group)) = (scene.volume(), bind_group.as_ref()) {
            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, bind_group, &[]);
            render_pass.set_vertex_buffer(0, volume.box_buffer().slice(..));
            render_pass.draw(0..BOX_VERTEX_COUNT, 0..1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_uniforms_size() {
        let size = std::mem::size_of::<VolumeUniforms>();
        assert_eq!(size % 16, 0, "VolumeUniforms size ({size} bytes) must be 16-byte aligned");
        assert_eq!(size, 160);
    }

    #[test]
    fn test_scalar_block_offset() {
        // Scalars follow the matrix and four vec4 fields.
        assert_eq!(std::mem::offset_of!(VolumeUniforms, dt_scale), 128);
        assert_eq!(std::mem::offset_of!(VolumeUniforms, use_surface), 156);
    }
}
