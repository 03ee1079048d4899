//! Two-pass frame orchestration.

use glam::UVec2;
use vol3d_core::{Camera, RenderParams};

use crate::engine::{RenderEngine, FRAME_FORMAT};
use crate::error::{RenderError, RenderResult};
use crate::present_pass::PresentPass;
use crate::scene::SceneResources;
use crate::screenshot::{self, ScreenshotError};
use crate::surface_mesh_render::{SurfaceMeshPipeline, SurfaceUniforms};
use crate::surface_target::SurfaceTarget;
use crate::transfer_texture::TransferTexture;
use crate::volume_render::{VolumeRenderPass, VolumeUniforms};

/// The texture each frame is ray-cast into, at render resolution.
struct FrameTarget {
    size: UVec2,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl FrameTarget {
    fn new(device: &wgpu::Device, size: UVec2) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("frame target"),
            size: wgpu::Extent3d {
                width: size.x,
                height: size.y,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FRAME_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { size, texture, view }
    }
}

/// What one call to [`FramePipeline::render_frame`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderedFrame {
    /// Resolution the frame was ray-cast at.
    pub size: UVec2,
    /// Whether the surface prepass ran.
    pub surface_pass: bool,
    /// Whether the frame reached the window. Always false when headless.
    pub presented: bool,
}

/// Draws frames: the surface prepass, the volume ray-cast, then presentation.
pub struct FramePipeline {
    surface_pipeline: SurfaceMeshPipeline,
    volume_pass: VolumeRenderPass,
    present_pass: Option<PresentPass>,
    surface_target: SurfaceTarget,
    frame: FrameTarget,
    rendered: bool,
}

impl FramePipeline {
    pub fn new(engine: &RenderEngine) -> Self {
        let device = &engine.device;
        let size = engine.size();
        Self {
            surface_pipeline: SurfaceMeshPipeline::new(device),
            volume_pass: VolumeRenderPass::new(device),
            present_pass: engine
                .is_windowed()
                .then(|| PresentPass::new(device, engine.output_format())),
            surface_target: SurfaceTarget::new(device, size),
            frame: FrameTarget::new(device, size),
            rendered: false,
        }
    }

    /// Renders one frame at `render_size` and presents it if the engine has a window.
    ///
    /// A lost or outdated window surface is reconfigured and the frame is not
    /// presented; the caller re-renders on the next event.
    pub fn render_frame(
        &mut self,
        engine: &RenderEngine,
        scene: &SceneResources,
        transfer: &TransferTexture,
        camera: &Camera,
        params: &RenderParams,
        render_size: UVec2,
    ) -> RenderResult<RenderedFrame> {
        let render_size = render_size.max(UVec2::ONE);
        self.ensure_frame_size(engine, render_size)?;

        let mut encoder = engine.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame encoder"),
        });

        // Pass 1: surface color and depth
        let surface_pass = match scene.drawn_surface() {
            Some((mesh, buffers)) => {
                self.surface_target.ensure_size(engine, render_size)?;
                let uniforms = SurfaceUniforms::new(
                    camera.view_projection_matrix(),
                    mesh.transform(),
                    scene.surface_color(),
                );
                self.surface_pipeline.update_uniforms(&engine.queue, &uniforms);
                self.surface_pipeline.render(
                    &engine.device,
                    &mut encoder,
                    &self.surface_target,
                    buffers,
                    scene.light_buffer(),
                );
                true
            }
            None => false,
        };

        // Pass 2: volume ray-cast
        if let Some(volume) = scene.volume() {
            let uniforms = VolumeUniforms::new(camera, params, volume, surface_pass);
            self.volume_pass.update_uniforms(&engine.queue, &uniforms);
        }
        self.volume_pass.render(
            &engine.device,
            &mut encoder,
            &self.frame.view,
            scene,
            transfer,
            &self.surface_target,
        );

        let output = match (&engine.surface, &self.present_pass) {
            (Some(surface), Some(present_pass)) => match acquire(engine, surface)? {
                Some(output) => {
                    let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
                    present_pass.render(&engine.device, &mut encoder, &self.frame.view, &view);
                    Some(output)
                }
                None => None,
            },
            _ => None,
        };

        engine.queue.submit(std::iter::once(encoder.finish()));
        let presented = output.is_some();
        if let Some(output) = output {
            output.present();
        }

        self.rendered = true;
        log::trace!(
            "Frame {}x{} (surface pass: {surface_pass}, presented: {presented})",
            render_size.x,
            render_size.y
        );
        Ok(RenderedFrame {
            size: render_size,
            surface_pass,
            presented,
        })
    }

    fn ensure_frame_size(&mut self, engine: &RenderEngine, size: UVec2) -> RenderResult<()> {
        if self.frame.size == size {
            return Ok(());
        }
        let frame = engine.scoped("frame target", |device| FrameTarget::new(device, size))?;
        let old = std::mem::replace(&mut self.frame, frame);
        old.texture.destroy();
        Ok(())
    }

    /// Reads back the last rendered frame as tightly packed RGBA8 rows.
    pub fn capture(&self, engine: &RenderEngine) -> Result<(Vec<u8>, UVec2), ScreenshotError> {
        if !self.rendered {
            return Err(ScreenshotError::NoFrame);
        }
        let pixels = screenshot::read_texture(&engine.device, &engine.queue, &self.frame.texture, self.frame.size)?;
        Ok((pixels, self.frame.size))
    }

    /// Returns the resolution of the last frame target.
    pub fn frame_size(&self) -> UVec2 {
        self.frame.size
    }
}

/// Acquires the next window texture, or `None` if this frame should be skipped.
fn acquire(engine: &RenderEngine, surface: &wgpu::Surface<'static>) -> RenderResult<Option<wgpu::SurfaceTexture>> {
    match surface.get_current_texture() {
        Ok(output) => Ok(Some(output)),
        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
            log::debug!("Surface lost or outdated, reconfiguring");
            engine.reconfigure_surface();
            Ok(None)
        }
        Err(wgpu::SurfaceError::OutOfMemory) => Err(RenderError::OutOfMemory),
        Err(wgpu::SurfaceError::Timeout) => {
            log::warn!("Surface timeout");
            Ok(None)
        }
        Err(wgpu::SurfaceError::Other) => {
            log::warn!("Surface error: other");
            Ok(None)
        }
    }
}
