//! The volume viewer: scene state, interaction, and re-render scheduling.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use glam::{UVec2, UVec3, Vec2, Vec3};
use vol3d_core::raymarch::{self, RayMarcher, RayOutcome, SurfaceHit};
use vol3d_core::scheduler::scaled_size;
use vol3d_core::{
    parse_hex_color, validate_rgb, Camera, CameraChange, CameraConfig, CameraController, ControlChange, Dispatcher,
    ListenerId, Modifiers, PointerButton, RenderParams, Result, Scheduler, SurfaceMesh, TransferParams,
    TransferTable, ViewerOptions, Volume,
};
use vol3d_render::{FramePipeline, RenderEngine, RenderedFrame, SceneResources, TransferTexture};

/// Sent to frame listeners after every completed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRendered {
    /// Number of frames rendered so far, this one included.
    pub frame: u64,
    /// Resolution the frame was rendered at.
    pub size: UVec2,
    /// Whether the surface prepass ran.
    pub surface_pass: bool,
}

/// Pixels read back from the last rendered frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    /// Tightly packed RGBA8 rows, top row first.
    pub pixels: Vec<u8>,
    pub size: UVec2,
}

/// An interactive volume viewer bound to one render engine.
///
/// Every operation that changes what is visible renders a new frame before it
/// returns. Rendering is synchronous and single-threaded.
pub struct Viewer {
    engine: RenderEngine,
    scene: SceneResources,
    pipeline: FramePipeline,
    params: RenderParams,
    transfer_params: TransferParams,
    transfer_table: TransferTable,
    transfer_texture: TransferTexture,
    controller: CameraController,
    scheduler: Scheduler,
    frame_rendered: Dispatcher<FrameRendered>,
    frames: u64,
}

impl Viewer {
    /// Creates a viewer on `engine` with the given initial options.
    ///
    /// No frame is rendered until a volume is loaded or [`Viewer::render`] is called.
    pub fn new(engine: RenderEngine, options: &ViewerOptions) -> Result<Self> {
        options.validate()?;

        let transfer_table = TransferTable::generate(&options.transfer)?;
        let transfer_texture = TransferTexture::new(&engine.device, &engine.queue, &transfer_table);
        let scene = SceneResources::new(&engine.device, options.surface_color, options.use_surface);
        let pipeline = FramePipeline::new(&engine);
        let controller = CameraController::new(options.camera, engine.size())?;

        Ok(Self {
            scene,
            pipeline,
            params: options.render,
            transfer_params: options.transfer,
            transfer_table,
            transfer_texture,
            controller,
            scheduler: Scheduler::new(options.resize_delay()),
            frame_rendered: Dispatcher::new(),
            frames: 0,
            engine,
        })
    }

    /// Loads a new volume, replacing the current one, and renders.
    ///
    /// The depth is corrected when it disagrees with the buffer length.
    pub fn load_volume(&mut self, data: impl Into<Arc<[u8]>>, size: UVec3, voxel_size: Vec3) -> Result<()> {
        self.set_volume(Volume::new(data, size, voxel_size)?)
    }

    /// Replaces the current volume with an already validated one and renders.
    pub fn set_volume(&mut self, volume: Volume) -> Result<()> {
        self.scene.load_volume(&self.engine, volume)?;
        self.render()?;
        Ok(())
    }

    /// Attaches a surface, or detaches it with `None`, and renders.
    pub fn attach_surface(&mut self, mesh: Option<Arc<SurfaceMesh>>) -> Result<()> {
        self.scene.attach_surface(&self.engine, mesh)?;
        self.render()?;
        Ok(())
    }

    /// Sets the surface color, normalized RGB, and renders.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter("surfaceColor", ..)` for a non-finite or out-of-range
    /// component, leaving the current color in place.
    pub fn set_surface_color(&mut self, color: Vec3) -> Result<()> {
        let color = validate_rgb("surfaceColor", color)?;
        self.scene.set_surface_color(color);
        self.render()?;
        Ok(())
    }

    /// Sets the surface color from a `#rrggbb` string.
    pub fn set_surface_color_hex(&mut self, color: &str) -> Result<()> {
        self.set_surface_color(parse_hex_color(color)?)
    }

    pub fn set_surface_visible(&mut self, visible: bool) -> Result<()> {
        self.scene.set_surface_visible(visible);
        self.render()?;
        Ok(())
    }

    /// Replaces the transfer function controls and renders.
    ///
    /// Invalid controls are rejected and the current table is kept.
    pub fn set_transfer_params(&mut self, params: TransferParams) -> Result<()> {
        let table = match TransferTable::generate(&params) {
            Ok(table) => table,
            Err(error) => {
                log::warn!("Rejected transfer function: {error}");
                return Err(error);
            }
        };
        self.transfer_params = params;
        self.install_table(table);
        self.render()?;
        Ok(())
    }

    /// Sets the data color from a `#rrggbb` string.
    pub fn set_data_color_hex(&mut self, color: &str) -> Result<()> {
        let color = parse_hex_color(color)?;
        self.set_transfer_params(TransferParams {
            color,
            ..self.transfer_params
        })
    }

    /// Replaces all render parameters and renders.
    pub fn set_render_params(&mut self, params: RenderParams) -> Result<()> {
        if let Err(error) = params.validate() {
            log::warn!("Rejected render parameters: {error}");
            return Err(error);
        }
        self.params = params;
        self.render()?;
        Ok(())
    }

    pub fn set_use_lighting(&mut self, enabled: bool) -> Result<()> {
        self.set_render_params(RenderParams {
            use_lighting: enabled,
            ..self.params
        })
    }

    pub fn set_volume_mirror_x(&mut self, enabled: bool) -> Result<()> {
        self.set_render_params(RenderParams {
            use_volume_mirror_x: enabled,
            ..self.params
        })
    }

    /// Applies a change from a repeatable control, at most one per rendered frame.
    ///
    /// The value is validated first, so a rejected value never consumes the gate.
    /// Returns `Ok(false)` when the change was dropped because no frame has been
    /// rendered since the last admitted change.
    pub fn apply_throttled(&mut self, change: ControlChange) -> Result<bool> {
        if let Err(error) = change.validate() {
            log::warn!("Rejected {change:?}: {error}");
            return Err(error);
        }
        if !self.scheduler.admit_throttled() {
            return Ok(false);
        }

        let (params, transfer_params) = (self.params, self.transfer_params);
        let previous_table = match apply_control_change(&mut self.params, &mut self.transfer_params, change) {
            Ok(Some(table)) => Some(std::mem::replace(&mut self.transfer_table, table)),
            Ok(None) => None,
            Err(error) => {
                self.scheduler.release_throttled();
                return Err(error);
            }
        };
        if previous_table.is_some() {
            self.transfer_texture.upload(&self.engine.queue, &self.transfer_table);
        }

        if let Err(error) = self.render() {
            log::warn!("Rolling back {change:?}: {error}");
            self.params = params;
            self.transfer_params = transfer_params;
            if let Some(table) = previous_table {
                self.install_table(table);
            }
            self.scheduler.release_throttled();
            return Err(error);
        }
        Ok(true)
    }

    /// Replaces the configured camera. Renders only if the configuration changed.
    pub fn configure_camera(&mut self, config: CameraConfig) -> Result<()> {
        if self.controller.configure(config)? {
            log::info!("Camera configured at {}", config.position);
            self.render()?;
        }
        Ok(())
    }

    /// Starts a drag. Rendering drops to reduced resolution when the interaction
    /// speedup is above 1.
    pub fn pointer_down(&mut self, button: PointerButton, modifiers: Modifiers, position: Vec2) -> Result<()> {
        self.controller.pointer_down(button, modifiers, position);
        self.scheduler.begin_interaction();
        if self.params.interaction_speedup > 1.0 {
            self.render()?;
        }
        Ok(())
    }

    pub fn pointer_move(&mut self, position: Vec2) -> Result<()> {
        if self.controller.pointer_move(position).is_some() {
            self.render()?;
        }
        Ok(())
    }

    /// Ends a drag and renders at full resolution.
    pub fn pointer_up(&mut self) -> Result<()> {
        let was_dragging = self.controller.pointer_up();
        let was_reduced = self.scheduler.resolution_divisor(self.params.interaction_speedup) > 1.0;
        self.scheduler.end_interaction();
        if was_dragging && was_reduced {
            self.render()?;
        }
        Ok(())
    }

    pub fn wheel(&mut self, delta: f32) -> Result<()> {
        if self.controller.wheel(delta).is_some() {
            self.render()?;
        }
        Ok(())
    }

    /// Records a resize of the output. It is applied by [`Viewer::tick`] once
    /// resizes stop arriving for the debounce delay.
    pub fn request_resize(&mut self, size: UVec2, now: Instant) {
        self.scheduler.request_resize(size, now);
    }

    /// Applies a due resize. Returns whether a frame was rendered.
    pub fn tick(&mut self, now: Instant) -> Result<bool> {
        match self.scheduler.poll_resize(now) {
            Some(size) => {
                self.resize(size)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Returns when [`Viewer::tick`] next has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// Resizes the output immediately and renders.
    pub fn resize(&mut self, size: UVec2) -> Result<()> {
        if size.x == 0 || size.y == 0 {
            return Ok(());
        }
        self.engine.resize(size.x, size.y);
        self.controller.set_aspect_ratio(size);
        log::debug!("Resized to {}x{}", size.x, size.y);
        self.render()?;
        Ok(())
    }

    /// Renders one frame and notifies frame listeners.
    pub fn render(&mut self) -> Result<RenderedFrame> {
        let divisor = self.scheduler.resolution_divisor(self.params.interaction_speedup);
        let render_size = scaled_size(self.engine.size(), divisor);
        let frame = self.pipeline.render_frame(
            &self.engine,
            &self.scene,
            &self.transfer_texture,
            self.controller.camera(),
            &self.params,
            render_size,
        )?;

        self.scheduler.frame_rendered();
        self.frames += 1;
        self.frame_rendered.notify(&FrameRendered {
            frame: self.frames,
            size: frame.size,
            surface_pass: frame.surface_pass,
        });
        Ok(frame)
    }

    /// Reads back the last rendered frame.
    pub fn capture_frame(&self) -> Result<CapturedFrame> {
        let (pixels, size) = self.pipeline.capture(&self.engine)?;
        Ok(CapturedFrame { pixels, size })
    }

    /// Writes the last rendered frame to a PNG or JPEG file.
    pub fn save_screenshot(&self, path: impl AsRef<Path>) -> Result<()> {
        let frame = self.capture_frame()?;
        vol3d_render::save_image(path, &frame.pixels, frame.size.x, frame.size.y)?;
        Ok(())
    }

    /// Evaluates the ray-casting program on the CPU for one pixel of the last frame.
    ///
    /// `surface` stands in for the surface prepass at that pixel. Returns `None`
    /// when no volume is loaded.
    pub fn render_reference_pixel(&self, pixel: UVec2, surface: Option<SurfaceHit>) -> Option<RayOutcome> {
        let volume = self.scene.volume()?.volume();
        let camera = self.controller.camera();
        let viewport = self.pipeline.frame_size();
        let frag_coord = pixel.as_vec2() + 0.5;
        let ray = raymarch::primary_ray(camera, frag_coord, viewport);
        let marcher = RayMarcher::new(volume, &self.transfer_table, self.params, *self.scene.lights());
        Some(marcher.trace(camera.position, ray, frag_coord, surface))
    }

    /// Registers a listener called after every rendered frame.
    pub fn on_frame_rendered(&self, listener: impl Fn(&FrameRendered) + 'static) -> ListenerId {
        self.frame_rendered.add(listener)
    }

    pub fn remove_frame_listener(&self, id: ListenerId) -> bool {
        self.frame_rendered.remove(id)
    }

    /// Registers a listener called after every interactive camera change.
    pub fn on_camera_change(&self, listener: impl Fn(&CameraChange) + 'static) -> ListenerId {
        self.controller.add_listener(listener)
    }

    pub fn remove_camera_listener(&self, id: ListenerId) -> bool {
        self.controller.remove_listener(id)
    }

    pub fn params(&self) -> &RenderParams {
        &self.params
    }

    pub fn transfer_params(&self) -> &TransferParams {
        &self.transfer_params
    }

    pub fn transfer_table(&self) -> &TransferTable {
        &self.transfer_table
    }

    pub fn camera(&self) -> &Camera {
        self.controller.camera()
    }

    pub fn controller(&self) -> &CameraController {
        &self.controller
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scene(&self) -> &SceneResources {
        &self.scene
    }

    pub fn engine(&self) -> &RenderEngine {
        &self.engine
    }

    /// Returns the number of frames rendered so far.
    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    fn install_table(&mut self, table: TransferTable) {
        self.transfer_texture.upload(&self.engine.queue, &table);
        self.transfer_table = table;
    }
}

/// Applies `change` to the parameter groups.
///
/// Returns the regenerated table when the change touches the transfer function.
/// Both groups are left untouched on error.
fn apply_control_change(
    params: &mut RenderParams,
    transfer: &mut TransferParams,
    change: ControlChange,
) -> Result<Option<TransferTable>> {
    match change {
        ControlChange::DtScale(v) => params.set_dt_scale(v)?,
        ControlChange::AlphaScale(v) => params.set_alpha_scale(v)?,
        ControlChange::FinalGamma(v) => params.set_final_gamma(v)?,
        ControlChange::InteractionSpeedup(v) => params.set_interaction_speedup(v)?,
        ControlChange::Peak(v) => {
            return regenerate(transfer, TransferParams { peak: v, ..*transfer }).map(Some);
        }
        ControlChange::DataGamma(v) => {
            return regenerate(transfer, TransferParams { data_gamma: v, ..*transfer }).map(Some);
        }
    }
    Ok(None)
}

fn regenerate(transfer: &mut TransferParams, next: TransferParams) -> Result<TransferTable> {
    let table = TransferTable::generate(&next)?;
    *transfer = next;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_change_does_not_touch_transfer() {
        let mut params = RenderParams::default();
        let mut transfer = TransferParams::default();
        let table = apply_control_change(&mut params, &mut transfer, ControlChange::DtScale(2.0)).unwrap();
        assert!(table.is_none());
        assert_eq!(params.dt_scale, 2.0);
        assert_eq!(transfer, TransferParams::default());
    }

    #[test]
    fn test_peak_change_regenerates_table() {
        let mut params = RenderParams::default();
        let mut transfer = TransferParams::default();
        let table = apply_control_change(&mut params, &mut transfer, ControlChange::Peak(100.0))
            .unwrap()
            .unwrap();
        assert_eq!(transfer.peak, 100.0);
        assert_eq!(table.get(100)[3], 255);
        assert_eq!(params, RenderParams::default());
    }

    #[test]
    fn test_invalid_change_keeps_state() {
        let mut params = RenderParams::default();
        let mut transfer = TransferParams::default();
        assert!(apply_control_change(&mut params, &mut transfer, ControlChange::DataGamma(0.0)).is_err());
        assert!(apply_control_change(&mut params, &mut transfer, ControlChange::FinalGamma(0.0)).is_err());
        assert_eq!(params, RenderParams::default());
        assert_eq!(transfer, TransferParams::default());
    }
}
