//! Application window and event loop.

use std::sync::Arc;
use std::time::Instant;

use glam::{UVec2, Vec2};
use pollster::FutureExt;
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use vol3d_core::{Modifiers, Result, SurfaceMesh, ViewerOptions, Vol3dError, Volume};
use vol3d_render::RenderEngine;

use crate::input::{self, KeyCommand};
use crate::viewer::Viewer;

/// The window host: one window, one viewer.
pub struct App {
    options: ViewerOptions,
    volume: Option<Volume>,
    surface: Option<Arc<SurfaceMesh>>,
    window: Option<Arc<Window>>,
    viewer: Option<Viewer>,
    cursor: Vec2,
    modifiers: Modifiers,
    close_requested: bool,
}

impl App {
    pub fn new(volume: Volume, surface: Option<Arc<SurfaceMesh>>, options: ViewerOptions) -> Self {
        Self {
            options,
            volume: Some(volume),
            surface,
            window: None,
            viewer: None,
            cursor: Vec2::ZERO,
            modifiers: Modifiers::default(),
            close_requested: false,
        }
    }

    fn create_viewer(&mut self, window: &Arc<Window>) -> Result<Viewer> {
        let engine = RenderEngine::new_windowed(window.clone()).block_on()?;
        let mut viewer = Viewer::new(engine, &self.options)?;
        if let Some(surface) = self.surface.take() {
            viewer.attach_surface(Some(surface))?;
        }
        if let Some(volume) = self.volume.take() {
            viewer.set_volume(volume)?;
        }
        Ok(viewer)
    }

    fn handle_key(&mut self, command: KeyCommand) -> Result<()> {
        if command == KeyCommand::Close {
            self.close_requested = true;
            return Ok(());
        }
        let Some(viewer) = &mut self.viewer else {
            return Ok(());
        };
        match command {
            KeyCommand::ToggleLighting => {
                let enabled = !viewer.params().use_lighting;
                log::info!("Lighting {}", if enabled { "on" } else { "off" });
                viewer.set_use_lighting(enabled)
            }
            KeyCommand::ToggleSurface if viewer.scene().surface_mesh().is_some() => {
                let visible = !viewer.scene().surface_visible();
                log::info!("Surface {}", if visible { "shown" } else { "hidden" });
                viewer.set_surface_visible(visible)
            }
            KeyCommand::ToggleSurface | KeyCommand::Close => Ok(()),
        }
    }

    fn handle_window_event(&mut self, event: WindowEvent) -> Result<()> {
        match &event {
            WindowEvent::CloseRequested => {
                self.close_requested = true;
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                self.modifiers = input::modifiers(modifiers.state());
            }
            WindowEvent::KeyboardInput { event: key, .. } => {
                if key.state == ElementState::Pressed && !key.repeat {
                    self.handle_key(input::key_command(&key.logical_key))?;
                }
            }
            _ => {}
        }

        let Some(viewer) = &mut self.viewer else {
            return Ok(());
        };
        match event {
            WindowEvent::Resized(size) => {
                viewer.request_resize(UVec2::new(size.width, size.height), Instant::now());
            }
            WindowEvent::RedrawRequested => {
                viewer.render()?;
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Vec2::new(position.x as f32, position.y as f32);
                viewer.pointer_move(self.cursor)?;
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if let Some(button) = input::pointer_button(button) {
                    match state {
                        ElementState::Pressed => viewer.pointer_down(button, self.modifiers, self.cursor)?,
                        ElementState::Released => viewer.pointer_up()?,
                    }
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                viewer.wheel(input::wheel_delta(delta))?;
            }
            _ => {}
        }
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = Window::default_attributes()
            .with_title(self.options.title.clone())
            .with_inner_size(LogicalSize::new(self.options.width, self.options.height));

        let window = Arc::new(
            event_loop
                .create_window(window_attributes)
                .expect("failed to create window"),
        );

        match self.create_viewer(&window) {
            Ok(viewer) => self.viewer = Some(viewer),
            Err(Vol3dError::UnsupportedPlatform(reason)) => {
                log::error!("Volume rendering is not available on this system: {reason}");
                window.set_title(&format!("{} (volume rendering unsupported)", self.options.title));
            }
            Err(e) => {
                log::error!("Failed to start viewer: {e}");
                self.close_requested = true;
            }
        }
        self.window = Some(window);

        if self.close_requested {
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        if let Err(e) = self.handle_window_event(event) {
            log::error!("{e}");
        }

        if self.close_requested {
            event_loop.exit();
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(viewer) = &mut self.viewer else {
            event_loop.set_control_flow(ControlFlow::Wait);
            return;
        };
        if let Err(e) = viewer.tick(Instant::now()) {
            log::error!("{e}");
        }
        event_loop.set_control_flow(match viewer.next_deadline() {
            Some(deadline) => ControlFlow::WaitUntil(deadline),
            None => ControlFlow::Wait,
        });
    }
}

/// Opens a window showing `volume` and runs until it is closed.
///
/// # Errors
///
/// Returns an error if the event loop cannot be created or fails.
pub fn run_app(volume: Volume, surface: Option<Arc<SurfaceMesh>>, options: ViewerOptions) -> Result<()> {
    options.validate()?;
    let event_loop = EventLoop::new().map_err(|e| Vol3dError::UnsupportedPlatform(e.to_string()))?;
    let mut app = App::new(volume, surface, options);

    event_loop
        .run_app(&mut app)
        .map_err(|e| Vol3dError::Render(format!("event loop error: {e}")))
}
