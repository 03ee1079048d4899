//! vol3d-rs: an interactive GPU volume viewer for 8-bit microscopy stacks.
//!
//! A volume is ray-marched through a 256-entry transfer function, optionally
//! composited with an opaque surface mesh drawn in a depth prepass.
//!
//! # Quick Start
//!
//! ```no_run
//! use vol3d::*;
//!
//! fn main() -> Result<()> {
//!     let size = UVec3::new(64, 64, 32);
//!     let data = vec![200u8; (size.x * size.y * size.z) as usize];
//!     let volume = Volume::new(data, size, Vec3::new(0.5, 0.5, 1.0))?;
//!
//!     // Blocks until the window is closed
//!     show(volume, None, ViewerOptions::default())
//! }
//! ```
//!
//! # Interaction
//!
//! - Drag to orbit, Alt/Ctrl/Meta-drag or right-drag to pan, scroll to zoom
//! - `l` toggles lighting; any other key toggles the surface
//!
//! For programmatic use, a [`Viewer`] can be created around any [`RenderEngine`];
//! [`headless_viewer`] and [`render_to_image`] do this without a window.

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]

mod app;
pub mod headless;
pub mod input;
pub mod viewer;

use std::sync::Arc;

pub use vol3d_core::{
    parse_hex_color, to_hex_color, Camera, CameraChange, CameraConfig, CameraRegime, ControlChange, ListenerId,
    Mat4, Modifiers, PointerButton, RayOutcome, RenderParams, Result, SurfaceAlignment, SurfaceHit, SurfaceMesh,
    TransferParams, TransferTable, UVec2, UVec3, Vec2, Vec3, Vec4, ViewerOptions, Vol3dError, Volume,
};
pub use vol3d_render::{RenderEngine, RenderedFrame};

pub use headless::{headless_viewer, render_to_file, render_to_image};
pub use viewer::{CapturedFrame, FrameRendered, Viewer};

/// Shows `volume` in a window, with an optional surface.
///
/// This function blocks until the window is closed.
pub fn show(volume: Volume, surface: Option<Arc<SurfaceMesh>>, options: ViewerOptions) -> Result<()> {
    let _ = env_logger::try_init();
    app::run_app(volume, surface, options)
}
