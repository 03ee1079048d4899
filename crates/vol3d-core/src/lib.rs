//! Core logic for vol3d-rs.
//!
//! This crate holds everything about volume viewing that does not touch the GPU:
//! - [`Volume`] data with its depth auto-fix and normalized bounding box
//! - [`TransferTable`] generation from the five transfer function controls
//! - Render parameters and their documented ranges ([`RenderParams`], [`Control`])
//! - The camera and its interaction controller ([`CameraController`])
//! - The listener [`Dispatcher`] and the re-render [`Scheduler`]
//! - A CPU reference of the ray-marching program ([`raymarch`])

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Voxel counts and pixel sizes are converted to floats throughout
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::struct_excessive_bools)]

pub mod camera;
pub mod color;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod lights;
pub mod options;
pub mod params;
pub mod raymarch;
pub mod scheduler;
pub mod surface;
pub mod transfer_function;
pub mod volume;

pub use camera::{Camera, CameraConfig, FAR, NEAR};
pub use color::{parse_hex_color, to_hex_color, validate_rgb};
pub use controller::{CameraChange, CameraController, CameraRegime, Modifiers, PointerButton};
pub use dispatcher::{Dispatcher, DispatcherHandle, ListenerId};
pub use error::{Result, Vol3dError};
pub use lights::{DirectionalLight, LightRig, LIGHT_COUNT};
pub use options::ViewerOptions;
pub use params::{Control, ControlChange, ControlRange, RenderParams};
pub use raymarch::{RayMarcher, RayOutcome, SurfaceHit};
pub use scheduler::{InteractionSpeedup, ResizeDebouncer, Scheduler, ThrottleGate};
pub use surface::{SurfaceAlignment, SurfaceMesh};
pub use transfer_function::{TransferParams, TransferTable, TABLE_SIZE};
pub use volume::{box_size, fix_volume_size, Volume};

// Re-export glam types for convenience
pub use glam::{Mat4, UVec2, UVec3, Vec2, Vec3, Vec4};
