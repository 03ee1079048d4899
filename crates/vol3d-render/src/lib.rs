//! Rendering backend for vol3d-rs.
//!
//! This crate provides the wgpu-based pieces of the viewer: the device and window
//! surface ([`RenderEngine`]), the GPU-resident scene ([`SceneResources`]), and the
//! two-pass [`FramePipeline`] that draws an optional surface and then ray-casts the
//! volume over it.

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
// Pixel sizes and counts move between integer and float freely
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
// wgpu descriptors are built with Default::default() throughout
#![allow(clippy::default_trait_access)]

pub mod engine;
pub mod error;
pub mod pipeline;
pub mod present_pass;
pub mod scene;
pub mod screenshot;
pub mod surface_mesh_render;
pub mod surface_target;
pub mod transfer_texture;
pub mod volume_render;

pub use engine::{RenderEngine, FRAME_FORMAT, MIN_TEXTURE_3D};
pub use error::{RenderError, RenderResult};
pub use pipeline::{FramePipeline, RenderedFrame};
pub use present_pass::PresentPass;
pub use scene::{LightUniforms, SceneResources, VolumeResources};
pub use screenshot::{save_image, ScreenshotError};
pub use surface_mesh_render::{SurfaceMeshBuffers, SurfaceMeshPipeline, SurfaceUniforms};
pub use surface_target::SurfaceTarget;
pub use transfer_texture::TransferTexture;
pub use volume_render::{VolumeRenderPass, VolumeUniforms};
