#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
//! Demo showing a synthetic microscopy stack in vol3d-rs.
//!
//! Builds a cell-like volume (a bright membrane shell, a dimmer nucleus, and some
//! speckle) on an anisotropic voxel grid, and a micron-space sphere surface
//! aligned to it. Pass a JSON options file as the first argument to override the
//! defaults, or `--headless out.png` to render one frame to a file instead.

use std::f32::consts::PI;
use std::sync::Arc;

use vol3d::{SurfaceAlignment, SurfaceMesh, UVec3, Vec3, ViewerOptions, Volume};

const SIZE: UVec3 = UVec3::new(128, 128, 48);
const VOXEL: Vec3 = Vec3::new(0.4, 0.4, 1.0);

fn cell_volume() -> Volume {
    let extent = SIZE.as_vec3() * VOXEL;
    let center = extent * 0.5;
    let radius = extent.min_element() * 0.45;

    let mut data = Vec::with_capacity((SIZE.x * SIZE.y * SIZE.z) as usize);
    for z in 0..SIZE.z {
        for y in 0..SIZE.y {
            for x in 0..SIZE.x {
                let p = UVec3::new(x, y, z).as_vec3() * VOXEL;
                let r = (p - center).length() / radius;
                let membrane = (-((r - 1.0) * 12.0).powi(2)).exp() * 230.0;
                let nucleus = if r < 0.4 { 120.0 } else { 0.0 };
                let hash = (x.wrapping_mul(73_856_093) ^ y.wrapping_mul(19_349_663) ^ z.wrapping_mul(83_492_791)) % 997;
                let speckle = if hash < 6 { 180.0 } else { 0.0 };
                data.push(membrane.max(nucleus).max(speckle).min(255.0) as u8);
            }
        }
    }
    Volume::new(data, SIZE, VOXEL).expect("synthetic volume is consistent")
}

/// A UV sphere in micron coordinates, matching the nucleus.
fn nucleus_surface() -> SurfaceMesh {
    let extent = SIZE.as_vec3() * VOXEL;
    let center = extent * 0.5;
    let radius = extent.min_element() * 0.45 * 0.4;
    let (rings, segments) = (16u32, 32u32);

    let mut vertices = Vec::new();
    for ring in 0..=rings {
        let theta = PI * ring as f32 / rings as f32;
        for segment in 0..segments {
            let phi = 2.0 * PI * segment as f32 / segments as f32;
            let dir = Vec3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos());
            vertices.push(center + dir * radius);
        }
    }

    let mut triangles = Vec::new();
    for ring in 0..rings {
        for segment in 0..segments {
            let next = (segment + 1) % segments;
            let a = ring * segments + segment;
            let b = ring * segments + next;
            let c = (ring + 1) * segments + segment;
            let d = (ring + 1) * segments + next;
            triangles.push([a, c, b]);
            triangles.push([b, c, d]);
        }
    }

    let alignment = SurfaceAlignment::compute("micron", SIZE, VOXEL);
    SurfaceMesh::new(vertices, triangles)
        .expect("sphere indices are in range")
        .with_transform(alignment.to_matrix())
}

fn main() -> vol3d::Result<()> {
    let _ = env_logger::try_init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let headless_output = match args.as_slice() {
        [flag, path, ..] if flag == "--headless" => Some(path.clone()),
        _ => None,
    };
    let mut options = match args.first() {
        Some(path) if headless_output.is_none() => {
            let json = std::fs::read_to_string(path).map_err(|e| vol3d::Vol3dError::Render(e.to_string()))?;
            ViewerOptions::from_json_str(&json)?
        }
        _ => ViewerOptions::default(),
    };
    options.title = "vol3d-rs volume demo".to_string();
    options.use_surface = true;
    options.render.interaction_speedup = 2.0;

    let volume = cell_volume();
    let surface = Some(Arc::new(nucleus_surface()));

    if let Some(path) = headless_output {
        vol3d::render_to_file(&path, volume, surface, &options, options.width, options.height)?;
        println!("Wrote {path}");
        return Ok(());
    }

    println!("Drag to orbit, Alt/Ctrl-drag or right-drag to pan, scroll to zoom.");
    println!("Press 'l' to toggle lighting, any other key to toggle the surface.");
    vol3d::show(volume, surface, options)
}
