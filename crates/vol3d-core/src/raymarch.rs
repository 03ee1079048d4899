//! CPU reference for the volume ray-casting fragment program.
//!
//! [`RayMarcher::trace`] performs the same steps as `volume_raycast.wgsl`, in the
//! same order and with the same constants, for a single pixel. It backs the
//! compositing tests and lets a pixel of the GPU output be checked against an
//! independent evaluation.

use glam::{UVec2, UVec3, Vec2, Vec3, Vec4, Vec4Swizzles};

use crate::camera::Camera;
use crate::lights::LightRig;
use crate::params::RenderParams;
use crate::transfer_function::{TransferTable, TABLE_SIZE};
use crate::volume::Volume;

/// Steps below this size yield transparent black instead of marching.
pub const MIN_STEP: f32 = 1e-5;
/// Accumulated opacity at which marching stops.
pub const TERMINATION_ALPHA: f32 = 0.95;
/// How far the march start is pulled in front of a surface nearer than the box.
pub const SURFACE_TOLERANCE: f32 = 1e-4;
/// Gradients shorter than this do not shade the sample, which is then dropped.
pub const MIN_GRADIENT: f32 = 1e-4;
/// Direction components are kept at least this far from zero.
const MIN_DIRECTION: f32 = 1e-8;

/// What the surface prepass left at a pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceHit {
    /// Surface color captured in the prepass.
    pub color: Vec3,
    /// Distance from the camera to the surface along the normalized ray.
    pub distance: f32,
}

/// Result of tracing one pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RayOutcome {
    /// The ray does not cross the box in front of any surface.
    Discard,
    /// The step size was degenerate; the pixel is transparent black.
    Transparent,
    /// The ray was marched and composited.
    Composited {
        /// Premultiplied color and opacity accumulated along the ray.
        accumulated: Vec4,
        /// Final pixel after gamma, surface blending, and forcing alpha to 1.
        color: Vec4,
        /// Number of samples taken.
        steps: u32,
        /// Whether marching stopped at the opacity threshold.
        terminated_early: bool,
    },
}

impl RayOutcome {
    /// Returns the pixel written to the frame, or `None` when discarded.
    pub fn color(&self) -> Option<Vec4> {
        match *self {
            RayOutcome::Discard => None,
            RayOutcome::Transparent => Some(Vec4::ZERO),
            RayOutcome::Composited { color, .. } => Some(color),
        }
    }
}

/// Slab intersection of a ray with the box `[-size/2, size/2]`.
///
/// Returns `(t_near, t_far)`; the ray misses when `t_near >= t_far`.
pub fn intersect_box(origin: Vec3, dir: Vec3, box_size: Vec3) -> Vec2 {
    let box_min = -0.5 * box_size;
    let box_max = 0.5 * box_size;
    let safe = Vec3::select(
        dir.abs().cmplt(Vec3::splat(MIN_DIRECTION)),
        Vec3::splat(MIN_DIRECTION).copysign(dir),
        dir,
    );
    let inv = safe.recip();
    let t0 = (box_min - origin) * inv;
    let t1 = (box_max - origin) * inv;
    let tmin = t0.min(t1);
    let tmax = t0.max(t1);
    Vec2::new(tmin.max_element(), tmax.min_element())
}

/// Recovers the positive eye-space depth from a [0, 1] depth-buffer value.
pub fn eye_depth(depth: f32, near: f32, far: f32) -> f32 {
    near * far / (far - depth * (far - near))
}

/// Converts a depth-buffer value to a distance along the unit ray `dir`.
pub fn ray_distance_from_depth(depth: f32, near: f32, far: f32, dir: Vec3, forward: Vec3) -> f32 {
    eye_depth(depth, near, far) / dir.dot(forward).max(MIN_DIRECTION)
}

/// Step size along a unit ray so each step advances about one voxel along the
/// dominant axis, scaled by `dt_scale`.
pub fn step_size(volume_size: UVec3, dir: Vec3, dt_scale: f32) -> f32 {
    let per_axis = (volume_size.as_vec3() * dir.abs()).recip();
    per_axis.min_element() * dt_scale
}

/// Per-pixel pseudo-random offset in `[0, 5)`, in units of the step size.
pub fn dither(frag_coord: Vec2) -> f32 {
    let r = (frag_coord.x * 12.9898 + frag_coord.y * 78.233).sin() * 43758.5453;
    (r - r.floor()) * 5.0
}

/// Unnormalized direction of the ray through a pixel center.
pub fn primary_ray(camera: &Camera, frag_coord: Vec2, viewport: UVec2) -> Vec3 {
    let size = viewport.max(UVec2::ONE).as_vec2();
    let ndc = Vec2::new(
        2.0 * frag_coord.x / size.x - 1.0,
        1.0 - 2.0 * frag_coord.y / size.y,
    );
    let inverse = camera.view_projection_matrix().inverse();
    inverse.project_point3(ndc.extend(1.0)) - camera.position
}

/// Sign as the shading language defines it: zero maps to zero.
fn sign(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Trilinear, clamp-to-edge sampling of a volume at normalized coordinates.
pub fn sample_volume(volume: &Volume, p: Vec3) -> f32 {
    let x = p * volume.size().as_vec3() - 0.5;
    let base = x.floor();
    let f = x - base;
    let (bx, by, bz) = (base.x as i64, base.y as i64, base.z as i64);

    let v = |dx: i64, dy: i64, dz: i64| f32::from(volume.voxel(bx + dx, by + dy, bz + dz));
    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;

    let c00 = lerp(v(0, 0, 0), v(1, 0, 0), f.x);
    let c10 = lerp(v(0, 1, 0), v(1, 1, 0), f.x);
    let c01 = lerp(v(0, 0, 1), v(1, 0, 1), f.x);
    let c11 = lerp(v(0, 1, 1), v(1, 1, 1), f.x);
    let c0 = lerp(c00, c10, f.y);
    let c1 = lerp(c01, c11, f.y);
    lerp(c0, c1, f.z) / 255.0
}

/// Linear, clamp-to-edge lookup into a transfer table at `u` in [0, 1].
pub fn sample_transfer(table: &TransferTable, u: f32) -> Vec4 {
    let x = u * TABLE_SIZE as f32 - 0.5;
    let base = x.floor();
    let f = x - base;
    let last = (TABLE_SIZE - 1) as f32;
    let i0 = base.clamp(0.0, last) as u8;
    let i1 = (base + 1.0).clamp(0.0, last) as u8;
    let entry = |i: u8| Vec4::from_array(table.get(i).map(f32::from)) / 255.0;
    entry(i0).lerp(entry(i1), f)
}

/// Evaluates the ray-casting program on the CPU.
#[derive(Debug, Clone, Copy)]
pub struct RayMarcher<'a> {
    volume: &'a Volume,
    table: &'a TransferTable,
    params: RenderParams,
    lights: LightRig,
    box_size: Vec3,
}

impl<'a> RayMarcher<'a> {
    pub fn new(volume: &'a Volume, table: &'a TransferTable, params: RenderParams, lights: LightRig) -> Self {
        Self {
            volume,
            table,
            params,
            lights,
            box_size: volume.box_size(),
        }
    }

    /// Traces one pixel.
    ///
    /// `ray_dir` is the unnormalized direction from `camera_position` through the
    /// pixel, and `frag_coord` is the pixel center in framebuffer coordinates.
    pub fn trace(
        &self,
        camera_position: Vec3,
        ray_dir: Vec3,
        frag_coord: Vec2,
        surface: Option<SurfaceHit>,
    ) -> RayOutcome {
        self.march(camera_position, ray_dir, frag_coord, surface, true)
    }

    fn march(
        &self,
        camera_position: Vec3,
        ray_dir: Vec3,
        frag_coord: Vec2,
        surface: Option<SurfaceHit>,
        stop_early: bool,
    ) -> RayOutcome {
        if !ray_dir.is_finite() || ray_dir.length() < MIN_DIRECTION {
            return RayOutcome::Discard;
        }
        let mut dir = ray_dir.normalize();
        let mut origin = camera_position;
        if self.params.use_volume_mirror_x {
            dir.x = -dir.x;
            origin.x = -origin.x;
        }

        let mut t_box = intersect_box(origin, dir, self.box_size);
        if let Some(hit) = surface {
            t_box.y = t_box.y.min(hit.distance);
            t_box.x = t_box.x.min(hit.distance - SURFACE_TOLERANCE);
        }
        if t_box.x >= t_box.y {
            return RayOutcome::Discard;
        }
        t_box.x = t_box.x.max(0.0);

        let volume_size = self.volume.size();
        let dt = step_size(volume_size, dir, self.params.dt_scale);
        if !(dt >= MIN_STEP) {
            return RayOutcome::Transparent;
        }

        let mut t = t_box.x + dither(frag_coord) * dt;
        let mut p = (origin + t * dir) / self.box_size + 0.5;
        let dp = dir * dt / self.box_size;

        let l_min = self.box_size.min_element();
        let alpha_norm = l_min / (dir * self.box_size).length() * self.params.alpha_scale;
        let dg = volume_size.as_vec3().recip();

        let mut acc = Vec4::ZERO;
        let mut steps = 0u32;
        let mut terminated_early = false;

        while t < t_box.y {
            steps += 1;
            let value = sample_volume(self.volume, p);
            let mut sample = sample_transfer(self.table, value);
            sample.w = (sample.w * alpha_norm).min(1.0);

            if self.params.use_lighting && sample.w > 0.0 {
                sample = self.shade(sample, p, dg, dir);
            }

            let rgb = acc.xyz() + (1.0 - acc.w) * sample.w * sample.xyz();
            let a = acc.w + (1.0 - acc.w) * sample.w;
            acc = rgb.extend(a);

            if stop_early && acc.w >= TERMINATION_ALPHA {
                terminated_early = true;
                break;
            }
            t += dt;
            p += dp;
        }

        let g = 1.0 / self.params.final_gamma;
        let mut rgb = acc.xyz().powf(g);
        if let Some(hit) = surface {
            rgb += (1.0 - acc.w) * hit.color;
        }

        RayOutcome::Composited {
            accumulated: acc,
            color: rgb.extend(1.0),
            steps,
            terminated_early,
        }
    }

    /// Applies gradient lighting to one sample, or drops it when the gradient vanishes.
    fn shade(&self, sample: Vec4, p: Vec3, dg: Vec3, dir: Vec3) -> Vec4 {
        let s = |offset: Vec3| sample_volume(self.volume, p + offset);
        let mut grad = Vec3::new(
            s(Vec3::new(dg.x, 0.0, 0.0)) - s(Vec3::new(-dg.x, 0.0, 0.0)),
            s(Vec3::new(0.0, dg.y, 0.0)) - s(Vec3::new(0.0, -dg.y, 0.0)),
            s(Vec3::new(0.0, 0.0, dg.z)) - s(Vec3::new(0.0, 0.0, -dg.z)),
        );
        grad *= -sign(grad.dot(dir));

        let length = grad.length();
        if length < MIN_GRADIENT {
            return Vec4::ZERO;
        }
        let lighting = self.lights.lambert(grad / length);
        (sample.xyz() * lighting).extend(sample.w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer_function::TransferParams;
    use proptest::prelude::*;

    fn uniform_volume(n: u32, value: u8) -> Volume {
        Volume::new(vec![value; (n * n * n) as usize], UVec3::splat(n), Vec3::ONE).unwrap()
    }

    fn opaque_table() -> TransferTable {
        TransferTable::generate(&TransferParams {
            alpha0: 0.0,
            peak: 255.0,
            data_gamma: 1.0,
            alpha1: 255.0,
            color: Vec3::ONE,
        })
        .unwrap()
    }

    fn unlit(params: RenderParams) -> RenderParams {
        RenderParams {
            use_lighting: false,
            ..params
        }
    }

    const CAMERA: Vec3 = Vec3::new(0.0, 0.0, -2.0);
    const PIXEL: Vec2 = Vec2::new(0.5, 0.5);

    #[test]
    fn test_intersect_box_axis_ray() {
        let t = intersect_box(CAMERA, Vec3::Z, Vec3::ONE);
        assert!((t.x - 1.5).abs() < 1e-6);
        assert!((t.y - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_intersect_box_miss() {
        let t = intersect_box(Vec3::new(2.0, 0.0, -2.0), Vec3::Z, Vec3::ONE);
        assert!(t.x >= t.y);
    }

    #[test]
    fn test_inside_box_starts_behind_camera() {
        let t = intersect_box(Vec3::ZERO, Vec3::X, Vec3::ONE);
        assert!(t.x < 0.0 && (t.y - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_eye_depth_endpoints() {
        assert!((eye_depth(0.0, 0.01, 10.0) - 0.01).abs() < 1e-6);
        assert!((eye_depth(1.0, 0.01, 10.0) - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_depth_round_trip_through_projection() {
        let camera = Camera::default();
        let point = Vec3::new(0.1, -0.2, 0.3);
        let clip = camera.view_projection_matrix().project_point3(point);
        let dir = (point - camera.position).normalize();
        let distance =
            ray_distance_from_depth(clip.z, camera.near, camera.far, dir, camera.forward());
        assert!((distance - point.distance(camera.position)).abs() < 1e-3);
    }

    #[test]
    fn test_step_size_follows_dominant_axis() {
        let dt = step_size(UVec3::new(64, 32, 16), Vec3::Z, 1.0);
        assert!((dt - 1.0 / 16.0).abs() < 1e-7);
        let dt = step_size(UVec3::new(64, 32, 16), Vec3::ONE.normalize(), 2.0);
        assert!((dt - 2.0 / (64.0 / 3f32.sqrt())).abs() < 1e-6);
    }

    #[test]
    fn test_zero_direction_is_discarded() {
        let volume = uniform_volume(4, 255);
        let table = opaque_table();
        let marcher = RayMarcher::new(&volume, &table, RenderParams::default(), LightRig::default());
        assert_eq!(marcher.trace(CAMERA, Vec3::ZERO, PIXEL, None), RayOutcome::Discard);
    }

    #[test]
    fn test_tiny_step_is_transparent() {
        let volume = uniform_volume(4, 255);
        let table = opaque_table();
        let params = RenderParams {
            dt_scale: 1e-6,
            ..RenderParams::default()
        };
        let marcher = RayMarcher::new(&volume, &table, params, LightRig::default());
        assert_eq!(marcher.trace(CAMERA, Vec3::Z, PIXEL, None), RayOutcome::Transparent);
    }

    #[test]
    fn test_opaque_volume_terminates_and_forces_alpha() {
        let volume = uniform_volume(8, 255);
        let table = opaque_table();
        let marcher = RayMarcher::new(&volume, &table, unlit(RenderParams::default()), LightRig::default());
        let RayOutcome::Composited { color, steps, terminated_early, .. } =
            marcher.trace(CAMERA, Vec3::Z, PIXEL, None)
        else {
            panic!("expected a composited ray");
        };
        assert!(terminated_early);
        assert_eq!(steps, 1);
        assert_eq!(color, Vec4::ONE);
    }

    #[test]
    fn test_early_termination_matches_full_march_on_opaque_data() {
        let volume = uniform_volume(8, 255);
        let table = opaque_table();
        let marcher = RayMarcher::new(&volume, &table, unlit(RenderParams::default()), LightRig::default());
        let early = marcher.march(CAMERA, Vec3::Z, PIXEL, None, true);
        let full = marcher.march(CAMERA, Vec3::Z, PIXEL, None, false);
        let (Some(a), Some(b)) = (early.color(), full.color()) else {
            panic!("expected composited rays");
        };
        assert!(a.abs_diff_eq(b, 1e-6));
    }

    #[test]
    fn test_early_termination_error_is_bounded() {
        let size = UVec3::new(4, 4, 16);
        let data: Vec<u8> = (0..16u32)
            .flat_map(|z| std::iter::repeat(if z < 8 { 0 } else { 255 }).take(16))
            .collect();
        let volume = Volume::new(data, size, Vec3::ONE).unwrap();
        let table = opaque_table();
        let marcher = RayMarcher::new(&volume, &table, unlit(RenderParams::default()), LightRig::default());
        let box_size = volume.box_size();
        let camera = Vec3::new(0.0, 0.0, -box_size.z);
        let early = marcher.march(camera, Vec3::Z, PIXEL, None, true);
        let full = marcher.march(camera, Vec3::Z, PIXEL, None, false);
        let (
            RayOutcome::Composited { accumulated: a, .. },
            RayOutcome::Composited { accumulated: b, .. },
        ) = (early, full)
        else {
            panic!("expected composited rays");
        };
        assert!(a.w >= TERMINATION_ALPHA);
        assert!((b - a).abs().max_element() <= 1.0 - TERMINATION_ALPHA + 1e-6);
    }

    #[test]
    fn test_surface_clamps_march_and_shows_through() {
        let volume = uniform_volume(8, 0);
        let table = opaque_table();
        let marcher = RayMarcher::new(&volume, &table, unlit(RenderParams::default()), LightRig::default());
        let hit = SurfaceHit {
            color: Vec3::new(0.0, 1.0, 0.0),
            distance: 1.8,
        };
        let outcome = marcher.trace(CAMERA, Vec3::Z, PIXEL, Some(hit));
        assert_eq!(outcome.color(), Some(Vec4::new(0.0, 1.0, 0.0, 1.0)));
    }

    #[test]
    fn test_surface_in_front_of_box_is_not_discarded() {
        let volume = uniform_volume(8, 0);
        let table = opaque_table();
        let marcher = RayMarcher::new(&volume, &table, unlit(RenderParams::default()), LightRig::default());
        let hit = SurfaceHit {
            color: Vec3::ONE,
            distance: 1.0,
        };
        assert!(marcher.trace(CAMERA, Vec3::Z, PIXEL, Some(hit)).color().is_some());
    }

    #[test]
    fn test_uniform_volume_with_lighting_is_dropped() {
        let volume = uniform_volume(8, 255);
        let table = opaque_table();
        let marcher = RayMarcher::new(&volume, &table, RenderParams::default(), LightRig::default());
        let RayOutcome::Composited { accumulated, .. } = marcher.trace(CAMERA, Vec3::Z, PIXEL, None)
        else {
            panic!("expected a composited ray");
        };
        assert_eq!(accumulated, Vec4::ZERO);
    }

    #[test]
    fn test_mirror_x_flips_sampling() {
        let size = UVec3::new(8, 8, 8);
        let data: Vec<u8> = (0..512u32).map(|i| if i % 8 < 4 { 255 } else { 0 }).collect();
        let volume = Volume::new(data, size, Vec3::ONE).unwrap();
        let table = opaque_table();
        let camera = Vec3::new(-0.25, 0.0, -2.0);
        let plain = RayMarcher::new(&volume, &table, unlit(RenderParams::default()), LightRig::default());
        let mirrored = RayMarcher::new(
            &volume,
            &table,
            unlit(RenderParams {
                use_volume_mirror_x: true,
                ..RenderParams::default()
            }),
            LightRig::default(),
        );
        let a = plain.trace(camera, Vec3::Z, PIXEL, None).color().unwrap();
        let b = mirrored.trace(camera, Vec3::Z, PIXEL, None).color().unwrap();
        assert!(a.x > 0.9);
        assert!(b.x < 0.1);
    }

    #[test]
    fn test_primary_ray_through_center() {
        let camera = Camera::default();
        let dir = primary_ray(&camera, Vec2::new(50.0, 50.0), UVec2::new(100, 100));
        assert!(dir.normalize().abs_diff_eq(camera.forward(), 1e-4));
    }

    #[test]
    fn test_transfer_sampling_at_texel_centers() {
        let table = opaque_table();
        let u = (200.0 + 0.5) / 256.0;
        let s = sample_transfer(&table, u);
        let expected = Vec4::from_array(table.get(200).map(f32::from)) / 255.0;
        assert!(s.abs_diff_eq(expected, 1e-6));
    }

    proptest! {
        #[test]
        fn prop_alpha_grows_as_step_shrinks(value in 1u8..=255, x in 0.0f32..64.0, y in 0.0f32..64.0) {
            let volume = uniform_volume(8, value);
            let table = TransferTable::generate(&TransferParams {
                peak: 0.0,
                data_gamma: 1.0,
                ..TransferParams::default()
            }).unwrap();
            let pixel = Vec2::new(x.floor() + 0.5, y.floor() + 0.5);

            let mut previous = 0.0f32;
            for dt_scale in [1.0, 0.5, 0.25, 0.125] {
                let params = unlit(RenderParams { dt_scale, alpha_scale: 0.05, ..RenderParams::default() });
                let marcher = RayMarcher::new(&volume, &table, params, LightRig::default());
                let outcome = marcher.march(CAMERA, Vec3::Z, pixel, None, false);
                let RayOutcome::Composited { accumulated, .. } = outcome else {
                    return Err(TestCaseError::fail("expected a composited ray"));
                };
                prop_assert!(accumulated.w >= previous - 1e-6);
                prop_assert!(accumulated.w <= 1.0 + 1e-6);
                previous = accumulated.w;
            }
        }
    }
}
