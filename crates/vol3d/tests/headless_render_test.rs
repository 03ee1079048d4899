//! Headless rendering integration tests.
//!
//! These tests need a GPU adapter (real or software fallback) that can sample
//! 3D textures. Without one, each test prints a notice and returns early.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use vol3d::*;

const SIZE: u32 = 64;

fn viewer(options: &ViewerOptions) -> Option<Viewer> {
    match headless_viewer(SIZE, SIZE, options) {
        Ok(viewer) => Some(viewer),
        Err(e) => {
            eprintln!("Skipping headless tests: no GPU adapter available ({e})");
            None
        }
    }
}

/// A filled ball of value 200 in a 32^3 volume.
fn ball() -> Volume {
    let n = 32u32;
    let center = (n as f32 - 1.0) / 2.0;
    let mut data = Vec::with_capacity((n * n * n) as usize);
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let d = Vec3::new(x as f32, y as f32, z as f32) - Vec3::splat(center);
                data.push(if d.length() < 12.0 { 200 } else { 0 });
            }
        }
    }
    Volume::new(data, UVec3::splat(n), Vec3::ONE).unwrap()
}

fn pixel(pixels: &[u8], x: u32, y: u32) -> [u8; 4] {
    let i = ((y * SIZE + x) * 4) as usize;
    [pixels[i], pixels[i + 1], pixels[i + 2], pixels[i + 3]]
}

/// A quad facing the camera, covering the middle of the view at the volume center.
fn quad() -> Arc<SurfaceMesh> {
    let vertices = vec![
        Vec3::new(-0.2, -0.2, 0.0),
        Vec3::new(0.2, -0.2, 0.0),
        Vec3::new(0.2, 0.2, 0.0),
        Vec3::new(-0.2, 0.2, 0.0),
    ];
    Arc::new(SurfaceMesh::new(vertices, vec![[0, 1, 2], [0, 2, 3]]).unwrap())
}

#[test]
fn headless_empty_scene_is_black() {
    let Some(mut viewer) = viewer(&ViewerOptions::default()) else {
        return;
    };
    assert!(matches!(viewer.capture_frame(), Err(Vol3dError::Render(_))));

    let frame = viewer.render().unwrap();
    assert_eq!(frame.size, UVec2::splat(SIZE));
    assert!(!frame.surface_pass);
    assert!(!frame.presented);

    let captured = viewer.capture_frame().unwrap();
    assert_eq!(captured.pixels.len(), (SIZE * SIZE * 4) as usize);
    assert!(captured.pixels.chunks(4).all(|px| px == [0, 0, 0, 255]));
}

#[test]
fn headless_volume_renders_inside_box_footprint() {
    let Some(mut viewer) = viewer(&ViewerOptions::default()) else {
        return;
    };
    viewer.set_volume(ball()).unwrap();
    let pixels = viewer.capture_frame().unwrap().pixels;

    let center = pixel(&pixels, SIZE / 2, SIZE / 2);
    assert!(center[0] > 0 || center[2] > 0, "center should show the ball: {center:?}");
    assert_eq!(center[3], 255);
    assert_eq!(pixel(&pixels, 0, 0), [0, 0, 0, 255], "corner is outside the box");
}

#[test]
fn headless_render_to_image_matches_size() {
    let volume = ball();
    match render_to_image(volume, None, &ViewerOptions::default(), 40, 30) {
        Ok(pixels) => assert_eq!(pixels.len(), 40 * 30 * 4),
        Err(e) => eprintln!("Skipping headless tests: no GPU adapter available ({e})"),
    }
}

#[test]
fn headless_gpu_matches_reference_marcher() {
    let mut options = ViewerOptions::default();
    options.render.use_lighting = false;
    let Some(mut viewer) = viewer(&options) else {
        return;
    };
    let size = UVec3::splat(16);
    viewer.load_volume(vec![200u8; 16 * 16 * 16], size, Vec3::ONE).unwrap();
    let pixels = viewer.capture_frame().unwrap().pixels;

    for (x, y) in [(32, 32), (28, 36), (0, 0)] {
        let gpu = pixel(&pixels, x, y);
        let reference = viewer.render_reference_pixel(UVec2::new(x, y), None).unwrap();
        let expected = reference.color().unwrap_or(Vec4::new(0.0, 0.0, 0.0, 1.0));
        for c in 0..3 {
            let actual = f32::from(gpu[c]) / 255.0;
            assert!(
                (actual - expected[c]).abs() < 0.1,
                "pixel ({x}, {y}) channel {c}: gpu {actual}, reference {}",
                expected[c]
            );
        }
    }
}

#[test]
fn headless_surface_pass_follows_visibility() {
    let mut options = ViewerOptions::default();
    options.use_surface = true;
    let Some(mut viewer) = viewer(&options) else {
        return;
    };
    viewer.set_volume(ball()).unwrap();

    let frames = Rc::new(RefCell::new(Vec::new()));
    let sink = frames.clone();
    viewer.on_frame_rendered(move |frame| sink.borrow_mut().push(*frame));

    viewer.attach_surface(Some(quad())).unwrap();
    viewer.set_surface_visible(false).unwrap();
    viewer.set_surface_visible(true).unwrap();
    viewer.attach_surface(None).unwrap();

    let passes: Vec<bool> = frames.borrow().iter().map(|f| f.surface_pass).collect();
    assert_eq!(passes, vec![true, false, true, false]);
    let numbers: Vec<u64> = frames.borrow().iter().map(|f| f.frame).collect();
    assert_eq!(numbers, vec![2, 3, 4, 5]);
}

#[test]
fn headless_surface_color_shows_through() {
    let mut options = ViewerOptions::default();
    options.use_surface = true;
    options.surface_color = Vec3::new(0.0, 1.0, 0.0);
    // Samples of 10 map to zero opacity
    options.transfer.alpha0 = 0.0;
    options.transfer.alpha1 = 0.0;
    options.transfer.peak = 255.0;
    let Some(mut viewer) = viewer(&options) else {
        return;
    };
    viewer.attach_surface(Some(quad())).unwrap();
    viewer.load_volume(vec![10u8; 8 * 8 * 8], UVec3::splat(8), Vec3::ONE).unwrap();

    let center = pixel(&viewer.capture_frame().unwrap().pixels, SIZE / 2, SIZE / 2);
    // Only the third light reaches a quad facing the camera
    assert!(center[1] > 64, "surface green should show: {center:?}");
    assert!(center[0] < 16 && center[2] < 16, "{center:?}");
}

#[test]
fn headless_throttled_changes_are_validated_first() {
    let Some(mut viewer) = viewer(&ViewerOptions::default()) else {
        return;
    };
    viewer.set_volume(ball()).unwrap();
    let frames = viewer.frames_rendered();

    assert!(viewer.apply_throttled(ControlChange::AlphaScale(0.5)).unwrap());
    assert_eq!(viewer.params().alpha_scale, 0.5);
    assert_eq!(viewer.frames_rendered(), frames + 1);

    assert!(viewer.apply_throttled(ControlChange::DataGamma(0.0)).is_err());
    assert_eq!(viewer.transfer_params().data_gamma, 0.5);
    assert_eq!(viewer.frames_rendered(), frames + 1);

    assert!(viewer.apply_throttled(ControlChange::Peak(120.0)).unwrap());
    assert_eq!(viewer.transfer_table().get(120)[3], 255);
}

#[test]
fn headless_interaction_renders_at_reduced_resolution() {
    let mut options = ViewerOptions::default();
    options.render.interaction_speedup = 2.0;
    let Some(mut viewer) = viewer(&options) else {
        return;
    };
    viewer.set_volume(ball()).unwrap();

    let sizes = Rc::new(RefCell::new(Vec::new()));
    let sink = sizes.clone();
    viewer.on_frame_rendered(move |frame| sink.borrow_mut().push(frame.size));

    viewer
        .pointer_down(PointerButton::Primary, Modifiers::default(), Vec2::new(10.0, 10.0))
        .unwrap();
    viewer.pointer_move(Vec2::new(20.0, 10.0)).unwrap();
    viewer.pointer_up().unwrap();

    let half = UVec2::splat(SIZE / 2);
    assert_eq!(*sizes.borrow(), vec![half, half, UVec2::splat(SIZE)]);
    assert_eq!(viewer.camera().target, Vec3::ZERO);
}

#[test]
fn headless_camera_configure_and_listeners() {
    let Some(mut viewer) = viewer(&ViewerOptions::default()) else {
        return;
    };
    viewer.set_volume(ball()).unwrap();

    let changes = Rc::new(RefCell::new(0u32));
    let sink = changes.clone();
    let id = viewer.on_camera_change(move |_| *sink.borrow_mut() += 1);

    viewer.wheel(1.0).unwrap();
    assert_eq!(viewer.controller().regime(), CameraRegime::Interactive);
    assert_eq!(*changes.borrow(), 1);

    let frames = viewer.frames_rendered();
    let config = CameraConfig {
        position: Vec3::new(0.0, 0.0, -3.0),
        ..CameraConfig::default()
    };
    viewer.configure_camera(config).unwrap();
    assert_eq!(viewer.controller().regime(), CameraRegime::Configured);
    assert_eq!(viewer.frames_rendered(), frames + 1);

    // Same configuration again is a no-op
    viewer.configure_camera(config).unwrap();
    assert_eq!(viewer.frames_rendered(), frames + 1);

    assert!(viewer.remove_camera_listener(id));
    viewer.wheel(-1.0).unwrap();
    assert_eq!(*changes.borrow(), 1);
}

#[test]
fn headless_resize_is_debounced() {
    let Some(mut viewer) = viewer(&ViewerOptions::default()) else {
        return;
    };
    viewer.set_volume(ball()).unwrap();

    let start = std::time::Instant::now();
    viewer.request_resize(UVec2::new(50, 40), start);
    viewer.request_resize(UVec2::new(48, 32), start + std::time::Duration::from_millis(50));
    assert!(!viewer.tick(start + std::time::Duration::from_millis(100)).unwrap());
    assert!(viewer.tick(start + std::time::Duration::from_millis(260)).unwrap());
    assert_eq!(viewer.engine().size(), UVec2::new(48, 32));
    assert_eq!(viewer.capture_frame().unwrap().size, UVec2::new(48, 32));
    assert!(viewer.next_deadline().is_none());
}

#[test]
fn headless_invalid_volume_keeps_previous() {
    let Some(mut viewer) = viewer(&ViewerOptions::default()) else {
        return;
    };
    viewer.set_volume(ball()).unwrap();
    let result = viewer.load_volume(vec![1u8; 10], UVec3::new(3, 3, 1), Vec3::ONE);
    assert!(matches!(result, Err(Vol3dError::InvalidDimensions(_))));
    assert_eq!(viewer.scene().volume().unwrap().size(), UVec3::splat(32));
}

#[test]
fn headless_screenshot_writes_png() {
    let Some(mut viewer) = viewer(&ViewerOptions::default()) else {
        return;
    };
    viewer.set_volume(ball()).unwrap();
    let path = std::env::temp_dir().join("vol3d_headless_screenshot.png");
    viewer.save_screenshot(&path).unwrap();
    assert!(path.exists());
    let _ = std::fs::remove_file(&path);
}

#[test]
fn headless_failed_render_rolls_back_throttled_change() {
    let Some(mut viewer) = viewer(&ViewerOptions::default()) else {
        return;
    };
    viewer.set_volume(ball()).unwrap();
    let table = viewer.transfer_table().clone();
    let frames = viewer.frames_rendered();

    // Wider than any texture the device accepts
    assert!(viewer.resize(UVec2::new(1_000_000, 10)).is_err());
    assert_eq!(viewer.frames_rendered(), frames);

    assert!(viewer.apply_throttled(ControlChange::AlphaScale(0.5)).is_err());
    assert_eq!(viewer.params().alpha_scale, 1.0);
    assert!(viewer.scheduler().gate().is_open());

    assert!(viewer.apply_throttled(ControlChange::Peak(100.0)).is_err());
    assert_eq!(viewer.transfer_params().peak, 217.0);
    assert_eq!(viewer.transfer_table(), &table);
    assert!(viewer.scheduler().gate().is_open());

    viewer.resize(UVec2::splat(SIZE)).unwrap();
    assert!(viewer.apply_throttled(ControlChange::AlphaScale(0.5)).unwrap());
    assert_eq!(viewer.params().alpha_scale, 0.5);
    assert_eq!(viewer.frames_rendered(), frames + 2);
}

#[test]
fn headless_throttle_gate_reopens_after_each_frame() {
    let Some(mut viewer) = viewer(&ViewerOptions::default()) else {
        return;
    };
    viewer.set_volume(ball()).unwrap();
    let frames = viewer.frames_rendered();

    // Each admitted change renders before returning, which reopens the gate
    assert!(viewer.apply_throttled(ControlChange::AlphaScale(0.5)).unwrap());
    assert!(viewer.scheduler().gate().is_open());
    assert!(viewer.apply_throttled(ControlChange::AlphaScale(0.25)).unwrap());
    assert!(viewer.scheduler().gate().is_open());
    assert_eq!(viewer.params().alpha_scale, 0.25);
    assert_eq!(viewer.frames_rendered(), frames + 2);
}

#[test]
fn headless_out_of_range_surface_color_is_rejected() {
    let mut options = ViewerOptions::default();
    options.use_surface = true;
    let Some(mut viewer) = viewer(&options) else {
        return;
    };
    viewer.attach_surface(Some(quad())).unwrap();
    let frames = viewer.frames_rendered();

    for color in [Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, -0.5, 0.0), Vec3::splat(f32::NAN)] {
        assert!(matches!(
            viewer.set_surface_color(color),
            Err(Vol3dError::InvalidParameter { name: "surfaceColor", .. })
        ));
    }
    assert_eq!(viewer.scene().surface_color(), Vec3::new(0.0, 1.0, 0.0));
    assert_eq!(viewer.frames_rendered(), frames);

    viewer.set_surface_color(Vec3::new(1.0, 0.5, 0.0)).unwrap();
    assert_eq!(viewer.scene().surface_color(), Vec3::new(1.0, 0.5, 0.0));
}
