use glam::Vec2;
use turntable::camera_rig::{CameraRig, ZOOM_STEP};
use turntable::config::CameraConfig;
use winit::dpi::PhysicalSize;

fn rig() -> CameraRig {
    CameraRig::new(&CameraConfig::default())
}

fn settle(rig: &mut CameraRig) {
    for _ in 0..180 {
        rig.advance(1.0 / 60.0);
    }
}

#[test]
fn zoom_in_then_out_is_an_exact_inverse_on_the_factor() {
    let mut rig = rig();
    let factor_before = rig.zoom_factor();
    let distance_before = {
        settle(&mut rig);
        rig.distance()
    };

    rig.zoom_in();
    settle(&mut rig);
    rig.zoom_out();
    settle(&mut rig);

    assert!((rig.zoom_factor() - factor_before).abs() < 1e-6);
    assert!((rig.distance() - distance_before).abs() < 1e-3);
}

#[test]
fn zoom_steps_multiply_by_the_fixed_step() {
    let mut rig = rig();
    rig.zoom_in();
    assert!((rig.zoom_factor() - ZOOM_STEP).abs() < 1e-6);
    rig.zoom_in();
    assert!((rig.zoom_factor() - ZOOM_STEP * ZOOM_STEP).abs() < 1e-6);
}

#[test]
fn distance_respects_min_distance_through_every_animation_frame() {
    let mut rig = rig();
    rig.set_min_distance(2.0);
    for _ in 0..16 {
        rig.zoom_in();
        for _ in 0..30 {
            rig.advance(1.0 / 60.0);
            assert!(rig.distance() >= 2.0);
        }
    }
    for _ in 0..16 {
        rig.zoom_out();
        for _ in 0..30 {
            rig.advance(1.0 / 60.0);
            assert!(rig.distance() >= 2.0);
        }
    }
}

#[test]
fn scroll_dolly_never_undershoots_min_distance() {
    let mut rig = rig();
    rig.set_min_distance(2.0);
    for _ in 0..50 {
        rig.dolly_scroll(10.0);
        assert!(rig.distance() >= 2.0);
    }
}

#[test]
fn raising_min_distance_pushes_the_camera_out() {
    let mut rig = rig();
    rig.zoom_in();
    rig.zoom_in();
    rig.zoom_in();
    settle(&mut rig);
    let close = rig.distance();
    rig.set_min_distance(close + 3.0);
    assert!(rig.distance() >= close + 3.0);
}

#[test]
fn negative_min_distance_is_clamped_at_the_boundary() {
    let mut rig = rig();
    rig.set_min_distance(-4.0);
    assert_eq!(rig.min_distance(), 0.0);
    rig.set_min_distance(f32::NAN);
    assert_eq!(rig.min_distance(), 0.0);
}

#[test]
fn disabled_rig_ignores_pointer_navigation_but_zooms_programmatically() {
    let mut rig = rig();
    settle(&mut rig);
    rig.set_enabled(false);

    let position_before = rig.camera().position;
    let target_before = rig.target();
    rig.orbit(Vec2::new(120.0, -60.0));
    rig.pan(Vec2::new(30.0, 30.0), PhysicalSize::new(1280, 720));
    rig.dolly_scroll(5.0);
    assert!(rig.camera().position.distance(position_before) < 1e-6);
    assert!(rig.target().distance(target_before) < 1e-6);

    let distance_before = rig.distance();
    rig.zoom_in();
    settle(&mut rig);
    assert!(rig.distance() < distance_before);
}

#[test]
fn pan_translates_target_without_changing_distance() {
    let mut rig = rig();
    settle(&mut rig);
    let distance_before = rig.distance();
    rig.pan(Vec2::new(80.0, -40.0), PhysicalSize::new(1280, 720));
    assert!(rig.target().length() > 1e-4);
    assert!((rig.distance() - distance_before).abs() < 1e-4);
}

#[test]
fn scroll_dolly_keeps_zoom_factor_in_sync() {
    let mut rig = rig();
    settle(&mut rig);
    rig.dolly_scroll(10.0);
    assert!(rig.zoom_factor() > 1.0);
    rig.dolly_scroll(-20.0);
    assert!(rig.zoom_factor() < 1.0);
}
