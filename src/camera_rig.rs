use crate::camera3d::Camera3D;
use crate::config::CameraConfig;
use crate::wrap_angle;
use glam::{Vec2, Vec3};
use winit::dpi::PhysicalSize;

/// Discrete zoom commands halve or double the zoom factor.
pub const ZOOM_STEP: f32 = 2.0;
pub const DEFAULT_MIN_DISTANCE: f32 = 0.01;

const DEFAULT_POSITION: Vec3 = Vec3::new(-1.0, 10.0, 10.0);
const MIN_ZOOM_FACTOR: f32 = 1.0 / 128.0;
const MAX_ZOOM_FACTOR: f32 = 128.0;
const MAX_RADIUS: f32 = 500.0;
// Radius may never collapse onto the target even with min_distance = 0.
const RADIUS_FLOOR: f32 = 1e-3;
const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;
const SCROLL_DOLLY_BASE: f32 = 0.95;

#[derive(Debug, Clone, Copy)]
struct ZoomAnimation {
    start_radius: f32,
    target_radius: f32,
    elapsed: f32,
    duration: f32,
}

/// Orbit navigation rig around a focus target.
///
/// Owns all camera navigation state: yaw/pitch/radius, the discrete zoom
/// factor, the minimum approach distance, and the enabled flag the
/// interaction controller derives from the current mode. The three
/// disorienting drag behaviours (vertical-drag-to-forward, dolly-to-cursor,
/// infinite dolly) are construction-time constants and stay off.
pub struct CameraRig {
    target: Vec3,
    yaw: f32,
    pitch: f32,
    radius: f32,
    home_radius: f32,
    zoom_factor: f32,
    min_distance: f32,
    enabled: bool,
    orbit_sensitivity: f32,
    zoom_duration: f32,
    zoom_anim: Option<ZoomAnimation>,
    vertical_drag_to_forward: bool,
    dolly_to_cursor: bool,
    infinity_dolly: bool,
}

impl CameraRig {
    pub fn new(config: &CameraConfig) -> Self {
        let offset = DEFAULT_POSITION;
        let radius = offset.length().max(RADIUS_FLOOR);
        let mut rig = Self {
            target: Vec3::ZERO,
            yaw: offset.x.atan2(offset.z),
            pitch: (offset.y / radius).asin().clamp(-PITCH_LIMIT, PITCH_LIMIT),
            radius,
            home_radius: radius,
            zoom_factor: 1.0,
            min_distance: DEFAULT_MIN_DISTANCE,
            enabled: true,
            orbit_sensitivity: config.orbit_sensitivity.max(1e-5),
            zoom_duration: config.zoom_duration_secs.max(0.0),
            zoom_anim: None,
            vertical_drag_to_forward: false,
            dolly_to_cursor: false,
            infinity_dolly: false,
        };
        rig.set_min_distance(config.min_distance);
        rig
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Gates pointer and wheel navigation. Programmatic zoom commands apply
    /// regardless; only the interaction controller should call this.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn zoom_factor(&self) -> f32 {
        self.zoom_factor
    }

    pub fn min_distance(&self) -> f32 {
        self.min_distance
    }

    /// Camera-to-target distance. Never reads below `min_distance`.
    pub fn distance(&self) -> f32 {
        self.radius.max(self.min_distance)
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn vertical_drag_to_forward(&self) -> bool {
        self.vertical_drag_to_forward
    }

    pub fn dolly_to_cursor(&self) -> bool {
        self.dolly_to_cursor
    }

    pub fn infinity_dolly(&self) -> bool {
        self.infinity_dolly
    }

    pub fn zoom_in(&mut self) {
        self.apply_zoom(self.zoom_factor * ZOOM_STEP);
    }

    pub fn zoom_out(&mut self) {
        self.apply_zoom(self.zoom_factor / ZOOM_STEP);
    }

    /// Clamps a continuously-adjusted UI value at the boundary instead of
    /// failing; negative and non-finite inputs are rejected here.
    pub fn set_min_distance(&mut self, min_distance: f32) {
        if !min_distance.is_finite() {
            return;
        }
        self.min_distance = min_distance.max(0.0);
        self.radius = self.clamp_radius(self.radius);
        if let Some(anim) = self.zoom_anim.as_mut() {
            let floor = self.min_distance.max(RADIUS_FLOOR);
            anim.start_radius = anim.start_radius.clamp(floor, MAX_RADIUS);
            anim.target_radius = anim.target_radius.clamp(floor, MAX_RADIUS);
        }
    }

    /// Horizontal drag orbits yaw; vertical drag orbits pitch because
    /// vertical-drag-to-forward stays off.
    pub fn orbit(&mut self, delta: Vec2) {
        if !self.enabled {
            return;
        }
        self.yaw = wrap_angle(self.yaw - delta.x * self.orbit_sensitivity);
        self.pitch = (self.pitch + delta.y * self.orbit_sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Screen-space drag translates the focus target in the camera plane.
    pub fn pan(&mut self, delta: Vec2, viewport: PhysicalSize<u32>) {
        if !self.enabled || viewport.height == 0 {
            return;
        }
        let camera = self.camera();
        let world_per_pixel =
            2.0 * self.distance() * (camera.fov_y_radians * 0.5).tan() / viewport.height as f32;
        let forward = camera.forward();
        let right = forward.cross(camera.up).normalize_or_zero();
        let up = right.cross(forward).normalize_or_zero();
        self.target += (-right * delta.x + up * delta.y) * world_per_pixel;
    }

    /// Wheel dolly along the view axis toward the focus target (dolly-to-cursor
    /// stays off).
    pub fn dolly_scroll(&mut self, scroll: f32) {
        if !self.enabled || scroll == 0.0 {
            return;
        }
        self.zoom_anim = None;
        let floor = if self.infinity_dolly {
            RADIUS_FLOOR
        } else {
            self.min_distance.max(RADIUS_FLOOR)
        };
        self.radius = (self.radius * SCROLL_DOLLY_BASE.powf(scroll)).clamp(floor, MAX_RADIUS);
        self.zoom_factor =
            (self.home_radius / self.radius).clamp(MIN_ZOOM_FACTOR, MAX_ZOOM_FACTOR);
    }

    /// Advances the animated dolly. Monotonic in animation time: calling with
    /// `dt = 0` re-reads the same radius, so re-rendering a frame is free of
    /// side effects.
    pub fn advance(&mut self, dt: f32) {
        let Some(mut anim) = self.zoom_anim else {
            return;
        };
        anim.elapsed = (anim.elapsed + dt.max(0.0)).min(anim.duration);
        let t = if anim.duration <= f32::EPSILON { 1.0 } else { anim.elapsed / anim.duration };
        let eased = t * t * (3.0 - 2.0 * t);
        self.radius = self.clamp_radius(anim.start_radius + (anim.target_radius - anim.start_radius) * eased);
        if anim.elapsed >= anim.duration {
            self.radius = self.clamp_radius(anim.target_radius);
            self.zoom_anim = None;
        } else {
            self.zoom_anim = Some(anim);
        }
    }

    pub fn zoom_animating(&self) -> bool {
        self.zoom_anim.is_some()
    }

    pub fn camera(&self) -> Camera3D {
        Camera3D::looking_at(self.target + self.orbit_offset(), self.target)
    }

    fn orbit_offset(&self) -> Vec3 {
        let (yaw_sin, yaw_cos) = self.yaw.sin_cos();
        let (pitch_sin, pitch_cos) = self.pitch.sin_cos();
        Vec3::new(pitch_cos * yaw_sin, pitch_sin, pitch_cos * yaw_cos) * self.distance()
    }

    /// The zoom factor is the authoritative state; the dolly radius follows it
    /// through the animation, clamped independently so repeated zoom-out at a
    /// large min_distance still keeps the factor an exact power of two.
    fn apply_zoom(&mut self, factor: f32) {
        self.zoom_factor = factor.clamp(MIN_ZOOM_FACTOR, MAX_ZOOM_FACTOR);
        let target_radius = self.clamp_radius(self.home_radius / self.zoom_factor);
        // A new command retargets any in-flight animation from the current radius.
        self.zoom_anim = Some(ZoomAnimation {
            start_radius: self.radius,
            target_radius,
            elapsed: 0.0,
            duration: self.zoom_duration,
        });
    }

    fn clamp_radius(&self, radius: f32) -> f32 {
        radius.clamp(self.min_distance.max(RADIUS_FLOOR), MAX_RADIUS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rig() -> CameraRig {
        CameraRig::new(&CameraConfig::default())
    }

    fn settle(rig: &mut CameraRig) {
        for _ in 0..120 {
            rig.advance(1.0 / 60.0);
        }
    }

    #[test]
    fn zoom_in_then_out_restores_factor() {
        let mut rig = rig();
        let before = rig.zoom_factor();
        rig.zoom_in();
        rig.zoom_out();
        assert!((rig.zoom_factor() - before).abs() < 1e-6);
    }

    #[test]
    fn disabled_rig_ignores_navigation_but_accepts_zoom() {
        let mut rig = rig();
        rig.set_enabled(false);
        let camera_before = rig.camera();
        rig.orbit(Vec2::new(40.0, 25.0));
        rig.pan(Vec2::new(10.0, 10.0), PhysicalSize::new(800, 600));
        rig.dolly_scroll(3.0);
        let camera_after = rig.camera();
        assert!(camera_before.position.distance(camera_after.position) < 1e-6);

        rig.zoom_in();
        settle(&mut rig);
        assert!(rig.distance() < camera_before.position.length());
    }

    #[test]
    fn distance_never_drops_below_min_distance() {
        let mut rig = rig();
        rig.set_min_distance(2.0);
        for _ in 0..20 {
            rig.zoom_in();
            settle(&mut rig);
            assert!(rig.distance() >= 2.0);
        }
        rig.dolly_scroll(400.0);
        assert!(rig.distance() >= 2.0);
    }

    #[test]
    fn negative_min_distance_clamps_to_zero() {
        let mut rig = rig();
        rig.set_min_distance(-5.0);
        assert_eq!(rig.min_distance(), 0.0);
    }

    #[test]
    fn advance_with_zero_dt_is_idempotent() {
        let mut rig = rig();
        rig.zoom_in();
        rig.advance(0.1);
        let mid = rig.distance();
        rig.advance(0.0);
        assert!((rig.distance() - mid).abs() < 1e-6);
    }

    #[test]
    fn new_zoom_command_retargets_in_flight_animation() {
        let mut rig = rig();
        rig.zoom_in();
        rig.advance(0.05);
        rig.zoom_in();
        settle(&mut rig);
        assert!((rig.zoom_factor() - 4.0).abs() < 1e-6);
    }

    #[test]
    fn drag_policy_flags_stay_off() {
        let rig = rig();
        assert!(!rig.vertical_drag_to_forward());
        assert!(!rig.dolly_to_cursor());
        assert!(!rig.infinity_dolly());
    }
}
