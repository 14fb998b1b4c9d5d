use glam::{Mat4, Vec2, Vec3, Vec4};
use winit::dpi::PhysicalSize;

pub const VIEW_FOV_RADIANS: f32 = 50.0_f32.to_radians();
pub const VIEW_NEAR: f32 = 0.1;
pub const VIEW_FAR: f32 = 200.0;

/// Perspective camera. The rig derives one of these every frame; the renderer
/// and the gizmo math consume it read-only.
#[derive(Debug, Clone)]
pub struct Camera3D {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera3D {
    pub fn looking_at(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            target,
            up: Vec3::Y,
            fov_y_radians: VIEW_FOV_RADIANS,
            near: VIEW_NEAR,
            far: VIEW_FAR,
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_radians, aspect.max(1e-4), self.near, self.far)
    }

    pub fn view_projection(&self, viewport: PhysicalSize<u32>) -> Mat4 {
        self.projection_matrix(aspect_of(viewport)) * self.view_matrix()
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }

    /// World-space ray through a viewport pixel. Used for gizmo grabs and
    /// drags; `None` for a degenerate viewport.
    pub fn pixel_ray(&self, pixel: Vec2, viewport: PhysicalSize<u32>) -> Option<(Vec3, Vec3)> {
        if viewport.width == 0 || viewport.height == 0 {
            return None;
        }
        let ndc = Vec2::new(
            (2.0 * pixel.x / viewport.width as f32) - 1.0,
            1.0 - (2.0 * pixel.y / viewport.height as f32),
        );
        let inv_view_proj = self.view_projection(viewport).inverse();
        let far_point = inv_view_proj * Vec4::new(ndc.x, ndc.y, 1.0, 1.0);
        if far_point.w.abs() < f32::EPSILON {
            return None;
        }
        let dir = (far_point.truncate() / far_point.w - self.position).normalize_or_zero();
        if dir.length_squared() == 0.0 {
            return None;
        }
        Some((self.position, dir))
    }

    /// Projects a world point back to viewport pixels; `None` when the point
    /// sits behind the camera.
    pub fn world_to_pixel(&self, point: Vec3, viewport: PhysicalSize<u32>) -> Option<Vec2> {
        if viewport.width == 0 || viewport.height == 0 {
            return None;
        }
        let clip = self.view_projection(viewport) * point.extend(1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some(Vec2::new(
            (ndc.x + 1.0) * 0.5 * viewport.width as f32,
            (1.0 - ndc.y) * 0.5 * viewport.height as f32,
        ))
    }
}

fn aspect_of(viewport: PhysicalSize<u32>) -> f32 {
    if viewport.height == 0 {
        1.0
    } else {
        viewport.width as f32 / viewport.height as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_projection_is_finite() {
        let camera = Camera3D::looking_at(Vec3::new(-1.0, 10.0, 10.0), Vec3::ZERO);
        let vp = camera.view_projection(PhysicalSize::new(1280, 720));
        assert!(vp.to_cols_array().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn center_pixel_ray_points_at_target() {
        let camera = Camera3D::looking_at(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO);
        let viewport = PhysicalSize::new(800, 600);
        let (origin, dir) = camera.pixel_ray(Vec2::new(400.0, 300.0), viewport).expect("ray");
        assert!(origin.distance(camera.position) < 1e-4);
        assert!(dir.dot(camera.forward()) > 0.999);
    }

    #[test]
    fn projecting_target_lands_in_viewport_center() {
        let camera = Camera3D::looking_at(Vec3::new(0.0, 2.0, 8.0), Vec3::ZERO);
        let viewport = PhysicalSize::new(640, 480);
        let pixel = camera.world_to_pixel(Vec3::ZERO, viewport).expect("projects");
        assert!((pixel.x - 320.0).abs() < 1.0);
        assert!((pixel.y - 240.0).abs() < 1.0);
    }
}
