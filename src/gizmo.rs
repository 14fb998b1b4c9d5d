use bevy_ecs::prelude::Entity;
use glam::Vec3;

/// The handle floats one unit above the bound object's origin, matching the
/// asset's head height.
pub(crate) const GIZMO_ANCHOR_OFFSET: Vec3 = Vec3::new(0.0, 1.0, 0.0);
pub(crate) const GIZMO_AXIS_LENGTH: f32 = 1.25;
/// Pixel radius around the projected anchor inside which a press grabs the
/// gizmo instead of being ignored.
pub(crate) const GIZMO_GRAB_RADIUS_PX: f32 = 56.0;

/// An in-flight translate drag. The drag plane faces the camera and is
/// anchored at the object's position when the grab started, so pointer motion
/// maps 1:1 to world motion at the object's depth.
#[derive(Clone, Copy, PartialEq)]
pub(crate) struct GizmoDrag {
    pub entity: Entity,
    pub grab_offset: Vec3,
    pub plane_origin: Vec3,
    pub plane_normal: Vec3,
}

pub(crate) fn intersect_ray_plane(
    origin: Vec3,
    dir: Vec3,
    plane_origin: Vec3,
    plane_normal: Vec3,
) -> Option<Vec3> {
    let denom = dir.dot(plane_normal);
    if denom.abs() < 1e-6 {
        return None;
    }
    let t = (plane_origin - origin).dot(plane_normal) / denom;
    if t < 0.0 {
        return None;
    }
    Some(origin + dir * t)
}

pub(crate) fn begin_drag(
    entity: Entity,
    object_position: Vec3,
    plane_normal: Vec3,
    ray: (Vec3, Vec3),
) -> Option<GizmoDrag> {
    if plane_normal.length_squared() < f32::EPSILON {
        return None;
    }
    let hit = intersect_ray_plane(ray.0, ray.1, object_position, plane_normal)?;
    Some(GizmoDrag {
        entity,
        grab_offset: object_position - hit,
        plane_origin: object_position,
        plane_normal,
    })
}

pub(crate) fn drag_position(drag: &GizmoDrag, ray: (Vec3, Vec3)) -> Option<Vec3> {
    intersect_ray_plane(ray.0, ray.1, drag.plane_origin, drag.plane_normal)
        .map(|hit| hit + drag.grab_offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_ecs::world::World;

    #[test]
    fn ray_hits_facing_plane() {
        let hit = intersect_ray_plane(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z, Vec3::ZERO, Vec3::Z)
            .expect("hit");
        assert!(hit.length() < 1e-6);
    }

    #[test]
    fn ray_misses_parallel_and_behind_planes() {
        assert!(intersect_ray_plane(Vec3::new(0.0, 0.0, 5.0), Vec3::X, Vec3::ZERO, Vec3::Z).is_none());
        assert!(intersect_ray_plane(Vec3::new(0.0, 0.0, 5.0), Vec3::Z, Vec3::ZERO, Vec3::Z).is_none());
    }

    #[test]
    fn drag_preserves_grab_offset() {
        let mut world = World::new();
        let entity = world.spawn_empty().id();
        let object = Vec3::new(1.0, 0.0, 0.0);
        let camera = Vec3::new(0.0, 0.0, 8.0);
        let grab_ray = (camera, (Vec3::new(1.5, 0.5, 0.0) - camera).normalize());
        let drag = begin_drag(entity, object, Vec3::Z, grab_ray).expect("grab");

        // Dragging back through the same ray lands the object where it started.
        let position = drag_position(&drag, grab_ray).expect("drag");
        assert!(position.distance(object) < 1e-5);
    }
}
