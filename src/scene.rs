use crate::camera3d::Camera3D;
use crate::camera_rig::CameraRig;
use crate::interaction::InteractionController;
use crate::mesh::{AssetImport, MeshBounds};
use bevy_ecs::prelude::{Component, Entity, With};
use bevy_ecs::world::World;
use glam::{Mat4, Quat, Vec3};

// Fixed stage values; the inspector is a fixed set, not a scene format.
pub const AMBIENT_INTENSITY: f32 = 0.5;
pub const SUN_POSITION: Vec3 = Vec3::new(2.5, 5.0, 5.0);
pub const SUN_INTENSITY: f32 = 1.5;
pub const SHADOW_FRUSTUM_LEFT: f32 = -5.0;
pub const SHADOW_FRUSTUM_RIGHT: f32 = 5.0;
pub const SHADOW_FRUSTUM_BOTTOM: f32 = -5.0;
pub const SHADOW_FRUSTUM_TOP: f32 = 5.0;
pub const SHADOW_FRUSTUM_NEAR: f32 = 1.0;
pub const SHADOW_FRUSTUM_FAR: f32 = 50.0;
pub const GROUND_SIZE: f32 = 100.0;
pub const GROUND_POSITION: Vec3 = Vec3::new(0.75, 0.0, 1.0);
pub const GROUND_SHADOW_OPACITY: f32 = 0.5;
pub const ASSET_ANCHOR_SCALE: f32 = 3.0;

#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct Transform3D {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform3D {
    pub const IDENTITY: Self =
        Self { translation: Vec3::ZERO, rotation: Quat::IDENTITY, scale: Vec3::ONE };

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Anchor entity the gizmo binds to; carries the editable transform under
/// which every asset node hangs.
#[derive(Component)]
pub struct AssetRoot;

/// One mesh node, fixed relative to the root. `local` already folds in the
/// import hierarchy and the scene anchor.
#[derive(Component, Clone, Copy)]
pub struct AssetNode {
    pub local: Mat4,
}

/// Index into the renderer's uploaded node meshes.
#[derive(Component, Clone, Copy)]
pub struct MeshNodeRef(pub usize);

/// Material by stable name; a shared lookup key, never ownership.
#[derive(Component, Clone)]
pub struct MaterialRef(pub Option<String>);

#[derive(Component, Clone, Copy)]
pub struct ShadowFlags {
    pub cast: bool,
    pub receive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveController {
    Rig,
    Gizmo(Entity),
}

#[derive(Debug, Clone)]
pub struct Lighting {
    pub ambient_intensity: f32,
    pub sun_position: Vec3,
    pub sun_intensity: f32,
    pub shadow_view_proj: Mat4,
}

#[derive(Clone)]
pub struct SceneDrawItem {
    pub node: usize,
    pub model: Mat4,
    pub material: Option<String>,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

#[derive(Clone, Copy)]
pub struct GroundDraw {
    pub model: Mat4,
    pub opacity: f32,
}

#[derive(Clone, Copy)]
pub struct GizmoPlan {
    pub entity: Entity,
    pub origin: Vec3,
}

/// Everything the renderer needs for one frame, assembled fresh from current
/// state. Holds no state of its own; draw order only affects pass grouping.
pub struct ScenePlan {
    pub camera: Camera3D,
    pub lighting: Lighting,
    pub ground: GroundDraw,
    pub draws: Vec<SceneDrawItem>,
    pub active: ActiveController,
    pub gizmo: Option<GizmoPlan>,
}

pub struct SceneWorld {
    world: World,
    asset_root: Option<Entity>,
}

impl SceneWorld {
    pub fn new() -> Self {
        Self { world: World::new(), asset_root: None }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn asset_root(&self) -> Option<Entity> {
        self.asset_root
    }

    /// Spawns the materialized import under the fixed anchor: uniform scale,
    /// bounds centered over the origin, resting on the ground plane. Returns
    /// the root entity the gizmo should use as its subject.
    pub fn spawn_asset(&mut self, import: &AssetImport) -> Entity {
        self.despawn_asset();
        let anchor = anchor_transform(&import.bounds());
        let root = self.world.spawn((Transform3D::IDENTITY, AssetRoot)).id();
        for (index, node) in import.nodes.iter().enumerate() {
            self.world.spawn((
                AssetNode { local: anchor * node.transform },
                MeshNodeRef(index),
                MaterialRef(node.material.clone()),
                ShadowFlags { cast: node.cast_shadow, receive: node.receive_shadow },
            ));
        }
        self.asset_root = Some(root);
        root
    }

    pub fn despawn_asset(&mut self) {
        let stale: Vec<Entity> = {
            let mut nodes = self.world.query_filtered::<Entity, With<AssetNode>>();
            nodes.iter(&self.world).collect()
        };
        for entity in stale {
            self.world.despawn(entity);
        }
        if let Some(root) = self.asset_root.take() {
            self.world.despawn(root);
        }
    }

    /// Pure composition of the current frame. Exactly one controller comes
    /// out active: the gizmo while editing with a live binding, the rig
    /// otherwise.
    pub fn compose(&mut self, interaction: &InteractionController, rig: &CameraRig) -> ScenePlan {
        let root_matrix = self
            .asset_root
            .and_then(|root| self.world.get::<Transform3D>(root))
            .map(|transform| transform.matrix())
            .unwrap_or(Mat4::IDENTITY);
        let root_translation = root_matrix.w_axis.truncate();

        let mut draws = Vec::new();
        let mut nodes =
            self.world.query::<(&AssetNode, &MeshNodeRef, &MaterialRef, &ShadowFlags)>();
        for (node, mesh_ref, material_ref, shadow) in nodes.iter(&self.world) {
            draws.push(SceneDrawItem {
                node: mesh_ref.0,
                model: root_matrix * node.local,
                material: material_ref.0.clone(),
                cast_shadow: shadow.cast,
                receive_shadow: shadow.receive,
            });
        }

        let (active, gizmo) = match interaction.binding() {
            Some(entity) if interaction.gizmo_visible() => (
                ActiveController::Gizmo(entity),
                Some(GizmoPlan { entity, origin: root_translation }),
            ),
            _ => (ActiveController::Rig, None),
        };

        ScenePlan {
            camera: rig.camera(),
            lighting: sun_lighting(),
            ground: GroundDraw {
                model: Mat4::from_translation(GROUND_POSITION),
                opacity: GROUND_SHADOW_OPACITY,
            },
            draws,
            active,
            gizmo,
        }
    }
}

impl Default for SceneWorld {
    fn default() -> Self {
        Self::new()
    }
}

pub fn sun_lighting() -> Lighting {
    Lighting {
        ambient_intensity: AMBIENT_INTENSITY,
        sun_position: SUN_POSITION,
        sun_intensity: SUN_INTENSITY,
        shadow_view_proj: sun_view_projection(),
    }
}

/// Orthographic depth frustum hung off the directional light, aimed at the
/// scene origin like the light itself.
pub fn sun_view_projection() -> Mat4 {
    let projection = Mat4::orthographic_rh(
        SHADOW_FRUSTUM_LEFT,
        SHADOW_FRUSTUM_RIGHT,
        SHADOW_FRUSTUM_BOTTOM,
        SHADOW_FRUSTUM_TOP,
        SHADOW_FRUSTUM_NEAR,
        SHADOW_FRUSTUM_FAR,
    );
    projection * Mat4::look_at_rh(SUN_POSITION, Vec3::ZERO, Vec3::Y)
}

fn anchor_transform(bounds: &MeshBounds) -> Mat4 {
    let scale = ASSET_ANCHOR_SCALE;
    let offset = Vec3::new(
        -bounds.center.x * scale,
        -bounds.min.y * scale,
        -bounds.center.z * scale,
    );
    Mat4::from_translation(offset) * Mat4::from_scale(Vec3::splat(scale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn anchor_centers_and_grounds_bounds() {
        let bounds = MeshBounds {
            min: Vec3::new(-1.0, 2.0, 3.0),
            max: Vec3::new(3.0, 6.0, 7.0),
            center: Vec3::new(1.0, 4.0, 5.0),
            radius: 3.5,
        };
        let anchor = anchor_transform(&bounds);
        let low = anchor.transform_point3(Vec3::new(bounds.center.x, bounds.min.y, bounds.center.z));
        assert!(low.length() < 1e-4);
        let high = anchor.transform_point3(bounds.max);
        assert!((high.y - (bounds.max.y - bounds.min.y) * ASSET_ANCHOR_SCALE).abs() < 1e-4);
    }

    #[test]
    fn sun_frustum_spans_the_fixed_volume() {
        let view_proj = sun_view_projection();
        // The origin sits inside the frustum.
        let clip = view_proj * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0);
        assert!((0.0..=1.0).contains(&ndc.z));
    }
}
