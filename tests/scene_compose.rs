use glam::{Mat4, Vec3};
use turntable::camera_rig::CameraRig;
use turntable::config::CameraConfig;
use turntable::interaction::InteractionController;
use turntable::material_registry::MaterialRegistry;
use turntable::materializer::{materialize, MaterialOverride};
use turntable::mesh::{AssetImport, ImportedMaterial, Mesh, MeshNode};
use turntable::scene::{
    ActiveController, SceneWorld, Transform3D, AMBIENT_INTENSITY, GROUND_POSITION,
    GROUND_SHADOW_OPACITY, SUN_INTENSITY, SUN_POSITION,
};

fn small_import() -> AssetImport {
    let geometry = Mesh::plane(2.0);
    let node = |name: &str| MeshNode {
        name: name.to_string(),
        mesh: geometry.clone(),
        transform: Mat4::IDENTITY,
        material: Some("M_Body".to_string()),
        cast_shadow: false,
        receive_shadow: false,
    };
    AssetImport {
        nodes: vec![node("head"), node("tail")],
        materials: vec![ImportedMaterial {
            name: "M_Body".to_string(),
            base_color_factor: [1.0, 1.0, 1.0, 1.0],
            metallic_factor: 0.0,
            roughness_factor: 1.0,
            base_color_texture: None,
            roughness_texture: None,
            normal_texture: None,
        }],
        textures: Vec::new(),
    }
}

fn materialized_scene() -> (SceneWorld, InteractionController, CameraRig) {
    let mut import = small_import();
    let mut registry = MaterialRegistry::new();
    materialize(&mut import, &mut registry, &Vec::<MaterialOverride>::new());

    let mut scene = SceneWorld::new();
    let root = scene.spawn_asset(&import);
    let mut interaction = InteractionController::new();
    interaction.set_subject(Some(root));
    (scene, interaction, CameraRig::new(&CameraConfig::default()))
}

#[test]
fn exactly_one_controller_is_active_per_frame() {
    let (mut scene, mut interaction, mut rig) = materialized_scene();

    let plan = scene.compose(&interaction, &rig);
    assert_eq!(plan.active, ActiveController::Rig);
    assert!(plan.gizmo.is_none());

    interaction.toggle_mode(&mut rig);
    let plan = scene.compose(&interaction, &rig);
    let root = scene.asset_root().expect("asset spawned");
    assert_eq!(plan.active, ActiveController::Gizmo(root));
    assert!(plan.gizmo.is_some());
    assert!(!rig.enabled());

    interaction.toggle_mode(&mut rig);
    let plan = scene.compose(&interaction, &rig);
    assert_eq!(plan.active, ActiveController::Rig);
    assert!(plan.gizmo.is_none());
    assert!(rig.enabled());
}

#[test]
fn draws_carry_materialized_shadow_flags_and_material_names() {
    let (mut scene, interaction, rig) = materialized_scene();
    let plan = scene.compose(&interaction, &rig);

    assert_eq!(plan.draws.len(), 2);
    for draw in &plan.draws {
        assert!(draw.cast_shadow);
        assert!(draw.receive_shadow);
        assert_eq!(draw.material.as_deref(), Some("M_Body"));
    }
}

#[test]
fn ground_is_a_pure_shadow_receiver_outside_the_caster_list() {
    let (mut scene, interaction, rig) = materialized_scene();
    let plan = scene.compose(&interaction, &rig);

    let ground_translation = plan.ground.model.w_axis.truncate();
    assert!(ground_translation.distance(GROUND_POSITION) < 1e-6);
    assert_eq!(plan.ground.opacity, GROUND_SHADOW_OPACITY);
    // Casters are drawn from the node list only; the ground is not in it.
    assert!(plan.draws.iter().all(|draw| draw.node < 2));
}

#[test]
fn fixed_lighting_matches_the_stage_constants() {
    let (mut scene, interaction, rig) = materialized_scene();
    let plan = scene.compose(&interaction, &rig);

    assert_eq!(plan.lighting.ambient_intensity, AMBIENT_INTENSITY);
    assert_eq!(plan.lighting.sun_intensity, SUN_INTENSITY);
    assert!(plan.lighting.sun_position.distance(SUN_POSITION) < 1e-6);
}

#[test]
fn moving_the_root_moves_every_draw_and_the_gizmo_anchor() {
    let (mut scene, mut interaction, mut rig) = materialized_scene();
    interaction.toggle_mode(&mut rig);
    let root = scene.asset_root().expect("asset spawned");

    let before = scene.compose(&interaction, &rig);
    let offset = Vec3::new(2.0, 0.5, -1.0);
    scene
        .world_mut()
        .get_mut::<Transform3D>(root)
        .expect("root transform")
        .translation = offset;
    let after = scene.compose(&interaction, &rig);

    for (a, b) in before.draws.iter().zip(&after.draws) {
        let shift = b.model.w_axis.truncate() - a.model.w_axis.truncate();
        assert!(shift.distance(offset) < 1e-5);
    }
    let gizmo = after.gizmo.expect("gizmo planned while editing");
    assert!(gizmo.origin.distance(offset) < 1e-5);
}

#[test]
fn asset_rests_on_the_ground_plane() {
    let (mut scene, interaction, rig) = materialized_scene();
    let plan = scene.compose(&interaction, &rig);
    // The flat test geometry sits at y = 0; the anchor must keep it there.
    for draw in &plan.draws {
        let lowest = draw.model.transform_point3(Vec3::ZERO).y;
        assert!(lowest.abs() < 1e-4);
    }
}
