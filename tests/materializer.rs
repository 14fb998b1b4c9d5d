use glam::Mat4;
use turntable::material_registry::MaterialRegistry;
use turntable::materializer::{materialize, parse_color, MaterialOverride};
use turntable::mesh::{AssetImport, ImportedMaterial, ImportedTexture, Mesh, MeshNode, TextureBinding};

fn robot_import() -> AssetImport {
    let geometry = Mesh::plane(1.0);
    let node = |name: &str, material: &str| MeshNode {
        name: name.to_string(),
        mesh: geometry.clone(),
        transform: Mat4::IDENTITY,
        material: Some(material.to_string()),
        cast_shadow: false,
        receive_shadow: false,
    };
    let texture = |key: &str| ImportedTexture {
        key: key.to_string(),
        width: 1,
        height: 1,
        data: vec![128, 128, 128, 255],
    };
    let binding = |key: &str| {
        Some(TextureBinding { texture_key: key.to_string(), srgb: false, scale: 1.0 })
    };
    AssetImport {
        nodes: vec![node("head", "M_Robot_Head"), node("tail", "M_Robot_Tail")],
        materials: vec![
            ImportedMaterial {
                name: "M_Robot_Tail".to_string(),
                base_color_factor: [0.9, 0.5, 0.2, 1.0],
                metallic_factor: 0.1,
                roughness_factor: 1.0,
                base_color_texture: None,
                roughness_texture: binding("tex::tail_rough"),
                normal_texture: binding("tex::tail_normal"),
            },
            ImportedMaterial {
                name: "M_Robot_Head".to_string(),
                base_color_factor: [1.0, 1.0, 1.0, 1.0],
                metallic_factor: 0.0,
                roughness_factor: 0.8,
                base_color_texture: None,
                roughness_texture: None,
                normal_texture: binding("tex::head_normal"),
            },
        ],
        textures: vec![
            texture("tex::tail_rough"),
            texture("tex::tail_normal"),
            texture("tex::head_normal"),
        ],
    }
}

fn robot_overrides() -> Vec<MaterialOverride> {
    vec![
        MaterialOverride {
            material: "M_Robot_Tail".to_string(),
            color: Some("#222".to_string()),
            roughness: Some(0.6),
            clear_roughness_map: true,
            normal_scale: Some(4.0),
            clearcoat: None,
        },
        MaterialOverride {
            material: "M_Robot_Head".to_string(),
            color: Some("black".to_string()),
            roughness: Some(0.0),
            clear_roughness_map: false,
            normal_scale: Some(4.0),
            clearcoat: Some(0.1),
        },
    ]
}

#[test]
fn materialization_forces_shadow_flags_and_applies_named_overrides() {
    let mut import = robot_import();
    let mut registry = MaterialRegistry::new();
    materialize(&mut import, &mut registry, &robot_overrides());

    for node in &import.nodes {
        assert!(node.cast_shadow, "node '{}' should cast", node.name);
        assert!(node.receive_shadow, "node '{}' should receive", node.name);
    }

    let tail = registry.definition("M_Robot_Tail").expect("tail registered");
    assert_eq!(tail.base_color_factor, parse_color("#222").expect("hex parses"));
    assert!((tail.roughness_factor - 0.6).abs() < f32::EPSILON);
    assert!(tail.roughness_texture.is_none(), "roughness map cleared");
    assert!((tail.normal_scale - 4.0).abs() < f32::EPSILON);

    let head = registry.definition("M_Robot_Head").expect("head registered");
    assert_eq!(head.base_color_factor, [0.0, 0.0, 0.0, 1.0]);
    assert_eq!(head.roughness_factor, 0.0);
    assert!((head.clearcoat_factor - 0.1).abs() < f32::EPSILON);
    assert!((head.normal_scale - 4.0).abs() < f32::EPSILON);
}

#[test]
fn materializing_twice_reaches_the_same_state() {
    let overrides = robot_overrides();

    let mut once_import = robot_import();
    let mut once_registry = MaterialRegistry::new();
    materialize(&mut once_import, &mut once_registry, &overrides);

    let mut twice_import = robot_import();
    let mut twice_registry = MaterialRegistry::new();
    materialize(&mut twice_import, &mut twice_registry, &overrides);
    materialize(&mut twice_import, &mut twice_registry, &overrides);

    for (a, b) in once_import.nodes.iter().zip(&twice_import.nodes) {
        assert_eq!(a.cast_shadow, b.cast_shadow);
        assert_eq!(a.receive_shadow, b.receive_shadow);
    }
    for name in ["M_Robot_Tail", "M_Robot_Head"] {
        assert_eq!(once_registry.definition(name), twice_registry.definition(name));
    }
}

#[test]
fn missing_override_name_is_skipped_and_leaves_the_rest_untouched() {
    let mut import = robot_import();
    let mut registry = MaterialRegistry::new();
    let mut overrides = robot_overrides();
    overrides.push(MaterialOverride {
        material: "M_Robot_Antenna".to_string(),
        color: Some("#f00".to_string()),
        roughness: Some(0.2),
        clear_roughness_map: true,
        normal_scale: None,
        clearcoat: None,
    });

    materialize(&mut import, &mut registry, &overrides);

    assert!(!registry.has("M_Robot_Antenna"));
    let tail = registry.definition("M_Robot_Tail").expect("tail registered");
    assert!((tail.roughness_factor - 0.6).abs() < f32::EPSILON);
    let head = registry.definition("M_Robot_Head").expect("head registered");
    assert!((head.clearcoat_factor - 0.1).abs() < f32::EPSILON);
}

#[test]
fn nodes_sharing_a_material_observe_one_override() {
    let mut import = robot_import();
    // Second node now references the tail material as well.
    import.nodes[0].material = Some("M_Robot_Tail".to_string());
    let mut registry = MaterialRegistry::new();
    materialize(&mut import, &mut registry, &robot_overrides());

    // Both nodes resolve through the same name, so one definition serves both.
    let tail = registry.definition("M_Robot_Tail").expect("tail registered");
    assert!((tail.roughness_factor - 0.6).abs() < f32::EPSILON);
    for node in &import.nodes {
        assert_eq!(node.material.as_deref(), Some("M_Robot_Tail"));
    }
}
