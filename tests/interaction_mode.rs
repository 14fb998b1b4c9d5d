use bevy_ecs::world::World;
use turntable::camera_rig::CameraRig;
use turntable::config::CameraConfig;
use turntable::interaction::{InteractionController, InteractionMode};

fn fixture() -> (InteractionController, CameraRig, World, bevy_ecs::entity::Entity) {
    let mut world = World::new();
    let subject = world.spawn_empty().id();
    let mut controller = InteractionController::new();
    controller.set_subject(Some(subject));
    (controller, CameraRig::new(&CameraConfig::default()), world, subject)
}

#[test]
fn toggle_round_trip_binds_and_releases_the_gizmo() {
    let (mut controller, mut rig, _world, subject) = fixture();
    assert_eq!(controller.mode(), InteractionMode::Navigating);
    assert!(rig.enabled());
    assert_eq!(controller.binding(), None);

    let mode = controller.toggle_mode(&mut rig);
    assert_eq!(mode, InteractionMode::Editing);
    assert!(!rig.enabled());
    assert_eq!(controller.binding(), Some(subject));
    assert!(controller.gizmo_visible());

    let mode = controller.toggle_mode(&mut rig);
    assert_eq!(mode, InteractionMode::Navigating);
    assert!(rig.enabled());
    assert_eq!(controller.binding(), None);
    assert!(!controller.gizmo_visible());
}

#[test]
fn mode_alternates_strictly_and_rig_enabled_is_its_negation() {
    let (mut controller, mut rig, _world, _) = fixture();
    let mut expected_editing = false;
    for _ in 0..101 {
        expected_editing = !expected_editing;
        let mode = controller.toggle_mode(&mut rig);
        assert_eq!(mode == InteractionMode::Editing, expected_editing);
        assert_eq!(rig.enabled(), !(mode == InteractionMode::Editing));
    }
}

#[test]
fn panel_checkbox_semantics_match_toggling() {
    let (mut controller, mut rig, _world, subject) = fixture();
    controller.set_editing(true, &mut rig);
    assert_eq!(controller.mode(), InteractionMode::Editing);
    assert_eq!(controller.binding(), Some(subject));

    // Re-asserting the same state must not disturb the derived flags.
    controller.set_editing(true, &mut rig);
    assert!(!rig.enabled());

    controller.set_editing(false, &mut rig);
    assert!(rig.enabled());
    assert_eq!(controller.binding(), None);
}

#[test]
fn gizmo_stays_hidden_without_a_subject() {
    let mut controller = InteractionController::new();
    let mut rig = CameraRig::new(&CameraConfig::default());
    controller.toggle_mode(&mut rig);
    assert_eq!(controller.mode(), InteractionMode::Editing);
    assert!(!rig.enabled());
    assert!(!controller.gizmo_visible());
}
