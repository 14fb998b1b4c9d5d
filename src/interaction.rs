use crate::camera_rig::CameraRig;
use bevy_ecs::prelude::Entity;

/// The two mutually exclusive ways a pointer interacts with the scene. The
/// rig's enabled flag and the gizmo binding are derived from this value and
/// never set independently, so a click can never both orbit the camera and
/// drag the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionMode {
    #[default]
    Navigating,
    Editing,
}

impl InteractionMode {
    pub fn label(self) -> &'static str {
        match self {
            InteractionMode::Navigating => "Navigate",
            InteractionMode::Editing => "Edit",
        }
    }
}

/// Owns the interaction mode and the single optional gizmo binding.
///
/// The binding is a weak reference: the bound entity lives in the scene world
/// and the gizmo only observes and mutates its transform while `Editing`.
#[derive(Default)]
pub struct InteractionController {
    mode: InteractionMode,
    subject: Option<Entity>,
    binding: Option<Entity>,
}

impl InteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn binding(&self) -> Option<Entity> {
        self.binding
    }

    pub fn gizmo_visible(&self) -> bool {
        self.mode == InteractionMode::Editing && self.binding.is_some()
    }

    /// Designates the entity the gizmo attaches to on the next transition. If
    /// the subject changes while already editing (asset arrived late or was
    /// replaced) the live binding follows it.
    pub fn set_subject(&mut self, subject: Option<Entity>) {
        self.subject = subject;
        if self.mode == InteractionMode::Editing {
            self.binding = subject;
        }
    }

    /// Flips the mode. Entering `Editing` disables the rig and binds the
    /// gizmo; entering `Navigating` re-enables the rig and clears the
    /// binding. Total over the two-state domain; no error path.
    pub fn toggle_mode(&mut self, rig: &mut CameraRig) -> InteractionMode {
        self.mode = match self.mode {
            InteractionMode::Navigating => InteractionMode::Editing,
            InteractionMode::Editing => InteractionMode::Navigating,
        };
        match self.mode {
            InteractionMode::Editing => {
                rig.set_enabled(false);
                self.binding = self.subject;
            }
            InteractionMode::Navigating => {
                rig.set_enabled(true);
                self.binding = None;
            }
        }
        self.mode
    }

    /// Absolute form used by the panel checkbox; funnels through
    /// `toggle_mode` so every transition runs the same derivation.
    pub fn set_editing(&mut self, editing: bool, rig: &mut CameraRig) -> InteractionMode {
        if editing != (self.mode == InteractionMode::Editing) {
            self.toggle_mode(rig);
        }
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CameraConfig;
    use bevy_ecs::world::World;

    fn fixture() -> (InteractionController, CameraRig, Entity) {
        let mut world = World::new();
        let subject = world.spawn_empty().id();
        let mut controller = InteractionController::new();
        controller.set_subject(Some(subject));
        (controller, CameraRig::new(&CameraConfig::default()), subject)
    }

    #[test]
    fn toggling_alternates_and_derives_rig_enabled() {
        let (mut controller, mut rig, _) = fixture();
        assert_eq!(controller.mode(), InteractionMode::Navigating);
        for round in 0..6 {
            let mode = controller.toggle_mode(&mut rig);
            let editing = round % 2 == 0;
            assert_eq!(mode == InteractionMode::Editing, editing);
            assert_eq!(rig.enabled(), !editing);
        }
    }

    #[test]
    fn binding_follows_mode() {
        let (mut controller, mut rig, subject) = fixture();
        assert_eq!(controller.binding(), None);
        controller.toggle_mode(&mut rig);
        assert_eq!(controller.binding(), Some(subject));
        assert!(controller.gizmo_visible());
        controller.toggle_mode(&mut rig);
        assert_eq!(controller.binding(), None);
        assert!(!controller.gizmo_visible());
    }

    #[test]
    fn set_editing_is_idempotent_per_state() {
        let (mut controller, mut rig, _) = fixture();
        controller.set_editing(true, &mut rig);
        controller.set_editing(true, &mut rig);
        assert_eq!(controller.mode(), InteractionMode::Editing);
        assert!(!rig.enabled());
        controller.set_editing(false, &mut rig);
        assert_eq!(controller.mode(), InteractionMode::Navigating);
        assert!(rig.enabled());
    }

    #[test]
    fn late_subject_binds_while_editing() {
        let mut world = World::new();
        let mut controller = InteractionController::new();
        let mut rig = CameraRig::new(&CameraConfig::default());
        controller.toggle_mode(&mut rig);
        assert!(!controller.gizmo_visible());
        let subject = world.spawn_empty().id();
        controller.set_subject(Some(subject));
        assert_eq!(controller.binding(), Some(subject));
        assert!(controller.gizmo_visible());
    }
}
