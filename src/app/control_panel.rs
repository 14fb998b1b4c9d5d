use crate::assets::AssetLoadState;
use crate::events::{ControlBus, ControlEvent};
use crate::interaction::InteractionMode;

/// Widget-backed values the panel edits across frames. The panel never
/// touches the controllers; every change goes out as a `ControlEvent`.
pub(crate) struct PanelState {
    pub attach: bool,
    pub min_distance: f32,
}

/// Read-only status the panel displays.
pub(crate) struct PanelStatus {
    pub mode: InteractionMode,
    pub camera_distance: f32,
    pub zoom_factor: f32,
    pub asset_name: String,
    pub asset_state: AssetLoadState,
    pub node_count: usize,
}

pub(crate) fn show(
    ctx: &egui::Context,
    state: &mut PanelState,
    status: &PanelStatus,
    bus: &mut ControlBus,
) {
    egui::SidePanel::left("turntable_panel").default_width(230.0).show(ctx, |ui| {
        ui.heading("Inspect");
        ui.separator();

        if ui.checkbox(&mut state.attach, "Attach gizmo").changed() {
            bus.push(ControlEvent::SetAttach(state.attach));
        }
        ui.label("Tab toggles the gizmo too.");
        ui.separator();

        ui.horizontal(|ui| {
            ui.label("Zoom");
            if ui.button("+").clicked() {
                bus.push(ControlEvent::ZoomIn);
            }
            if ui.button("\u{2212}").clicked() {
                bus.push(ControlEvent::ZoomOut);
            }
            ui.label(format!("{:.2}x", status.zoom_factor));
        });
        ui.horizontal(|ui| {
            ui.label("Min distance");
            let drag = egui::DragValue::new(&mut state.min_distance).speed(0.05).range(0.0..=25.0);
            if ui.add(drag).changed() {
                bus.push(ControlEvent::SetMinDistance(state.min_distance));
            }
        });
        ui.separator();

        ui.label(format!("Mode: {}", status.mode.label()));
        ui.label(format!("Camera distance: {:.2}", status.camera_distance));
        ui.separator();

        ui.label(format!("Asset: {}", status.asset_name));
        ui.label(format!("Status: {}", status.asset_state.label()));
        if status.node_count > 0 {
            ui.label(format!("{} mesh nodes", status.node_count));
        }
    });
}
