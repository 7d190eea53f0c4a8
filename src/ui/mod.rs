use eframe::egui::{self, Color32, RichText, Ui};

use crate::state::AppState;

pub mod predict;
pub mod settings;
pub mod simulator;
pub mod target;
pub mod training;
pub mod upload;

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.label(RichText::new("AutoML Flow").strong());
        ui.separator();
        ui.label(state.stage.title());
        ui.separator();

        if ui.button("Start over").clicked() {
            state.restart();
        }
        if ui.button("Settings").clicked() {
            state.show_settings = !state.show_settings;
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::LIGHT_RED));
        }
    });
}

/// Inline error box, scoped to one action's view.
pub fn error_box(ui: &mut Ui, message: &str) {
    ui.add_space(4.0);
    ui.colored_label(Color32::from_rgb(220, 68, 68), message);
}

/// Spinner with a short progress label.
pub fn busy_row(ui: &mut Ui, label: &str) {
    ui.horizontal(|ui: &mut Ui| {
        ui.spinner();
        ui.label(label);
    });
}
