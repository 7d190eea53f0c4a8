use eframe::egui::{self, DragValue, TextEdit, Ui};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Settings window – the persisted risk configuration
// ---------------------------------------------------------------------------

/// Render the settings window. Every committed edit is clamped and written
/// back to disk immediately; last value wins.
pub fn settings_window(ctx: &egui::Context, state: &mut AppState) {
    if !state.show_settings {
        return;
    }
    let mut open = state.show_settings;
    let mut changed = false;

    egui::Window::new("Settings")
        .open(&mut open)
        .resizable(false)
        .show(ctx, |ui: &mut Ui| {
            ui.strong("Risk thresholds");
            egui::Grid::new("threshold_grid")
                .num_columns(2)
                .show(ui, |ui: &mut Ui| {
                    ui.label("High risk ≥");
                    changed |= ui
                        .add(
                            DragValue::new(&mut state.config.high_threshold)
                                .speed(0.01)
                                .range(0.0..=1.0),
                        )
                        .changed();
                    ui.end_row();
                    ui.label("Medium risk ≥");
                    changed |= ui
                        .add(
                            DragValue::new(&mut state.config.medium_threshold)
                                .speed(0.01)
                                .range(0.0..=1.0),
                        )
                        .changed();
                    ui.end_row();
                });

            ui.add_space(8.0);
            ui.strong("Recommendations");
            for (label, text) in [
                ("High", &mut state.config.rec_high),
                ("Medium", &mut state.config.rec_medium),
                ("Low", &mut state.config.rec_low),
            ] {
                ui.label(label);
                changed |= ui
                    .add(TextEdit::multiline(text).desired_rows(2))
                    .changed();
            }
        });

    state.show_settings = open;

    if changed {
        state.config.clamp_thresholds();
        if let Err(err) = state.config.save() {
            log::error!("Failed to persist configuration: {err}");
            state.status_message = Some(format!("Settings not saved: {err}"));
        }
    }
}
