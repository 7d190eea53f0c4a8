use std::path::PathBuf;

use eframe::egui::{self, Button, RichText, Ui};
use egui_plot::{Bar, BarChart, Plot};

use crate::api::BackendClient;
use crate::color::generate_palette;
use crate::jobs::{JobOutcome, JobSender};
use crate::state::{AppState, Stage};

// ---------------------------------------------------------------------------
// Training-result stage – metrics, feature importance, model download
// ---------------------------------------------------------------------------

pub fn training_panel(ui: &mut Ui, state: &mut AppState, jobs: &JobSender, client: &BackendClient) {
    let generation = state.generation;
    let pending = state.pending;
    let Stage::TrainingResult(training) = &state.stage else {
        return;
    };

    ui.add_space(8.0);
    ui.horizontal(|ui: &mut Ui| {
        ui.heading("Training Complete");
        ui.label(
            RichText::new(training.task.to_string())
                .small()
                .strong()
                .color(egui::Color32::from_rgb(60, 170, 90)),
        );
    });
    ui.label(format!("Model ID: {}", training.model_id));
    ui.label(format!("Target: {}", training.target));
    ui.add_space(8.0);

    ui.strong("Metrics");
    egui::Grid::new("metrics_grid")
        .striped(true)
        .show(ui, |ui: &mut Ui| {
            for (name, value) in &training.metrics {
                ui.label(name);
                ui.monospace(format!("{value:.4}"));
                ui.end_row();
            }
        });

    ui.add_space(8.0);
    ui.strong("Feature importance");
    importance_chart(ui, "training_importance", &training.feature_importance);

    ui.add_space(12.0);
    let mut save_dest: Option<PathBuf> = None;
    let mut go_predict = false;
    ui.horizontal(|ui: &mut Ui| {
        if ui.button("Go to prediction").clicked() {
            go_predict = true;
        }
        if ui
            .add_enabled(!pending.save_model, Button::new("Save pipeline…"))
            .clicked()
        {
            save_dest = rfd::FileDialog::new()
                .set_title("Save pipeline artifact")
                .set_file_name(format!("{}.pkl", training.model_id))
                .save_file();
        }
        if pending.save_model {
            super::busy_row(ui, "Downloading pipeline…");
        }
    });

    if let Some(dest) = save_dest {
        let url = client.model_download_url(&training.model_id);
        state.pending.save_model = true;
        let client = client.clone();
        jobs.spawn(generation, move || {
            let result = client.download_to_file(&url, &dest).map(|()| dest);
            JobOutcome::ModelSaved(result)
        });
    }
    if go_predict {
        state.enter_prediction();
    }
}

/// Horizontal bar chart of sorted feature importances, with a colour legend.
pub fn importance_chart(ui: &mut Ui, id: &str, importance: &[(String, f64)]) {
    if importance.is_empty() {
        ui.label("No importance data.");
        return;
    }
    let palette = generate_palette(importance.len());
    let bars: Vec<Bar> = importance
        .iter()
        .enumerate()
        .map(|(i, (name, value))| {
            // First (most important) feature at the top.
            Bar::new((importance.len() - i) as f64, *value)
                .name(name)
                .fill(palette[i])
        })
        .collect();

    Plot::new(id)
        .height(160.0)
        .allow_drag(false)
        .allow_scroll(false)
        .allow_zoom(false)
        .show_axes([true, false])
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars).horizontal());
        });

    ui.horizontal_wrapped(|ui: &mut Ui| {
        for (i, (name, value)) in importance.iter().enumerate() {
            ui.label(
                RichText::new(format!("{name} ({value:.3})"))
                    .small()
                    .color(palette[i]),
            );
        }
    });
}
