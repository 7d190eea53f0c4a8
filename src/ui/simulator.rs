use eframe::egui::{self, Button, RichText, TextEdit, Ui};

use crate::api::types::coerce_feature;
use crate::color::{risk_color, risk_label};
use crate::config::RiskConfig;
use crate::data::simulate::RiskDirection;
use crate::state::PredictionStage;

use super::predict::PredictAction;

// ---------------------------------------------------------------------------
// What-if simulator – perturb one row's features, compare predictions
// ---------------------------------------------------------------------------

pub fn simulator_section(
    ui: &mut Ui,
    prediction: &mut PredictionStage,
    config: &RiskConfig,
    simulate_pending: bool,
    actions: &mut Vec<PredictAction>,
) {
    if prediction.rows.is_empty() {
        return;
    }

    ui.add_space(12.0);
    ui.strong("What-if simulator");

    if !prediction.sim.is_seeded() {
        ui.label("Select a row in the table (▶) to edit its features.");
        return;
    }

    let original = prediction.sim.original_prediction();
    if let Some(value) = original {
        let bucket = config.classify(value);
        ui.horizontal(|ui: &mut Ui| {
            ui.label("Original prediction:");
            ui.colored_label(risk_color(bucket), format!("{value} ({})", risk_label(bucket)));
        });
    }

    // Edits mutate the feature copy in place; the previous simulate result
    // stands until the next call replaces it.
    let mut edits: Vec<(String, String)> = Vec::new();
    egui::Grid::new("sim_features")
        .num_columns(2)
        .striped(true)
        .show(ui, |ui: &mut Ui| {
            for (name, value) in &prediction.sim.features {
                ui.label(name);
                let mut text = value.clone();
                if ui
                    .add(TextEdit::singleline(&mut text).desired_width(160.0))
                    .changed()
                {
                    edits.push((name.clone(), text));
                }
                ui.end_row();
            }
        });
    for (name, value) in edits {
        prediction.sim.set_feature(&name, value);
    }

    ui.horizontal(|ui: &mut Ui| {
        if ui
            .add_enabled(!simulate_pending, Button::new("Simulate"))
            .clicked()
        {
            let mut features = serde_json::Map::new();
            for (name, value) in &prediction.sim.features {
                features.insert(
                    name.clone(),
                    coerce_feature(prediction.dtype_of(name), value),
                );
            }
            actions.push(PredictAction::Simulate(features));
        }
        if simulate_pending {
            super::busy_row(ui, "Simulating…");
        }
    });

    if let Some(msg) = &prediction.sim.error {
        super::error_box(ui, msg);
    }

    if let Some(result) = prediction.sim.result {
        let bucket = config.classify(result);
        ui.horizontal(|ui: &mut Ui| {
            ui.label("Simulated prediction:");
            ui.colored_label(
                risk_color(bucket),
                format!("{result:.4} ({})", risk_label(bucket)),
            );
        });
        if let Some(delta) = prediction.sim.risk_delta() {
            let color = match delta {
                RiskDirection::Increased => risk_color(crate::config::RiskBucket::High),
                RiskDirection::Decreased => risk_color(crate::config::RiskBucket::Low),
            };
            ui.label(RichText::new(delta.label()).strong().color(color));
        }
        ui.small(config.recommendation(bucket));
    }
}
