use std::path::PathBuf;

use eframe::egui::{self, Button, RichText, ScrollArea, Ui};
use egui_extras::{Column, TableBuilder};

use crate::api::types::ReportRequest;
use crate::api::BackendClient;
use crate::color::{risk_color, risk_label};
use crate::config::RiskConfig;
use crate::data::table::{parse_prediction_csv, Row};
use crate::jobs::{ExplainOutcome, JobOutcome, JobSender, PredictOutcome};
use crate::state::{AppState, PredictionStage, Stage};

// ---------------------------------------------------------------------------
// Prediction stage – orchestrates predict calls, result table, explain,
// report generation, and hosts the what-if simulator
// ---------------------------------------------------------------------------

/// UI events deferred until the stage borrow ends.
pub(super) enum PredictAction {
    UploadAndPredict(PathBuf),
    Rerun,
    Explain,
    Simulate(serde_json::Map<String, serde_json::Value>),
    Report(PathBuf),
}

pub fn predict_panel(ui: &mut Ui, state: &mut AppState, jobs: &JobSender, client: &BackendClient) {
    let generation = state.generation;
    let pending = state.pending;
    let config = state.config.clone();
    let Stage::Prediction(prediction) = &mut state.stage else {
        return;
    };

    let mut actions: Vec<PredictAction> = Vec::new();

    // Arriving from training with a known file id: run once automatically.
    if !prediction.auto_run_issued {
        prediction.auto_run_issued = true;
        if prediction.file_id.is_some() && !pending.predict {
            actions.push(PredictAction::Rerun);
        }
    }

    ui.add_space(8.0);
    ui.heading("Make Predictions");
    ui.label(format!("Model ID: {}", prediction.model_id));
    ui.add_space(8.0);

    ui.group(|ui: &mut Ui| {
        ui.strong("Production dataset");
        if let Some(filename) = &prediction.filename {
            ui.monospace(filename);
        }
        ui.add_enabled_ui(!pending.predict, |ui: &mut Ui| {
            if ui.button("Upload dataset and predict…").clicked() {
                if let Some(path) = rfd::FileDialog::new()
                    .set_title("Open production dataset")
                    .add_filter("CSV", &["csv"])
                    .pick_file()
                {
                    actions.push(PredictAction::UploadAndPredict(path));
                }
            }
        });
        if pending.predict {
            super::busy_row(ui, "Running predictions…");
        }
        if let Some(msg) = &prediction.error {
            super::error_box(ui, msg);
        }
    });

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            result_section(ui, prediction, &config, client);
            explain_section(ui, prediction, pending.explain, &mut actions);
            report_section(ui, prediction, pending.report, &mut actions);
            super::simulator::simulator_section(ui, prediction, &config, pending.simulate, &mut actions);
        });

    apply_actions(state, jobs, client, generation, actions);
}

fn result_section(
    ui: &mut Ui,
    prediction: &mut PredictionStage,
    config: &RiskConfig,
    client: &BackendClient,
) {
    let Some(result) = &prediction.result else {
        return;
    };

    ui.add_space(12.0);
    ui.horizontal(|ui: &mut Ui| {
        ui.strong("Prediction results");
        ui.hyperlink_to(
            "Download full CSV",
            client.absolute_url(&result.download_url),
        );
    });

    if let Some(msg) = &prediction.fetch_error {
        // The predict call succeeded; only the table body is unavailable.
        ui.label(
            RichText::new(format!(
                "Result table unavailable ({msg}); the download link still works."
            ))
            .color(egui::Color32::from_rgb(230, 160, 30)),
        );
    }

    if prediction.rows.is_empty() {
        return;
    }

    let headers = prediction.headers.clone();
    let mut selected: Option<usize> = None;

    ScrollArea::horizontal()
        .id_salt("result_table")
        .show(ui, |ui: &mut Ui| {
            TableBuilder::new(ui)
                .striped(true)
                .vscroll(false)
                .columns(Column::auto().at_least(40.0), headers.len() + 1)
                .header(20.0, |mut header| {
                    header.col(|ui| {
                        ui.small("what-if");
                    });
                    for name in &headers {
                        header.col(|ui| {
                            ui.strong(name);
                        });
                    }
                })
                .body(|body| {
                    body.rows(18.0, prediction.rows.len(), |mut table_row| {
                        let index = table_row.index();
                        let row = &prediction.rows[index];
                        table_row.col(|ui| {
                            if ui.small_button("▶").clicked() {
                                selected = Some(index);
                            }
                        });
                        for name in &headers {
                            let value = row.get(name).unwrap_or("");
                            table_row.col(|ui| {
                                if Row::is_prediction_column(name) {
                                    match value.trim().parse::<f64>() {
                                        Ok(parsed) => {
                                            let bucket = config.classify(parsed);
                                            ui.colored_label(
                                                risk_color(bucket),
                                                format!("{value} ({})", risk_label(bucket)),
                                            );
                                        }
                                        Err(_) => {
                                            ui.label(value);
                                        }
                                    }
                                } else {
                                    ui.label(value);
                                }
                            });
                        }
                    });
                });
        });

    if prediction.total_rows > prediction.rows.len() {
        ui.small(format!(
            "Showing first {} of {} rows; the download link has them all.",
            prediction.rows.len(),
            prediction.total_rows
        ));
    }

    if let Some(index) = selected {
        let row = prediction.rows[index].clone();
        log::debug!("Simulator seeded from row {index}: {row}");
        prediction.sim.select(&row);
    }
}

fn explain_section(
    ui: &mut Ui,
    prediction: &mut PredictionStage,
    explain_pending: bool,
    actions: &mut Vec<PredictAction>,
) {
    if prediction.result.is_none() {
        return;
    }

    ui.add_space(12.0);
    ui.strong("Explainability");
    let can_explain = !explain_pending && prediction.file_id.is_some();
    ui.horizontal(|ui: &mut Ui| {
        if ui
            .add_enabled(can_explain, Button::new("Explain predictions"))
            .clicked()
        {
            actions.push(PredictAction::Explain);
        }
        if explain_pending {
            super::busy_row(ui, "Computing SHAP values…");
        }
    });

    if let Some(msg) = &prediction.explain_error {
        super::error_box(ui, msg);
    }

    if let Some(explain) = &prediction.explain {
        super::training::importance_chart(ui, "explain_importance", &explain.feature_importance);
        if let Some(bytes) = &explain.plot_png {
            let uri = format!("bytes://shap-summary-{}.png", prediction.model_id);
            ui.add(
                egui::Image::from_bytes(uri, bytes.clone())
                    .max_width(ui.available_width().min(640.0)),
            );
        }
        if let Some(msg) = &explain.plot_error {
            ui.small(format!("Summary plot unavailable: {msg}"));
        }
    }
}

fn report_section(
    ui: &mut Ui,
    prediction: &PredictionStage,
    report_pending: bool,
    actions: &mut Vec<PredictAction>,
) {
    if prediction.result.is_none() {
        return;
    }

    ui.add_space(12.0);
    ui.strong("Report");
    let can_report = !report_pending && prediction.file_id.is_some();
    ui.horizontal(|ui: &mut Ui| {
        if ui
            .add_enabled(can_report, Button::new("Generate PDF report…"))
            .clicked()
        {
            if let Some(dest) = rfd::FileDialog::new()
                .set_title("Save risk report")
                .set_file_name("risk_report.pdf")
                .save_file()
            {
                actions.push(PredictAction::Report(dest));
            }
        }
        if report_pending {
            super::busy_row(ui, "Generating report…");
        }
    });
    ui.small("Uses the thresholds and recommendations from Settings.");
}

fn apply_actions(
    state: &mut AppState,
    jobs: &JobSender,
    client: &BackendClient,
    generation: u64,
    actions: Vec<PredictAction>,
) {
    let config = state.config.clone();
    let Stage::Prediction(prediction) = &mut state.stage else {
        return;
    };
    let model_id = prediction.model_id.clone();
    let file_id = prediction.file_id.clone();
    let sim_epoch = prediction.sim.epoch;

    for action in actions {
        match action {
            PredictAction::UploadAndPredict(path) => {
                state.pending.predict = true;
                let client = client.clone();
                let model_id = model_id.clone();
                jobs.spawn(generation, move || {
                    JobOutcome::PredictionFinished(Box::new(upload_and_predict(
                        &client, &model_id, &path,
                    )))
                });
            }
            PredictAction::Rerun => {
                let Some(file_id) = file_id.clone() else {
                    continue;
                };
                state.pending.predict = true;
                let client = client.clone();
                let model_id = model_id.clone();
                jobs.spawn(generation, move || {
                    JobOutcome::PredictionFinished(Box::new(run_predict(
                        &client, &model_id, &file_id, None,
                    )))
                });
            }
            PredictAction::Explain => {
                let Some(file_id) = file_id.clone() else {
                    continue;
                };
                state.pending.explain = true;
                let client = client.clone();
                let model_id = model_id.clone();
                jobs.spawn(generation, move || {
                    JobOutcome::ExplainFinished(Box::new(run_explain(&client, &model_id, &file_id)))
                });
            }
            PredictAction::Simulate(features) => {
                state.pending.simulate = true;
                let epoch = sim_epoch;
                let client = client.clone();
                let model_id = model_id.clone();
                jobs.spawn(generation, move || {
                    JobOutcome::SimulationFinished(epoch, client.simulate(&model_id, features))
                });
            }
            PredictAction::Report(dest) => {
                let Some(file_id) = file_id.clone() else {
                    continue;
                };
                state.pending.report = true;
                let request = ReportRequest {
                    model_id: model_id.clone(),
                    file_id,
                    thresholds: [
                        ("high".to_string(), config.high_threshold),
                        ("medium".to_string(), config.medium_threshold),
                    ]
                    .into_iter()
                    .collect(),
                    recommendations: [
                        ("high".to_string(), config.rec_high.clone()),
                        ("medium".to_string(), config.rec_medium.clone()),
                        ("low".to_string(), config.rec_low.clone()),
                    ]
                    .into_iter()
                    .collect(),
                };
                let client = client.clone();
                jobs.spawn(generation, move || {
                    let result = client.generate_report(&request).and_then(|url| {
                        client.download_to_file(&url, &dest)?;
                        Ok(dest)
                    });
                    JobOutcome::ReportSaved(result)
                });
            }
        }
    }
}

// -- Worker-side compositions ------------------------------------------------

fn upload_and_predict(
    client: &BackendClient,
    model_id: &str,
    path: &std::path::Path,
) -> Result<PredictOutcome, crate::api::ApiError> {
    let dataset = client.upload_dataset(path)?;
    let file_id = dataset.file_id.clone();
    run_predict(client, model_id, &file_id, Some(dataset))
}

/// Predict, then fetch and parse the result CSV. The fetch is an independent
/// failure domain: its error is recorded next to a still-valid result.
fn run_predict(
    client: &BackendClient,
    model_id: &str,
    file_id: &str,
    dataset: Option<crate::api::Dataset>,
) -> Result<PredictOutcome, crate::api::ApiError> {
    let response = client.predict(model_id, file_id)?;
    let (table, fetch_error) = match client.fetch_text(&response.download_url) {
        Ok(text) => (Some(parse_prediction_csv(&text)), None),
        Err(err) => {
            log::warn!("Result CSV fetch failed: {err}");
            (None, Some(err.to_string()))
        }
    };
    Ok(PredictOutcome {
        file_id: file_id.to_string(),
        dataset,
        response,
        table,
        fetch_error,
    })
}

fn run_explain(
    client: &BackendClient,
    model_id: &str,
    file_id: &str,
) -> Result<ExplainOutcome, crate::api::ApiError> {
    let response = client.explain(model_id, file_id)?;
    let (plot_png, plot_error) = match client.fetch_bytes(&response.summary_plot_url) {
        Ok(bytes) => (Some(bytes), None),
        Err(err) => (None, Some(err.to_string())),
    };
    Ok(ExplainOutcome {
        feature_importance: response.feature_importance,
        plot_png,
        plot_error,
    })
}

