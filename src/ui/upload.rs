use std::path::PathBuf;

use eframe::egui::Ui;

use crate::api::BackendClient;
use crate::jobs::{JobOutcome, JobSender};
use crate::state::{AppState, Stage};

// ---------------------------------------------------------------------------
// Upload stage – dataset ingestion plus the pre-trained model entry path
// ---------------------------------------------------------------------------

pub fn upload_panel(ui: &mut Ui, state: &mut AppState, jobs: &JobSender, client: &BackendClient) {
    ui.add_space(24.0);
    ui.vertical_centered(|ui: &mut Ui| {
        ui.heading("Random Forest ML Platform");
        ui.label("Upload your dataset to get started");
    });
    ui.add_space(16.0);

    let mut dataset_file: Option<PathBuf> = None;
    let mut model_file: Option<PathBuf> = None;

    ui.group(|ui: &mut Ui| {
        ui.strong("Dataset");
        ui.add_enabled_ui(!state.pending.upload, |ui: &mut Ui| {
            if ui.button("Choose CSV file…").clicked() {
                dataset_file = rfd::FileDialog::new()
                    .set_title("Open dataset")
                    .add_filter("CSV", &["csv"])
                    .pick_file();
            }
        });
        if state.pending.upload {
            super::busy_row(ui, "Uploading and analyzing…");
        }
    });

    ui.add_space(8.0);

    ui.group(|ui: &mut Ui| {
        ui.strong("Already have a trained pipeline?");
        ui.label("Skip training and go straight to prediction.");
        ui.add_enabled_ui(!state.pending.model_upload, |ui: &mut Ui| {
            if ui.button("Upload model artifact…").clicked() {
                model_file = rfd::FileDialog::new()
                    .set_title("Open pipeline artifact")
                    .add_filter("Pipeline", &["pkl", "joblib", "bin"])
                    .pick_file();
            }
        });
        if state.pending.model_upload {
            super::busy_row(ui, "Uploading model…");
        }
    });

    if let Stage::Upload { error: Some(msg) } = &state.stage {
        super::error_box(ui, msg);
    }

    if let Some(path) = dataset_file {
        state.pending.upload = true;
        if let Stage::Upload { error } = &mut state.stage {
            *error = None;
        }
        let client = client.clone();
        jobs.spawn(state.generation, move || {
            JobOutcome::DatasetUploaded(client.upload_dataset(&path))
        });
    }

    if let Some(path) = model_file {
        state.pending.model_upload = true;
        if let Stage::Upload { error } = &mut state.stage {
            *error = None;
        }
        let client = client.clone();
        jobs.spawn(state.generation, move || {
            JobOutcome::ModelUploaded(client.upload_model(&path))
        });
    }
}
