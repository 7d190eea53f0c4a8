use eframe::egui::{self, Button, Ui};

use crate::api::types::TrainRequest;
use crate::api::{BackendClient, Task};
use crate::jobs::{JobOutcome, JobSender};
use crate::state::{AppState, Stage};

// ---------------------------------------------------------------------------
// Target-selection stage – training configuration and submission
// ---------------------------------------------------------------------------

pub fn target_panel(ui: &mut Ui, state: &mut AppState, jobs: &JobSender, client: &BackendClient) {
    let generation = state.generation;
    let pending = state.pending;
    let Stage::TargetSelection(target) = &mut state.stage else {
        return;
    };

    ui.add_space(8.0);
    ui.heading("Configure Training");
    ui.add_space(8.0);

    ui.label("Dataset file");
    ui.monospace(&target.dataset.filename);
    ui.add_space(8.0);

    ui.label("Target column");
    let selected_text = if target.target.is_empty() {
        "-- Select target --".to_string()
    } else {
        target.target.clone()
    };
    egui::ComboBox::from_id_salt("target_column")
        .selected_text(selected_text)
        .show_ui(ui, |ui: &mut Ui| {
            for col in &target.dataset.columns {
                let dtype = target
                    .dataset
                    .dtypes
                    .get(col)
                    .map(String::as_str)
                    .unwrap_or("?");
                let label = format!("{col} ({dtype})");
                if ui
                    .selectable_label(target.target == *col, label)
                    .clicked()
                {
                    target.target = col.clone();
                }
            }
        });

    ui.add_space(8.0);
    ui.label("Problem type");
    ui.horizontal(|ui: &mut Ui| {
        for task in Task::ALL {
            if ui
                .selectable_label(target.task == task, task.to_string())
                .clicked()
            {
                target.task = task;
            }
        }
    });

    if let Some(msg) = &target.error {
        super::error_box(ui, msg);
    }

    ui.add_space(12.0);
    let mut request: Option<TrainRequest> = None;
    let button_text = if pending.train {
        "Training model…"
    } else {
        "Start training"
    };
    if ui
        .add_enabled(target.can_train(&pending), Button::new(button_text))
        .clicked()
    {
        request = Some(TrainRequest {
            file_id: target.dataset.file_id.clone(),
            target: target.target.clone(),
            task: target.task,
        });
        target.error = None;
    }
    if pending.train {
        super::busy_row(ui, "Training and tuning parameters…");
    }

    if let Some(request) = request {
        state.pending.train = true;
        let client = client.clone();
        jobs.spawn(generation, move || {
            JobOutcome::TrainingFinished(Box::new(client.train(&request)))
        });
    }
}
