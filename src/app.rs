use std::sync::mpsc::Receiver;

use eframe::egui;

use crate::api::BackendClient;
use crate::config::RiskConfig;
use crate::jobs::{self, JobMsg, JobSender};
use crate::state::{AppState, StageKind};
use crate::ui;

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct AutomlFlowApp {
    pub state: AppState,
    client: BackendClient,
    jobs: JobSender,
    job_rx: Receiver<JobMsg>,
}

impl AutomlFlowApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let (jobs, job_rx) = jobs::channel(cc.egui_ctx.clone());
        let client = BackendClient::from_env();
        Self {
            state: AppState::with_config(RiskConfig::load()),
            client,
            jobs,
            job_rx,
        }
    }
}

impl eframe::App for AutomlFlowApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Apply finished background jobs ----
        while let Ok(msg) = self.job_rx.try_recv() {
            self.state.handle_job(msg);
        }

        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui::top_bar(ui, &mut self.state);
        });

        // ---- Central panel: active workflow stage ----
        egui::CentralPanel::default().show(ctx, |ui| match self.state.stage.kind() {
            StageKind::Upload => {
                ui::upload::upload_panel(ui, &mut self.state, &self.jobs, &self.client);
            }
            StageKind::TargetSelection => {
                ui::target::target_panel(ui, &mut self.state, &self.jobs, &self.client);
            }
            StageKind::TrainingResult => {
                ui::training::training_panel(ui, &mut self.state, &self.jobs, &self.client);
            }
            StageKind::Prediction => {
                ui::predict::predict_panel(ui, &mut self.state, &self.jobs, &self.client);
            }
        });

        ui::settings::settings_window(ctx, &mut self.state);
    }
}
