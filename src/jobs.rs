use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender};

use crate::api::types::{ApiError, PredictResponse, TrainResponse};
use crate::api::Dataset;
use crate::data::table::ResultTable;

// ---------------------------------------------------------------------------
// Background jobs
// ---------------------------------------------------------------------------
//
// Every network call runs on its own worker thread and reports back through a
// single mpsc channel drained once per frame. Messages carry the request
// generation captured at spawn time; the UI thread drops anything whose
// generation no longer matches, so a response arriving after the workflow was
// restarted cannot write into a superseded session.

/// Combined result of a predict call plus the follow-up CSV fetch. The two
/// are independent failure domains: `response` may be valid while `table` is
/// absent because the body fetch failed.
#[derive(Debug)]
pub struct PredictOutcome {
    pub file_id: String,
    /// Present when this prediction started from a fresh dataset upload.
    pub dataset: Option<Dataset>,
    pub response: PredictResponse,
    pub table: Option<ResultTable>,
    pub fetch_error: Option<String>,
}

/// Result of an explain call plus the follow-up summary-plot fetch.
#[derive(Debug)]
pub struct ExplainOutcome {
    pub feature_importance: BTreeMap<String, f64>,
    pub plot_png: Option<Vec<u8>>,
    pub plot_error: Option<String>,
}

/// Completion message for any background action.
#[derive(Debug)]
pub enum JobOutcome {
    DatasetUploaded(Result<Dataset, ApiError>),
    ModelUploaded(Result<String, ApiError>),
    TrainingFinished(Box<Result<TrainResponse, ApiError>>),
    PredictionFinished(Box<Result<PredictOutcome, ApiError>>),
    /// Carries the simulator epoch captured at spawn time so a response for
    /// a superseded row selection is dropped instead of applied.
    SimulationFinished(u64, Result<f64, ApiError>),
    ExplainFinished(Box<Result<ExplainOutcome, ApiError>>),
    ModelSaved(Result<PathBuf, ApiError>),
    ReportSaved(Result<PathBuf, ApiError>),
}

#[derive(Debug)]
pub struct JobMsg {
    pub generation: u64,
    pub outcome: JobOutcome,
}

/// Hand-off from worker threads back to the interactive thread.
#[derive(Clone)]
pub struct JobSender {
    tx: Sender<JobMsg>,
    ctx: eframe::egui::Context,
}

impl JobSender {
    /// Run `work` on a worker thread and deliver its outcome tagged with
    /// `generation`, waking the UI when it lands.
    pub fn spawn(&self, generation: u64, work: impl FnOnce() -> JobOutcome + Send + 'static) {
        let tx = self.tx.clone();
        let ctx = self.ctx.clone();
        std::thread::spawn(move || {
            let outcome = work();
            if tx.send(JobMsg { generation, outcome }).is_err() {
                log::debug!("Job finished after the app shut down");
            }
            ctx.request_repaint();
        });
    }
}

/// Create the channel pair used by the app.
pub fn channel(ctx: eframe::egui::Context) -> (JobSender, Receiver<JobMsg>) {
    let (tx, rx) = std::sync::mpsc::channel();
    (JobSender { tx, ctx }, rx)
}
