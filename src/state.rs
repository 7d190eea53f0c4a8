use std::collections::BTreeMap;

use crate::api::types::{ApiError, PredictResponse, TrainResponse};
use crate::api::{Dataset, Task};
use crate::config::RiskConfig;
use crate::data::simulate::SimulationState;
use crate::data::table::{Row, DISPLAY_WINDOW};
use crate::jobs::{ExplainOutcome, JobMsg, JobOutcome, PredictOutcome};

// ---------------------------------------------------------------------------
// Workflow stages
// ---------------------------------------------------------------------------
//
// One tagged union owned by the top-level state: each variant carries exactly
// the payload its view needs, so a stage can never read a field another stage
// never populated. Transitions happen only on successful completion of the
// external call that feeds the next stage.

/// Target-selection payload: the ingested dataset schema plus the form state.
#[derive(Debug, Clone)]
pub struct TargetStage {
    pub dataset: Dataset,
    /// Selected target column; empty string means none selected yet.
    pub target: String,
    pub task: Task,
    pub error: Option<String>,
}

impl TargetStage {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            target: String::new(),
            task: Task::default(),
            error: None,
        }
    }

    /// The train control is enabled iff a target is chosen and no training
    /// call is pending.
    pub fn can_train(&self, pending: &Pending) -> bool {
        !self.target.is_empty() && !pending.train
    }
}

/// Training-result payload: the trained model plus what prediction needs.
#[derive(Debug, Clone)]
pub struct TrainingStage {
    pub model_id: String,
    pub metrics: BTreeMap<String, f64>,
    /// Sorted descending by importance for display.
    pub feature_importance: Vec<(String, f64)>,
    pub target: String,
    pub task: Task,
    pub file_id: String,
    pub dtypes: BTreeMap<String, String>,
}

/// SHAP-style explainability section of the prediction stage.
#[derive(Debug, Clone, Default)]
pub struct ExplainView {
    pub feature_importance: Vec<(String, f64)>,
    pub plot_png: Option<Vec<u8>>,
    pub plot_error: Option<String>,
}

/// Prediction payload: the model reference, the active prediction result,
/// the windowed row table, and the simulator.
#[derive(Debug, Clone)]
pub struct PredictionStage {
    pub model_id: String,
    /// Dataset the next predict call will run against, if one is known.
    pub file_id: Option<String>,
    pub filename: Option<String>,
    /// Column dtypes captured at ingestion, used to coerce simulated values.
    pub dtypes: BTreeMap<String, String>,
    /// Set once the automatic run on stage entry has been issued.
    pub auto_run_issued: bool,
    /// The single active prediction result; replaced wholesale per call.
    pub result: Option<PredictResponse>,
    pub headers: Vec<String>,
    /// First [`DISPLAY_WINDOW`] parsed rows.
    pub rows: Vec<Row>,
    /// Total parsed rows before windowing.
    pub total_rows: usize,
    /// CSV body fetch failure; the result itself stays valid.
    pub fetch_error: Option<String>,
    pub error: Option<String>,
    pub explain: Option<ExplainView>,
    pub explain_error: Option<String>,
    pub sim: SimulationState,
}

impl PredictionStage {
    pub fn new(
        model_id: String,
        file_id: Option<String>,
        dtypes: BTreeMap<String, String>,
    ) -> Self {
        Self {
            model_id,
            file_id,
            filename: None,
            dtypes,
            auto_run_issued: false,
            result: None,
            headers: Vec::new(),
            rows: Vec::new(),
            total_rows: 0,
            fetch_error: None,
            error: None,
            explain: None,
            explain_error: None,
            sim: SimulationState::default(),
        }
    }

    /// Dtype of a column, for simulate-value coercion.
    pub fn dtype_of(&self, column: &str) -> Option<&str> {
        self.dtypes.get(column).map(String::as_str)
    }
}

/// The workflow state machine.
#[derive(Debug, Clone)]
pub enum Stage {
    Upload { error: Option<String> },
    TargetSelection(TargetStage),
    TrainingResult(TrainingStage),
    Prediction(PredictionStage),
}

/// Copyable discriminant of [`Stage`], for dispatch without borrowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Upload,
    TargetSelection,
    TrainingResult,
    Prediction,
}

impl Stage {
    pub fn kind(&self) -> StageKind {
        match self {
            Stage::Upload { .. } => StageKind::Upload,
            Stage::TargetSelection(_) => StageKind::TargetSelection,
            Stage::TrainingResult(_) => StageKind::TrainingResult,
            Stage::Prediction(_) => StageKind::Prediction,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Stage::Upload { .. } => "Upload dataset",
            Stage::TargetSelection(_) => "Configure training",
            Stage::TrainingResult(_) => "Training result",
            Stage::Prediction(_) => "Predict",
        }
    }
}

/// Per-action in-flight flags. Each disables exactly its triggering control,
/// so every action is at most once in flight while independent actions may
/// overlap.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pending {
    pub upload: bool,
    pub model_upload: bool,
    pub train: bool,
    pub predict: bool,
    pub simulate: bool,
    pub explain: bool,
    pub save_model: bool,
    pub report: bool,
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub stage: Stage,
    pub pending: Pending,
    /// Request generation; bumped on workflow restart. Job messages from an
    /// older generation are discarded instead of applied.
    pub generation: u64,
    pub config: RiskConfig,
    pub show_settings: bool,
    /// Status / error message shown in the top bar.
    pub status_message: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            stage: Stage::Upload { error: None },
            pending: Pending::default(),
            generation: 0,
            config: RiskConfig::default(),
            show_settings: false,
            status_message: None,
        }
    }
}

impl AppState {
    pub fn with_config(config: RiskConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Abandon the current session and return to the upload stage. Bumping
    /// the generation makes any still-running job's response a no-op.
    pub fn restart(&mut self) {
        self.stage = Stage::Upload { error: None };
        self.pending = Pending::default();
        self.generation += 1;
        self.status_message = None;
    }

    /// Apply a finished background job, discarding stale generations.
    pub fn handle_job(&mut self, msg: JobMsg) {
        if msg.generation != self.generation {
            log::info!("Discarding job result from superseded session");
            return;
        }
        match msg.outcome {
            JobOutcome::DatasetUploaded(result) => {
                self.pending.upload = false;
                self.apply_dataset_upload(result);
            }
            JobOutcome::ModelUploaded(result) => {
                self.pending.model_upload = false;
                self.apply_model_upload(result);
            }
            JobOutcome::TrainingFinished(result) => {
                self.pending.train = false;
                self.apply_training(*result);
            }
            JobOutcome::PredictionFinished(result) => {
                self.pending.predict = false;
                self.apply_prediction(*result);
            }
            JobOutcome::SimulationFinished(epoch, result) => {
                self.pending.simulate = false;
                self.apply_simulation(epoch, result);
            }
            JobOutcome::ExplainFinished(result) => {
                self.pending.explain = false;
                self.apply_explain(*result);
            }
            JobOutcome::ModelSaved(result) => {
                self.pending.save_model = false;
                self.status_message = Some(match result {
                    Ok(path) => format!("Pipeline saved to {}", path.display()),
                    Err(err) => format!("Pipeline download failed: {err}"),
                });
            }
            JobOutcome::ReportSaved(result) => {
                self.pending.report = false;
                self.status_message = Some(match result {
                    Ok(path) => format!("Report saved to {}", path.display()),
                    Err(err) => format!("Report generation failed: {err}"),
                });
            }
        }
    }

    // -- Transitions --------------------------------------------------------

    /// Upload → TargetSelection on success; inline error on failure.
    fn apply_dataset_upload(&mut self, result: Result<Dataset, ApiError>) {
        match result {
            Ok(dataset) => {
                log::info!(
                    "Ingested {} with {} columns",
                    dataset.filename,
                    dataset.columns.len()
                );
                self.stage = Stage::TargetSelection(TargetStage::new(dataset));
            }
            Err(err) => {
                if let Stage::Upload { error } = &mut self.stage {
                    *error = Some(err.to_string());
                }
            }
        }
    }

    /// Upload → Prediction directly, when a pre-trained artifact is supplied.
    fn apply_model_upload(&mut self, result: Result<String, ApiError>) {
        match result {
            Ok(model_id) => {
                self.stage =
                    Stage::Prediction(PredictionStage::new(model_id, None, BTreeMap::new()));
            }
            Err(err) => {
                if let Stage::Upload { error } = &mut self.stage {
                    *error = Some(err.to_string());
                }
            }
        }
    }

    /// TargetSelection → TrainingResult on success. Failure keeps the
    /// still-valid dataset reference so the user can retry with another
    /// target or task without re-uploading.
    fn apply_training(&mut self, result: Result<TrainResponse, ApiError>) {
        let Stage::TargetSelection(target_stage) = &mut self.stage else {
            return;
        };
        match result {
            Ok(response) => {
                let training = TrainingStage {
                    model_id: response.model_id,
                    metrics: response.metrics,
                    feature_importance: sorted_importance(response.feature_importance),
                    target: target_stage.target.clone(),
                    task: target_stage.task,
                    file_id: target_stage.dataset.file_id.clone(),
                    dtypes: target_stage.dataset.dtypes.clone(),
                };
                self.stage = Stage::TrainingResult(training);
            }
            Err(err) => target_stage.error = Some(err.to_string()),
        }
    }

    /// TrainingResult → Prediction, carrying the model id plus the training
    /// file id so the stage can auto-run once.
    pub fn enter_prediction(&mut self) {
        let next = match &self.stage {
            Stage::TrainingResult(training) => PredictionStage::new(
                training.model_id.clone(),
                Some(training.file_id.clone()),
                training.dtypes.clone(),
            ),
            _ => return,
        };
        self.stage = Stage::Prediction(next);
    }

    /// Install a new prediction result, superseding the previous one. The
    /// table window holds the first [`DISPLAY_WINDOW`] rows; the simulator is
    /// reset because its selected row belonged to the replaced result.
    fn apply_prediction(&mut self, result: Result<PredictOutcome, ApiError>) {
        let Stage::Prediction(prediction) = &mut self.stage else {
            return;
        };
        match result {
            Ok(outcome) => {
                if let Some(dataset) = outcome.dataset {
                    prediction.filename = Some(dataset.filename);
                    prediction.dtypes = dataset.dtypes;
                }
                prediction.file_id = Some(outcome.file_id);
                prediction.result = Some(outcome.response);
                prediction.error = None;
                prediction.fetch_error = outcome.fetch_error;
                prediction.sim = SimulationState::default();
                prediction.explain = None;
                prediction.explain_error = None;
                match outcome.table {
                    Some(table) => {
                        prediction.headers = table.headers;
                        prediction.total_rows = table.rows.len();
                        prediction.rows = table.rows;
                        prediction.rows.truncate(DISPLAY_WINDOW);
                    }
                    None => {
                        prediction.headers = Vec::new();
                        prediction.rows = Vec::new();
                        prediction.total_rows = 0;
                    }
                }
            }
            Err(err) => prediction.error = Some(err.to_string()),
        }
    }

    /// Apply a simulate response, unless the selection it was issued for has
    /// since been replaced.
    fn apply_simulation(&mut self, epoch: u64, result: Result<f64, ApiError>) {
        if let Stage::Prediction(prediction) = &mut self.stage {
            if prediction.sim.epoch != epoch {
                log::info!("Discarding simulate result for a superseded row selection");
                return;
            }
            match result {
                Ok(value) => prediction.sim.apply_result(value),
                Err(err) => prediction.sim.apply_error(err.to_string()),
            }
        }
    }

    fn apply_explain(&mut self, result: Result<ExplainOutcome, ApiError>) {
        if let Stage::Prediction(prediction) = &mut self.stage {
            match result {
                Ok(outcome) => {
                    prediction.explain_error = None;
                    prediction.explain = Some(ExplainView {
                        feature_importance: sorted_importance(outcome.feature_importance),
                        plot_png: outcome.plot_png,
                        plot_error: outcome.plot_error,
                    });
                }
                Err(err) => prediction.explain_error = Some(err.to_string()),
            }
        }
    }
}

/// Sort an importance map descending by value for charting.
fn sorted_importance(map: BTreeMap<String, f64>) -> Vec<(String, f64)> {
    let mut pairs: Vec<(String, f64)> = map.into_iter().collect();
    pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::parse_prediction_csv;

    fn dataset() -> Dataset {
        serde_json::from_str(
            r#"{
                "file_id": "f1", "filename": "churn.csv",
                "columns": ["Age", "Churn"],
                "dtypes": {"Age": "int64", "Churn": "int64"}
            }"#,
        )
        .unwrap()
    }

    fn train_response() -> TrainResponse {
        serde_json::from_str(
            r#"{
                "model_id": "m1",
                "metrics": {"accuracy": 0.91},
                "feature_importance": {"Age": 0.2, "Tenure": 0.8}
            }"#,
        )
        .unwrap()
    }

    fn msg(generation: u64, outcome: JobOutcome) -> JobMsg {
        JobMsg {
            generation,
            outcome,
        }
    }

    #[test]
    fn upload_success_carries_schema_unchanged() {
        let mut state = AppState::default();
        state.handle_job(msg(0, JobOutcome::DatasetUploaded(Ok(dataset()))));

        let Stage::TargetSelection(target) = &state.stage else {
            panic!("expected target-selection stage");
        };
        assert_eq!(target.dataset.columns, vec!["Age", "Churn"]);
        assert_eq!(target.dataset.dtypes["Age"], "int64");
        assert!(target.target.is_empty());
        assert_eq!(target.task, Task::Classification);
    }

    #[test]
    fn upload_failure_stays_on_upload_with_message() {
        let mut state = AppState::default();
        state.handle_job(msg(
            0,
            JobOutcome::DatasetUploaded(Err(ApiError::Backend(
                "Only CSV files are allowed.".into(),
            ))),
        ));
        let Stage::Upload { error } = &state.stage else {
            panic!("expected upload stage");
        };
        assert_eq!(error.as_deref(), Some("Only CSV files are allowed."));
    }

    #[test]
    fn train_control_disabled_without_target_or_while_pending() {
        let mut state = AppState::default();
        state.handle_job(msg(0, JobOutcome::DatasetUploaded(Ok(dataset()))));
        let Stage::TargetSelection(target) = &mut state.stage else {
            panic!();
        };

        assert!(!target.can_train(&Pending::default()));

        target.target = "Churn".to_string();
        assert!(target.can_train(&Pending::default()));

        let pending = Pending {
            train: true,
            ..Pending::default()
        };
        assert!(!target.can_train(&pending));
    }

    #[test]
    fn training_failure_keeps_dataset_and_reenables() {
        let mut state = AppState::default();
        state.handle_job(msg(0, JobOutcome::DatasetUploaded(Ok(dataset()))));
        if let Stage::TargetSelection(target) = &mut state.stage {
            target.target = "Churn".to_string();
        }
        state.pending.train = true;

        state.handle_job(msg(
            0,
            JobOutcome::TrainingFinished(Box::new(Err(ApiError::Backend("bad target".into())))),
        ));

        assert!(!state.pending.train);
        let Stage::TargetSelection(target) = &state.stage else {
            panic!("dataset reference must survive training failure");
        };
        assert_eq!(target.error.as_deref(), Some("bad target"));
        assert_eq!(target.dataset.file_id, "f1");
        assert!(target.can_train(&state.pending));
    }

    #[test]
    fn training_success_sorts_importance_and_carries_ids_forward() {
        let mut state = AppState::default();
        state.handle_job(msg(0, JobOutcome::DatasetUploaded(Ok(dataset()))));
        if let Stage::TargetSelection(target) = &mut state.stage {
            target.target = "Churn".to_string();
        }
        state.handle_job(msg(
            0,
            JobOutcome::TrainingFinished(Box::new(Ok(train_response()))),
        ));

        let Stage::TrainingResult(training) = &state.stage else {
            panic!("expected training-result stage");
        };
        assert_eq!(training.model_id, "m1");
        assert_eq!(training.feature_importance[0].0, "Tenure");
        assert_eq!(training.file_id, "f1");

        state.enter_prediction();
        let Stage::Prediction(prediction) = &state.stage else {
            panic!("expected prediction stage");
        };
        assert_eq!(prediction.model_id, "m1");
        assert_eq!(prediction.file_id.as_deref(), Some("f1"));
        assert!(!prediction.auto_run_issued);
    }

    #[test]
    fn model_upload_enters_prediction_without_file() {
        let mut state = AppState::default();
        state.handle_job(msg(0, JobOutcome::ModelUploaded(Ok("m9".to_string()))));
        let Stage::Prediction(prediction) = &state.stage else {
            panic!("expected prediction stage");
        };
        assert_eq!(prediction.model_id, "m9");
        assert!(prediction.file_id.is_none());
    }

    fn predict_outcome(rows: usize) -> PredictOutcome {
        let mut text = String::from("Age,prediction\n");
        for i in 0..rows {
            text.push_str(&format!("{i},0.{i}\n"));
        }
        let response: PredictResponse = serde_json::from_str(
            r#"{"predictions": [0.1], "download_url": "/download/r.csv"}"#,
        )
        .unwrap();
        PredictOutcome {
            file_id: "f2".to_string(),
            dataset: None,
            response,
            table: Some(parse_prediction_csv(&text)),
            fetch_error: None,
        }
    }

    fn into_prediction_stage(state: &mut AppState) {
        state.handle_job(msg(0, JobOutcome::ModelUploaded(Ok("m1".to_string()))));
    }

    #[test]
    fn prediction_table_windows_to_twenty_rows() {
        let mut state = AppState::default();
        into_prediction_stage(&mut state);
        state.handle_job(msg(
            0,
            JobOutcome::PredictionFinished(Box::new(Ok(predict_outcome(25)))),
        ));

        let Stage::Prediction(prediction) = &state.stage else {
            panic!();
        };
        assert_eq!(prediction.rows.len(), DISPLAY_WINDOW);
        assert_eq!(prediction.total_rows, 25);
        // Full result stays reachable through the unparsed link.
        assert_eq!(
            prediction.result.as_ref().unwrap().download_url,
            "/download/r.csv"
        );
    }

    #[test]
    fn csv_fetch_failure_keeps_result_valid_with_empty_table() {
        let mut state = AppState::default();
        into_prediction_stage(&mut state);
        let mut outcome = predict_outcome(5);
        outcome.table = None;
        outcome.fetch_error = Some("connection reset".to_string());
        state.handle_job(msg(0, JobOutcome::PredictionFinished(Box::new(Ok(outcome)))));

        let Stage::Prediction(prediction) = &state.stage else {
            panic!();
        };
        assert!(prediction.result.is_some());
        assert!(prediction.rows.is_empty());
        assert_eq!(prediction.fetch_error.as_deref(), Some("connection reset"));
    }

    #[test]
    fn new_prediction_supersedes_previous_result_and_sim() {
        let mut state = AppState::default();
        into_prediction_stage(&mut state);
        state.handle_job(msg(
            0,
            JobOutcome::PredictionFinished(Box::new(Ok(predict_outcome(5)))),
        ));
        if let Stage::Prediction(prediction) = &mut state.stage {
            let row = prediction.rows[0].clone();
            prediction.sim.select(&row);
            prediction.sim.apply_result(0.9);
        }

        state.handle_job(msg(
            0,
            JobOutcome::PredictionFinished(Box::new(Ok(predict_outcome(3)))),
        ));
        let Stage::Prediction(prediction) = &state.stage else {
            panic!();
        };
        assert_eq!(prediction.total_rows, 3);
        assert!(!prediction.sim.is_seeded());
        assert!(prediction.sim.result.is_none());
    }

    #[test]
    fn simulate_result_for_superseded_selection_is_dropped() {
        let mut state = AppState::default();
        into_prediction_stage(&mut state);
        state.handle_job(msg(
            0,
            JobOutcome::PredictionFinished(Box::new(Ok(predict_outcome(5)))),
        ));
        let stale_epoch = if let Stage::Prediction(prediction) = &mut state.stage {
            let first = prediction.rows[0].clone();
            prediction.sim.select(&first);
            let epoch = prediction.sim.epoch;
            let second = prediction.rows[1].clone();
            prediction.sim.select(&second);
            epoch
        } else {
            panic!();
        };

        state.handle_job(msg(0, JobOutcome::SimulationFinished(stale_epoch, Ok(0.9))));
        let current_epoch = {
            let Stage::Prediction(prediction) = &state.stage else {
                panic!();
            };
            assert!(prediction.sim.result.is_none());
            prediction.sim.epoch
        };

        state.handle_job(msg(0, JobOutcome::SimulationFinished(current_epoch, Ok(0.9))));
        let Stage::Prediction(prediction) = &state.stage else {
            panic!();
        };
        assert_eq!(prediction.sim.result, Some(0.9));
    }

    #[test]
    fn stale_generation_messages_are_dropped() {
        let mut state = AppState::default();
        state.restart();
        assert_eq!(state.generation, 1);

        state.handle_job(msg(0, JobOutcome::DatasetUploaded(Ok(dataset()))));
        assert!(matches!(state.stage, Stage::Upload { .. }));

        state.handle_job(msg(1, JobOutcome::DatasetUploaded(Ok(dataset()))));
        assert!(matches!(state.stage, Stage::TargetSelection(_)));
    }

    #[test]
    fn restart_clears_session_and_pending() {
        let mut state = AppState::default();
        into_prediction_stage(&mut state);
        state.pending.predict = true;
        state.restart();
        assert!(matches!(state.stage, Stage::Upload { error: None }));
        assert!(!state.pending.predict);
    }
}
