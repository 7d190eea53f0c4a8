use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Wire schemas. Every backend body is decoded into one of these; a shape
// mismatch fails the action instead of propagating missing fields.
// ---------------------------------------------------------------------------

/// Schema metadata returned by the dataset upload endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Dataset {
    pub file_id: String,
    pub filename: String,
    pub columns: Vec<String>,
    /// Pandas-style dtype name per column (`int64`, `float64`, `object`, …).
    pub dtypes: BTreeMap<String, String>,
}

/// The learning task requested at training time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    #[default]
    Classification,
    Regression,
}

impl Task {
    pub const ALL: [Task; 2] = [Task::Classification, Task::Regression];
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Classification => write!(f, "classification"),
            Task::Regression => write!(f, "regression"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TrainRequest {
    pub file_id: String,
    pub target: String,
    pub task: Task,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrainResponse {
    pub model_id: String,
    pub metrics: BTreeMap<String, f64>,
    pub feature_importance: BTreeMap<String, f64>,
}

#[derive(Debug, Serialize)]
pub struct PredictRequest {
    pub model_id: String,
    pub file_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictResponse {
    /// Per-row predicted scalars; classification backends may return ints.
    pub predictions: Vec<JsonValue>,
    /// Location of the full result CSV, possibly relative to the base URL.
    pub download_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelUploadResponse {
    pub model_id: String,
}

#[derive(Debug, Serialize)]
pub struct ExplainRequest {
    pub model_id: String,
    pub file_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExplainResponse {
    pub feature_importance: BTreeMap<String, f64>,
    pub summary_plot_url: String,
}

#[derive(Debug, Serialize)]
pub struct SimulateRequest {
    pub model_id: String,
    pub features: serde_json::Map<String, JsonValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulateResponse {
    pub prediction: f64,
}

#[derive(Debug, Serialize)]
pub struct ReportRequest {
    pub model_id: String,
    pub file_id: String,
    pub thresholds: BTreeMap<String, f64>,
    pub recommendations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportResponse {
    pub download_url: String,
}

/// FastAPI-style error body: `{"detail": "..."}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure of a single backend call, scoped to the action that issued it.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server rejected the request with a human-readable detail message.
    #[error("{0}")]
    Backend(String),
    /// The request never produced an HTTP response.
    #[error("Request failed: {0}")]
    Transport(String),
    /// The response arrived but did not match the expected schema.
    #[error("Unexpected response from server: {0}")]
    Decode(String),
}

impl ApiError {
    /// Build an error from a non-2xx response, preferring the server's
    /// `detail` text and falling back to the status code.
    pub fn from_status(code: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(err) => ApiError::Backend(err.detail),
            Err(_) => ApiError::Backend(format!("Server error (HTTP {code})")),
        }
    }
}

impl From<ureq::Error> for ApiError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, response) => {
                let body = response.into_string().unwrap_or_default();
                ApiError::from_status(code, &body)
            }
            ureq::Error::Transport(transport) => ApiError::Transport(transport.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Feature coercion for simulate calls
// ---------------------------------------------------------------------------

/// Coerce an edited feature value back toward the column dtype captured at
/// dataset ingestion. Values whose dtype is integer- or float-like are sent
/// as JSON numbers when they parse; everything else (and anything that fails
/// to parse) is sent as the raw string, leaving rejection to the backend.
pub fn coerce_feature(dtype: Option<&str>, raw: &str) -> JsonValue {
    let trimmed = raw.trim();
    match dtype {
        Some(d) if d.starts_with("int") || d.starts_with("uint") => trimmed
            .parse::<i64>()
            .map(JsonValue::from)
            .unwrap_or_else(|_| JsonValue::from(raw)),
        Some(d) if d.starts_with("float") => trimmed
            .parse::<f64>()
            .map(JsonValue::from)
            .unwrap_or_else(|_| JsonValue::from(raw)),
        Some(d) if d.starts_with("bool") => match trimmed {
            "true" | "True" => JsonValue::from(true),
            "false" | "False" => JsonValue::from(false),
            _ => JsonValue::from(raw),
        },
        _ => JsonValue::from(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_prefers_backend_detail() {
        let err = ApiError::from_status(400, r#"{"detail": "boom"}"#);
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn status_error_falls_back_on_non_json_body() {
        let err = ApiError::from_status(502, "<html>bad gateway</html>");
        assert_eq!(err.to_string(), "Server error (HTTP 502)");
    }

    #[test]
    fn task_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Task::Classification).unwrap(), "\"classification\"");
        assert_eq!(serde_json::to_string(&Task::Regression).unwrap(), "\"regression\"");
    }

    #[test]
    fn upload_response_decodes_schema_fields() {
        let body = r#"{
            "file_id": "abc",
            "filename": "churn.csv",
            "columns": ["Age", "Churn"],
            "dtypes": {"Age": "int64", "Churn": "int64"}
        }"#;
        let dataset: Dataset = serde_json::from_str(body).unwrap();
        assert_eq!(dataset.columns, vec!["Age", "Churn"]);
        assert_eq!(dataset.dtypes["Age"], "int64");
    }

    #[test]
    fn upload_response_rejects_missing_fields() {
        let body = r#"{"file_id": "abc", "filename": "churn.csv"}"#;
        assert!(serde_json::from_str::<Dataset>(body).is_err());
    }

    #[test]
    fn coerce_feature_respects_dtypes() {
        assert_eq!(coerce_feature(Some("int64"), "42"), JsonValue::from(42));
        assert_eq!(coerce_feature(Some("float64"), "0.5"), JsonValue::from(0.5));
        assert_eq!(coerce_feature(Some("object"), "42"), JsonValue::from("42"));
        assert_eq!(coerce_feature(None, "42"), JsonValue::from("42"));
        assert_eq!(coerce_feature(Some("bool"), "True"), JsonValue::from(true));
    }

    #[test]
    fn coerce_feature_keeps_unparsable_values_as_strings() {
        assert_eq!(
            coerce_feature(Some("int64"), "not a number"),
            JsonValue::from("not a number")
        );
    }
}
