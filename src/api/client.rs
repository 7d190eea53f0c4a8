use std::io::{Read, Write};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::types::{
    ApiError, Dataset, ExplainRequest, ExplainResponse, ModelUploadResponse, PredictRequest,
    PredictResponse, ReportRequest, ReportResponse, SimulateRequest, SimulateResponse,
    TrainRequest, TrainResponse,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(120);
const WRITE_TIMEOUT: Duration = Duration::from_secs(60);

/// Maximum in-memory body size for CSV results and plot images.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Environment variable selecting the backend base URL.
pub const BASE_URL_ENV: &str = "AUTOML_FLOW_BASE_URL";
const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Shared HTTP agent with consistent timeouts.
fn agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .timeout_write(WRITE_TIMEOUT)
            .build()
    })
}

// ---------------------------------------------------------------------------
// Backend client
// ---------------------------------------------------------------------------

/// Thin blocking client over the modeling backend's HTTP API. All calls are
/// issued from worker threads; see `jobs`.
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    /// Build a client from `AUTOML_FLOW_BASE_URL`, defaulting to localhost.
    pub fn from_env() -> Self {
        let base = std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base)
    }

    /// Join a possibly-relative URL (as returned in `download_url` fields)
    /// against the base URL.
    pub fn absolute_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else if url.starts_with('/') {
            format!("{}{url}", self.base_url)
        } else {
            format!("{}/{url}", self.base_url)
        }
    }

    // -- Endpoints ----------------------------------------------------------

    /// Upload a dataset CSV; the backend infers columns and dtypes.
    pub fn upload_dataset(&self, path: &Path) -> Result<Dataset, ApiError> {
        self.upload_file("/upload-csv", path)
    }

    /// Upload a pre-trained pipeline artifact, returning its model id.
    pub fn upload_model(&self, path: &Path) -> Result<String, ApiError> {
        let response: ModelUploadResponse = self.upload_file("/upload-model", path)?;
        Ok(response.model_id)
    }

    pub fn train(&self, request: &TrainRequest) -> Result<TrainResponse, ApiError> {
        self.post_json("/train-model", request)
    }

    pub fn predict(&self, model_id: &str, file_id: &str) -> Result<PredictResponse, ApiError> {
        self.post_json(
            "/predict",
            &PredictRequest {
                model_id: model_id.to_string(),
                file_id: file_id.to_string(),
            },
        )
    }

    pub fn explain(&self, model_id: &str, file_id: &str) -> Result<ExplainResponse, ApiError> {
        self.post_json(
            "/explain",
            &ExplainRequest {
                model_id: model_id.to_string(),
                file_id: file_id.to_string(),
            },
        )
    }

    pub fn simulate(
        &self,
        model_id: &str,
        features: serde_json::Map<String, serde_json::Value>,
    ) -> Result<f64, ApiError> {
        let response: SimulateResponse = self.post_json(
            "/simulate",
            &SimulateRequest {
                model_id: model_id.to_string(),
                features,
            },
        )?;
        Ok(response.prediction)
    }

    /// Request a PDF report; returns the URL to download it from.
    pub fn generate_report(&self, request: &ReportRequest) -> Result<String, ApiError> {
        let response: ReportResponse = self.post_json("/generate-report", request)?;
        Ok(response.download_url)
    }

    /// URL of the trained pipeline artifact for a model id.
    pub fn model_download_url(&self, model_id: &str) -> String {
        format!("{}/download-model/{model_id}", self.base_url)
    }

    // -- Transfers ----------------------------------------------------------

    /// Fetch a text body (the prediction result CSV) into memory, bounded.
    pub fn fetch_text(&self, url: &str) -> Result<String, ApiError> {
        let bytes = self.fetch_bytes(url)?;
        String::from_utf8(bytes).map_err(|err| ApiError::Decode(err.to_string()))
    }

    /// Fetch a binary body (the SHAP summary plot) into memory, bounded.
    pub fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let response = agent().get(&self.absolute_url(url)).call()?;
        read_response_bytes(response, MAX_BODY_BYTES)
    }

    /// Stream a download (model artifact, report PDF) to a local file.
    pub fn download_to_file(&self, url: &str, dest: &Path) -> Result<(), ApiError> {
        let response = agent().get(&self.absolute_url(url)).call()?;
        let mut file = std::fs::File::create(dest)
            .map_err(|err| ApiError::Transport(format!("creating {}: {err}", dest.display())))?;
        copy_response_to_writer(response, &mut file)
    }

    // -- Internals ----------------------------------------------------------

    fn post_json<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: &Req,
    ) -> Result<Resp, ApiError> {
        let url = format!("{}{endpoint}", self.base_url);
        log::debug!("POST {url}");
        let response = agent()
            .post(&url)
            .set("Accept", "application/json")
            .send_json(request)?;
        response
            .into_json::<Resp>()
            .map_err(|err| ApiError::Decode(err.to_string()))
    }

    fn upload_file<Resp: DeserializeOwned>(
        &self,
        endpoint: &str,
        path: &Path,
    ) -> Result<Resp, ApiError> {
        let content = std::fs::read(path)
            .map_err(|err| ApiError::Transport(format!("reading {}: {err}", path.display())))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string());

        let boundary = multipart_boundary();
        let body = encode_multipart(&boundary, "file", &filename, &content);

        let url = format!("{}{endpoint}", self.base_url);
        log::debug!("POST {url} (multipart, {} bytes)", body.len());
        let response = agent()
            .post(&url)
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={boundary}"),
            )
            .send_bytes(&body)?;
        response
            .into_json::<Resp>()
            .map_err(|err| ApiError::Decode(err.to_string()))
    }
}

// ureq 2 has no multipart helper; encode a single-file form body by hand.
fn encode_multipart(boundary: &str, field: &str, filename: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(content.len() + 256);
    let _ = write!(
        body,
        "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    );
    body.extend_from_slice(content);
    let _ = write!(body, "\r\n--{boundary}--\r\n");
    body
}

fn multipart_boundary() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("automl-flow-{nanos:x}")
}

/// Read a response into memory, enforcing a maximum byte size.
fn read_response_bytes(response: ureq::Response, max_bytes: usize) -> Result<Vec<u8>, ApiError> {
    let reader = response.into_reader();
    let mut limited = reader.take(max_bytes as u64 + 1);
    let mut bytes = Vec::new();
    limited
        .read_to_end(&mut bytes)
        .map_err(|err| ApiError::Transport(err.to_string()))?;
    if bytes.len() > max_bytes {
        return Err(ApiError::Decode(format!(
            "Response exceeded {max_bytes} bytes"
        )));
    }
    Ok(bytes)
}

/// Stream a response to a writer, enforcing the same maximum.
fn copy_response_to_writer(
    response: ureq::Response,
    writer: &mut impl Write,
) -> Result<(), ApiError> {
    let reader = response.into_reader();
    let mut limited = reader.take(MAX_BODY_BYTES as u64 + 1);
    let mut total = 0usize;
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = limited
            .read(&mut buf)
            .map_err(|err| ApiError::Transport(err.to_string()))?;
        if read == 0 {
            break;
        }
        total += read;
        if total > MAX_BODY_BYTES {
            return Err(ApiError::Decode(format!(
                "Response exceeded {MAX_BODY_BYTES} bytes"
            )));
        }
        writer
            .write_all(&buf[..read])
            .map_err(|err| ApiError::Transport(err.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    /// Serve a single canned HTTP response and capture the request bytes.
    fn serve_once(response: String) -> (String, std::sync::mpsc::Receiver<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                loop {
                    let read = stream.read(&mut chunk).unwrap_or(0);
                    if read == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..read]);
                    if request_complete(&buf) {
                        break;
                    }
                }
                let _ = tx.send(buf);
                let _ = stream.write_all(response.as_bytes());
            }
        });
        (format!("http://{addr}"), rx)
    }

    /// True once the headers have arrived and the declared body is fully read.
    fn request_complete(buf: &[u8]) -> bool {
        let text = String::from_utf8_lossy(buf);
        let Some(split) = text.find("\r\n\r\n") else {
            return false;
        };
        let headers = &text[..split];
        let body_len = buf.len() - (split + 4);
        let declared = headers
            .lines()
            .find_map(|line| line.strip_prefix("Content-Length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        body_len >= declared
    }

    fn json_response(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        )
    }

    #[test]
    fn predict_decodes_response_and_posts_ids() {
        let body = r#"{"predictions": [0.1, 0.9], "download_url": "/download/result.csv"}"#;
        let (url, rx) = serve_once(json_response(body));

        let client = BackendClient::new(url);
        let response = client.predict("model-1", "file-1").unwrap();
        assert_eq!(response.predictions.len(), 2);
        assert_eq!(response.download_url, "/download/result.csv");

        let request = String::from_utf8(rx.recv().unwrap()).unwrap();
        assert!(request.starts_with("POST /predict"));
        assert!(request.contains(r#""model_id":"model-1""#));
        assert!(request.contains(r#""file_id":"file-1""#));
    }

    #[test]
    fn simulate_returns_prediction_scalar() {
        let (url, _rx) = serve_once(json_response(r#"{"prediction": 0.42}"#));

        let client = BackendClient::new(url);
        let mut features = serde_json::Map::new();
        features.insert("Age".to_string(), serde_json::Value::from(30));
        let prediction = client.simulate("model-1", features).unwrap();
        assert!((prediction - 0.42).abs() < 1e-9);
    }

    #[test]
    fn backend_detail_is_surfaced_from_error_body() {
        let body = r#"{"detail": "Model model-1 not found."}"#;
        let response = format!(
            "HTTP/1.1 404 Not Found\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        let (url, _rx) = serve_once(response);

        let client = BackendClient::new(url);
        let err = client.predict("model-1", "file-1").unwrap_err();
        assert_eq!(err.to_string(), "Model model-1 not found.");
    }

    #[test]
    fn decode_error_on_wrong_shape() {
        let (url, _rx) = serve_once(json_response(r#"{"unrelated": true}"#));

        let client = BackendClient::new(url);
        let err = client.predict("m", "f").unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn upload_sends_multipart_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();

        let body = r#"{
            "file_id": "f1", "filename": "data.csv",
            "columns": ["a", "b"], "dtypes": {"a": "int64", "b": "int64"}
        }"#;
        let (url, rx) = serve_once(json_response(body));

        let client = BackendClient::new(url);
        let dataset = client.upload_dataset(&path).unwrap();
        assert_eq!(dataset.file_id, "f1");

        let request = String::from_utf8(rx.recv().unwrap()).unwrap();
        assert!(request.starts_with("POST /upload-csv"));
        assert!(request.contains("multipart/form-data; boundary="));
        assert!(request.contains("filename=\"data.csv\""));
        assert!(request.contains("a,b\n1,2\n"));
    }

    #[test]
    fn absolute_url_joins_relative_paths() {
        let client = BackendClient::new("http://localhost:8000/");
        assert_eq!(
            client.absolute_url("/download/x.csv"),
            "http://localhost:8000/download/x.csv"
        );
        assert_eq!(
            client.absolute_url("http://other/x.csv"),
            "http://other/x.csv"
        );
    }
}
