use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use jarvis_core::logtail::DEFAULT_TAIL_LINES;
use jarvis_core::service::{
    ErrorKind, FileScanResponse, JobStatusResponse, ProcessScanResponse, ScanService,
    ServiceError,
};
use jarvis_core::system::SystemStatus;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({ "status": "error", "message": self.0.message });
        (code, Json(body)).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub limit_mb: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default = "default_lines")]
    pub lines: usize,
}

impl ScanRequest {
    /// Parse a scan request body regardless of its content type. An empty
    /// body means "use the configured defaults".
    fn from_body(body: &[u8]) -> Result<Self, ApiError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|err| {
            ApiError(ServiceError {
                kind: ErrorKind::BadRequest,
                message: format!("Invalid request body: {}", err),
            })
        })
    }
}

fn default_lines() -> usize {
    DEFAULT_TAIL_LINES
}

pub fn router(service: Arc<ScanService>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/status", get(system_status))
        .route("/logs", get(logs))
        .route("/scan/processes", post(scan_processes))
        .route("/scan/files", post(scan_files))
        .route("/scheduler/jobs", get(scheduler_jobs))
        .with_state(service)
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(service: ScanService, listen: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(listen).await?;
    info!("API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(Arc::new(service)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    info!("Shutdown requested");
}

async fn root() -> Json<Value> {
    info!("Root endpoint accessed");
    Json(json!({ "message": "Welcome to the Jarvis API, your assistant is online!" }))
}

async fn system_status(
    State(service): State<Arc<ScanService>>,
) -> Result<Json<SystemStatus>, ApiError> {
    Ok(Json(service.system_status().await?))
}

async fn logs(
    State(service): State<Arc<ScanService>>,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query.map_err(|rejection| {
        ApiError(ServiceError {
            kind: ErrorKind::BadRequest,
            message: rejection.body_text(),
        })
    })?;

    let text = service.tail_logs(query.lines)?;
    Ok(Json(json!({ "logs": text })))
}

async fn scan_processes(
    State(service): State<Arc<ScanService>>,
    body: Bytes,
) -> Result<Json<ProcessScanResponse>, ApiError> {
    let request = ScanRequest::from_body(&body)?;
    Ok(Json(service.run_process_scan(request.limit_mb).await?))
}

async fn scan_files(
    State(service): State<Arc<ScanService>>,
    body: Bytes,
) -> Result<Json<FileScanResponse>, ApiError> {
    let request = ScanRequest::from_body(&body)?;
    Ok(Json(service.run_file_scan(request.limit_mb).await?))
}

async fn scheduler_jobs(
    State(service): State<Arc<ScanService>>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    Ok(Json(service.get_job_status()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{self, Body};
    use axum::http::Request;
    use jarvis_core::scanner::{ProcessSample, ProcessSource, Skip};
    use jarvis_core::AppConfig;
    use std::fs;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct NoProcesses;

    impl ProcessSource for NoProcesses {
        fn sample(&self) -> Vec<Result<ProcessSample, Skip>> {
            Vec::new()
        }
    }

    fn app(dir: &TempDir) -> Router {
        let mut config = AppConfig::default();
        config.schedule.status_path = dir.path().join("scheduler_status.json");
        let service = ScanService::new(&config, dir.path().join("jarvis.log"))
            .with_process_source(Arc::new(NoProcesses));
        router(Arc::new(service))
    }

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_root_welcomes() {
        let dir = TempDir::new().unwrap();
        let (status, body) = call(app(&dir), get_request("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].as_str().unwrap().contains("Jarvis"));
    }

    #[tokio::test]
    async fn test_logs_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let (status, body) = call(app(&dir), get_request("/logs?lines=10")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_logs_out_of_range_is_bad_request() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("jarvis.log"), "a\nb\n").unwrap();

        let (status, _) = call(app(&dir), get_request("/logs?lines=0")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) = call(app(&dir), get_request("/logs?lines=abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");

        let (status, body) = call(app(&dir), get_request("/logs?lines=1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["logs"], "b\n");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_process_scan_defaults_when_body_omitted() {
        let dir = TempDir::new().unwrap();
        let request = Request::builder()
            .method("POST")
            .uri("/scan/processes")
            .body(Body::empty())
            .unwrap();

        let (status, body) = call(app(&dir), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["message"], "No suspicious processes found.");
        assert_eq!(body["processes"], json!([]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_scan_validation_errors_are_bad_request() {
        let dir = TempDir::new().unwrap();

        let (status, body) = call(app(&dir), post_json("/scan/processes", r#"{"limit_mb": 10}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");

        let (status, _) = call(app(&dir), post_json("/scan/files", "{}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_scan_body_without_content_type_is_still_parsed() {
        let dir = TempDir::new().unwrap();
        let request = Request::builder()
            .method("POST")
            .uri("/scan/processes")
            .body(Body::from(r#"{"limit_mb": 10}"#))
            .unwrap();

        let (status, body) = call(app(&dir), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().contains("at least 50MB"));
    }

    #[tokio::test]
    async fn test_malformed_scan_body_is_bad_request() {
        let dir = TempDir::new().unwrap();
        let (status, body) = call(app(&dir), post_json("/scan/files", "{limit_mb:")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().starts_with("Invalid request body"));
    }

    #[tokio::test]
    async fn test_jobs_without_document_reports_error_body() {
        let dir = TempDir::new().unwrap();
        let (status, body) = call(app(&dir), get_request("/scheduler/jobs")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "error");
    }
}
