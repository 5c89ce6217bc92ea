//! Request-style operations behind the HTTP surface.
//!
//! Each operation returns a well-formed body or a [`ServiceError`] carrying
//! an HTTP-equivalent status code. An empty scan is a success with a
//! "nothing found" message, never an error.

use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::{AppConfig, ScanSettings};
use crate::error::Error;
use crate::logtail::{self, MAX_TAIL_LINES};
use crate::model::{FileRecord, ProcessRecord, ScanThreshold};
use crate::scanner::{ProcessSource, SysinfoProcessSource};
use crate::scheduler::run_once_now;
use crate::status_store::{read_status_document, StatusSnapshot};
use crate::system::{self, SystemStatus};
use crate::task::{FileScanTask, ProcessScanTask, ScanOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ServiceError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self.kind {
            ErrorKind::BadRequest => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Internal => 500,
        }
    }

    fn from_scan_error(what: &str, err: Error) -> Self {
        if err.is_client_error() {
            warn!("Rejected {} scan request: {}", what, err);
            Self::new(ErrorKind::BadRequest, err.to_string())
        } else {
            error!("Error during {} scan: {}", what, err);
            Self::new(
                ErrorKind::Internal,
                format!("Internal error while scanning {}: {}", what, err),
            )
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessScanResponse {
    pub status: ResponseStatus,
    pub message: String,
    pub processes: Vec<ProcessRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileScanResponse {
    pub status: ResponseStatus,
    pub message: String,
    pub files: Vec<FileRecord>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum JobStatusResponse {
    Available(StatusSnapshot),
    NotAvailable {
        status: ResponseStatus,
        message: String,
    },
}

pub struct ScanService {
    scan: ScanSettings,
    status_path: PathBuf,
    log_path: PathBuf,
    process_source: Arc<dyn ProcessSource>,
}

impl ScanService {
    pub fn new(config: &AppConfig, log_path: impl Into<PathBuf>) -> Self {
        Self {
            scan: config.scan.clone(),
            status_path: config.schedule.status_path.clone(),
            log_path: log_path.into(),
            process_source: Arc::new(SysinfoProcessSource),
        }
    }

    pub fn with_process_source(mut self, source: Arc<dyn ProcessSource>) -> Self {
        self.process_source = source;
        self
    }

    pub async fn run_process_scan(&self, limit_mb: Option<u64>) -> Result<ProcessScanResponse, ServiceError> {
        let limit_mb = limit_mb.unwrap_or(self.scan.process_limit_mb);
        info!("Process scan requested. Limit: {}MB", limit_mb);

        let threshold = ScanThreshold::for_processes(limit_mb)
            .map_err(|e| ServiceError::from_scan_error("processes", e))?;
        let task = ProcessScanTask::with_source(threshold, Arc::clone(&self.process_source));

        match run_once_now(Arc::new(task)).await {
            Ok(ScanOutcome::Processes(findings)) => {
                info!("Process scan: {}", findings.report.message);
                Ok(ProcessScanResponse {
                    status: ResponseStatus::Success,
                    message: findings.report.message,
                    processes: findings.records,
                })
            }
            Ok(_) => Err(ServiceError::new(
                ErrorKind::Internal,
                "Process scan produced an unexpected result",
            )),
            Err(err) => Err(ServiceError::from_scan_error("processes", err)),
        }
    }

    pub async fn run_file_scan(&self, limit_mb: Option<u64>) -> Result<FileScanResponse, ServiceError> {
        let limit_mb = limit_mb.unwrap_or(self.scan.file_limit_mb);
        info!("File scan requested. Limit: {}MB", limit_mb);

        let threshold = ScanThreshold::for_files(limit_mb)
            .map_err(|e| ServiceError::from_scan_error("files", e))?;
        let task = FileScanTask::from_settings(&self.scan, threshold);

        match run_once_now(Arc::new(task)).await {
            Ok(ScanOutcome::Files(findings)) => {
                info!("File scan: {}", findings.report.message);
                Ok(FileScanResponse {
                    status: ResponseStatus::Success,
                    message: findings.report.message,
                    files: findings.records,
                })
            }
            Ok(_) => Err(ServiceError::new(
                ErrorKind::Internal,
                "File scan produced an unexpected result",
            )),
            Err(err) => Err(ServiceError::from_scan_error("files", err)),
        }
    }

    /// Read the scheduler's persisted status document.
    pub fn get_job_status(&self) -> Result<JobStatusResponse, ServiceError> {
        match read_status_document(&self.status_path) {
            Ok(Some(snapshot)) => {
                info!("Read status of {} scheduled jobs", snapshot.len());
                Ok(JobStatusResponse::Available(snapshot))
            }
            Ok(None) => {
                warn!("Status document '{}' not found", self.status_path.display());
                Ok(JobStatusResponse::NotAvailable {
                    status: ResponseStatus::Error,
                    message: format!(
                        "Status document '{}' not found. Is the scheduler running?",
                        self.status_path.display()
                    ),
                })
            }
            Err(err) => {
                error!("Could not read job status: {}", err);
                Err(ServiceError::new(ErrorKind::Internal, err.to_string()))
            }
        }
    }

    pub async fn system_status(&self) -> Result<SystemStatus, ServiceError> {
        tokio::task::spawn_blocking(system::system_status)
            .await
            .map_err(|e| ServiceError::new(ErrorKind::Internal, e.to_string()))
    }

    pub fn tail_logs(&self, lines: usize) -> Result<String, ServiceError> {
        if lines == 0 || lines > MAX_TAIL_LINES {
            return Err(ServiceError::new(
                ErrorKind::BadRequest,
                format!("lines must be between 1 and {}", MAX_TAIL_LINES),
            ));
        }

        match logtail::tail_lines(&self.log_path, lines) {
            Ok(text) => Ok(text),
            Err(Error::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
                warn!("Log file '{}' not found", self.log_path.display());
                Err(ServiceError::new(
                    ErrorKind::NotFound,
                    format!("Log file '{}' not found", self.log_path.display()),
                ))
            }
            Err(err) => {
                error!("Error reading log file '{}': {}", self.log_path.display(), err);
                Err(ServiceError::new(
                    ErrorKind::Internal,
                    format!("Error reading log file: {}", err),
                ))
            }
        }
    }
}
