use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use jarvis_core::scanner::{ProcessSample, ProcessSource, Skip, SkipReason};
use jarvis_core::service::{ErrorKind, JobStatusResponse, ResponseStatus, ScanService};
use jarvis_core::AppConfig;
use tempfile::TempDir;

const MIB: u64 = 1024 * 1024;

struct FixedSource(Vec<ProcessSample>);

impl ProcessSource for FixedSource {
    fn sample(&self) -> Vec<Result<ProcessSample, Skip>> {
        let mut samples: Vec<_> = self.0.iter().cloned().map(Ok).collect();
        samples.push(Err(Skip::new("pid 1", SkipReason::AccessDenied)));
        samples
    }
}

fn service_in(dir: &Path, folders: Vec<String>) -> ScanService {
    let mut config = AppConfig::default();
    config.scan.folders = folders;
    config.schedule.status_path = dir.join("scheduler_status.json");
    ScanService::new(&config, dir.join("jarvis.log"))
        .with_process_source(Arc::new(FixedSource(Vec::new())))
}

fn sparse_file(path: &Path, size_mb: u64) {
    File::create(path).unwrap().set_len(size_mb * MIB).unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_process_scan_with_nothing_found_is_success() {
    let dir = TempDir::new().unwrap();
    let service = service_in(dir.path(), Vec::new());

    let response = service.run_process_scan(None).await.unwrap();
    assert_eq!(response.status, ResponseStatus::Success);
    assert_eq!(response.message, "No suspicious processes found.");
    assert!(response.processes.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_process_scan_flags_idle_heavy_processes() {
    let dir = TempDir::new().unwrap();
    let source = FixedSource(vec![
        ProcessSample {
            pid: 10,
            name: "idle-cache".to_string(),
            resident_bytes: 500 * MIB,
            cpu_percent: 1.0,
        },
        ProcessSample {
            pid: 11,
            name: "busy-encoder".to_string(),
            resident_bytes: 500 * MIB,
            cpu_percent: 50.0,
        },
    ]);
    let service = service_in(dir.path(), Vec::new()).with_process_source(Arc::new(source));

    let response = service.run_process_scan(Some(300)).await.unwrap();
    assert_eq!(response.message, "1 suspicious process found.");
    assert_eq!(response.processes.len(), 1);
    assert_eq!(response.processes[0].name, "idle-cache");
    assert_eq!(response.processes[0].resident_memory_mb, 500);

    let body = serde_json::to_value(&response).unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["processes"][0]["memory_mb"], 500);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_threshold_below_minimum_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let service = service_in(dir.path(), Vec::new());

    let err = service.run_process_scan(Some(49)).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::BadRequest);
    assert_eq!(err.status_code(), 400);

    let err = service.run_file_scan(Some(99)).await.unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_file_scan_without_valid_folders_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("gone").to_string_lossy().into_owned();
    let service = service_in(dir.path(), vec![missing]);

    let err = service.run_file_scan(None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::BadRequest);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_file_scan_reports_large_files() {
    let dir = TempDir::new().unwrap();
    let media = dir.path().join("media");
    fs::create_dir(&media).unwrap();
    sparse_file(&media.join("small.bin"), 10);
    sparse_file(&media.join("backup.tar"), 250);

    let service = service_in(dir.path(), vec![media.to_string_lossy().into_owned()]);
    let response = service.run_file_scan(Some(100)).await.unwrap();

    assert_eq!(response.status, ResponseStatus::Success);
    assert_eq!(response.message, "1 large file found.");
    assert_eq!(response.files.len(), 1);
    assert!(response.files[0].absolute_path.ends_with("backup.tar"));
    assert_eq!(response.files[0].size_mb, 250);
}

#[test]
fn test_job_status_missing_document_is_reported_not_raised() {
    let dir = TempDir::new().unwrap();
    let service = service_in(dir.path(), Vec::new());

    match service.get_job_status().unwrap() {
        JobStatusResponse::NotAvailable { status, message } => {
            assert_eq!(status, ResponseStatus::Error);
            assert!(message.contains("not found"));
        }
        other => panic!("expected NotAvailable, got {:?}", other),
    }
}

#[test]
fn test_job_status_corrupt_document_is_internal_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("scheduler_status.json"), "{ not json").unwrap();
    let service = service_in(dir.path(), Vec::new());

    let err = service.get_job_status().unwrap_err();
    assert_eq!(err.kind, ErrorKind::Internal);
    assert_eq!(err.status_code(), 500);
}

#[test]
fn test_job_status_reads_persisted_document() {
    let dir = TempDir::new().unwrap();
    let store = jarvis_core::JobStatusStore::open(dir.path().join("scheduler_status.json"));
    store.register("scan_files", chrono::Utc::now()).unwrap();
    let service = service_in(dir.path(), Vec::new());

    match service.get_job_status().unwrap() {
        JobStatusResponse::Available(snapshot) => {
            assert!(snapshot.contains_key("scan_files"));
        }
        other => panic!("expected Available, got {:?}", other),
    }
}

#[test]
fn test_tail_logs_bounds_and_missing_file() {
    let dir = TempDir::new().unwrap();
    let service = service_in(dir.path(), Vec::new());

    assert_eq!(service.tail_logs(0).unwrap_err().kind, ErrorKind::BadRequest);
    assert_eq!(service.tail_logs(1001).unwrap_err().kind, ErrorKind::BadRequest);
    assert_eq!(service.tail_logs(50).unwrap_err().status_code(), 404);

    fs::write(dir.path().join("jarvis.log"), "one\ntwo\nthree\n").unwrap();
    assert_eq!(service.tail_logs(2).unwrap(), "two\nthree\n");
    assert_eq!(service.tail_logs(1000).unwrap(), "one\ntwo\nthree\n");
}
