use chrono::{TimeZone, Utc};
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

use jarvis_core::status_store::read_status_document;
use jarvis_core::{Error, JobOutcome, JobStatusStore};

fn t(secs: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

#[test]
fn test_register_then_record_outcome() {
    let store = JobStatusStore::in_memory();
    store.register("p", t(0)).unwrap();

    let registered = store.snapshot()["p"].clone();
    assert_eq!(registered.last_outcome, JobOutcome::NeverRun);
    assert_eq!(registered.last_run_at, None);
    assert_eq!(registered.next_run_at, t(0));

    store.record_outcome("p", JobOutcome::Success, "ok", t(60)).unwrap();

    let status = store.snapshot()["p"].clone();
    assert_eq!(status.last_outcome, JobOutcome::Success);
    assert_eq!(status.next_run_at, t(60));
    assert_eq!(status.last_result_summary, "ok");
    assert!(status.last_run_at.is_some());
}

#[test]
fn test_duplicate_registration() {
    let store = JobStatusStore::in_memory();
    store.register("files", t(0)).unwrap();

    assert!(store.register("files", t(0)).is_ok());
    assert!(matches!(
        store.register("files", t(5)),
        Err(Error::DuplicateJob(id)) if id == "files"
    ));
}

#[test]
fn test_record_outcome_for_unknown_job_fails() {
    let store = JobStatusStore::in_memory();
    assert!(store
        .record_outcome("ghost", JobOutcome::Error, "boom", t(1))
        .is_err());
    assert!(store.snapshot().is_empty());
}

#[test]
fn test_document_survives_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state").join("scheduler_status.json");

    {
        let store = JobStatusStore::open(&path);
        store.register("scan_processes", t(0)).unwrap();
        store
            .record_outcome("scan_processes", JobOutcome::Error, "access denied", t(120))
            .unwrap();
    }

    let on_disk = read_status_document(&path).unwrap().unwrap();
    assert_eq!(on_disk["scan_processes"].last_outcome, JobOutcome::Error);
    assert_eq!(on_disk["scan_processes"].last_result_summary, "access denied");

    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\"last_outcome\": \"error\""));

    let reopened = JobStatusStore::open(&path);
    reopened.register("scan_processes", t(500)).unwrap();
    let status = reopened.get("scan_processes").unwrap();
    assert_eq!(status.last_outcome, JobOutcome::Error);
    assert_eq!(status.last_result_summary, "access denied");
    assert_eq!(status.next_run_at, t(500));
}

#[test]
fn test_corrupt_document_starts_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scheduler_status.json");
    fs::write(&path, "{ not json").unwrap();

    assert!(matches!(
        read_status_document(&path),
        Err(Error::StatusDecode { .. })
    ));

    let store = JobStatusStore::open(&path);
    assert!(store.snapshot().is_empty());

    store.register("scan_files", t(0)).unwrap();
    assert!(read_status_document(&path).unwrap().unwrap().contains_key("scan_files"));
}

#[test]
fn test_missing_document_reads_as_none() {
    let dir = tempdir().unwrap();
    assert!(read_status_document(&dir.path().join("absent.json"))
        .unwrap()
        .is_none());
}

#[test]
fn test_readers_never_see_torn_records() {
    let store = Arc::new(JobStatusStore::in_memory());
    store.register("p", t(0)).unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    let status = store.snapshot()["p"].clone();
                    if status.last_outcome == JobOutcome::NeverRun {
                        continue;
                    }
                    // Every write pairs summary "run-N" with next_run_at t(N).
                    let n: i64 = status
                        .last_result_summary
                        .trim_start_matches("run-")
                        .parse()
                        .unwrap();
                    assert_eq!(status.next_run_at, t(n));
                }
            })
        })
        .collect();

    for n in 1..=2000 {
        let outcome = if n % 2 == 0 {
            JobOutcome::Success
        } else {
            JobOutcome::Error
        };
        store
            .record_outcome("p", outcome, &format!("run-{}", n), t(n))
            .unwrap();
    }
    done.store(true, Ordering::Release);

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(store.get("p").unwrap().next_run_at, t(2000));
}
