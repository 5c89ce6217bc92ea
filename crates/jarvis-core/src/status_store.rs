//! Durable record of each scheduled job's last run.
//!
//! The scheduler is the only writer. Readers get a cloned point-in-time
//! snapshot; records are replaced whole under a write lock, so a reader never
//! sees a half-updated record. Every change rewrites a JSON document next to
//! the process (write to a temp file, then rename) so external tools can poll
//! job status without talking to the running process.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    NeverRun,
    Success,
    Error,
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutcome::NeverRun => write!(f, "never_run"),
            JobOutcome::Success => write!(f, "success"),
            JobOutcome::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: String,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: DateTime<Utc>,
    pub last_outcome: JobOutcome,
    pub last_result_summary: String,
}

pub type StatusSnapshot = BTreeMap<String, JobStatus>;

pub struct JobStatusStore {
    path: Option<PathBuf>,
    records: RwLock<StatusSnapshot>,
    registered: Mutex<HashSet<String>>,
    write_lock: Mutex<()>,
}

impl JobStatusStore {
    /// Store without a backing document. Used by tests and one-shot runs.
    pub fn in_memory() -> Self {
        Self::with_records(None, StatusSnapshot::new())
    }

    /// Open the store backed by `path`. A missing or corrupt document is not
    /// fatal: the store starts empty and the next write replaces the file.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = match read_status_document(&path) {
            Ok(Some(records)) => {
                debug!(
                    "Loaded {} job status records from {}",
                    records.len(),
                    path.display()
                );
                records
            }
            Ok(None) => {
                info!("No status document at {}, starting empty", path.display());
                StatusSnapshot::new()
            }
            Err(err) => {
                warn!("Ignoring unreadable status document: {}", err);
                StatusSnapshot::new()
            }
        };
        Self::with_records(Some(path), records)
    }

    fn with_records(path: Option<PathBuf>, records: StatusSnapshot) -> Self {
        Self {
            path,
            records: RwLock::new(records),
            registered: Mutex::new(HashSet::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Register a job for this process lifetime.
    ///
    /// Registering the same id again with the same `next_run_at` is a no-op;
    /// with a different one it fails with [`Error::DuplicateJob`]. A record
    /// left by a previous process keeps its last run fields.
    pub fn register(&self, job_id: &str, next_run_at: DateTime<Utc>) -> Result<(), Error> {
        {
            let mut registered = self
                .registered
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);

            if registered.contains(job_id) {
                let same_schedule = records
                    .get(job_id)
                    .map(|status| status.next_run_at == next_run_at)
                    .unwrap_or(false);
                if same_schedule {
                    return Ok(());
                }
                return Err(Error::DuplicateJob(job_id.to_string()));
            }

            let status = match records.get(job_id) {
                Some(previous) => JobStatus {
                    next_run_at,
                    ..previous.clone()
                },
                None => JobStatus {
                    job_id: job_id.to_string(),
                    last_run_at: None,
                    next_run_at,
                    last_outcome: JobOutcome::NeverRun,
                    last_result_summary: String::new(),
                },
            };
            records.insert(job_id.to_string(), status);
            registered.insert(job_id.to_string());
        }

        debug!("Registered job '{}', next run at {}", job_id, next_run_at);
        self.flush()
    }

    /// Replace the run fields of `job_id` in one step and rewrite the
    /// document.
    ///
    /// The in-memory record is always updated. A failed document write is
    /// returned as [`Error::Persistence`] and retried by the next write, since
    /// every write rewrites the whole document.
    pub fn record_outcome(
        &self,
        job_id: &str,
        outcome: JobOutcome,
        summary: &str,
        next_run_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        self.apply_outcome(job_id, outcome, summary, next_run_at)?;
        self.flush()
    }

    /// In-memory half of [`record_outcome`](Self::record_outcome). Callers
    /// that must not block on disk follow up with [`flush`](Self::flush) on
    /// a blocking thread.
    pub fn apply_outcome(
        &self,
        job_id: &str,
        outcome: JobOutcome,
        summary: &str,
        next_run_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if !records.contains_key(job_id) {
            return Err(Error::Other(format!("Job '{}' is not registered", job_id)));
        }
        records.insert(
            job_id.to_string(),
            JobStatus {
                job_id: job_id.to_string(),
                last_run_at: Some(Utc::now()),
                next_run_at,
                last_outcome: outcome,
                last_result_summary: summary.to_string(),
            },
        );
        Ok(())
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, job_id: &str) -> Option<JobStatus> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_id)
            .cloned()
    }

    /// Rewrite the document from the current records. Writes the file and
    /// syncs it, so this blocks on disk.
    pub fn flush(&self) -> Result<(), Error> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        // Serialises writers so an older snapshot never lands after a newer one.
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = self.snapshot();
        let bytes = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| Error::Persistence(format!("encode failed: {}", e)))?;

        write_atomically(path, &bytes).map_err(|e| {
            Error::Persistence(format!("write to {} failed: {}", path.display(), e))
        })
    }
}

/// Read a persisted status document. `Ok(None)` when it does not exist.
pub fn read_status_document(path: &Path) -> Result<Option<StatusSnapshot>, Error> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(Error::Io(err)),
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| Error::StatusDecode {
            path: path.display().to_string(),
            source,
        })
}

fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    {
        let mut f = File::create(&tmp_path)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp_path, path)
}
