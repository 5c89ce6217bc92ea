//! Best-effort enumeration of processes and files against a threshold.
//!
//! Both scans read a live, mutating system. Items that disappear or cannot
//! be read mid-enumeration become a [`Skip`] and flow through one shared
//! policy ([`SkipLog`]) instead of aborting the scan.

pub mod files;
pub mod processes;

pub use files::scan_files;
pub use processes::{
    scan_processes, scan_processes_with, ProcessSample, ProcessSource, SysinfoProcessSource,
};

use std::fmt;
use std::io;
use tracing::{debug, warn};

use crate::model::ScanKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Vanished,
    AccessDenied,
    Zombie,
    Unreadable(String),
}

impl SkipReason {
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => SkipReason::Vanished,
            io::ErrorKind::PermissionDenied => SkipReason::AccessDenied,
            _ => SkipReason::Unreadable(err.to_string()),
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Vanished => write!(f, "no longer exists"),
            SkipReason::AccessDenied => write!(f, "access denied"),
            SkipReason::Zombie => write!(f, "zombie process"),
            SkipReason::Unreadable(detail) => write!(f, "unreadable: {}", detail),
        }
    }
}

/// One enumerated item that could not be inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skip {
    pub subject: String,
    pub reason: SkipReason,
}

impl Skip {
    pub fn new(subject: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            subject: subject.into(),
            reason,
        }
    }
}

/// Per-scan skip accounting. Every skip is logged at warn level and counted.
#[derive(Debug)]
pub struct SkipLog {
    kind: ScanKind,
    skipped: usize,
}

impl SkipLog {
    pub fn new(kind: ScanKind) -> Self {
        Self { kind, skipped: 0 }
    }

    pub fn keep<T>(&mut self, item: Result<T, Skip>) -> Option<T> {
        match item {
            Ok(value) => Some(value),
            Err(skip) => {
                self.record(skip);
                None
            }
        }
    }

    pub fn record(&mut self, skip: Skip) {
        warn!("Skipping {} '{}' during scan: {}", self.kind, skip.subject, skip.reason);
        self.skipped += 1;
    }

    pub fn merge(&mut self, other: SkipLog) {
        self.skipped += other.skipped;
    }

    pub fn finish(self) -> usize {
        if self.skipped > 0 {
            debug!("{} scan skipped {} unreadable items", self.kind, self.skipped);
        }
        self.skipped
    }
}
