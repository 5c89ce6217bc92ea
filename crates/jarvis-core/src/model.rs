use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Error;

pub const MIN_PROCESS_LIMIT_MB: u64 = 50;
pub const MIN_FILE_LIMIT_MB: u64 = 100;
pub const DEFAULT_PROCESS_LIMIT_MB: u64 = 300;
pub const DEFAULT_FILE_LIMIT_MB: u64 = 5000;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Whole mebibytes, truncated.
pub fn bytes_to_mb(bytes: u64) -> u64 {
    bytes / BYTES_PER_MB
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanKind {
    Processes,
    Files,
}

impl fmt::Display for ScanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanKind::Processes => write!(f, "process"),
            ScanKind::Files => write!(f, "file"),
        }
    }
}

/// An idle process holding more memory than the configured limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub name: String,
    #[serde(rename = "memory_mb")]
    pub resident_memory_mb: u64,
    pub pid: u32,
}

/// A regular file larger than the configured limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(rename = "path")]
    pub absolute_path: String,
    pub size_mb: u64,
}

/// Memory or size limit for one scan invocation. Constructed only through the
/// validating constructors, so a scan never sees a limit below the minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanThreshold {
    kind: ScanKind,
    limit_mb: u64,
}

impl ScanThreshold {
    pub fn for_processes(limit_mb: u64) -> Result<Self, Error> {
        Self::checked(ScanKind::Processes, limit_mb, MIN_PROCESS_LIMIT_MB)
    }

    pub fn for_files(limit_mb: u64) -> Result<Self, Error> {
        Self::checked(ScanKind::Files, limit_mb, MIN_FILE_LIMIT_MB)
    }

    fn checked(kind: ScanKind, limit_mb: u64, minimum: u64) -> Result<Self, Error> {
        if limit_mb < minimum {
            return Err(Error::InvalidThreshold {
                kind: match kind {
                    ScanKind::Processes => "process memory",
                    ScanKind::Files => "file size",
                },
                value: limit_mb,
                minimum,
            });
        }
        Ok(Self { kind, limit_mb })
    }

    pub fn kind(&self) -> ScanKind {
        self.kind
    }

    pub fn limit_mb(&self) -> u64 {
        self.limit_mb
    }
}
