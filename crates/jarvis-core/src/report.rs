//! Shapes raw scan records into the report consumed by the HTTP surface,
//! the CLI announcer and the scheduler's status summaries.

use serde::Serialize;
use std::path::Path;

use crate::model::{FileRecord, ProcessRecord, ScanKind};

pub const TOP_N: usize = 5;

/// A record that can be ranked by how much it costs.
pub trait Ranked {
    fn cost_mb(&self) -> u64;
    fn label(&self) -> String;
}

impl Ranked for ProcessRecord {
    fn cost_mb(&self) -> u64 {
        self.resident_memory_mb
    }

    fn label(&self) -> String {
        format!("{} (pid {})", self.name, self.pid)
    }
}

impl Ranked for FileRecord {
    fn cost_mb(&self) -> u64 {
        self.size_mb
    }

    fn label(&self) -> String {
        Path::new(&self.absolute_path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.absolute_path.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport<T> {
    pub kind: ScanKind,
    pub count: usize,
    /// Largest offenders first, at most [`TOP_N`]. Equal sizes keep
    /// enumeration order.
    pub top: Vec<T>,
    pub message: String,
}

impl<T: Ranked> ScanReport<T> {
    /// One line for logs and job status: count plus the top offenders.
    pub fn summary(&self) -> String {
        if self.top.is_empty() {
            return self.message.clone();
        }
        let offenders: Vec<String> = self
            .top
            .iter()
            .map(|record| format!("{} {}MB", record.label(), record.cost_mb()))
            .collect();
        format!("{} found; top: {}", self.count, offenders.join(", "))
    }
}

pub fn format_report<T: Ranked + Clone>(kind: ScanKind, records: &[T]) -> ScanReport<T> {
    let mut top: Vec<T> = records.to_vec();
    top.sort_by(|a, b| b.cost_mb().cmp(&a.cost_mb()));
    top.truncate(TOP_N);

    ScanReport {
        kind,
        count: records.len(),
        top,
        message: message_for(kind, records.len()),
    }
}

fn message_for(kind: ScanKind, count: usize) -> String {
    match (kind, count) {
        (ScanKind::Processes, 0) => "No suspicious processes found.".to_string(),
        (ScanKind::Processes, 1) => "1 suspicious process found.".to_string(),
        (ScanKind::Processes, n) => format!("{} suspicious processes found.", n),
        (ScanKind::Files, 0) => {
            "No large files found in the scanned folders above the limit.".to_string()
        }
        (ScanKind::Files, 1) => "1 large file found.".to_string(),
        (ScanKind::Files, n) => format!("{} large files found.", n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, size_mb: u64) -> FileRecord {
        FileRecord {
            absolute_path: path.to_string(),
            size_mb,
        }
    }

    #[test]
    fn test_top_is_sorted_descending_and_capped() {
        let records: Vec<FileRecord> = (1..=8).map(|i| file(&format!("/d/f{}", i), i * 100)).collect();
        let report = format_report(ScanKind::Files, &records);

        assert_eq!(report.count, 8);
        let sizes: Vec<u64> = report.top.iter().map(|f| f.size_mb).collect();
        assert_eq!(sizes, vec![800, 700, 600, 500, 400]);
        assert_eq!(report.message, "8 large files found.");
    }

    #[test]
    fn test_ties_keep_enumeration_order() {
        let records = vec![
            file("/d/first", 200),
            file("/d/big", 900),
            file("/d/second", 200),
            file("/d/third", 200),
        ];
        let report = format_report(ScanKind::Files, &records);
        let paths: Vec<&str> = report.top.iter().map(|f| f.absolute_path.as_str()).collect();
        assert_eq!(paths, vec!["/d/big", "/d/first", "/d/second", "/d/third"]);
    }

    #[test]
    fn test_empty_report_is_not_an_error_message() {
        let report = format_report::<ProcessRecord>(ScanKind::Processes, &[]);
        assert_eq!(report.count, 0);
        assert!(report.top.is_empty());
        assert_eq!(report.summary(), "No suspicious processes found.");
    }

    #[test]
    fn test_summary_names_top_offenders() {
        let records = vec![
            ProcessRecord {
                name: "slack".to_string(),
                resident_memory_mb: 530,
                pid: 7,
            },
            ProcessRecord {
                name: "chrome".to_string(),
                resident_memory_mb: 812,
                pid: 3,
            },
        ];
        let report = format_report(ScanKind::Processes, &records);
        assert_eq!(
            report.summary(),
            "2 found; top: chrome (pid 3) 812MB, slack (pid 7) 530MB"
        );
    }

    #[test]
    fn test_file_label_is_base_name() {
        assert_eq!(file("/home/ana/Videos/trip.mkv", 6000).label(), "trip.mkv");
    }
}
