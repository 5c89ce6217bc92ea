use crate::model::ScanKind;

/// Trait for reporting scan progress.
///
/// The CLI implements it with an indicatif spinner; scheduled and HTTP scans
/// use [`SilentReporter`]. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self, _kind: ScanKind) {}
    fn on_scan_progress(&self, _items_seen: usize, _current: &str) {}
    fn on_scan_complete(&self, _found: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
