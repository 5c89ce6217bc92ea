use indicatif::{ProgressBar, ProgressStyle};
use jarvis_core::{ProgressReporter, ScanKind};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Spinner for the file walk; the total number of entries is unknown upfront.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn finish_bar(&self) {
        let mut guard = self.bar.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pb) = guard.take() {
            pb.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_scan_start(&self, kind: ScanKind) {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        pb.set_style(style);
        pb.set_message(format!("Starting {} scan...", kind));
        pb.enable_steady_tick(Duration::from_millis(80));

        let mut guard = self.bar.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = guard.replace(pb) {
            old.finish_and_clear();
        }
    }

    fn on_scan_progress(&self, items_seen: usize, current: &str) {
        let guard = self.bar.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pb) = guard.as_ref() {
            pb.set_message(format!("Scanning... {} entries ({})", items_seen, current));
        }
    }

    fn on_scan_complete(&self, found: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Scan complete: {} over the limit in {:.2}s",
            found, duration_secs
        );
    }
}
