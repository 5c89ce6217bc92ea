use colored::*;
use jarvis_core::report::Ranked;
use jarvis_core::task::ScanFindings;
use jarvis_core::{Error, ScanKind, ScanOutcome, ScanTask};
use tracing::{info, warn};

/// Console narration of scan results. Every line is mirrored to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct Announcer;

impl Announcer {
    pub fn say(&self, text: &str) {
        info!("Jarvis: {}", text);
        println!("{} {}", "[Jarvis]:".cyan().bold(), text);
    }

    pub fn scan_started(&self, kind: ScanKind) {
        match kind {
            ScanKind::Processes => {
                self.say("Starting the check for idle processes with high memory use.")
            }
            ScanKind::Files => {
                self.say("Starting the check for large files. This may take a while.")
            }
        }
    }

    pub fn outcome(&self, outcome: &ScanOutcome) {
        match outcome {
            ScanOutcome::Processes(findings) => {
                self.headline(findings);
                for process in &findings.records {
                    self.say(&format!(
                        "The process {} (pid {}) is using {} megabytes.",
                        process.name.yellow(),
                        process.pid,
                        process.resident_memory_mb
                    ));
                }
            }
            ScanOutcome::Files(findings) => {
                self.headline(findings);
                if !findings.report.top.is_empty() {
                    self.say(&format!("The {} largest are:", findings.report.top.len()));
                }
                for file in &findings.report.top {
                    info!("Large file: {} ({} MB)", file.absolute_path, file.size_mb);
                    self.say(&format!(
                        "The file {} with {} megabytes.",
                        file.label().yellow(),
                        file.size_mb
                    ));
                }
            }
        }
    }

    pub fn failure(&self, kind: ScanKind, err: &Error) {
        warn!("{} scan failed: {:?}", kind, err);
        self.say(&format!("The {} scan failed: {}", kind, err).red().to_string());
    }

    fn headline<T: Ranked>(&self, findings: &ScanFindings<T>) {
        if findings.report.count == 0 {
            self.say(&findings.report.message);
        } else {
            self.say(&format!("Attention! {}", findings.report.message));
        }
    }
}

/// Wrap a scan task so each run is announced as it starts and finishes.
pub fn narrated<T: ScanTask>(kind: ScanKind, task: T, announcer: Announcer) -> impl ScanTask {
    move || {
        announcer.scan_started(kind);
        let result = task.run();
        match &result {
            Ok(outcome) => announcer.outcome(outcome),
            Err(err) => announcer.failure(kind, err),
        }
        result
    }
}
