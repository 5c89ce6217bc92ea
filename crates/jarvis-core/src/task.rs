//! First-class scan job values: what to run and with which parameters,
//! independent of when it runs.

use std::sync::Arc;

use crate::config::{ScanFolderSet, ScanSettings};
use crate::error::Error;
use crate::model::{FileRecord, ProcessRecord, ScanKind, ScanThreshold};
use crate::progress::{ProgressReporter, SilentReporter};
use crate::report::{format_report, Ranked, ScanReport};
use crate::scanner::{self, ProcessSource, SysinfoProcessSource};

/// Full result list plus its formatted report.
#[derive(Debug, Clone)]
pub struct ScanFindings<T> {
    pub records: Vec<T>,
    pub report: ScanReport<T>,
}

impl<T: Ranked + Clone> ScanFindings<T> {
    pub fn new(kind: ScanKind, records: Vec<T>) -> Self {
        let report = format_report(kind, &records);
        Self { records, report }
    }
}

#[derive(Debug, Clone)]
pub enum ScanOutcome {
    Processes(ScanFindings<ProcessRecord>),
    Files(ScanFindings<FileRecord>),
}

impl ScanOutcome {
    pub fn count(&self) -> usize {
        match self {
            ScanOutcome::Processes(findings) => findings.report.count,
            ScanOutcome::Files(findings) => findings.report.count,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ScanOutcome::Processes(findings) => &findings.report.message,
            ScanOutcome::Files(findings) => &findings.report.message,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            ScanOutcome::Processes(findings) => findings.report.summary(),
            ScanOutcome::Files(findings) => findings.report.summary(),
        }
    }
}

/// A unit of scan work the scheduler can run on a worker thread.
pub trait ScanTask: Send + Sync + 'static {
    fn run(&self) -> Result<ScanOutcome, Error>;
}

impl<F> ScanTask for F
where
    F: Fn() -> Result<ScanOutcome, Error> + Send + Sync + 'static,
{
    fn run(&self) -> Result<ScanOutcome, Error> {
        self()
    }
}

pub struct ProcessScanTask {
    threshold: ScanThreshold,
    source: Arc<dyn ProcessSource>,
}

impl ProcessScanTask {
    pub fn new(threshold: ScanThreshold) -> Self {
        Self::with_source(threshold, Arc::new(SysinfoProcessSource))
    }

    pub fn with_source(threshold: ScanThreshold, source: Arc<dyn ProcessSource>) -> Self {
        Self { threshold, source }
    }
}

impl ScanTask for ProcessScanTask {
    fn run(&self) -> Result<ScanOutcome, Error> {
        let records = scanner::scan_processes_with(self.source.as_ref(), &self.threshold);
        Ok(ScanOutcome::Processes(ScanFindings::new(
            ScanKind::Processes,
            records,
        )))
    }
}

/// File scan over folders resolved at run time, so folders created after
/// startup are picked up by the next scheduled run.
pub struct FileScanTask {
    folders: Vec<String>,
    ignore_patterns: Vec<String>,
    threshold: ScanThreshold,
    reporter: Arc<dyn ProgressReporter>,
}

impl FileScanTask {
    pub fn new(folders: Vec<String>, ignore_patterns: Vec<String>, threshold: ScanThreshold) -> Self {
        Self {
            folders,
            ignore_patterns,
            threshold,
            reporter: Arc::new(SilentReporter),
        }
    }

    pub fn from_settings(settings: &ScanSettings, threshold: ScanThreshold) -> Self {
        Self::new(
            settings.folders.clone(),
            settings.ignore_patterns.clone(),
            threshold,
        )
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }
}

impl ScanTask for FileScanTask {
    fn run(&self) -> Result<ScanOutcome, Error> {
        let folders = ScanFolderSet::resolve(&self.folders).require_non_empty()?;
        let records = scanner::scan_files(
            &folders,
            &self.threshold,
            &self.ignore_patterns,
            self.reporter.as_ref(),
        );
        Ok(ScanOutcome::Files(ScanFindings::new(ScanKind::Files, records)))
    }
}
