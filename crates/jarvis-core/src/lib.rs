pub mod config;
pub mod error;
pub mod logtail;
pub mod model;
pub mod progress;
pub mod report;
pub mod scanner;
pub mod scheduler;
pub mod service;
pub mod status_store;
pub mod system;
pub mod task;

pub use config::{AppConfig, ScanFolderSet};
pub use error::Error;
pub use model::{FileRecord, ProcessRecord, ScanKind, ScanThreshold};
pub use progress::{ProgressReporter, SilentReporter};
pub use report::{format_report, ScanReport};
pub use scheduler::{ScanScheduler, SchedulerHandle};
pub use status_store::{JobOutcome, JobStatus, JobStatusStore};
pub use task::{FileScanTask, ProcessScanTask, ScanOutcome, ScanTask};
