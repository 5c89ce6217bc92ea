use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("No valid folders to scan. Check the scan.folders setting")]
    NoValidFolders,

    #[error("Invalid {kind} limit {value}MB: must be at least {minimum}MB")]
    InvalidThreshold {
        kind: &'static str,
        value: u64,
        minimum: u64,
    },

    #[error("Job '{0}' is already registered with a different schedule")]
    DuplicateJob(String),

    #[error("Status store error: {0}")]
    Persistence(String),

    #[error("Could not decode status document {path}: {source}")]
    StatusDecode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Job execution failed: {0}")]
    JobExecution(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Errors caused by the caller's configuration or input rather than by
    /// a runtime failure. These never succeed on retry.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::NoValidFolders | Error::InvalidThreshold { .. }
        )
    }
}
