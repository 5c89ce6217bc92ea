use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::Error;
use crate::model::{DEFAULT_FILE_LIMIT_MB, DEFAULT_PROCESS_LIMIT_MB};

const HOME_PLACEHOLDER: &str = "~HOME~";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scan: ScanSettings,
    pub schedule: ScheduleSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub folders: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub process_limit_mb: u64,
    pub file_limit_mb: u64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            folders: Vec::new(),
            ignore_patterns: Vec::new(),
            process_limit_mb: DEFAULT_PROCESS_LIMIT_MB,
            file_limit_mb: DEFAULT_FILE_LIMIT_MB,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    pub process_interval_secs: u64,
    pub file_interval_secs: u64,
    pub shutdown_grace_secs: u64,
    pub status_path: PathBuf,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            process_interval_secs: 2 * 60 * 60,
            file_interval_secs: 8 * 60 * 60,
            shutdown_grace_secs: 30,
            status_path: PathBuf::from("scheduler_status.json"),
        }
    }
}

impl ScheduleSettings {
    pub fn process_interval(&self) -> Duration {
        Duration::from_secs(self.process_interval_secs.max(1))
    }

    pub fn file_interval(&self) -> Duration {
        Duration::from_secs(self.file_interval_secs.max(1))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub listen: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8000".to_string(),
        }
    }
}

/// Load `Config.toml` (optional) overlaid with `JARVIS_*` environment
/// variables, e.g. `JARVIS_SCAN__FOLDERS=~HOME~/Downloads,/data`.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(
            Environment::with_prefix("JARVIS")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("scan.folders")
                .with_list_parse_key("scan.ignore_patterns")
                .try_parsing(true),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

/// The directories a file scan walks, in configured order.
///
/// Every retained path existed and was a directory at resolution time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanFolderSet {
    folders: Vec<PathBuf>,
}

impl ScanFolderSet {
    /// Resolve configured entries against the current user's home directory.
    pub fn resolve(entries: &[String]) -> Self {
        Self::resolve_with_home(entries, home_dir().as_deref())
    }

    pub fn resolve_with_home(entries: &[String], home: Option<&Path>) -> Self {
        let mut candidates = Vec::new();

        for raw in entries {
            let entry = raw.trim();
            if entry.is_empty() {
                continue;
            }

            let path = match expand_home(entry, home) {
                Some(path) => path,
                None => {
                    warn!(
                        "Folder '{}' uses the home placeholder but no home directory is known. Ignoring.",
                        entry
                    );
                    continue;
                }
            };

            if path.is_dir() {
                debug!("Folder added for scanning: {}", path.display());
                candidates.push(path.to_string_lossy().into_owned());
            } else {
                warn!(
                    "Folder '{}' (configured as '{}') does not exist or is not a directory. Ignoring.",
                    path.display(),
                    entry
                );
            }
        }

        let folders = non_overlapping_directories(candidates)
            .into_iter()
            .map(PathBuf::from)
            .collect();

        Self { folders }
    }

    pub fn from_paths(folders: Vec<PathBuf>) -> Self {
        Self { folders }
    }

    /// The folder set, or `Error::NoValidFolders` when nothing resolved.
    pub fn require_non_empty(self) -> Result<Self, Error> {
        if self.is_empty() {
            Err(Error::NoValidFolders)
        } else {
            Ok(self)
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.folders
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}

fn expand_home(entry: &str, home: Option<&Path>) -> Option<PathBuf> {
    let rest = if entry == HOME_PLACEHOLDER || entry == "~" {
        ""
    } else if let Some(rest) = entry
        .strip_prefix("~HOME~/")
        .or_else(|| entry.strip_prefix("~HOME~\\"))
        .or_else(|| entry.strip_prefix("~/"))
    {
        rest
    } else {
        return Some(PathBuf::from(entry));
    };

    home.map(|home| {
        if rest.is_empty() {
            home.to_path_buf()
        } else {
            home.join(rest)
        }
    })
}

/// Remove directories that are subdirectories of other directories in the list.
pub fn non_overlapping_directories(dirs: Vec<String>) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();

    for dir in dirs {
        let dir_path = Path::new(&dir);

        if result
            .iter()
            .any(|kept| dir_path.starts_with(Path::new(kept)))
        {
            continue;
        }

        result.retain(|kept| !Path::new(kept).starts_with(dir_path));
        result.push(dir);
    }

    result
}
