//! File-backed tracing setup. The terminal is owned by the TUI, so logs go
//! to a file the user can `tail -f` from another terminal.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to create log directory {path:?}: {source}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid log file path: {0:?}")]
    InvalidPath(PathBuf),

    #[error("tracing subscriber already initialized")]
    SubscriberAlreadySet,
}

/// Default log location under the platform data dir.
pub fn default_log_path() -> PathBuf {
    if let Some(pd) = ProjectDirs::from("", "", "cueline") {
        pd.data_local_dir().join("cueline.log")
    } else {
        PathBuf::from("cueline.log")
    }
}

/// Initialize tracing to `log_path`, honoring `RUST_LOG` (default "info").
pub fn init(log_path: &Path) -> Result<(), LoggingError> {
    use tracing_subscriber::EnvFilter;

    let directory = log_path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(directory).map_err(|source| LoggingError::DirectoryCreation {
        path: directory.to_path_buf(),
        source,
    })?;

    let file_name = log_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| LoggingError::InvalidPath(log_path.to_path_buf()))?;

    let appender = tracing_appender::rolling::never(directory, file_name);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(appender)
        .with_ansi(false)
        .try_init()
        .map_err(|_| LoggingError::SubscriberAlreadySet)
}
