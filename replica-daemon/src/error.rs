use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Error surface for bootstrap, scheduler, runtime and socket protocol.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(#[from] replica_core::ConfigError),

    #[error("sync error: {0}")]
    Sync(#[from] replica_sync::SyncError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sync interval must be greater than zero (got {0:?})")]
    InvalidInterval(Duration),

    #[error("bootstrap failed: {0}")]
    Bootstrap(String),

    #[error("daemon protocol error: {0}")]
    Protocol(String),

    #[error("daemon is not running (socket missing: {socket})")]
    DaemonNotRunning { socket: PathBuf },

    #[error("daemon socket already in use: {socket}")]
    SocketInUse { socket: PathBuf },

    #[error("{task} task failed: {source}")]
    TaskJoin {
        task: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
