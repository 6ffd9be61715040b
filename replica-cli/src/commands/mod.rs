pub mod check;
pub mod daemon;
pub mod query;

use std::path::PathBuf;

use anyhow::{Context, Result};

use replica_core::ReplicaConfig;

pub(crate) fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

pub(crate) fn load_config(home: &std::path::Path) -> Result<ReplicaConfig> {
    replica_core::config::load_at(home, |key| std::env::var(key).ok())
        .context("failed to load replica configuration")
}

/// Single-threaded runtime for in-process operations.
pub(crate) fn local_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}
