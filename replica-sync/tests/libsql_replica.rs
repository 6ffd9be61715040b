//! libSQL driver against a remote nobody listens on.
//!
//! Whether libSQL fails at build time or at sync time, the outcome must be a
//! recorded failure, never a panic or a hang.

#![cfg(feature = "libsql")]

use std::sync::Arc;
use std::time::Duration;

use replica_core::{ReplicaConfig, StatusStore};
use replica_sync::{LibsqlDriver, ReplicaDriver, SyncExecutor, Verifier};
use tempfile::TempDir;

fn unreachable_config(dir: &TempDir) -> ReplicaConfig {
    let mut config = ReplicaConfig::new(
        dir.path().join("nested").join("replica.db"),
        "http://127.0.0.1:9",
        "token",
    );
    config.sync_timeout = Duration::from_secs(5);
    config
}

#[tokio::test]
async fn connect_creates_the_replica_directory() {
    let dir = TempDir::new().expect("tempdir");
    let config = unreachable_config(&dir);

    let _ = LibsqlDriver::new().connect(&config).await;
    assert!(dir.path().join("nested").is_dir());
}

#[tokio::test]
async fn unreachable_remote_is_recorded_as_failure() {
    let dir = TempDir::new().expect("tempdir");
    let store = StatusStore::new();
    let executor = SyncExecutor::new(
        Arc::new(LibsqlDriver::new()),
        Arc::new(unreachable_config(&dir)),
        store.clone(),
    );

    assert!(!executor.run_sync().await);
    let status = store.get();
    assert!(!status.success);
    assert!(status.timestamp.is_some());
    assert!(status.duration.is_none());
    assert!(status.message.starts_with("Error syncing with Turso: "));
}

#[tokio::test]
async fn verifier_reports_a_definite_sync_outcome() {
    let dir = TempDir::new().expect("tempdir");
    let verifier = Verifier::new(
        Arc::new(LibsqlDriver::new()),
        Arc::new(unreachable_config(&dir)),
    );

    let report = verifier.verify().await;
    assert!(!report.is_healthy());
    assert!(!report.sync_success);
    assert!(report.error.is_some());
}
