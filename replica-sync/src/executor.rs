//! Single sync attempt: connect, sync, record.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;

use replica_core::types::round_secs;
use replica_core::{ReplicaConfig, StatusStore, SyncStatus};

use crate::driver::ReplicaDriver;
use crate::error::SyncError;

/// Runs sync attempts and records each outcome in a [`StatusStore`].
///
/// Cheap to clone; clones share the driver, config and store. No lock is
/// taken around an attempt, so overlapping attempts each write their own
/// outcome and the last one to finish wins.
#[derive(Clone)]
pub struct SyncExecutor {
    driver: Arc<dyn ReplicaDriver>,
    config: Arc<ReplicaConfig>,
    store: StatusStore,
}

impl SyncExecutor {
    pub fn new(
        driver: Arc<dyn ReplicaDriver>,
        config: Arc<ReplicaConfig>,
        store: StatusStore,
    ) -> Self {
        Self {
            driver,
            config,
            store,
        }
    }

    pub fn store(&self) -> &StatusStore {
        &self.store
    }

    pub fn config(&self) -> &ReplicaConfig {
        &self.config
    }

    pub fn driver(&self) -> Arc<dyn ReplicaDriver> {
        Arc::clone(&self.driver)
    }

    /// Connect and sync once, bounded by the configured timeout.
    ///
    /// Returns the elapsed seconds rounded to two decimals. Does not touch
    /// the store.
    pub async fn attempt(&self) -> Result<f64, SyncError> {
        let started = Instant::now();
        let bound = self.config.sync_timeout;

        tokio::time::timeout(bound, async {
            let mut conn = self.driver.connect(&self.config).await?;
            let result = conn.sync().await;
            conn.close();
            result
        })
        .await
        .map_err(|_| SyncError::timeout("sync attempt", bound))??;

        Ok(round_secs(started.elapsed().as_secs_f64()))
    }

    /// Run one attempt and record its outcome. Never fails; the return value
    /// and the store are the only signals.
    pub async fn run_sync(&self) -> bool {
        tracing::info!(url = %self.config.sync_url, "starting replica sync");
        match self.attempt().await {
            Ok(duration) => {
                self.store.set(SyncStatus::succeeded(Utc::now(), duration));
                tracing::info!(duration_secs = duration, "replica sync completed");
                true
            }
            Err(err) => {
                tracing::error!(error = %err, "replica sync failed");
                self.store.set(SyncStatus::failed(Utc::now(), &err));
                false
            }
        }
    }

    /// Record a failed attempt that ended without a [`SyncError`], such as
    /// a crashed task.
    pub fn record_failure(&self, cause: impl fmt::Display) {
        self.store.set(SyncStatus::failed(Utc::now(), cause));
    }
}
