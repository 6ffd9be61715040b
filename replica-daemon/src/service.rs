//! Reporting surface shared by the daemon, the socket server and the CLI.

use std::sync::Arc;

use tokio::time::Instant;

use replica_core::types::round_secs;
use replica_core::{ReplicaConfig, StatusStore, SyncStatus, VerificationReport};
use replica_sync::{execute_query, ReplicaDriver, Rows, SqlValue, SyncError, SyncExecutor, Verifier};

/// Status, force-sync, verify and reset operations over one replica.
///
/// Clones share the same store; none of the operations block the
/// scheduler or each other.
#[derive(Clone)]
pub struct ReplicaService {
    executor: SyncExecutor,
    verifier: Verifier,
}

impl ReplicaService {
    pub fn new(driver: Arc<dyn ReplicaDriver>, config: ReplicaConfig, store: StatusStore) -> Self {
        let config = Arc::new(config);
        Self {
            executor: SyncExecutor::new(Arc::clone(&driver), Arc::clone(&config), store),
            verifier: Verifier::new(driver, config),
        }
    }

    pub fn executor(&self) -> &SyncExecutor {
        &self.executor
    }

    pub fn config(&self) -> &ReplicaConfig {
        self.executor.config()
    }

    /// Last recorded outcome, or the placeholder.
    pub fn get_status(&self) -> SyncStatus {
        self.executor.store().get()
    }

    /// Sync now, on the caller's task. Returns the outcome and the wall time
    /// the whole operation took, in seconds.
    pub async fn force_sync(&self) -> (bool, f64) {
        tracing::info!("forcing synchronization");
        let started = Instant::now();
        let success = self.executor.run_sync().await;
        (success, round_secs(started.elapsed().as_secs_f64()))
    }

    /// Check connect, query and sync. Leaves the store untouched.
    pub async fn verify(&self) -> VerificationReport {
        self.verifier.verify().await
    }

    /// Re-seed the store with a fresh attempt. Bootstrap seeds through here.
    pub async fn reset_status(&self) -> bool {
        tracing::info!("initializing sync status");
        self.executor.run_sync().await
    }

    /// Run a statement on its own connection and sync afterwards.
    pub async fn execute_query(&self, sql: &str, params: Vec<SqlValue>) -> Result<Rows, SyncError> {
        let driver = self.executor.driver();
        execute_query(driver.as_ref(), self.config(), sql, params).await
    }
}
