//! Out-of-band health check: connect, round-trip query, sync.
//!
//! The check never reads or writes the status store. Every failure is
//! folded into the returned [`VerificationReport`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use replica_core::{ReplicaConfig, VerificationReport};

use crate::driver::{ReplicaDriver, SqlValue};
use crate::error::SyncError;

/// Round-trip statement; the first column of the first row must be `1`.
pub const TEST_QUERY: &str = "SELECT 1 AS test";

#[derive(Clone)]
pub struct Verifier {
    driver: Arc<dyn ReplicaDriver>,
    config: Arc<ReplicaConfig>,
}

impl Verifier {
    pub fn new(driver: Arc<dyn ReplicaDriver>, config: Arc<ReplicaConfig>) -> Self {
        Self { driver, config }
    }

    /// Check the replica. Each step is bounded by the configured timeout.
    pub async fn verify(&self) -> VerificationReport {
        let bound = self.config.sync_timeout;

        let mut conn = match bounded("connect", bound, self.driver.connect(&self.config)).await {
            Ok(conn) => conn,
            Err(err) => {
                tracing::error!(error = %err, "sync verification could not connect");
                return VerificationReport::connection_failed(Utc::now(), err);
            }
        };

        match bounded("test query", bound, conn.query(TEST_QUERY, Vec::new())).await {
            Ok(rows) => {
                let first = rows.first().and_then(|row| row.first());
                if first != Some(&SqlValue::Integer(1)) {
                    tracing::warn!(returned = ?first, "sync verification query returned unexpected value");
                    return VerificationReport::query_failed(Utc::now(), None);
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "sync verification query failed");
                return VerificationReport::query_failed(Utc::now(), Some(err.to_string()));
            }
        }

        let sync_error = match bounded("sync", bound, conn.sync()).await {
            Ok(()) => {
                tracing::info!("sync verification succeeded");
                None
            }
            Err(err) => {
                tracing::error!(error = %err, "sync verification error");
                Some(err.to_string())
            }
        };
        conn.close();

        VerificationReport::sync_attempted(Utc::now(), sync_error)
    }
}

async fn bounded<T, F>(step: &'static str, bound: Duration, fut: F) -> Result<T, SyncError>
where
    F: Future<Output = Result<T, SyncError>>,
{
    tokio::time::timeout(bound, fut)
        .await
        .map_err(|_| SyncError::timeout(step, bound))?
}
