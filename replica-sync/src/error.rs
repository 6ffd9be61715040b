//! Error types for replica-sync.

use std::time::Duration;

use thiserror::Error;

/// Failures of a single connect / query / sync step.
///
/// The display text is what ends up in status messages and verification
/// reports, so variants carry the driver's own wording.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// The replica could not be opened or the remote could not be reached.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Connected, but the sync exchange with the remote failed.
    #[error("sync failed: {0}")]
    Sync(String),

    /// A statement failed or returned something unexpected.
    #[error("query failed: {0}")]
    Query(String),

    /// The step did not finish within the configured bound.
    #[error("{step} timed out after {}s", .after.as_secs_f64())]
    Timeout {
        step: &'static str,
        after: Duration,
    },
}

impl SyncError {
    /// Wrap a future's timeout into [`SyncError::Timeout`].
    pub(crate) fn timeout(step: &'static str, after: Duration) -> Self {
        SyncError::Timeout { step, after }
    }
}
