//! Shared holder of the current [`SyncStatus`].
//!
//! Writers build a complete status and swap it in; readers clone the
//! pointer out. Neither side ever holds the lock across I/O.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::SyncStatus;

/// Cloneable handle to the single current sync status.
///
/// Every clone observes the same value. Construct one per process (or per
/// test) and pass it to whatever needs to read or record outcomes.
#[derive(Debug, Clone)]
pub struct StatusStore {
    current: Arc<RwLock<Arc<SyncStatus>>>,
}

impl StatusStore {
    /// A store holding the "no sync attempted yet" placeholder.
    pub fn new() -> Self {
        Self::with_status(SyncStatus::initial())
    }

    pub fn with_status(status: SyncStatus) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(status))),
        }
    }

    /// Snapshot of the last written status.
    pub fn get(&self) -> SyncStatus {
        SyncStatus::clone(&self.snapshot())
    }

    /// Shared pointer to the last written status, without copying it.
    pub fn snapshot(&self) -> Arc<SyncStatus> {
        let guard = self.current.read();
        Arc::clone(&*guard)
    }

    /// Replace the current status.
    pub fn set(&self, status: SyncStatus) {
        let next = Arc::new(status);
        *self.current.write() = next;
    }
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new()
    }
}
