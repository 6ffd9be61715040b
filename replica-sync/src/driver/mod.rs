//! Database driver seam.
//!
//! The replica engine is an external collaborator; this module pins down the
//! four operations the sync machinery needs from it:
//!
//! - [`ReplicaDriver::connect`] opens the local replica bound to a remote
//! - [`ReplicaConnection::sync`] pulls/pushes against the remote
//! - [`ReplicaConnection::query`] / [`ReplicaConnection::execute`] run SQL
//! - [`ReplicaConnection::close`] releases the connection
//!
//! Connections are owned values. Dropping one closes it, so every call site
//! releases its connection on both success and error paths.

mod mock;

pub use mock::MockDriver;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use replica_core::ReplicaConfig;

use crate::error::SyncError;

/// A single SQL value as returned by, or bound into, a statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Real(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_owned())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

/// Fully materialized result rows.
pub type Rows = Vec<Vec<SqlValue>>;

/// Opens connections to a local replica of a remote database.
#[async_trait]
pub trait ReplicaDriver: Send + Sync {
    async fn connect(
        &self,
        config: &ReplicaConfig,
    ) -> Result<Box<dyn ReplicaConnection>, SyncError>;
}

/// One open connection. Not shared between call sites.
#[async_trait]
pub trait ReplicaConnection: Send {
    /// Reconcile the local replica with the remote.
    async fn sync(&mut self) -> Result<(), SyncError>;

    /// Run a statement and collect every row it returns.
    async fn query(&mut self, sql: &str, params: Vec<SqlValue>) -> Result<Rows, SyncError>;

    /// Run a statement and return the number of affected rows.
    async fn execute(&mut self, sql: &str, params: Vec<SqlValue>) -> Result<u64, SyncError>;

    /// Release the connection. Equivalent to dropping it.
    fn close(self: Box<Self>) {}
}
