//! # replica-sync
//!
//! One-shot synchronization against a remote-backed local replica.
//!
//! - [`SyncExecutor`] runs a single connect + sync attempt and records the
//!   outcome in a [`replica_core::StatusStore`].
//! - [`Verifier`] checks connect, round-trip query and sync without touching
//!   the store.
//! - [`driver`] defines the database seam; [`LibsqlDriver`] is the production
//!   implementation.

pub mod driver;
pub mod error;
pub mod executor;
#[cfg(feature = "libsql")]
pub mod libsql_driver;
pub mod query;
pub mod verifier;

pub use driver::{ReplicaConnection, ReplicaDriver, Rows, SqlValue};
pub use error::SyncError;
pub use executor::SyncExecutor;
#[cfg(feature = "libsql")]
pub use libsql_driver::LibsqlDriver;
pub use query::execute_query;
pub use verifier::Verifier;
