//! replica core library — status types, the shared status store, configuration.
//!
//! - [`types`] — [`SyncStatus`] and [`VerificationReport`]
//! - [`store`] — [`StatusStore`], the single current sync outcome
//! - [`config`] — [`ReplicaConfig`] loading and validation
//! - [`error`] — [`ConfigError`]

pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use config::ReplicaConfig;
pub use error::ConfigError;
pub use store::StatusStore;
pub use types::{SyncStatus, VerificationIssue, VerificationReport};
