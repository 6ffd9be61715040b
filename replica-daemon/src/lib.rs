//! Sync daemon: bootstrap sequencing, fixed-interval scheduler, reporting
//! surface, and the Unix-socket protocol the CLI talks to.

pub mod bootstrap;
mod error;
pub mod paths;
pub mod protocol;
mod runtime;
pub mod scheduler;
pub mod service;

pub use bootstrap::{bootstrap, try_bootstrap, BootstrapOptions};
pub use error::DaemonError;
pub use protocol::{
    request_force_sync, request_reset, request_status, request_stop, request_sync_status,
    request_verify, send_request, DaemonRequest, DaemonResponse, ForceSyncOutcome,
};
#[cfg(feature = "libsql")]
pub use runtime::start_blocking;
pub use runtime::{init_tracing, run};
pub use scheduler::{Scheduler, SchedulerHandle, SchedulerState};
pub use service::ReplicaService;
