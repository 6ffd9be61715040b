//! Startup ordering: seed status, settle, start the scheduler.
//!
//! Bootstrap is best-effort. [`bootstrap`] logs and swallows every failure,
//! including a panic inside the driver, so the host process always starts.

use std::time::Duration;

use tokio::sync::broadcast;

use replica_core::ReplicaConfig;

use crate::error::DaemonError;
use crate::scheduler::{Scheduler, SchedulerHandle};
use crate::service::ReplicaService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapOptions {
    pub interval: Duration,
    /// Pause between seeding the status and starting the scheduler.
    pub startup_delay: Duration,
}

impl From<&ReplicaConfig> for BootstrapOptions {
    fn from(config: &ReplicaConfig) -> Self {
        Self {
            interval: config.sync_interval,
            startup_delay: config.startup_delay,
        }
    }
}

/// Seed the store, wait `startup_delay`, then start the scheduler.
pub async fn try_bootstrap(
    service: ReplicaService,
    options: BootstrapOptions,
    shutdown: broadcast::Receiver<()>,
) -> Result<SchedulerHandle, DaemonError> {
    // Run on its own task so a panic surfaces as a join error instead of
    // unwinding through the caller.
    tokio::spawn(sequence(service, options, shutdown))
        .await
        .map_err(|err| DaemonError::Bootstrap(err.to_string()))?
}

/// [`try_bootstrap`], with failures logged and discarded.
pub async fn bootstrap(
    service: ReplicaService,
    options: BootstrapOptions,
    shutdown: broadcast::Receiver<()>,
) -> Option<SchedulerHandle> {
    match try_bootstrap(service, options, shutdown).await {
        Ok(handle) => {
            tracing::info!("replica sync scheduler started successfully");
            Some(handle)
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to set up replica synchronization");
            None
        }
    }
}

async fn sequence(
    service: ReplicaService,
    options: BootstrapOptions,
    shutdown: broadcast::Receiver<()>,
) -> Result<SchedulerHandle, DaemonError> {
    if service.reset_status().await {
        tracing::info!("sync status initialized successfully");
    } else {
        tracing::warn!("failed to initialize sync status, continuing anyway");
    }

    tokio::time::sleep(options.startup_delay).await;

    tracing::info!("starting replica sync scheduler");
    let scheduler = Scheduler::new(service.executor().clone(), options.interval)?;
    Ok(scheduler.start(shutdown).await)
}
