//! Fixed-interval sync scheduler.
//!
//! `Idle → InitialSync → Running { tick } → … → Stopped`
//!
//! The initial attempt runs on the caller's task before [`Scheduler::start`]
//! returns; every later attempt runs on a spawned task, one per interval,
//! until the shutdown channel fires. Failed ticks do not change the cadence.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use replica_sync::SyncExecutor;

use crate::error::DaemonError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    InitialSync,
    Running { tick: u64 },
    Stopped,
}

pub struct Scheduler {
    executor: SyncExecutor,
    interval: Duration,
    state: watch::Sender<SchedulerState>,
}

/// Running scheduler: its background task plus a view of its state.
pub struct SchedulerHandle {
    task: JoinHandle<()>,
    state: watch::Receiver<SchedulerState>,
}

impl SchedulerHandle {
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.clone()
    }

    /// Wait for the loop to exit after shutdown was signalled.
    pub async fn join(self) -> Result<(), DaemonError> {
        self.task.await.map_err(|source| DaemonError::TaskJoin {
            task: "scheduler",
            source,
        })
    }
}

impl Scheduler {
    pub fn new(executor: SyncExecutor, interval: Duration) -> Result<Self, DaemonError> {
        if interval.is_zero() {
            return Err(DaemonError::InvalidInterval(interval));
        }
        let (state, _) = watch::channel(SchedulerState::Idle);
        Ok(Self {
            executor,
            interval,
            state,
        })
    }

    /// Run the initial sync, then spawn the interval loop.
    pub async fn start(self, shutdown: broadcast::Receiver<()>) -> SchedulerHandle {
        self.state.send_replace(SchedulerState::InitialSync);
        tracing::info!("performing initial sync at startup");
        if self.executor.run_sync().await {
            tracing::info!("initial sync completed successfully");
        } else {
            tracing::warn!("initial sync failed, will retry in background");
        }

        let state = self.state.subscribe();
        let interval_secs = self.interval.as_secs();
        let task = tokio::spawn(self.run_loop(shutdown));
        tracing::info!(interval_secs, "started sync scheduler");

        SchedulerHandle { task, state }
    }

    async fn run_loop(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the initial sync already covered it.
        ticker.tick().await;

        let interval_secs = self.interval.as_secs();
        let mut tick = 0u64;
        self.state.send_replace(SchedulerState::Running { tick });

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {
                    tick += 1;
                    self.state.send_replace(SchedulerState::Running { tick });
                    // A panic inside the attempt ends only this task.
                    let executor = self.executor.clone();
                    let mut attempt = tokio::spawn(async move { executor.run_sync().await });
                    tokio::select! {
                        _ = shutdown.recv() => {
                            attempt.abort();
                            let _ = attempt.await;
                            break;
                        }
                        joined = &mut attempt => match joined {
                            Ok(true) => {
                                tracing::info!(tick, interval_secs, "scheduled sync successful, next sync in {interval_secs} seconds");
                            }
                            Ok(false) => {
                                tracing::warn!(tick, interval_secs, "scheduled sync failed, will retry in {interval_secs} seconds");
                            }
                            Err(err) => {
                                tracing::error!(tick, error = %err, "scheduled sync task crashed, will retry in {interval_secs} seconds");
                                self.executor.record_failure(format!("sync task aborted: {err}"));
                            }
                        }
                    }
                }
            }
        }

        self.state.send_replace(SchedulerState::Stopped);
        tracing::info!(ticks = tick, "sync scheduler stopped");
    }
}
