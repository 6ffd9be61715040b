//! Scriptable in-memory driver for tests.
//!
//! Failures and delays are set up front and stay in effect until changed;
//! `fail_next_*` variants apply to a single call. Every connection handed
//! out is counted, and counted again when it is dropped, so tests can
//! assert that no call site leaks one.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use replica_core::ReplicaConfig;

use super::{ReplicaConnection, ReplicaDriver, Rows, SqlValue};
use crate::error::SyncError;

/// Mock replica driver. Clones share the same script and counters.
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    inner: Arc<Mutex<MockDriverInner>>,
}

#[derive(Debug, Default)]
struct MockDriverInner {
    connect_failure: Option<String>,
    connect_delay: Duration,
    sync_failure: Option<String>,
    sync_failures_once: VecDeque<String>,
    sync_delay: Duration,
    query_failure: Option<String>,
    query_rows: Option<Rows>,
    connects: usize,
    closed: usize,
    sync_calls: Vec<Instant>,
    statements: Vec<String>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockDriverInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every `connect` fails with `error` until [`Self::allow_connect`].
    pub fn fail_connect(&self, error: &str) {
        self.lock().connect_failure = Some(error.to_string());
    }

    pub fn allow_connect(&self) {
        self.lock().connect_failure = None;
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        self.lock().connect_delay = delay;
    }

    /// Every `sync` fails with `error` until [`Self::allow_sync`].
    pub fn fail_sync(&self, error: &str) {
        self.lock().sync_failure = Some(error.to_string());
    }

    /// Only the next `sync` fails; queued failures are consumed in order.
    pub fn fail_next_sync(&self, error: &str) {
        self.lock().sync_failures_once.push_back(error.to_string());
    }

    pub fn allow_sync(&self) {
        let mut inner = self.lock();
        inner.sync_failure = None;
        inner.sync_failures_once.clear();
    }

    /// Simulated time each `sync` takes. Pair with a paused tokio clock.
    pub fn set_sync_delay(&self, delay: Duration) {
        self.lock().sync_delay = delay;
    }

    /// Rows every query returns. Defaults to a single `1`.
    pub fn set_query_rows(&self, rows: Rows) {
        self.lock().query_rows = Some(rows);
    }

    pub fn fail_query(&self, error: &str) {
        self.lock().query_failure = Some(error.to_string());
    }

    pub fn connect_count(&self) -> usize {
        self.lock().connects
    }

    pub fn sync_count(&self) -> usize {
        self.lock().sync_calls.len()
    }

    /// Tokio instants at which `sync` was entered.
    pub fn sync_instants(&self) -> Vec<Instant> {
        self.lock().sync_calls.clone()
    }

    /// Connections handed out and not yet dropped.
    pub fn open_connections(&self) -> usize {
        let inner = self.lock();
        inner.connects - inner.closed
    }

    /// SQL text of every `query` and `execute`, in call order.
    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }
}

#[async_trait]
impl ReplicaDriver for MockDriver {
    async fn connect(
        &self,
        _config: &ReplicaConfig,
    ) -> Result<Box<dyn ReplicaConnection>, SyncError> {
        let delay = self.lock().connect_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.lock();
        if let Some(error) = inner.connect_failure.clone() {
            return Err(SyncError::Connection(error));
        }
        inner.connects += 1;
        Ok(Box::new(MockConnection {
            driver: self.clone(),
        }))
    }
}

struct MockConnection {
    driver: MockDriver,
}

#[async_trait]
impl ReplicaConnection for MockConnection {
    async fn sync(&mut self) -> Result<(), SyncError> {
        let (delay, failure) = {
            let mut inner = self.driver.lock();
            inner.sync_calls.push(Instant::now());
            let failure = inner
                .sync_failures_once
                .pop_front()
                .or_else(|| inner.sync_failure.clone());
            (inner.sync_delay, failure)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match failure {
            Some(error) => Err(SyncError::Sync(error)),
            None => Ok(()),
        }
    }

    async fn query(&mut self, sql: &str, _params: Vec<SqlValue>) -> Result<Rows, SyncError> {
        let mut inner = self.driver.lock();
        inner.statements.push(sql.to_string());
        if let Some(error) = inner.query_failure.clone() {
            return Err(SyncError::Query(error));
        }
        Ok(inner
            .query_rows
            .clone()
            .unwrap_or_else(|| vec![vec![SqlValue::Integer(1)]]))
    }

    async fn execute(&mut self, sql: &str, _params: Vec<SqlValue>) -> Result<u64, SyncError> {
        let mut inner = self.driver.lock();
        inner.statements.push(sql.to_string());
        if let Some(error) = inner.query_failure.clone() {
            return Err(SyncError::Query(error));
        }
        Ok(1)
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.driver.lock().closed += 1;
    }
}
