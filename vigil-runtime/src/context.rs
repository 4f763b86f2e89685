//! Per-invocation context: deadline, cancellation, clock and borrowed stores

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use vigil_storage::{ExecutionHistory, SuiteRepository, WarehouseProbe};

/// Store handles lent to one pipeline operation
///
/// The pipeline never owns or closes these; the caller keeps the pools.
#[derive(Clone, Copy)]
pub struct Stores<'a> {
    pub suites: &'a dyn SuiteRepository,
    pub history: &'a dyn ExecutionHistory,
    pub warehouse: &'a dyn WarehouseProbe,
}

/// Deadline and cancellation for the network round trips of one call
#[derive(Debug, Clone)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancellation: CancellationToken,
    now: DateTime<Utc>,
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CallContext {
    /// No deadline, a fresh token, and the current wall-clock time
    pub fn new() -> Self {
        Self {
            deadline: None,
            cancellation: CancellationToken::new(),
            now: Utc::now(),
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Pin the time the call is evaluated at
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Time the call is evaluated at
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Await `fut`, aborting on cancellation or deadline expiry
    pub async fn run<T, E, F>(&self, step: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        Error: From<E>,
    {
        if self.cancellation.is_cancelled() {
            return Err(Error::Cancelled(step));
        }

        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(Error::Cancelled(step)),
            _ = expire(self.deadline) => Err(Error::DeadlineExceeded(step)),
            res = fut => res.map_err(Error::from),
        }
    }
}

async fn expire(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
