//! Periodic eviction of idle attempt records.
//!
//! The tracker expires state lazily, on the read path, which means an
//! identifier that fails a few times and never comes back holds its record
//! forever. The sweeper bounds that growth: a background task periodically
//! evicts records that have been idle longer than a TTL.

use crate::audit::AuditSink;
use crate::store::AttemptStore;
use crate::tracker::AttemptTracker;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Errors produced when validating sweep configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SweepConfigError {
    /// Sweep interval must be > 0.
    #[error("interval must be > 0 (got {0:?})")]
    InvalidInterval(Duration),
    /// Idle TTL must be > 0.
    #[error("idle_ttl must be > 0 (got {0:?})")]
    InvalidIdleTtl(Duration),
}

/// Validated configuration for the background sweeper.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    interval: Duration,
    idle_ttl: Duration,
}

impl Default for SweepConfig {
    /// Sweep every 5 minutes, evicting records idle for over an hour.
    fn default() -> Self {
        Self { interval: Duration::from_secs(300), idle_ttl: Duration::from_secs(3_600) }
    }
}

impl SweepConfig {
    /// Create a config with validation.
    ///
    /// An `idle_ttl` shorter than the tracker's attempt window forgets
    /// failure streaks before the window does, weakening the lockout;
    /// keep it comfortably above both the window and the block duration.
    pub fn new(interval: Duration, idle_ttl: Duration) -> Result<Self, SweepConfigError> {
        if interval.is_zero() {
            return Err(SweepConfigError::InvalidInterval(interval));
        }
        if idle_ttl.is_zero() {
            return Err(SweepConfigError::InvalidIdleTtl(idle_ttl));
        }
        Ok(Self { interval, idle_ttl })
    }

    /// How often the sweep runs.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// How long a record may sit idle before eviction.
    pub fn idle_ttl(&self) -> Duration {
        self.idle_ttl
    }
}

/// Handle to a background sweep task. The task is aborted when the handle
/// is dropped, so keep it alive for the lifetime of the tracker.
#[derive(Debug)]
pub struct Sweeper {
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Spawn a background task that periodically sweeps the tracker's
    /// store. Must be called from within a tokio runtime.
    pub fn spawn<S, A>(tracker: AttemptTracker<S, A>, config: SweepConfig) -> Self
    where
        S: AttemptStore + 'static,
        A: AuditSink,
        A::Future: Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.interval);
            // The first tick fires immediately; skip it so a fresh tracker
            // is not swept before it has seen any traffic.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match tracker.sweep(config.idle_ttl).await {
                    Ok(evicted) => {
                        tracing::trace!(target: "deadbolt::sweep", evicted, "sweep pass complete");
                    }
                    Err(e) => {
                        tracing::warn!(target: "deadbolt::sweep", error = %e, "sweep pass failed");
                    }
                }
            }
        });
        Self { handle }
    }

    /// Stop the background task.
    pub fn shutdown(self) {
        self.handle.abort();
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
