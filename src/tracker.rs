//! Attempt tracking with sliding-window lockout.
//!
//! The tracker gates authentication attempts by identifier: consecutive
//! failures inside the attempt window accumulate, and reaching the
//! threshold locks the identifier out for a fixed duration. A success
//! clears the identifier's history immediately; an elapsed lockout is
//! dropped lazily the next time the identifier is checked or recorded.

use crate::audit::{emit_best_effort, AuditEvent, AuditSink, NullSink};
use crate::clock::{Clock, MonotonicClock};
use crate::error::LockoutError;
use crate::store::{AttemptRecord, AttemptStore, InMemoryAttemptStore};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Default failure threshold before an identifier locks out.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Default lockout duration (15 minutes).
pub const DEFAULT_BLOCK_DURATION: Duration = Duration::from_millis(900_000);
/// Default window after which a stale failure count is discarded (5 minutes).
pub const DEFAULT_ATTEMPT_WINDOW: Duration = Duration::from_millis(300_000);

/// How many optimistic store commits to attempt before giving up.
const CAS_RETRIES: usize = 8;

/// Errors produced when validating lockout configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Failure threshold must be > 0.
    #[error("max_attempts must be > 0 (got {provided})")]
    InvalidMaxAttempts {
        /// Value provided by caller.
        provided: u32,
    },
    /// Lockout duration must be > 0.
    #[error("block_duration must be > 0 (got {0:?})")]
    InvalidBlockDuration(Duration),
    /// Attempt window must be > 0.
    #[error("attempt_window must be > 0 (got {0:?})")]
    InvalidAttemptWindow(Duration),
}

/// Validated configuration for the attempt tracker.
#[derive(Debug, Clone)]
pub struct LockoutConfig {
    max_attempts: u32,
    block_duration: Duration,
    attempt_window: Duration,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            block_duration: DEFAULT_BLOCK_DURATION,
            attempt_window: DEFAULT_ATTEMPT_WINDOW,
        }
    }
}

impl LockoutConfig {
    /// Create a config with validation.
    pub fn new(
        max_attempts: u32,
        block_duration: Duration,
        attempt_window: Duration,
    ) -> Result<Self, ConfigError> {
        if max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts { provided: 0 });
        }
        if block_duration.is_zero() {
            return Err(ConfigError::InvalidBlockDuration(block_duration));
        }
        if attempt_window.is_zero() {
            return Err(ConfigError::InvalidAttemptWindow(attempt_window));
        }
        Ok(Self { max_attempts, block_duration, attempt_window })
    }

    /// Consecutive failures before an identifier locks out.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// How long a lockout lasts.
    pub fn block_duration(&self) -> Duration {
        self.block_duration
    }

    /// Rolling period after which a stale failure count is discarded.
    pub fn attempt_window(&self) -> Duration {
        self.attempt_window
    }
}

/// Result of recording an authentication attempt.
///
/// "Locked out" is policy, not an error: the attempt was recorded and this
/// is the tracker's verdict on what the caller should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Further attempts are allowed.
    Allowed {
        /// Failures left before the identifier locks out.
        remaining_attempts: u32,
    },
    /// This attempt tripped the lockout.
    LockedOut {
        /// How long the lockout lasts.
        block_duration: Duration,
    },
}

impl Outcome {
    /// Whether this attempt tripped the lockout.
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::LockedOut { .. })
    }

    /// Failures left before lockout; zero when locked out.
    pub fn remaining_attempts(&self) -> u32 {
        match self {
            Self::Allowed { remaining_attempts } => *remaining_attempts,
            Self::LockedOut { .. } => 0,
        }
    }

    /// Lockout duration, present only when locked out.
    pub fn block_duration(&self) -> Option<Duration> {
        match self {
            Self::LockedOut { block_duration } => Some(*block_duration),
            Self::Allowed { .. } => None,
        }
    }
}

/// Per-identifier attempt tracker.
///
/// Clones share the same underlying store via `Arc`, so all handles observe
/// and affect the same lockout state. State is process-local and volatile:
/// every identifier unlocks on restart.
///
/// # Example
/// ```
/// use deadbolt::AttemptTracker;
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let tracker = AttemptTracker::new();
/// for _ in 0..5 {
///     tracker.record_attempt("alice", false).await.unwrap();
/// }
/// assert!(tracker.is_blocked("alice").await.unwrap());
/// # });
/// ```
#[derive(Debug)]
pub struct AttemptTracker<S = InMemoryAttemptStore, A = NullSink> {
    store: Arc<S>,
    config: LockoutConfig,
    clock: Arc<dyn Clock>,
    sink: A,
}

impl<S, A: Clone> Clone for AttemptTracker<S, A> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            clock: Arc::clone(&self.clock),
            sink: self.sink.clone(),
        }
    }
}

impl AttemptTracker<InMemoryAttemptStore, NullSink> {
    /// Tracker with default policy (5 attempts, 15 min lockout, 5 min
    /// window), an in-memory store, and no audit sink.
    pub fn new() -> Self {
        Self::with_config(LockoutConfig::default())
    }

    /// Tracker with an explicit policy. Build the config via
    /// [`LockoutConfig::new`] to get validation.
    pub fn with_config(config: LockoutConfig) -> Self {
        Self {
            store: Arc::new(InMemoryAttemptStore::new()),
            config,
            clock: Arc::new(MonotonicClock::default()),
            sink: NullSink,
        }
    }
}

impl Default for AttemptTracker<InMemoryAttemptStore, NullSink> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, A> AttemptTracker<S, A> {
    /// Swap in a different record store (e.g., a distributed backend).
    pub fn with_store<S2: AttemptStore>(self, store: S2) -> AttemptTracker<S2, A> {
        AttemptTracker {
            store: Arc::new(store),
            config: self.config,
            clock: self.clock,
            sink: self.sink,
        }
    }

    /// Attach an audit sink; every attempt, lockout, and expiry flows to it.
    pub fn with_sink<A2: AuditSink>(self, sink: A2) -> AttemptTracker<S, A2> {
        AttemptTracker { store: self.store, config: self.config, clock: self.clock, sink }
    }

    /// Override the clock (useful for deterministic tests).
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// The active lockout policy.
    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }

    /// Shared handle to the record store.
    pub fn store(&self) -> Arc<S> {
        Arc::clone(&self.store)
    }

    fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl<S, A> AttemptTracker<S, A>
where
    S: AttemptStore,
    A: AuditSink,
    A::Future: Send + 'static,
{
    /// Whether `identifier` is currently locked out.
    ///
    /// Lazy expiry: a record whose lockout deadline has passed is deleted
    /// as a side effect of this check, and the check reports unlocked.
    pub async fn is_blocked(&self, identifier: &str) -> Result<bool, S::Error> {
        let now = self.now_millis();
        match self.store.get(identifier).await? {
            Some((record, _)) => match record.blocked_until {
                Some(until) if until > now => Ok(true),
                Some(_) => {
                    self.store.remove(identifier).await?;
                    tracing::debug!(
                        target: "deadbolt::tracker",
                        identifier,
                        "lockout lapsed; record dropped"
                    );
                    emit_best_effort(
                        self.sink.clone(),
                        AuditEvent::LockoutExpired { identifier: identifier.to_string() },
                    )
                    .await;
                    Ok(false)
                }
                None => Ok(false),
            },
            None => Ok(false),
        }
    }

    /// Time until the lockout for `identifier` lapses; zero when not
    /// locked out (including when no record exists). No side effects.
    pub async fn remaining_block_time(&self, identifier: &str) -> Result<Duration, S::Error> {
        let now = self.now_millis();
        let remaining = match self.store.get(identifier).await? {
            Some((AttemptRecord { blocked_until: Some(until), .. }, _)) if until > now => {
                Duration::from_millis(until - now)
            }
            _ => Duration::ZERO,
        };
        Ok(remaining)
    }

    /// Record the outcome of a completed credential check.
    ///
    /// A success deletes the identifier's record; a failure increments the
    /// count (resetting it first when the attempt window has lapsed) and
    /// locks the identifier out at the threshold. Always returns the new
    /// state; callers are expected to have consulted [`Self::is_blocked`]
    /// before running the credential check.
    pub async fn record_attempt(
        &self,
        identifier: &str,
        success: bool,
    ) -> Result<Outcome, S::Error> {
        if success {
            return self.record_success(identifier).await;
        }
        self.record_failure(identifier).await
    }

    async fn record_success(&self, identifier: &str) -> Result<Outcome, S::Error> {
        let existed = self.store.get(identifier).await?.is_some();
        self.store.remove(identifier).await?;
        if existed {
            tracing::debug!(
                target: "deadbolt::tracker",
                identifier,
                "successful attempt; history cleared"
            );
            emit_best_effort(
                self.sink.clone(),
                AuditEvent::Reset { identifier: identifier.to_string() },
            )
            .await;
        }
        Ok(Outcome::Allowed { remaining_attempts: self.config.max_attempts })
    }

    async fn record_failure(&self, identifier: &str) -> Result<Outcome, S::Error> {
        let now = self.now_millis();
        let window = duration_millis(self.config.attempt_window);

        // Optimistic commit loop: the versioned store serializes concurrent
        // read-modify-write sequences for the same identifier.
        for _ in 0..CAS_RETRIES {
            let existing = self.store.get(identifier).await?;
            let prev = existing.map(|(_, version)| version);
            let mut record = existing.map_or(
                AttemptRecord { attempt_count: 0, last_attempt_at: now, blocked_until: None },
                |(record, _)| record,
            );

            if now.saturating_sub(record.last_attempt_at) > window {
                // Stale window: the streak starts over.
                record.attempt_count = 0;
            }
            record.attempt_count += 1;
            record.last_attempt_at = now;

            let outcome = if record.attempt_count >= self.config.max_attempts {
                record.blocked_until =
                    Some(now.saturating_add(duration_millis(self.config.block_duration)));
                Outcome::LockedOut { block_duration: self.config.block_duration }
            } else {
                record.blocked_until = None;
                Outcome::Allowed {
                    remaining_attempts: self.config.max_attempts - record.attempt_count,
                }
            };

            if !self.store.put(identifier, record, prev).await? {
                // Lost the race; re-read and retry.
                continue;
            }

            match outcome {
                Outcome::LockedOut { block_duration } => {
                    tracing::warn!(
                        target: "deadbolt::tracker",
                        identifier,
                        failures = record.attempt_count,
                        block_ms = duration_millis(block_duration),
                        "identifier locked out"
                    );
                    emit_best_effort(
                        self.sink.clone(),
                        AuditEvent::LockedOut {
                            identifier: identifier.to_string(),
                            attempt_count: record.attempt_count,
                            block_duration,
                        },
                    )
                    .await;
                }
                Outcome::Allowed { remaining_attempts } => {
                    tracing::debug!(
                        target: "deadbolt::tracker",
                        identifier,
                        failures = record.attempt_count,
                        remaining = remaining_attempts,
                        "failed attempt recorded"
                    );
                    emit_best_effort(
                        self.sink.clone(),
                        AuditEvent::AttemptFailed {
                            identifier: identifier.to_string(),
                            attempt_count: record.attempt_count,
                            remaining_attempts,
                        },
                    )
                    .await;
                }
            }
            return Ok(outcome);
        }

        // Commit kept losing races; report the winning writer's state
        // rather than fail what is otherwise a total operation.
        tracing::warn!(
            target: "deadbolt::tracker",
            identifier,
            retries = CAS_RETRIES,
            "attempt store contention; failure not recorded"
        );
        let outcome = match self.store.get(identifier).await? {
            Some((record, _)) if record.blocked_until.is_some_and(|until| until > now) => {
                Outcome::LockedOut { block_duration: self.config.block_duration }
            }
            Some((record, _)) => Outcome::Allowed {
                remaining_attempts: self.config.max_attempts.saturating_sub(record.attempt_count),
            },
            None => Outcome::Allowed { remaining_attempts: self.config.max_attempts },
        };
        Ok(outcome)
    }

    /// Evict records idle longer than `idle_ttl`.
    ///
    /// A record's idle point is its last attempt, or its lockout deadline
    /// when blocked, so an active lockout is never evicted by a TTL of at
    /// least zero. Returns the number of records dropped.
    pub async fn sweep(&self, idle_ttl: Duration) -> Result<usize, S::Error> {
        let cutoff = self.now_millis().saturating_sub(duration_millis(idle_ttl));
        let evicted = self.store.sweep(cutoff).await?;
        if evicted > 0 {
            tracing::debug!(target: "deadbolt::tracker", evicted, "idle attempt records swept");
            emit_best_effort(self.sink.clone(), AuditEvent::Swept { evicted }).await;
        }
        Ok(evicted)
    }

    /// Run a credential check under lockout protection.
    ///
    /// Checks the lockout first, runs `operation` only when the identifier
    /// is not locked out, and records the outcome exactly once. This is the
    /// caller contract (`is_blocked` before, `record_attempt` after) rolled
    /// into one combinator.
    ///
    /// # Errors
    /// Returns [`LockoutError::LockedOut`] without running the operation if
    /// the identifier is locked out, and [`LockoutError::Inner`] when the
    /// operation itself fails (after recording the failure).
    pub async fn guard<T, E, Fut, Op>(
        &self,
        identifier: &str,
        operation: Op,
    ) -> Result<T, LockoutError<E>>
    where
        T: Send,
        E: std::error::Error + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send,
        Op: FnOnce() -> Fut + Send,
    {
        if self.is_blocked(identifier).await.map_err(|e| LockoutError::Store(Box::new(e)))? {
            let retry_after = self
                .remaining_block_time(identifier)
                .await
                .map_err(|e| LockoutError::Store(Box::new(e)))?;
            return Err(LockoutError::LockedOut { retry_after });
        }

        match operation().await {
            Ok(value) => {
                self.record_attempt(identifier, true)
                    .await
                    .map_err(|e| LockoutError::Store(Box::new(e)))?;
                Ok(value)
            }
            Err(inner) => {
                self.record_attempt(identifier, false)
                    .await
                    .map_err(|e| LockoutError::Store(Box::new(e)))?;
                Err(LockoutError::Inner(inner))
            }
        }
    }
}
