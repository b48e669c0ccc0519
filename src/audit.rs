//! Audit events and sinks for lockout observability.
//!
//! The tracker emits structured events describing every attempt, lockout,
//! and expiry. Events flow through an [`AuditSink`] implemented as a
//! `tower::Service<AuditEvent>`, so sinks compose with the rest of a tower
//! stack. Emission is best-effort: a slow or broken sink never changes an
//! auth decision.

use std::convert::Infallible;
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tower::Service;

#[cfg(feature = "audit-json")]
use serde_json::json;

/// Events emitted by the attempt tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditEvent {
    /// A failed attempt was recorded without tripping the lockout.
    AttemptFailed {
        /// Identifier the attempt was recorded under.
        identifier: String,
        /// Consecutive failures in the current window, after this one.
        attempt_count: u32,
        /// Failures left before the identifier locks out.
        remaining_attempts: u32,
    },
    /// A failed attempt reached the threshold and locked the identifier out.
    LockedOut {
        /// Identifier that locked out.
        identifier: String,
        /// Consecutive failures that tripped the lockout.
        attempt_count: u32,
        /// How long the lockout lasts.
        block_duration: Duration,
    },
    /// A lockout lapsed and its record was dropped on read.
    LockoutExpired {
        /// Identifier whose lockout lapsed.
        identifier: String,
    },
    /// A successful attempt cleared the identifier's history.
    Reset {
        /// Identifier whose history was cleared.
        identifier: String,
    },
    /// A sweep evicted idle records.
    Swept {
        /// Number of records evicted.
        evicted: usize,
    },
}

impl AuditEvent {
    /// Identifier the event concerns, if any (`Swept` has none).
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Self::AttemptFailed { identifier, .. }
            | Self::LockedOut { identifier, .. }
            | Self::LockoutExpired { identifier }
            | Self::Reset { identifier } => Some(identifier),
            Self::Swept { .. } => None,
        }
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AttemptFailed { identifier, attempt_count, remaining_attempts } => write!(
                f,
                "AttemptFailed({}, count={}, remaining={})",
                identifier, attempt_count, remaining_attempts
            ),
            Self::LockedOut { identifier, attempt_count, block_duration } => write!(
                f,
                "LockedOut({}, count={}, duration={:?})",
                identifier, attempt_count, block_duration
            ),
            Self::LockoutExpired { identifier } => write!(f, "LockoutExpired({})", identifier),
            Self::Reset { identifier } => write!(f, "Reset({})", identifier),
            Self::Swept { evicted } => write!(f, "Swept(evicted={})", evicted),
        }
    }
}

#[cfg_attr(not(feature = "audit-json"), allow(dead_code))]
#[inline]
fn clamp_u64(val: u128) -> u64 {
    val.min(u128::from(u64::MAX)) as u64
}

/// Convert an [`AuditEvent`] into a JSON value for sinks.
#[cfg(feature = "audit-json")]
pub fn event_to_json(event: &AuditEvent) -> serde_json::Value {
    match event {
        AuditEvent::AttemptFailed { identifier, attempt_count, remaining_attempts } => json!({
            "kind": "attempt_failed",
            "identifier": identifier,
            "attempt_count": *attempt_count,
            "remaining_attempts": *remaining_attempts,
        }),
        AuditEvent::LockedOut { identifier, attempt_count, block_duration } => json!({
            "kind": "locked_out",
            "identifier": identifier,
            "attempt_count": *attempt_count,
            "block_duration_ms": clamp_u64(block_duration.as_millis()),
        }),
        AuditEvent::LockoutExpired { identifier } => {
            json!({ "kind": "lockout_expired", "identifier": identifier })
        }
        AuditEvent::Reset { identifier } => {
            json!({ "kind": "reset", "identifier": identifier })
        }
        AuditEvent::Swept { evicted } => {
            json!({ "kind": "swept", "evicted": *evicted })
        }
    }
}

/// An audit sink that consumes lockout events.
///
/// Sinks are `Sync` as well as `Send` so that tracker handles holding one
/// stay shareable across threads and their futures stay `Send`.
pub trait AuditSink:
    tower::Service<AuditEvent, Response = (), Error = Self::SinkError>
    + Clone
    + Send
    + Sync
    + 'static
{
    /// The error type for this sink.
    type SinkError: std::error::Error + Send + 'static;
}

/// Best-effort emit helper that honors `poll_ready` and swallows errors.
pub async fn emit_best_effort<S>(sink: S, event: AuditEvent)
where
    S: tower::Service<AuditEvent, Response = ()> + Send + Clone + 'static,
    S::Error: std::error::Error + Send + 'static,
    S::Future: Send + 'static,
{
    use tower::ServiceExt;

    if let Ok(mut ready_sink) = sink.ready_oneshot().await {
        let _ = ready_sink.call(event).await;
    }
}

/// A no-op audit sink that discards all events.
#[derive(Clone, Debug, Default)]
pub struct NullSink;

impl Service<AuditEvent> for NullSink {
    type Response = ();
    type Error = Infallible;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<(), Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _event: AuditEvent) -> Self::Future {
        Box::pin(async { Ok(()) })
    }
}

impl AuditSink for NullSink {
    type SinkError = Infallible;
}

/// An audit sink that logs events using the `tracing` crate.
#[derive(Clone, Debug, Default)]
pub struct LogSink;

impl Service<AuditEvent> for LogSink {
    type Response = ();
    type Error = Infallible;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<(), Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: AuditEvent) -> Self::Future {
        tracing::info!(target: "deadbolt::audit", event = %event, "audit_event");
        Box::pin(async { Ok(()) })
    }
}

impl AuditSink for LogSink {
    type SinkError = Infallible;
}

/// An audit sink that stores events in memory.
///
/// Bounded by `capacity`; the oldest events are evicted first.
#[derive(Clone, Debug)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
    capacity: usize,
    evicted: Arc<AtomicU64>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::with_capacity(10_000)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            capacity: capacity.max(1),
            evicted: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().unwrap().is_empty()
    }

    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<AuditEvent> for MemorySink {
    type Response = ();
    type Error = Infallible;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<(), Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: AuditEvent) -> Self::Future {
        let mut guard = self.events.lock().unwrap();
        if guard.len() >= self.capacity {
            guard.remove(0);
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        guard.push(event);
        Box::pin(async { Ok(()) })
    }
}

impl AuditSink for MemorySink {
    type SinkError = Infallible;
}
