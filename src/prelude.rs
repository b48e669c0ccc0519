//! Convenient re-exports for common Deadbolt types.
pub use crate::{
    audit::{AuditEvent, AuditSink, LogSink, MemorySink, NullSink},
    clock::{Clock, ManualClock, MonotonicClock},
    error::LockoutError,
    store::{AttemptRecord, AttemptStore, InMemoryAttemptStore},
    sweep::{SweepConfig, Sweeper},
    tracker::{AttemptTracker, ConfigError, LockoutConfig, Outcome},
};
