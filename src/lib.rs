#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Deadbolt 🔒
//!
//! Brute-force lockout primitives for async Rust: attempt tracking,
//! sliding-window lockout, pluggable stores, and audit sinks.
//!
//! ## Features
//!
//! - **Attempt tracking** per identifier with a sliding failure window
//! - **Time-boxed lockout** after a configurable failure threshold
//! - **Lazy expiry** on the read path plus an optional background sweeper
//! - **Pluggable stores** via an async, versioned key-value trait
//! - **Audit sinks** built on `tower::Service` for observability
//! - **Injectable clocks** for deterministic tests
//!
//! ## Quick Start
//!
//! ```rust
//! use deadbolt::AttemptTracker;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let tracker = AttemptTracker::new();
//!
//!     // Gate a credential check by hand...
//!     if !tracker.is_blocked("alice").await.unwrap() {
//!         let password_ok = false; // your credential check here
//!         let outcome = tracker.record_attempt("alice", password_ok).await.unwrap();
//!         println!("attempts left: {}", outcome.remaining_attempts());
//!     }
//! }
//! ```
//!
//! Or let [`AttemptTracker::guard`] drive the check/record contract for you.

pub mod audit;
pub mod clock;
pub mod error;
pub mod prelude;
pub mod store;
pub mod sweep;
pub mod tracker;

// Re-exports
pub use audit::{AuditEvent, AuditSink, LogSink, MemorySink, NullSink};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::LockoutError;
pub use store::{AttemptRecord, AttemptStore, InMemoryAttemptStore};
pub use sweep::{SweepConfig, SweepConfigError, Sweeper};
pub use tracker::{
    AttemptTracker, ConfigError, LockoutConfig, Outcome, DEFAULT_ATTEMPT_WINDOW,
    DEFAULT_BLOCK_DURATION, DEFAULT_MAX_ATTEMPTS,
};
