//! Storage interface for per-identifier attempt records.
//!
//! The tracker never owns a hidden global map; it borrows an explicitly
//! constructed store, so independent trackers (and tests) get independent
//! state. The trait is async and keyed so that a distributed backend
//! (e.g., Redis) can be dropped in behind the same interface.

use async_trait::async_trait;

/// Failure bookkeeping for one identifier.
///
/// Timestamps are clock milliseconds as produced by [`crate::Clock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptRecord {
    /// Consecutive failed attempts since the window last reset.
    pub attempt_count: u32,
    /// When the most recent attempt was recorded.
    pub last_attempt_at: u64,
    /// When set and in the future, the identifier is locked out.
    pub blocked_until: Option<u64>,
}

impl AttemptRecord {
    /// Last instant this record was "active": the lockout deadline for a
    /// blocked record, otherwise the last attempt. Sweeping keys off this.
    pub fn idle_since(&self) -> u64 {
        self.blocked_until.map_or(self.last_attempt_at, |b| b.max(self.last_attempt_at))
    }
}

/// Abstract storage for attempt records.
///
/// Entries are versioned: `get` returns the record together with an opaque
/// version, and `put` succeeds only if the entry still carries the version
/// the caller read (`prev: Some(v)`) or still does not exist
/// (`prev: None`). The tracker layers an optimistic retry loop on top, so
/// concurrent read-modify-write sequences for one identifier serialize
/// without a lock spanning the store call.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch the record and its current version for `key`.
    async fn get(&self, key: &str) -> Result<Option<(AttemptRecord, u64)>, Self::Error>;

    /// Write `record` under `key` if the entry is unchanged since the read.
    ///
    /// Returns `Ok(false)` when another writer got there first; the caller
    /// should re-read and retry.
    async fn put(
        &self,
        key: &str,
        record: AttemptRecord,
        prev: Option<u64>,
    ) -> Result<bool, Self::Error>;

    /// Delete the record for `key`. Deleting a missing key is a no-op.
    async fn remove(&self, key: &str) -> Result<(), Self::Error>;

    /// Delete every record whose [`AttemptRecord::idle_since`] is strictly
    /// before `idle_cutoff_millis`. Returns the number of records evicted.
    async fn sweep(&self, idle_cutoff_millis: u64) -> Result<usize, Self::Error>;
}

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

/// In-memory store: process-local and volatile, state dies with the process.
#[derive(Default, Clone, Debug)]
pub struct InMemoryAttemptStore {
    // Map key -> (record, version). Versions only ever grow.
    data: Arc<Mutex<Inner>>,
}

#[derive(Default, Debug)]
struct Inner {
    entries: HashMap<String, (AttemptRecord, u64)>,
    next_version: u64,
}

impl InMemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked identifiers. Mostly useful in tests and gauges.
    pub fn len(&self) -> usize {
        self.data.lock().expect("attempt store poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AttemptStore for InMemoryAttemptStore {
    type Error = Infallible;

    async fn get(&self, key: &str) -> Result<Option<(AttemptRecord, u64)>, Self::Error> {
        let guard = self.data.lock().expect("attempt store poisoned");
        Ok(guard.entries.get(key).copied())
    }

    async fn put(
        &self,
        key: &str,
        record: AttemptRecord,
        prev: Option<u64>,
    ) -> Result<bool, Self::Error> {
        let mut guard = self.data.lock().expect("attempt store poisoned");

        match (prev, guard.entries.get(key)) {
            // Insert-if-absent, but the key appeared since the read.
            (None, Some(_)) => return Ok(false),
            // Entry vanished or was rewritten since the read.
            (Some(_), None) => return Ok(false),
            (Some(v), Some(&(_, current))) if current != v => return Ok(false),
            _ => {}
        }

        guard.next_version += 1;
        let version = guard.next_version;
        guard.entries.insert(key.to_string(), (record, version));
        Ok(true)
    }

    async fn remove(&self, key: &str) -> Result<(), Self::Error> {
        let mut guard = self.data.lock().expect("attempt store poisoned");
        guard.entries.remove(key);
        Ok(())
    }

    async fn sweep(&self, idle_cutoff_millis: u64) -> Result<usize, Self::Error> {
        let mut guard = self.data.lock().expect("attempt store poisoned");
        let before = guard.entries.len();
        guard.entries.retain(|_, (record, _)| record.idle_since() >= idle_cutoff_millis);
        Ok(before - guard.entries.len())
    }
}
