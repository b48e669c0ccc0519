#![allow(dead_code)] // not every test binary uses every helper

use deadbolt::{AttemptTracker, InMemoryAttemptStore, ManualClock, MemorySink, NullSink};

/// Attempt window in milliseconds under the default policy.
pub const WINDOW_MS: u64 = 300_000;
/// Block duration in milliseconds under the default policy.
pub const BLOCK_MS: u64 = 900_000;

/// Default-policy tracker on a manually advanced clock.
pub fn manual_tracker() -> (AttemptTracker, ManualClock) {
    let clock = ManualClock::new();
    let tracker = AttemptTracker::new().with_clock(clock.clone());
    (tracker, clock)
}

/// Like [`manual_tracker`], with a capturing audit sink attached.
pub fn audited_tracker() -> (AttemptTracker<InMemoryAttemptStore, MemorySink>, ManualClock, MemorySink)
{
    let clock = ManualClock::new();
    let sink = MemorySink::new();
    let tracker: AttemptTracker<InMemoryAttemptStore, NullSink> =
        AttemptTracker::new().with_clock(clock.clone());
    let tracker = tracker.with_sink(sink.clone());
    (tracker, clock, sink)
}
