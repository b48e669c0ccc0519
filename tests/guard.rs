mod common;

use common::{manual_tracker, BLOCK_MS};
use deadbolt::LockoutError;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
struct BadPassword;

impl fmt::Display for BadPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bad password")
    }
}

impl std::error::Error for BadPassword {}

#[tokio::test]
async fn guard_passes_through_success_and_clears_history() {
    let (tracker, _clock) = manual_tracker();

    tracker.record_attempt("alice", false).await.unwrap();
    tracker.record_attempt("alice", false).await.unwrap();

    let value = tracker
        .guard("alice", || async { Ok::<_, BadPassword>("session-token") })
        .await
        .unwrap();
    assert_eq!(value, "session-token");

    // The success inside the guard reset the streak.
    let outcome = tracker.record_attempt("alice", false).await.unwrap();
    assert_eq!(outcome.remaining_attempts(), 4);
}

#[tokio::test]
async fn guard_records_failures_until_lockout() {
    let (tracker, _clock) = manual_tracker();

    for _ in 0..5 {
        let err = tracker
            .guard("alice", || async { Err::<(), _>(BadPassword) })
            .await
            .unwrap_err();
        assert!(err.is_inner(), "operation errors surface as Inner");
    }

    assert!(tracker.is_blocked("alice").await.unwrap());
}

#[tokio::test]
async fn guard_short_circuits_when_locked_out() {
    let (tracker, clock) = manual_tracker();

    for _ in 0..5 {
        tracker.record_attempt("alice", false).await.unwrap();
    }
    clock.advance(1_000);

    let ran = Arc::new(AtomicUsize::new(0));
    let ran_clone = ran.clone();
    let err = tracker
        .guard("alice", || {
            let ran = ran_clone.clone();
            async move {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok::<_, BadPassword>(())
            }
        })
        .await
        .unwrap_err();

    assert!(err.is_locked_out());
    assert_eq!(err.retry_after(), Some(Duration::from_millis(BLOCK_MS - 1_000)));
    assert_eq!(ran.load(Ordering::SeqCst), 0, "credential check must not run while locked out");
}

#[tokio::test]
async fn guard_allows_again_after_lockout_lapses() {
    let (tracker, clock) = manual_tracker();

    for _ in 0..5 {
        tracker
            .guard("alice", || async { Err::<(), _>(BadPassword) })
            .await
            .unwrap_err();
    }
    assert!(tracker.is_blocked("alice").await.unwrap());

    clock.advance(BLOCK_MS + 1);

    let value = tracker.guard("alice", || async { Ok::<_, BadPassword>(42) }).await.unwrap();
    assert_eq!(value, 42);
    assert!(tracker.store().is_empty());
}

#[tokio::test]
async fn lockout_error_display_mentions_retry_after() {
    let err: LockoutError<BadPassword> =
        LockoutError::LockedOut { retry_after: Duration::from_secs(900) };
    assert!(err.to_string().contains("retry after"));

    let err: LockoutError<BadPassword> = LockoutError::Inner(BadPassword);
    assert_eq!(err.to_string(), "bad password");
}
