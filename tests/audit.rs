mod common;

use common::{audited_tracker, BLOCK_MS};
use deadbolt::AuditEvent;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[tokio::test]
async fn failures_and_lockout_reach_the_sink() {
    let (tracker, _clock, sink) = audited_tracker();

    for _ in 0..5 {
        tracker.record_attempt("alice", false).await.unwrap();
    }

    let events = sink.events();
    assert_eq!(events.len(), 5);
    for (i, event) in events.iter().take(4).enumerate() {
        assert_eq!(
            *event,
            AuditEvent::AttemptFailed {
                identifier: "alice".into(),
                attempt_count: i as u32 + 1,
                remaining_attempts: 4 - i as u32,
            }
        );
    }
    assert_eq!(
        events[4],
        AuditEvent::LockedOut {
            identifier: "alice".into(),
            attempt_count: 5,
            block_duration: Duration::from_millis(BLOCK_MS),
        }
    );
}

#[tokio::test]
async fn reset_and_expiry_are_audited() {
    let (tracker, clock, sink) = audited_tracker();

    tracker.record_attempt("bob", false).await.unwrap();
    tracker.record_attempt("bob", true).await.unwrap();
    assert!(sink.events().contains(&AuditEvent::Reset { identifier: "bob".into() }));

    sink.clear();
    for _ in 0..5 {
        tracker.record_attempt("carol", false).await.unwrap();
    }
    clock.advance(BLOCK_MS + 1);
    assert!(!tracker.is_blocked("carol").await.unwrap());
    assert!(sink
        .events()
        .contains(&AuditEvent::LockoutExpired { identifier: "carol".into() }));
}

#[tokio::test]
async fn success_with_no_history_emits_nothing() {
    let (tracker, _clock, sink) = audited_tracker();

    tracker.record_attempt("mallory", true).await.unwrap();
    assert!(sink.is_empty(), "a success with no record to clear is not an audit event");
}

#[tokio::test]
async fn sweep_eviction_is_audited() {
    let (tracker, clock, sink) = audited_tracker();

    tracker.record_attempt("idle", false).await.unwrap();
    clock.advance(7_200_000); // two hours

    let evicted = tracker.sweep(Duration::from_secs(3_600)).await.unwrap();
    assert_eq!(evicted, 1);
    assert!(sink.events().contains(&AuditEvent::Swept { evicted: 1 }));
}

// Lockouts also land in the log stream, independent of any attached sink.
#[tokio::test]
async fn lockout_emits_a_tracing_warning() {
    use tracing_subscriber::fmt::writer::BoxMakeWriter;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct SharedWriter(Arc<Mutex<Vec<u8>>>);

    impl<'a> MakeWriter<'a> for SharedWriter {
        type Writer = SharedGuard;
        fn make_writer(&'a self) -> Self::Writer {
            SharedGuard(self.0.clone())
        }
    }

    struct SharedGuard(Arc<Mutex<Vec<u8>>>);
    impl std::io::Write for SharedGuard {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let mut guard = self.0.lock().unwrap();
            guard.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let buffer = Arc::new(Mutex::new(Vec::new()));
    let writer = SharedWriter(buffer.clone());
    let subscriber = tracing_subscriber::fmt()
        .with_writer(BoxMakeWriter::new(writer))
        .with_target(true)
        .without_time()
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let (tracker, _clock, _sink) = audited_tracker();
    for _ in 0..5 {
        tracker.record_attempt("alice", false).await.unwrap();
    }

    let logs = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
    assert!(logs.contains("identifier locked out"), "lockout should be logged at warn level");
    assert!(logs.contains("alice"));
}
