mod common;

use common::RecordingSleeper;
use m365_provider::{CriticalSection, PollPolicy, PollState, ProviderError, Sleeper, TokioSleeper, poll_until};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

const INTERVAL: Duration = Duration::from_millis(500);

// ── Polling ─────────────────────────────────────────────────────

#[tokio::test]
async fn poll_sleeps_between_pending_probes() {
    let sleeper = RecordingSleeper::new();
    let calls = &AtomicU32::new(0);

    let value = poll_until(&PollPolicy::every(INTERVAL), sleeper.as_ref(), "upload", move || async move {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(if n < 3 { PollState::Pending } else { PollState::Done(n) })
    })
    .await
    .unwrap();

    assert_eq!(value, 3);
    assert_eq!(sleeper.slept(), vec![INTERVAL, INTERVAL]);
}

#[tokio::test]
async fn poll_stops_at_the_first_probe_error() {
    let sleeper = RecordingSleeper::new();
    let result: Result<(), _> = poll_until(&PollPolicy::every(INTERVAL), sleeper.as_ref(), "publishing", || async {
        Err(ProviderError::UnexpectedState {
            what: "app publishing".to_string(),
            state: "failed".to_string(),
        })
    })
    .await;

    assert!(matches!(result, Err(ProviderError::UnexpectedState { state, .. }) if state == "failed"));
    assert!(sleeper.slept().is_empty());
}

#[tokio::test]
async fn poll_gives_up_after_max_attempts() {
    let sleeper = RecordingSleeper::new();
    let policy = PollPolicy::every(INTERVAL).with_max_attempts(4);
    let result: Result<(), _> =
        poll_until(&policy, sleeper.as_ref(), "commit", || async { Ok(PollState::Pending) }).await;

    match result {
        Err(ProviderError::PollExhausted { what, attempts }) => {
            assert_eq!(what, "commit");
            assert_eq!(attempts, 4);
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert_eq!(sleeper.slept().len(), 3);
}

#[tokio::test]
async fn poll_deadline_bounds_total_sleep() {
    let sleeper = RecordingSleeper::new();
    let policy = PollPolicy::every(INTERVAL).with_deadline(Duration::from_millis(1_200));
    let result: Result<(), _> =
        poll_until(&policy, sleeper.as_ref(), "upload", || async { Ok(PollState::Pending) }).await;

    assert!(matches!(result, Err(ProviderError::PollExhausted { attempts: 3, .. })));
    assert_eq!(sleeper.slept(), vec![INTERVAL, INTERVAL]);
}

// ── Critical section ────────────────────────────────────────────

#[tokio::test]
async fn uncontended_entry_does_not_settle() {
    let sleeper = RecordingSleeper::new();
    let section = CriticalSection::new(Duration::from_secs(3));
    drop(section.enter(sleeper.as_ref()).await);
    drop(section.enter(sleeper.as_ref()).await);
    assert!(sleeper.slept().is_empty());
}

#[tokio::test]
async fn contended_entry_waits_the_settle_delay() {
    let sleeper = RecordingSleeper::new();
    let section = Arc::new(CriticalSection::new(Duration::from_secs(3)));

    let guard = section.enter(sleeper.as_ref()).await;
    let waiter = {
        let section = section.clone();
        let sleeper = sleeper.clone();
        tokio::spawn(async move {
            let _guard = section.enter(sleeper.as_ref()).await;
        })
    };
    tokio::task::yield_now().await;
    assert!(sleeper.slept().is_empty());

    drop(guard);
    waiter.await.unwrap();
    assert_eq!(sleeper.slept(), vec![Duration::from_secs(3)]);
}

#[tokio::test(start_paused = true)]
async fn tokio_sleeper_waits_on_the_timer() {
    let start = tokio::time::Instant::now();
    TokioSleeper.sleep(Duration::from_secs(2)).await;
    assert!(start.elapsed() >= Duration::from_secs(2));

    let start = tokio::time::Instant::now();
    TokioSleeper.sleep(Duration::ZERO).await;
    assert_eq!(start.elapsed(), Duration::ZERO);
}
