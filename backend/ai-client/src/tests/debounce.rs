use crate::debounce::Debouncer;
use crate::error::{AbortReason, RequestError};

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep};

/// **VALUE**: Only the last call per key survives; earlier ones resolve as superseded.
///
/// **WHY THIS MATTERS**: Debounced summaries fire on every keystroke; only the final
/// text should reach the backend.
///
/// **BUG THIS CATCHES**: Would catch a debouncer that lets every call through after its
/// delay, or one that cancels the wrong call.
#[tokio::test(start_paused = true)]
async fn given_three_calls_on_same_key_when_waiting_then_only_last_completes() {
    // GIVEN: One debouncer and three calls 100ms apart with a 500ms quiet period
    let debouncer = Arc::new(Debouncer::new());
    let mut handles = Vec::new();
    for _ in 0..3 {
        let debouncer = debouncer.clone();
        handles.push(tokio::spawn(async move {
            debouncer.wait("note-1", Duration::from_millis(500)).await
        }));
        sleep(Duration::from_millis(100)).await;
    }

    // WHEN: Collecting results
    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }

    // THEN: The first two are superseded, the last passes
    for result in &results[..2] {
        assert!(matches!(
            result,
            Err(RequestError::Aborted { reason: AbortReason::Superseded, .. })
        ));
    }
    assert!(results[2].is_ok());
    assert_eq!(debouncer.pending_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn given_different_keys_when_waiting_then_both_complete() {
    let debouncer = Arc::new(Debouncer::new());
    let other = debouncer.clone();
    let first = tokio::spawn(async move { other.wait("a", Duration::from_millis(200)).await });

    let second = debouncer.wait("b", Duration::from_millis(200)).await;

    assert!(second.is_ok());
    assert!(first.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn given_superseded_call_when_replaced_then_it_resolves_immediately() {
    let debouncer = Arc::new(Debouncer::new());
    let other = debouncer.clone();
    let first = tokio::spawn(async move {
        let result = other.wait("a", Duration::from_secs(10)).await;
        (result, Instant::now())
    });
    sleep(Duration::from_millis(100)).await;
    let replaced_at = Instant::now();

    let (first_out, second) = tokio::join!(first, debouncer.wait("a", Duration::from_millis(50)));
    let (first_result, first_done_at) = first_out.unwrap();
    second.unwrap();

    assert!(first_result.is_err());
    assert_eq!(first_done_at, replaced_at);
}

#[tokio::test(start_paused = true)]
async fn given_pending_calls_when_cancel_all_then_every_waiter_is_superseded() {
    let debouncer = Arc::new(Debouncer::new());
    let mut handles = Vec::new();
    for key in ["a", "b"] {
        let debouncer = debouncer.clone();
        handles.push(tokio::spawn(async move {
            debouncer.wait(key, Duration::from_secs(5)).await
        }));
    }
    sleep(Duration::from_millis(10)).await;

    debouncer.cancel_all();

    for handle in handles {
        assert!(handle.await.unwrap().is_err());
    }
}
