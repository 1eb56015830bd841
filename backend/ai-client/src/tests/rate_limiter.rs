use crate::executor::RateLimiter;

use std::time::Duration;

use tokio::time::{Instant, advance};

#[tokio::test(start_paused = true)]
async fn given_no_previous_call_when_checking_remaining_then_zero() {
    let limiter = RateLimiter::new(Duration::from_secs(1), false);

    assert_eq!(limiter.remaining("ai/summarize"), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn given_recent_completion_when_checking_remaining_then_reports_rest_of_interval() {
    let limiter = RateLimiter::new(Duration::from_secs(1), false);
    limiter.record_completion("ai/summarize");

    advance(Duration::from_millis(300)).await;

    assert_eq!(limiter.remaining("ai/summarize"), Duration::from_millis(700));
    assert_eq!(limiter.remaining("ai/suggest-tags"), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn given_strict_limiter_when_acquiring_too_soon_then_rate_limited_with_remaining() {
    let limiter = RateLimiter::new(Duration::from_secs(1), true);
    limiter.record_completion("ai/summarize");
    advance(Duration::from_millis(250)).await;

    let error = limiter.acquire("ai/summarize").await.unwrap_err();

    assert_eq!(error.retry_after(), Some(Duration::from_millis(750)));
    assert!(error.is_retryable());
}

#[tokio::test(start_paused = true)]
async fn given_lenient_limiter_when_acquiring_too_soon_then_waits_remaining() {
    let limiter = RateLimiter::new(Duration::from_secs(1), false);
    limiter.record_completion("ai/summarize");
    advance(Duration::from_millis(250)).await;
    let before = Instant::now();

    limiter.acquire("ai/summarize").await.unwrap();

    assert_eq!(Instant::now() - before, Duration::from_millis(750));
}

#[tokio::test(start_paused = true)]
async fn given_zero_interval_when_acquiring_then_never_waits() {
    let limiter = RateLimiter::new(Duration::ZERO, true);
    limiter.record_completion("ai/summarize");

    assert!(limiter.acquire("ai/summarize").await.is_ok());
}

/// **VALUE**: Concurrent callers on one endpoint get consecutive slots.
///
/// **WHY THIS MATTERS**: Two editor panes asking for a summary at the same moment
/// must still reach the backend `min_interval` apart.
///
/// **BUG THIS CATCHES**: Would catch `acquire` only reading the remaining time
/// without reserving, letting both callers sleep the same amount and start together.
#[tokio::test(start_paused = true)]
async fn given_two_concurrent_acquires_when_pacing_then_second_slot_one_interval_later() {
    // GIVEN: A lenient limiter with a fresh endpoint
    let limiter = RateLimiter::new(Duration::from_secs(1), false);
    let start = Instant::now();

    // WHEN: Two callers acquire at the same time
    let first = async {
        limiter.acquire("ai/summarize").await.unwrap();
        Instant::now() - start
    };
    let second = async {
        limiter.acquire("ai/summarize").await.unwrap();
        Instant::now() - start
    };
    let (first, second) = tokio::join!(first, second);

    // THEN: The first starts immediately, the second one interval later
    assert_eq!(first, Duration::ZERO);
    assert_eq!(second, Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn given_strict_limiter_when_rejected_then_no_slot_is_reserved() {
    let limiter = RateLimiter::new(Duration::from_secs(1), true);
    limiter.acquire("ai/summarize").await.unwrap();
    advance(Duration::from_millis(400)).await;

    assert!(limiter.acquire("ai/summarize").await.is_err());

    assert_eq!(limiter.remaining("ai/summarize"), Duration::from_millis(600));
}
