use super::support::{RecordingSink, analytics_config, event, event_types, recording_queue};

use crate::analytics::{AnalyticsQueue, FlushOutcome};
use crate::config::AnalyticsConfig;

use models::AnalyticsEventType;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep};

/// Let spawned flush tasks run to completion under paused time.
async fn settle() {
    sleep(Duration::from_millis(1)).await;
}

/// **VALUE**: Reaching the batch size triggers exactly one automatic flush of that batch.
///
/// **WHY THIS MATTERS**: Flushing per event would multiply analytics traffic tenfold;
/// never flushing automatically would lose everything on a crash.
///
/// **BUG THIS CATCHES**: Would catch an off-by-one threshold or the 11th event being
/// swept into the in-flight batch.
#[tokio::test(start_paused = true)]
async fn given_eleven_events_when_tracked_then_one_flush_of_ten_and_eleventh_held() {
    // GIVEN: A queue with batch size 10
    let (queue, sink) = recording_queue(10);

    // WHEN: Tracking 11 events
    for n in 0..11 {
        queue.track(event(n));
    }
    settle().await;

    // THEN: One batch of the first ten was sent, the 11th waits
    let batches = sink.sent_batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 10);
    assert_eq!(batches[0][0].endpoint, "endpoint-0");
    assert_eq!(batches[0][9].endpoint, "endpoint-9");
    assert_eq!(queue.pending_len(), 1);
    assert_eq!(queue.pending_events()[0].endpoint, "endpoint-10");
}

#[tokio::test(start_paused = true)]
async fn given_nine_events_when_tracked_then_nothing_is_sent() {
    let (queue, sink) = recording_queue(10);

    for n in 0..9 {
        queue.track(event(n));
    }
    settle().await;

    assert_eq!(sink.send_calls(), 0);
    assert_eq!(queue.pending_len(), 9);
}

#[tokio::test(start_paused = true)]
async fn given_queued_events_when_flush_succeeds_then_queue_empties() {
    let (queue, sink) = recording_queue(10);
    queue.track(event(0));
    queue.track(event(1));

    let outcome = queue.flush().await;

    assert_eq!(outcome, FlushOutcome::Sent { events: 2 });
    assert_eq!(queue.pending_len(), 0);
    assert_eq!(sink.sent_batches()[0].len(), 2);
}

#[tokio::test(start_paused = true)]
async fn given_empty_queue_when_flush_then_nothing_is_sent() {
    let (queue, sink) = recording_queue(10);

    assert_eq!(queue.flush().await, FlushOutcome::Empty);
    assert_eq!(sink.send_calls(), 0);
}

/// **VALUE**: A batch that fails every attempt is requeued in order with one error marker.
///
/// **WHY THIS MATTERS**: Analytics outages must not lose data, and they must not flood
/// the queue with error events about themselves.
///
/// **BUG THIS CATCHES**: Would catch reversed requeue order, a wrong attempt count, or
/// backoff that is not exponential.
#[tokio::test(start_paused = true)]
async fn given_sink_always_failing_when_flush_then_three_attempts_and_batch_requeued() {
    // GIVEN: A sink that fails more often than we retry
    let sink = Arc::new(RecordingSink::failing(100));
    let queue = AnalyticsQueue::new(analytics_config(10), sink.clone());
    for n in 0..3 {
        queue.track(event(n));
    }
    let before = Instant::now();

    // WHEN: Flushing
    let outcome = queue.flush().await;

    // THEN: Three attempts with 1s and 2s waits, then requeue plus one error event
    assert_eq!(outcome, FlushOutcome::Requeued { events: 3 });
    assert_eq!(*sink.attempts.lock().unwrap(), vec![0, 1, 2]);
    assert_eq!(Instant::now() - before, Duration::from_millis(3_000));

    let pending = queue.pending_events();
    assert_eq!(pending.len(), 4);
    assert_eq!(pending[0].endpoint, "endpoint-0");
    assert_eq!(pending[2].endpoint, "endpoint-2");
    assert_eq!(pending[3].event_type, AnalyticsEventType::AnalyticsError);
    assert_eq!(pending[3].metadata["failedEvents"], 3);
}

#[tokio::test(start_paused = true)]
async fn given_previous_error_marker_when_flush_fails_again_then_only_one_marker_remains() {
    let sink = Arc::new(RecordingSink::failing(100));
    let queue = AnalyticsQueue::new(analytics_config(10), sink.clone());
    queue.track(event(0));
    queue.flush().await;
    queue.track(event(1));

    queue.flush().await;

    let types = event_types(&queue.pending_events());
    let markers = types
        .iter()
        .filter(|t| **t == AnalyticsEventType::AnalyticsError)
        .count();
    assert_eq!(markers, 1);
    assert_eq!(queue.pending_events()[0].endpoint, "endpoint-0");
    assert_eq!(queue.pending_events()[1].endpoint, "endpoint-1");
}

#[tokio::test(start_paused = true)]
async fn given_sink_recovers_on_second_attempt_when_flush_then_sent_once() {
    let sink = Arc::new(RecordingSink::failing(1));
    let queue = AnalyticsQueue::new(analytics_config(10), sink.clone());
    queue.track(event(0));

    let outcome = queue.flush().await;

    assert_eq!(outcome, FlushOutcome::Sent { events: 1 });
    assert_eq!(*sink.attempts.lock().unwrap(), vec![0, 1]);
    assert_eq!(queue.pending_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn given_analytics_disabled_when_tracking_then_nothing_is_queued() {
    let sink = Arc::new(RecordingSink::default());
    let config = AnalyticsConfig {
        enabled: false,
        ..AnalyticsConfig::default()
    };
    let queue = AnalyticsQueue::new(config, sink.clone());

    for n in 0..20 {
        queue.track(event(n));
    }
    settle().await;

    assert_eq!(queue.pending_len(), 0);
    assert_eq!(sink.send_calls(), 0);
}

/// **VALUE**: The periodic timer flushes partial batches.
///
/// **WHY THIS MATTERS**: On a quiet client the batch threshold may never be reached;
/// without the timer those events would sit in memory indefinitely.
///
/// **BUG THIS CATCHES**: Would catch a timer that is never started or fires only once.
#[tokio::test(start_paused = true)]
async fn given_started_queue_when_flush_interval_passes_then_partial_batch_is_sent() {
    let (queue, sink) = recording_queue(10);
    queue.start();
    queue.track(event(0));

    sleep(Duration::from_secs(31)).await;
    assert_eq!(sink.sent_batches().len(), 1);

    queue.track(event(1));
    sleep(Duration::from_secs(30)).await;
    assert_eq!(sink.sent_batches().len(), 2);

    queue.cleanup().await;
}

#[tokio::test(start_paused = true)]
async fn given_failing_sink_when_cleanup_then_single_final_attempt_and_state_cleared() {
    let sink = Arc::new(RecordingSink::failing(100));
    let queue = AnalyticsQueue::new(analytics_config(10), sink.clone());
    queue.start();
    queue.track(event(0));
    queue.track(event(1));

    queue.cleanup().await;

    assert_eq!(sink.send_calls(), 1);
    assert_eq!(queue.pending_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn given_in_flight_threshold_flush_when_cleanup_then_it_completes_first() {
    let (queue, sink) = recording_queue(2);
    queue.track(event(0));
    queue.track(event(1));
    queue.track(event(2));

    queue.cleanup().await;

    let batches = sink.sent_batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].len(), 2);
    assert_eq!(batches[1][0].endpoint, "endpoint-2");
}
