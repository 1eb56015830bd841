use crate::helpers::{TEST_TOKEN, fast_config, note_file, state_for};

use notes_ai::cli::{DifficultyArg, FlashcardsArgs, StyleArg, SummarizeArgs, TagsArgs};
use notes_ai::commands::{ai, listen};
use notes_ai::error::AppError;

use std::path::PathBuf;
use std::time::Duration;

use futures_util::SinkExt;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WAIT: Duration = Duration::from_secs(5);

// ============================================================================
// AI commands against a mock backend
// These run the same path as the binary: read file -> service -> typed result
// ============================================================================

/// **VALUE**: The summarize command sends the note and CLI options as the
/// backend contract expects and returns the decoded summary.
///
/// **BUG THIS CATCHES**: Would catch CLI flags not reaching `SummaryOptions`
/// (e.g. `--no-key-points` inverted) or the note file not being read verbatim.
#[tokio::test]
async fn given_note_file_when_summarize_then_options_forwarded_and_summary_returned() {
    // GIVEN: A backend expecting the exact body
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ai/summarize"))
        .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
        .and(body_json(json!({
            "content": "Mitochondria are the powerhouse of the cell.",
            "options": {
                "maxLength": 50,
                "style": "detailed",
                "includeKeyPoints": false
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "summary": "Mitochondria make energy.",
            "keyPoints": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let state = state_for(fast_config(&server.uri()));
    let (_dir, note) = note_file("Mitochondria are the powerhouse of the cell.");
    let args = SummarizeArgs {
        file: note,
        max_length: Some(50),
        style: StyleArg::Detailed,
        no_key_points: true,
        language: None,
    };

    // WHEN
    let summary = ai::summarize(&state, &args, &CancellationToken::new())
        .await
        .unwrap();

    // THEN
    assert_eq!(summary.summary, "Mitochondria make energy.");
    assert!(summary.key_points.is_empty());

    state.shutdown().await;
}

#[tokio::test]
async fn given_note_file_when_flashcards_then_count_and_difficulty_sent() {
    // GIVEN
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ai/generate-flashcards"))
        .and(body_json(json!({
            "content": "The French Revolution began in 1789.",
            "count": 2,
            "difficulty": "hard"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "question": "When did it begin?", "answer": "1789" },
            { "question": "Where?", "answer": "France", "difficulty": "hard" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let state = state_for(fast_config(&server.uri()));
    let (_dir, note) = note_file("The French Revolution began in 1789.");
    let args = FlashcardsArgs {
        file: note,
        count: 2,
        difficulty: DifficultyArg::Hard,
    };

    // WHEN
    let cards = ai::flashcards(&state, &args, &CancellationToken::new())
        .await
        .unwrap();

    // THEN
    assert_eq!(cards.len(), 2);
    assert_eq!(cards[0].answer, "1789");

    state.shutdown().await;
}

#[tokio::test]
async fn given_existing_tags_when_tags_then_sent_and_suggestions_returned() {
    // GIVEN
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ai/suggest-tags"))
        .and(body_json(json!({
            "content": "Ownership and borrowing in Rust.",
            "existing_tags": ["rust"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "tag": "ownership", "confidence": 0.9 }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let state = state_for(fast_config(&server.uri()));
    let (_dir, note) = note_file("Ownership and borrowing in Rust.");
    let args = TagsArgs {
        file: note,
        existing: vec!["rust".to_string()],
    };

    // WHEN
    let tags = ai::tags(&state, &args, &CancellationToken::new())
        .await
        .unwrap();

    // THEN
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].tag, "ownership");

    state.shutdown().await;
}

/// **VALUE**: A missing note file is an input error and never reaches the network.
#[tokio::test]
async fn given_missing_note_file_when_summarize_then_input_error_without_request() {
    // GIVEN
    let server = MockServer::start().await;
    let state = state_for(fast_config(&server.uri()));
    let args = SummarizeArgs {
        file: PathBuf::from("/definitely/not/here.md"),
        max_length: None,
        style: StyleArg::Brief,
        no_key_points: false,
        language: None,
    };

    // WHEN
    let result = ai::summarize(&state, &args, &CancellationToken::new()).await;

    // THEN
    assert!(
        matches!(result, Err(AppError::Input { .. })),
        "got {result:?}"
    );
    assert!(server.received_requests().await.unwrap().is_empty());

    state.shutdown().await;
}

#[tokio::test]
async fn given_blank_note_when_tags_then_core_validation_error() {
    let server = MockServer::start().await;
    let state = state_for(fast_config(&server.uri()));
    let (_dir, note) = note_file("   \n");
    let args = TagsArgs {
        file: note,
        existing: Vec::new(),
    };

    let result = ai::tags(&state, &args, &CancellationToken::new()).await;

    assert!(matches!(result, Err(AppError::Core { .. })), "got {result:?}");
    assert!(server.received_requests().await.unwrap().is_empty());

    state.shutdown().await;
}

/// **VALUE**: Ctrl-C while waiting on the backend ends the command as cancelled.
///
/// **BUG THIS CATCHES**: Would catch the command ignoring the signal and
/// waiting out the full request timeout.
#[tokio::test]
async fn given_slow_backend_when_signal_fires_then_cancelled() {
    // GIVEN: A backend that answers far later than the test waits
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ai/summarize"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(30))
                .set_body_json(json!({ "summary": "late" })),
        )
        .mount(&server)
        .await;

    let state = state_for(fast_config(&server.uri()));
    let (_dir, note) = note_file("Some note");
    let args = SummarizeArgs {
        file: note,
        max_length: None,
        style: StyleArg::Brief,
        no_key_points: false,
        language: None,
    };
    let signal = CancellationToken::new();
    let trigger = signal.clone();

    // WHEN: The signal fires shortly after the request starts
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });
    let result = timeout(WAIT, ai::summarize(&state, &args, &signal))
        .await
        .expect("command should stop promptly");

    // THEN
    assert!(
        matches!(result, Err(AppError::Cancelled { .. })),
        "got {result:?}"
    );

    state.shutdown().await;
}

// ============================================================================
// listen
// ============================================================================

/// **VALUE**: Notifications are written one JSON object per line, and a server
/// that goes away for good ends the command with an error.
///
/// **BUG THIS CATCHES**: Would catch notifications being dropped before the
/// writer, or `listen` hanging forever once reconnects are exhausted.
#[tokio::test]
async fn given_server_sends_two_then_disappears_when_listening_then_lines_written_and_error() {
    // GIVEN: A server that accepts one connection, sends two frames and goes away
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        drop(listener);
        let Ok(mut ws) = accept_async(stream).await else {
            return;
        };
        for id in ["n-1", "n-2"] {
            let frame = json!({
                "id": id,
                "type": "reminder",
                "title": "Note updated",
                "message": "Your note changed",
                "createdAt": 1_700_000_000_000_u64,
                "read": false
            });
            let _ = ws.send(Message::Text(frame.to_string().into())).await;
        }
        let _ = ws.close(None).await;
    });

    let mut config = fast_config("http://127.0.0.1:1");
    config.server.notifications_url = format!("ws://{addr}/notifications");
    config.notifications.max_reconnect_attempts = 2;
    let state = state_for(config);
    let mut out: Vec<u8> = Vec::new();

    // WHEN
    let result = timeout(
        WAIT,
        listen::listen(&state, &CancellationToken::new(), &mut out),
    )
    .await
    .expect("listen should give up");

    // THEN: Both notifications were written before the error
    assert!(matches!(result, Err(AppError::Core { .. })), "got {result:?}");
    let text = String::from_utf8(out).unwrap();
    let ids: Vec<String> = text
        .lines()
        .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap()["id"].to_string())
        .collect();
    assert_eq!(ids, vec!["\"n-1\"", "\"n-2\""]);

    state.shutdown().await;
}

#[tokio::test]
async fn given_signal_already_cancelled_when_listening_then_returns_zero() {
    let mut config = fast_config("http://127.0.0.1:1");
    config.server.notifications_url = "ws://127.0.0.1:1/notifications".to_string();
    let state = state_for(config);
    let signal = CancellationToken::new();
    signal.cancel();
    let mut out: Vec<u8> = Vec::new();

    let written = timeout(WAIT, listen::listen(&state, &signal, &mut out))
        .await
        .expect("listen should stop")
        .unwrap();

    assert_eq!(written, 0);
    assert!(out.is_empty());

    state.shutdown().await;
}
