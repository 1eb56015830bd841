use crate::helpers::{TEST_TOKEN, fast_config};

use ai_client::error::NotificationError;
use ai_client::notifications::NotificationClient;

use common::RedactedToken;
use models::NotificationKind;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::SinkExt;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

/// Server that, for each connection, sends the given frames and closes.
///
/// Returns the ws URL and the request URIs it saw.
async fn start_notification_server(frames: Vec<String>) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let uris: Arc<Mutex<Vec<String>>> = Arc::default();
    let seen = uris.clone();

    tokio::spawn(async move {
        let mut connection = 0;
        while let Ok((stream, _)) = listener.accept().await {
            connection += 1;
            let seen = seen.clone();
            let frames = frames.clone();
            tokio::spawn(async move {
                let callback =
                    move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                        seen.lock().unwrap().push(request.uri().to_string());
                        Ok(response)
                    };
                let Ok(mut ws) = accept_hdr_async(stream, callback).await else {
                    return;
                };
                for frame in frames {
                    let frame = frame.replace("{conn}", &connection.to_string());
                    if ws.send(Message::Text(frame.into())).await.is_err() {
                        return;
                    }
                }
                let _ = ws.close(None).await;
            });
        }
    });

    (format!("ws://{addr}/notifications"), uris)
}

fn notification_frame(id: &str) -> String {
    json!({
        "id": id,
        "type": "ai_complete",
        "title": "Summary ready",
        "message": "Your note summary is ready",
        "noteId": "note-1",
        "createdAt": 1_700_000_000_000u64,
        "read": false
    })
    .to_string()
}

fn client_for(url: &str) -> NotificationClient {
    let mut config = fast_config("http://127.0.0.1:1");
    config.server.notifications_url = url.to_string();
    config.notifications.max_reconnect_attempts = 3;
    NotificationClient::from_config(&config, Some(RedactedToken::new(TEST_TOKEN))).unwrap()
}

/// **VALUE**: After the server closes the socket the client reconnects and keeps delivering.
///
/// **WHY THIS MATTERS**: Servers restart and proxies cut idle sockets; without reconnect the
/// user silently stops getting reminders.
///
/// **BUG THIS CATCHES**: Would catch the loop exiting on a clean close, or a backoff that is
/// never reset after a successful connection.
#[tokio::test]
async fn given_server_closes_after_each_frame_when_subscribed_then_client_reconnects_and_keeps_receiving() {
    // GIVEN: A server that sends one notification per connection, then closes
    let (url, uris) = start_notification_server(vec![notification_frame("n-{conn}")]).await;
    let client = client_for(&url);
    let signal = CancellationToken::new();

    // WHEN: Subscribing
    let (mut rx, handle) = client.subscribe(signal.clone());

    // THEN: Notifications from successive connections arrive
    let first = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    let second = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(first.id, "n-1");
    assert_eq!(second.id, "n-2");
    assert_eq!(first.kind, NotificationKind::AiComplete);
    assert_eq!(first.note_id.as_deref(), Some("note-1"));

    // THEN: The token travelled as a query parameter
    assert!(uris.lock().unwrap()[0].contains(&format!("token={TEST_TOKEN}")));

    // WHEN: Signalling stop
    signal.cancel();

    // THEN: The task ends cleanly
    assert!(timeout(WAIT, handle).await.unwrap().unwrap().is_ok());
}

#[tokio::test]
async fn given_unparsable_frame_when_subscribed_then_it_is_skipped() {
    let (url, _uris) = start_notification_server(vec![
        "not json".to_string(),
        notification_frame("valid-{conn}"),
    ])
    .await;
    let client = client_for(&url);
    let signal = CancellationToken::new();

    let (mut rx, _handle) = client.subscribe(signal.clone());

    let received = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(received.id, "valid-1");
    signal.cancel();
}

/// **VALUE**: The client gives up after the configured number of consecutive failures.
///
/// **WHY THIS MATTERS**: An unreachable server must not keep a background task spinning
/// forever.
///
/// **BUG THIS CATCHES**: Would catch failures never being counted, or the count being
/// reset without a successful connection.
#[tokio::test]
async fn given_unreachable_server_when_subscribed_then_reconnect_is_exhausted() {
    // GIVEN: A port with nothing listening
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = client_for(&format!("ws://{addr}/notifications"));

    // WHEN: Subscribing
    let (_rx, handle) = client.subscribe(CancellationToken::new());

    // THEN: Gives up after three attempts
    let result = timeout(WAIT, handle).await.unwrap().unwrap();
    assert!(matches!(
        result,
        Err(NotificationError::ReconnectExhausted { attempts: 3, .. })
    ));
}

#[tokio::test]
async fn given_receiver_dropped_when_subscribed_then_task_stops() {
    let (url, _uris) = start_notification_server(vec![notification_frame("n-{conn}")]).await;
    let client = client_for(&url);

    let (rx, handle) = client.subscribe(CancellationToken::new());
    drop(rx);

    assert!(timeout(WAIT, handle).await.unwrap().unwrap().is_ok());
}

#[test]
fn given_http_url_when_building_client_then_url_error() {
    let mut config = fast_config("http://127.0.0.1:1");
    config.server.notifications_url = "http://127.0.0.1:1/notifications".to_string();

    let result = NotificationClient::from_config(&config, None);

    assert!(matches!(result, Err(NotificationError::Url { .. })));
}
