//! Push notifications over WebSocket with automatic reconnect.
//!
//! # Behaviour
//! - Text frames carry one JSON [`Notification`] each; frames that fail to
//!   parse are logged and skipped
//! - Connect failures and disconnects are retried with exponential backoff;
//!   the backoff resets after every successful connection
//! - Gives up after `max_reconnect_attempts` consecutive failed connects
//! - Stops as soon as the signal fires or the receiver is dropped

use crate::config::{AppConfig, NotificationsConfig};
use crate::error::NotificationError;

use common::{ErrorLocation, RedactedToken};
use models::Notification;

use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use backoff::backoff::Backoff;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep as TokioSleep;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use url::Url;

const TOKEN_QUERY_PARAM: &str = "token";
const CHANNEL_CAPACITY: usize = 64;
const BACKOFF_MULTIPLIER: f64 = 2.0;
const BACKOFF_RANDOMIZATION: f64 = 0.3;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How a connected session ended.
enum SessionEnd {
    /// Signal fired or receiver dropped; do not reconnect.
    Stopped,
    Disconnected,
}

#[derive(Clone)]
pub struct NotificationClient {
    url: Url,
    config: NotificationsConfig,
    token: Option<Arc<RedactedToken>>,
}

impl NotificationClient {
    pub fn new(
        notifications_url: &str,
        config: NotificationsConfig,
        token: Option<Arc<RedactedToken>>,
    ) -> Result<Self, NotificationError> {
        let url = Url::parse(notifications_url)?;

        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(NotificationError::Url {
                message: format!("Unsupported scheme '{}', expected ws or wss", url.scheme()),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(Self { url, config, token })
    }

    pub fn from_config(
        config: &AppConfig,
        token: Option<RedactedToken>,
    ) -> Result<Self, NotificationError> {
        Self::new(
            &config.server.notifications_url,
            config.notifications.clone(),
            token.map(Arc::new),
        )
    }

    /// Spawn the connection loop.
    ///
    /// The task resolves to `Ok(())` when stopped by `signal` or by dropping the
    /// receiver, and to [`NotificationError::ReconnectExhausted`] when it gives up.
    pub fn subscribe(
        &self,
        signal: CancellationToken,
    ) -> (
        mpsc::Receiver<Notification>,
        JoinHandle<Result<(), NotificationError>>,
    ) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let client = self.clone();
        let handle = tokio::spawn(async move { client.run(tx, signal).await });
        (rx, handle)
    }

    fn connect_url(&self) -> Url {
        let mut url = self.url.clone();
        if let Some(token) = &self.token
            && !token.is_empty()
        {
            url.query_pairs_mut()
                .append_pair(TOKEN_QUERY_PARAM, token.expose());
        }
        url
    }

    async fn run(
        &self,
        tx: mpsc::Sender<Notification>,
        signal: CancellationToken,
    ) -> Result<(), NotificationError> {
        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.config.reconnect_base_ms))
            .with_multiplier(BACKOFF_MULTIPLIER)
            .with_randomization_factor(BACKOFF_RANDOMIZATION)
            .with_max_interval(Duration::from_millis(self.config.reconnect_max_ms))
            .with_max_elapsed_time(None)
            .build();

        let mut failures: u32 = 0;

        loop {
            if signal.is_cancelled() || tx.is_closed() {
                return Ok(());
            }

            let connect_url = self.connect_url();
            let connected = tokio::select! {
                biased;
                _ = signal.cancelled() => return Ok(()),
                connected = connect_async(connect_url.as_str()) => connected,
            };

            match connected {
                Ok((socket, _response)) => {
                    info!("Notifications connected to {}", self.url);
                    failures = 0;
                    backoff.reset();

                    match Self::read_session(socket, &tx, &signal).await {
                        SessionEnd::Stopped => return Ok(()),
                        SessionEnd::Disconnected => {
                            warn!("Notifications connection to {} lost", self.url);
                        }
                    }
                }
                Err(e) => {
                    failures += 1;
                    warn!(
                        "Notifications connect to {} failed ({failures}/{}): {e}",
                        self.url, self.config.max_reconnect_attempts
                    );

                    if failures >= self.config.max_reconnect_attempts {
                        return Err(NotificationError::ReconnectExhausted {
                            attempts: failures,
                            location: ErrorLocation::from(Location::caller()),
                        });
                    }
                }
            }

            let delay = backoff
                .next_backoff()
                .unwrap_or(Duration::from_millis(self.config.reconnect_max_ms));
            debug!("Reconnecting to notifications in {delay:?}");

            tokio::select! {
                biased;
                _ = signal.cancelled() => return Ok(()),
                _ = tx.closed() => return Ok(()),
                _ = TokioSleep(delay) => {}
            }
        }
    }

    async fn read_session(
        socket: Socket,
        tx: &mpsc::Sender<Notification>,
        signal: &CancellationToken,
    ) -> SessionEnd {
        let (mut write, mut read) = socket.split();

        loop {
            let frame = tokio::select! {
                biased;
                _ = signal.cancelled() => {
                    if let Err(e) = write.send(Message::Close(None)).await {
                        debug!("Close frame not sent: {e}");
                    }
                    return SessionEnd::Stopped;
                }
                _ = tx.closed() => return SessionEnd::Stopped,
                frame = read.next() => frame,
            };

            match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<Notification>(text.as_str()) {
                        Ok(notification) => {
                            debug!("Notification received: {}", notification.id);
                            if tx.send(notification).await.is_err() {
                                return SessionEnd::Stopped;
                            }
                        }
                        Err(e) => warn!("Skipping unparsable notification frame: {e}"),
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!("Notifications server closed the connection: {frame:?}");
                    return SessionEnd::Disconnected;
                }
                // Pings are answered by tungstenite on the next read
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Notifications socket error: {e}");
                    return SessionEnd::Disconnected;
                }
                None => return SessionEnd::Disconnected,
            }
        }
    }
}
