//! Feed client with reconnect and subscription replay.
//!
//! One `FeedClient` owns exactly one live connection to the feed endpoint.
//! The desired subscription set survives reconnects: whatever was last
//! requested via [`FeedClient::subscribe`] is replayed immediately after
//! every successful (re)connect, before the read loop starts.

use crate::error::{WsError, WsResult};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use poly_feed::{parse_frame, MarketMessage, SubscribeRequest};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex as TokioMutex;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default WebSocket URL for the CLOB market feed.
pub const DEFAULT_WS_URL: &str = "wss://ws-subscriptions-clob.polymarket.com/ws/market";

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Callback invoked with each non-empty parsed record batch.
///
/// Runs synchronously on the connection's read-loop task, so it must not
/// block unboundedly: a slow handler stalls frame consumption on its own
/// connection (and only its own).
pub type MessageHandler = Arc<dyn Fn(Vec<MarketMessage>) + Send + Sync>;

/// Reconnection behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Backoff before the second attempt.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Backoff ceiling.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Multiplier applied after each failed attempt.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// Maximum connect attempts (0 = unbounded).
    #[serde(default)]
    pub max_retries: u32,
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_backoff_factor() -> f64 {
    2.0
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_factor: default_backoff_factor(),
            max_retries: 0,
        }
    }
}

impl ReconnectConfig {
    /// Backoff delay after `failures` consecutive connect failures:
    /// `min(initial * factor^failures, max)`.
    pub fn backoff_delay(&self, failures: u32) -> Duration {
        let initial = self.initial_backoff_ms as f64;
        let max = self.max_backoff_ms as f64;
        // powi saturates to infinity for large exponents; min() clamps it.
        let delay = (initial * self.backoff_factor.powi(failures as i32)).min(max);
        Duration::from_millis(delay as u64)
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// WebSocket client for one market feed connection.
pub struct FeedClient {
    url: String,
    reconnect: ReconnectConfig,
    handler: MessageHandler,
    cancel: CancellationToken,
    state: RwLock<ConnectionState>,
    /// Most recently requested subscription set, replayed on reconnect.
    desired: RwLock<Vec<String>>,
    /// Write half of the live connection, if any.
    sink: TokioMutex<Option<WsSink>>,
}

impl FeedClient {
    /// Create a new client. No connection is made until [`connect`].
    ///
    /// The cancellation token propagates into backoff waits and the read
    /// loop; once cancelled the client never reconnects.
    ///
    /// [`connect`]: FeedClient::connect
    pub fn new(
        url: impl Into<String>,
        reconnect: ReconnectConfig,
        handler: MessageHandler,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            url: url.into(),
            reconnect,
            handler,
            cancel,
            state: RwLock::new(ConnectionState::Disconnected),
            desired: RwLock::new(Vec::new()),
            sink: TokioMutex::new(None),
        })
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Whether the client currently holds a live connection.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Most recently requested subscription keys.
    pub fn desired_subscription(&self) -> Vec<String> {
        self.desired.read().clone()
    }

    /// Connect, blocking until the first success or cancellation.
    ///
    /// On success the last requested subscription (if any) has been
    /// replayed and a read loop is running. A no-op when already
    /// connected.
    pub async fn connect(self: &Arc<Self>) -> WsResult<()> {
        if self.is_connected() {
            return Ok(());
        }
        self.connect_with_backoff().await
    }

    // Boxed because this future is recursive: the spawned read loop can
    // call back into connect_with_backoff via restart_after_failure.
    fn connect_with_backoff<'a>(
        self: &'a Arc<Self>,
    ) -> Pin<Box<dyn Future<Output = WsResult<()>> + Send + 'a>> {
        Box::pin(async move {
        let mut failures = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                *self.state.write() = ConnectionState::Disconnected;
                return Err(WsError::Cancelled);
            }

            *self.state.write() = ConnectionState::Connecting;

            match connect_async(&self.url).await {
                Ok((ws_stream, _response)) => {
                    let (write, read) = ws_stream.split();
                    *self.sink.lock().await = Some(write);
                    *self.state.write() = ConnectionState::Connected;
                    info!(url = %self.url, "Feed connected");

                    let keys = self.desired_subscription();
                    if !keys.is_empty() {
                        if let Err(e) = self.send_subscribe(&keys).await {
                            warn!(?e, "Failed to replay subscription after connect");
                        } else {
                            debug!(tokens = keys.len(), "Replayed subscription");
                        }
                    }

                    let client = Arc::clone(self);
                    tokio::spawn(async move {
                        client.read_loop(read).await;
                    });
                    return Ok(());
                }
                Err(e) => {
                    let attempt = failures + 1;
                    if self.reconnect.max_retries > 0 && attempt >= self.reconnect.max_retries {
                        *self.state.write() = ConnectionState::Disconnected;
                        return Err(WsError::ConnectionFailed(format!(
                            "max retries ({}) exceeded: {e}",
                            self.reconnect.max_retries
                        )));
                    }

                    let delay = self.reconnect.backoff_delay(failures);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Feed connection failed, retrying"
                    );
                    failures = failures.saturating_add(1);

                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = self.cancel.cancelled() => {
                            *self.state.write() = ConnectionState::Disconnected;
                            return Err(WsError::Cancelled);
                        }
                    }
                }
            }
        }
        })
    }

    /// Replace the desired subscription set and, if connected, send the
    /// subscribe control message immediately.
    ///
    /// Safe to call before any connection exists: the set is recorded and
    /// replayed on the next successful connect, but the immediate send
    /// fails with [`WsError::NotConnected`].
    pub async fn subscribe(&self, token_ids: Vec<String>) -> WsResult<()> {
        *self.desired.write() = token_ids.clone();
        self.send_subscribe(&token_ids).await
    }

    async fn send_subscribe(&self, token_ids: &[String]) -> WsResult<()> {
        let mut sink = self.sink.lock().await;
        let Some(sink) = sink.as_mut() else {
            return Err(WsError::NotConnected);
        };

        let msg = serde_json::to_string(&SubscribeRequest::new(token_ids.to_vec()))?;
        sink.send(Message::Text(msg))
            .await
            .map_err(|e| WsError::SendFailed(e.to_string()))
    }

    /// Read loop for one connection generation.
    ///
    /// Exits on clean remote close or cancellation; on any other failure
    /// it marks the connection down and hands off to a fresh
    /// connect-with-backoff sequence, so at most one loop is ever active.
    async fn read_loop(self: Arc<Self>, mut read: WsStream) {
        loop {
            let frame = tokio::select! {
                () = self.cancel.cancelled() => {
                    debug!("Read loop cancelled");
                    self.mark_disconnected().await;
                    return;
                }
                frame = read.next() => frame,
            };

            match frame {
                Some(Ok(Message::Text(text))) => self.handle_frame(text.as_bytes()),
                Some(Ok(Message::Binary(data))) => self.handle_frame(&data),
                Some(Ok(Message::Ping(payload))) => {
                    if let Some(sink) = self.sink.lock().await.as_mut() {
                        if let Err(e) = sink.send(Message::Pong(payload)).await {
                            warn!(?e, "Failed to send pong");
                        }
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(?frame, "Feed closed by server");
                    self.mark_disconnected().await;
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "Feed read error, reconnecting");
                    self.restart_after_failure().await;
                    return;
                }
                None => {
                    warn!("Feed stream ended, reconnecting");
                    self.restart_after_failure().await;
                    return;
                }
            }
        }
    }

    /// Parse one frame and deliver the batch. Parse failures are logged
    /// and the frame is dropped; the connection keeps running.
    fn handle_frame(&self, data: &[u8]) {
        match parse_frame(data) {
            Ok(messages) => {
                if !messages.is_empty() {
                    (self.handler)(messages);
                }
            }
            Err(e) => {
                warn!(error = %e, "Dropping unparseable frame");
            }
        }
    }

    async fn mark_disconnected(&self) {
        *self.state.write() = ConnectionState::Disconnected;
        self.sink.lock().await.take();
    }

    async fn restart_after_failure(self: &Arc<Self>) {
        self.mark_disconnected().await;
        if self.cancel.is_cancelled() {
            return;
        }
        let client = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = client.connect_with_backoff().await {
                warn!(?e, "Reconnection abandoned");
            }
        });
    }

    /// Close the connection. Idempotent.
    pub async fn close(&self) {
        *self.state.write() = ConnectionState::Disconnected;
        if let Some(mut sink) = self.sink.lock().await.take() {
            let _ = sink.send(Message::Close(None)).await;
        }
    }
}
