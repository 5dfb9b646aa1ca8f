//! Feed Connection Manager
//!
//! Owns the WebSocket connection to the market feed: connects, reads frames,
//! decodes them and pushes the results onto the bounded dispatch queue, and
//! reconnects with backoff when the transport fails.
//!
//! # Lifecycle
//!
//! - [`FeedClient::start`] spawns one session task. Calling it again while a
//!   session is alive is a no-op.
//! - [`FeedClient::stop`] cancels the session, closes the socket, pre-empts
//!   any pending reconnect delay and waits for the task to finish. Status is
//!   `Disconnected` when it returns, unless a new session was started
//!   meanwhile.
//!
//! Decode failures never close the connection. Only transport errors, server
//! closes, a stalled handshake and the optional idle timeout do.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::codec;
use super::endpoint::{Credential, EndpointError, FeedEndpoint};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use super::status::StatusBoard;
use crate::application::ports::FeedEvent;
use crate::application::services::StreamStats;
use crate::domain::connection::{ConnectionStatus, StatusChange};
use crate::infrastructure::config::FeedConfig;
use crate::infrastructure::metrics;

// =============================================================================
// Error Type
// =============================================================================

/// Errors that end a connection attempt or prevent a session from starting.
#[derive(Debug, thiserror::Error)]
pub enum FeedClientError {
    /// WebSocket handshake or transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// TCP connect plus WebSocket upgrade did not finish in time.
    #[error("handshake did not complete within {0:?}")]
    HandshakeTimeout(Duration),

    /// Server closed the connection or the stream ended.
    #[error("connection closed")]
    ConnectionClosed,

    /// No frame arrived within the idle timeout.
    #[error("no frames received for {0:?}")]
    IdleTimeout(Duration),

    /// The dispatch queue has no consumer.
    #[error("event queue closed")]
    ChannelClosed,

    /// The feed URL was rejected.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[from] EndpointError),
}

impl FeedClientError {
    /// Short label for metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::WebSocket(_) => "websocket",
            Self::HandshakeTimeout(_) => "handshake_timeout",
            Self::ConnectionClosed => "connection_closed",
            Self::IdleTimeout(_) => "idle_timeout",
            Self::ChannelClosed => "channel_closed",
            Self::InvalidEndpoint(_) => "invalid_endpoint",
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Connection manager configuration.
#[derive(Debug, Clone)]
pub struct FeedClientConfig {
    /// Reconnection schedule.
    pub reconnect: ReconnectConfig,
    /// Bound on the TCP connect plus WebSocket handshake.
    pub connect_timeout: Duration,
    /// Drop the connection after this long without a frame (`None` = never).
    pub idle_timeout: Option<Duration>,
    /// Upper bound on sending the close frame during `stop`.
    pub close_timeout: Duration,
}

impl Default for FeedClientConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            connect_timeout: Duration::from_secs(10),
            idle_timeout: None,
            close_timeout: Duration::from_secs(2),
        }
    }
}

impl FeedClientConfig {
    /// Build from loaded configuration.
    #[must_use]
    pub const fn from_config(config: &FeedConfig) -> Self {
        Self {
            reconnect: ReconnectConfig::from_settings(&config.reconnect),
            connect_timeout: config.connection.connect_timeout,
            idle_timeout: config.connection.idle_timeout,
            close_timeout: config.connection.close_timeout,
        }
    }
}

// =============================================================================
// Feed Client
// =============================================================================

struct Session {
    id: Uuid,
    epoch: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Market feed connection manager.
pub struct FeedClient {
    worker: Arc<Worker>,
    session: parking_lot::Mutex<Option<Session>>,
}

impl FeedClient {
    /// Create a stopped client that will publish onto `event_tx`.
    #[must_use]
    pub fn new(
        config: FeedClientConfig,
        event_tx: mpsc::Sender<FeedEvent>,
        stats: Arc<StreamStats>,
    ) -> Self {
        Self {
            worker: Arc::new(Worker {
                config,
                event_tx,
                status: StatusBoard::new(),
                stats,
            }),
            session: parking_lot::Mutex::new(None),
        }
    }

    /// Begin connecting to `base_url`.
    ///
    /// Returns immediately. Does nothing if a session is already running.
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`FeedClientError::InvalidEndpoint`] if `base_url` is not a
    /// valid `ws`/`wss` URL.
    pub fn start(
        &self,
        base_url: &str,
        credential: Option<Credential>,
    ) -> Result<(), FeedClientError> {
        let endpoint = FeedEndpoint::new(base_url, credential)?;

        let mut session = self.session.lock();
        if let Some(existing) = session.as_ref()
            && !existing.handle.is_finished()
        {
            tracing::debug!(session = %existing.id, "Feed session already running");
            return Ok(());
        }

        let id = Uuid::new_v4();
        let epoch = self.worker.status.claim();
        let cancel = CancellationToken::new();
        let span = tracing::info_span!("feed_session", session = %id);
        let handle = tokio::spawn(
            Arc::clone(&self.worker)
                .run(endpoint, cancel.clone(), epoch)
                .instrument(span),
        );

        tracing::info!(session = %id, "Feed session started");
        *session = Some(Session {
            id,
            epoch,
            cancel,
            handle,
        });
        Ok(())
    }

    /// Close the connection and stop reconnecting.
    ///
    /// Waits for the session task to finish. Safe to call when stopped.
    /// If `start` runs while this is tearing down, the new session keeps
    /// ownership of the status.
    pub async fn stop(&self) {
        let session = self.session.lock().take();
        if let Some(session) = session {
            session.cancel.cancel();
            if let Err(e) = session.handle.await {
                tracing::warn!(session = %session.id, error = %e, "Feed session task failed");
            }
            self.worker
                .status
                .transition(session.epoch, ConnectionStatus::Disconnected);
            tracing::info!(session = %session.id, "Feed session stopped");
        }
    }

    /// Whether a session task is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|s| !s.handle.is_finished())
    }

    /// Identifier of the current session, used in logs.
    #[must_use]
    pub fn session_id(&self) -> Option<Uuid> {
        self.session.lock().as_ref().map(|s| s.id)
    }

    /// Current connection status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.worker.status.current()
    }

    /// Receiver holding the latest connection status.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.worker.status.watch()
    }

    /// Receiver of every status transition from now on.
    #[must_use]
    pub fn status_changes(&self) -> broadcast::Receiver<StatusChange> {
        self.worker.status.changes()
    }
}

impl Drop for FeedClient {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.cancel.cancel();
        }
    }
}

impl std::fmt::Debug for FeedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedClient")
            .field("status", &self.status())
            .field("session", &self.session_id())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Session Worker
// =============================================================================

struct Worker {
    config: FeedClientConfig,
    event_tx: mpsc::Sender<FeedEvent>,
    status: StatusBoard,
    stats: Arc<StreamStats>,
}

impl Worker {
    async fn run(self: Arc<Self>, endpoint: FeedEndpoint, cancel: CancellationToken, epoch: u64) {
        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());

        loop {
            if cancel.is_cancelled() {
                break;
            }

            self.status.transition(epoch, ConnectionStatus::Connecting);

            match self
                .connect_and_run(&endpoint, &cancel, &mut policy, epoch)
                .await
            {
                Ok(()) => {
                    tracing::info!("Feed session cancelled");
                    break;
                }
                Err(FeedClientError::ChannelClosed) => {
                    tracing::warn!("Event queue closed, ending feed session");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Feed connection lost");
                    self.stats.record_transport_error();
                    metrics::record_transport_error(e.label());
                    self.status.transition(epoch, ConnectionStatus::Disconnected);

                    let Some(delay) = policy.next_delay() else {
                        tracing::error!(
                            attempts = policy.attempt_count(),
                            "Maximum reconnection attempts exceeded"
                        );
                        break;
                    };

                    self.stats.record_reconnect();
                    metrics::record_reconnect();
                    tracing::info!(
                        attempt = policy.attempt_count(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Reconnecting to market feed"
                    );

                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            tracing::info!("Feed session cancelled during reconnect delay");
                            break;
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        self.status.transition(epoch, ConnectionStatus::Disconnected);
    }

    /// Connect and read until cancelled (`Ok`) or the connection fails.
    async fn connect_and_run(
        &self,
        endpoint: &FeedEndpoint,
        cancel: &CancellationToken,
        policy: &mut ReconnectPolicy,
        epoch: u64,
    ) -> Result<(), FeedClientError> {
        tracing::info!(url = %endpoint, "Connecting to market feed");

        let url = endpoint.connect_url();
        let connect_timeout = self.config.connect_timeout;
        let handshake =
            tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(url.as_str()));
        let (ws_stream, _response) = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            connected = handshake => connected
                .map_err(|_| FeedClientError::HandshakeTimeout(connect_timeout))??,
        };

        self.status.transition(epoch, ConnectionStatus::Connected);
        policy.reset();

        let (mut write, mut read) = ws_stream.split();
        let idle_timeout = self.config.idle_timeout;
        let mut deadline = idle_timeout.map(|timeout| Instant::now() + timeout);

        loop {
            let idle = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    let closing = write.send(Message::Close(None));
                    if tokio::time::timeout(self.config.close_timeout, closing).await.is_err() {
                        tracing::debug!("Timed out sending close frame");
                    }
                    return Ok(());
                }

                () = idle => {
                    return Err(FeedClientError::IdleTimeout(idle_timeout.unwrap_or_default()));
                }

                msg = read.next() => {
                    if let Some(timeout) = idle_timeout {
                        deadline = Some(Instant::now() + timeout);
                    }

                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_frame(text.as_bytes(), cancel).await?;
                        }
                        Some(Ok(Message::Binary(data))) => {
                            self.handle_frame(&data, cancel).await?;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            tokio::select! {
                                biased;
                                () = cancel.cancelled() => return Ok(()),
                                sent = write.send(Message::Pong(data)) => sent?,
                            }
                        }
                        Some(Ok(Message::Pong(_) | Message::Frame(_))) => {}
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(?frame, "Server sent close frame");
                            // Flushes the queued close reply.
                            let closing = write.close();
                            if tokio::time::timeout(self.config.close_timeout, closing).await.is_err() {
                                tracing::debug!("Timed out completing close handshake");
                            }
                            return Err(FeedClientError::ConnectionClosed);
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            tracing::info!("WebSocket stream ended");
                            return Err(FeedClientError::ConnectionClosed);
                        }
                    }
                }
            }
        }
    }

    /// Decode one payload and enqueue the result.
    ///
    /// Blocks while the queue is full unless the session is cancelled, in
    /// which case the frame is dropped.
    async fn handle_frame(
        &self,
        payload: &[u8],
        cancel: &CancellationToken,
    ) -> Result<(), FeedClientError> {
        let received_at = std::time::Instant::now();
        self.stats.record_frame();
        metrics::record_frame_received();

        let event = match codec::decode(payload) {
            Ok(event) => {
                self.stats.record_decoded();
                metrics::record_event_decoded(event.kind());
                FeedEvent::Event(event)
            }
            Err(e) => {
                tracing::debug!(reason = e.reason(), error = %e, "Dropping undecodable frame");
                self.stats.record_decode_error(&e);
                metrics::record_decode_error(e.reason());
                FeedEvent::DecodeFailed(e)
            }
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Ok(()),
            sent = self.event_tx.send(event) => {
                sent.map_err(|_| FeedClientError::ChannelClosed)?;
                metrics::record_processing_duration(received_at.elapsed());
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> (FeedClient, mpsc::Receiver<FeedEvent>) {
        let (tx, rx) = mpsc::channel(8);
        (
            FeedClient::new(
                FeedClientConfig::default(),
                tx,
                Arc::new(StreamStats::new()),
            ),
            rx,
        )
    }

    #[test]
    fn error_labels() {
        assert_eq!(FeedClientError::ConnectionClosed.label(), "connection_closed");
        assert_eq!(
            FeedClientError::IdleTimeout(Duration::from_secs(1)).label(),
            "idle_timeout"
        );
        assert_eq!(FeedClientError::ChannelClosed.label(), "channel_closed");
        assert_eq!(
            FeedClientError::HandshakeTimeout(Duration::from_secs(1)).label(),
            "handshake_timeout"
        );
    }

    #[tokio::test]
    async fn invalid_url_is_rejected_without_spawning() {
        let (client, _rx) = client();
        let err = client.start("http://localhost/ws", None).unwrap_err();
        assert!(matches!(err, FeedClientError::InvalidEndpoint(_)));
        assert!(!client.is_running());
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn stop_when_never_started_is_a_no_op() {
        let (client, _rx) = client();
        client.stop().await;
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
        assert!(client.session_id().is_none());
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let (tx, _rx) = mpsc::channel(8);
        let stats = Arc::new(StreamStats::new());
        let config = FeedClientConfig {
            reconnect: ReconnectConfig::flat(Duration::from_millis(10)).with_max_attempts(2),
            ..FeedClientConfig::default()
        };
        let client = FeedClient::new(config, tx, Arc::clone(&stats));

        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        client.start(&format!("ws://127.0.0.1:{port}/ws"), None).unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while client.is_running() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("session should give up");

        let snap = stats.snapshot();
        assert_eq!(snap.transport_errors, 3);
        assert_eq!(snap.reconnect_attempts, 2);
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
    }
}
