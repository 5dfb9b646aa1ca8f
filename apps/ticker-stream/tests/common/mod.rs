//! Shared fixtures for integration tests.
//!
//! `MockFeedServer` is an in-process WebSocket server that plays the role of
//! the upstream market feed. Tests push frames to every connected client
//! and can drop connections to exercise reconnection.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_util::sync::CancellationToken;

use ticker_stream::{
    ConnectionStatus, EventPipeline, FeedClient, FeedClientConfig, NotificationHub,
    NotificationPort, ReconnectConfig, StreamStats, TickerAggregator,
};

/// Generous bound for anything that should happen "soon".
pub const WAIT: Duration = Duration::from_secs(5);

// =============================================================================
// Mock Feed Server
// =============================================================================

/// Instruction for every live server-side connection.
#[derive(Debug, Clone)]
pub enum ServerCommand {
    /// Send a text frame.
    Text(String),
    /// Send a binary frame.
    Binary(Vec<u8>),
    /// Send a ping with this payload.
    Ping(Vec<u8>),
    /// Send a close frame, wait briefly for the reply, then hang up.
    Close,
    /// Hang up without a close frame.
    Drop,
}

/// What the server has seen from its clients.
#[derive(Default)]
struct Observed {
    connections: AtomicUsize,
    close_replies: AtomicUsize,
    pongs: AtomicUsize,
    request_uris: Mutex<Vec<String>>,
}

/// In-process WebSocket feed.
pub struct MockFeedServer {
    addr: SocketAddr,
    commands: broadcast::Sender<ServerCommand>,
    observed: Arc<Observed>,
    handle: JoinHandle<()>,
}

impl MockFeedServer {
    /// Bind to an ephemeral port and start accepting.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (commands, _) = broadcast::channel(256);
        let observed = Arc::new(Observed::default());

        let handle = {
            let commands = commands.clone();
            let observed = Arc::clone(&observed);
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    // Subscribe before the handshake so nothing sent after the
                    // client reports Connected can be missed.
                    let rx = commands.subscribe();
                    tokio::spawn(serve_connection(stream, rx, Arc::clone(&observed)));
                }
            })
        };

        Self {
            addr,
            commands,
            observed,
            handle,
        }
    }

    /// `ws://` URL of the feed.
    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Send a text frame to every connected client.
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.commands.send(ServerCommand::Text(text.into()));
    }

    /// Send a binary frame to every connected client.
    pub fn send_binary(&self, data: impl Into<Vec<u8>>) {
        let _ = self.commands.send(ServerCommand::Binary(data.into()));
    }

    /// Ping every connected client.
    pub fn ping_all(&self, payload: impl Into<Vec<u8>>) {
        let _ = self.commands.send(ServerCommand::Ping(payload.into()));
    }

    /// Close every connection with a close frame.
    pub fn close_all(&self) {
        let _ = self.commands.send(ServerCommand::Close);
    }

    /// Hang up every connection abruptly.
    pub fn drop_all(&self) {
        let _ = self.commands.send(ServerCommand::Drop);
    }

    /// Completed handshakes so far.
    pub fn connection_count(&self) -> usize {
        self.observed.connections.load(Ordering::SeqCst)
    }

    /// Close frames clients sent back after a server close.
    pub fn close_replies(&self) -> usize {
        self.observed.close_replies.load(Ordering::SeqCst)
    }

    /// Pong frames received from clients.
    pub fn pongs(&self) -> usize {
        self.observed.pongs.load(Ordering::SeqCst)
    }

    /// Request URIs (path and query) seen during handshakes.
    pub fn request_uris(&self) -> Vec<String> {
        self.observed.request_uris.lock().clone()
    }

    /// Wait until at least `n` handshakes have completed.
    pub async fn wait_for_connections(&self, n: usize) {
        eventually(|| self.connection_count() >= n).await;
    }
}

/// Accepts TCP connections and never answers the WebSocket upgrade.
pub struct SilentListener {
    addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl SilentListener {
    /// Bind to an ephemeral port and start accepting.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));

        let handle = {
            let accepted = Arc::clone(&accepted);
            tokio::spawn(async move {
                let mut held = Vec::new();
                while let Ok((stream, _)) = listener.accept().await {
                    accepted.fetch_add(1, Ordering::SeqCst);
                    held.push(stream);
                }
            })
        };

        Self {
            addr,
            accepted,
            handle,
        }
    }

    /// `ws://` URL of the listener.
    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// TCP connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

impl Drop for SilentListener {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl Drop for MockFeedServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_connection(
    stream: tokio::net::TcpStream,
    mut commands: broadcast::Receiver<ServerCommand>,
    observed: Arc<Observed>,
) {
    let capture = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        observed.request_uris.lock().push(request.uri().to_string());
        Ok(response)
    };
    let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, capture).await else {
        return;
    };
    observed.connections.fetch_add(1, Ordering::SeqCst);

    let (mut write, mut read) = ws.split();
    loop {
        tokio::select! {
            command = commands.recv() => {
                let message = match command {
                    Ok(ServerCommand::Text(text)) => Message::Text(text.into()),
                    Ok(ServerCommand::Binary(data)) => Message::Binary(data.into()),
                    Ok(ServerCommand::Ping(data)) => Message::Ping(data.into()),
                    Ok(ServerCommand::Close) => {
                        let _ = write.send(Message::Close(None)).await;
                        let reply = tokio::time::timeout(Duration::from_secs(1), async {
                            while let Some(Ok(message)) = read.next().await {
                                if message.is_close() {
                                    return true;
                                }
                            }
                            false
                        });
                        if matches!(reply.await, Ok(true)) {
                            observed.close_replies.fetch_add(1, Ordering::SeqCst);
                        }
                        return;
                    }
                    Ok(ServerCommand::Drop) | Err(_) => return,
                };
                if write.send(message).await.is_err() {
                    return;
                }
            }
            incoming = read.next() => {
                match incoming {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => return,
                    Some(Ok(Message::Pong(_))) => {
                        observed.pongs.fetch_add(1, Ordering::SeqCst);
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

// =============================================================================
// Service Harness
// =============================================================================

/// The full ingestion stack wired the way the binary wires it.
pub struct Harness {
    pub client: FeedClient,
    pub hub: Arc<NotificationHub>,
    pub aggregator: Arc<TickerAggregator>,
    pub stats: Arc<StreamStats>,
    pipeline_cancel: CancellationToken,
}

impl Harness {
    /// Wire a stack with fast, unlimited reconnects.
    pub fn new() -> Self {
        Self::with_config(fast_reconnect())
    }

    /// Wire a stack with a custom client config.
    pub fn with_config(config: FeedClientConfig) -> Self {
        let hub = Arc::new(NotificationHub::with_defaults());
        let notifier: Arc<dyn NotificationPort> = hub.clone();
        let stats = Arc::new(StreamStats::new());
        let aggregator = Arc::new(TickerAggregator::new(
            Arc::clone(&notifier),
            Arc::clone(&stats),
        ));

        let (tx, rx) = mpsc::channel(64);
        let pipeline_cancel = CancellationToken::new();
        let pipeline = EventPipeline::new(Arc::clone(&aggregator), notifier, Arc::clone(&stats));
        tokio::spawn(pipeline.run(rx, pipeline_cancel.clone()));

        let client = FeedClient::new(config, tx, Arc::clone(&stats));

        Self {
            client,
            hub,
            aggregator,
            stats,
            pipeline_cancel,
        }
    }

    /// Wait until the client reports `status`.
    pub async fn wait_for_status(&self, status: ConnectionStatus) {
        wait_for_status(self.client.watch_status(), status).await;
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.pipeline_cancel.cancel();
    }
}

/// Client config with a 50ms flat reconnect delay.
pub fn fast_reconnect() -> FeedClientConfig {
    FeedClientConfig {
        reconnect: ReconnectConfig::flat(Duration::from_millis(50)),
        ..FeedClientConfig::default()
    }
}

/// Wait on a status receiver until it holds `status`.
pub async fn wait_for_status(mut rx: watch::Receiver<ConnectionStatus>, status: ConnectionStatus) {
    tokio::time::timeout(WAIT, rx.wait_for(|current| *current == status))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for status {status}"))
        .unwrap();
}

/// Poll `condition` until it holds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

// =============================================================================
// Frames
// =============================================================================

/// JSON text of a tick event.
pub fn tick_json(symbol: &str, price: f64, quantity: f64, timestamp_ns: i64) -> String {
    serde_json::json!({
        "event": "tick",
        "symbol": symbol,
        "timestamp_ns": timestamp_ns,
        "price": price,
        "quantity": quantity,
        "side": "buy",
        "source": "mock-feed",
    })
    .to_string()
}

/// JSON text of an order acknowledgement.
pub fn order_ack_json(order_id: i64, accepted: bool) -> String {
    serde_json::json!({
        "event": "order_ack",
        "order_id": order_id,
        "accepted": accepted,
        "resting": false,
        "filled_quantity": 1.0,
        "remaining_quantity": 0.0,
        "reject_reason": if accepted { "" } else { "risk limit" },
        "gateway_reject_reason": "",
    })
    .to_string()
}
