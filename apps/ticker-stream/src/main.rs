//! Ticker Stream Binary
//!
//! Connects to the market feed and serves aggregated ticker state.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin ticker-stream
//! ```
//!
//! # Environment Variables
//!
//! - `FEED_WS_URL`: Feed WebSocket URL (default: ws://localhost:8080/ws)
//! - `FEED_API_TOKEN`: Access token, sent as `?token=` and as a bearer token
//! - `FEED_API_BASE_URL`: Upstream HTTP API (default: <http://localhost:8080>)
//! - `FEED_HEALTH_PORT`: Health check HTTP port (default: 8082)
//! - `FEED_CONNECT_TIMEOUT_SECS`: Bound on the WebSocket handshake (default: 10)
//! - `FEED_IDLE_TIMEOUT_SECS`: Reconnect after this long without frames (default: off)
//! - `FEED_RECONNECT_*`, `FEED_*_CAPACITY`: Backoff and queue tuning
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use ticker_stream::infrastructure::telemetry;
use ticker_stream::{
    EventPipeline, FeedClient, FeedClientConfig, FeedConfig, HealthProbe, HealthServer,
    HealthServerState, NotificationConfig, NotificationHub, NotificationPort, StreamStats,
    TickerAggregator, init_metrics,
};

/// Upper bound on draining the pipeline at shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("failed to install rustls crypto provider");
    }

    load_dotenv();

    let _telemetry_guard = telemetry::init().context("failed to initialize telemetry")?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting ticker stream");

    let _metrics_handle = init_metrics();

    let config = FeedConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    probe_upstream(&config).await;

    let shutdown_token = CancellationToken::new();

    // Notification fan-out and aggregation
    let notifier: Arc<dyn NotificationPort> = Arc::new(NotificationHub::new(
        NotificationConfig::from(&config.channels),
    ));
    let stats = Arc::new(StreamStats::new());
    let aggregator = Arc::new(TickerAggregator::new(
        Arc::clone(&notifier),
        Arc::clone(&stats),
    ));

    // Decode → dispatch queue
    let (event_tx, event_rx) = mpsc::channel(config.channels.event_queue_capacity);
    let pipeline = EventPipeline::new(Arc::clone(&aggregator), notifier, Arc::clone(&stats));
    let pipeline_cancel = CancellationToken::new();
    let pipeline_handle = tokio::spawn(pipeline.run(event_rx, pipeline_cancel.clone()));

    // Feed connection
    let client = FeedClient::new(
        FeedClientConfig::from_config(&config),
        event_tx,
        Arc::clone(&stats),
    );

    // Health server
    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&aggregator),
        Arc::clone(&stats),
        client.watch_status(),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );
    let health_handle = tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    client
        .start(&config.stream.ws_url, config.stream.api_token.clone())
        .context("failed to start feed client")?;

    tracing::info!("Ticker stream ready");

    await_shutdown().await;

    // Dropping the client closes the queue; the pipeline drains what is left.
    client.stop().await;
    drop(client);
    shutdown_token.cancel();

    let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        let _ = pipeline_handle.await;
        let _ = health_handle.await;
    })
    .await;
    if drained.is_err() {
        pipeline_cancel.cancel();
        tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Shutdown timed out"
        );
    }

    let snapshot = stats.snapshot();
    tracing::info!(
        frames = snapshot.frames_received,
        ticks = snapshot.ticks_applied,
        decode_errors = snapshot.decode_errors(),
        reconnects = snapshot.reconnect_attempts,
        symbols = aggregator.len(),
        "Ticker stream stopped"
    );
    Ok(())
}

/// Check the upstream REST API once. Failure is logged, never fatal.
async fn probe_upstream(config: &FeedConfig) {
    let probe = match HealthProbe::new(
        &config.stream.api_base_url,
        config.stream.api_token.clone(),
        config.server.probe_timeout,
    ) {
        Ok(probe) => probe,
        Err(e) => {
            tracing::warn!(error = %e, "Upstream health probe unavailable");
            return;
        }
    };

    match probe.check().await {
        Ok(health) => tracing::info!(
            url = probe.url(),
            status = ?health.status,
            tracked_symbols = ?health.tracked_symbols,
            "Upstream healthy"
        ),
        Err(e) => tracing::warn!(
            url = probe.url(),
            error = %e,
            "Upstream health check failed, continuing in stream-only mode"
        ),
    }
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &FeedConfig) {
    tracing::info!(
        ws_url = %config.stream.ws_url,
        token = config.stream.api_token.is_some(),
        health_port = config.server.health_port,
        queue_capacity = config.channels.event_queue_capacity,
        "Configuration loaded"
    );
    tracing::debug!(
        initial_delay_ms = u64::try_from(config.reconnect.delay_initial.as_millis()).unwrap_or(u64::MAX),
        max_delay_secs = config.reconnect.delay_max.as_secs(),
        multiplier = config.reconnect.multiplier,
        max_attempts = config.reconnect.max_attempts,
        idle_timeout_secs = config.connection.idle_timeout.map(|d| d.as_secs()),
        "Reconnect policy"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
