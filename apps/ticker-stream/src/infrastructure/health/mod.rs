//! Health Check, Metrics and Ticker Read Endpoints
//!
//! HTTP endpoint for health checks, feed status reporting, Prometheus
//! metrics and read-only access to aggregated ticker state.
//!
//! # Endpoints
//!
//! - `GET /api/v1/health` - JSON health status and ingestion counters
//! - `GET /api/v1/tickers` - All ticker states, sorted by symbol
//! - `GET /api/v1/tickers/{symbol}` - One ticker state (symbol percent-encoded)
//! - `GET /healthz` - Kubernetes liveness probe (simple OK)
//! - `GET /readyz` - Kubernetes readiness probe (feed connected)
//! - `GET /metrics` - Prometheus metrics in text format

pub mod probe;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::application::services::{StreamStats, TickerAggregator};
use crate::domain::connection::ConnectionStatus;
use crate::domain::ticker::TickerState;
use crate::infrastructure::metrics::{get_metrics_handle, set_tracked_symbols};

pub use probe::{HealthProbe, ProbeError, UpstreamHealth};

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub timestamp: DateTime<Utc>,
    /// Feed connection status.
    pub connection: ConnectionStatus,
    /// Data frames received.
    pub ticks_received: u64,
    /// Frames decoded into events.
    pub ticks_decoded: u64,
    /// Frames dropped by the decoder.
    pub decode_errors: u64,
    /// Order acknowledgements forwarded.
    pub order_acks: u64,
    /// Ticks accepted with warnings.
    pub validation_warnings: u64,
    /// Reconnects scheduled since startup.
    pub reconnect_attempts: u64,
    /// Symbols with aggregate state.
    pub tracked_symbols: usize,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Connected with no decode failures.
    Ok,
    /// Connecting, or frames have been dropped.
    Degraded,
    /// Feed disconnected.
    Down,
}

/// Derive the overall status from the connection state and decode failures.
#[must_use]
pub const fn determine_health_status(connection: ConnectionStatus, decode_errors: u64) -> HealthStatus {
    match connection {
        ConnectionStatus::Disconnected => HealthStatus::Down,
        ConnectionStatus::Connecting => HealthStatus::Degraded,
        ConnectionStatus::Connected if decode_errors > 0 => HealthStatus::Degraded,
        ConnectionStatus::Connected => HealthStatus::Ok,
    }
}

// =============================================================================
// Health Server State
// =============================================================================

/// Shared state for the health server.
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    aggregator: Arc<TickerAggregator>,
    stats: Arc<StreamStats>,
    connection: watch::Receiver<ConnectionStatus>,
}

impl HealthServerState {
    /// Create new health server state.
    #[must_use]
    pub fn new(
        version: String,
        aggregator: Arc<TickerAggregator>,
        stats: Arc<StreamStats>,
        connection: watch::Receiver<ConnectionStatus>,
    ) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            aggregator,
            stats,
            connection,
        }
    }

    fn connection(&self) -> ConnectionStatus {
        *self.connection.borrow()
    }
}

/// Build the HTTP router over `state`.
pub fn router(state: Arc<HealthServerState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/tickers", get(tickers_handler))
        .route("/api/v1/tickers/{symbol}", get(ticker_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// =============================================================================
// Health Server
// =============================================================================

/// Health check HTTP server.
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the health server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Health server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Ok | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn tickers_handler(State(state): State<Arc<HealthServerState>>) -> Json<Vec<TickerState>> {
    Json(state.aggregator.snapshot().into_values().collect())
}

async fn ticker_handler(
    State(state): State<Arc<HealthServerState>>,
    Path(symbol): Path<String>,
) -> Response {
    state.aggregator.get(&symbol).map_or_else(
        || {
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": "unknown symbol", "symbol": symbol })),
            )
                .into_response()
        },
        |ticker| Json(ticker).into_response(),
    )
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    if state.connection().is_connected() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    set_tracked_symbols(state.aggregator.len());

    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_health_response(state: &HealthServerState) -> HealthResponse {
    let connection = state.connection();
    let stats = state.stats.snapshot();

    HealthResponse {
        status: determine_health_status(connection, stats.decode_errors()),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        timestamp: Utc::now(),
        connection,
        ticks_received: stats.frames_received,
        ticks_decoded: stats.events_decoded,
        decode_errors: stats.decode_errors(),
        order_acks: stats.order_acks,
        validation_warnings: stats.validation_warnings,
        reconnect_attempts: stats.reconnect_attempts,
        tracked_symbols: state.aggregator.len(),
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================
