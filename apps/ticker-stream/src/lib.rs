#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Ticker Stream - Market Feed Ingestion and Aggregation
//!
//! Maintains a single WebSocket connection to an upstream market feed,
//! decodes tick and order acknowledgement events, folds ticks into
//! per-symbol state and fans updates out to any number of observers.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Event model and pure state transitions
//!   - `events`: Ticks, order acknowledgements, decode errors
//!   - `ticker`: Per-symbol aggregate state and validation warnings
//!   - `connection`: Connection lifecycle states
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Feed event and notification interfaces
//!   - `services`: Aggregation, dispatch, ingestion counters
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `feed`: WebSocket client, codec, reconnect policy
//!   - `broadcast`: Channel-based notification fan-out
//!   - `config`: Environment configuration
//!   - `health`: Health, metrics and ticker read endpoints
//!
//! # Data Flow
//!
//! ```text
//! Feed WS ──► FeedClient ──decode──► mpsc queue ──► EventPipeline
//!                                                      │
//!                     ┌──────── tick ──────────────────┤
//!                     ▼                                │ order_ack / diagnostic
//!              TickerAggregator ──► NotificationHub ◄──┘
//!                                     │   │   │
//!                                     ▼   ▼   ▼
//!                                  observers (broadcast)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Event model and state transitions with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::connection::{ConnectionStatus, StatusChange};
pub use domain::events::{DecodeError, EventKind, OrderAck, Side, StreamEvent, Tick};
pub use domain::ticker::{TickerState, ValidationWarning};

// Application
pub use application::ports::{Diagnostic, FeedEvent, NotificationPort};
pub use application::services::{EventPipeline, StatsSnapshot, StreamStats, TickerAggregator};

// Feed client
pub use infrastructure::feed::{
    Credential, FeedClient, FeedClientConfig, FeedClientError, ReconnectConfig, decode,
};

// Infrastructure config
pub use infrastructure::config::{ConfigError, FeedConfig};

// Health server
pub use infrastructure::health::{
    HealthProbe, HealthServer, HealthServerError, HealthServerState, HealthStatus, ProbeError,
    UpstreamHealth,
};

// Notification hub
pub use infrastructure::broadcast::{NotificationConfig, NotificationHub, SharedNotificationHub};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
