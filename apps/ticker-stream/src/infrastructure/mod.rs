//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Market feed WebSocket client.
pub mod feed;

/// Broadcast fan-out of ticker updates, order acks and diagnostics.
pub mod broadcast;

/// Environment-driven configuration.
pub mod config;

/// Health, metrics and ticker read HTTP endpoint, plus the upstream probe.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Tracing subscriber and OpenTelemetry integration.
pub mod telemetry;
