//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with external systems.

/// Port interfaces for the feed adapter and notification fan-out.
pub mod ports;

/// Aggregation, dispatch and ingestion counters.
pub mod services;
