//! Application Services
//!
//! Services that fold feed events into market state and route them to
//! observers.
//!
//! - `TickerAggregator`: Owns per-symbol state and applies ticks
//! - `EventPipeline`: Single consumer of the decode queue
//! - `StreamStats`: Ingestion counters read by health reporting

mod aggregator;
mod pipeline;
mod stats;

pub use aggregator::TickerAggregator;
pub use pipeline::EventPipeline;
pub use stats::{StatsSnapshot, StreamStats};
