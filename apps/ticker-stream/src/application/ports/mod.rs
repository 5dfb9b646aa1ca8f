//! Port Interfaces
//!
//! Contracts between the feed adapter, the aggregation services and the
//! observers that sit outside this crate.
//!
//! ## Inbound
//!
//! - [`FeedEvent`]: what the connection manager hands to the dispatch stage,
//!   one item per received frame.
//!
//! ## Outbound
//!
//! - [`NotificationPort`]: fan-out of ticker updates, order acknowledgements
//!   and diagnostics to external observers (UI, order tracking, health).

use crate::domain::events::{DecodeError, OrderAck, StreamEvent};
use crate::domain::ticker::{TickerState, ValidationWarning};

/// Result of decoding one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Frame decoded into a typed event.
    Event(StreamEvent),
    /// Frame was dropped by the decoder.
    DecodeFailed(DecodeError),
}

/// Observable diagnostic raised while ingesting the feed.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A frame could not be decoded and was dropped.
    DecodeFailed(DecodeError),
    /// A tick was accepted despite looking implausible.
    Validation(ValidationWarning),
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DecodeFailed(e) => write!(f, "decode failed: {e}"),
            Self::Validation(w) => write!(f, "validation warning: {w}"),
        }
    }
}

/// Outbound notification surface.
///
/// Implementations must not block: they are called from the dispatch task
/// for every event.
#[cfg_attr(test, mockall::automock)]
pub trait NotificationPort: Send + Sync {
    /// A symbol's state was replaced.
    fn ticker_updated(&self, state: &TickerState);

    /// An order acknowledgement arrived on the feed.
    fn order_acknowledged(&self, ack: &OrderAck);

    /// A recoverable problem was observed.
    fn diagnostic(&self, diagnostic: &Diagnostic);
}
