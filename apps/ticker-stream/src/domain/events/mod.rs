//! Feed Event Model
//!
//! Typed representation of the events carried by the market feed.
//!
//! # Wire Format (JSON text frames)
//!
//! ```json
//! {"event":"tick","symbol":"BTC/USDT","timestamp_ns":1000,"price":45000.0,
//!  "quantity":0.5,"side":"buy","source":"binance"}
//! {"event":"order_ack","order_id":42,"accepted":true,"resting":false,
//!  "filled_quantity":1.0,"remaining_quantity":0.0,"reject_reason":""}
//! ```
//!
//! Field values are carried through unchanged. A tick with a negative
//! quantity is still a `Tick`; plausibility checks happen at aggregation.

use serde::{Deserialize, Serialize};

// =============================================================================
// Event Kinds
// =============================================================================

/// Discriminant of a [`StreamEvent`], as carried in the `event` wire field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Price/quantity update for a symbol.
    Tick,
    /// Acknowledgement of a submitted order.
    OrderAck,
}

impl EventKind {
    /// Resolve a wire discriminant. Returns `None` for unrecognised kinds.
    #[must_use]
    pub fn from_wire(tag: &str) -> Option<Self> {
        match tag {
            "tick" => Some(Self::Tick),
            "order_ack" => Some(Self::OrderAck),
            _ => None,
        }
    }

    /// Wire name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tick => "tick",
            Self::OrderAck => "order_ack",
        }
    }
}

// =============================================================================
// Events
// =============================================================================

/// Aggressor side of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buyer-initiated.
    Buy,
    /// Seller-initiated.
    Sell,
}

/// A single price/quantity update for one symbol from one feed source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Instrument identifier, e.g. `BTC/USDT`.
    pub symbol: String,
    /// Source-supplied timestamp in nanoseconds.
    #[serde(rename = "timestamp_ns")]
    pub timestamp_nanos: i64,
    /// Trade price.
    pub price: f64,
    /// Traded quantity.
    pub quantity: f64,
    /// Aggressor side.
    pub side: Side,
    /// Identifier of the feed origin.
    pub source: String,
}

/// Order acknowledgement, routed to observers but never aggregated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    /// Exchange-assigned order id.
    pub order_id: i64,
    /// Whether the order was accepted.
    pub accepted: bool,
    /// Whether any quantity is resting on the book.
    pub resting: bool,
    /// Quantity filled on entry.
    pub filled_quantity: f64,
    /// Quantity still open.
    pub remaining_quantity: f64,
    /// Rejection reason; empty when accepted.
    pub reject_reason: String,
}

/// Event decoded from the market feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Market tick.
    Tick(Tick),
    /// Order acknowledgement.
    OrderAck(OrderAck),
}

impl StreamEvent {
    /// Discriminant of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Tick(_) => EventKind::Tick,
            Self::OrderAck(_) => EventKind::OrderAck,
        }
    }
}

// =============================================================================
// Decode Errors
// =============================================================================

/// Reasons a raw frame could not be turned into a [`StreamEvent`].
///
/// Neither variant is fatal to the connection; the frame is dropped and
/// counted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Payload is not a JSON object, lacks a usable discriminant, or a
    /// recognised event is missing fields.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Discriminant names an event kind this core does not know.
    #[error("unknown event kind: {0}")]
    UnknownKind(String),
}

impl DecodeError {
    /// Short label for metrics and counters.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::MalformedPayload(_) => "malformed_payload",
            Self::UnknownKind(_) => "unknown_kind",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_wire_names() {
        assert_eq!(EventKind::from_wire("tick"), Some(EventKind::Tick));
        assert_eq!(EventKind::from_wire("order_ack"), Some(EventKind::OrderAck));
        assert_eq!(EventKind::from_wire("Tick"), None);
        assert_eq!(EventKind::from_wire("unknown_x"), None);
        assert_eq!(EventKind::OrderAck.as_str(), "order_ack");
    }

    #[test]
    fn tick_serializes_with_wire_field_names() {
        let event = StreamEvent::Tick(Tick {
            symbol: "ETH/USDT".to_string(),
            timestamp_nanos: 7,
            price: 2500.5,
            quantity: 1.25,
            side: Side::Sell,
            source: "kraken".to_string(),
        });

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "tick");
        assert_eq!(value["timestamp_ns"], 7);
        assert_eq!(value["side"], "sell");
        assert!(value.get("timestamp_nanos").is_none());
    }

    #[test]
    fn event_kind_matches_variant() {
        let ack = StreamEvent::OrderAck(OrderAck {
            order_id: 1,
            accepted: false,
            resting: false,
            filled_quantity: 0.0,
            remaining_quantity: 0.0,
            reject_reason: "insufficient_margin".to_string(),
        });
        assert_eq!(ack.kind(), EventKind::OrderAck);
    }

    #[test]
    fn decode_error_reasons() {
        assert_eq!(
            DecodeError::MalformedPayload("x".into()).reason(),
            "malformed_payload"
        );
        assert_eq!(DecodeError::UnknownKind("x".into()).reason(), "unknown_kind");
    }
}
