//! Feed Codec
//!
//! Decodes one WebSocket payload into a [`StreamEvent`]. Every payload is a
//! single JSON object carrying an `"event"` tag:
//!
//! ```json
//! {"event":"tick","symbol":"BTC/USDT","timestamp_ns":1000,"price":45000.0,
//!  "quantity":0.5,"side":"buy","source":"binance"}
//! {"event":"order_ack","order_id":7,"accepted":true,"resting":false,
//!  "filled_quantity":1.0,"remaining_quantity":0.0,"reject_reason":""}
//! ```
//!
//! Unknown extra fields are ignored. The tag is inspected before the body so
//! an unrecognised kind is reported as such instead of as a parse failure.

use serde_json::Value;

use crate::domain::events::{DecodeError, EventKind, StreamEvent};

/// Name of the discriminator field.
pub const EVENT_TAG: &str = "event";

/// Decode a single frame payload.
///
/// Text and binary frames share this path; binary payloads are expected to
/// hold UTF-8 JSON.
///
/// # Errors
///
/// - [`DecodeError::MalformedPayload`] if the payload is not a JSON object,
///   lacks a string `"event"` tag, or is missing or mistyping a required field.
/// - [`DecodeError::UnknownKind`] if the tag is not `tick` or `order_ack`.
pub fn decode(payload: &[u8]) -> Result<StreamEvent, DecodeError> {
    let value: Value = serde_json::from_slice(payload)
        .map_err(|e| DecodeError::MalformedPayload(e.to_string()))?;

    let Value::Object(ref object) = value else {
        return Err(DecodeError::MalformedPayload(
            "expected a JSON object".to_string(),
        ));
    };

    let tag = match object.get(EVENT_TAG) {
        Some(Value::String(tag)) => tag,
        Some(_) => {
            return Err(DecodeError::MalformedPayload(
                "\"event\" must be a string".to_string(),
            ));
        }
        None => {
            return Err(DecodeError::MalformedPayload(
                "missing \"event\" field".to_string(),
            ));
        }
    };

    if EventKind::from_wire(tag).is_none() {
        return Err(DecodeError::UnknownKind(tag.clone()));
    }

    serde_json::from_value(value).map_err(|e| DecodeError::MalformedPayload(e.to_string()))
}

/// Decode a text frame.
///
/// # Errors
///
/// See [`decode`].
pub fn decode_text(text: &str) -> Result<StreamEvent, DecodeError> {
    decode(text.as_bytes())
}
