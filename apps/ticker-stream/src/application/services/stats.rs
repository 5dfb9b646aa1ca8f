//! Stream Counters
//!
//! Monotonic counters for everything the ingestion path recovers from.
//! Health reporting reads these to decide whether the stream is degraded.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::domain::events::DecodeError;

/// Shared ingestion counters.
#[derive(Debug, Default)]
pub struct StreamStats {
    frames_received: AtomicU64,
    events_decoded: AtomicU64,
    ticks_applied: AtomicU64,
    order_acks: AtomicU64,
    malformed_payloads: AtomicU64,
    unknown_kinds: AtomicU64,
    validation_warnings: AtomicU64,
    transport_errors: AtomicU64,
    reconnect_attempts: AtomicU64,
}

impl StreamStats {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A data frame arrived on the transport.
    pub fn record_frame(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    /// A frame decoded successfully.
    pub fn record_decoded(&self) {
        self.events_decoded.fetch_add(1, Ordering::Relaxed);
    }

    /// A frame was dropped by the decoder.
    pub fn record_decode_error(&self, error: &DecodeError) {
        let counter = match error {
            DecodeError::MalformedPayload(_) => &self.malformed_payloads,
            DecodeError::UnknownKind(_) => &self.unknown_kinds,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// A tick was folded into ticker state.
    pub fn record_tick_applied(&self) {
        self.ticks_applied.fetch_add(1, Ordering::Relaxed);
    }

    /// An order acknowledgement was forwarded.
    pub fn record_order_ack(&self) {
        self.order_acks.fetch_add(1, Ordering::Relaxed);
    }

    /// A tick raised a validation warning.
    pub fn record_validation_warning(&self) {
        self.validation_warnings.fetch_add(1, Ordering::Relaxed);
    }

    /// The transport failed or closed.
    pub fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// A reconnect was scheduled.
    pub fn record_reconnect(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            events_decoded: self.events_decoded.load(Ordering::Relaxed),
            ticks_applied: self.ticks_applied.load(Ordering::Relaxed),
            order_acks: self.order_acks.load(Ordering::Relaxed),
            malformed_payloads: self.malformed_payloads.load(Ordering::Relaxed),
            unknown_kinds: self.unknown_kinds.load(Ordering::Relaxed),
            validation_warnings: self.validation_warnings.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
        }
    }
}

/// Copy of [`StreamStats`] at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Data frames received.
    pub frames_received: u64,
    /// Frames decoded into events.
    pub events_decoded: u64,
    /// Ticks folded into state.
    pub ticks_applied: u64,
    /// Order acknowledgements forwarded.
    pub order_acks: u64,
    /// Frames dropped as malformed.
    pub malformed_payloads: u64,
    /// Frames dropped for an unknown event kind.
    pub unknown_kinds: u64,
    /// Ticks accepted with warnings.
    pub validation_warnings: u64,
    /// Transport failures and closes.
    pub transport_errors: u64,
    /// Reconnects scheduled.
    pub reconnect_attempts: u64,
}

impl StatsSnapshot {
    /// All decode failures regardless of reason.
    #[must_use]
    pub const fn decode_errors(&self) -> u64 {
        self.malformed_payloads + self.unknown_kinds
    }
}
