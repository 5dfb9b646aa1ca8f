//! Per-Symbol Ticker State
//!
//! The aggregate record kept for every symbol seen on the feed, and the pure
//! transition that folds a [`Tick`] into it.
//!
//! # Derived Fields
//!
//! - `change_24h` is a tick-over-tick percentage against the previously
//!   stored price. It is not a rolling 24 hour window; no history is kept.
//! - `volume` is the running sum of tick quantities since process start.

use serde::{Deserialize, Serialize};

use crate::domain::events::Tick;

/// Latest aggregated state for one symbol.
///
/// Serialized with the field names the presentation layer consumes
/// (`change24h`, `lastUpdateNs`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerState {
    /// Instrument identifier; immutable identity of the record.
    pub symbol: String,
    /// Last observed price.
    pub price: f64,
    /// Percent change against the previous stored price.
    #[serde(rename = "change24h")]
    pub change_24h: f64,
    /// Cumulative traded quantity.
    pub volume: f64,
    /// Timestamp of the most recent tick, nanoseconds.
    #[serde(rename = "lastUpdateNs")]
    pub last_update_nanos: i64,
    /// Feed origin of the most recent tick.
    pub source: String,
}

impl TickerState {
    /// Build the state that replaces `prev` after applying `tick`.
    ///
    /// The result fully replaces any prior entry; nothing is merged field by
    /// field. Out-of-order timestamps and non-positive prices are accepted.
    #[must_use]
    pub fn next(prev: Option<&Self>, tick: &Tick) -> Self {
        let change_24h = prev.map_or(0.0, |p| percent_change(p.price, tick.price));
        let volume = prev.map_or(0.0, |p| p.volume) + tick.quantity;

        Self {
            symbol: tick.symbol.clone(),
            price: tick.price,
            change_24h,
            volume,
            last_update_nanos: tick.timestamp_nanos,
            source: tick.source.clone(),
        }
    }
}

/// Percent change from `previous` to `current`; `0` when `previous <= 0`.
#[must_use]
pub fn percent_change(previous: f64, current: f64) -> f64 {
    if previous > 0.0 {
        (current - previous) / previous * 100.0
    } else {
        0.0
    }
}

// =============================================================================
// Validation Warnings
// =============================================================================

/// A structurally valid tick that looks implausible.
///
/// Warnings never cause a tick to be rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationWarning {
    /// Price is zero or negative.
    #[error("{symbol}: non-positive price {price}")]
    NonPositivePrice {
        /// Affected symbol.
        symbol: String,
        /// Received price.
        price: f64,
    },

    /// Quantity is zero or negative.
    #[error("{symbol}: non-positive quantity {quantity}")]
    NonPositiveQuantity {
        /// Affected symbol.
        symbol: String,
        /// Received quantity.
        quantity: f64,
    },

    /// Source identifier is empty.
    #[error("{symbol}: empty source")]
    EmptySource {
        /// Affected symbol.
        symbol: String,
    },

    /// Tick timestamp is older than the stored state.
    #[error("{symbol}: out-of-order tick ({received_nanos} < {stored_nanos})")]
    OutOfOrder {
        /// Affected symbol.
        symbol: String,
        /// Timestamp currently stored.
        stored_nanos: i64,
        /// Timestamp of the incoming tick.
        received_nanos: i64,
    },
}

impl ValidationWarning {
    /// Inspect `tick` against the stored state and list anything implausible.
    #[must_use]
    pub fn inspect(prev: Option<&TickerState>, tick: &Tick) -> Vec<Self> {
        let mut warnings = Vec::new();

        if tick.price <= 0.0 || tick.price.is_nan() {
            warnings.push(Self::NonPositivePrice {
                symbol: tick.symbol.clone(),
                price: tick.price,
            });
        }
        if tick.quantity <= 0.0 || tick.quantity.is_nan() {
            warnings.push(Self::NonPositiveQuantity {
                symbol: tick.symbol.clone(),
                quantity: tick.quantity,
            });
        }
        if tick.source.is_empty() {
            warnings.push(Self::EmptySource {
                symbol: tick.symbol.clone(),
            });
        }
        if let Some(prev) = prev
            && tick.timestamp_nanos < prev.last_update_nanos
        {
            warnings.push(Self::OutOfOrder {
                symbol: tick.symbol.clone(),
                stored_nanos: prev.last_update_nanos,
                received_nanos: tick.timestamp_nanos,
            });
        }

        warnings
    }

    /// Short label for metrics and counters.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::NonPositivePrice { .. } => "non_positive_price",
            Self::NonPositiveQuantity { .. } => "non_positive_quantity",
            Self::EmptySource { .. } => "empty_source",
            Self::OutOfOrder { .. } => "out_of_order",
        }
    }
}
