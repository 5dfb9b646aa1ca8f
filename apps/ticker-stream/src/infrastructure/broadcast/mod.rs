//! Notification Hub
//!
//! Fans feed output out to any number of observers using tokio broadcast
//! channels, one per notification kind:
//!
//! - Ticker updates (full [`TickerState`] after every applied tick)
//! - Order acknowledgements, forwarded untouched
//! - Diagnostics (dropped frames, validation warnings)
//!
//! Publishing never blocks. A receiver that falls more than `capacity` items
//! behind observes `RecvError::Lagged` and skips ahead; other receivers and
//! the dispatch pipeline are unaffected.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::application::ports::{Diagnostic, NotificationPort};
use crate::domain::events::OrderAck;
use crate::domain::ticker::TickerState;
use crate::infrastructure::config::ChannelSettings;
use crate::infrastructure::metrics::{self, NotificationChannel};

// =============================================================================
// Configuration
// =============================================================================

/// Channel capacities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationConfig {
    /// Capacity of the ticker update channel.
    pub ticker_updates_capacity: usize,
    /// Capacity of the order acknowledgement channel.
    pub order_acks_capacity: usize,
    /// Capacity of the diagnostics channel.
    pub diagnostics_capacity: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            ticker_updates_capacity: 10_000,
            order_acks_capacity: 1_000,
            diagnostics_capacity: 1_000,
        }
    }
}

impl From<&ChannelSettings> for NotificationConfig {
    fn from(settings: &ChannelSettings) -> Self {
        Self {
            ticker_updates_capacity: settings.ticker_updates_capacity,
            order_acks_capacity: settings.order_acks_capacity,
            diagnostics_capacity: settings.diagnostics_capacity,
        }
    }
}

// =============================================================================
// Hub
// =============================================================================

/// Broadcast fan-out for feed notifications.
#[derive(Debug)]
#[allow(clippy::struct_field_names)]
pub struct NotificationHub {
    ticker_updates_tx: broadcast::Sender<TickerState>,
    order_acks_tx: broadcast::Sender<OrderAck>,
    diagnostics_tx: broadcast::Sender<Diagnostic>,
}

impl NotificationHub {
    /// Create a hub with the given capacities. Zero is raised to one.
    #[must_use]
    pub fn new(config: NotificationConfig) -> Self {
        Self {
            ticker_updates_tx: broadcast::channel(config.ticker_updates_capacity.max(1)).0,
            order_acks_tx: broadcast::channel(config.order_acks_capacity.max(1)).0,
            diagnostics_tx: broadcast::channel(config.diagnostics_capacity.max(1)).0,
        }
    }

    /// Create a hub with default capacities.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(NotificationConfig::default())
    }

    // =========================================================================
    // Ticker Updates
    // =========================================================================

    /// Publish a ticker update.
    ///
    /// Returns the number of receivers, or `None` if nobody is listening.
    pub fn send_ticker_update(&self, state: TickerState) -> Option<usize> {
        metrics::record_notification_published(NotificationChannel::TickerUpdates);
        self.ticker_updates_tx.send(state).ok()
    }

    /// Subscribe to ticker updates.
    #[must_use]
    pub fn ticker_updates_rx(&self) -> broadcast::Receiver<TickerState> {
        self.ticker_updates_tx.subscribe()
    }

    /// Number of ticker update receivers.
    #[must_use]
    pub fn ticker_updates_receiver_count(&self) -> usize {
        self.ticker_updates_tx.receiver_count()
    }

    // =========================================================================
    // Order Acknowledgements
    // =========================================================================

    /// Publish an order acknowledgement.
    pub fn send_order_ack(&self, ack: OrderAck) -> Option<usize> {
        metrics::record_notification_published(NotificationChannel::OrderAcks);
        self.order_acks_tx.send(ack).ok()
    }

    /// Subscribe to order acknowledgements.
    #[must_use]
    pub fn order_acks_rx(&self) -> broadcast::Receiver<OrderAck> {
        self.order_acks_tx.subscribe()
    }

    /// Number of order acknowledgement receivers.
    #[must_use]
    pub fn order_acks_receiver_count(&self) -> usize {
        self.order_acks_tx.receiver_count()
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Publish a diagnostic.
    pub fn send_diagnostic(&self, diagnostic: Diagnostic) -> Option<usize> {
        metrics::record_notification_published(NotificationChannel::Diagnostics);
        if let Diagnostic::Validation(warning) = &diagnostic {
            metrics::record_validation_warning(warning.reason());
        }
        self.diagnostics_tx.send(diagnostic).ok()
    }

    /// Subscribe to diagnostics.
    #[must_use]
    pub fn diagnostics_rx(&self) -> broadcast::Receiver<Diagnostic> {
        self.diagnostics_tx.subscribe()
    }

    /// Number of diagnostics receivers.
    #[must_use]
    pub fn diagnostics_receiver_count(&self) -> usize {
        self.diagnostics_tx.receiver_count()
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Receiver counts for all channels.
    #[must_use]
    pub fn stats(&self) -> NotificationStats {
        NotificationStats {
            ticker_updates_receivers: self.ticker_updates_receiver_count(),
            order_acks_receivers: self.order_acks_receiver_count(),
            diagnostics_receivers: self.diagnostics_receiver_count(),
        }
    }
}

impl NotificationPort for NotificationHub {
    fn ticker_updated(&self, state: &TickerState) {
        let _ = self.send_ticker_update(state.clone());
    }

    fn order_acknowledged(&self, ack: &OrderAck) {
        let _ = self.send_order_ack(ack.clone());
    }

    fn diagnostic(&self, diagnostic: &Diagnostic) {
        let _ = self.send_diagnostic(diagnostic.clone());
    }
}

/// Shared hub reference.
pub type SharedNotificationHub = Arc<NotificationHub>;

/// Receiver counts per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationStats {
    /// Ticker update receivers.
    pub ticker_updates_receivers: usize,
    /// Order acknowledgement receivers.
    pub order_acks_receivers: usize,
    /// Diagnostics receivers.
    pub diagnostics_receivers: usize,
}

impl NotificationStats {
    /// Total receivers across all channels.
    #[must_use]
    pub const fn total_receivers(&self) -> usize {
        self.ticker_updates_receivers + self.order_acks_receivers + self.diagnostics_receivers
    }
}

// =============================================================================
// Tests
// =============================================================================
