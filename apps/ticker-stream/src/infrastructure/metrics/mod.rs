//! Prometheus Metrics Module
//!
//! Exposes feed ingestion metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Frames**: Frames received, events decoded by kind, decode failures by reason
//! - **Connection**: Current status, transport errors, reconnects
//! - **Notifications**: Items published per outbound channel
//! - **State**: Tracked symbols, validation warnings
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::domain::connection::ConnectionStatus;
use crate::domain::events::EventKind;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Subsequent calls return the handle created by the first one.
///
/// # Panics
///
/// Panics if another global recorder was installed first.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Frame counters
    describe_counter!(
        "ticker_stream_frames_received_total",
        "Total data frames received from the feed"
    );
    describe_counter!(
        "ticker_stream_events_decoded_total",
        "Total frames decoded into events, by kind"
    );
    describe_counter!(
        "ticker_stream_decode_errors_total",
        "Total frames dropped by the decoder, by reason"
    );

    // Connection
    describe_gauge!(
        "ticker_stream_connection_status",
        "1 for the current connection status, 0 otherwise"
    );
    describe_counter!(
        "ticker_stream_transport_errors_total",
        "Total transport failures by type"
    );
    describe_counter!(
        "ticker_stream_reconnects_total",
        "Total reconnection attempts scheduled"
    );

    // Notifications
    describe_counter!(
        "ticker_stream_notifications_published_total",
        "Total notifications published, by channel"
    );

    // State
    describe_gauge!(
        "ticker_stream_tracked_symbols",
        "Number of symbols with aggregate state"
    );
    describe_counter!(
        "ticker_stream_validation_warnings_total",
        "Total ticks accepted with a validation warning, by reason"
    );

    // Latency
    describe_histogram!(
        "ticker_stream_frame_processing_seconds",
        "Time from frame receipt to enqueue for dispatch"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Outbound notification channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationChannel {
    /// Per-symbol ticker state.
    TickerUpdates,
    /// Order acknowledgements.
    OrderAcks,
    /// Decode failures and validation warnings.
    Diagnostics,
}

impl NotificationChannel {
    const fn as_str(self) -> &'static str {
        match self {
            Self::TickerUpdates => "ticker_updates",
            Self::OrderAcks => "order_acks",
            Self::Diagnostics => "diagnostics",
        }
    }
}

const STATUSES: [ConnectionStatus; 3] = [
    ConnectionStatus::Disconnected,
    ConnectionStatus::Connecting,
    ConnectionStatus::Connected,
];

/// Record a data frame received from the feed.
pub fn record_frame_received() {
    counter!("ticker_stream_frames_received_total").increment(1);
}

/// Record a successfully decoded event.
pub fn record_event_decoded(kind: EventKind) {
    counter!(
        "ticker_stream_events_decoded_total",
        "kind" => kind.as_str()
    )
    .increment(1);
}

/// Record a dropped frame.
pub fn record_decode_error(reason: &'static str) {
    counter!(
        "ticker_stream_decode_errors_total",
        "reason" => reason
    )
    .increment(1);
}

/// Set the connection status gauge.
pub fn set_connection_status(current: ConnectionStatus) {
    for status in STATUSES {
        let value = if status == current { 1.0 } else { 0.0 };
        gauge!(
            "ticker_stream_connection_status",
            "status" => status.as_str()
        )
        .set(value);
    }
}

/// Record a transport failure.
pub fn record_transport_error(error_type: &'static str) {
    counter!(
        "ticker_stream_transport_errors_total",
        "error_type" => error_type
    )
    .increment(1);
}

/// Record a scheduled reconnection attempt.
pub fn record_reconnect() {
    counter!("ticker_stream_reconnects_total").increment(1);
}

/// Record a published notification.
pub fn record_notification_published(channel: NotificationChannel) {
    counter!(
        "ticker_stream_notifications_published_total",
        "channel" => channel.as_str()
    )
    .increment(1);
}

/// Update the tracked symbol count.
#[allow(clippy::cast_precision_loss)]
pub fn set_tracked_symbols(count: usize) {
    gauge!("ticker_stream_tracked_symbols").set(count as f64);
}

/// Record a validation warning.
pub fn record_validation_warning(reason: &'static str) {
    counter!(
        "ticker_stream_validation_warnings_total",
        "reason" => reason
    )
    .increment(1);
}

/// Record time spent between frame receipt and enqueue.
pub fn record_processing_duration(duration: Duration) {
    histogram!("ticker_stream_frame_processing_seconds").record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_channel_as_str() {
        assert_eq!(NotificationChannel::TickerUpdates.as_str(), "ticker_updates");
        assert_eq!(NotificationChannel::OrderAcks.as_str(), "order_acks");
        assert_eq!(NotificationChannel::Diagnostics.as_str(), "diagnostics");
    }

    #[test]
    fn recording_without_recorder_is_a_no_op() {
        record_frame_received();
        record_event_decoded(EventKind::Tick);
        record_decode_error("unknown_kind");
        set_connection_status(ConnectionStatus::Connected);
        record_processing_duration(Duration::from_micros(5));
    }
}
