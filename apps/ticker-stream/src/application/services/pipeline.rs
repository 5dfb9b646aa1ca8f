//! Event Dispatch Pipeline
//!
//! Single consumer of the decode queue. Routes each [`FeedEvent`] to the
//! aggregator, the order acknowledgement channel or the diagnostics channel.
//! Running exactly one pipeline per feed keeps per-symbol application order
//! equal to frame arrival order.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{Diagnostic, FeedEvent, NotificationPort};
use crate::application::services::aggregator::TickerAggregator;
use crate::application::services::stats::StreamStats;
use crate::domain::events::StreamEvent;

/// Routes decoded events to their consumers.
#[derive(Clone)]
pub struct EventPipeline {
    aggregator: Arc<TickerAggregator>,
    notifier: Arc<dyn NotificationPort>,
    stats: Arc<StreamStats>,
}

impl std::fmt::Debug for EventPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPipeline")
            .field("aggregator", &self.aggregator)
            .finish_non_exhaustive()
    }
}

impl EventPipeline {
    /// Create a pipeline feeding `aggregator` and `notifier`.
    #[must_use]
    pub fn new(
        aggregator: Arc<TickerAggregator>,
        notifier: Arc<dyn NotificationPort>,
        stats: Arc<StreamStats>,
    ) -> Self {
        Self {
            aggregator,
            notifier,
            stats,
        }
    }

    /// Route a single event.
    pub fn dispatch(&self, event: FeedEvent) {
        match event {
            FeedEvent::Event(StreamEvent::Tick(tick)) => {
                self.aggregator.apply_tick(&tick);
            }
            FeedEvent::Event(StreamEvent::OrderAck(ack)) => {
                tracing::debug!(
                    order_id = ack.order_id,
                    accepted = ack.accepted,
                    resting = ack.resting,
                    "Order acknowledgement received"
                );
                self.stats.record_order_ack();
                self.notifier.order_acknowledged(&ack);
            }
            FeedEvent::DecodeFailed(error) => {
                self.notifier.diagnostic(&Diagnostic::DecodeFailed(error));
            }
        }
    }

    /// Drain `events` until the sender side closes or `cancel` fires.
    pub async fn run(self, mut events: mpsc::Receiver<FeedEvent>, cancel: CancellationToken) {
        tracing::info!("Event pipeline started");
        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    tracing::info!("Event pipeline cancelled");
                    break;
                }

                event = events.recv() => {
                    let Some(event) = event else {
                        tracing::info!("Event queue closed");
                        break;
                    };
                    self.dispatch(event);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::MockNotificationPort;
    use crate::domain::events::{DecodeError, OrderAck, Side, Tick};

    fn tick(symbol: &str, price: f64) -> FeedEvent {
        FeedEvent::Event(StreamEvent::Tick(Tick {
            symbol: symbol.to_string(),
            timestamp_nanos: 1,
            price,
            quantity: 1.0,
            side: Side::Sell,
            source: "feed-a".to_string(),
        }))
    }

    fn ack(order_id: i64) -> FeedEvent {
        FeedEvent::Event(StreamEvent::OrderAck(OrderAck {
            order_id,
            accepted: true,
            resting: false,
            filled_quantity: 1.0,
            remaining_quantity: 0.0,
            reject_reason: String::new(),
        }))
    }

    fn pipeline(mock: MockNotificationPort) -> (EventPipeline, Arc<TickerAggregator>, Arc<StreamStats>) {
        let notifier: Arc<dyn NotificationPort> = Arc::new(mock);
        let stats = Arc::new(StreamStats::new());
        let aggregator = Arc::new(TickerAggregator::new(
            Arc::clone(&notifier),
            Arc::clone(&stats),
        ));
        (
            EventPipeline::new(Arc::clone(&aggregator), notifier, Arc::clone(&stats)),
            aggregator,
            stats,
        )
    }

    #[test]
    fn order_ack_bypasses_aggregator() {
        let mut mock = MockNotificationPort::new();
        mock.expect_order_acknowledged()
            .withf(|ack| ack.order_id == 42)
            .times(1)
            .return_const(());
        mock.expect_ticker_updated().never();
        mock.expect_diagnostic().never();

        let (pipeline, aggregator, stats) = pipeline(mock);
        pipeline.dispatch(ack(42));

        assert!(aggregator.is_empty());
        assert_eq!(stats.snapshot().order_acks, 1);
    }

    #[test]
    fn tick_reaches_aggregator() {
        let mut mock = MockNotificationPort::new();
        mock.expect_ticker_updated().times(1).return_const(());
        mock.expect_order_acknowledged().never();
        mock.expect_diagnostic().never();

        let (pipeline, aggregator, _) = pipeline(mock);
        pipeline.dispatch(tick("ETH/USDT", 3000.0));

        assert_eq!(aggregator.get("ETH/USDT").unwrap().price, 3000.0);
    }

    #[test]
    fn decode_failure_becomes_diagnostic() {
        let mut mock = MockNotificationPort::new();
        mock.expect_diagnostic()
            .withf(|d| matches!(d, Diagnostic::DecodeFailed(DecodeError::UnknownKind(k)) if k == "heartbeat"))
            .times(1)
            .return_const(());
        mock.expect_ticker_updated().never();
        mock.expect_order_acknowledged().never();

        let (pipeline, aggregator, _) = pipeline(mock);
        pipeline.dispatch(FeedEvent::DecodeFailed(DecodeError::UnknownKind(
            "heartbeat".to_string(),
        )));

        assert!(aggregator.is_empty());
    }

    #[tokio::test]
    async fn run_drains_until_sender_dropped() {
        let mut mock = MockNotificationPort::new();
        mock.expect_ticker_updated().times(3).return_const(());
        mock.expect_order_acknowledged().times(1).return_const(());
        mock.expect_diagnostic().never();

        let (pipeline, aggregator, _) = pipeline(mock);
        let (tx, rx) = mpsc::channel(8);
        tx.send(tick("A", 1.0)).await.unwrap();
        tx.send(ack(1)).await.unwrap();
        tx.send(tick("A", 2.0)).await.unwrap();
        tx.send(tick("B", 5.0)).await.unwrap();
        drop(tx);

        pipeline.run(rx, CancellationToken::new()).await;

        assert_eq!(aggregator.get("A").unwrap().price, 2.0);
        assert_eq!(aggregator.get("A").unwrap().change_24h, 100.0);
        assert_eq!(aggregator.len(), 2);
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let mut mock = MockNotificationPort::new();
        mock.expect_ticker_updated().never();

        let (pipeline, _, _) = pipeline(mock);
        let (_tx, rx) = mpsc::channel::<FeedEvent>(1);
        let cancel = CancellationToken::new();
        cancel.cancel();

        tokio::time::timeout(std::time::Duration::from_secs(1), pipeline.run(rx, cancel))
            .await
            .expect("pipeline should stop when cancelled");
    }
}
