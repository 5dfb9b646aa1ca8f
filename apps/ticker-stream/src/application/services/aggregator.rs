//! Ticker Aggregator
//!
//! Owns the authoritative `symbol → TickerState` map. It is the only writer;
//! everything else reads clones.
//!
//! # Consistency
//!
//! Each tick is applied as a single replace-of-entry under the write lock,
//! so a reader either sees the previous record or the new one, never a mix.
//! In the running service the dispatch pipeline is the sole caller of
//! [`TickerAggregator::apply_tick`], which also keeps notification order
//! equal to arrival order.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::application::ports::{Diagnostic, NotificationPort};
use crate::application::services::stats::StreamStats;
use crate::domain::events::Tick;
use crate::domain::ticker::{TickerState, ValidationWarning};

/// Authoritative per-symbol market state.
pub struct TickerAggregator {
    tickers: RwLock<HashMap<String, TickerState>>,
    notifier: Arc<dyn NotificationPort>,
    stats: Arc<StreamStats>,
}

impl TickerAggregator {
    /// Create an empty aggregator publishing to `notifier`.
    #[must_use]
    pub fn new(notifier: Arc<dyn NotificationPort>, stats: Arc<StreamStats>) -> Self {
        Self {
            tickers: RwLock::new(HashMap::new()),
            notifier,
            stats,
        }
    }

    /// Fold `tick` into the state for its symbol, publish and return it.
    ///
    /// Implausible ticks (non-positive price, out-of-order timestamp, ...)
    /// are applied anyway and reported as [`Diagnostic::Validation`].
    pub fn apply_tick(&self, tick: &Tick) -> TickerState {
        let (state, warnings) = {
            let mut tickers = self.tickers.write();
            let prev = tickers.get(&tick.symbol);
            let warnings = ValidationWarning::inspect(prev, tick);
            let state = TickerState::next(prev, tick);
            tickers.insert(state.symbol.clone(), state.clone());
            (state, warnings)
        };

        for warning in warnings {
            tracing::warn!(symbol = %tick.symbol, reason = warning.reason(), "{warning}");
            self.stats.record_validation_warning();
            self.notifier.diagnostic(&Diagnostic::Validation(warning));
        }

        self.stats.record_tick_applied();
        tracing::trace!(
            symbol = %state.symbol,
            price = state.price,
            volume = state.volume,
            "Ticker updated"
        );
        self.notifier.ticker_updated(&state);
        state
    }

    /// Current state for `symbol`.
    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<TickerState> {
        self.tickers.read().get(symbol).cloned()
    }

    /// Consistent copy of every tracked symbol, ordered by symbol.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, TickerState> {
        self.tickers
            .read()
            .iter()
            .map(|(symbol, state)| (symbol.clone(), state.clone()))
            .collect()
    }

    /// Tracked symbols, sorted.
    #[must_use]
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.tickers.read().keys().cloned().collect();
        symbols.sort_unstable();
        symbols
    }

    /// Number of tracked symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tickers.read().len()
    }

    /// Whether no symbol has been seen yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tickers.read().is_empty()
    }
}

impl std::fmt::Debug for TickerAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickerAggregator")
            .field("symbols", &self.len())
            .finish_non_exhaustive()
    }
}
