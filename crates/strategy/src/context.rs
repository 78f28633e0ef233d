//! Capabilities handed to strategy callbacks.

use lab_core::{Order, PriceSnapshot, Side, TimestampMs};
use lab_engine::{Ledger, OrderQueue};
use std::collections::BTreeMap;
use tracing::info;

/// Read access to prices and the strategy's own ledger, plus order submission.
///
/// Orders go straight into the shared queue and settle on the next tick.
pub struct StrategyContext<'a> {
    strategy: &'a str,
    ts_ms: TimestampMs,
    prices: &'a PriceSnapshot,
    ledger: &'a Ledger,
    queue: &'a OrderQueue,
}

impl<'a> StrategyContext<'a> {
    pub fn new(
        strategy: &'a str,
        ts_ms: TimestampMs,
        prices: &'a PriceSnapshot,
        ledger: &'a Ledger,
        queue: &'a OrderQueue,
    ) -> Self {
        Self {
            strategy,
            ts_ms,
            prices,
            ledger,
            queue,
        }
    }

    /// Name of the strategy this context belongs to.
    pub fn strategy(&self) -> &str {
        self.strategy
    }

    /// Tick time.
    pub fn time(&self) -> TimestampMs {
        self.ts_ms
    }

    /// Price of a symbol in this tick's snapshot.
    pub fn get_price(&self, symbol: &str) -> Option<f64> {
        self.prices.get(symbol)
    }

    /// Held quantity, 0 if none.
    pub fn get_position(&self, symbol: &str) -> f64 {
        self.ledger.position(symbol)
    }

    /// Cash balance.
    pub fn get_cash(&self) -> f64 {
        self.ledger.cash()
    }

    /// Queue a market order. No confirmation is returned.
    pub fn submit_order(&self, symbol: &str, side: Side, size: f64) {
        self.queue.enqueue(Order::new(self.strategy, symbol, side, size));
        info!(strategy = %self.strategy, side = %side, symbol = %symbol, size, "Order submitted");
    }

    /// Log a message tagged with the strategy name.
    pub fn log(&self, message: impl AsRef<str>) {
        info!(strategy = %self.strategy, "{}", message.as_ref());
    }
}

/// Read-only ledger view included in each tick payload.
#[derive(Debug, Clone, PartialEq)]
pub struct BotView {
    pub cash: f64,
    pub positions: BTreeMap<String, f64>,
    pub equity: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
}

impl BotView {
    pub fn from_ledger(ledger: &Ledger) -> Self {
        Self {
            cash: ledger.cash(),
            positions: ledger.positions().clone(),
            equity: ledger.equity(),
            realized_pnl: ledger.realized_pnl(),
            unrealized_pnl: ledger.unrealized_pnl(),
        }
    }
}

/// Data passed to `on_tick`.
#[derive(Debug, Clone)]
pub struct TickPayload<'a> {
    pub ts_ms: TimestampMs,
    pub prices: &'a PriceSnapshot,
    pub bot: BotView,
}
