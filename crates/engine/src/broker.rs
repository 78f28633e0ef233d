//! Paper broker: ledgers, the shared order queue, and settlement statistics.

use lab_core::{PriceSnapshot, Trade};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use crate::execution::{settle_all, SettlementReport};
use crate::ledger::{Ledger, LedgerBook};
use crate::mark::mark_to_market;
use crate::order_queue::OrderQueue;

/// Running settlement counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrokerStats {
    /// Fills produced.
    pub filled: u64,
    /// Rejections by reason kind.
    pub rejected: BTreeMap<&'static str, u64>,
}

impl BrokerStats {
    /// Total rejected orders.
    pub fn total_rejected(&self) -> u64 {
        self.rejected.values().sum()
    }
}

/// Paper trading execution engine.
pub struct PaperBroker {
    book: LedgerBook,
    queue: Arc<OrderQueue>,
    recent: VecDeque<Trade>,
    history_limit: usize,
    stats: BrokerStats,
}

impl PaperBroker {
    /// Create a broker whose ledgers start with `starting_cash`.
    pub fn new(starting_cash: f64, history_limit: usize) -> Self {
        Self {
            book: LedgerBook::new(starting_cash),
            queue: Arc::new(OrderQueue::new()),
            recent: VecDeque::with_capacity(history_limit),
            history_limit,
            stats: BrokerStats::default(),
        }
    }

    /// Shared handle to the order queue.
    pub fn queue(&self) -> &Arc<OrderQueue> {
        &self.queue
    }

    /// Read-only ledger book.
    pub fn book(&self) -> &LedgerBook {
        &self.book
    }

    /// Ledger for a strategy, opened with starting cash if absent.
    pub fn open_account(&mut self, strategy: &str) -> &Ledger {
        self.book.get(strategy)
    }

    /// Drain the queue and settle everything against `prices`.
    pub fn process_orders(&mut self, prices: &PriceSnapshot) -> SettlementReport {
        let orders = self.queue.drain_all();
        if orders.is_empty() {
            return SettlementReport::default();
        }

        let report = settle_all(&mut self.book, orders, prices);

        self.stats.filled += report.trades.len() as u64;
        for (_, reason) in &report.rejected {
            *self.stats.rejected.entry(reason.kind()).or_insert(0) += 1;
        }
        for trade in &report.trades {
            if self.history_limit > 0 {
                if self.recent.len() >= self.history_limit {
                    self.recent.pop_front();
                }
                self.recent.push_back(trade.clone());
            }
        }

        report
    }

    /// Mark one strategy's ledger to market.
    pub fn mark_to_market(&mut self, strategy: &str, prices: &PriceSnapshot) {
        mark_to_market(self.book.entry(strategy), prices);
    }

    /// Mark every known ledger to market.
    pub fn mark_all(&mut self, prices: &PriceSnapshot) {
        for ledger in self.book.ledgers_mut() {
            mark_to_market(ledger, prices);
        }
    }

    /// Most recent fills, oldest first.
    pub fn recent_trades(&self) -> impl Iterator<Item = &Trade> {
        self.recent.iter()
    }

    /// Settlement counters.
    pub fn stats(&self) -> &BrokerStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lab_core::{Order, Side};

    fn prices(btc: f64) -> PriceSnapshot {
        [("BTCUSDT", btc)].into_iter().collect()
    }

    #[test]
    fn test_process_orders_drains_queue() {
        let mut broker = PaperBroker::new(10_000.0, 10);
        broker.queue().enqueue(Order::new("bot", "BTCUSDT", Side::Buy, 0.001));
        broker.queue().enqueue(Order::new("bot", "BTCUSDT", Side::Sell, 1.0));
        broker.queue().enqueue(Order::new("bot", "SOLUSDT", Side::Buy, 1.0));

        let report = broker.process_orders(&prices(50_000.0));

        assert_eq!(report.trades.len(), 2);
        assert_eq!(report.rejected.len(), 1);
        assert!(broker.queue().is_empty());
        assert_eq!(broker.stats().filled, 2);
        assert_eq!(broker.stats().rejected.get("price_unavailable"), Some(&1));
        assert_eq!(broker.stats().total_rejected(), 1);
    }

    #[test]
    fn test_empty_queue_mutates_nothing() {
        let mut broker = PaperBroker::new(10_000.0, 10);
        broker.open_account("bot");
        let before = broker.book().peek("bot").cloned();

        let report = broker.process_orders(&prices(50_000.0));

        assert_eq!(report.processed(), 0);
        assert_eq!(broker.book().peek("bot").cloned(), before);
        assert_eq!(broker.stats(), &BrokerStats::default());
    }

    #[test]
    fn test_recent_trades_are_bounded() {
        let mut broker = PaperBroker::new(10_000.0, 2);
        for _ in 0..3 {
            broker.queue().enqueue(Order::new("bot", "BTCUSDT", Side::Buy, 1.0));
        }
        broker.process_orders(&prices(10.0));

        assert_eq!(broker.recent_trades().count(), 2);
        let last = broker.recent_trades().last().unwrap();
        assert_relative_eq!(last.position_after, 3.0);
    }

    #[test]
    fn test_mark_all_updates_equity() {
        let mut broker = PaperBroker::new(1_000.0, 0);
        broker.open_account("idle");
        broker.queue().enqueue(Order::new("active", "BTCUSDT", Side::Buy, 2.0));
        broker.process_orders(&prices(100.0));

        broker.mark_all(&prices(150.0));

        let active = broker.book().peek("active").unwrap();
        assert_relative_eq!(active.equity(), 800.0 + 300.0);
        assert_relative_eq!(active.unrealized_pnl(), 100.0);
        assert_relative_eq!(broker.book().peek("idle").unwrap().equity(), 1_000.0);
        assert_eq!(broker.recent_trades().count(), 0);
    }
}
