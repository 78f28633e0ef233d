//! Moving-average trend follower.
//!
//! Buys when price is above its moving average and flat, sells the whole
//! position when price drops below it.

use lab_core::Side;
use std::collections::VecDeque;

use crate::context::{StrategyContext, TickPayload};
use crate::Strategy;

/// Rolling arithmetic mean over a fixed window.
#[derive(Debug, Clone)]
pub struct RollingMean {
    /// Window size in observations.
    window: usize,
    /// Observations in the window.
    values: VecDeque<f64>,
    /// Running sum of the window.
    sum: f64,
}

impl RollingMean {
    /// Create a new rolling mean.
    pub fn new(window: usize) -> Self {
        Self {
            window,
            values: VecDeque::with_capacity(window),
            sum: 0.0,
        }
    }

    /// Add an observation.
    ///
    /// Returns the mean once the window is full.
    pub fn add(&mut self, value: f64) -> Option<f64> {
        if self.values.len() >= self.window {
            if let Some(old) = self.values.pop_front() {
                self.sum -= old;
            }
        }
        self.values.push_back(value);
        self.sum += value;
        self.mean()
    }

    /// Current mean if the window is full.
    pub fn mean(&self) -> Option<f64> {
        if self.is_ready() {
            Some(self.sum / self.values.len() as f64)
        } else {
            None
        }
    }

    /// Check if the window is full.
    pub fn is_ready(&self) -> bool {
        self.window > 0 && self.values.len() >= self.window
    }

    /// Get the number of observations.
    pub fn count(&self) -> usize {
        self.values.len()
    }
}

/// Trend follower on a single symbol.
pub struct TrendFollower {
    name: String,
    symbols: Vec<String>,
    size: f64,
    min_cash: f64,
    history: RollingMean,
}

impl TrendFollower {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, size: f64, window: usize, min_cash: f64) -> Self {
        Self {
            name: name.into(),
            symbols: vec![symbol.into()],
            size,
            min_cash,
            history: RollingMean::new(window),
        }
    }

    fn symbol(&self) -> &str {
        &self.symbols[0]
    }
}

impl Strategy for TrendFollower {
    fn name(&self) -> &str {
        &self.name
    }

    fn symbols(&self) -> &[String] {
        &self.symbols
    }

    fn init(&mut self, ctx: &StrategyContext<'_>) -> anyhow::Result<()> {
        ctx.log(format!(
            "Trend follower initialized on {} ({}-tick moving average)",
            self.symbol(),
            self.history.window
        ));
        Ok(())
    }

    fn on_tick(&mut self, ctx: &StrategyContext<'_>, _tick: &TickPayload<'_>) -> anyhow::Result<()> {
        let symbol = self.symbol().to_string();
        let Some(price) = ctx.get_price(&symbol) else {
            return Ok(());
        };
        let Some(ma) = self.history.add(price) else {
            return Ok(());
        };

        let cash = ctx.get_cash();
        let position = ctx.get_position(&symbol);

        if price > ma && position == 0.0 && cash > self.min_cash && cash >= price * self.size {
            ctx.submit_order(&symbol, Side::Buy, self.size);
            ctx.log(format!("TREND BUY {} {symbol} @ {price:.2} (MA {ma:.2})", self.size));
        } else if price < ma && position > 0.0 {
            ctx.submit_order(&symbol, Side::Sell, position);
            ctx.log(format!("TREND SELL {position} {symbol} @ {price:.2} (MA {ma:.2})"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BotView;
    use approx::assert_relative_eq;
    use lab_core::{Order, PriceSnapshot};
    use lab_engine::PaperBroker;

    fn tick(strategy: &mut TrendFollower, broker: &mut PaperBroker, price: f64) -> Vec<Order> {
        let prices: PriceSnapshot = [("BTCUSDT", price)].into_iter().collect();
        broker.process_orders(&prices);
        broker.mark_all(&prices);
        let name = strategy.name().to_string();
        let ledger = broker.book().peek(&name).unwrap();
        let ctx = StrategyContext::new(&name, 0, &prices, ledger, broker.queue());
        let payload = TickPayload {
            ts_ms: 0,
            prices: &prices,
            bot: BotView::from_ledger(ledger),
        };
        strategy.on_tick(&ctx, &payload).unwrap();
        broker.queue().drain_all()
    }

    #[test]
    fn test_rolling_mean_window() {
        let mut mean = RollingMean::new(3);
        assert!(mean.add(1.0).is_none());
        assert!(mean.add(2.0).is_none());
        assert_eq!(mean.add(3.0), Some(2.0));
        assert_relative_eq!(mean.add(6.0).unwrap(), 11.0 / 3.0);
        assert_eq!(mean.count(), 3);
    }

    #[test]
    fn test_waits_for_full_window() {
        let mut strategy = TrendFollower::new("trend", "BTCUSDT", 0.01, 3, 100.0);
        let mut broker = PaperBroker::new(10_000.0, 0);
        broker.open_account("trend");

        assert!(tick(&mut strategy, &mut broker, 100.0).is_empty());
        assert!(tick(&mut strategy, &mut broker, 200.0).is_empty());
    }

    #[test]
    fn test_buys_above_average_when_flat() {
        let mut strategy = TrendFollower::new("trend", "BTCUSDT", 0.01, 3, 100.0);
        let mut broker = PaperBroker::new(10_000.0, 0);
        broker.open_account("trend");

        tick(&mut strategy, &mut broker, 100.0);
        tick(&mut strategy, &mut broker, 100.0);
        let orders = tick(&mut strategy, &mut broker, 130.0);

        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, Side::Buy);
        assert_eq!(orders[0].size, 0.01);
    }

    #[test]
    fn test_sells_whole_position_below_average() {
        let mut strategy = TrendFollower::new("trend", "BTCUSDT", 1.0, 2, 100.0);
        let mut broker = PaperBroker::new(10_000.0, 0);
        broker.open_account("trend");

        tick(&mut strategy, &mut broker, 100.0);
        let buys = tick(&mut strategy, &mut broker, 110.0);
        assert_eq!(buys.len(), 1);
        for order in buys {
            broker.queue().enqueue(order);
        }

        // Fill lands on this tick; price now below the average
        let sells = tick(&mut strategy, &mut broker, 90.0);
        assert_eq!(sells.len(), 1);
        assert_eq!(sells[0].side, Side::Sell);
        assert_eq!(sells[0].size, 1.0);
    }

    #[test]
    fn test_no_price_no_action() {
        let mut strategy = TrendFollower::new("trend", "ETHUSDT", 1.0, 2, 100.0);
        let mut broker = PaperBroker::new(10_000.0, 0);
        broker.open_account("trend");

        for price in [1.0, 2.0, 3.0] {
            assert!(tick(&mut strategy, &mut broker, price).is_empty());
        }
        assert_eq!(strategy.history.count(), 0);
    }
}
