//! Seeded random trader.

use lab_core::Side;

use crate::context::{StrategyContext, TickPayload};
use crate::Strategy;

/// Trades small random amounts on one symbol.
///
/// Each tick it acts with probability `trade_probability`, then picks
/// BUY, SELL or nothing uniformly. Sells release half the position.
pub struct RandomTrader {
    name: String,
    symbols: Vec<String>,
    size: f64,
    trade_probability: f64,
    min_cash: f64,
    state: u64,
}

impl RandomTrader {
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        size: f64,
        trade_probability: f64,
        seed: u64,
        min_cash: f64,
    ) -> Self {
        Self {
            name: name.into(),
            symbols: vec![symbol.into()],
            size,
            trade_probability,
            min_cash,
            state: seed,
        }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    fn next_unit(&mut self) -> f64 {
        let value = self.next_u64();
        (value as f64) / (u64::MAX as f64)
    }
}

impl Strategy for RandomTrader {
    fn name(&self) -> &str {
        &self.name
    }

    fn symbols(&self) -> &[String] {
        &self.symbols
    }

    fn init(&mut self, ctx: &StrategyContext<'_>) -> anyhow::Result<()> {
        ctx.log("Random trader initialized");
        Ok(())
    }

    fn on_tick(&mut self, ctx: &StrategyContext<'_>, _tick: &TickPayload<'_>) -> anyhow::Result<()> {
        if self.next_unit() > self.trade_probability {
            return Ok(());
        }

        let symbol = self.symbols[0].clone();
        let Some(price) = ctx.get_price(&symbol) else {
            return Ok(());
        };
        let cash = ctx.get_cash();
        let position = ctx.get_position(&symbol);

        // High bits; the low bits of the LCG cycle quickly
        match (self.next_u64() >> 33) % 3 {
            0 if cash > self.min_cash && cash >= price * self.size => {
                ctx.submit_order(&symbol, Side::Buy, self.size);
                ctx.log(format!("Random BUY {} {symbol} @ {price:.2}", self.size));
            }
            1 if position > 0.0 => {
                let size = position * 0.5;
                ctx.submit_order(&symbol, Side::Sell, size);
                ctx.log(format!("Random SELL {size} {symbol} @ {price:.2}"));
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BotView;
    use lab_core::{Order, PriceSnapshot};
    use lab_engine::PaperBroker;

    fn run(strategy: &mut RandomTrader, broker: &mut PaperBroker, ticks: usize) -> Vec<Order> {
        let prices: PriceSnapshot = [("BTCUSDT", 100.0)].into_iter().collect();
        let name = strategy.name().to_string();
        broker.open_account(&name);
        let mut submitted = Vec::new();
        for _ in 0..ticks {
            broker.process_orders(&prices);
            let ledger = broker.book().peek(&name).unwrap();
            let ctx = StrategyContext::new(&name, 0, &prices, ledger, broker.queue());
            let payload = TickPayload {
                ts_ms: 0,
                prices: &prices,
                bot: BotView::from_ledger(ledger),
            };
            strategy.on_tick(&ctx, &payload).unwrap();
            let orders = broker.queue().drain_all();
            for order in &orders {
                broker.queue().enqueue(order.clone());
            }
            submitted.extend(orders);
        }
        submitted
    }

    #[test]
    fn test_same_seed_same_orders() {
        let mut a = RandomTrader::new("a", "BTCUSDT", 0.1, 0.5, 9, 100.0);
        let mut b = RandomTrader::new("a", "BTCUSDT", 0.1, 0.5, 9, 100.0);
        let mut broker_a = PaperBroker::new(10_000.0, 0);
        let mut broker_b = PaperBroker::new(10_000.0, 0);

        assert_eq!(run(&mut a, &mut broker_a, 200), run(&mut b, &mut broker_b, 200));
    }

    #[test]
    fn test_zero_probability_never_trades() {
        let mut trader = RandomTrader::new("quiet", "BTCUSDT", 0.1, 0.0, 1, 100.0);
        let mut broker = PaperBroker::new(10_000.0, 0);
        assert!(run(&mut trader, &mut broker, 100).is_empty());
    }

    #[test]
    fn test_orders_respect_rules() {
        let mut trader = RandomTrader::new("busy", "BTCUSDT", 0.5, 1.0, 3, 100.0);
        let mut broker = PaperBroker::new(10_000.0, 0);
        let orders = run(&mut trader, &mut broker, 300);

        assert!(!orders.is_empty());
        assert!(orders.iter().any(|o| o.side == Side::Buy));
        for order in &orders {
            assert_eq!(order.symbol, "BTCUSDT");
            if order.side == Side::Buy {
                assert_eq!(order.size, 0.5);
            }
        }
        // Sells only ever release part of a held position
        assert_eq!(broker.stats().rejected.get("no_position"), None);
    }

    #[test]
    fn test_unit_draws_in_range() {
        let mut trader = RandomTrader::new("r", "BTCUSDT", 0.1, 0.5, 42, 100.0);
        for _ in 0..1_000 {
            let u = trader.next_unit();
            assert!((0.0..=1.0).contains(&u));
        }
    }
}
