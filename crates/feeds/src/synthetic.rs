//! Seeded random-walk prices for offline demos.

use lab_core::config::SyntheticFeedConfig;
use std::time::Duration;
use tracing::info;

use crate::board::PriceBoard;
use crate::handle::FeedHandle;

/// Prices never walk below this floor.
const MIN_PRICE: f64 = 0.01;

/// Bounded random walk driven by a 64-bit LCG.
#[derive(Debug, Clone)]
pub struct RandomWalk {
    state: u64,
    price: f64,
    max_step: f64,
}

impl RandomWalk {
    pub fn new(seed: u64, start_price: f64, max_step: f64) -> Self {
        Self {
            state: seed,
            price: start_price.max(MIN_PRICE),
            max_step: max_step.abs(),
        }
    }

    /// Step by a uniform delta in `[-max_step, max_step]`.
    pub fn next_price(&mut self) -> f64 {
        let unit = next_unit(&mut self.state);
        let delta = (unit * 2.0 - 1.0) * self.max_step;
        self.price = (self.price + delta).max(MIN_PRICE);
        self.price
    }

    pub fn price(&self) -> f64 {
        self.price
    }
}

fn next_u64(state: &mut u64) -> u64 {
    *state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    *state
}

fn next_unit(state: &mut u64) -> f64 {
    let value = next_u64(state);
    (value as f64) / (u64::MAX as f64)
}

/// Publishes one random walk per symbol on a fixed interval.
pub struct SyntheticFeed {
    config: SyntheticFeedConfig,
    board: PriceBoard,
}

impl SyntheticFeed {
    pub fn new(config: SyntheticFeedConfig, board: PriceBoard) -> Self {
        Self { config, board }
    }

    /// Spawn the generator task.
    pub fn start(self) -> FeedHandle {
        let walks: Vec<(String, RandomWalk)> = self
            .config
            .symbols
            .iter()
            .enumerate()
            .map(|(i, symbol)| {
                let seed = self.config.seed.wrapping_add(i as u64);
                (
                    symbol.clone(),
                    RandomWalk::new(seed, self.config.start_price, self.config.max_step),
                )
            })
            .collect();
        let interval = Duration::from_millis(self.config.interval_ms.max(1));
        let board = self.board;

        info!(
            symbols = walks.len(),
            interval_ms = interval.as_millis() as u64,
            "Starting synthetic feed"
        );

        let task = tokio::spawn(async move {
            let mut walks = walks;
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                for (symbol, walk) in walks.iter_mut() {
                    board.update(symbol, walk.next_price()).await;
                }
            }
        });

        FeedHandle::new("synthetic", vec![task])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PriceFeed;

    #[test]
    fn test_seeded_walk_is_deterministic() {
        let mut a = RandomWalk::new(42, 100.0, 0.5);
        let mut b = RandomWalk::new(42, 100.0, 0.5);

        let walk_a: Vec<f64> = (0..50).map(|_| a.next_price()).collect();
        let walk_b: Vec<f64> = (0..50).map(|_| b.next_price()).collect();

        assert_eq!(walk_a, walk_b);
    }

    #[test]
    fn test_steps_are_bounded() {
        let mut walk = RandomWalk::new(7, 100.0, 2.0);
        let mut last = walk.price();
        for _ in 0..1_000 {
            let next = walk.next_price();
            assert!((next - last).abs() <= 2.0 + 1e-9);
            last = next;
        }
    }

    #[test]
    fn test_price_stays_positive() {
        let mut walk = RandomWalk::new(1, 0.5, 10.0);
        for _ in 0..1_000 {
            assert!(walk.next_price() >= MIN_PRICE);
        }
    }

    #[tokio::test]
    async fn test_feed_publishes_every_symbol() {
        let config = SyntheticFeedConfig {
            enabled: true,
            symbols: vec!["AAA".to_string(), "BBB".to_string()],
            start_price: 100.0,
            max_step: 1.0,
            seed: 3,
            interval_ms: 5,
        };
        let board = PriceBoard::new();
        let handle = SyntheticFeed::new(config, board.clone()).start();

        // First interval tick fires immediately
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.disconnect().await;

        let snapshot = board.snapshot().await;
        assert!(snapshot.get("AAA").is_some());
        assert!(snapshot.get("BBB").is_some());
    }
}
