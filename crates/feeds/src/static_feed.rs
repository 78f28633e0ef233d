//! Fixed prices, published once. For offline runs.

use lab_core::config::StaticFeedConfig;
use std::collections::BTreeMap;
use tracing::info;

use crate::board::PriceBoard;
use crate::handle::FeedHandle;

pub struct StaticFeed {
    prices: BTreeMap<String, f64>,
    board: PriceBoard,
}

impl StaticFeed {
    pub fn new(config: &StaticFeedConfig, board: PriceBoard) -> Self {
        Self {
            prices: config.prices.clone(),
            board,
        }
    }

    /// Publish every configured price. The handle owns no tasks.
    pub async fn start(self) -> FeedHandle {
        let mut published = 0;
        for (symbol, price) in &self.prices {
            if self.board.update(symbol, *price).await {
                published += 1;
            }
        }
        info!(symbols = published, "Static prices published");
        FeedHandle::new("static_prices", Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PriceFeed;

    #[tokio::test]
    async fn test_publishes_valid_prices() {
        let mut config = StaticFeedConfig::default();
        config.enabled = true;
        config.prices.insert("BTCUSDT".to_string(), 50_000.0);
        config.prices.insert("BAD".to_string(), -5.0);

        let board = PriceBoard::new();
        let handle = StaticFeed::new(&config, board.clone()).start().await;

        let snapshot = board.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("BTCUSDT"), Some(50_000.0));
        assert_eq!(handle.task_count(), 0);
        handle.disconnect().await;
    }
}
