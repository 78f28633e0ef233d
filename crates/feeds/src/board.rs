//! Shared latest-price store.

use async_trait::async_trait;
use lab_core::PriceSnapshot;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::PriceFeed;

/// Latest price per symbol, written by connectors and read by the tick loop.
///
/// Cloning shares the underlying store.
#[derive(Debug, Clone, Default)]
pub struct PriceBoard {
    prices: Arc<RwLock<BTreeMap<String, f64>>>,
}

impl PriceBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a price. Non-finite or non-positive prices are dropped.
    ///
    /// Returns whether the price was stored.
    pub async fn update(&self, symbol: &str, price: f64) -> bool {
        if !price.is_finite() || price <= 0.0 {
            debug!(symbol = %symbol, price, "Ignoring invalid price");
            return false;
        }
        self.prices.write().await.insert(symbol.to_string(), price);
        true
    }

    /// Latest price of one symbol.
    pub async fn get(&self, symbol: &str) -> Option<f64> {
        self.prices.read().await.get(symbol).copied()
    }

    /// Number of priced symbols.
    pub async fn len(&self) -> usize {
        self.prices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.prices.read().await.is_empty()
    }
}

#[async_trait]
impl PriceFeed for PriceBoard {
    async fn snapshot(&self) -> PriceSnapshot {
        let prices = self.prices.read().await;
        prices.iter().map(|(s, p)| (s.clone(), *p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_later_write_wins() {
        let board = PriceBoard::new();
        assert!(board.update("BTCUSDT", 50_000.0).await);
        assert!(board.update("BTCUSDT", 51_000.0).await);

        assert_eq!(board.get("BTCUSDT").await, Some(51_000.0));
        assert_eq!(board.len().await, 1);
    }

    #[tokio::test]
    async fn test_invalid_prices_ignored() {
        let board = PriceBoard::new();
        assert!(!board.update("BTCUSDT", f64::NAN).await);
        assert!(!board.update("BTCUSDT", 0.0).await);
        assert!(!board.update("BTCUSDT", -1.0).await);
        assert!(!board.update("BTCUSDT", f64::INFINITY).await);

        assert!(board.is_empty().await);
        assert!(board.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_is_a_copy() {
        let board = PriceBoard::new();
        board.update("ETHUSDT", 3_000.0).await;
        let snapshot = board.snapshot().await;

        board.update("ETHUSDT", 3_100.0).await;

        assert_eq!(snapshot.get("ETHUSDT"), Some(3_000.0));
        assert_eq!(board.snapshot().await.get("ETHUSDT"), Some(3_100.0));
    }

    #[tokio::test]
    async fn test_clones_share_store() {
        let board = PriceBoard::new();
        let writer = board.clone();
        writer.update("SOLUSDT", 150.0).await;

        assert_eq!(board.get("SOLUSDT").await, Some(150.0));
    }
}
