//! Market data feeds for the trading lab.
//!
//! This crate provides:
//! - The `PriceFeed` contract the tick loop reads snapshots from
//! - A shared price board connectors publish into
//! - Binance ticker, static and synthetic random-walk connectors

pub mod binance;
pub mod board;
pub mod handle;
pub mod static_feed;
pub mod synthetic;

pub use binance::{parse_ticker, stream_url, BinanceConnector};
pub use board::PriceBoard;
pub use handle::FeedHandle;
pub use static_feed::StaticFeed;
pub use synthetic::{RandomWalk, SyntheticFeed};

use async_trait::async_trait;
use lab_core::PriceSnapshot;

/// Source of per-tick price snapshots.
///
/// Eventually consistent; absent symbols are simply unpriced for that tick.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Current symbol -> price mapping.
    async fn snapshot(&self) -> PriceSnapshot;
}
