//! Core data types for the trading lab.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::RejectReason;

/// Timestamp in milliseconds since Unix epoch (UTC).
pub type TimestampMs = i64;

/// Current wall-clock time in milliseconds.
#[inline]
pub fn now_ms() -> TimestampMs {
    Utc::now().timestamp_millis()
}

/// Convert a millisecond timestamp to fractional Unix seconds.
#[inline]
pub fn ts_to_secs(ts_ms: TimestampMs) -> f64 {
    ts_ms as f64 / 1000.0
}

/// Order side. Long-only: SELL reduces an existing position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Wire/storage representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = RejectReason;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(RejectReason::InvalidOrder(format!("unknown side '{other}'"))),
        }
    }
}

/// A market order submitted by a strategy.
///
/// Consumed exactly once by the execution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Submitting strategy.
    pub strategy: String,
    /// Trading symbol (e.g., "BTCUSDT").
    pub symbol: String,
    /// Order side.
    pub side: Side,
    /// Requested quantity. Must be > 0 to settle.
    pub size: f64,
    /// Submission time.
    pub ts_ms: TimestampMs,
}

impl Order {
    /// Create an order stamped with the current time.
    pub fn new(strategy: impl Into<String>, symbol: impl Into<String>, side: Side, size: f64) -> Self {
        Self {
            strategy: strategy.into(),
            symbol: symbol.into(),
            side,
            size,
            ts_ms: now_ms(),
        }
    }
}

/// A settled fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Originating order.
    pub order: Order,
    /// Execution price (the tick's snapshot price).
    pub price: f64,
    /// Filled quantity. Equal to the order size except for clamped SELLs.
    pub filled: f64,
    /// Realized P&L of this fill (zero for BUY).
    pub realized_pnl: f64,
    /// Cash balance after the fill.
    pub cash_after: f64,
    /// Position in the symbol after the fill.
    pub position_after: f64,
}

impl Trade {
    /// Notional value of the fill.
    #[inline]
    pub fn notional(&self) -> f64 {
        self.price * self.filled
    }
}

/// Symbol → latest known price, authoritative for one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceSnapshot(BTreeMap<String, f64>);

impl PriceSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Price for a symbol, if priced this tick.
    #[inline]
    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.0.get(symbol).copied()
    }

    /// Set a symbol's price.
    pub fn insert(&mut self, symbol: impl Into<String>, price: f64) {
        self.0.insert(symbol.into(), price);
    }

    /// True when no feed has produced a price yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of priced symbols.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate `(symbol, price)` in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(s, p)| (s.as_str(), *p))
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for PriceSnapshot {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(s, p)| (s.into(), p)).collect())
    }
}

/// One row of the equity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquitySnapshot {
    pub ts_ms: TimestampMs,
    pub strategy: String,
    pub equity: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
}

/// Operator-controlled run state of a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StrategyStatus {
    #[default]
    Running,
    Stopped,
}

impl fmt::Display for StrategyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyStatus::Running => f.write_str("RUNNING"),
            StrategyStatus::Stopped => f.write_str("STOPPED"),
        }
    }
}
