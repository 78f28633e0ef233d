//! Error types for the trading lab.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Why an order was settled without a fill.
///
/// Every variant leaves the ledger untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// The tick's snapshot has no price for the symbol.
    #[error("no price available for {symbol}")]
    PriceUnavailable { symbol: String },

    /// Malformed order (non-positive size, unknown side, ...).
    #[error("invalid order: {0}")]
    InvalidOrder(String),

    /// BUY notional exceeds available cash.
    #[error("insufficient cash: {available:.2} < {required:.2}")]
    InsufficientFunds { required: f64, available: f64 },

    /// SELL against a flat position.
    #[error("no position in {symbol} to sell")]
    NoPosition { symbol: String },
}

impl RejectReason {
    /// Short label used in logs and counters.
    pub fn kind(&self) -> &'static str {
        match self {
            RejectReason::PriceUnavailable { .. } => "price_unavailable",
            RejectReason::InvalidOrder(_) => "invalid_order",
            RejectReason::InsufficientFunds { .. } => "insufficient_funds",
            RejectReason::NoPosition { .. } => "no_position",
        }
    }
}

/// Main error type for the trading lab.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error. Fatal before the loop starts.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Order rejected during settlement.
    #[error("Order rejected: {0}")]
    Rejected(#[from] RejectReason),

    /// Strategy callback failed.
    #[error("Callback error in '{strategy}': {message}")]
    Callback { strategy: String, message: String },

    /// Persistence sink failure.
    #[error("Sink error: {0}")]
    Sink(String),

    /// Market data feed failure.
    #[error("Feed error: {0}")]
    Feed(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a callback error for a strategy.
    pub fn callback(strategy: impl Into<String>, msg: impl Into<String>) -> Self {
        Error::Callback {
            strategy: strategy.into(),
            message: msg.into(),
        }
    }

    /// Create a sink error.
    pub fn sink(msg: impl Into<String>) -> Self {
        Error::Sink(msg.into())
    }

    /// Create a feed error.
    pub fn feed(msg: impl Into<String>) -> Self {
        Error::Feed(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_reason_lifts_into_error() {
        let err: Error = RejectReason::NoPosition {
            symbol: "BTCUSDT".to_string(),
        }
        .into();
        assert!(matches!(err, Error::Rejected(RejectReason::NoPosition { .. })));
        assert_eq!(err.to_string(), "Order rejected: no position in BTCUSDT to sell");
    }

    #[test]
    fn test_insufficient_funds_message() {
        let reason = RejectReason::InsufficientFunds {
            required: 120.0,
            available: 99.5,
        };
        assert_eq!(reason.to_string(), "insufficient cash: 99.50 < 120.00");
        assert_eq!(reason.kind(), "insufficient_funds");
    }
}
