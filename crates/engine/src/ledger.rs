//! Per-strategy account ledgers.
//!
//! A ledger is read-only outside this crate. Only settlement and
//! mark-to-market write to it.

use serde::Serialize;
use std::collections::BTreeMap;

/// Financial state of one strategy.
///
/// Invariants after every settlement:
/// - every stored position is > 0
/// - `avg_price` has an entry exactly for the symbols held
/// - cash never goes negative through a BUY
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ledger {
    cash: f64,
    positions: BTreeMap<String, f64>,
    avg_price: BTreeMap<String, f64>,
    realized_pnl: f64,
    unrealized_pnl: f64,
    equity: f64,
}

impl Ledger {
    /// Fresh ledger seeded with starting cash.
    pub fn new(starting_cash: f64) -> Self {
        Self {
            cash: starting_cash,
            positions: BTreeMap::new(),
            avg_price: BTreeMap::new(),
            realized_pnl: 0.0,
            unrealized_pnl: 0.0,
            equity: starting_cash,
        }
    }

    /// Cash balance.
    #[inline]
    pub fn cash(&self) -> f64 {
        self.cash
    }

    /// Held quantity, 0 if none.
    #[inline]
    pub fn position(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).copied().unwrap_or(0.0)
    }

    /// All open positions.
    pub fn positions(&self) -> &BTreeMap<String, f64> {
        &self.positions
    }

    /// Weighted average entry price of an open position.
    #[inline]
    pub fn avg_price(&self, symbol: &str) -> Option<f64> {
        self.avg_price.get(symbol).copied()
    }

    /// Average entry prices of all open positions.
    pub fn avg_prices(&self) -> &BTreeMap<String, f64> {
        &self.avg_price
    }

    /// Accumulated realized P&L.
    #[inline]
    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    /// Unrealized P&L as of the last mark.
    #[inline]
    pub fn unrealized_pnl(&self) -> f64 {
        self.unrealized_pnl
    }

    /// Equity as of the last mark.
    #[inline]
    pub fn equity(&self) -> f64 {
        self.equity
    }

    /// Apply a BUY fill. Caller has checked cash.
    pub(crate) fn apply_buy(&mut self, symbol: &str, price: f64, size: f64) -> f64 {
        let old_qty = self.position(symbol);
        let old_avg = self.avg_price(symbol).unwrap_or(0.0);

        let new_qty = old_qty + size;
        let new_avg = (old_avg * old_qty + price * size) / new_qty;

        self.cash -= price * size;
        self.positions.insert(symbol.to_string(), new_qty);
        self.avg_price.insert(symbol.to_string(), new_avg);
        new_qty
    }

    /// Apply a SELL fill of `filled` (already clamped to the position).
    ///
    /// Returns `(realized, new_qty)`.
    pub(crate) fn apply_sell(&mut self, symbol: &str, price: f64, filled: f64) -> (f64, f64) {
        let old_qty = self.position(symbol);
        let avg = self.avg_price(symbol).unwrap_or(price);
        let realized = (price - avg) * filled;

        let new_qty = old_qty - filled;
        self.cash += price * filled;
        self.realized_pnl += realized;

        if new_qty == 0.0 {
            self.positions.remove(symbol);
            self.avg_price.remove(symbol);
        } else {
            self.positions.insert(symbol.to_string(), new_qty);
        }
        (realized, new_qty)
    }

    /// Store mark-to-market results.
    pub(crate) fn set_marks(&mut self, unrealized_pnl: f64, equity: f64) {
        self.unrealized_pnl = unrealized_pnl;
        self.equity = equity;
    }
}

/// All ledgers of a run, keyed by strategy name.
#[derive(Debug, Clone)]
pub struct LedgerBook {
    starting_cash: f64,
    ledgers: BTreeMap<String, Ledger>,
}

impl LedgerBook {
    /// Create an empty book.
    pub fn new(starting_cash: f64) -> Self {
        Self {
            starting_cash,
            ledgers: BTreeMap::new(),
        }
    }

    /// Cash each new ledger starts with.
    pub fn starting_cash(&self) -> f64 {
        self.starting_cash
    }

    /// Ledger for a strategy, created with starting cash if absent.
    pub fn get(&mut self, strategy: &str) -> &Ledger {
        self.entry(strategy)
    }

    /// Ledger for a strategy without creating it.
    pub fn peek(&self, strategy: &str) -> Option<&Ledger> {
        self.ledgers.get(strategy)
    }

    /// Known strategy names, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ledgers.keys().map(String::as_str)
    }

    /// Iterate `(strategy, ledger)` in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Ledger)> {
        self.ledgers.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of ledgers.
    pub fn len(&self) -> usize {
        self.ledgers.len()
    }

    /// True when no strategy has been referenced yet.
    pub fn is_empty(&self) -> bool {
        self.ledgers.is_empty()
    }

    pub(crate) fn entry(&mut self, strategy: &str) -> &mut Ledger {
        let starting_cash = self.starting_cash;
        self.ledgers
            .entry(strategy.to_string())
            .or_insert_with(|| {
                tracing::info!(strategy = %strategy, cash = starting_cash, "Opened ledger");
                Ledger::new(starting_cash)
            })
    }

    pub(crate) fn ledgers_mut(&mut self) -> impl Iterator<Item = &mut Ledger> {
        self.ledgers.values_mut()
    }
}
