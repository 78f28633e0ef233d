//! Order settlement against a tick's price snapshot.
//!
//! Each check short-circuits before any write, so a rejected order leaves
//! the ledger exactly as it was.

use lab_core::{Order, PriceSnapshot, RejectReason, Side, Trade};
use tracing::{info, warn};

use crate::ledger::LedgerBook;

/// Settle one order at the snapshot price.
pub fn settle(
    book: &mut LedgerBook,
    order: &Order,
    prices: &PriceSnapshot,
) -> Result<Trade, RejectReason> {
    let price = match prices.get(&order.symbol) {
        Some(p) if p.is_finite() && p > 0.0 => p,
        _ => {
            return Err(RejectReason::PriceUnavailable {
                symbol: order.symbol.clone(),
            })
        }
    };

    if !(order.size.is_finite() && order.size > 0.0) {
        return Err(RejectReason::InvalidOrder(format!(
            "size must be positive, got {}",
            order.size
        )));
    }

    // Checks read without creating a ledger; an unknown strategy looks fresh
    let (cash, held) = match book.peek(&order.strategy) {
        Some(ledger) => (ledger.cash(), ledger.position(&order.symbol)),
        None => (book.starting_cash(), 0.0),
    };

    match order.side {
        Side::Buy => {
            let required = price * order.size;
            if cash < required {
                return Err(RejectReason::InsufficientFunds {
                    required,
                    available: cash,
                });
            }

            let ledger = book.entry(&order.strategy);
            let position_after = ledger.apply_buy(&order.symbol, price, order.size);
            Ok(Trade {
                order: order.clone(),
                price,
                filled: order.size,
                realized_pnl: 0.0,
                cash_after: ledger.cash(),
                position_after,
            })
        }
        Side::Sell => {
            if held <= 0.0 {
                return Err(RejectReason::NoPosition {
                    symbol: order.symbol.clone(),
                });
            }

            // No shorting: fill at most what is held
            let filled = order.size.min(held);
            let ledger = book.entry(&order.strategy);
            let (realized_pnl, position_after) = ledger.apply_sell(&order.symbol, price, filled);
            Ok(Trade {
                order: order.clone(),
                price,
                filled,
                realized_pnl,
                cash_after: ledger.cash(),
                position_after,
            })
        }
    }
}

/// Outcome of draining the queue for one tick.
#[derive(Debug, Clone, Default)]
pub struct SettlementReport {
    /// Fills, in settlement order.
    pub trades: Vec<Trade>,
    /// Orders that produced no fill.
    pub rejected: Vec<(Order, RejectReason)>,
}

impl SettlementReport {
    /// Orders processed this tick.
    pub fn processed(&self) -> usize {
        self.trades.len() + self.rejected.len()
    }
}

/// Settle a batch sequentially against the same snapshot.
pub fn settle_all(
    book: &mut LedgerBook,
    orders: Vec<Order>,
    prices: &PriceSnapshot,
) -> SettlementReport {
    let mut report = SettlementReport::default();

    for order in orders {
        match settle(book, &order, prices) {
            Ok(trade) => {
                info!(
                    strategy = %order.strategy,
                    side = %order.side,
                    symbol = %order.symbol,
                    size = trade.filled,
                    price = trade.price,
                    realized = trade.realized_pnl,
                    cash = trade.cash_after,
                    "Order filled"
                );
                report.trades.push(trade);
            }
            Err(reason) => {
                warn!(
                    strategy = %order.strategy,
                    side = %order.side,
                    symbol = %order.symbol,
                    size = order.size,
                    kind = reason.kind(),
                    reason = %reason,
                    "Order rejected"
                );
                report.rejected.push((order, reason));
            }
        }
    }

    report
}
