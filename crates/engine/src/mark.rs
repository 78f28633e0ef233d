//! Mark-to-market accounting.
//!
//! Recomputes unrealized P&L and equity from a snapshot. Positions, cash and
//! realized P&L are never touched. Unpriced positions contribute nothing to
//! equity for that tick.

use lab_core::PriceSnapshot;

use crate::ledger::Ledger;

/// Unrealized P&L and equity of a ledger at the given prices.
pub fn valuation(ledger: &Ledger, prices: &PriceSnapshot) -> (f64, f64) {
    let mut unrealized = 0.0;
    let mut position_value = 0.0;

    for (symbol, &qty) in ledger.positions() {
        let Some(price) = prices.get(symbol) else {
            continue;
        };
        position_value += price * qty;
        if qty > 0.0 {
            let avg = ledger.avg_price(symbol).unwrap_or(price);
            unrealized += (price - avg) * qty;
        }
    }

    (unrealized, ledger.cash() + position_value)
}

/// Write fresh marks onto a ledger.
pub fn mark_to_market(ledger: &mut Ledger, prices: &PriceSnapshot) {
    let (unrealized, equity) = valuation(ledger, prices);
    ledger.set_marks(unrealized, equity);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ledger_with_positions() -> Ledger {
        let mut ledger = Ledger::new(10_000.0);
        ledger.apply_buy("BTCUSDT", 50_000.0, 0.1);
        ledger.apply_buy("ETHUSDT", 2_000.0, 1.0);
        ledger
    }

    #[test]
    fn test_equity_is_cash_plus_priced_positions() {
        let mut ledger = ledger_with_positions();
        let prices: PriceSnapshot = [("BTCUSDT", 55_000.0), ("ETHUSDT", 1_900.0)]
            .into_iter()
            .collect();

        mark_to_market(&mut ledger, &prices);

        assert_relative_eq!(ledger.cash(), 3_000.0, epsilon = 1e-9);
        assert_relative_eq!(ledger.equity(), 3_000.0 + 5_500.0 + 1_900.0, epsilon = 1e-9);
        assert_relative_eq!(ledger.unrealized_pnl(), 500.0 - 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_unpriced_position_contributes_zero() {
        let mut ledger = ledger_with_positions();
        let prices: PriceSnapshot = [("BTCUSDT", 50_000.0)].into_iter().collect();

        mark_to_market(&mut ledger, &prices);

        assert_relative_eq!(ledger.equity(), 3_000.0 + 5_000.0, epsilon = 1e-9);
        assert_relative_eq!(ledger.unrealized_pnl(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_mark_does_not_touch_positions_or_cash() {
        let mut ledger = ledger_with_positions();
        let before = ledger.clone();
        let prices: PriceSnapshot = [("BTCUSDT", 1.0)].into_iter().collect();

        mark_to_market(&mut ledger, &prices);

        assert_eq!(ledger.cash(), before.cash());
        assert_eq!(ledger.positions(), before.positions());
        assert_eq!(ledger.avg_prices(), before.avg_prices());
        assert_eq!(ledger.realized_pnl(), before.realized_pnl());
    }

    #[test]
    fn test_flat_ledger_equity_equals_cash() {
        let mut ledger = Ledger::new(750.0);
        mark_to_market(&mut ledger, &PriceSnapshot::new());
        assert_eq!(ledger.equity(), 750.0);
        assert_eq!(ledger.unrealized_pnl(), 0.0);
    }
}
