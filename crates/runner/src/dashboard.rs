//! Text dashboard. Read-only view of ledgers and the roster.

use chrono::{TimeZone, Utc};
use lab_core::{ts_to_secs, TimestampMs};
use lab_engine::PaperBroker;
use ordered_float::OrderedFloat;
use std::fmt::Write;

use crate::roster::Roster;

const WIDTH: usize = 100;
/// Error messages are cut to this many characters.
const ERROR_CHARS: usize = 70;

/// Renders the dashboard to a string.
#[derive(Debug, Clone)]
pub struct Dashboard {
    /// Recent trades shown at the bottom.
    pub recent_trades: usize,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self { recent_trades: 5 }
    }
}

impl Dashboard {
    pub fn render(&self, tick: u64, ts_ms: TimestampMs, broker: &PaperBroker, roster: &Roster) -> String {
        let mut out = String::new();
        let rule = "=".repeat(WIDTH);
        let time = Utc
            .timestamp_millis_opt(ts_ms)
            .single()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();

        let _ = writeln!(out, "{rule}");
        let _ = writeln!(
            out,
            "TRADING LAB - {time} | tick {tick} | strategies {}/{} active",
            roster.active(),
            roster.loaded()
        );
        let _ = writeln!(out, "{rule}");

        if roster.loaded() == 0 {
            let _ = writeln!(out, "No strategies registered.");
            return out;
        }

        let _ = writeln!(
            out,
            "{:<20} {:<10} {:>13} {:>13} {:>13} {:>13}",
            "STRATEGY", "STATUS", "CASH", "EQUITY", "REAL_PNL", "UNREAL_PNL"
        );
        let _ = writeln!(out, "{}", "-".repeat(WIDTH));

        for slot in roster.iter() {
            let Some(ledger) = broker.book().peek(slot.name()) else {
                continue;
            };
            let _ = writeln!(
                out,
                "{:<20} {:<10} {:>13.2} {:>13.2} {:>13} {:>13}",
                slot.name(),
                slot.status().to_string(),
                ledger.cash(),
                ledger.equity(),
                signed(ledger.realized_pnl()),
                signed(ledger.unrealized_pnl()),
            );

            if !ledger.positions().is_empty() {
                let positions: Vec<String> = ledger
                    .positions()
                    .iter()
                    .map(|(sym, qty)| format!("{sym}: {qty:.6}"))
                    .collect();
                let _ = writeln!(out, "  Positions: {}", positions.join(", "));
            }
            if let Some(err) = slot.last_error() {
                let short: String = err.chars().take(ERROR_CHARS).collect();
                let _ = writeln!(out, "  ERROR: {short}");
            }
        }

        let mut board: Vec<(&str, f64)> = broker.book().iter().map(|(n, l)| (n, l.equity())).collect();
        board.sort_by_key(|(name, equity)| (std::cmp::Reverse(OrderedFloat(*equity)), *name));
        let _ = writeln!(out);
        let _ = writeln!(out, "Leaderboard:");
        for (rank, (name, equity)) in board.iter().enumerate() {
            let _ = writeln!(out, "  {}. {:<20} {:>13.2}", rank + 1, name, equity);
        }

        let trades: Vec<_> = broker.recent_trades().collect();
        if !trades.is_empty() && self.recent_trades > 0 {
            let _ = writeln!(out);
            let _ = writeln!(out, "Recent trades:");
            for trade in trades.iter().rev().take(self.recent_trades) {
                let _ = writeln!(
                    out,
                    "  {:.3} {:<20} {:<4} {:.6} {} @ {:.2}",
                    ts_to_secs(trade.order.ts_ms),
                    trade.order.strategy,
                    trade.order.side.as_str(),
                    trade.filled,
                    trade.order.symbol,
                    trade.price
                );
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Commands: p <strategy> (pause) | r <strategy> (resume) | q (quit)");
        out
    }
}

/// Signed money format: `+12.50`, `-3.00`, `0.00`.
fn signed(value: f64) -> String {
    if value > 0.0 {
        format!("+{value:.2}")
    } else {
        format!("{value:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lab_core::{Order, PriceSnapshot, Side, StrategyStatus};
    use lab_strategy::TrendFollower;

    fn setup() -> (PaperBroker, Roster) {
        let mut broker = PaperBroker::new(1_000.0, 10);
        let mut roster = Roster::new();
        for name in ["alpha", "beta"] {
            roster
                .register(Box::new(TrendFollower::new(name, "BTCUSDT", 1.0, 5, 100.0)))
                .unwrap();
            broker.open_account(name);
        }
        broker.queue().enqueue(Order::new("beta", "BTCUSDT", Side::Buy, 2.0));
        let prices: PriceSnapshot = [("BTCUSDT", 100.0)].into_iter().collect();
        broker.process_orders(&prices);
        let prices: PriceSnapshot = [("BTCUSDT", 110.0)].into_iter().collect();
        broker.mark_all(&prices);
        (broker, roster)
    }

    #[test]
    fn test_render_table() {
        let (broker, mut roster) = setup();
        roster.set_status("alpha", StrategyStatus::Stopped);

        let out = Dashboard::default().render(7, 0, &broker, &roster);

        assert!(out.contains("tick 7"));
        assert!(out.contains("strategies 1/2 active"));
        assert!(out.contains("STOPPED"));
        assert!(out.contains("Positions: BTCUSDT: 2.000000"));
        assert!(out.contains("+20.00"));
        assert!(out.contains("Recent trades:"));
    }

    #[test]
    fn test_leaderboard_orders_by_equity() {
        let (broker, roster) = setup();
        let out = Dashboard::default().render(1, 0, &broker, &roster);

        let board = out.split("Leaderboard:").nth(1).unwrap();
        let beta = board.find("beta").unwrap();
        let alpha = board.find("alpha").unwrap();
        assert!(beta < alpha);
    }

    #[test]
    fn test_empty_roster() {
        let out = Dashboard::default().render(0, 0, &PaperBroker::new(1.0, 0), &Roster::new());
        assert!(out.contains("No strategies registered."));
    }

    #[test]
    fn test_signed() {
        assert_eq!(signed(1.5), "+1.50");
        assert_eq!(signed(-2.0), "-2.00");
        assert_eq!(signed(0.0), "0.00");
    }
}
