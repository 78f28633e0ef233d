//! Trade and equity persistence.
//!
//! Sink failures are reported to the caller, which logs them and carries on.

use async_trait::async_trait;
use lab_core::{ts_to_secs, EquitySnapshot, Error, Result, Side, TimestampMs, Trade};
use lab_engine::Ledger;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::info;

/// Destination for settled trades and periodic equity rows.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Record one fill together with the ledger after settlement.
    ///
    /// `ledger` is the full account state after the fill. The built-in sinks
    /// only store the trade row, whose `cash_after` and `position_after`
    /// already match it; sinks that snapshot whole accounts read it instead.
    async fn record_trade(&self, trade: &Trade, ledger: &Ledger) -> Result<()>;

    /// Record one equity row for a strategy.
    async fn record_equity(&self, ts_ms: TimestampMs, strategy: &str, ledger: &Ledger) -> Result<()>;

    /// Flush and release resources. Later writes fail.
    async fn close(&self) -> Result<()>;
}

/// A persisted trade row.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRow {
    /// Order submission time (unix seconds).
    pub time: f64,
    pub strategy: String,
    pub symbol: String,
    pub side: Side,
    /// Filled quantity.
    pub size: f64,
    pub price: f64,
    pub cash_after: f64,
    pub position_after: f64,
}

impl From<&Trade> for TradeRow {
    fn from(trade: &Trade) -> Self {
        Self {
            time: ts_to_secs(trade.order.ts_ms),
            strategy: trade.order.strategy.clone(),
            symbol: trade.order.symbol.clone(),
            side: trade.order.side,
            size: trade.filled,
            price: trade.price,
            cash_after: trade.cash_after,
            position_after: trade.position_after,
        }
    }
}

fn sink_err(e: rusqlite::Error) -> Error {
    Error::sink(e.to_string())
}

/// SQLite-backed sink.
pub struct SqliteSink {
    conn: Mutex<Option<rusqlite::Connection>>,
}

impl SqliteSink {
    /// Open (or create) the database and its tables.
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let conn = rusqlite::Connection::open(db_path).map_err(sink_err)?;
        conn.pragma_update(None, "journal_mode", "WAL").map_err(sink_err)?;
        conn.pragma_update(None, "synchronous", "NORMAL").map_err(sink_err)?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                time REAL NOT NULL,
                strategy TEXT NOT NULL,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                size REAL NOT NULL,
                price REAL NOT NULL,
                cash_after REAL NOT NULL,
                position_after REAL NOT NULL
            );

            CREATE TABLE IF NOT EXISTS equity (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                time REAL NOT NULL,
                strategy TEXT NOT NULL,
                equity REAL NOT NULL,
                realized_pnl REAL NOT NULL,
                unrealized_pnl REAL NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_trades_strategy ON trades(strategy);
            CREATE INDEX IF NOT EXISTS idx_equity_strategy ON equity(strategy);
            "#,
        )
        .map_err(sink_err)?;

        info!(path = %db_path.display(), "Database initialized");

        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// All trade rows in insertion order.
    pub async fn load_trades(&self) -> Result<Vec<TradeRow>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(|| Error::sink("database closed"))?;

        let mut stmt = conn
            .prepare(
                "SELECT time, strategy, symbol, side, size, price, cash_after, position_after
                 FROM trades ORDER BY id",
            )
            .map_err(sink_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, f64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, f64>(5)?,
                    row.get::<_, f64>(6)?,
                    row.get::<_, f64>(7)?,
                ))
            })
            .map_err(sink_err)?;

        let mut trades = Vec::new();
        for row in rows {
            let (time, strategy, symbol, side, size, price, cash_after, position_after) =
                row.map_err(sink_err)?;
            let side = side
                .parse::<Side>()
                .map_err(|e| Error::sink(format!("bad side in trades table: {}", e)))?;
            trades.push(TradeRow {
                time,
                strategy,
                symbol,
                side,
                size,
                price,
                cash_after,
                position_after,
            });
        }
        Ok(trades)
    }

    /// All equity rows in insertion order.
    pub async fn load_equity(&self) -> Result<Vec<EquitySnapshot>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(|| Error::sink("database closed"))?;

        let mut stmt = conn
            .prepare(
                "SELECT time, strategy, equity, realized_pnl, unrealized_pnl
                 FROM equity ORDER BY id",
            )
            .map_err(sink_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(EquitySnapshot {
                    ts_ms: (row.get::<_, f64>(0)? * 1000.0).round() as TimestampMs,
                    strategy: row.get(1)?,
                    equity: row.get(2)?,
                    realized_pnl: row.get(3)?,
                    unrealized_pnl: row.get(4)?,
                })
            })
            .map_err(sink_err)?;

        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(sink_err)
    }
}

#[async_trait]
impl PersistenceSink for SqliteSink {
    async fn record_trade(&self, trade: &Trade, _ledger: &Ledger) -> Result<()> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(|| Error::sink("database closed"))?;
        let row = TradeRow::from(trade);

        conn.execute(
            r#"
            INSERT INTO trades (time, strategy, symbol, side, size, price, cash_after, position_after)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            rusqlite::params![
                row.time,
                row.strategy,
                row.symbol,
                row.side.as_str(),
                row.size,
                row.price,
                row.cash_after,
                row.position_after,
            ],
        )
        .map_err(sink_err)?;

        Ok(())
    }

    async fn record_equity(&self, ts_ms: TimestampMs, strategy: &str, ledger: &Ledger) -> Result<()> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(|| Error::sink("database closed"))?;

        conn.execute(
            r#"
            INSERT INTO equity (time, strategy, equity, realized_pnl, unrealized_pnl)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            rusqlite::params![
                ts_to_secs(ts_ms),
                strategy,
                ledger.equity(),
                ledger.realized_pnl(),
                ledger.unrealized_pnl(),
            ],
        )
        .map_err(sink_err)?;

        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if let Some(conn) = self.conn.lock().await.take() {
            conn.close().map_err(|(_, e)| sink_err(e))?;
            info!("Database closed");
        }
        Ok(())
    }
}

/// In-memory sink. Used with `--no-db` and in tests.
#[derive(Default)]
pub struct MemorySink {
    trades: parking_lot::Mutex<Vec<TradeRow>>,
    equity: parking_lot::Mutex<Vec<EquitySnapshot>>,
    fail: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose writes always fail.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn trades(&self) -> Vec<TradeRow> {
        self.trades.lock().clone()
    }

    pub fn equity(&self) -> Vec<EquitySnapshot> {
        self.equity.lock().clone()
    }
}

#[async_trait]
impl PersistenceSink for MemorySink {
    async fn record_trade(&self, trade: &Trade, _ledger: &Ledger) -> Result<()> {
        if self.fail {
            return Err(Error::sink("write refused"));
        }
        self.trades.lock().push(TradeRow::from(trade));
        Ok(())
    }

    async fn record_equity(&self, ts_ms: TimestampMs, strategy: &str, ledger: &Ledger) -> Result<()> {
        if self.fail {
            return Err(Error::sink("write refused"));
        }
        self.equity.lock().push(EquitySnapshot {
            ts_ms,
            strategy: strategy.to_string(),
            equity: ledger.equity(),
            realized_pnl: ledger.realized_pnl(),
            unrealized_pnl: ledger.unrealized_pnl(),
        });
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lab_core::{Order, PriceSnapshot};
    use lab_engine::PaperBroker;

    fn settled_broker() -> (PaperBroker, Vec<Trade>) {
        let mut broker = PaperBroker::new(10_000.0, 0);
        let mut order = Order::new("bot", "BTCUSDT", Side::Buy, 0.001);
        order.ts_ms = 1_700_000_000_500;
        broker.queue().enqueue(order);
        let mut sell = Order::new("bot", "BTCUSDT", Side::Sell, 5.0);
        sell.ts_ms = 1_700_000_001_000;
        broker.queue().enqueue(sell);

        let prices: PriceSnapshot = [("BTCUSDT", 50_000.0)].into_iter().collect();
        let report = broker.process_orders(&prices);
        broker.mark_all(&prices);
        (broker, report.trades)
    }

    #[tokio::test]
    async fn test_sqlite_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let sink = SqliteSink::open(dir.path().join("lab.db")).await.unwrap();
        let (broker, trades) = settled_broker();
        let ledger = broker.book().peek("bot").unwrap();

        for trade in &trades {
            sink.record_trade(trade, ledger).await.unwrap();
        }
        sink.record_equity(1_700_000_002_000, "bot", ledger).await.unwrap();

        let rows = sink.load_trades().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].side, Side::Buy);
        assert_relative_eq!(rows[0].time, 1_700_000_000.5);
        assert_relative_eq!(rows[0].cash_after, 9_950.0);
        // Sell clamped to the held quantity
        assert_eq!(rows[1].side, Side::Sell);
        assert_relative_eq!(rows[1].size, 0.001);
        assert_relative_eq!(rows[1].position_after, 0.0);

        let equity = sink.load_equity().await.unwrap();
        assert_eq!(equity.len(), 1);
        assert_eq!(equity[0].ts_ms, 1_700_000_002_000);
        assert_eq!(equity[0].strategy, "bot");
        assert_relative_eq!(equity[0].equity, 10_000.0);
    }

    #[tokio::test]
    async fn test_sqlite_reopen_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("lab.db");
        let (broker, trades) = settled_broker();
        let ledger = broker.book().peek("bot").unwrap();

        let sink = SqliteSink::open(&path).await.unwrap();
        sink.record_trade(&trades[0], ledger).await.unwrap();
        sink.close().await.unwrap();
        assert!(sink.record_trade(&trades[0], ledger).await.is_err());

        let reopened = SqliteSink::open(&path).await.unwrap();
        assert_eq!(reopened.load_trades().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_trade_row_matches_ledger_after() {
        let sink = MemorySink::new();
        let mut broker = PaperBroker::new(1_000.0, 0);
        broker.open_account("bot");
        broker.queue().enqueue(Order::new("bot", "BTCUSDT", Side::Buy, 2.0));
        let prices: PriceSnapshot = [("BTCUSDT", 100.0)].into_iter().collect();
        let report = broker.process_orders(&prices);
        let ledger = broker.book().peek("bot").unwrap();

        sink.record_trade(&report.trades[0], ledger).await.unwrap();

        let row = &sink.trades()[0];
        assert_relative_eq!(row.cash_after, ledger.cash());
        assert_relative_eq!(row.position_after, ledger.position("BTCUSDT"));
    }

    #[tokio::test]
    async fn test_memory_sink() {
        let sink = MemorySink::new();
        let (broker, trades) = settled_broker();
        let ledger = broker.book().peek("bot").unwrap();

        sink.record_trade(&trades[0], ledger).await.unwrap();
        sink.record_equity(5, "bot", ledger).await.unwrap();
        assert_eq!(sink.trades().len(), 1);
        assert_eq!(sink.equity()[0].ts_ms, 5);

        let failing = MemorySink::failing();
        assert!(matches!(
            failing.record_trade(&trades[0], ledger).await,
            Err(Error::Sink(_))
        ));
    }
}
