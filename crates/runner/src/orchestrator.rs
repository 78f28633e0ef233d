//! The tick loop.
//!
//! Each cycle runs, strictly in order:
//! `AwaitPrices -> SettleOrders -> MarkToMarket -> RunStrategies ->
//! (every Nth tick) PersistSnapshot -> Sleep`.
//!
//! Orders submitted during tick N settle at tick N+1's prices. An empty
//! snapshot skips straight to the sleep. Stop requests and operator commands
//! take effect at the top of the next cycle, never mid-cycle.

use lab_core::config::LabConfig;
use lab_core::{now_ms, PriceSnapshot, Result, StrategyStatus, TimestampMs};
use lab_engine::PaperBroker;
use lab_feeds::PriceFeed;
use lab_strategy::{BotView, Strategy, StrategyContext, TickPayload};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, info, warn};

use crate::commands::OperatorCommand;
use crate::roster::Roster;
use crate::storage::PersistenceSink;

/// Phase of the tick cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPhase {
    AwaitPrices,
    SettleOrders,
    MarkToMarket,
    RunStrategies,
    PersistSnapshot,
    Sleep,
}

/// Loop settings.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub starting_cash: f64,
    pub tick_interval: Duration,
    /// Persist equity every N ticks. 0 disables.
    pub equity_log_interval: u64,
    /// Recent trades kept in memory.
    pub trade_history: usize,
}

impl From<&LabConfig> for OrchestratorConfig {
    fn from(lab: &LabConfig) -> Self {
        Self {
            starting_cash: lab.starting_cash,
            tick_interval: Duration::from_millis(lab.tick_interval_ms),
            equity_log_interval: lab.equity_log_interval,
            trade_history: lab.trade_history,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&LabConfig::default())
    }
}

/// What one cycle did.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub tick: u64,
    pub ts_ms: TimestampMs,
    /// Phases visited, in order. `Sleep` is entered by the run loop.
    pub phases: Vec<TickPhase>,
    pub fills: usize,
    pub rejected: usize,
    pub strategies_run: usize,
    pub callback_errors: usize,
    pub sink_errors: usize,
    /// Processing time before the sleep.
    pub elapsed: Duration,
}

impl TickReport {
    /// True when the snapshot was empty and the cycle went straight to sleep.
    pub fn skipped(&self) -> bool {
        self.phases == [TickPhase::AwaitPrices]
    }

    /// True when equity rows were written.
    pub fn persisted(&self) -> bool {
        self.phases.contains(&TickPhase::PersistSnapshot)
    }
}

/// Totals reported when the loop exits.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub trades: u64,
    pub rejected: u64,
    pub final_equity: BTreeMap<String, f64>,
}

#[derive(Debug, Default)]
struct StopInner {
    flag: AtomicBool,
    notify: Notify,
}

/// Cloneable stop signal. Polled at the top of each cycle; wakes the sleep.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    inner: Arc<StopInner>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a graceful stop.
    pub fn stop(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Resolves once `stop` has been called.
    pub async fn stopped(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_stopped() {
                return;
            }
            notified.await;
        }
    }
}

/// Drives feeds, settlement, accounting, strategies and persistence.
pub struct TickOrchestrator<F, S> {
    feed: F,
    sink: S,
    broker: PaperBroker,
    roster: Roster,
    config: OrchestratorConfig,
    tick: u64,
    phase: TickPhase,
    stop: StopHandle,
    commands: Option<mpsc::Receiver<OperatorCommand>>,
}

impl<F: PriceFeed, S: PersistenceSink> TickOrchestrator<F, S> {
    pub fn new(config: OrchestratorConfig, feed: F, sink: S) -> Self {
        Self {
            feed,
            sink,
            broker: PaperBroker::new(config.starting_cash, config.trade_history),
            roster: Roster::new(),
            config,
            tick: 0,
            phase: TickPhase::AwaitPrices,
            stop: StopHandle::new(),
            commands: None,
        }
    }

    /// Receive operator commands from `rx`.
    pub fn with_commands(mut self, rx: mpsc::Receiver<OperatorCommand>) -> Self {
        self.commands = Some(rx);
        self
    }

    /// Handle for requesting a stop from elsewhere.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Register a strategy: open its ledger and call `init`.
    ///
    /// An `init` failure is recorded on the strategy, which stays registered.
    pub fn register(&mut self, strategy: Box<dyn Strategy>) -> Result<()> {
        let slot = self.roster.register(strategy)?;
        let queue = Arc::clone(self.broker.queue());
        let ledger = self.broker.open_account(&slot.name);

        let prices = PriceSnapshot::new();
        let ctx = StrategyContext::new(&slot.name, now_ms(), &prices, ledger, &queue);
        let outcome = catch_unwind(AssertUnwindSafe(|| slot.strategy.init(&ctx)));
        match flatten(outcome) {
            Ok(()) => info!(strategy = %slot.name, symbols = ?slot.strategy.symbols(), "Strategy registered"),
            Err(message) => {
                error!(strategy = %slot.name, error = %message, "Strategy init failed");
                slot.record_error(message);
            }
        }
        Ok(())
    }

    pub fn broker(&self) -> &PaperBroker {
        &self.broker
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Ticks started so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Phase the loop is in.
    pub fn phase(&self) -> TickPhase {
        self.phase
    }

    /// Pause or resume a strategy. Returns false for unknown names.
    pub fn set_status(&mut self, name: &str, status: StrategyStatus) -> bool {
        let known = self.roster.set_status(name, status);
        if known {
            info!(strategy = %name, status = %status, "Strategy status changed");
        } else {
            warn!(strategy = %name, "Unknown strategy");
        }
        known
    }

    /// Apply every pending operator command.
    pub fn apply_commands(&mut self) {
        let mut pending = Vec::new();
        if let Some(rx) = self.commands.as_mut() {
            while let Ok(cmd) = rx.try_recv() {
                pending.push(cmd);
            }
        }
        for cmd in pending {
            match cmd {
                OperatorCommand::Pause(name) => {
                    self.set_status(&name, StrategyStatus::Stopped);
                }
                OperatorCommand::Resume(name) => {
                    self.set_status(&name, StrategyStatus::Running);
                }
                OperatorCommand::Quit => {
                    info!("Quit requested");
                    self.stop.stop();
                }
            }
        }
    }

    /// Run one cycle up to, not including, the sleep.
    pub async fn step(&mut self) -> TickReport {
        let started = Instant::now();
        self.tick += 1;
        let mut report = TickReport {
            tick: self.tick,
            ts_ms: now_ms(),
            ..TickReport::default()
        };

        self.enter(TickPhase::AwaitPrices, &mut report);
        let prices = self.feed.snapshot().await;
        if prices.is_empty() {
            debug!(tick = self.tick, "No prices yet");
            report.elapsed = started.elapsed();
            return report;
        }

        self.enter(TickPhase::SettleOrders, &mut report);
        let settlement = self.broker.process_orders(&prices);
        report.fills = settlement.trades.len();
        report.rejected = settlement.rejected.len();
        for trade in &settlement.trades {
            let Some(ledger) = self.broker.book().peek(&trade.order.strategy) else {
                continue;
            };
            if let Err(e) = self.sink.record_trade(trade, ledger).await {
                error!(strategy = %trade.order.strategy, error = %e, "Failed to record trade");
                report.sink_errors += 1;
            }
        }

        self.enter(TickPhase::MarkToMarket, &mut report);
        self.broker.mark_all(&prices);

        self.enter(TickPhase::RunStrategies, &mut report);
        self.run_strategies(report.ts_ms, &prices, &mut report);

        let interval = self.config.equity_log_interval;
        if interval > 0 && self.tick % interval == 0 {
            self.enter(TickPhase::PersistSnapshot, &mut report);
            for (name, ledger) in self.broker.book().iter() {
                if let Err(e) = self.sink.record_equity(report.ts_ms, name, ledger).await {
                    error!(strategy = %name, error = %e, "Failed to record equity");
                    report.sink_errors += 1;
                }
            }
        }

        report.elapsed = started.elapsed();
        debug!(
            tick = report.tick,
            symbols = prices.len(),
            fills = report.fills,
            rejected = report.rejected,
            strategies = report.strategies_run,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Tick complete"
        );
        report
    }

    fn enter(&mut self, phase: TickPhase, report: &mut TickReport) {
        self.phase = phase;
        report.phases.push(phase);
    }

    /// Invoke every running strategy. Failures stay with the strategy.
    fn run_strategies(&mut self, ts_ms: TimestampMs, prices: &PriceSnapshot, report: &mut TickReport) {
        let queue = self.broker.queue();
        let book = self.broker.book();

        for slot in self.roster.iter_mut() {
            if !slot.is_running() {
                continue;
            }
            let Some(ledger) = book.peek(&slot.name) else {
                continue;
            };

            let ctx = StrategyContext::new(&slot.name, ts_ms, prices, ledger, queue);
            let payload = TickPayload {
                ts_ms,
                prices,
                bot: BotView::from_ledger(ledger),
            };

            report.strategies_run += 1;
            let outcome = catch_unwind(AssertUnwindSafe(|| slot.strategy.on_tick(&ctx, &payload)));
            match flatten(outcome) {
                Ok(()) => {
                    slot.ticks_run += 1;
                    slot.last_tick_ms = Some(ts_ms);
                }
                Err(message) => {
                    error!(strategy = %slot.name, error = %message, "Strategy callback failed");
                    slot.record_error(message);
                    report.callback_errors += 1;
                }
            }
        }
    }

    /// Sleep out the rest of the tick interval, waking early on stop.
    pub async fn sleep_remaining(&mut self, elapsed: Duration) {
        self.phase = TickPhase::Sleep;
        let remaining = self.config.tick_interval.saturating_sub(elapsed);
        tokio::select! {
            _ = tokio::time::sleep(remaining) => {}
            _ = self.stop.stopped() => {}
        }
    }

    /// Loop until stopped.
    pub async fn run(&mut self) -> RunSummary {
        self.run_with(|_, _| {}).await
    }

    /// Loop until stopped, calling `observer` after each cycle.
    pub async fn run_with<O>(&mut self, mut observer: O) -> RunSummary
    where
        O: FnMut(&Self, &TickReport),
    {
        info!(
            loaded = self.roster.loaded(),
            active = self.roster.active(),
            tick_interval_ms = self.config.tick_interval.as_millis() as u64,
            "Tick loop started"
        );

        loop {
            self.phase = TickPhase::AwaitPrices;
            self.apply_commands();
            if self.stop.is_stopped() {
                break;
            }

            let report = self.step().await;
            observer(self, &report);
            self.sleep_remaining(report.elapsed).await;
        }

        let summary = self.summary();
        info!(
            ticks = summary.ticks,
            trades = summary.trades,
            rejected = summary.rejected,
            "Tick loop stopped"
        );
        summary
    }

    /// Totals so far.
    pub fn summary(&self) -> RunSummary {
        let stats = self.broker.stats();
        RunSummary {
            ticks: self.tick,
            trades: stats.filled,
            rejected: stats.total_rejected(),
            final_equity: self
                .broker
                .book()
                .iter()
                .map(|(name, ledger)| (name.to_string(), ledger.equity()))
                .collect(),
        }
    }

    /// Close the persistence sink.
    pub async fn close(&self) -> Result<()> {
        self.sink.close().await
    }
}

/// Collapse a caught panic or an `Err` into a message.
fn flatten(outcome: std::thread::Result<anyhow::Result<()>>) -> std::result::Result<(), String> {
    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(format!("{:#}", e)),
        Err(panic) => Err(panic_message(panic.as_ref())),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic".to_string()
    }
}
