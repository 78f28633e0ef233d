//! Trading lab binary.
//!
//! Runs the registered strategies against live (or synthetic) prices with a
//! paper broker, logging trades and equity to SQLite.

use anyhow::Context;
use clap::Parser;
use lab_core::Config;
use lab_feeds::{BinanceConnector, FeedHandle, PriceBoard, StaticFeed, SyntheticFeed};
use lab_runner::{
    spawn_stdin_reader, Dashboard, MemorySink, OrchestratorConfig, PersistenceSink, SqliteSink,
    StopHandle, TickOrchestrator,
};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "trading-lab", about = "Paper-trade strategies against live market prices")]
struct Cli {
    /// JSON config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database path.
    #[arg(long)]
    db: Option<String>,

    /// Keep trades and equity in memory only.
    #[arg(long)]
    no_db: bool,

    /// Tick interval in milliseconds.
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Starting cash per strategy.
    #[arg(long)]
    starting_cash: Option<f64>,

    /// Use the synthetic random-walk feed instead of Binance.
    #[arg(long)]
    offline: bool,

    /// Disable the text dashboard.
    #[arg(long)]
    no_dashboard: bool,

    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(db) = &self.db {
            config.lab.db_path = db.clone();
        }
        if let Some(tick_ms) = self.tick_ms {
            config.lab.tick_interval_ms = tick_ms;
        }
        if let Some(cash) = self.starting_cash {
            config.lab.starting_cash = cash;
        }
        if self.offline {
            config.feeds.binance.enabled = false;
            config.feeds.synthetic.enabled = true;
        }
        if self.no_dashboard {
            config.dashboard.enabled = false;
        }
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout belongs to the dashboard
    let writer = BoxMakeWriter::new(std::io::stderr);
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::with_default_strategies(),
    };
    config.apply_env_overrides()?;
    cli.apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// Start every enabled feed, all publishing into `board`.
async fn start_feeds(config: &Config, board: &PriceBoard) -> Vec<FeedHandle> {
    let mut handles = Vec::new();
    if config.feeds.binance.enabled {
        let connector = BinanceConnector::new(config.feeds.binance.clone(), board.clone());
        handles.push(connector.subscribe());
    }
    if config.feeds.static_prices.enabled {
        handles.push(StaticFeed::new(&config.feeds.static_prices, board.clone()).start().await);
    }
    if config.feeds.synthetic.enabled {
        handles.push(SyntheticFeed::new(config.feeds.synthetic.clone(), board.clone()).start());
    }
    handles
}

/// Translate SIGINT/SIGTERM into a graceful stop.
fn spawn_signal_handlers(stop: &StopHandle) {
    let on_ctrl_c = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received SIGINT, shutting down after the current tick");
            on_ctrl_c.stop();
        }
    });

    #[cfg(unix)]
    {
        let on_term = stop.clone();
        tokio::spawn(async move {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                    info!("Received SIGTERM, shutting down after the current tick");
                    on_term.stop();
                }
                Err(e) => warn!(error = %e, "Failed to install SIGTERM handler"),
            }
        });
    }
}

async fn run_lab<S: PersistenceSink>(config: Config, sink: S) -> anyhow::Result<()> {
    let board = PriceBoard::new();
    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let mut orchestrator =
        TickOrchestrator::new(OrchestratorConfig::from(&config.lab), board.clone(), sink)
            .with_commands(cmd_rx);

    for strategy in lab_strategy::build_all(&config.strategies) {
        orchestrator.register(strategy)?;
    }
    if orchestrator.roster().loaded() == 0 {
        warn!("No strategies configured");
    }
    info!(
        loaded = orchestrator.roster().loaded(),
        active = orchestrator.roster().active(),
        "Strategies loaded"
    );

    let stop = orchestrator.stop_handle();
    spawn_signal_handlers(&stop);
    if let Err(e) = spawn_stdin_reader(cmd_tx) {
        warn!(error = %e, "Operator commands unavailable");
    }

    info!(feeds = ?config.feeds.enabled(), "Starting feeds");
    let feeds = start_feeds(&config, &board).await;

    let warmup = Duration::from_millis(config.lab.warmup_ms);
    if !warmup.is_zero() {
        info!(warmup_ms = config.lab.warmup_ms, "Waiting for first prices");
        tokio::select! {
            _ = tokio::time::sleep(warmup) => {}
            _ = stop.stopped() => {}
        }
    }

    let dashboard = Dashboard::default();
    let show_dashboard = config.dashboard.enabled;
    let every = config.dashboard.every_ticks.max(1);
    let summary = orchestrator
        .run_with(|orch, report| {
            if show_dashboard && report.tick % every == 0 {
                let frame = dashboard.render(report.tick, report.ts_ms, orch.broker(), orch.roster());
                let mut out = std::io::stdout().lock();
                let _ = write!(out, "\x1b[2J\x1b[H{frame}");
                let _ = out.flush();
            }
        })
        .await;

    for feed in feeds {
        feed.disconnect().await;
    }
    if let Err(e) = orchestrator.close().await {
        error!(error = %e, "Failed to close persistence sink");
    }

    info!(
        ticks = summary.ticks,
        trades = summary.trades,
        rejected = summary.rejected,
        "Run complete"
    );
    for (strategy, equity) in &summary.final_equity {
        info!(strategy = %strategy, equity = *equity, "Final equity");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    let config = load_config(&cli).context("invalid configuration")?;
    info!(
        starting_cash = config.lab.starting_cash,
        tick_interval_ms = config.lab.tick_interval_ms,
        equity_log_interval = config.lab.equity_log_interval,
        "Configuration loaded"
    );

    if cli.no_db {
        run_lab(config, MemorySink::new()).await
    } else {
        let sink = SqliteSink::open(&config.lab.db_path)
            .await
            .with_context(|| format!("opening database {}", config.lab.db_path))?;
        run_lab(config, sink).await
    }
}
