//! Configuration structures for the trading lab.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::error::{Error, Result};

/// Main configuration for the trading lab.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Loop and accounting settings.
    pub lab: LabConfig,
    /// Market data sources.
    pub feeds: FeedsConfig,
    /// Registered strategies.
    pub strategies: Vec<StrategyConfig>,
    /// Text dashboard.
    pub dashboard: DashboardConfig,
}

/// Loop and accounting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabConfig {
    /// Starting cash per strategy (USD).
    pub starting_cash: f64,
    /// Tick cadence in milliseconds.
    pub tick_interval_ms: u64,
    /// Write equity rows every N ticks.
    pub equity_log_interval: u64,
    /// SQLite database path for trade/equity logging.
    pub db_path: String,
    /// Wait for feeds before the first tick (ms).
    pub warmup_ms: u64,
    /// Recent trades kept in memory for the dashboard.
    pub trade_history: usize,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            starting_cash: 10_000.0,
            tick_interval_ms: 1_000,
            equity_log_interval: 10,
            db_path: "lab.db".to_string(),
            warmup_ms: 2_000,
            trade_history: 200,
        }
    }
}

/// Market data sources. Each can be enabled independently.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedsConfig {
    pub binance: BinanceFeedConfig,
    pub static_prices: StaticFeedConfig,
    pub synthetic: SyntheticFeedConfig,
}

impl FeedsConfig {
    /// Names of enabled feeds.
    pub fn enabled(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.binance.enabled {
            names.push("binance");
        }
        if self.static_prices.enabled {
            names.push("static_prices");
        }
        if self.synthetic.enabled {
            names.push("synthetic");
        }
        names
    }
}

/// Binance public ticker streams.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BinanceFeedConfig {
    pub enabled: bool,
    pub symbols: Vec<String>,
    pub base_url: String,
    /// Initial reconnect backoff (ms).
    pub reconnect_backoff_ms: u64,
    /// Backoff ceiling (ms).
    pub max_backoff_ms: u64,
}

impl Default for BinanceFeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            symbols: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
            base_url: "wss://stream.binance.com:9443/ws".to_string(),
            reconnect_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
        }
    }
}

/// Fixed prices, published once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticFeedConfig {
    pub enabled: bool,
    pub prices: BTreeMap<String, f64>,
}

/// Seeded random-walk prices for offline runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticFeedConfig {
    pub enabled: bool,
    pub symbols: Vec<String>,
    pub start_price: f64,
    /// Maximum absolute move per step.
    pub max_step: f64,
    pub seed: u64,
    pub interval_ms: u64,
}

impl Default for SyntheticFeedConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            symbols: vec!["BTCUSDT".to_string()],
            start_price: 50_000.0,
            max_step: 50.0,
            seed: 42,
            interval_ms: 250,
        }
    }
}

/// One entry of the strategy registration table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// Moving-average trend follower.
    TrendFollower {
        name: String,
        symbol: String,
        /// Quantity bought on entry.
        size: f64,
        /// Moving-average window in ticks.
        window: usize,
        /// Skip entries below this cash balance.
        #[serde(default = "default_min_cash")]
        min_cash: f64,
    },
    /// Random buyer/seller.
    RandomTrader {
        name: String,
        symbol: String,
        /// Quantity bought per BUY.
        size: f64,
        /// Chance of acting on a tick.
        trade_probability: f64,
        seed: u64,
        #[serde(default = "default_min_cash")]
        min_cash: f64,
    },
}

fn default_min_cash() -> f64 {
    100.0
}

impl StrategyConfig {
    /// Strategy name (ledger key).
    pub fn name(&self) -> &str {
        match self {
            StrategyConfig::TrendFollower { name, .. } => name,
            StrategyConfig::RandomTrader { name, .. } => name,
        }
    }

    /// Trade size.
    pub fn size(&self) -> f64 {
        match self {
            StrategyConfig::TrendFollower { size, .. } => *size,
            StrategyConfig::RandomTrader { size, .. } => *size,
        }
    }

    /// Built-in registration table.
    pub fn defaults() -> Vec<StrategyConfig> {
        vec![
            StrategyConfig::TrendFollower {
                name: "Trend Follower".to_string(),
                symbol: "BTCUSDT".to_string(),
                size: 0.005,
                window: 10,
                min_cash: default_min_cash(),
            },
            StrategyConfig::RandomTrader {
                name: "Random Trader".to_string(),
                symbol: "BTCUSDT".to_string(),
                size: 0.001,
                trade_probability: 0.1,
                seed: 7,
                min_cash: default_min_cash(),
            },
        ]
    }
}

/// Text dashboard settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    /// Render every N ticks.
    pub every_ticks: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            every_ticks: 1,
        }
    }
}

impl Config {
    /// Default configuration with the built-in strategies registered.
    pub fn with_default_strategies() -> Self {
        Self {
            strategies: StrategyConfig::defaults(),
            ..Default::default()
        }
    }

    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {e}", path.display())))?;
        let config: Config = serde_json::from_str(&raw)
            .map_err(|e| Error::config(format!("cannot parse {}: {e}", path.display())))?;
        Ok(config)
    }

    /// Apply `LAB_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(std::env::vars())
    }

    /// Apply `LAB_*` overrides from key/value pairs.
    pub fn apply_overrides<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let value = value.as_ref();
            match key.as_ref() {
                "LAB_STARTING_CASH" => self.lab.starting_cash = parse_var("LAB_STARTING_CASH", value)?,
                "LAB_TICK_INTERVAL_MS" => {
                    self.lab.tick_interval_ms = parse_var("LAB_TICK_INTERVAL_MS", value)?
                }
                "LAB_EQUITY_LOG_INTERVAL" => {
                    self.lab.equity_log_interval = parse_var("LAB_EQUITY_LOG_INTERVAL", value)?
                }
                "LAB_DB_PATH" => self.lab.db_path = value.to_string(),
                _ => {}
            }
        }
        Ok(())
    }

    /// Validate the configuration, reporting every problem at once.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.feeds.enabled().is_empty() {
            errors.push("at least one data feed must be enabled".to_string());
        }
        if self.feeds.binance.enabled && self.feeds.binance.symbols.is_empty() {
            errors.push("binance feed is enabled but has no symbols".to_string());
        }
        if self.feeds.static_prices.enabled && self.feeds.static_prices.prices.is_empty() {
            errors.push("static_prices feed is enabled but has no prices".to_string());
        }
        if self.feeds.synthetic.enabled {
            let syn = &self.feeds.synthetic;
            if syn.symbols.is_empty() {
                errors.push("synthetic feed is enabled but has no symbols".to_string());
            }
            if !(syn.start_price.is_finite() && syn.start_price > 0.0) {
                errors.push("synthetic.start_price must be positive".to_string());
            }
            if !(syn.max_step.is_finite() && syn.max_step >= 0.0) {
                errors.push("synthetic.max_step must be non-negative".to_string());
            }
            if syn.interval_ms == 0 {
                errors.push("synthetic.interval_ms must be positive".to_string());
            }
        }

        if self.lab.tick_interval_ms == 0 {
            errors.push("tick_interval_ms must be positive".to_string());
        }
        if !(self.lab.starting_cash.is_finite() && self.lab.starting_cash > 0.0) {
            errors.push("starting_cash must be positive".to_string());
        }
        if self.lab.equity_log_interval == 0 {
            errors.push("equity_log_interval must be positive".to_string());
        }

        let mut seen = HashSet::new();
        for strategy in &self.strategies {
            let name = strategy.name();
            if name.trim().is_empty() {
                errors.push("strategy name must not be empty".to_string());
            } else if !seen.insert(name) {
                errors.push(format!("duplicate strategy name '{name}'"));
            }
            if !(strategy.size().is_finite() && strategy.size() > 0.0) {
                errors.push(format!("strategy '{name}': size must be positive"));
            }
            match strategy {
                StrategyConfig::TrendFollower { window, .. } if *window < 2 => {
                    errors.push(format!("strategy '{name}': window must be at least 2"));
                }
                StrategyConfig::RandomTrader {
                    trade_probability, ..
                } if !(0.0..=1.0).contains(trade_probability) => {
                    errors.push(format!(
                        "strategy '{name}': trade_probability must be within [0, 1]"
                    ));
                }
                _ => {}
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::config(errors.join("; ")))
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::config(format!("{key}: cannot parse '{value}'")))
}
