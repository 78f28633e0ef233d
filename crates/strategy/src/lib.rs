//! Strategy callback interface for the trading lab.
//!
//! This crate provides:
//! - The `Strategy` trait external decision logic implements
//! - The context and payload handed to callbacks
//! - The registration table mapping config entries to implementations
//! - Reference strategies (trend follower, random trader)

pub mod context;
pub mod random;
pub mod registry;
pub mod trend;

pub use context::{BotView, StrategyContext, TickPayload};
pub use random::RandomTrader;
pub use registry::{build, build_all};
pub use trend::{RollingMean, TrendFollower};

/// A unit of decision logic invoked once per tick.
///
/// Implementations own whatever scratch state they need; the orchestrator
/// keeps the instance alive between ticks and never shares it.
pub trait Strategy: Send {
    /// Unique name; also the ledger key.
    fn name(&self) -> &str;

    /// Symbols of interest. Informational only.
    fn symbols(&self) -> &[String];

    /// Called once at registration.
    fn init(&mut self, _ctx: &StrategyContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called every tick while the strategy is running.
    fn on_tick(&mut self, ctx: &StrategyContext<'_>, tick: &TickPayload<'_>) -> anyhow::Result<()>;
}
