//! Tick orchestration for the trading lab.
//!
//! This crate provides:
//! - The tick loop sequencing prices, settlement, accounting and strategies
//! - The strategy roster with operator-controlled status
//! - Trade/equity persistence (SQLite)
//! - The text dashboard and stdin operator commands

pub mod commands;
pub mod dashboard;
pub mod orchestrator;
pub mod roster;
pub mod storage;

pub use commands::{spawn_stdin_reader, OperatorCommand};
pub use dashboard::Dashboard;
pub use orchestrator::{
    OrchestratorConfig, RunSummary, StopHandle, TickOrchestrator, TickPhase, TickReport,
};
pub use roster::{Roster, StrategySlot};
pub use storage::{MemorySink, PersistenceSink, SqliteSink, TradeRow};
