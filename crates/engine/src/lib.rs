//! Paper-trading execution engine.
//!
//! This crate provides:
//! - Per-strategy account ledgers
//! - The shared order queue
//! - Settlement of market orders at snapshot prices
//! - Mark-to-market accounting

pub mod broker;
pub mod execution;
pub mod ledger;
pub mod mark;
pub mod order_queue;

pub use broker::{BrokerStats, PaperBroker};
pub use execution::{settle, settle_all, SettlementReport};
pub use ledger::{Ledger, LedgerBook};
pub use mark::{mark_to_market, valuation};
pub use order_queue::OrderQueue;
