//! Core types and configuration for the trading lab.
//!
//! This crate provides shared types used across all other crates:
//! - Orders, trades and per-strategy ledgers
//! - Price snapshots and equity rows
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, RejectReason, Result};
pub use types::*;
