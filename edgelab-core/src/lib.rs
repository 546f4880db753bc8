//! EdgeLab Core: bar data, signal strategies, simulators, metrics, ensemble.
//!
//! This crate contains the backtesting execution core:
//! - Domain types (bars, signals, orders, fills, positions, trades, frequency)
//! - Indicators and the signal strategies built on them
//! - Vectorized and event-driven simulators sharing one broker
//! - Result statistics
//! - Forecast ensemble combiner

pub mod domain;
pub mod engine;
pub mod ensemble;
pub mod error;
pub mod indicators;
pub mod metrics;
pub mod result;
pub mod strategy;

pub use error::{BacktestError, Result};
