//! BacktestResult: the immutable output of either engine.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::{BarFrequency, Fill, Order, SignalTag, TradeRecord};
use crate::engine::Engine;
use crate::metrics::BacktestStats;

/// Portfolio value at one bar's close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub value: f64,
    pub signal: SignalTag,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Name of the strategy that was asked for, even when the fallback ran.
    pub strategy_name: String,
    pub engine: Engine,
    pub init_cash: f64,
    pub frequency: BarFrequency,
    pub fallback_used: bool,
    /// Exactly one point per input bar.
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<TradeRecord>,
    /// Order history (event-driven engine only).
    #[serde(default)]
    pub orders: Vec<Order>,
    /// Executed fills in time order, from either engine.
    #[serde(default)]
    pub fills: Vec<Fill>,
}

impl BacktestResult {
    pub fn get_stats(&self) -> BacktestStats {
        BacktestStats::compute(
            &self.equity_values(),
            &self.trades,
            self.init_cash,
            self.frequency.periods_per_year(),
            &self.strategy_name,
        )
    }

    pub fn get_portfolio_values(&self) -> Vec<(NaiveDateTime, f64)> {
        self.equity_curve
            .iter()
            .map(|p| (p.timestamp, p.value))
            .collect()
    }

    pub fn get_portfolio_values_with_signals(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn equity_values(&self) -> Vec<f64> {
        self.equity_curve.iter().map(|p| p.value).collect()
    }

    /// Equity at the last bar. Equals `init_cash` for an empty curve.
    pub fn final_value(&self) -> f64 {
        self.equity_curve
            .last()
            .map(|p| p.value)
            .unwrap_or(self.init_cash)
    }
}
