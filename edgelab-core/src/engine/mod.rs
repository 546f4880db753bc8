//! Simulation engines.
//!
//! Both engines take the same inputs (bar series, signal pair, parameters) and
//! return the same [`BacktestResult`]. They share the sizing and cost rules
//! through [`broker::Broker`], so with zero costs and `FillPolicy::CurrentClose`
//! the event-driven engine reproduces the vectorized one exactly.
//!
//! Per-run pipeline:
//! 1. Validate parameters (before any bar is touched)
//! 2. Check signal alignment, substitute fallback signals if needed
//! 3. Walk the bars, filling at the engine's fill point
//! 4. Mark to market at every close: one equity point per bar

pub mod broker;
pub mod cost_model;
pub mod event_driven;
pub mod vectorized;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{BarFrequency, BarSeries, SignalPair};
use crate::error::{BacktestError, Result};
use crate::result::BacktestResult;
use crate::strategy::{SignalGenerator, UpDownMomentum};

pub use broker::Broker;
pub use cost_model::CostModel;

/// Which simulator runs a backtest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Engine {
    Vectorized,
    EventDriven,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Vectorized => "vectorized",
            Engine::EventDriven => "event-driven",
        }
    }

    /// Simulate pre-computed signals.
    pub fn run(
        &self,
        bars: &BarSeries,
        signals: SignalPair,
        params: &BacktestParams,
    ) -> Result<BacktestResult> {
        match self {
            Engine::Vectorized => vectorized::run(bars, signals, params),
            Engine::EventDriven => event_driven::run(bars, signals, params),
        }
    }

    /// Generate signals with `strategy`, then simulate them.
    pub fn run_strategy(
        &self,
        bars: &BarSeries,
        strategy: &dyn SignalGenerator,
        params: &BacktestParams,
    ) -> Result<BacktestResult> {
        params.validate()?;
        let signals = strategy.generate_signals(bars)?;
        self.run(bars, signals, params)
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = BacktestError;

    /// `"ml"` selects the vectorized engine; the classifier strategy is chosen
    /// separately.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vectorized" | "ml" => Ok(Engine::Vectorized),
            "event-driven" | "event_driven" | "eventdriven" => Ok(Engine::EventDriven),
            other => Err(BacktestError::invalid_params(format!(
                "unknown engine '{other}' (expected vectorized, event-driven or ml)"
            ))),
        }
    }
}

/// When the event-driven engine fills a submitted order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FillPolicy {
    /// Fill at the next bar's open.
    #[default]
    NextOpen,
    /// Fill at the signal bar's close.
    CurrentClose,
}

/// How many units an entry buys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Sizing {
    /// Spend all available cash (commission included).
    #[default]
    AllCash,
    /// A fixed number of units.
    FixedUnits(f64),
    /// A fraction of current equity, in (0, 1].
    PercentOfEquity(f64),
}

impl Sizing {
    /// Build from the optional fixed / percent knobs. Both at once is an error.
    pub fn from_options(fixed: Option<f64>, percent: Option<f64>) -> Result<Self> {
        let sizing = match (fixed, percent) {
            (Some(_), Some(_)) => {
                return Err(BacktestError::invalid_params(
                    "fixed size and percent size cannot be used together",
                ))
            }
            (Some(units), None) => Sizing::FixedUnits(units),
            (None, Some(pct)) => Sizing::PercentOfEquity(pct),
            (None, None) => Sizing::AllCash,
        };
        sizing.validate()?;
        Ok(sizing)
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            Sizing::AllCash => Ok(()),
            Sizing::FixedUnits(units) if units.is_finite() && units > 0.0 => Ok(()),
            Sizing::FixedUnits(units) => Err(BacktestError::invalid_params(format!(
                "fixed size must be positive, got {units}"
            ))),
            Sizing::PercentOfEquity(pct) if pct > 0.0 && pct <= 1.0 => Ok(()),
            Sizing::PercentOfEquity(pct) => Err(BacktestError::invalid_params(format!(
                "percent size must be in (0, 1], got {pct}"
            ))),
        }
    }

    /// Units to buy given available cash, current equity and the all-in cost of
    /// one unit. `None` when the order can't be afforded.
    pub fn quantity(&self, cash: f64, equity: f64, unit_cost: f64) -> Option<f64> {
        if unit_cost.is_nan() || unit_cost <= 0.0 || cash <= 0.0 {
            return None;
        }
        let affordable = cash / unit_cost;
        let qty = match *self {
            Sizing::AllCash => affordable,
            Sizing::FixedUnits(units) => units,
            Sizing::PercentOfEquity(pct) => pct * equity / unit_cost,
        };
        // Relative tolerance so an all-cash order isn't refused for rounding.
        if !qty.is_finite() || qty <= 0.0 || qty > affordable * (1.0 + 1e-12) {
            return None;
        }
        Some(qty.min(affordable))
    }
}

/// Run parameters shared by both engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestParams {
    pub init_cash: f64,
    pub costs: CostModel,
    pub sizing: Sizing,
    /// Replace signals that can't round-trip with the up/down fallback.
    pub use_fallback: bool,
    pub frequency: BarFrequency,
    /// Only read by the event-driven engine.
    pub fill_policy: FillPolicy,
}

impl Default for BacktestParams {
    fn default() -> Self {
        Self {
            init_cash: 10_000.0,
            costs: CostModel::default(),
            sizing: Sizing::AllCash,
            use_fallback: true,
            frequency: BarFrequency::DAILY,
            fill_policy: FillPolicy::NextOpen,
        }
    }
}

impl BacktestParams {
    /// Frictionless params with fallback disabled. Handy for parity checks.
    pub fn frictionless(init_cash: f64) -> Self {
        Self {
            init_cash,
            costs: CostModel::frictionless(),
            use_fallback: false,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.init_cash.is_finite() || self.init_cash <= 0.0 {
            return Err(BacktestError::invalid_params(format!(
                "init_cash must be positive, got {}",
                self.init_cash
            )));
        }
        CostModel::new(self.costs.fee_rate, self.costs.slippage_rate)?;
        self.sizing.validate()
    }
}

/// Check alignment and apply the fallback substitution.
///
/// Returns the signals to simulate and whether they came from the fallback.
pub(crate) fn prepare_signals(
    bars: &BarSeries,
    signals: SignalPair,
    params: &BacktestParams,
) -> Result<(SignalPair, bool)> {
    signals.ensure_aligned(bars.len())?;
    if params.use_fallback && signals.lacks_round_trip() {
        warn!(
            strategy = %signals.source,
            entries = signals.entry_count(),
            exits = signals.exit_count(),
            "strategy cannot complete a round trip, using fallback signals"
        );
        let fallback = UpDownMomentum.generate_signals(bars)?;
        return Ok((fallback, true));
    }
    Ok((signals, false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::series_from_closes;

    #[test]
    fn engine_names_parse() {
        assert_eq!("vectorized".parse::<Engine>().unwrap(), Engine::Vectorized);
        assert_eq!("ml".parse::<Engine>().unwrap(), Engine::Vectorized);
        assert_eq!(
            "Event-Driven".parse::<Engine>().unwrap(),
            Engine::EventDriven
        );
        assert!(matches!(
            "backtrader".parse::<Engine>(),
            Err(BacktestError::InvalidParameters(_))
        ));
        assert_eq!(Engine::EventDriven.to_string(), "event-driven");
    }

    #[test]
    fn engine_serde_is_kebab_case() {
        assert_eq!(
            serde_json::to_string(&Engine::EventDriven).unwrap(),
            "\"event-driven\""
        );
        let p: FillPolicy = serde_json::from_str("\"current-close\"").unwrap();
        assert_eq!(p, FillPolicy::CurrentClose);
    }

    #[test]
    fn sizing_from_options() {
        assert_eq!(Sizing::from_options(None, None).unwrap(), Sizing::AllCash);
        assert_eq!(
            Sizing::from_options(Some(3.0), None).unwrap(),
            Sizing::FixedUnits(3.0)
        );
        assert_eq!(
            Sizing::from_options(None, Some(0.5)).unwrap(),
            Sizing::PercentOfEquity(0.5)
        );
        assert!(matches!(
            Sizing::from_options(Some(1.0), Some(0.5)),
            Err(BacktestError::InvalidParameters(_))
        ));
        assert!(Sizing::from_options(Some(0.0), None).is_err());
        assert!(Sizing::from_options(None, Some(1.5)).is_err());
    }

    #[test]
    fn sizing_quantity() {
        assert_eq!(Sizing::AllCash.quantity(1000.0, 1000.0, 10.0), Some(100.0));
        assert_eq!(Sizing::FixedUnits(5.0).quantity(1000.0, 1000.0, 10.0), Some(5.0));
        assert_eq!(Sizing::FixedUnits(500.0).quantity(1000.0, 1000.0, 10.0), None);
        assert_eq!(
            Sizing::PercentOfEquity(0.25).quantity(1000.0, 1000.0, 10.0),
            Some(25.0)
        );
        assert_eq!(Sizing::AllCash.quantity(0.0, 0.0, 10.0), None);
    }

    #[test]
    fn params_validation() {
        assert!(BacktestParams::default().validate().is_ok());
        let mut p = BacktestParams::default();
        p.init_cash = 0.0;
        assert!(matches!(
            p.validate(),
            Err(BacktestError::InvalidParameters(_))
        ));
        let mut p = BacktestParams::default();
        p.costs.fee_rate = -0.01;
        assert!(p.validate().is_err());
    }

    #[test]
    fn fallback_substitutes_when_no_round_trip() {
        let bars = series_from_closes(&[10.0, 11.0, 10.0, 11.0]);
        let signals = SignalPair::empty(4, "quiet");
        let (sig, used) = prepare_signals(&bars, signals.clone(), &BacktestParams::default()).unwrap();
        assert!(used);
        assert_eq!(sig.source, "Simple_UpDown_Strategy");

        let (sig, used) =
            prepare_signals(&bars, signals, &BacktestParams::frictionless(100.0)).unwrap();
        assert!(!used);
        assert_eq!(sig.source, "quiet");
    }

    #[test]
    fn misaligned_signals_are_invalid_input() {
        let bars = series_from_closes(&[10.0, 11.0]);
        let err = prepare_signals(&bars, SignalPair::empty(3, "x"), &BacktestParams::default())
            .unwrap_err();
        assert!(matches!(err, BacktestError::InvalidInput(_)));
    }
}
