//! Indicators used by the signal strategies.
//!
//! Indicators are pure functions: bar history in, numeric series out, one value
//! per bar. Warmup positions are `f64::NAN`. No value at bar t may depend on bars
//! after t; `tests/lookahead_test.rs` checks this for every indicator.

pub mod returns;
pub mod sma;
pub mod volatility;
pub mod volume_ratio;

use std::collections::HashMap;

use crate::domain::Bar;

pub use returns::PctChange;
pub use sma::{PriceField, Sma};
pub use volatility::RollingStd;
pub use volume_ratio::VolumeRatio;

/// Trait for indicators.
///
/// The output has the same length as `bars`; the first `lookback()` values are NaN.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_20", "std_5").
    fn name(&self) -> &str;

    /// Number of leading bars with no valid output.
    fn lookback(&self) -> usize;

    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Container for precomputed indicator series, queried by name and bar index.
#[derive(Debug, Clone, Default)]
pub struct IndicatorValues {
    series: HashMap<String, Vec<f64>>,
}

impl IndicatorValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute every indicator once over `bars`.
    pub fn precompute(bars: &[Bar], indicators: &[&dyn Indicator]) -> Self {
        let mut values = Self::new();
        for ind in indicators {
            values.insert(ind.name(), ind.compute(bars));
        }
        values
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.series.insert(name.into(), values);
    }

    pub fn get(&self, name: &str, bar_index: usize) -> Option<f64> {
        self.series
            .get(name)
            .and_then(|v| v.get(bar_index).copied())
    }

    pub fn get_series(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(|v| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Create synthetic bars from close prices for testing.
///
/// open = prev_close (or close for first bar), high/low = max/min ± 1.0, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    crate::domain::bar::series_from_closes(closes).into_bars()
}

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
