//! Simple Moving Average (SMA).
//!
//! Rolling mean over a lookback window of either close prices or volume.
//! Lookback: period - 1 (first valid value at index period-1).

use super::Indicator;
use crate::domain::Bar;

/// Which bar field an indicator reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceField {
    Close,
    Volume,
}

impl PriceField {
    pub fn read(&self, bar: &Bar) -> f64 {
        match self {
            PriceField::Close => bar.close,
            PriceField::Volume => bar.volume,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    field: PriceField,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self::on(period, PriceField::Close)
    }

    pub fn on(period: usize, field: PriceField) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        let name = match field {
            PriceField::Close => format!("sma_{period}"),
            PriceField::Volume => format!("volume_sma_{period}"),
        };
        Self {
            period,
            field,
            name,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let values: Vec<f64> = bars.iter().map(|b| self.field.read(b)).collect();
        rolling_mean(&values, self.period)
    }
}

/// Rolling mean of `values` over `period`; NaN for the first `period - 1` slots.
///
/// Each window is summed from scratch so long series don't accumulate
/// floating-point drift from a running add/subtract.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }
    for i in (period - 1)..n {
        let window = &values[(i + 1 - period)..=i];
        result[i] = window.iter().sum::<f64>() / period as f64;
    }
    result
}
