//! Rolling standard deviation of close prices (sample, n-1 denominator).
//!
//! Lookback: period - 1.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct RollingStd {
    period: usize,
    name: String,
}

impl RollingStd {
    pub fn new(period: usize) -> Self {
        assert!(period >= 2, "rolling std period must be >= 2");
        Self {
            period,
            name: format!("std_{period}"),
        }
    }
}

impl Indicator for RollingStd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        if n < self.period {
            return result;
        }
        for i in (self.period - 1)..n {
            let window = &bars[(i + 1 - self.period)..=i];
            let mean = window.iter().map(|b| b.close).sum::<f64>() / self.period as f64;
            let var = window
                .iter()
                .map(|b| (b.close - mean).powi(2))
                .sum::<f64>()
                / (self.period - 1) as f64;
            result[i] = var.sqrt();
        }
        result
    }
}
