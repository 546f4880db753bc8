//! Volume relative to its own rolling mean: volume[t] / mean(volume[t-period+1..=t]).
//!
//! Lookback: period - 1. NaN where the rolling mean is zero.

use super::sma::rolling_mean;
use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct VolumeRatio {
    period: usize,
    name: String,
}

impl VolumeRatio {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "volume ratio period must be >= 1");
        Self {
            period,
            name: format!("volume_ratio_{period}"),
        }
    }
}

impl Indicator for VolumeRatio {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
        let means = rolling_mean(&volumes, self.period);
        volumes
            .iter()
            .zip(means)
            .map(|(&v, m)| if m.is_nan() || m == 0.0 { f64::NAN } else { v / m })
            .collect()
    }
}
