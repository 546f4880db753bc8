//! Moving average crossover: golden cross enters, death cross exits.

use crate::domain::{BarSeries, SignalPair};
use crate::error::{BacktestError, Result};
use crate::indicators::{Indicator, Sma};

use super::SignalGenerator;

/// SMA crossover signal generator.
///
/// Entry at bar i when `fast[i-1] <= slow[i-1]` and `fast[i] > slow[i]`; exit on
/// the mirrored downward cross. Nothing fires before both averages exist. On the
/// first bar where they do, the previous relation counts as "not crossed yet",
/// so the bar enters if fast is above slow and exits if fast is below.
#[derive(Debug, Clone)]
pub struct MaCrossover {
    fast: Sma,
    slow: Sma,
    name: String,
}

impl MaCrossover {
    /// Both periods must be positive. `fast < slow` is conventional, not required.
    pub fn new(fast_period: usize, slow_period: usize) -> Result<Self> {
        if fast_period == 0 || slow_period == 0 {
            return Err(BacktestError::invalid_params(format!(
                "crossover periods must be positive, got fast={fast_period} slow={slow_period}"
            )));
        }
        Ok(Self {
            fast: Sma::new(fast_period),
            slow: Sma::new(slow_period),
            name: format!("MA_Crossover_{fast_period}_{slow_period}"),
        })
    }

    pub fn default_params() -> Self {
        Self {
            fast: Sma::new(20),
            slow: Sma::new(50),
            name: "MA_Crossover_20_50".into(),
        }
    }

    pub fn fast_period(&self) -> usize {
        self.fast.period()
    }

    pub fn slow_period(&self) -> usize {
        self.slow.period()
    }
}

impl SignalGenerator for MaCrossover {
    fn name(&self) -> &str {
        &self.name
    }

    fn warmup_bars(&self) -> usize {
        self.fast_period().max(self.slow_period())
    }

    fn generate_signals(&self, bars: &BarSeries) -> Result<SignalPair> {
        bars.require_len(self.warmup_bars(), &self.name)?;

        let fast = self.fast.compute(bars.bars());
        let slow = self.slow.compute(bars.bars());
        let n = bars.len();
        let first = self.warmup_bars() - 1;

        let mut signals = SignalPair::empty(n, &self.name);
        for i in first..n {
            let (f, s) = (fast[i], slow[i]);
            let (was_above, was_below) = if i == first {
                (false, false)
            } else {
                (fast[i - 1] > slow[i - 1], fast[i - 1] < slow[i - 1])
            };
            signals.entries[i] = f > s && !was_above;
            signals.exits[i] = f < s && !was_below;
        }
        Ok(signals)
    }
}
