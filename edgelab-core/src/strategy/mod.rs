//! Signal strategies: bar history in, aligned entry/exit flags out.
//!
//! Strategies are portfolio-agnostic. `generate_signals` sees only the bar
//! series, and the flag at index i is a function of bars `0..=i`.

pub mod classifier;
pub mod ma_crossover;
pub mod momentum;

use serde::{Deserialize, Serialize};

use crate::domain::{BarSeries, SignalPair};
use crate::error::Result;

pub use classifier::{
    build_features, Classifier, ClassifierStrategy, FeatureScaler, LoadedModel,
    LogisticModel, ModelLoader, StandardScaler, FEATURE_NAMES,
};
pub use ma_crossover::MaCrossover;
pub use momentum::UpDownMomentum;

/// Trait for signal strategies.
pub trait SignalGenerator: Send + Sync {
    /// Display name recorded in results (e.g., "MA_Crossover_20_50").
    fn name(&self) -> &str;

    /// Minimum number of bars needed to run.
    fn warmup_bars(&self) -> usize;

    /// Produce one entry flag and one exit flag per bar.
    ///
    /// Fails with `InvalidInput` when `bars` is shorter than `warmup_bars()`.
    fn generate_signals(&self, bars: &BarSeries) -> Result<SignalPair>;
}

/// Closed set of strategies the engines accept.
#[derive(Debug, Clone)]
pub enum Strategy {
    Crossover(MaCrossover),
    Momentum(UpDownMomentum),
    Classifier(ClassifierStrategy),
}

impl Strategy {
    pub fn crossover(fast: usize, slow: usize) -> Result<Self> {
        Ok(Strategy::Crossover(MaCrossover::new(fast, slow)?))
    }

    pub fn momentum() -> Self {
        Strategy::Momentum(UpDownMomentum)
    }

    /// Short kind label, stable across parameterisations.
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Crossover(_) => StrategyKind::Crossover,
            Strategy::Momentum(_) => StrategyKind::Momentum,
            Strategy::Classifier(_) => StrategyKind::Classifier,
        }
    }

    fn inner(&self) -> &dyn SignalGenerator {
        match self {
            Strategy::Crossover(s) => s,
            Strategy::Momentum(s) => s,
            Strategy::Classifier(s) => s,
        }
    }
}

impl SignalGenerator for Strategy {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn warmup_bars(&self) -> usize {
        self.inner().warmup_bars()
    }

    fn generate_signals(&self, bars: &BarSeries) -> Result<SignalPair> {
        self.inner().generate_signals(bars)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Crossover,
    Momentum,
    Classifier,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::series_from_closes;

    #[test]
    fn enum_delegates_to_inner() {
        let s = Strategy::crossover(5, 20).unwrap();
        assert_eq!(s.name(), "MA_Crossover_5_20");
        assert_eq!(s.warmup_bars(), 20);
        assert_eq!(s.kind(), StrategyKind::Crossover);

        let m = Strategy::momentum();
        assert_eq!(m.name(), "Simple_UpDown_Strategy");
        assert_eq!(m.kind(), StrategyKind::Momentum);
    }

    #[test]
    fn signals_align_with_bars() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + (i % 7) as f64).collect();
        let bars = series_from_closes(&closes);
        for s in [Strategy::crossover(3, 8).unwrap(), Strategy::momentum()] {
            let sig = s.generate_signals(&bars).unwrap();
            assert_eq!(sig.len(), bars.len());
            assert_eq!(sig.source, s.name());
        }
    }
}
