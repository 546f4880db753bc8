//! Parallel parameter sweep over moving-average crossover periods.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use edgelab_core::domain::BarSeries;
use edgelab_core::metrics::BacktestStats;

use crate::config::{BacktestConfig, RunId};
use crate::runner::{run_backtest, RunError};

/// Fast and slow periods to combine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossoverGrid {
    pub fast_periods: Vec<usize>,
    pub slow_periods: Vec<usize>,
}

impl Default for CrossoverGrid {
    /// Fast 5, 10, 20 against slow 20, 50, 100.
    fn default() -> Self {
        Self {
            fast_periods: vec![5, 10, 20],
            slow_periods: vec![20, 50, 100],
        }
    }
}

impl CrossoverGrid {
    pub fn new(fast_periods: Vec<usize>, slow_periods: Vec<usize>) -> Self {
        Self {
            fast_periods,
            slow_periods,
        }
    }

    /// Every `(fast, slow)` pair with `fast < slow`, in grid order.
    pub fn combinations(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for &fast in &self.fast_periods {
            for &slow in &self.slow_periods {
                // Skip invalid combinations (fast >= slow)
                if fast >= slow || fast == 0 {
                    continue;
                }
                pairs.push((fast, slow));
            }
        }
        pairs
    }

    pub fn size(&self) -> usize {
        self.combinations().len()
    }
}

/// Statistic to rank sweep entries by. Higher is better for all of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankBy {
    #[default]
    SharpeRatio,
    SortinoRatio,
    CalmarRatio,
    TotalReturn,
}

impl RankBy {
    fn score(&self, stats: &BacktestStats) -> f64 {
        match self {
            RankBy::SharpeRatio => stats.sharpe_ratio,
            RankBy::SortinoRatio => stats.sortino_ratio,
            RankBy::CalmarRatio => stats.calmar_ratio,
            RankBy::TotalReturn => stats.total_return,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepEntry {
    pub fast: usize,
    pub slow: usize,
    pub run_id: RunId,
    pub stats: BacktestStats,
}

/// Runs a [`CrossoverGrid`] against one bar series.
#[derive(Debug, Clone)]
pub struct ParamSweep {
    grid: CrossoverGrid,
    parallel: bool,
}

impl ParamSweep {
    pub fn new(grid: CrossoverGrid) -> Self {
        Self {
            grid,
            parallel: true,
        }
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Run every combination. Results come back in grid order either way;
    /// the first failing run aborts the sweep.
    pub fn run(&self, base: &BacktestConfig, bars: &BarSeries) -> Result<SweepResults, RunError> {
        let pairs = self.grid.combinations();
        info!(runs = pairs.len(), parallel = self.parallel, "starting crossover sweep");

        let run_one = |&(fast, slow): &(usize, usize)| -> Result<SweepEntry, RunError> {
            let config = base.with_crossover(fast, slow);
            let outcome = run_backtest(&config, bars, None)?;
            Ok(SweepEntry {
                fast,
                slow,
                run_id: outcome.run_id,
                stats: outcome.stats,
            })
        };

        let entries = if self.parallel {
            pairs.par_iter().map(run_one).collect::<Result<Vec<_>, _>>()?
        } else {
            pairs.iter().map(run_one).collect::<Result<Vec<_>, _>>()?
        };

        Ok(SweepResults { entries })
    }
}

/// Results from a parameter sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResults {
    entries: Vec<SweepEntry>,
}

impl SweepResults {
    /// Entries in grid order.
    pub fn all(&self) -> &[SweepEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted best first. Ties keep grid order.
    pub fn ranked(&self, by: RankBy) -> Vec<&SweepEntry> {
        let mut sorted: Vec<&SweepEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| by.score(&b.stats).total_cmp(&by.score(&a.stats)));
        sorted
    }

    pub fn best(&self, by: RankBy) -> Option<&SweepEntry> {
        self.ranked(by).into_iter().next()
    }
}
