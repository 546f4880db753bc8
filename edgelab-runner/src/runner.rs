//! Backtest runner: config + bars in, result + stats out.
//!
//! Entry points:
//! - `run_backtest()`: pre-loaded bars, no I/O. Used by sweeps.
//! - `run_from_source()`: fetches the configured symbol from a [`BarSource`].
//! - `run_and_persist()`: `run_backtest()` followed by a [`ResultSink`].

use thiserror::Error;
use tracing::info;

use edgelab_core::domain::BarSeries;
use edgelab_core::metrics::BacktestStats;
use edgelab_core::result::BacktestResult;
use edgelab_core::strategy::{ModelLoader, SignalGenerator};
use edgelab_core::BacktestError;

use crate::config::{BacktestConfig, ConfigError, RunId};
use crate::data_loader::{BarSource, LoadError};
use crate::persistence::{ResultRecord, ResultSink, SinkError, SCHEMA_VERSION};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("backtest error: {0}")]
    Backtest(#[from] BacktestError),
    #[error("persistence error: {0}")]
    Sink(#[from] SinkError),
}

/// A finished run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub symbol: String,
    pub result: BacktestResult,
    pub stats: BacktestStats,
}

impl RunOutcome {
    pub fn to_record(&self, config: &BacktestConfig) -> Result<ResultRecord, RunError> {
        Ok(ResultRecord {
            schema_version: SCHEMA_VERSION,
            run_id: self.run_id.clone(),
            symbol: self.symbol.clone(),
            engine: self.result.engine.to_string(),
            strategy: config.strategy.clone(),
            params: config.to_params()?,
            fallback_used: self.result.fallback_used,
            stats: self.stats.clone(),
            equity_curve: self.result.equity_curve.clone(),
            trades: self.result.trades.clone(),
        })
    }
}

/// Run one backtest on pre-loaded bars.
pub fn run_backtest(
    config: &BacktestConfig,
    bars: &BarSeries,
    loader: Option<&dyn ModelLoader>,
) -> Result<RunOutcome, RunError> {
    config.validate()?;
    let run_id = config.run_id()?;
    let params = config.to_params()?;
    let engine = config.engine_kind()?;
    let strategy = config.build_strategy(loader)?;

    info!(
        run_id = %run_id,
        symbol = %config.backtest.symbol,
        strategy = strategy.name(),
        engine = %engine,
        bars = bars.len(),
        "running backtest"
    );

    let result = engine.run_strategy(bars, &strategy, &params)?;
    let stats = result.get_stats();

    info!(
        run_id = %run_id,
        total_return = stats.total_return,
        trades = stats.total_trades,
        fallback = result.fallback_used,
        "backtest complete"
    );

    Ok(RunOutcome {
        run_id,
        symbol: config.backtest.symbol.clone(),
        result,
        stats,
    })
}

/// Fetch the configured symbol, then run.
pub fn run_from_source(
    config: &BacktestConfig,
    source: &dyn BarSource,
    loader: Option<&dyn ModelLoader>,
) -> Result<RunOutcome, RunError> {
    config.validate()?;
    let bars = source.fetch(&config.backtest.symbol)?;
    run_backtest(config, &bars, loader)
}

/// Run, then hand the record to `sink`. Nothing is persisted for a failed run.
pub fn run_and_persist(
    config: &BacktestConfig,
    bars: &BarSeries,
    loader: Option<&dyn ModelLoader>,
    sink: &dyn ResultSink,
) -> Result<RunOutcome, RunError> {
    let outcome = run_backtest(config, bars, loader)?;
    sink.persist(&outcome.to_record(config)?)?;
    Ok(outcome)
}
