//! EdgeLab Runner: backtest orchestration on top of `edgelab-core`.
//!
//! This crate provides:
//! - TOML run configuration with deterministic run ids
//! - Bar loading from CSV or a seeded synthetic generator
//! - Single-run orchestration and parallel crossover sweeps
//! - A local model-artifact cache with TTL eviction
//! - JSON classifier artifacts and result persistence

pub mod artifact_cache;
pub mod config;
pub mod data_loader;
pub mod model_loader;
pub mod persistence;
pub mod runner;
pub mod sweep;

pub use artifact_cache::{ArtifactCache, CacheError, DirFetcher, Fetcher, DEFAULT_TTL};
pub use config::{BacktestConfig, ConfigError, EngineSection, RunId, StrategyConfig};
pub use data_loader::{
    load_bars_csv, load_forecasts_csv, read_bars_csv, read_forecasts_csv, write_bars_csv,
    BarSource, CsvBarSource, ForecastTable, LoadError, SyntheticBars, SyntheticConfig,
    Y_TRUE_COLUMN,
};
pub use model_loader::{JsonModelLoader, ModelArtifact};
pub use persistence::{JsonFileSink, MemorySink, ResultRecord, ResultSink, SinkError};
pub use runner::{run_and_persist, run_backtest, run_from_source, RunError, RunOutcome};
pub use sweep::{CrossoverGrid, ParamSweep, RankBy, SweepEntry, SweepResults};
