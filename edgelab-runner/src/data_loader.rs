//! Bar loading for the runner.
//!
//! Two sources implement [`BarSource`]:
//! - [`CsvBarSource`]: one `{symbol}.csv` per symbol under a directory
//! - [`SyntheticBars`]: a seeded geometric random walk with regime flips
//!
//! Forecast matrices for the ensemble are read from CSV as well, see
//! [`read_forecasts_csv`].
//!
//! Synthetic data is for development and tests. The same seed and symbol
//! always produce the same bars.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use edgelab_core::domain::{Bar, BarFrequency, BarSeries};
use edgelab_core::ensemble::ForecastMatrix;
use edgelab_core::BacktestError;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: unparseable timestamp '{value}'")]
    Timestamp { row: usize, value: String },
    #[error("row {row}, column '{column}': not a number: '{value}'")]
    Value {
        row: usize,
        column: String,
        value: String,
    },
    #[error("invalid data: {0}")]
    Invalid(#[from] BacktestError),
}

/// Supplier of time-ordered OHLCV bars for a symbol.
pub trait BarSource: Send + Sync {
    fn fetch(&self, symbol: &str) -> Result<BarSeries, LoadError>;
}

// ─── CSV ───

/// One CSV row. Only `timestamp` and `close` are required; missing
/// open/high/low default to the close and a missing volume to zero.
#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: f64,
    volume: Option<f64>,
}

/// Reads `{root}/{symbol}.csv`.
#[derive(Debug, Clone)]
pub struct CsvBarSource {
    root: PathBuf,
}

impl CsvBarSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.root.join(format!("{symbol}.csv"))
    }
}

impl BarSource for CsvBarSource {
    fn fetch(&self, symbol: &str) -> Result<BarSeries, LoadError> {
        load_bars_csv(self.path_for(symbol))
    }
}

/// Load a bar CSV from disk.
pub fn load_bars_csv(path: impl AsRef<Path>) -> Result<BarSeries, LoadError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let series = read_bars_csv(file)?;
    debug!(path = %path.display(), bars = series.len(), "loaded bars");
    Ok(series)
}

/// Parse bars from CSV with a `timestamp,open,high,low,close,volume` header.
///
/// Rows may arrive in any order; duplicates are rejected.
pub fn read_bars_csv<R: Read>(reader: R) -> Result<BarSeries, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut bars = Vec::new();
    for (i, row) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = row?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| LoadError::Timestamp {
            row: i + 1,
            value: row.timestamp.clone(),
        })?;
        bars.push(Bar::new(
            timestamp,
            row.open.unwrap_or(row.close),
            row.high.unwrap_or(row.close),
            row.low.unwrap_or(row.close),
            row.close,
            row.volume.unwrap_or(0.0),
        ));
    }
    Ok(BarSeries::from_unsorted(bars)?)
}

/// Accepts `YYYY-MM-DD HH:MM:SS`, the RFC 3339-ish `T` form, or a bare date.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    let s = s.trim();
    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Write bars in the format [`read_bars_csv`] accepts.
pub fn write_bars_csv(path: impl AsRef<Path>, bars: &BarSeries) -> Result<(), LoadError> {
    let mut wtr = csv::Writer::from_path(path.as_ref())?;
    wtr.write_record(["timestamp", "open", "high", "low", "close", "volume"])?;
    for bar in bars.bars() {
        wtr.write_record(&[
            bar.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
        ])?;
    }
    wtr.flush().map_err(|source| LoadError::Io {
        path: path.as_ref().to_path_buf(),
        source,
    })?;
    Ok(())
}

// ─── Forecasts ───

/// Column name holding realised values in a forecast CSV.
pub const Y_TRUE_COLUMN: &str = "y_true";

/// Parallel model forecasts, one column per model, plus optional actuals.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastTable {
    pub model_names: Vec<String>,
    pub forecasts: ForecastMatrix,
    pub y_true: Option<Vec<f64>>,
}

/// Read a forecast CSV. Every column except `y_true_column` is a model.
pub fn read_forecasts_csv<R: Read>(
    reader: R,
    y_true_column: &str,
) -> Result<ForecastTable, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let y_idx = headers.iter().position(|h| h == y_true_column);
    let model_names: Vec<String> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != y_idx)
        .map(|(_, h)| h.to_string())
        .collect();

    let mut rows = Vec::new();
    let mut y_true = Vec::new();
    for (r, record) in rdr.records().enumerate() {
        let record = record?;
        let mut row = Vec::with_capacity(model_names.len());
        for (i, field) in record.iter().enumerate() {
            let value: f64 = field.parse().map_err(|_| LoadError::Value {
                row: r + 1,
                column: headers.get(i).unwrap_or_default().to_string(),
                value: field.to_string(),
            })?;
            if Some(i) == y_idx {
                y_true.push(value);
            } else {
                row.push(value);
            }
        }
        rows.push(row);
    }

    Ok(ForecastTable {
        model_names,
        forecasts: ForecastMatrix::new(rows)?,
        y_true: y_idx.map(|_| y_true),
    })
}

pub fn load_forecasts_csv(
    path: impl AsRef<Path>,
    y_true_column: &str,
) -> Result<ForecastTable, LoadError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_forecasts_csv(file, y_true_column)
}

// ─── Synthetic ───

/// Parameters of the synthetic random walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub seed: u64,
    pub n_bars: usize,
    pub start: NaiveDateTime,
    pub frequency: BarFrequency,
    pub start_price: f64,
    /// Per-bar log drift, signed by the current regime.
    pub drift: f64,
    /// Half-width of the uniform per-bar log shock.
    pub volatility: f64,
    /// Probability per bar that the regime flips between up and down.
    pub regime_flip_prob: f64,
    /// Maximum intrabar extension beyond open/close, as a fraction.
    pub intrabar_range: f64,
    pub base_volume: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            n_bars: 500,
            start: NaiveDate::from_ymd_opt(2020, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or_default(),
            frequency: BarFrequency::DAILY,
            start_price: 100.0,
            drift: 0.001,
            volatility: 0.02,
            regime_flip_prob: 0.02,
            intrabar_range: 0.01,
            base_volume: 1_000_000.0,
        }
    }
}

/// Seeded mock-data source.
#[derive(Debug, Clone, Default)]
pub struct SyntheticBars {
    config: SyntheticConfig,
}

impl SyntheticBars {
    pub fn new(config: SyntheticConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// Generate bars for `symbol`. The RNG seed mixes the configured seed
    /// with the symbol, so symbols differ but each is reproducible.
    pub fn generate(&self, symbol: &str) -> Result<BarSeries, LoadError> {
        let c = &self.config;
        if !(c.start_price.is_finite() && c.start_price > 0.0) {
            return Err(BacktestError::invalid_params("synthetic start_price must be positive").into());
        }
        if !(0.0..1.0).contains(&c.intrabar_range) || !(0.0..=1.0).contains(&c.regime_flip_prob) {
            return Err(BacktestError::invalid_params(
                "synthetic intrabar_range must be in [0, 1) and regime_flip_prob in [0, 1]",
            )
            .into());
        }
        if !(c.volatility.is_finite() && c.volatility >= 0.0 && c.drift.is_finite()) {
            return Err(
                BacktestError::invalid_params("synthetic drift/volatility must be finite").into(),
            );
        }

        let mut hasher = blake3::Hasher::new();
        hasher.update(&c.seed.to_le_bytes());
        hasher.update(symbol.as_bytes());
        let mut rng = StdRng::from_seed(*hasher.finalize().as_bytes());

        let step = i64::try_from(c.frequency.seconds())
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| BacktestError::invalid_params("synthetic frequency is out of range"))?;
        let mut timestamp = c.start;
        let mut bars = Vec::with_capacity(c.n_bars);
        let mut price = c.start_price;
        let mut regime = 1.0_f64;

        for i in 0..c.n_bars {
            if i > 0 {
                timestamp = timestamp.checked_add_signed(step).ok_or_else(|| {
                    BacktestError::invalid_params(format!(
                        "synthetic timestamps overflow after {i} bars"
                    ))
                })?;
            }
            if rng.gen_bool(c.regime_flip_prob) {
                regime = -regime;
            }
            let shock = if c.volatility > 0.0 {
                rng.gen_range(-c.volatility..c.volatility)
            } else {
                0.0
            };
            let open = price;
            let close = open * (regime * c.drift + shock).exp();
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..=c.intrabar_range));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..=c.intrabar_range));
            let volume = c.base_volume.max(0.0) * rng.gen_range(0.5..1.5);

            bars.push(Bar::new(
                timestamp,
                open,
                high,
                low,
                close,
                volume,
            ));
            price = close;
        }

        Ok(BarSeries::new(bars)?)
    }
}

impl BarSource for SyntheticBars {
    fn fetch(&self, symbol: &str) -> Result<BarSeries, LoadError> {
        self.generate(symbol)
    }
}
