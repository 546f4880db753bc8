//! Persisted run records and the sinks that store them.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use edgelab_core::domain::TradeRecord;
use edgelab_core::engine::BacktestParams;
use edgelab_core::metrics::BacktestStats;
use edgelab_core::result::EquityPoint;

use crate::config::{RunId, StrategyConfig};

/// Current schema version for persisted records.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Everything stored for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub symbol: String,
    pub engine: String,
    pub strategy: StrategyConfig,
    pub params: BacktestParams,
    pub fallback_used: bool,
    pub stats: BacktestStats,
    /// Portfolio value per bar, tagged buy/sell/hold.
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<TradeRecord>,
}

/// Destination for finished runs.
pub trait ResultSink: Send + Sync {
    fn persist(&self, record: &ResultRecord) -> Result<(), SinkError>;
}

/// Writes `{dir}/{run_id}.json`.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    /// The directory is created if it doesn't exist.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, SinkError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|source| SinkError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn record_path(&self, run_id: &str) -> PathBuf {
        self.dir.join(format!("{run_id}.json"))
    }

    pub fn contains(&self, run_id: &str) -> bool {
        self.record_path(run_id).exists()
    }

    /// Read a stored record back. `None` if nothing was stored under `run_id`.
    pub fn get(&self, run_id: &str) -> Result<Option<ResultRecord>, SinkError> {
        let path = self.record_path(run_id);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path).map_err(|source| SinkError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Some(serde_json::from_str(&json)?))
    }
}

impl ResultSink for JsonFileSink {
    fn persist(&self, record: &ResultRecord) -> Result<(), SinkError> {
        let path = self.record_path(&record.run_id);
        let json = serde_json::to_string_pretty(record)?;
        std::fs::write(&path, json).map_err(|source| SinkError::Io {
            path: path.clone(),
            source,
        })?;
        info!(run_id = %record.run_id, path = %path.display(), "persisted result");
        Ok(())
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<ResultRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ResultRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ResultSink for MemorySink {
    fn persist(&self, record: &ResultRecord) -> Result<(), SinkError> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record.clone());
        Ok(())
    }
}
