//! Bar and BarSeries: the fundamental market data unit and its validated container.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{BacktestError, Result};

/// One OHLCV observation for a fixed interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: NaiveDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Returns true if every OHLCV field is finite and non-negative.
    pub fn is_valid(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }

    /// Close-to-close direction relative to a previous bar.
    pub fn is_up_from(&self, prev: &Bar) -> bool {
        self.close > prev.close
    }

    pub fn is_down_from(&self, prev: &Bar) -> bool {
        self.close < prev.close
    }
}

/// Time-ordered, validated sequence of bars.
///
/// Invariants: at least one bar, strictly increasing timestamps, every bar
/// finite and non-negative. The only way to build one is [`BarSeries::new`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(bars: Vec<Bar>) -> Result<Self> {
        if bars.is_empty() {
            return Err(BacktestError::invalid_input("bar series is empty"));
        }
        for (i, bar) in bars.iter().enumerate() {
            if !bar.is_valid() {
                return Err(BacktestError::invalid_input(format!(
                    "bar {i} at {} has a non-finite or negative field",
                    bar.timestamp
                )));
            }
        }
        for (i, pair) in bars.windows(2).enumerate() {
            if pair[1].timestamp == pair[0].timestamp {
                return Err(BacktestError::invalid_input(format!(
                    "duplicate timestamp {} at bar {}",
                    pair[1].timestamp,
                    i + 1
                )));
            }
            if pair[1].timestamp < pair[0].timestamp {
                return Err(BacktestError::invalid_input(format!(
                    "bars out of order at index {}: {} < {}",
                    i + 1,
                    pair[1].timestamp,
                    pair[0].timestamp
                )));
            }
        }
        Ok(Self { bars })
    }

    /// Sort by timestamp first, then validate. Duplicates are still rejected.
    pub fn from_unsorted(mut bars: Vec<Bar>) -> Result<Self> {
        bars.sort_by_key(|b| b.timestamp);
        Self::new(bars)
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always false for a constructed series; provided for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn first(&self) -> &Bar {
        &self.bars[0]
    }

    pub fn last(&self) -> &Bar {
        &self.bars[self.bars.len() - 1]
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }

    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.bars.iter().map(|b| b.timestamp).collect()
    }

    /// Fail with `InvalidInput` unless the series has at least `required` bars.
    pub fn require_len(&self, required: usize, purpose: &str) -> Result<()> {
        if self.bars.len() < required {
            return Err(BacktestError::invalid_input(format!(
                "{purpose} needs at least {required} bars, got {}",
                self.bars.len()
            )));
        }
        Ok(())
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }
}

impl<'de> Deserialize<'de> for BarSeries {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            bars: Vec<Bar>,
        }
        let raw = Raw::deserialize(deserializer)?;
        BarSeries::new(raw.bars).map_err(serde::de::Error::custom)
    }
}

/// Build a daily series from closes for tests: open = previous close,
/// high/low = max/min(open, close) ± 1, volume = 1000.
#[cfg(test)]
pub(crate) fn series_from_closes(closes: &[f64]) -> BarSeries {
    let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar::new(
                base + chrono::Duration::days(i as i64),
                open,
                open.max(close) + 1.0,
                (open.min(close) - 1.0).max(0.0),
                close,
                1000.0,
            )
        })
        .collect();
    BarSeries::new(bars).unwrap()
}
