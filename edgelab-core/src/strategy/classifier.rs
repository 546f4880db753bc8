//! Classifier-driven strategy.
//!
//! Each bar becomes a fixed 14-wide feature row (see [`FEATURE_NAMES`]). Rows
//! with a warmup NaN are skipped; complete rows are optionally scaled and sent
//! to a trained classifier, whose positive-class probability is compared
//! against a threshold. Above the threshold enters, anything else exits.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{BarSeries, SignalPair};
use crate::error::{BacktestError, Result};
use crate::indicators::{
    Indicator, IndicatorValues, PctChange, PriceField, RollingStd, Sma, VolumeRatio,
};

use super::SignalGenerator;

/// Column order of a feature row.
pub const FEATURE_NAMES: [&str; 14] = [
    "open",
    "high",
    "low",
    "close",
    "volume",
    "sma_5",
    "sma_10",
    "sma_20",
    "return_1",
    "return_5",
    "std_5",
    "std_10",
    "volume_sma_5",
    "volume_ratio_5",
];

/// Longest lookback among the features (SMA 20).
const FEATURE_WARMUP: usize = 20;

pub const CLASSIFIER_NAME: &str = "ML_Classifier";

/// Build one feature row per bar. Warmup rows contain NaN.
pub fn build_features(bars: &BarSeries) -> Vec<Vec<f64>> {
    let sma5 = Sma::new(5);
    let sma10 = Sma::new(10);
    let sma20 = Sma::new(20);
    let ret1 = PctChange::new(1);
    let ret5 = PctChange::new(5);
    let std5 = RollingStd::new(5);
    let std10 = RollingStd::new(10);
    let vol_sma5 = Sma::on(5, PriceField::Volume);
    let vol_ratio = VolumeRatio::new(5);
    let derived: [&dyn Indicator; 9] = [
        &sma5, &sma10, &sma20, &ret1, &ret5, &std5, &std10, &vol_sma5, &vol_ratio,
    ];
    let iv = IndicatorValues::precompute(bars.bars(), &derived);

    bars.bars()
        .iter()
        .enumerate()
        .map(|(i, b)| {
            let mut row = vec![b.open, b.high, b.low, b.close, b.volume];
            row.extend(
                derived
                    .iter()
                    .map(|ind| iv.get(ind.name(), i).unwrap_or(f64::NAN)),
            );
            row
        })
        .collect()
}

/// A trained predictor. Only inference is in scope.
pub trait Classifier: Send + Sync {
    /// One class label per row.
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<i64>>;

    /// Class probabilities per row, if the model provides them.
    fn predict_proba(&self, _rows: &[Vec<f64>]) -> Result<Option<Vec<Vec<f64>>>> {
        Ok(None)
    }
}

/// Per-feature transform applied before prediction.
pub trait FeatureScaler: Send + Sync {
    fn transform(&self, rows: &mut [Vec<f64>]) -> Result<()>;
}

/// Standardise each column to zero mean and unit variance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit on rows using the population standard deviation. Zero-variance
    /// columns get a scale of 1.
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let width = rows
            .first()
            .map(|r| r.len())
            .ok_or_else(|| BacktestError::invalid_input("cannot fit a scaler on zero rows"))?;
        if rows.iter().any(|r| r.len() != width) {
            return Err(BacktestError::invalid_input("scaler rows differ in width"));
        }
        let n = rows.len() as f64;
        let mean: Vec<f64> = (0..width)
            .map(|c| rows.iter().map(|r| r[c]).sum::<f64>() / n)
            .collect();
        let scale = (0..width)
            .map(|c| {
                let var = rows.iter().map(|r| (r[c] - mean[c]).powi(2)).sum::<f64>() / n;
                let sd = var.sqrt();
                if sd == 0.0 {
                    1.0
                } else {
                    sd
                }
            })
            .collect();
        Ok(Self { mean, scale })
    }
}

impl FeatureScaler for StandardScaler {
    fn transform(&self, rows: &mut [Vec<f64>]) -> Result<()> {
        if self.mean.len() != self.scale.len() {
            return Err(BacktestError::invalid_params(
                "scaler mean and scale differ in length",
            ));
        }
        for row in rows.iter_mut() {
            if row.len() != self.mean.len() {
                return Err(BacktestError::invalid_input(format!(
                    "feature row has {} columns, scaler expects {}",
                    row.len(),
                    self.mean.len()
                )));
            }
            for ((v, m), s) in row.iter_mut().zip(&self.mean).zip(&self.scale) {
                *v = (*v - m) / s;
            }
        }
        Ok(())
    }
}

/// Binary logistic regression over the feature row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub weights: Vec<f64>,
    pub intercept: f64,
}

impl LogisticModel {
    fn probability(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.weights.len() {
            return Err(BacktestError::ModelUnavailable(format!(
                "model expects {} features, got {}",
                self.weights.len(),
                row.len()
            )));
        }
        let z = self.intercept
            + row
                .iter()
                .zip(&self.weights)
                .map(|(x, w)| x * w)
                .sum::<f64>();
        Ok(1.0 / (1.0 + (-z).exp()))
    }
}

impl Classifier for LogisticModel {
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<i64>> {
        rows.iter()
            .map(|r| self.probability(r).map(|p| i64::from(p > 0.5)))
            .collect()
    }

    fn predict_proba(&self, rows: &[Vec<f64>]) -> Result<Option<Vec<Vec<f64>>>> {
        let probs = rows
            .iter()
            .map(|r| self.probability(r).map(|p| vec![1.0 - p, p]))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(probs))
    }
}

/// A classifier plus the scaler it was trained with.
#[derive(Clone)]
pub struct LoadedModel {
    pub classifier: Arc<dyn Classifier>,
    pub scaler: Option<Arc<dyn FeatureScaler>>,
}

impl fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModel")
            .field("has_scaler", &self.scaler.is_some())
            .finish_non_exhaustive()
    }
}

/// Resolves a model reference (path, key) into a ready classifier.
///
/// Any failure surfaces as `ModelUnavailable`.
pub trait ModelLoader: Send + Sync {
    fn load(&self, reference: &str) -> Result<LoadedModel>;
}

#[derive(Debug, Clone)]
pub struct ClassifierStrategy {
    model: LoadedModel,
    threshold: f64,
}

impl ClassifierStrategy {
    pub const DEFAULT_THRESHOLD: f64 = 0.5;

    pub fn new(model: LoadedModel, threshold: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(BacktestError::invalid_params(format!(
                "classifier threshold must be in [0, 1], got {threshold}"
            )));
        }
        Ok(Self { model, threshold })
    }

    pub fn from_loader(loader: &dyn ModelLoader, reference: &str, threshold: f64) -> Result<Self> {
        let model = loader.load(reference).map_err(|e| match e {
            BacktestError::ModelUnavailable(_) => e,
            other => BacktestError::ModelUnavailable(format!("{reference}: {other}")),
        })?;
        Self::new(model, threshold)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Positive-class score per row: probability when available, else 0/1 from labels.
    fn scores(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        let unavailable = |e: BacktestError| match e {
            BacktestError::ModelUnavailable(_) => e,
            other => BacktestError::ModelUnavailable(format!("prediction failed: {other}")),
        };

        let scores = match self.model.classifier.predict_proba(rows).map_err(unavailable)? {
            Some(probs) => probs
                .iter()
                .map(|p| match p.len() {
                    0 => Err(BacktestError::ModelUnavailable(
                        "classifier returned an empty probability row".into(),
                    )),
                    1 => Ok(p[0]),
                    2 => Ok(p[1]),
                    _ => Ok(p.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
                })
                .collect::<Result<Vec<_>>>()?,
            None => {
                let labels = self.model.classifier.predict(rows).map_err(unavailable)?;
                // Labels are hard decisions: 1 clears any threshold, other labels never do.
                labels
                    .iter()
                    .map(|&l| if l == 1 { f64::INFINITY } else { f64::NEG_INFINITY })
                    .collect()
            }
        };

        if scores.len() != rows.len() {
            return Err(BacktestError::ModelUnavailable(format!(
                "classifier returned {} predictions for {} rows",
                scores.len(),
                rows.len()
            )));
        }
        Ok(scores)
    }
}

impl SignalGenerator for ClassifierStrategy {
    fn name(&self) -> &str {
        CLASSIFIER_NAME
    }

    fn warmup_bars(&self) -> usize {
        FEATURE_WARMUP
    }

    fn generate_signals(&self, bars: &BarSeries) -> Result<SignalPair> {
        bars.require_len(self.warmup_bars(), CLASSIFIER_NAME)?;
        if bars.bars().iter().all(|b| b.volume == 0.0) {
            return Err(BacktestError::invalid_params(
                "classifier features need a volume column, every bar has zero volume",
            ));
        }

        let features = build_features(bars);
        let (indices, mut rows): (Vec<usize>, Vec<Vec<f64>>) = features
            .into_iter()
            .enumerate()
            .filter(|(_, row)| row.iter().all(|v| v.is_finite()))
            .unzip();

        if rows.is_empty() {
            return Err(BacktestError::invalid_params(format!(
                "no bar has a complete feature row ({} bars)",
                bars.len()
            )));
        }
        let mut signals = SignalPair::empty(bars.len(), CLASSIFIER_NAME);
        if let Some(scaler) = &self.model.scaler {
            scaler.transform(&mut rows)?;
        }

        let scores = self.scores(&rows)?;
        for (&i, score) in indices.iter().zip(scores) {
            let enter = score > self.threshold;
            signals.entries[i] = enter;
            signals.exits[i] = !enter;
        }
        debug!(
            rows = indices.len(),
            entries = signals.entry_count(),
            "classifier signals generated"
        );
        Ok(signals)
    }
}
