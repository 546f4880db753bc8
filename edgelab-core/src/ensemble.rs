//! Forecast ensemble: merge parallel model forecasts into one series.
//!
//! A [`ForecastMatrix`] holds one row per time step and one column per model.
//! The combination policy is fixed at construction; `fit` only matters for
//! `WeightedAvg`, where it derives inverse-MAE weights from observed values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BacktestError, Result};

/// Rows = time steps, columns = models. All rows have the same width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct ForecastMatrix {
    rows: Vec<Vec<f64>>,
    n_models: usize,
}

impl ForecastMatrix {
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n_models = rows
            .first()
            .map(|r| r.len())
            .ok_or_else(|| BacktestError::invalid_input("forecast matrix has no rows"))?;
        if n_models == 0 {
            return Err(BacktestError::invalid_input("forecast matrix has no model columns"));
        }
        for (t, row) in rows.iter().enumerate() {
            if row.len() != n_models {
                return Err(BacktestError::invalid_input(format!(
                    "forecast row {t} has {} values, expected {n_models}",
                    row.len()
                )));
            }
            if let Some(v) = row.iter().find(|v| !v.is_finite()) {
                return Err(BacktestError::invalid_input(format!(
                    "forecast row {t} contains non-finite value {v}"
                )));
            }
        }
        Ok(Self { rows, n_models })
    }

    /// Build from one series per model. Series must be equal length.
    pub fn from_columns(columns: &[Vec<f64>]) -> Result<Self> {
        let n_steps = columns
            .first()
            .map(|c| c.len())
            .ok_or_else(|| BacktestError::invalid_input("no forecast series given"))?;
        if let Some((m, c)) = columns.iter().enumerate().find(|(_, c)| c.len() != n_steps) {
            return Err(BacktestError::invalid_input(format!(
                "forecast series {m} has length {}, expected {n_steps}",
                c.len()
            )));
        }
        let rows = (0..n_steps)
            .map(|t| columns.iter().map(|c| c[t]).collect())
            .collect();
        Self::new(rows)
    }

    pub fn n_steps(&self) -> usize {
        self.rows.len()
    }

    pub fn n_models(&self) -> usize {
        self.n_models
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn column(&self, model: usize) -> Vec<f64> {
        self.rows.iter().map(|r| r[model]).collect()
    }
}

impl TryFrom<Vec<Vec<f64>>> for ForecastMatrix {
    type Error = BacktestError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self> {
        Self::new(rows)
    }
}

impl From<ForecastMatrix> for Vec<Vec<f64>> {
    fn from(m: ForecastMatrix) -> Self {
        m.rows
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinePolicy {
    Mean,
    GeometricMean,
    WeightedAvg,
}

impl CombinePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CombinePolicy::Mean => "mean",
            CombinePolicy::GeometricMean => "geometric_mean",
            CombinePolicy::WeightedAvg => "weighted_avg",
        }
    }
}

impl fmt::Display for CombinePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CombinePolicy {
    type Err = BacktestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "mean" => Ok(CombinePolicy::Mean),
            "geometric_mean" => Ok(CombinePolicy::GeometricMean),
            "weighted_avg" => Ok(CombinePolicy::WeightedAvg),
            other => Err(BacktestError::invalid_params(format!(
                "unknown ensemble method '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ensemble {
    policy: CombinePolicy,
    /// Normalized weights, one per model. Only used by `WeightedAvg`.
    weights: Option<Vec<f64>>,
    /// Set when weights were supplied up front rather than fitted.
    explicit: bool,
}

impl Ensemble {
    pub fn new(policy: CombinePolicy) -> Self {
        Self {
            policy,
            weights: None,
            explicit: false,
        }
    }

    /// `WeightedAvg` with fixed weights. Weights are normalized to sum to 1.
    pub fn with_weights(weights: Vec<f64>) -> Result<Self> {
        Ok(Self {
            policy: CombinePolicy::WeightedAvg,
            weights: Some(normalize(weights)?),
            explicit: true,
        })
    }

    pub fn policy(&self) -> CombinePolicy {
        self.policy
    }

    pub fn weights(&self) -> Option<&[f64]> {
        self.weights.as_deref()
    }

    /// Prepare the ensemble for `predict`.
    ///
    /// For `WeightedAvg` without explicit weights, `y_true` is required and
    /// weights become `(1/MAE_i) / Σ(1/MAE_j)`. Explicit weights take
    /// precedence over `y_true`.
    pub fn fit(&mut self, forecasts: &ForecastMatrix, y_true: Option<&[f64]>) -> Result<&mut Self> {
        if self.policy != CombinePolicy::WeightedAvg {
            return Ok(self);
        }
        if self.explicit {
            self.check_width(forecasts)?;
            if y_true.is_some() {
                debug!("explicit ensemble weights set, ignoring y_true");
            }
            return Ok(self);
        }
        let y = y_true.ok_or_else(|| {
            BacktestError::invalid_input("y_true must be provided to fit weighted_avg weights")
        })?;
        if y.len() != forecasts.n_steps() {
            return Err(BacktestError::invalid_input(format!(
                "y_true has {} values, forecasts have {} steps",
                y.len(),
                forecasts.n_steps()
            )));
        }
        let maes: Vec<f64> = (0..forecasts.n_models())
            .map(|m| {
                forecasts
                    .rows()
                    .iter()
                    .zip(y)
                    .map(|(row, actual)| (row[m] - actual).abs())
                    .sum::<f64>()
                    / y.len() as f64
            })
            .collect();
        let weights = inverse_mae_weights(&maes);
        debug!(?maes, ?weights, "fitted inverse-MAE weights");
        self.weights = Some(weights);
        Ok(self)
    }

    /// Combine each row of `forecasts` into one value.
    pub fn predict(&self, forecasts: &ForecastMatrix) -> Result<Vec<f64>> {
        match self.policy {
            CombinePolicy::Mean => Ok(forecasts
                .rows()
                .iter()
                .map(|r| r.iter().sum::<f64>() / r.len() as f64)
                .collect()),
            CombinePolicy::GeometricMean => forecasts
                .rows()
                .iter()
                .enumerate()
                .map(|(t, r)| {
                    if let Some(v) = r.iter().find(|&&v| v <= 0.0) {
                        return Err(BacktestError::invalid_input(format!(
                            "geometric mean needs positive forecasts, row {t} has {v}"
                        )));
                    }
                    let log_mean = r.iter().map(|v| v.ln()).sum::<f64>() / r.len() as f64;
                    Ok(log_mean.exp())
                })
                .collect(),
            CombinePolicy::WeightedAvg => {
                let weights = self.weights.as_deref().ok_or_else(|| {
                    BacktestError::NotFitted(
                        "weights not defined; call fit() or provide weights".into(),
                    )
                })?;
                self.check_width(forecasts)?;
                Ok(forecasts
                    .rows()
                    .iter()
                    .map(|r| r.iter().zip(weights).map(|(v, w)| v * w).sum())
                    .collect())
            }
        }
    }

    fn check_width(&self, forecasts: &ForecastMatrix) -> Result<()> {
        match &self.weights {
            Some(w) if w.len() != forecasts.n_models() => {
                Err(BacktestError::invalid_input(format!(
                    "{} weights for {} models",
                    w.len(),
                    forecasts.n_models()
                )))
            }
            _ => Ok(()),
        }
    }
}

fn normalize(weights: Vec<f64>) -> Result<Vec<f64>> {
    if weights.is_empty() {
        return Err(BacktestError::invalid_params("weights are empty"));
    }
    if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(BacktestError::invalid_params(format!(
            "weights must be finite and non-negative, got {w}"
        )));
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(BacktestError::invalid_params("weights sum to zero"));
    }
    Ok(weights.into_iter().map(|w| w / total).collect())
}

/// Inverse-MAE weights. A model with zero error would get infinite weight, so
/// the zero-error models split the whole weight equally instead.
fn inverse_mae_weights(maes: &[f64]) -> Vec<f64> {
    let perfect = maes.iter().filter(|&&m| m == 0.0).count();
    if perfect > 0 {
        return maes
            .iter()
            .map(|&m| if m == 0.0 { 1.0 / perfect as f64 } else { 0.0 })
            .collect();
    }
    let total: f64 = maes.iter().map(|m| 1.0 / m).sum();
    maes.iter().map(|m| (1.0 / m) / total).collect()
}
