//! JSON model artifacts for the classifier strategy.
//!
//! An artifact is a logistic model plus an optional standard scaler:
//!
//! ```json
//! { "weights": [..14 values..], "intercept": -0.1,
//!   "scaler": { "mean": [..], "scale": [..] } }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use edgelab_core::strategy::{
    FeatureScaler, LoadedModel, LogisticModel, ModelLoader, StandardScaler, FEATURE_NAMES,
};
use edgelab_core::{BacktestError, Result};

use crate::artifact_cache::ArtifactCache;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    #[serde(flatten)]
    pub model: LogisticModel,
    #[serde(default)]
    pub scaler: Option<StandardScaler>,
}

impl ModelArtifact {
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    fn validate(&self) -> Result<()> {
        let width = FEATURE_NAMES.len();
        if self.model.weights.len() != width {
            return Err(BacktestError::ModelUnavailable(format!(
                "model has {} weights, feature vector has {width}",
                self.model.weights.len()
            )));
        }
        if let Some(scaler) = &self.scaler {
            if scaler.mean.len() != width || scaler.scale.len() != width {
                return Err(BacktestError::ModelUnavailable(format!(
                    "scaler width does not match the {width}-feature vector"
                )));
            }
            if scaler.scale.iter().any(|s| !s.is_finite() || *s == 0.0) {
                return Err(BacktestError::ModelUnavailable(
                    "scaler has a zero or non-finite scale".into(),
                ));
            }
        }
        Ok(())
    }

    fn into_loaded(self) -> LoadedModel {
        LoadedModel {
            classifier: Arc::new(self.model),
            scaler: self
                .scaler
                .map(|s| Arc::new(s) as Arc<dyn FeatureScaler>),
        }
    }
}

/// Loads [`ModelArtifact`] JSON files.
///
/// References are file paths, or cache keys when built
/// [`with_cache`](JsonModelLoader::with_cache).
#[derive(Clone, Default)]
pub struct JsonModelLoader {
    cache: Option<Arc<ArtifactCache>>,
}

impl JsonModelLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(cache: Arc<ArtifactCache>) -> Self {
        Self { cache: Some(cache) }
    }

    fn resolve(&self, reference: &str) -> Result<PathBuf> {
        match &self.cache {
            Some(cache) => cache
                .get_or_fetch(reference)
                .map_err(|e| BacktestError::ModelUnavailable(e.to_string())),
            None => Ok(PathBuf::from(reference)),
        }
    }
}

impl ModelLoader for JsonModelLoader {
    fn load(&self, reference: &str) -> Result<LoadedModel> {
        let path = self.resolve(reference)?;
        let text = std::fs::read_to_string(&path).map_err(|e| {
            BacktestError::ModelUnavailable(format!("{}: {e}", path.display()))
        })?;
        let artifact: ModelArtifact = serde_json::from_str(&text).map_err(|e| {
            BacktestError::ModelUnavailable(format!("{}: {e}", path.display()))
        })?;
        artifact.validate()?;
        debug!(
            path = %path.display(),
            scaled = artifact.scaler.is_some(),
            "loaded classifier artifact"
        );
        Ok(artifact.into_loaded())
    }
}
