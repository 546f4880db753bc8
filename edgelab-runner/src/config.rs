//! Serializable run configuration, read from TOML.
//!
//! ```toml
//! [backtest]
//! symbol = "BTCUSDT"
//! init_cash = 10000.0
//! fees = 0.001
//! slippage = 0.001
//! period = "1D"
//! percent_size = 0.5
//!
//! [strategy]
//! kind = "crossover"
//! fast = 20
//! slow = 50
//!
//! [engine]
//! kind = "event-driven"
//! fill_policy = "next-open"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use edgelab_core::domain::BarFrequency;
use edgelab_core::engine::{BacktestParams, CostModel, Engine, FillPolicy, Sizing};
use edgelab_core::strategy::{ClassifierStrategy, MaCrossover, ModelLoader, Strategy};
use edgelab_core::BacktestError;

/// Content hash of a [`BacktestConfig`].
pub type RunId = String;

/// Errors from reading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error(transparent)]
    Backtest(#[from] BacktestError),
}

/// Everything needed to reproduce one backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    #[serde(default)]
    pub backtest: BacktestSection,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub engine: EngineSection,
}

/// `[backtest]`: capital, costs, sizing, bar period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    pub symbol: String,
    pub init_cash: f64,
    /// Commission as a fraction of notional per fill.
    pub fees: f64,
    /// Adverse price move as a fraction of price per fill.
    pub slippage: f64,
    /// Bar period such as "1D", "4h" or "15m".
    pub period: String,
    pub fixed_size: Option<f64>,
    /// Fraction of equity per entry, in (0, 1].
    pub percent_size: Option<f64>,
    pub use_fallback: bool,
}

impl Default for BacktestSection {
    fn default() -> Self {
        let costs = CostModel::default();
        Self {
            symbol: "SYNTH".to_string(),
            init_cash: 10_000.0,
            fees: costs.fee_rate,
            slippage: costs.slippage_rate,
            period: "1D".to_string(),
            fixed_size: None,
            percent_size: None,
            use_fallback: true,
        }
    }
}

/// `[strategy]`, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    Crossover {
        #[serde(default = "default_fast")]
        fast: usize,
        #[serde(default = "default_slow")]
        slow: usize,
    },
    Momentum,
    Classifier {
        /// Path or cache key of the model artifact.
        model_path: String,
        #[serde(default = "default_threshold")]
        threshold: f64,
    },
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::Crossover {
            fast: default_fast(),
            slow: default_slow(),
        }
    }
}

fn default_fast() -> usize {
    20
}

fn default_slow() -> usize {
    50
}

fn default_threshold() -> f64 {
    ClassifierStrategy::DEFAULT_THRESHOLD
}

/// `[engine]`: simulator and fill point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// "vectorized", "event-driven" or "ml".
    pub kind: String,
    pub fill_policy: FillPolicy,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            kind: Engine::Vectorized.as_str().to_string(),
            fill_policy: FillPolicy::default(),
        }
    }
}

impl BacktestConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: BacktestConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Check every knob without touching any data.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backtest.symbol.trim().is_empty() {
            return Err(ConfigError::Invalid("backtest.symbol is empty".into()));
        }
        self.to_params()?.validate()?;
        let engine_name = self.engine.kind.trim().to_ascii_lowercase();
        match &self.strategy {
            StrategyConfig::Crossover { fast, slow } => {
                MaCrossover::new(*fast, *slow)?;
            }
            StrategyConfig::Momentum => {}
            StrategyConfig::Classifier {
                model_path,
                threshold,
            } => {
                if model_path.trim().is_empty() {
                    return Err(ConfigError::Invalid("strategy.model_path is empty".into()));
                }
                if !(0.0..=1.0).contains(threshold) {
                    return Err(ConfigError::Invalid(format!(
                        "strategy.threshold must be in [0, 1], got {threshold}"
                    )));
                }
            }
        }
        if engine_name == "ml" && !matches!(self.strategy, StrategyConfig::Classifier { .. }) {
            return Err(ConfigError::Invalid(
                "engine 'ml' requires strategy.kind = \"classifier\"".into(),
            ));
        }
        self.engine_kind()?;
        Ok(())
    }

    pub fn engine_kind(&self) -> Result<Engine, ConfigError> {
        Ok(self.engine.kind.parse::<Engine>()?)
    }

    pub fn frequency(&self) -> Result<BarFrequency, ConfigError> {
        Ok(self.backtest.period.parse::<BarFrequency>()?)
    }

    /// Engine parameters for this config.
    pub fn to_params(&self) -> Result<BacktestParams, ConfigError> {
        let b = &self.backtest;
        if !b.init_cash.is_finite() || b.init_cash <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "backtest.init_cash must be positive, got {}",
                b.init_cash
            )));
        }
        Ok(BacktestParams {
            init_cash: b.init_cash,
            costs: CostModel::new(b.fees, b.slippage)?,
            sizing: Sizing::from_options(b.fixed_size, b.percent_size)?,
            use_fallback: b.use_fallback,
            frequency: self.frequency()?,
            fill_policy: self.engine.fill_policy,
        })
    }

    /// Instantiate the strategy. A classifier needs a loader.
    pub fn build_strategy(
        &self,
        loader: Option<&dyn ModelLoader>,
    ) -> edgelab_core::Result<Strategy> {
        match &self.strategy {
            StrategyConfig::Crossover { fast, slow } => Strategy::crossover(*fast, *slow),
            StrategyConfig::Momentum => Ok(Strategy::momentum()),
            StrategyConfig::Classifier {
                model_path,
                threshold,
            } => {
                let loader = loader.ok_or_else(|| {
                    BacktestError::ModelUnavailable(format!(
                        "no model loader configured for '{model_path}'"
                    ))
                })?;
                Ok(Strategy::Classifier(ClassifierStrategy::from_loader(
                    loader, model_path, *threshold,
                )?))
            }
        }
    }

    /// Same config with a different crossover pair.
    pub fn with_crossover(&self, fast: usize, slow: usize) -> Self {
        let mut config = self.clone();
        config.strategy = StrategyConfig::Crossover { fast, slow };
        config
    }

    /// Deterministic hash of the canonical JSON form.
    ///
    /// Two runs with identical configs share a RunId.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json = serde_json::to_string(self)?;
        let hash = blake3::hash(json.as_bytes());
        Ok(hash.to_hex().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        [backtest]
        symbol = "ETHUSDT"
        init_cash = 5000.0
        fees = 0.002
        slippage = 0.0005
        period = "4h"
        percent_size = 0.5
        use_fallback = false

        [strategy]
        kind = "crossover"
        fast = 10
        slow = 30

        [engine]
        kind = "event-driven"
        fill_policy = "current-close"
    "#;

    #[test]
    fn parses_full_document() {
        let config = BacktestConfig::from_toml_str(FULL).unwrap();
        assert_eq!(config.backtest.symbol, "ETHUSDT");
        assert_eq!(
            config.strategy,
            StrategyConfig::Crossover { fast: 10, slow: 30 }
        );
        assert_eq!(config.engine_kind().unwrap(), Engine::EventDriven);

        let params = config.to_params().unwrap();
        assert_eq!(params.init_cash, 5000.0);
        assert_eq!(params.costs.fee_rate, 0.002);
        assert_eq!(params.sizing, Sizing::PercentOfEquity(0.5));
        assert!(!params.use_fallback);
        assert_eq!(params.frequency.seconds(), 4 * 3600);
        assert_eq!(params.fill_policy, FillPolicy::CurrentClose);
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = BacktestConfig::from_toml_str("").unwrap();
        assert_eq!(
            config.strategy,
            StrategyConfig::Crossover { fast: 20, slow: 50 }
        );
        assert_eq!(config.engine_kind().unwrap(), Engine::Vectorized);
        let params = config.to_params().unwrap();
        assert_eq!(params, BacktestParams::default());
    }

    #[test]
    fn crossover_periods_default_individually() {
        let config = BacktestConfig::from_toml_str("[strategy]\nkind = \"crossover\"\nfast = 5\n")
            .unwrap();
        assert_eq!(
            config.strategy,
            StrategyConfig::Crossover { fast: 5, slow: 50 }
        );
    }

    #[test]
    fn rejects_both_sizing_knobs() {
        let text = "[backtest]\nfixed_size = 1.0\npercent_size = 0.5\n";
        let err = BacktestConfig::from_toml_str(text).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Backtest(BacktestError::InvalidParameters(_))
        ));
    }

    #[test]
    fn rejects_unknown_engine_and_period() {
        assert!(BacktestConfig::from_toml_str("[engine]\nkind = \"quantum\"\n").is_err());
        assert!(BacktestConfig::from_toml_str("[backtest]\nperiod = \"1x\"\n").is_err());
    }

    #[test]
    fn ml_engine_requires_classifier() {
        let err = BacktestConfig::from_toml_str("[engine]\nkind = \"ml\"\n").unwrap_err();
        assert!(err.to_string().contains("classifier"));

        let text = "[strategy]\nkind = \"classifier\"\nmodel_path = \"m.json\"\n\n[engine]\nkind = \"ml\"\n";
        let config = BacktestConfig::from_toml_str(text).unwrap();
        assert_eq!(config.engine_kind().unwrap(), Engine::Vectorized);
    }

    #[test]
    fn rejects_zero_period_crossover_and_bad_threshold() {
        assert!(BacktestConfig::from_toml_str("[strategy]\nkind = \"crossover\"\nfast = 0\n").is_err());
        let text = "[strategy]\nkind = \"classifier\"\nmodel_path = \"m.json\"\nthreshold = 1.5\n";
        assert!(BacktestConfig::from_toml_str(text).is_err());
    }

    #[test]
    fn rejects_non_positive_cash() {
        let err = BacktestConfig::from_toml_str("[backtest]\ninit_cash = 0.0\n").unwrap_err();
        assert!(err.to_string().contains("init_cash"));
    }

    #[test]
    fn classifier_without_loader_is_model_unavailable() {
        let text = "[strategy]\nkind = \"classifier\"\nmodel_path = \"m.json\"\n";
        let config = BacktestConfig::from_toml_str(text).unwrap();
        assert!(matches!(
            config.build_strategy(None),
            Err(BacktestError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn run_id_deterministic() {
        let config = BacktestConfig::from_toml_str(FULL).unwrap();
        let id1 = config.run_id().unwrap();
        let id2 = config.run_id().unwrap();
        assert_eq!(id1, id2, "RunId should be deterministic");
        assert_eq!(id1.len(), 64);
    }

    #[test]
    fn run_id_changes_with_params() {
        let config = BacktestConfig::from_toml_str(FULL).unwrap();
        let other = config.with_crossover(15, 30);
        assert_ne!(config.run_id().unwrap(), other.run_id().unwrap());
    }

    #[test]
    fn toml_round_trip_preserves_config() {
        let config = BacktestConfig::from_toml_str(FULL).unwrap();
        let text = config.to_toml_string().unwrap();
        let back = BacktestConfig::from_toml_str(&text).unwrap();
        assert_eq!(back, config);
        assert_eq!(back.run_id().unwrap(), config.run_id().unwrap());
    }
}
