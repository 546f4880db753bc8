//! Error taxonomy shared by the strategies, simulators and ensemble.
//!
//! Input and parameter errors are raised before a simulation starts. A run
//! that hits `Simulation` is discarded whole; no partial result is returned.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BacktestError {
    /// Malformed or insufficient bar / forecast data.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Out-of-domain or mutually exclusive strategy / sizing parameters.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// The wrapped classifier could not be loaded or failed to predict.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// Ensemble `predict` called before `fit` and without explicit weights.
    #[error("ensemble not fitted: {0}")]
    NotFitted(String),

    /// Internal invariant violation during a run (e.g. negative quantity).
    #[error("simulation error at bar {bar_index}: {reason}")]
    Simulation { bar_index: usize, reason: String },
}

impl BacktestError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::InvalidParameters(msg.into())
    }

    pub fn simulation(bar_index: usize, reason: impl Into<String>) -> Self {
        Self::Simulation {
            bar_index,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BacktestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulation_error_mentions_bar() {
        let err = BacktestError::simulation(17, "negative quantity");
        assert_eq!(
            err.to_string(),
            "simulation error at bar 17: negative quantity"
        );
    }

    #[test]
    fn helpers_build_expected_variants() {
        assert!(matches!(
            BacktestError::invalid_input("x"),
            BacktestError::InvalidInput(_)
        ));
        assert!(matches!(
            BacktestError::invalid_params("x"),
            BacktestError::InvalidParameters(_)
        ));
    }
}
