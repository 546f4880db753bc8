//! Cost model: slippage and commission as fractions of notional.
//!
//! Slippage is directional: buyers pay more, sellers receive less.
//! Commission is symmetric per side.

use serde::{Deserialize, Serialize};

use crate::domain::OrderSide;
use crate::error::{BacktestError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    /// Commission as a fraction of fill notional (0.001 = 10 bps).
    pub fee_rate: f64,
    /// Adverse price move as a fraction of the raw price.
    pub slippage_rate: f64,
}

impl CostModel {
    pub fn new(fee_rate: f64, slippage_rate: f64) -> Result<Self> {
        for (name, rate) in [("fee_rate", fee_rate), ("slippage_rate", slippage_rate)] {
            if !(0.0..1.0).contains(&rate) {
                return Err(BacktestError::invalid_params(format!(
                    "{name} must be in [0, 1), got {rate}"
                )));
            }
        }
        Ok(Self {
            fee_rate,
            slippage_rate,
        })
    }

    pub fn frictionless() -> Self {
        Self {
            fee_rate: 0.0,
            slippage_rate: 0.0,
        }
    }

    /// Apply slippage to a raw fill price.
    pub fn fill_price(&self, raw_price: f64, side: OrderSide) -> f64 {
        match side {
            OrderSide::Buy => raw_price * (1.0 + self.slippage_rate),
            OrderSide::Sell => raw_price * (1.0 - self.slippage_rate),
        }
    }

    /// `commission = fill_price * quantity * fee_rate`
    pub fn commission(&self, fill_price: f64, quantity: f64) -> f64 {
        fill_price * quantity * self.fee_rate
    }

    /// Cash consumed per unit bought at `fill_price`, commission included.
    pub fn unit_cost(&self, fill_price: f64) -> f64 {
        fill_price * (1.0 + self.fee_rate)
    }
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            fee_rate: 0.001,
            slippage_rate: 0.001,
        }
    }
}
