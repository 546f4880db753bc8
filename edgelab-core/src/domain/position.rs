use serde::{Deserialize, Serialize};

use crate::error::{BacktestError, Result};

/// Long-only position held by a single simulator run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub quantity: f64,
    pub avg_entry_price: f64,
}

impl Position {
    pub fn flat() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.quantity > 0.0
    }

    pub fn market_value(&self, current_price: f64) -> f64 {
        self.quantity * current_price
    }

    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        self.quantity * (current_price - self.avg_entry_price)
    }

    /// Add to the position, updating the average entry price.
    pub fn add(&mut self, quantity: f64, price: f64, bar_index: usize) -> Result<()> {
        if quantity.is_nan() || quantity <= 0.0 || !price.is_finite() {
            return Err(BacktestError::simulation(
                bar_index,
                format!("cannot add quantity {quantity} at price {price}"),
            ));
        }
        let total = self.quantity + quantity;
        self.avg_entry_price =
            (self.avg_entry_price * self.quantity + price * quantity) / total;
        self.quantity = total;
        Ok(())
    }

    /// Remove the whole position, returning the closed quantity.
    pub fn close(&mut self, bar_index: usize) -> Result<f64> {
        if self.quantity < 0.0 {
            return Err(BacktestError::simulation(
                bar_index,
                format!("negative quantity {}", self.quantity),
            ));
        }
        let qty = self.quantity;
        *self = Self::flat();
        Ok(qty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_updates_average_price() {
        let mut pos = Position::flat();
        pos.add(10.0, 100.0, 0).unwrap();
        pos.add(10.0, 110.0, 1).unwrap();
        assert_eq!(pos.quantity, 20.0);
        assert!((pos.avg_entry_price - 105.0).abs() < 1e-12);
        assert!((pos.unrealized_pnl(120.0) - 300.0).abs() < 1e-9);
    }

    #[test]
    fn close_returns_quantity_and_flattens() {
        let mut pos = Position::flat();
        pos.add(5.0, 10.0, 0).unwrap();
        assert_eq!(pos.close(3).unwrap(), 5.0);
        assert!(!pos.is_open());
        assert_eq!(pos, Position::flat());
    }

    #[test]
    fn rejects_non_positive_add() {
        let mut pos = Position::flat();
        assert!(matches!(
            pos.add(0.0, 10.0, 4),
            Err(BacktestError::Simulation { bar_index: 4, .. })
        ));
        assert!(pos.add(-1.0, 10.0, 4).is_err());
    }

    #[test]
    fn negative_quantity_is_a_simulation_error() {
        let mut pos = Position {
            quantity: -1.0,
            avg_entry_price: 10.0,
        };
        assert!(pos.close(9).is_err());
    }
}
