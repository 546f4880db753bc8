//! Order types and lifecycle states for the event-driven simulator.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

/// When a market order is eligible to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    /// Fill at the next bar's open price.
    MarketOnOpen,
    /// Fill at the submitting bar's close price.
    MarketOnClose,
}

/// Order lifecycle states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Submitted, waiting for its fill point.
    Pending,
    Filled,
    /// Still pending when the data ran out.
    Cancelled { reason: String },
    /// The broker refused the fill (e.g. insufficient cash).
    Rejected { reason: String },
}

/// A single market order. Quantity is resolved at fill time from the sizing
/// rule and the fill price, so the order only records intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub created_bar: usize,
    pub filled_bar: Option<usize>,
}

impl Order {
    pub fn new(id: u64, side: OrderSide, order_type: OrderType, created_bar: usize) -> Self {
        Self {
            id,
            side,
            order_type,
            status: OrderStatus::Pending,
            created_bar,
            filled_bar: None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, OrderStatus::Pending)
    }

    /// Whether the order may fill on `bar_index` under its order type.
    pub fn fills_on(&self, bar_index: usize) -> bool {
        match self.order_type {
            OrderType::MarketOnClose => bar_index == self.created_bar,
            OrderType::MarketOnOpen => bar_index > self.created_bar,
        }
    }
}

/// One executed fill, kept for diagnostics and trade extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: u64,
    pub bar_index: usize,
    pub side: OrderSide,
    pub quantity: f64,
    /// Price after slippage.
    pub price: f64,
    pub commission: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_on_open_waits_one_bar() {
        let order = Order::new(1, OrderSide::Buy, OrderType::MarketOnOpen, 5);
        assert!(!order.fills_on(5));
        assert!(order.fills_on(6));
    }

    #[test]
    fn market_on_close_fills_same_bar() {
        let order = Order::new(1, OrderSide::Sell, OrderType::MarketOnClose, 5);
        assert!(order.fills_on(5));
        assert!(!order.fills_on(6));
    }

    #[test]
    fn new_order_is_pending() {
        let order = Order::new(7, OrderSide::Buy, OrderType::MarketOnOpen, 0);
        assert!(order.is_active());
        assert_eq!(order.filled_bar, None);
    }
}
