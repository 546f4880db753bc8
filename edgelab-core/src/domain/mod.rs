//! Domain types for EdgeLab

pub mod bar;
pub mod frequency;
pub mod order;
pub mod position;
pub mod signal;
pub mod trade;

pub use bar::{Bar, BarSeries};
pub use frequency::BarFrequency;
pub use order::{Fill, Order, OrderSide, OrderStatus, OrderType};
pub use position::Position;
pub use signal::{SignalPair, SignalTag};
pub use trade::TradeRecord;
