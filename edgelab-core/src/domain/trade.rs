//! TradeRecord: a completed round trip.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A closed long round trip: entry → exit.
///
/// Created only when an exit closes an open position and never mutated after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    // ── Entry ──
    pub entry_bar: usize,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,

    // ── Exit ──
    pub exit_bar: usize,
    pub exit_time: NaiveDateTime,
    pub exit_price: f64,

    // ── Size & costs ──
    pub quantity: f64,
    /// Fees paid on both legs.
    pub fees: f64,

    // ── PnL ──
    pub gross_pnl: f64,
    pub net_pnl: f64,
}

impl TradeRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn close(
        entry_bar: usize,
        entry_time: NaiveDateTime,
        entry_price: f64,
        exit_bar: usize,
        exit_time: NaiveDateTime,
        exit_price: f64,
        quantity: f64,
        fees: f64,
    ) -> Self {
        let gross_pnl = (exit_price - entry_price) * quantity;
        Self {
            entry_bar,
            entry_time,
            entry_price,
            exit_bar,
            exit_time,
            exit_price,
            quantity,
            fees,
            gross_pnl,
            net_pnl: gross_pnl - fees,
        }
    }

    /// Realized return as a fraction of the entry notional.
    pub fn return_pct(&self) -> f64 {
        let cost = self.entry_price * self.quantity;
        if cost == 0.0 {
            return 0.0;
        }
        self.net_pnl / cost
    }

    pub fn is_winner(&self) -> bool {
        self.net_pnl > 0.0
    }

    pub fn bars_held(&self) -> usize {
        self.exit_bar.saturating_sub(self.entry_bar)
    }
}
