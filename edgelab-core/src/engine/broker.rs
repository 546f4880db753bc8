//! Cash, position and trade bookkeeping shared by both engines.
//!
//! The broker never decides *when* to trade; the engines do. It applies the
//! cost model and sizing rule to a raw price and keeps the accounting identity
//! `equity == cash + quantity * mark` intact.

use chrono::NaiveDateTime;
use tracing::debug;

use crate::domain::{Bar, Fill, OrderSide, Position, TradeRecord};
use crate::error::{BacktestError, Result};

use super::{BacktestParams, CostModel, Sizing};

/// Cash may dip below zero by at most this much from float rounding.
const CASH_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone)]
struct OpenLeg {
    bar_index: usize,
    time: NaiveDateTime,
    price: f64,
    commission: f64,
}

#[derive(Debug, Clone)]
pub struct Broker {
    cash: f64,
    position: Position,
    costs: CostModel,
    sizing: Sizing,
    open_leg: Option<OpenLeg>,
    trades: Vec<TradeRecord>,
    fills: Vec<Fill>,
}

impl Broker {
    pub fn new(params: &BacktestParams) -> Self {
        Self {
            cash: params.init_cash,
            position: Position::flat(),
            costs: params.costs,
            sizing: params.sizing,
            open_leg: None,
            trades: Vec::new(),
            fills: Vec::new(),
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn is_flat(&self) -> bool {
        !self.position.is_open()
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    /// Open a position at `raw_price` (before slippage).
    ///
    /// Returns `Ok(None)` when the sizing rule can't be afforded.
    pub fn buy(
        &mut self,
        order_id: u64,
        bar_index: usize,
        bar: &Bar,
        raw_price: f64,
    ) -> Result<Option<Fill>> {
        if self.position.is_open() {
            return Err(BacktestError::simulation(
                bar_index,
                "buy while a position is already open",
            ));
        }
        let price = self.costs.fill_price(raw_price, OrderSide::Buy);
        let equity = self.cash;
        let quantity = match self
            .sizing
            .quantity(self.cash, equity, self.costs.unit_cost(price))
        {
            Some(q) => q,
            None => return Ok(None),
        };

        let commission = self.costs.commission(price, quantity);
        self.cash -= price * quantity + commission;
        self.position.add(quantity, price, bar_index)?;
        self.check_cash(bar_index)?;

        self.open_leg = Some(OpenLeg {
            bar_index,
            time: bar.timestamp,
            price,
            commission,
        });
        let fill = Fill {
            order_id,
            bar_index,
            side: OrderSide::Buy,
            quantity,
            price,
            commission,
        };
        debug!(bar_index, quantity, price, commission, "buy filled");
        self.fills.push(fill.clone());
        Ok(Some(fill))
    }

    /// Close the whole position at `raw_price` and record the round trip.
    pub fn sell(&mut self, order_id: u64, bar_index: usize, bar: &Bar, raw_price: f64) -> Result<Fill> {
        let leg = self.open_leg.take().ok_or_else(|| {
            BacktestError::simulation(bar_index, "sell without an open position")
        })?;
        let price = self.costs.fill_price(raw_price, OrderSide::Sell);
        let quantity = self.position.close(bar_index)?;
        let commission = self.costs.commission(price, quantity);
        self.cash += price * quantity - commission;
        self.check_cash(bar_index)?;

        self.trades.push(TradeRecord::close(
            leg.bar_index,
            leg.time,
            leg.price,
            bar_index,
            bar.timestamp,
            price,
            quantity,
            leg.commission + commission,
        ));
        let fill = Fill {
            order_id,
            bar_index,
            side: OrderSide::Sell,
            quantity,
            price,
            commission,
        };
        debug!(bar_index, quantity, price, commission, "sell filled");
        self.fills.push(fill.clone());
        Ok(fill)
    }

    /// Mark to market at `close` and return equity.
    pub fn mark(&self, bar_index: usize, close: f64) -> Result<f64> {
        let equity = self.cash + self.position.market_value(close);
        if !equity.is_finite() {
            return Err(BacktestError::simulation(
                bar_index,
                format!("non-finite equity {equity}"),
            ));
        }
        Ok(equity)
    }

    /// Hand over the completed trades and every executed fill.
    pub fn into_parts(self) -> (Vec<TradeRecord>, Vec<Fill>) {
        (self.trades, self.fills)
    }

    fn check_cash(&self, bar_index: usize) -> Result<()> {
        if !self.cash.is_finite() || self.cash < -CASH_TOLERANCE {
            return Err(BacktestError::simulation(
                bar_index,
                format!("cash out of bounds: {}", self.cash),
            ));
        }
        if self.position.quantity < 0.0 {
            return Err(BacktestError::simulation(
                bar_index,
                format!("negative quantity {}", self.position.quantity),
            ));
        }
        Ok(())
    }
}
