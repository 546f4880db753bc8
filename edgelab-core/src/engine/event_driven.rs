//! Event-driven simulator: a bar-by-bar order state machine.
//!
//! Per bar:
//! 1. Start-of-bar: fill a pending market-on-open order at this bar's open
//! 2. Signal check: with no order pending, submit a buy (flat + entry) or a
//!    sell (holding + exit)
//! 3. End-of-bar: fill a market-on-close order at this bar's close
//! 4. Post-bar: mark to market
//!
//! At most one order is pending at a time; signals arriving while one is
//! pending are ignored. An order still pending after the last bar is cancelled.

use tracing::{debug, info, warn};

use crate::domain::{Bar, BarSeries, Order, OrderSide, OrderStatus, OrderType, SignalPair, SignalTag};
use crate::error::Result;
use crate::result::{BacktestResult, EquityPoint};

use super::{prepare_signals, BacktestParams, Broker, Engine, FillPolicy};

pub fn run(bars: &BarSeries, signals: SignalPair, params: &BacktestParams) -> Result<BacktestResult> {
    params.validate()?;
    let strategy_name = signals.source.clone();
    let (signals, fallback_used) = prepare_signals(bars, signals, params)?;

    let order_type = match params.fill_policy {
        FillPolicy::NextOpen => OrderType::MarketOnOpen,
        FillPolicy::CurrentClose => OrderType::MarketOnClose,
    };

    let mut broker = Broker::new(params);
    let mut orders: Vec<Order> = Vec::new();
    let mut pending: Option<Order> = None;
    let mut equity_curve = Vec::with_capacity(bars.len());

    for (t, bar) in bars.bars().iter().enumerate() {
        // ─── Start-of-bar ───
        if let Some(order) = pending.take() {
            if order.order_type == OrderType::MarketOnOpen && order.fills_on(t) {
                orders.push(execute(&mut broker, order, t, bar, bar.open)?);
            } else {
                pending = Some(order);
            }
        }

        // ─── Signal check ───
        if pending.is_none() {
            let side = if broker.is_flat() && signals.entries[t] {
                Some(OrderSide::Buy)
            } else if !broker.is_flat() && signals.exits[t] {
                Some(OrderSide::Sell)
            } else {
                None
            };
            if let Some(side) = side {
                let id = orders.len() as u64 + 1;
                debug!(bar_index = t, order_id = id, ?side, ?order_type, "order submitted");
                pending = Some(Order::new(id, side, order_type, t));
            }
        }

        // ─── End-of-bar ───
        if let Some(order) = pending.take() {
            if order.order_type == OrderType::MarketOnClose && order.fills_on(t) {
                orders.push(execute(&mut broker, order, t, bar, bar.close)?);
            } else {
                pending = Some(order);
            }
        }

        // ─── Post-bar ───
        equity_curve.push(EquityPoint {
            timestamp: bar.timestamp,
            value: broker.mark(t, bar.close)?,
            signal: SignalTag::Hold,
        });
    }

    if let Some(mut order) = pending {
        info!(order_id = order.id, side = ?order.side, "order still pending at end of data, cancelled");
        order.status = OrderStatus::Cancelled {
            reason: "end of data".into(),
        };
        orders.push(order);
    }

    let (trades, fills) = broker.into_parts();
    Ok(BacktestResult {
        strategy_name,
        engine: Engine::EventDriven,
        init_cash: params.init_cash,
        frequency: params.frequency,
        fallback_used,
        equity_curve,
        trades,
        orders,
        fills,
    })
}

/// Fill `order` at `raw_price`, or reject it when the buy can't be afforded.
fn execute(broker: &mut Broker, mut order: Order, t: usize, bar: &Bar, raw_price: f64) -> Result<Order> {
    match order.side {
        OrderSide::Buy => {
            if broker.buy(order.id, t, bar, raw_price)?.is_none() {
                warn!(
                    order_id = order.id,
                    bar_index = t,
                    cash = broker.cash(),
                    "buy rejected, insufficient cash"
                );
                order.status = OrderStatus::Rejected {
                    reason: "insufficient cash".into(),
                };
                return Ok(order);
            }
        }
        OrderSide::Sell => {
            broker.sell(order.id, t, bar, raw_price)?;
        }
    }
    order.status = OrderStatus::Filled;
    order.filled_bar = Some(t);
    Ok(order)
}
