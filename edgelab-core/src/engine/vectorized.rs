//! Vectorized simulator: one pass over the full signal arrays.
//!
//! Fills happen at the signal bar's close. While flat only entries are read;
//! while holding only exits are read. An open position at the last bar stays
//! marked to market and produces no trade.

use tracing::debug;

use crate::domain::{BarSeries, SignalPair};
use crate::error::Result;
use crate::result::{BacktestResult, EquityPoint};

use super::{prepare_signals, BacktestParams, Broker, Engine};

pub fn run(bars: &BarSeries, signals: SignalPair, params: &BacktestParams) -> Result<BacktestResult> {
    params.validate()?;
    let strategy_name = signals.source.clone();
    let (signals, fallback_used) = prepare_signals(bars, signals, params)?;

    let mut broker = Broker::new(params);
    let mut equity_curve = Vec::with_capacity(bars.len());
    let mut next_id = 0u64;

    for (i, bar) in bars.bars().iter().enumerate() {
        if broker.is_flat() {
            if signals.entries[i] {
                next_id += 1;
                if broker.buy(next_id, i, bar, bar.close)?.is_none() {
                    debug!(bar_index = i, cash = broker.cash(), "entry skipped, size not affordable");
                }
            }
        } else if signals.exits[i] {
            next_id += 1;
            broker.sell(next_id, i, bar, bar.close)?;
        }

        equity_curve.push(EquityPoint {
            timestamp: bar.timestamp,
            value: broker.mark(i, bar.close)?,
            signal: signals.tag_at(i),
        });
    }

    let (trades, fills) = broker.into_parts();
    Ok(BacktestResult {
        strategy_name,
        engine: Engine::Vectorized,
        init_cash: params.init_cash,
        frequency: params.frequency,
        fallback_used,
        equity_curve,
        trades,
        orders: Vec::new(),
        fills,
    })
}
