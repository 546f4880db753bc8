//! Performance metrics: pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: equity curve and/or trade list in, scalar
//! out. Percent-valued metrics (total return, drawdown, win rate) are on a
//! 0..100 scale. No metric ever returns NaN or infinity.

use serde::{Deserialize, Serialize};

use crate::domain::TradeRecord;

/// Aggregate statistics for one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestStats {
    pub strategy_name: String,
    /// Percent gain over the initial cash.
    pub total_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    /// Largest peak-to-trough decline, as a positive percent.
    pub max_drawdown: f64,
    /// Percent of trades with positive net PnL.
    pub win_rate: f64,
    pub profit_factor: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub final_value: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
}

impl BacktestStats {
    pub fn compute(
        equity_curve: &[f64],
        trades: &[TradeRecord],
        init_cash: f64,
        periods_per_year: f64,
        strategy_name: &str,
    ) -> Self {
        let final_value = equity_curve.last().copied().unwrap_or(init_cash);
        let winning_trades = trades.iter().filter(|t| t.is_winner()).count();
        Self {
            strategy_name: strategy_name.to_string(),
            total_return: total_return(init_cash, final_value),
            sharpe_ratio: sharpe_ratio(equity_curve, periods_per_year),
            sortino_ratio: sortino_ratio(equity_curve, periods_per_year),
            calmar_ratio: calmar_ratio(equity_curve, init_cash, periods_per_year),
            max_drawdown: max_drawdown(equity_curve),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            total_trades: trades.len(),
            winning_trades,
            losing_trades: trades.len() - winning_trades,
            final_value,
            max_consecutive_wins: max_consecutive_wins(trades),
            max_consecutive_losses: max_consecutive_losses(trades),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return in percent: (final - initial) / initial × 100.
pub fn total_return(init_cash: f64, final_value: f64) -> f64 {
    if init_cash <= 0.0 {
        return 0.0;
    }
    (final_value - init_cash) / init_cash * 100.0
}

/// Annualized Sharpe ratio from per-bar returns (zero risk-free rate).
///
/// Sharpe = mean(returns) / std(returns) × √periods_per_year.
/// Returns 0.0 if variance is zero or there are fewer than 2 returns.
pub fn sharpe_ratio(equity_curve: &[f64], periods_per_year: f64) -> f64 {
    let returns = bar_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    (mean_f64(&returns) / std) * periods_per_year.sqrt()
}

/// Annualized Sortino ratio (downside deviation only).
///
/// Returns 0.0 if there is no downside or fewer than 2 returns.
pub fn sortino_ratio(equity_curve: &[f64], periods_per_year: f64) -> f64 {
    let returns = bar_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let downside_sq: f64 = returns
        .iter()
        .filter(|&&r| r < 0.0)
        .map(|r| r * r)
        .sum();
    let downside_std = (downside_sq / returns.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    (mean_f64(&returns) / downside_std) * periods_per_year.sqrt()
}

/// Annualized return (fraction) over the span of the curve.
pub fn annualized_return(equity_curve: &[f64], init_cash: f64, periods_per_year: f64) -> f64 {
    let final_value = match equity_curve.last() {
        Some(&v) => v,
        None => return 0.0,
    };
    if init_cash <= 0.0 || final_value <= 0.0 || periods_per_year <= 0.0 {
        return 0.0;
    }
    let years = equity_curve.len() as f64 / periods_per_year;
    (final_value / init_cash).powf(1.0 / years) - 1.0
}

/// Calmar ratio: annualized return / max drawdown (both as fractions).
///
/// Returns 0.0 if there is no drawdown or the annualized return is non-positive.
pub fn calmar_ratio(equity_curve: &[f64], init_cash: f64, periods_per_year: f64) -> f64 {
    let ann = annualized_return(equity_curve, init_cash, periods_per_year);
    let dd = max_drawdown(equity_curve) / 100.0;
    if dd <= 0.0 || ann <= 0.0 || !ann.is_finite() {
        return 0.0;
    }
    ann / dd
}

/// Maximum drawdown as a positive percent (e.g., 15.0 = 15% drawdown).
///
/// Returns 0.0 if equity never falls below a prior peak.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - eq) / peak);
        }
    }
    max_dd * 100.0
}

/// Percent of trades that were winners. 0.0 with no trades.
pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64 * 100.0
}

/// Profit factor: gross profits / gross losses.
///
/// 0.0 when there are no losing trades, so the value is always finite.
pub fn profit_factor(trades: &[TradeRecord]) -> f64 {
    let gross_profit: f64 = trades
        .iter()
        .filter(|t| t.net_pnl > 0.0)
        .map(|t| t.net_pnl)
        .sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.net_pnl < 0.0)
        .map(|t| t.net_pnl.abs())
        .sum();
    if gross_loss < 1e-12 {
        return 0.0;
    }
    gross_profit / gross_loss
}

pub fn max_consecutive_wins(trades: &[TradeRecord]) -> usize {
    max_consecutive(trades, true)
}

pub fn max_consecutive_losses(trades: &[TradeRecord]) -> usize {
    max_consecutive(trades, false)
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Simple returns between consecutive equity points.
pub fn bar_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1).
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn max_consecutive(trades: &[TradeRecord], winners: bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;
    for trade in trades {
        if trade.is_winner() == winners {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_trade(net_pnl: f64) -> TradeRecord {
        let t = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        TradeRecord::close(0, t, 100.0, 5, t, 100.0 + net_pnl / 50.0, 50.0, 0.0)
    }

    const DAILY: f64 = 365.0;

    // ── Total return ──

    #[test]
    fn total_return_is_percent() {
        assert!((total_return(10_000.0, 11_000.0) - 10.0).abs() < 1e-10);
        assert!((total_return(10_000.0, 9_000.0) + 10.0).abs() < 1e-10);
        assert_eq!(total_return(0.0, 5.0), 0.0);
    }

    // ── Sharpe ──

    #[test]
    fn sharpe_constant_equity_is_zero() {
        assert_eq!(sharpe_ratio(&[100.0; 10], DAILY), 0.0);
    }

    #[test]
    fn sharpe_too_few_points_is_zero() {
        assert_eq!(sharpe_ratio(&[100.0, 101.0], DAILY), 0.0);
        assert_eq!(sharpe_ratio(&[], DAILY), 0.0);
    }

    #[test]
    fn sharpe_known_value() {
        let eq = [100.0, 110.0, 99.0, 108.9];
        let r = bar_returns(&eq);
        let expected = mean_f64(&r) / std_dev(&r) * DAILY.sqrt();
        assert!((sharpe_ratio(&eq, DAILY) - expected).abs() < 1e-12);
        assert!(sharpe_ratio(&eq, DAILY) > 0.0);
    }

    #[test]
    fn sharpe_scales_with_frequency() {
        let eq = [100.0, 110.0, 99.0, 108.9];
        let daily = sharpe_ratio(&eq, 365.0);
        let hourly = sharpe_ratio(&eq, 365.0 * 24.0);
        assert!((hourly / daily - 24.0_f64.sqrt()).abs() < 1e-9);
    }

    // ── Sortino ──

    #[test]
    fn sortino_no_downside_is_zero() {
        assert_eq!(sortino_ratio(&[100.0, 101.0, 102.0, 103.0], DAILY), 0.0);
    }

    #[test]
    fn sortino_positive_with_small_dip() {
        assert!(sortino_ratio(&[100.0, 105.0, 104.0, 110.0], DAILY) > 0.0);
    }

    // ── Drawdown ──

    #[test]
    fn max_drawdown_positive_percent() {
        let eq = [100.0, 120.0, 90.0, 130.0, 117.0];
        assert!((max_drawdown(&eq) - 25.0).abs() < 1e-10);
    }

    #[test]
    fn max_drawdown_monotonic_is_zero() {
        assert_eq!(max_drawdown(&[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    // ── Calmar ──

    #[test]
    fn calmar_zero_without_drawdown() {
        assert_eq!(calmar_ratio(&[100.0, 110.0], 100.0, DAILY), 0.0);
    }

    #[test]
    fn calmar_positive_for_profitable_curve_with_dip() {
        let eq = [100.0, 120.0, 90.0, 130.0];
        assert!(calmar_ratio(&eq, 100.0, DAILY) > 0.0);
    }

    // ── Trade stats ──

    #[test]
    fn win_rate_percent() {
        let trades = vec![make_trade(10.0), make_trade(-5.0), make_trade(3.0), make_trade(0.0)];
        assert!((win_rate(&trades) - 50.0).abs() < 1e-10);
        assert_eq!(win_rate(&[]), 0.0);
    }

    #[test]
    fn profit_factor_basic() {
        let trades = vec![make_trade(30.0), make_trade(-10.0), make_trade(-5.0)];
        assert!((profit_factor(&trades) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn profit_factor_without_losers_is_zero() {
        let trades = vec![make_trade(30.0), make_trade(10.0)];
        let pf = profit_factor(&trades);
        assert_eq!(pf, 0.0);
        assert!(pf.is_finite());
    }

    #[test]
    fn consecutive_streaks() {
        let trades: Vec<_> = [1.0, 2.0, -1.0, 3.0, 4.0, 5.0, -2.0, -3.0]
            .iter()
            .map(|&p| make_trade(p))
            .collect();
        assert_eq!(max_consecutive_wins(&trades), 3);
        assert_eq!(max_consecutive_losses(&trades), 2);
    }

    #[test]
    fn compute_counts_winners_and_losers() {
        let trades = vec![make_trade(10.0), make_trade(-5.0), make_trade(0.0)];
        let stats = BacktestStats::compute(&[100.0, 105.0], &trades, 100.0, DAILY, "s");
        assert_eq!(stats.total_trades, 3);
        assert_eq!(stats.winning_trades, 1);
        assert_eq!(stats.losing_trades, 2);
        assert!((stats.total_return - 5.0).abs() < 1e-10);
        assert_eq!(stats.final_value, 105.0);
        assert_eq!(stats.strategy_name, "s");
    }

    #[test]
    fn compute_on_empty_inputs_is_all_zero() {
        let stats = BacktestStats::compute(&[], &[], 100.0, DAILY, "s");
        assert_eq!(stats.total_return, 0.0);
        assert_eq!(stats.sharpe_ratio, 0.0);
        assert_eq!(stats.profit_factor, 0.0);
        assert_eq!(stats.final_value, 100.0);
    }
}
