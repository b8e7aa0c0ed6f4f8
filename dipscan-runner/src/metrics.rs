//! Run metrics: pure functions over a trade list.
//!
//! Headline numbers follow the optimizer's scoring: profits are summed
//! against a fixed initial capital, never compounded.

use dipscan_core::{ExitReason, Trade};
use serde::{Deserialize, Serialize};

/// Aggregate statistics for one portfolio run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Sum of `profit_abs` over all trades.
    pub total_profit: f64,
    /// `total_profit / initial_capital * 100`.
    pub roi_pct: f64,
    /// Share of trades with `profit_abs > 0`, in percent; 0 with no trades.
    pub win_rate_pct: f64,
    pub trade_count: usize,
    pub profit_factor: f64,
    pub avg_days_held: f64,
    pub take_profit_exits: usize,
}

impl RunMetrics {
    pub fn compute(trades: &[Trade], initial_capital: f64) -> Self {
        let total_profit = total_profit(trades);
        Self {
            total_profit,
            roi_pct: roi_pct(total_profit, initial_capital),
            win_rate_pct: win_rate_pct(trades),
            trade_count: trades.len(),
            profit_factor: profit_factor(trades),
            avg_days_held: avg_days_held(trades),
            take_profit_exits: trades
                .iter()
                .filter(|t| t.exit_reason == ExitReason::TakeProfit)
                .count(),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

pub fn total_profit(trades: &[Trade]) -> f64 {
    trades.iter().map(|t| t.profit_abs).sum()
}

/// Returns 0.0 for a non-positive capital rather than dividing by it.
pub fn roi_pct(total_profit: f64, initial_capital: f64) -> f64 {
    if initial_capital <= 0.0 {
        return 0.0;
    }
    total_profit / initial_capital * 100.0
}

pub fn win_rate_pct(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64 * 100.0
}

/// Gross profit / gross loss. Infinity with no losers, 0.0 with no trades.
pub fn profit_factor(trades: &[Trade]) -> f64 {
    let gross_profit: f64 = trades
        .iter()
        .filter(|t| t.profit_abs > 0.0)
        .map(|t| t.profit_abs)
        .sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.profit_abs < 0.0)
        .map(|t| t.profit_abs.abs())
        .sum();
    if gross_loss < 1e-15 {
        if gross_profit > 0.0 {
            return f64::INFINITY;
        }
        return 0.0;
    }
    gross_profit / gross_loss
}

pub fn avg_days_held(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| t.days_held as f64).sum::<f64>() / trades.len() as f64
}

/// Largest peak-to-trough decline of an equity series, as a negative percent.
pub fn max_drawdown_pct(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &value in equity {
        peak = peak.max(value);
        if peak > 0.0 {
            worst = worst.min((value - peak) / peak * 100.0);
        }
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn trade(profit_abs: f64, days_held: usize, reason: ExitReason) -> Trade {
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        Trade {
            instrument: "X".into(),
            signal_bar: 0,
            entry_bar: 1,
            exit_bar: 1 + days_held,
            entry_date: d,
            exit_date: d,
            days_held,
            exit_reason: reason,
            entry_price: 100.0,
            exit_price: 100.0,
            profit_pct: profit_abs / 10_000.0,
            profit_abs,
        }
    }

    #[test]
    fn empty_trade_list() {
        let m = RunMetrics::compute(&[], 10_000.0);
        assert_eq!(m.total_profit, 0.0);
        assert_eq!(m.roi_pct, 0.0);
        assert_eq!(m.win_rate_pct, 0.0);
        assert_eq!(m.trade_count, 0);
        assert_eq!(m.profit_factor, 0.0);
    }

    #[test]
    fn headline_numbers() {
        let trades = vec![
            trade(500.0, 2, ExitReason::TakeProfit),
            trade(-200.0, 4, ExitReason::TimeStop),
            trade(0.0, 0, ExitReason::TimeStop),
            trade(300.0, 6, ExitReason::TakeProfit),
        ];
        let m = RunMetrics::compute(&trades, 10_000.0);
        assert!((m.total_profit - 600.0).abs() < 1e-9);
        assert!((m.roi_pct - 6.0).abs() < 1e-9);
        // Break-even trades are not winners.
        assert!((m.win_rate_pct - 50.0).abs() < 1e-9);
        assert!((m.profit_factor - 4.0).abs() < 1e-9);
        assert!((m.avg_days_held - 3.0).abs() < 1e-9);
        assert_eq!(m.take_profit_exits, 2);
    }

    #[test]
    fn drawdown_of_rising_curve_is_zero() {
        assert_eq!(max_drawdown_pct(&[100.0, 101.0, 105.0]), 0.0);
        assert!((max_drawdown_pct(&[100.0, 120.0, 90.0, 130.0]) + 25.0).abs() < 1e-9);
    }
}
