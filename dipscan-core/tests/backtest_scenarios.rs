//! Scenario tests for the backtest engine on hand-built price series.

use chrono::NaiveDate;
use dipscan_core::{backtest, ExitReason, ParameterSet, PriceBar};

fn day(i: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i as i64)
}

/// Open at the close, high half a point above.
fn series(closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| PriceBar::new(day(i), c, c + 0.5, c - 0.5, c))
        .collect()
}

#[test]
fn ten_bar_drop_scenario() {
    let closes = [100.0, 99.0, 98.0, 90.0, 91.0, 92.0, 95.0, 97.0, 99.0, 101.0];
    let bars = series(&closes);
    let params = ParameterSet {
        drop_threshold_pct: 8.0,
        lookback_days: 1,
        hold_days: 3,
        take_profit_pct: 5.0,
        fee_rate: 0.001,
    };
    let capital = 10_000.0;

    let out = backtest("TEST", &bars, &params, capital);

    // 90 / 98 - 1 ≈ -8.16% is the only bar below -8%.
    assert_eq!(out.signals, 1);
    assert_eq!(out.trades.len(), 1);
    let t = &out.trades[0];
    assert_eq!(t.signal_bar, 3);
    assert_eq!(t.entry_bar, 4);
    assert_eq!(t.entry_date, day(4));
    assert_eq!(t.entry_price, 91.0);

    // Target 95.55; highs over the window are 91.5, 92.5, 95.5 → time stop at close 95.
    assert_eq!(t.exit_reason, ExitReason::TimeStop);
    assert_eq!(t.exit_bar, 6);
    assert_eq!(t.days_held, 2);
    assert_eq!(t.exit_price, 95.0);

    let expected_pct = (95.0 * (1.0 - 0.001)) / (91.0 * (1.0 + 0.001)) - 1.0;
    assert!((t.profit_pct - expected_pct).abs() < 1e-15);
    assert_eq!(t.profit_abs, capital * t.profit_pct);
    assert!(t.profit_abs > 0.0);
}

#[test]
fn same_scenario_with_lower_target_takes_profit() {
    let closes = [100.0, 99.0, 98.0, 90.0, 91.0, 92.0, 95.0, 97.0, 99.0, 101.0];
    let bars = series(&closes);
    let params = ParameterSet {
        drop_threshold_pct: 8.0,
        lookback_days: 1,
        hold_days: 3,
        take_profit_pct: 1.5,
        fee_rate: 0.001,
    };

    let t = &backtest("TEST", &bars, &params, 10_000.0).trades[0];
    // Target 92.365; bar 5 (open 92, high 92.5) reaches it without gapping over.
    assert_eq!(t.exit_reason, ExitReason::TakeProfit);
    assert_eq!(t.exit_bar, 5);
    assert!((t.exit_price - 91.0 * 1.015).abs() < 1e-9);
}

#[test]
fn consecutive_signals_open_one_position() {
    // Two consecutive -10% days: signals at 1 and 2. The first entry (bar 2)
    // is still open at bar 3, so the second signal is coalesced.
    let closes = [100.0, 90.0, 81.0, 82.0, 83.0, 84.0, 85.0];
    let bars = series(&closes);
    let params = ParameterSet {
        drop_threshold_pct: 5.0,
        lookback_days: 1,
        hold_days: 3,
        take_profit_pct: 50.0,
        fee_rate: 0.0,
    };

    let out = backtest("TEST", &bars, &params, 10_000.0);
    assert_eq!(out.signals, 2);
    assert_eq!(out.trades.len(), 1);
    assert_eq!(out.coalesced, 1);
    assert_eq!(out.trades[0].entry_bar, 2);
    assert_eq!(out.trades[0].exit_bar, 4);
}

#[test]
fn exit_bar_blocks_reentry_but_next_bar_does_not() {
    // hold 1 → each trade exits on its entry bar.
    // Signals at 1 and 2: entry 2 exits at 2; the signal at 2 wants bar 3, which is allowed.
    let closes = [100.0, 90.0, 80.0, 80.0, 80.0];
    let bars = series(&closes);
    let params = ParameterSet {
        drop_threshold_pct: 5.0,
        lookback_days: 1,
        hold_days: 1,
        take_profit_pct: 50.0,
        fee_rate: 0.0,
    };

    let out = backtest("TEST", &bars, &params, 10_000.0);
    assert_eq!(out.trades.len(), 2);
    assert_eq!(out.trades[0].exit_bar, 2);
    assert_eq!(out.trades[1].entry_bar, 3);
    assert_eq!(out.coalesced, 0);
}

#[test]
fn truncating_future_bars_does_not_change_past_trades() {
    let closes: Vec<f64> = (0..120)
        .map(|i| 100.0 + ((i as f64) * 0.7).sin() * 12.0)
        .collect();
    let full = series(&closes);
    let params = ParameterSet {
        drop_threshold_pct: 3.0,
        lookback_days: 2,
        hold_days: 5,
        take_profit_pct: 2.0,
        fee_rate: 0.001,
    };

    let full_out = backtest("TEST", &full, &params, 10_000.0);
    let cut = 80;
    let truncated_out = backtest("TEST", &full[..cut], &params, 10_000.0);

    // Up to the first position the truncated run could not close, both runs
    // must agree trade for trade.
    let horizon = truncated_out
        .abandoned
        .first()
        .map_or(cut, |a| a.entry_bar);
    let full_settled: Vec<_> = full_out
        .trades
        .iter()
        .filter(|t| t.entry_bar < horizon)
        .collect();
    let truncated_settled: Vec<_> = truncated_out
        .trades
        .iter()
        .filter(|t| t.entry_bar < horizon)
        .collect();

    assert!(!truncated_settled.is_empty());
    assert_eq!(full_settled, truncated_settled);
    assert!(full_settled.iter().all(|t| t.exit_bar < cut));
}
