//! Property tests for portfolio scoring and equity reconciliation.
//!
//! 1. Win rate is within [0, 100] and 0 with no trades
//! 2. With no trades the strategy curve is flat at the initial capital
//! 3. The benchmark starts at the initial capital
//! 4. Parallel and sequential grid searches agree

use std::collections::HashMap;

use chrono::NaiveDate;
use dipscan_core::{ParameterSet, PriceBar};
use dipscan_runner::equity::round_cents;
use dipscan_runner::metrics::win_rate_pct;
use dipscan_runner::{reconcile, run_portfolio, GridSearch, LoadedUniverse, ParamGrid};
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

/// A random walk starting on a random day offset, so instruments overlap
/// only partially.
fn arb_series() -> impl Strategy<Value = Vec<PriceBar>> {
    (0..20i64, prop::collection::vec(-0.06..0.06_f64, 0..60)).prop_map(|(offset, steps)| {
        let base = NaiveDate::from_ymd_opt(2022, 3, 1).unwrap() + chrono::Duration::days(offset);
        let mut close = 50.0_f64;
        steps
            .into_iter()
            .enumerate()
            .map(|(i, ret)| {
                let open = close;
                close *= 1.0 + ret;
                PriceBar::new(
                    base + chrono::Duration::days(i as i64),
                    open,
                    open.max(close) * 1.01,
                    open.min(close) * 0.99,
                    close,
                )
            })
            .collect()
    })
}

fn arb_universe() -> impl Strategy<Value = (Vec<String>, HashMap<String, Vec<PriceBar>>)> {
    prop::collection::vec(arb_series(), 1..5).prop_map(|all| {
        let names: Vec<String> = (0..all.len()).map(|i| format!("S{i}")).collect();
        let map: HashMap<String, Vec<PriceBar>> = names.iter().cloned().zip(all).collect();
        (names, map)
    })
}

fn arb_params() -> impl Strategy<Value = ParameterSet> {
    (1.0..8.0_f64, 1..4usize, 1..10usize, 1.0..6.0_f64).prop_map(|(drop, lookback, hold, tp)| {
        ParameterSet {
            drop_threshold_pct: drop,
            lookback_days: lookback,
            hold_days: hold,
            take_profit_pct: tp,
            fee_rate: 0.001,
        }
    })
}

proptest! {
    #[test]
    fn win_rate_is_a_percentage(
        (names, map) in arb_universe(),
        params in arb_params(),
    ) {
        let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        let universe = LoadedUniverse::from_series(&refs, map);
        let run = run_portfolio(&universe, &params, 10_000.0);
        let rate = win_rate_pct(&run.trades);
        prop_assert!((0.0..=100.0).contains(&rate));
        if run.trades.is_empty() {
            prop_assert_eq!(rate, 0.0);
        }
    }

    #[test]
    fn no_trades_means_flat_strategy(
        (names, map) in arb_universe(),
        capital in 1_000.0..1_000_000.0_f64,
    ) {
        let points = reconcile(&[], &names, capital, &map);
        for p in &points {
            prop_assert_eq!(p.strategy_equity, round_cents(capital));
        }
    }

    #[test]
    fn benchmark_starts_at_capital(
        (names, map) in arb_universe(),
        params in arb_params(),
        capital in 1_000.0..1_000_000.0_f64,
    ) {
        let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        let universe = LoadedUniverse::from_series(&refs, map.clone());
        let run = run_portfolio(&universe, &params, capital);
        let points = reconcile(&run.trades, &names, capital, &map);

        let has_data = map.values().any(|bars| !bars.is_empty());
        prop_assert_eq!(points.is_empty(), !has_data);
        if let Some(first) = points.first() {
            prop_assert!((first.benchmark_equity - capital).abs() <= 0.01);
        }
        for pair in points.windows(2) {
            prop_assert!(pair[0].date < pair[1].date);
        }
    }

    #[test]
    fn parallel_grid_matches_sequential((names, map) in arb_universe()) {
        let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        let universe = LoadedUniverse::from_series(&refs, map);
        let grid = ParamGrid {
            drop_thresholds: vec![1.0, 3.0],
            hold_days: vec![2, 6],
            take_profits: vec![1.0, 4.0],
            lookback_days: 2,
            fee_rate: 0.001,
        };
        let seq = GridSearch::new(&universe, 10_000.0).with_parallelism(false).run(&grid);
        let par = GridSearch::new(&universe, 10_000.0).with_parallelism(true).run(&grid);
        match (seq, par) {
            (Ok(a), Ok(b)) => {
                prop_assert_eq!(a.cells, b.cells);
                prop_assert_eq!(a.best, b.best);
            }
            (Err(_), Err(_)) => {}
            _ => prop_assert!(false, "parallel and sequential disagree"),
        }
    }
}
