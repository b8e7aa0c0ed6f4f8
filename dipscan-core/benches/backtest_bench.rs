//! Criterion benchmarks for the backtest hot path.
//!
//! 1. Signal scan (lookback change + threshold) over a long series
//! 2. Full single-instrument backtest at several holding windows

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use dipscan_core::engine::{lookback_change, signal_bars};
use dipscan_core::{backtest, ParameterSet, PriceBar};

fn make_bars(n: usize) -> Vec<PriceBar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2000, 1, 3).unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.1).sin() * 10.0 + (i as f64 * 0.013).cos() * 4.0;
            let open = close - 0.3;
            PriceBar::new(
                base_date + chrono::Duration::days(i as i64),
                open,
                close + 1.5,
                close - 1.5,
                close,
            )
        })
        .collect()
}

fn bench_signal_scan(c: &mut Criterion) {
    let bars = make_bars(6_300);
    c.bench_function("signal_scan_25y", |b| {
        b.iter(|| {
            let changes = lookback_change(black_box(&bars), 3);
            signal_bars(&changes, -0.03)
        })
    });
}

fn bench_backtest(c: &mut Criterion) {
    let bars = make_bars(6_300);
    let mut group = c.benchmark_group("backtest_25y");
    for hold in [5usize, 40, 780] {
        let params = ParameterSet {
            drop_threshold_pct: 3.0,
            lookback_days: 3,
            hold_days: hold,
            take_profit_pct: 4.0,
            fee_rate: 0.001,
        };
        group.bench_with_input(BenchmarkId::from_parameter(hold), &params, |b, p| {
            b.iter(|| backtest("BENCH", black_box(&bars), p, 10_000.0))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_signal_scan, bench_backtest);
criterion_main!(benches);
