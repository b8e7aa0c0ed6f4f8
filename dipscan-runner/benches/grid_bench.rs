//! Criterion benchmarks for the grid search: the stock 8 × 4 × 4 grid over
//! seven synthetic instruments, sequential and on the rayon pool.

use std::collections::HashMap;

use criterion::{criterion_group, criterion_main, Criterion};

use dipscan_runner::config::{OptimizeConfig, DEFAULT_UNIVERSE};
use dipscan_runner::data_loader::generate_synthetic_bars;
use dipscan_runner::{GridSearch, LoadedUniverse};

fn universe() -> LoadedUniverse {
    let start = chrono::NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
    let end = chrono::NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
    let series: HashMap<String, Vec<_>> = DEFAULT_UNIVERSE
        .iter()
        .map(|s| (s.to_string(), generate_synthetic_bars(s, start, end)))
        .collect();
    LoadedUniverse::from_series(DEFAULT_UNIVERSE, series)
}

fn bench_grid(c: &mut Criterion) {
    let universe = universe();
    let grid = OptimizeConfig::with_defaults().param_grid();

    let mut group = c.benchmark_group("grid_128_cells");
    group.sample_size(10);
    group.bench_function("sequential", |b| {
        b.iter(|| {
            GridSearch::new(&universe, 10_000.0)
                .with_parallelism(false)
                .run(&grid)
        })
    });
    group.bench_function("parallel", |b| {
        b.iter(|| GridSearch::new(&universe, 10_000.0).run(&grid))
    });
    group.finish();
}

criterion_group!(benches, bench_grid);
criterion_main!(benches);
