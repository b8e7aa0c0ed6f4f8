//! Equity reconciliation: realized strategy equity against an equal-weight
//! buy-and-hold benchmark, both on the union calendar of the universe.

use chrono::NaiveDate;
use dipscan_core::data::{align_closes, fill_forward_backward, union_calendar};
use dipscan_core::{PriceBar, Trade};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::data_loader::LoadedUniverse;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub strategy_equity: f64,
    pub benchmark_equity: f64,
}

/// Round a currency value to cents.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Build both curves for `trades` over `instruments`.
///
/// - strategy: `initial_capital` plus the `profit_abs` of every trade that
///   has exited on or before the date
/// - benchmark: `initial_capital / instruments.len()` per instrument, scaled
///   by `close / first_valid_close` with gaps filled forward then backward;
///   an instrument with no usable first close holds its allocation as cash
///
/// Returns an empty vector when no instrument has any bars.
pub fn reconcile(
    trades: &[Trade],
    instruments: &[String],
    initial_capital: f64,
    price_data: &HashMap<String, Vec<PriceBar>>,
) -> Vec<EquityPoint> {
    let calendar = union_calendar(instruments.iter().map(|s| series_of(price_data, s)));
    if calendar.is_empty() {
        return Vec::new();
    }

    let strategy = strategy_curve(trades, &calendar, initial_capital);

    let allocation = initial_capital / instruments.len() as f64;
    let mut benchmark = vec![0.0_f64; calendar.len()];
    for symbol in instruments {
        let closes = align_closes(&calendar, series_of(price_data, symbol));
        let filled = fill_forward_backward(&closes)
            .filter(|f| f.first().is_some_and(|&p0| p0.is_finite() && p0 > 0.0));
        match filled {
            Some(prices) => {
                let p0 = prices[0];
                for (slot, p) in benchmark.iter_mut().zip(&prices) {
                    *slot += p / p0 * allocation;
                }
            }
            None => {
                log::debug!("{symbol}: no usable price, benchmark holds its allocation as cash");
                for slot in benchmark.iter_mut() {
                    *slot += allocation;
                }
            }
        }
    }

    calendar
        .into_iter()
        .zip(strategy)
        .zip(benchmark)
        .map(|((date, strategy_equity), benchmark_equity)| EquityPoint {
            date,
            strategy_equity: round_cents(strategy_equity),
            benchmark_equity: round_cents(benchmark_equity),
        })
        .collect()
}

/// [`reconcile`] over a loaded universe.
pub fn reconcile_universe(
    trades: &[Trade],
    universe: &LoadedUniverse,
    initial_capital: f64,
) -> Vec<EquityPoint> {
    reconcile(trades, &universe.symbols, initial_capital, &universe.series)
}

fn series_of<'a>(price_data: &'a HashMap<String, Vec<PriceBar>>, symbol: &str) -> &'a [PriceBar] {
    price_data.get(symbol).map(|v| v.as_slice()).unwrap_or(&[])
}

/// Cumulative realized profit by exit date, carried across days without exits.
fn strategy_curve(trades: &[Trade], calendar: &[NaiveDate], initial_capital: f64) -> Vec<f64> {
    let mut exits: Vec<(NaiveDate, f64)> =
        trades.iter().map(|t| (t.exit_date, t.profit_abs)).collect();
    exits.sort_by_key(|(date, _)| *date);

    let mut pending = exits.into_iter().peekable();
    let mut equity = initial_capital;
    calendar
        .iter()
        .map(|date| {
            while let Some((_, profit)) = pending.next_if(|(exit, _)| exit <= date) {
                equity += profit;
            }
            equity
        })
        .collect()
}
