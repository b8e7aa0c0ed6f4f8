//! Single-instrument mean-reversion backtest.
//!
//! Per signal bar `i` (ascending):
//! 1. enter at the open of bar `i + 1` (the drop is only confirmed at the close of `i`)
//! 2. walk offsets `k = 0 .. hold_days - 1` from the entry bar:
//!    - high >= target → take profit at the target, or at the open on a gap
//!      above the target when `k > 0`
//!    - otherwise, on the last allowed offset → time stop at the close
//! 3. the next entry must come strictly after the exit bar
//!
//! The re-entry cursor is threaded through the scan as a plain accumulator,
//! so every call is a pure function of its inputs.
//!
//! Positions still open when the series ends are not trades: they are
//! dropped from `trades` and listed in [`BacktestOutcome::abandoned`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::signal::{lookback_change, signal_bars};
use crate::domain::{ExitReason, ParameterSet, PriceBar, Trade};

/// A position that was entered but had no exit before the data ran out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbandonedPosition {
    pub instrument: String,
    pub signal_bar: usize,
    pub entry_bar: usize,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
}

/// Everything one instrument's backtest produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestOutcome {
    pub trades: Vec<Trade>,
    pub abandoned: Vec<AbandonedPosition>,
    /// Bars where the drop condition held.
    pub signals: usize,
    /// Signals whose entry bar fell inside an earlier trade's window.
    pub coalesced: usize,
    /// Signals skipped because the entry bar's open was non-positive or not finite.
    pub invalid_entries: usize,
}

struct Exit {
    bar: usize,
    price: f64,
    reason: ExitReason,
}

/// Find the exit for a position entered at `entry`. `None` if the series
/// ends first.
fn resolve_exit(bars: &[PriceBar], entry: usize, hold_days: usize, target: f64) -> Option<Exit> {
    for k in 0..hold_days {
        let idx = entry + k;
        let bar = bars.get(idx)?;

        if bar.high >= target {
            // On the entry bar we bought at the open, so the open can't be a fill.
            let price = if k > 0 && bar.open > target {
                bar.open
            } else {
                target
            };
            return Some(Exit {
                bar: idx,
                price,
                reason: ExitReason::TakeProfit,
            });
        }

        if k == hold_days - 1 {
            return Some(Exit {
                bar: idx,
                price: bar.close,
                reason: ExitReason::TimeStop,
            });
        }
    }
    None
}

/// Run the strategy over one instrument's series.
///
/// An empty series yields an empty outcome. `params` is assumed validated;
/// a zero `hold_days` simply never exits.
pub fn backtest(
    instrument: &str,
    bars: &[PriceBar],
    params: &ParameterSet,
    initial_capital: f64,
) -> BacktestOutcome {
    let mut outcome = BacktestOutcome::default();
    if bars.is_empty() || params.lookback_days == 0 {
        return outcome;
    }

    let changes = lookback_change(bars, params.lookback_days);
    let signals = signal_bars(&changes, params.signal_threshold());
    outcome.signals = signals.len();

    // First bar index a new position may be entered on.
    let mut next_entry = 0usize;

    for signal_bar in signals {
        let entry = signal_bar + 1;
        if entry >= bars.len() {
            continue;
        }
        if entry < next_entry {
            outcome.coalesced += 1;
            continue;
        }

        let entry_bar = &bars[entry];
        if !entry_bar.has_tradable_open() {
            outcome.invalid_entries += 1;
            continue;
        }

        let raw_entry = entry_bar.open;
        let target = params.target_price(raw_entry);

        let Some(exit) = resolve_exit(bars, entry, params.hold_days, target) else {
            outcome.abandoned.push(AbandonedPosition {
                instrument: instrument.to_string(),
                signal_bar,
                entry_bar: entry,
                entry_date: entry_bar.date,
                entry_price: raw_entry,
            });
            // No trade exists for it, so the cursor stays put.
            continue;
        };

        let profit_pct = params.effective_exit(exit.price) / params.effective_entry(raw_entry) - 1.0;

        outcome.trades.push(Trade {
            instrument: instrument.to_string(),
            signal_bar,
            entry_bar: entry,
            exit_bar: exit.bar,
            entry_date: entry_bar.date,
            exit_date: bars[exit.bar].date,
            days_held: exit.bar - entry,
            exit_reason: exit.reason,
            entry_price: raw_entry,
            exit_price: exit.price,
            profit_pct,
            profit_abs: initial_capital * profit_pct,
        });
        next_entry = exit.bar + 1;
    }

    outcome
}
