//! Portfolio runner: the backtest engine over every instrument of a universe.
//!
//! Instruments don't interact. Trades are concatenated in universe order and
//! an instrument without data contributes nothing.

use dipscan_core::{backtest, AbandonedPosition, ParameterSet, Trade};
use serde::{Deserialize, Serialize};

use crate::data_loader::LoadedUniverse;
use crate::metrics::RunMetrics;

/// Trades and engine diagnostics for one parameter set across the universe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioRun {
    pub trades: Vec<Trade>,
    pub abandoned: Vec<AbandonedPosition>,
    pub signals: usize,
    pub coalesced: usize,
    pub invalid_entries: usize,
}

impl PortfolioRun {
    pub fn metrics(&self, initial_capital: f64) -> RunMetrics {
        RunMetrics::compute(&self.trades, initial_capital)
    }

    /// Instrument with the most trades; the earliest in universe order wins ties.
    pub fn most_active_instrument(&self) -> Option<(&str, usize)> {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for trade in &self.trades {
            match counts.iter_mut().find(|(name, _)| *name == trade.instrument) {
                Some((_, n)) => *n += 1,
                None => counts.push((trade.instrument.as_str(), 1)),
            }
        }
        counts
            .into_iter()
            .fold(None, |best: Option<(&str, usize)>, cur| match best {
                Some(b) if b.1 >= cur.1 => Some(b),
                _ => Some(cur),
            })
    }
}

/// Run `params` over every symbol of the universe, in order.
pub fn run_portfolio(
    universe: &LoadedUniverse,
    params: &ParameterSet,
    initial_capital: f64,
) -> PortfolioRun {
    let mut run = PortfolioRun::default();
    for symbol in &universe.symbols {
        let outcome = backtest(symbol, universe.bars(symbol), params, initial_capital);
        run.trades.extend(outcome.trades);
        run.abandoned.extend(outcome.abandoned);
        run.signals += outcome.signals;
        run.coalesced += outcome.coalesced;
        run.invalid_entries += outcome.invalid_entries;
    }
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use dipscan_core::PriceBar;
    use std::collections::HashMap;

    fn series(closes: &[f64]) -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                PriceBar::new(start + chrono::Duration::days(i as i64), c, c, c, c)
            })
            .collect()
    }

    fn params() -> ParameterSet {
        ParameterSet {
            drop_threshold_pct: 8.0,
            lookback_days: 1,
            hold_days: 2,
            take_profit_pct: 50.0,
            fee_rate: 0.0,
        }
    }

    #[test]
    fn trades_follow_universe_order_and_missing_is_skipped() {
        let dipping = series(&[100.0, 90.0, 91.0, 92.0, 93.0]);
        let mut map = HashMap::new();
        map.insert("B".to_string(), dipping.clone());
        map.insert("A".to_string(), dipping);
        let universe = LoadedUniverse::from_series(&["B", "GONE", "A"], map);

        let run = run_portfolio(&universe, &params(), 10_000.0);
        let names: Vec<&str> = run.trades.iter().map(|t| t.instrument.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
        assert_eq!(run.signals, 2);
        assert_eq!(universe.missing, vec!["GONE".to_string()]);
        assert_eq!(run.most_active_instrument(), Some(("B", 1)));
    }

    #[test]
    fn empty_universe_data_gives_empty_run() {
        let universe = LoadedUniverse::from_series(&["X"], HashMap::new());
        let run = run_portfolio(&universe, &params(), 10_000.0);
        assert_eq!(run, PortfolioRun::default());
        assert_eq!(run.most_active_instrument(), None);
        assert_eq!(run.metrics(10_000.0).win_rate_pct, 0.0);
    }
}
