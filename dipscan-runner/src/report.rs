//! Caller-facing report for a grid search.
//!
//! Headline numbers and trade prices are rounded to cents here; everything
//! upstream stays unrounded.

use chrono::NaiveDate;
use dipscan_core::data::fill_forward_backward;
use dipscan_core::{ExitReason, PriceBar, Trade};
use serde::{Deserialize, Serialize};

use crate::data_loader::LoadedUniverse;
use crate::equity::{reconcile_universe, round_cents, EquityPoint};
use crate::metrics::max_drawdown_pct;
use crate::optimizer::GridSearchOutcome;

/// Bumped whenever the report layout changes incompatibly.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestParameters {
    pub drop_threshold_pct: f64,
    pub hold_days: usize,
    pub take_profit_pct: f64,
    pub lookback_days: usize,
    pub fee_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRow {
    pub instrument: String,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub days_held: usize,
    pub exit_reason: ExitReason,
    pub entry_price: f64,
    pub exit_price: f64,
    /// Net return in percent.
    pub profit_pct: f64,
    pub profit_abs: f64,
}

impl From<&Trade> for TradeRow {
    fn from(t: &Trade) -> Self {
        Self {
            instrument: t.instrument.clone(),
            entry_date: t.entry_date,
            exit_date: t.exit_date,
            days_held: t.days_held,
            exit_reason: t.exit_reason,
            entry_price: round_cents(t.entry_price),
            exit_price: round_cents(t.exit_price),
            profit_pct: round_cents(t.profit_pct * 100.0),
            profit_abs: round_cents(t.profit_abs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityRow {
    pub date: NaiveDate,
    pub equity: f64,
    pub buy_and_hold: f64,
}

impl From<&EquityPoint> for EquityRow {
    fn from(p: &EquityPoint) -> Self {
        Self {
            date: p.date,
            equity: p.strategy_equity,
            buy_and_hold: p.benchmark_equity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDiagnostics {
    pub combinations_evaluated: usize,
    pub combinations_total: usize,
    pub cancelled: bool,
    /// Positions of the winning run still open when data ran out.
    pub abandoned_positions: usize,
    pub invalid_entries: usize,
    pub coalesced_signals: usize,
    pub missing_instruments: Vec<String>,
    pub dataset_hash: String,
    pub has_synthetic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub schema_version: u32,
    pub universe: Vec<String>,
    pub initial_capital: f64,
    pub best: BestParameters,
    pub total_profit: f64,
    pub roi_pct: f64,
    pub win_rate_pct: f64,
    pub trade_count: usize,
    pub max_drawdown_pct: f64,
    pub trades: Vec<TradeRow>,
    pub equity: Vec<EquityRow>,
    pub diagnostics: ReportDiagnostics,
}

impl OptimizationReport {
    pub fn build(
        outcome: &GridSearchOutcome,
        universe: &LoadedUniverse,
        initial_capital: f64,
    ) -> Self {
        let best = &outcome.best;
        let points = reconcile_universe(&best.trades, universe, initial_capital);
        let curve: Vec<f64> = points.iter().map(|p| p.strategy_equity).collect();

        Self {
            schema_version: SCHEMA_VERSION,
            universe: universe.symbols.clone(),
            initial_capital,
            best: BestParameters {
                drop_threshold_pct: best.parameters.drop_threshold_pct,
                hold_days: best.parameters.hold_days,
                take_profit_pct: best.parameters.take_profit_pct,
                lookback_days: best.parameters.lookback_days,
                fee_rate: best.parameters.fee_rate,
            },
            total_profit: round_cents(best.total_profit),
            roi_pct: round_cents(best.roi_pct),
            win_rate_pct: round_cents(best.win_rate_pct),
            trade_count: best.trades.len(),
            max_drawdown_pct: round_cents(max_drawdown_pct(&curve)),
            trades: best.trades.iter().map(TradeRow::from).collect(),
            equity: points.iter().map(EquityRow::from).collect(),
            diagnostics: ReportDiagnostics {
                combinations_evaluated: outcome.evaluated,
                combinations_total: outcome.total,
                cancelled: outcome.cancelled,
                abandoned_positions: best.abandoned.len(),
                invalid_entries: best.invalid_entries,
                coalesced_signals: best.coalesced,
                missing_instruments: universe.missing.clone(),
                dataset_hash: universe.dataset_hash.clone(),
                has_synthetic: universe.has_synthetic,
            },
        }
    }
}

/// One OHLC row for charting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// A single instrument's OHLC, each column filled forward then backward and
/// rounded to cents. Empty if any column has no finite value at all.
pub fn chart_series(bars: &[PriceBar]) -> Vec<ChartBar> {
    let column = |get: fn(&PriceBar) -> f64| -> Option<Vec<f64>> {
        let raw: Vec<Option<f64>> = bars
            .iter()
            .map(|b| Some(get(b)).filter(|v| v.is_finite()))
            .collect();
        fill_forward_backward(&raw)
    };

    let (Some(open), Some(high), Some(low), Some(close)) = (
        column(|b| b.open),
        column(|b| b.high),
        column(|b| b.low),
        column(|b| b.close),
    ) else {
        return Vec::new();
    };

    bars.iter()
        .enumerate()
        .map(|(i, b)| ChartBar {
            date: b.date,
            open: round_cents(open[i]),
            high: round_cents(high[i]),
            low: round_cents(low[i]),
            close: round_cents(close[i]),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn trade_row_rounds_and_scales() {
        let d = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let trade = Trade {
            instrument: "MSFT".into(),
            signal_bar: 3,
            entry_bar: 4,
            exit_bar: 6,
            entry_date: d,
            exit_date: d,
            days_held: 2,
            exit_reason: ExitReason::TimeStop,
            entry_price: 91.004,
            exit_price: 95.0,
            profit_pct: 0.041_234,
            profit_abs: 412.345_6,
        };
        let row = TradeRow::from(&trade);
        assert_eq!(row.entry_price, 91.0);
        assert_eq!(row.profit_pct, 4.12);
        assert_eq!(row.profit_abs, 412.35);
        assert_eq!(row.days_held, 2);
    }

    #[test]
    fn chart_series_fills_gaps() {
        let day = |n| NaiveDate::from_ymd_opt(2024, 1, n).unwrap();
        let bars = vec![
            PriceBar::new(day(1), f64::NAN, 11.0, 9.0, 10.0),
            PriceBar::new(day(2), 10.123, 12.0, 9.5, f64::NAN),
            PriceBar::new(day(3), 11.0, 12.5, 10.5, 12.0),
        ];
        let rows = chart_series(&bars);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].open, 10.12);
        assert_eq!(rows[1].close, 10.0);
        assert_eq!(rows[2].close, 12.0);
    }

    #[test]
    fn chart_series_of_empty_column_is_empty() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = vec![PriceBar::new(day, 1.0, 1.0, 1.0, f64::NAN)];
        assert!(chart_series(&bars).is_empty());
        assert!(chart_series(&[]).is_empty());
    }
}
