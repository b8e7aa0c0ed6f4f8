//! Grid search over drop × hold × take-profit.
//!
//! Every cell is an independent, pure portfolio run over immutable data, so
//! cells are evaluated on the rayon pool when parallelism is on. Results are
//! collected in enumeration order and reduced sequentially with a strict
//! greater-than on ROI, which makes the winner identical to a single-threaded
//! search regardless of completion order.

use std::sync::atomic::{AtomicBool, Ordering};

use dipscan_core::{AbandonedPosition, ParamError, ParameterSet, Trade};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data_loader::LoadedUniverse;
use crate::metrics::RunMetrics;
use crate::portfolio::run_portfolio;

/// Cells above this ROI (percent) are logged at info level.
const HIGHLIGHT_ROI_PCT: f64 = 50.0;

#[derive(Debug, Error)]
pub enum OptimizeError {
    /// Empty grid, nothing evaluated, or the winning cell has zero trades.
    #[error("no result found across {combinations} combination(s)")]
    NoResult { combinations: usize },

    #[error("invalid grid parameters: {0}")]
    InvalidParams(#[from] ParamError),
}

/// Parameter option lists; lookback and fee are fixed for the whole grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub drop_thresholds: Vec<f64>,
    pub hold_days: Vec<usize>,
    pub take_profits: Vec<f64>,
    pub lookback_days: usize,
    pub fee_rate: f64,
}

impl ParamGrid {
    pub fn size(&self) -> usize {
        self.drop_thresholds.len() * self.hold_days.len() * self.take_profits.len()
    }

    /// Every combination, drop-major then hold then take-profit.
    pub fn parameter_sets(&self) -> Vec<ParameterSet> {
        let mut sets = Vec::with_capacity(self.size());
        for &drop_threshold_pct in &self.drop_thresholds {
            for &hold_days in &self.hold_days {
                for &take_profit_pct in &self.take_profits {
                    sets.push(ParameterSet {
                        drop_threshold_pct,
                        lookback_days: self.lookback_days,
                        hold_days,
                        take_profit_pct,
                        fee_rate: self.fee_rate,
                    });
                }
            }
        }
        sets
    }
}

/// Scores for one grid cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSummary {
    /// Position in enumeration order.
    pub index: usize,
    pub parameters: ParameterSet,
    pub total_profit: f64,
    pub roi_pct: f64,
    pub win_rate_pct: f64,
    pub trade_count: usize,
}

/// The best cell of a grid search, with its full trade list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub parameters: ParameterSet,
    pub trades: Vec<Trade>,
    pub total_profit: f64,
    pub roi_pct: f64,
    pub win_rate_pct: f64,
    pub abandoned: Vec<AbandonedPosition>,
    pub invalid_entries: usize,
    pub coalesced: usize,
}

/// Mean ROI over take-profit options, as a drop × hold table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiHeatmap {
    pub drop_thresholds: Vec<f64>,
    pub hold_days: Vec<usize>,
    /// `mean_roi[row][col]` for `drop_thresholds[row]` and `hold_days[col]`;
    /// `None` where no cell was evaluated.
    pub mean_roi: Vec<Vec<Option<f64>>>,
}

#[derive(Debug, Clone)]
pub struct GridSearchOutcome {
    pub best: OptimizationResult,
    /// Evaluated cells in enumeration order.
    pub cells: Vec<CellSummary>,
    pub evaluated: usize,
    pub total: usize,
    /// Aborted before every cell ran; `best` is the best of `cells`.
    pub cancelled: bool,
}

impl GridSearchOutcome {
    /// Cells ranked by ROI, highest first. Ties keep enumeration order.
    pub fn top_n(&self, n: usize) -> Vec<&CellSummary> {
        let mut ranked: Vec<&CellSummary> = self.cells.iter().collect();
        ranked.sort_by(|a, b| rank_key(b.roi_pct).total_cmp(&rank_key(a.roi_pct)));
        ranked.truncate(n);
        ranked
    }

    pub fn roi_heatmap(&self) -> RoiHeatmap {
        let mut drop_thresholds: Vec<f64> = Vec::new();
        let mut hold_days: Vec<usize> = Vec::new();
        for cell in &self.cells {
            let p = &cell.parameters;
            if !drop_thresholds.contains(&p.drop_threshold_pct) {
                drop_thresholds.push(p.drop_threshold_pct);
            }
            if !hold_days.contains(&p.hold_days) {
                hold_days.push(p.hold_days);
            }
        }

        let mut sums = vec![vec![(0.0_f64, 0usize); hold_days.len()]; drop_thresholds.len()];
        for cell in &self.cells {
            let p = &cell.parameters;
            let row = drop_thresholds.iter().position(|&d| d == p.drop_threshold_pct);
            let col = hold_days.iter().position(|&h| h == p.hold_days);
            if let (Some(r), Some(c)) = (row, col) {
                sums[r][c].0 += cell.roi_pct;
                sums[r][c].1 += 1;
            }
        }

        let mean_roi = sums
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|(sum, n)| (n > 0).then_some(sum / n as f64))
                    .collect()
            })
            .collect();

        RoiHeatmap {
            drop_thresholds,
            hold_days,
            mean_roi,
        }
    }
}

/// NaN ranks below everything.
fn rank_key(roi: f64) -> f64 {
    if roi.is_nan() {
        f64::NEG_INFINITY
    } else {
        roi
    }
}

/// Grid search executor over a loaded universe.
pub struct GridSearch<'a> {
    universe: &'a LoadedUniverse,
    initial_capital: f64,
    parallel: bool,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> GridSearch<'a> {
    pub fn new(universe: &'a LoadedUniverse, initial_capital: f64) -> Self {
        Self {
            universe,
            initial_capital,
            parallel: true,
            cancel: None,
        }
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Cells that haven't started when the flag goes up are skipped.
    pub fn with_cancel_flag(mut self, cancel: &'a AtomicBool) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn run(&self, grid: &ParamGrid) -> Result<GridSearchOutcome, OptimizeError> {
        self.run_with_progress(grid, |_, _, _| {})
    }

    /// Like [`run`](Self::run), invoking `progress(index, total, cell)` as
    /// each cell completes. Under parallelism the calls arrive out of order.
    pub fn run_with_progress<F>(
        &self,
        grid: &ParamGrid,
        progress: F,
    ) -> Result<GridSearchOutcome, OptimizeError>
    where
        F: Fn(usize, usize, &CellSummary) + Send + Sync,
    {
        let sets = grid.parameter_sets();
        let total = sets.len();
        for params in &sets {
            params.validate()?;
        }
        log::info!(
            "grid search: {total} combination(s) over {} instrument(s)",
            self.universe.symbols.len()
        );

        let evaluate = |(index, params): (usize, &ParameterSet)| -> Option<CellSummary> {
            if self.cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
                return None;
            }
            let cell = self.evaluate_cell(index, params);
            progress(index, total, &cell);
            Some(cell)
        };

        let results: Vec<Option<CellSummary>> = if self.parallel {
            sets.par_iter().enumerate().map(evaluate).collect()
        } else {
            sets.iter().enumerate().map(evaluate).collect()
        };

        let cells: Vec<CellSummary> = results.into_iter().flatten().collect();
        let evaluated = cells.len();
        let cancelled = evaluated < total;
        if cancelled {
            log::warn!("grid search cancelled after {evaluated}/{total} combination(s)");
        }

        let winner = select_best(&cells)
            .filter(|cell| cell.trade_count > 0)
            .ok_or(OptimizeError::NoResult {
                combinations: total,
            })?;
        let best = self.materialize(&winner.parameters);
        log::info!(
            "best: drop {}% hold {} tp {}%, ROI {:.2}% over {} trade(s)",
            best.parameters.drop_threshold_pct,
            best.parameters.hold_days,
            best.parameters.take_profit_pct,
            best.roi_pct,
            best.trades.len()
        );

        Ok(GridSearchOutcome {
            best,
            cells,
            evaluated,
            total,
            cancelled,
        })
    }

    fn evaluate_cell(&self, index: usize, params: &ParameterSet) -> CellSummary {
        let run = run_portfolio(self.universe, params, self.initial_capital);
        let metrics = run.metrics(self.initial_capital);
        let cell = CellSummary {
            index,
            parameters: *params,
            total_profit: metrics.total_profit,
            roi_pct: metrics.roi_pct,
            win_rate_pct: metrics.win_rate_pct,
            trade_count: metrics.trade_count,
        };

        if cell.roi_pct > HIGHLIGHT_ROI_PCT {
            log::info!(
                "drop {}% hold {} tp {}%: ROI {:.2}%, {} trade(s), win rate {:.1}%",
                params.drop_threshold_pct,
                params.hold_days,
                params.take_profit_pct,
                cell.roi_pct,
                cell.trade_count,
                cell.win_rate_pct
            );
        } else if index % 10 == 0 {
            log::debug!(
                "cell {index}: drop {}% hold {} tp {}%: ROI {:.2}%",
                params.drop_threshold_pct,
                params.hold_days,
                params.take_profit_pct,
                cell.roi_pct
            );
        }
        cell
    }

    /// Re-run the winning parameters to recover the trade list. Runs are
    /// pure, so this reproduces exactly what the cell scored.
    fn materialize(&self, params: &ParameterSet) -> OptimizationResult {
        let run = run_portfolio(self.universe, params, self.initial_capital);
        let metrics = run.metrics(self.initial_capital);
        OptimizationResult {
            parameters: *params,
            total_profit: metrics.total_profit,
            roi_pct: metrics.roi_pct,
            win_rate_pct: metrics.win_rate_pct,
            trades: run.trades,
            abandoned: run.abandoned,
            invalid_entries: run.invalid_entries,
            coalesced: run.coalesced,
        }
    }
}

/// First-improvement scan: a later cell replaces the incumbent only with a
/// strictly greater ROI. A NaN ROI never becomes the incumbent.
pub fn select_best(cells: &[CellSummary]) -> Option<&CellSummary> {
    cells.iter().fold(None, |best, cell| match best {
        _ if cell.roi_pct.is_nan() => best,
        Some(b) if cell.roi_pct <= b.roi_pct => Some(b),
        _ => Some(cell),
    })
}
