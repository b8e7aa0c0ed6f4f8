//! Artifact export: JSON report, CSV tables and a Markdown summary.
//!
//! The JSON report carries a `schema_version`; newer versions are rejected
//! on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::optimizer::{CellSummary, RoiHeatmap};
use crate::report::{EquityRow, OptimizationReport, TradeRow, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &OptimizationReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize report to JSON")
}

/// Deserialize a report, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<OptimizationReport> {
    let report: OptimizationReport =
        serde_json::from_str(json).context("failed to deserialize report from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: instrument, entry_date, exit_date, days_held, exit_reason,
/// entry_price, exit_price, profit_pct, profit_abs
pub fn export_trades_csv(trades: &[TradeRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "instrument",
        "entry_date",
        "exit_date",
        "days_held",
        "exit_reason",
        "entry_price",
        "exit_price",
        "profit_pct",
        "profit_abs",
    ])?;

    for t in trades {
        wtr.write_record([
            &t.instrument,
            &t.entry_date.to_string(),
            &t.exit_date.to_string(),
            &t.days_held.to_string(),
            &t.exit_reason.to_string(),
            &format!("{:.2}", t.entry_price),
            &format!("{:.2}", t.exit_price),
            &format!("{:.2}", t.profit_pct),
            &format!("{:.2}", t.profit_abs),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn export_equity_csv(equity: &[EquityRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "equity", "buy_and_hold"])?;
    for row in equity {
        wtr.write_record([
            &row.date.to_string(),
            &format!("{:.2}", row.equity),
            &format!("{:.2}", row.buy_and_hold),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Every evaluated grid cell, in enumeration order.
pub fn export_grid_csv(cells: &[CellSummary]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "drop_threshold_pct",
        "hold_days",
        "take_profit_pct",
        "total_profit",
        "roi_pct",
        "trade_count",
        "win_rate_pct",
    ])?;
    for c in cells {
        wtr.write_record([
            &c.parameters.drop_threshold_pct.to_string(),
            &c.parameters.hold_days.to_string(),
            &c.parameters.take_profit_pct.to_string(),
            &format!("{:.2}", c.total_profit),
            &format!("{:.2}", c.roi_pct),
            &c.trade_count.to_string(),
            &format!("{:.2}", c.win_rate_pct),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Mean ROI per drop threshold (rows) and holding window (columns), averaged
/// over take-profit options. Cells with no evaluated combination are blank.
pub fn export_heatmap_csv(heatmap: &RoiHeatmap) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec!["drop_threshold_pct".to_string()];
    header.extend(heatmap.hold_days.iter().map(|h| format!("hold_{h}")));
    wtr.write_record(&header)?;
    for (threshold, row) in heatmap.drop_thresholds.iter().zip(&heatmap.mean_roi) {
        let mut record = vec![threshold.to_string()];
        record.extend(
            row.iter()
                .map(|roi| roi.map_or_else(String::new, |r| format!("{r:.2}"))),
        );
        wtr.write_record(&record)?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Markdown summary ───────────────────────────────────────────────

pub fn generate_summary(report: &OptimizationReport, top: &[&CellSummary]) -> String {
    let mut md = String::with_capacity(2048);

    md.push_str("# Optimization Report\n\n");

    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Universe | {} |\n", report.universe.join(", ")));
    md.push_str(&format!(
        "| Initial Capital | {:.2} |\n",
        report.initial_capital
    ));
    md.push_str(&format!(
        "| Best Parameters | drop {}%, hold {} days, take profit {}% |\n",
        report.best.drop_threshold_pct, report.best.hold_days, report.best.take_profit_pct
    ));
    md.push_str(&format!(
        "| Lookback / Fee | {} days / {} |\n",
        report.best.lookback_days, report.best.fee_rate
    ));
    md.push_str(&format!("| Total Profit | {:.2} |\n", report.total_profit));
    md.push_str(&format!("| ROI | {:.2}% |\n", report.roi_pct));
    md.push_str(&format!("| Win Rate | {:.2}% |\n", report.win_rate_pct));
    md.push_str(&format!("| Trades | {} |\n", report.trade_count));
    md.push_str(&format!(
        "| Max Drawdown | {:.2}% |\n",
        report.max_drawdown_pct
    ));
    md.push_str(&format!(
        "| Dataset Hash | {} |\n",
        report.diagnostics.dataset_hash
    ));
    if report.diagnostics.has_synthetic {
        md.push_str("| Data | **SYNTHETIC** |\n");
    }
    md.push('\n');

    let diag = &report.diagnostics;
    md.push_str("## Diagnostics\n\n");
    md.push_str(&format!(
        "- combinations evaluated: {}/{}{}\n",
        diag.combinations_evaluated,
        diag.combinations_total,
        if diag.cancelled { " (cancelled)" } else { "" }
    ));
    md.push_str(&format!(
        "- positions open at data end: {}\n",
        diag.abandoned_positions
    ));
    md.push_str(&format!(
        "- signals skipped on invalid open: {}\n",
        diag.invalid_entries
    ));
    md.push_str(&format!(
        "- signals inside an open position: {}\n",
        diag.coalesced_signals
    ));
    if !diag.missing_instruments.is_empty() {
        md.push_str(&format!(
            "- instruments without data: {}\n",
            diag.missing_instruments.join(", ")
        ));
    }
    md.push('\n');

    if !top.is_empty() {
        md.push_str("## Top Combinations\n\n");
        md.push_str("| Drop % | Hold | TP % | ROI % | Trades | Win Rate % |\n");
        md.push_str("| ---: | ---: | ---: | ---: | ---: | ---: |\n");
        for c in top {
            md.push_str(&format!(
                "| {} | {} | {} | {:.2} | {} | {:.2} |\n",
                c.parameters.drop_threshold_pct,
                c.parameters.hold_days,
                c.parameters.take_profit_pct,
                c.roi_pct,
                c.trade_count,
                c.win_rate_pct
            ));
        }
    }

    md
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a grid search.
///
/// Creates `optimize_{timestamp}/` under `output_dir` containing
/// `report.json`, `trades.csv`, `equity.csv`, `grid.csv`, `heatmap.csv` and
/// `summary.md`.
/// Returns the created directory.
pub fn save_artifacts(
    report: &OptimizationReport,
    cells: &[CellSummary],
    top: &[&CellSummary],
    heatmap: &RoiHeatmap,
    output_dir: &Path,
) -> Result<PathBuf> {
    let dirname = format!("optimize_{}", chrono::Local::now().format("%Y%m%d_%H%M%S"));
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("report.json"), export_json(report)?)?;
    std::fs::write(run_dir.join("trades.csv"), export_trades_csv(&report.trades)?)?;
    std::fs::write(run_dir.join("equity.csv"), export_equity_csv(&report.equity)?)?;
    std::fs::write(run_dir.join("grid.csv"), export_grid_csv(cells)?)?;
    std::fs::write(run_dir.join("heatmap.csv"), export_heatmap_csv(heatmap)?)?;
    std::fs::write(run_dir.join("summary.md"), generate_summary(report, top))?;

    Ok(run_dir)
}

/// Load a report from an artifact directory's `report.json`.
pub fn load_artifacts(dir: &Path) -> Result<OptimizationReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}
