//! DipScan CLI — download, backtest, optimize, and cache commands.
//!
//! Commands:
//! - `download` — fetch daily history from Yahoo Finance into the CSV cache
//! - `backtest` — run one parameter set across a universe and list the trades
//! - `optimize` — grid search from a TOML request (or flags), save artifacts
//! - `cache status` — report symbols, date ranges and sizes in the cache

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dipscan_core::data::{download_symbols, CsvCache, DataProvider, LogProgress, YahooProvider};
use dipscan_core::ParameterSet;
use dipscan_runner::config::single_run_defaults;
use dipscan_runner::export::save_artifacts;
use dipscan_runner::{
    load_universe, run_portfolio, GridSearch, LoadOptions, LoadedUniverse, OptimizationReport,
    OptimizeConfig, OptimizeError, RoiHeatmap,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "dipscan", about = "DipScan CLI — buy-the-dip backtesting and grid search")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download daily history from Yahoo Finance into the CSV cache.
    Download {
        /// Symbols to download (e.g., ^GSPC MSFT SIE.DE).
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Start date (YYYY-MM-DD).
        #[arg(long, default_value = "2000-01-01")]
        start: String,

        /// End date (YYYY-MM-DD).
        #[arg(long, default_value = "2025-01-01")]
        end: String,

        /// Force re-download even if cached.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Cache directory.
        #[arg(long, default_value = "data/cache")]
        cache_dir: PathBuf,
    },
    /// Run a single parameter set across a universe.
    Backtest {
        /// Symbols. Defaults to the stock universe.
        symbols: Vec<String>,

        /// Drop over the lookback window that triggers a buy, in percent [default: 10].
        #[arg(long = "drop")]
        drop_pct: Option<f64>,

        /// Lookback window in bars [default: 15].
        #[arg(long)]
        lookback: Option<usize>,

        /// Maximum bars held, counting the entry bar [default: 780].
        #[arg(long)]
        hold: Option<usize>,

        /// Take-profit threshold in percent [default: 5].
        #[arg(long)]
        take_profit: Option<f64>,

        /// Fee per side as a fraction [default: 0.001].
        #[arg(long)]
        fee: Option<f64>,

        #[arg(long, default_value_t = 10_000.0)]
        capital: f64,

        #[command(flatten)]
        data: DataArgs,
    },
    /// Grid search over drop × hold × take-profit.
    Optimize {
        /// TOML request file. Without it the stock grid and universe are used.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the universe.
        #[arg(long, num_args = 1..)]
        symbols: Vec<String>,

        /// Evaluate cells on a single thread.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Number of top combinations to print.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Print the report as JSON instead of a summary.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        #[command(flatten)]
        data: DataArgs,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

/// Data-loading flags shared by `backtest` and `optimize`. Unset flags fall
/// back to the request file (for `optimize`) or the defaults.
#[derive(clap::Args)]
struct DataArgs {
    /// Start date (YYYY-MM-DD).
    #[arg(long)]
    start: Option<String>,

    /// End date (YYYY-MM-DD).
    #[arg(long)]
    end: Option<String>,

    /// Cache directory.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Re-download every symbol.
    #[arg(long, default_value_t = false)]
    force_refresh: bool,

    /// Offline mode: no network access.
    #[arg(long, default_value_t = false)]
    offline: bool,

    /// Use synthetic data as fallback.
    #[arg(long, default_value_t = false)]
    synthetic: bool,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report symbols, date ranges and sizes.
    Status {
        #[arg(long, default_value = "data/cache")]
        cache_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Download {
            symbols,
            start,
            end,
            force,
            cache_dir,
        } => run_download(symbols, &start, &end, force, cache_dir),
        Commands::Backtest {
            symbols,
            drop_pct,
            lookback,
            hold,
            take_profit,
            fee,
            capital,
            data,
        } => {
            let defaults = single_run_defaults();
            let params = ParameterSet {
                drop_threshold_pct: drop_pct.unwrap_or(defaults.drop_threshold_pct),
                lookback_days: lookback.unwrap_or(defaults.lookback_days),
                hold_days: hold.unwrap_or(defaults.hold_days),
                take_profit_pct: take_profit.unwrap_or(defaults.take_profit_pct),
                fee_rate: fee.unwrap_or(defaults.fee_rate),
            };
            run_backtest_cmd(symbols, params, capital, data)
        }
        Commands::Optimize {
            config,
            symbols,
            sequential,
            top,
            json,
            output_dir,
            data,
        } => run_optimize(config, symbols, sequential, top, json, output_dir, data),
        Commands::Cache { action } => match action {
            CacheAction::Status { cache_dir } => run_cache_status(&cache_dir),
        },
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

fn run_download(
    symbols: Vec<String>,
    start: &str,
    end: &str,
    force: bool,
    cache_dir: PathBuf,
) -> Result<()> {
    let start_date = parse_date(start)?;
    let end_date = parse_date(end)?;

    let provider = YahooProvider::new()?;
    let cache = CsvCache::new(cache_dir);
    let sym_refs: Vec<&str> = symbols.iter().map(|s| s.as_str()).collect();

    let summary = download_symbols(
        &provider,
        &cache,
        &sym_refs,
        start_date,
        end_date,
        force,
        &LogProgress,
    );

    if !summary.all_succeeded() {
        for (sym, err) in &summary.errors {
            eprintln!("Error for {sym}: {err}");
        }
        std::process::exit(1);
    }

    Ok(())
}

/// Resolve the universe through cache, provider and synthetic fallback.
fn load(symbols: &[String], opts: &LoadOptions, cache_dir: &Path) -> Result<LoadedUniverse> {
    let cache = CsvCache::new(cache_dir);
    let provider = if opts.offline {
        None
    } else {
        match YahooProvider::new() {
            Ok(p) => Some(p),
            Err(e) => {
                log::warn!("Yahoo provider unavailable: {e}");
                None
            }
        }
    };
    let provider_ref = provider.as_ref().map(|p| p as &dyn DataProvider);
    let sym_refs: Vec<&str> = symbols.iter().map(|s| s.as_str()).collect();

    Ok(load_universe(
        &sym_refs,
        &cache,
        provider_ref,
        Some(&LogProgress),
        opts,
    )?)
}

fn run_backtest_cmd(
    symbols: Vec<String>,
    params: ParameterSet,
    capital: f64,
    data: DataArgs,
) -> Result<()> {
    params.validate()?;
    if !capital.is_finite() || capital <= 0.0 {
        bail!("--capital must be positive, got {capital}");
    }

    let defaults = OptimizeConfig::with_defaults();
    let symbols = if symbols.is_empty() {
        defaults.universe.symbols.clone()
    } else {
        symbols
    };
    let opts = LoadOptions {
        start: data
            .start
            .as_deref()
            .map(parse_date)
            .transpose()?
            .unwrap_or(defaults.backtest.start_date),
        end: data
            .end
            .as_deref()
            .map(parse_date)
            .transpose()?
            .unwrap_or(defaults.backtest.end_date),
        offline: data.offline,
        synthetic: data.synthetic,
        force_refresh: data.force_refresh,
    };
    let cache_dir = data.cache_dir.unwrap_or(defaults.data.cache_dir);

    let universe = load(&symbols, &opts, &cache_dir)?;
    let run = run_portfolio(&universe, &params, capital);
    let metrics = run.metrics(capital);

    println!();
    println!("=== Backtest ===");
    println!(
        "Parameters:     drop {}% over {} days, hold {}, take profit {}%, fee {}",
        params.drop_threshold_pct,
        params.lookback_days,
        params.hold_days,
        params.take_profit_pct,
        params.fee_rate
    );
    println!("Period:         {} to {}", opts.start, opts.end);
    println!();
    if !run.trades.is_empty() {
        println!(
            "{:<8} {:<10} {:<10} {:>5} {:<11} {:>10} {:>10} {:>8} {:>10}",
            "Symbol", "Entry", "Exit", "Days", "Reason", "Buy", "Sell", "Ret %", "Profit"
        );
        println!("{}", "-".repeat(92));
        for t in &run.trades {
            println!(
                "{:<8} {:<10} {:<10} {:>5} {:<11} {:>10.2} {:>10.2} {:>8.2} {:>10.2}",
                t.instrument,
                t.entry_date,
                t.exit_date,
                t.days_held,
                t.exit_reason.to_string(),
                t.entry_price,
                t.exit_price,
                t.profit_pct * 100.0,
                t.profit_abs
            );
        }
        println!();
    }
    println!("Trades:         {}", metrics.trade_count);
    println!("Total Profit:   {:.2}", metrics.total_profit);
    println!("ROI:            {:.2}%", metrics.roi_pct);
    println!("Win Rate:       {:.1}%", metrics.win_rate_pct);
    println!("Profit Factor:  {:.2}", metrics.profit_factor);
    println!("Avg Days Held:  {:.1}", metrics.avg_days_held);
    if let Some((symbol, count)) = run.most_active_instrument() {
        println!("Most Active:    {symbol} ({count} trades)");
    }
    print_diagnostics(&universe, run.abandoned.len(), run.invalid_entries);
    println!();

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_optimize(
    config_path: Option<PathBuf>,
    symbols: Vec<String>,
    sequential: bool,
    top: usize,
    json: bool,
    output_dir: PathBuf,
    data: DataArgs,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => OptimizeConfig::from_file(&path)?,
        None => OptimizeConfig::with_defaults(),
    };

    // Flags override the request file.
    if !symbols.is_empty() {
        config.universe.symbols = symbols;
    }
    if let Some(start) = data.start.as_deref() {
        config.backtest.start_date = parse_date(start)?;
    }
    if let Some(end) = data.end.as_deref() {
        config.backtest.end_date = parse_date(end)?;
    }
    if let Some(dir) = data.cache_dir {
        config.data.cache_dir = dir;
    }
    config.data.force_refresh |= data.force_refresh;
    config.data.offline |= data.offline;
    config.data.synthetic |= data.synthetic;
    config.backtest.parallel &= !sequential;
    config.validate()?;

    let opts = LoadOptions {
        start: config.backtest.start_date,
        end: config.backtest.end_date,
        offline: config.data.offline,
        synthetic: config.data.synthetic,
        force_refresh: config.data.force_refresh,
    };
    let universe = load(&config.universe.symbols, &opts, &config.data.cache_dir)?;
    let capital = config.backtest.initial_capital;

    let outcome = match GridSearch::new(&universe, capital)
        .with_parallelism(config.backtest.parallel)
        .run(&config.param_grid())
    {
        Ok(outcome) => outcome,
        Err(OptimizeError::NoResult { combinations }) => {
            println!("No result found across {combinations} combination(s): no trades in the winning cell.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let report = OptimizationReport::build(&outcome, &universe, capital);
    let ranked = outcome.top_n(top);
    let heatmap = outcome.roi_heatmap();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, &ranked);
        print_heatmap(&heatmap);
    }

    let run_dir = save_artifacts(&report, &outcome.cells, &ranked, &heatmap, &output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());

    Ok(())
}

fn print_report(report: &OptimizationReport, ranked: &[&dipscan_runner::CellSummary]) {
    println!();
    println!("=== Best Combination ===");
    println!("Drop Threshold: {}%", report.best.drop_threshold_pct);
    println!("Hold Days:      {}", report.best.hold_days);
    println!("Take Profit:    {}%", report.best.take_profit_pct);
    println!(
        "Lookback / Fee: {} days / {}",
        report.best.lookback_days, report.best.fee_rate
    );
    println!();
    println!("--- Performance ---");
    println!("Total Profit:   {:.2}", report.total_profit);
    println!("ROI:            {:.2}%", report.roi_pct);
    println!("Win Rate:       {:.2}%", report.win_rate_pct);
    println!("Trades:         {}", report.trade_count);
    println!("Max Drawdown:   {:.2}%", report.max_drawdown_pct);
    if let (Some(first), Some(last)) = (report.equity.first(), report.equity.last()) {
        println!(
            "Equity:         {:.2} to {:.2} (buy & hold {:.2})",
            first.equity, last.equity, last.buy_and_hold
        );
    }

    let diag = &report.diagnostics;
    println!();
    println!(
        "Combinations:   {}/{}{}",
        diag.combinations_evaluated,
        diag.combinations_total,
        if diag.cancelled { " (cancelled)" } else { "" }
    );
    println!("Open at end:    {}", diag.abandoned_positions);
    println!("Bad entries:    {}", diag.invalid_entries);
    if !diag.missing_instruments.is_empty() {
        println!("WARNING: no data for {}", diag.missing_instruments.join(", "));
    }
    if diag.has_synthetic {
        println!("WARNING: Results based on SYNTHETIC data");
    }

    if !ranked.is_empty() {
        println!();
        println!(
            "{:>7} {:>5} {:>6} {:>10} {:>7} {:>9}",
            "Drop %", "Hold", "TP %", "ROI %", "Trades", "Win %"
        );
        println!("{}", "-".repeat(49));
        for c in ranked {
            println!(
                "{:>7} {:>5} {:>6} {:>10.2} {:>7} {:>9.1}",
                c.parameters.drop_threshold_pct,
                c.parameters.hold_days,
                c.parameters.take_profit_pct,
                c.roi_pct,
                c.trade_count,
                c.win_rate_pct
            );
        }
    }
    println!();
}

fn print_heatmap(heatmap: &RoiHeatmap) {
    if heatmap.hold_days.is_empty() {
        return;
    }
    println!("--- Mean ROI % (rows: drop %, columns: hold days) ---");
    print!("{:>7}", "");
    for hold in &heatmap.hold_days {
        print!(" {hold:>8}");
    }
    println!();
    for (threshold, row) in heatmap.drop_thresholds.iter().zip(&heatmap.mean_roi) {
        print!("{threshold:>7}");
        for roi in row {
            match roi {
                Some(r) => print!(" {r:>8.2}"),
                None => print!(" {:>8}", "-"),
            }
        }
        println!();
    }
    println!();
}

fn print_diagnostics(universe: &LoadedUniverse, abandoned: usize, invalid_entries: usize) {
    if abandoned > 0 {
        println!("Open at end:    {abandoned} (not counted)");
    }
    if invalid_entries > 0 {
        println!("Bad entries:    {invalid_entries} signal(s) skipped");
    }
    if !universe.missing.is_empty() {
        println!("WARNING: no data for {}", universe.missing.join(", "));
    }
    if universe.has_synthetic {
        println!("WARNING: Results based on SYNTHETIC data");
    }
}

fn run_cache_status(cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let cache = CsvCache::new(cache_dir);
    let metas = cache.list();
    if metas.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    let mut total_size: u64 = 0;
    let mut rows: Vec<(String, String, String, u64)> = Vec::new();
    for meta in &metas {
        let size = std::fs::metadata(cache.data_path(&meta.symbol))
            .map(|m| m.len())
            .unwrap_or(0);
        total_size += size;
        rows.push((
            meta.symbol.clone(),
            format!("{} to {}", meta.start_date, meta.end_date),
            format!("{} bars", meta.bar_count),
            size,
        ));
    }

    println!("Cache: {}", cache_dir.display());
    println!("Symbols: {}", metas.len());
    println!("Total size: {}", format_size(total_size));
    println!();
    println!("{:<8} {:<25} {:<12} {:>10}", "Symbol", "Date Range", "Bars", "Size");
    println!("{}", "-".repeat(58));
    for (sym, range, bars, size) in &rows {
        println!("{:<8} {:<25} {:<12} {:>10}", sym, range, bars, format_size(*size));
    }

    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
