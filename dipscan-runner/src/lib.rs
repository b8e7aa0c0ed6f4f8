//! DipScan Runner — universe loading, portfolio runs, grid search, reports.
//!
//! This crate builds on `dipscan-core` to provide:
//! - Universe loading with cache/download/synthetic fallback
//! - The portfolio runner (engine over every instrument)
//! - Grid search over drop × hold × take-profit, parallel and cancellable
//! - Equity reconciliation against an equal-weight buy-and-hold benchmark
//! - The caller-facing report and its JSON/CSV/Markdown export

pub mod config;
pub mod data_loader;
pub mod equity;
pub mod export;
pub mod metrics;
pub mod optimizer;
pub mod portfolio;
pub mod report;

pub use config::{ConfigError, OptimizeConfig};
pub use data_loader::{load_universe, LoadError, LoadOptions, LoadedUniverse};
pub use equity::{reconcile, reconcile_universe, EquityPoint};
pub use metrics::RunMetrics;
pub use optimizer::{
    CellSummary, GridSearch, GridSearchOutcome, OptimizationResult, OptimizeError, ParamGrid,
    RoiHeatmap,
};
pub use portfolio::{run_portfolio, PortfolioRun};
pub use report::{chart_series, OptimizationReport, SCHEMA_VERSION};
