//! Backtest engine: signal detection and the per-instrument trade scan.

pub mod backtest;
pub mod signal;

pub use backtest::{backtest, AbandonedPosition, BacktestOutcome};
pub use signal::{lookback_change, signal_bars};
