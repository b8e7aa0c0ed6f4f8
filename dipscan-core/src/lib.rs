//! DipScan Core — domain types, price data plumbing, and the backtest engine.
//!
//! This crate contains:
//! - Domain types (price bars, parameter sets, trades)
//! - Price data: provider trait, Yahoo client, CSV cache, ingest, calendar alignment
//! - The single-instrument mean-reversion backtest (next-bar-open entry,
//!   take-profit / time-stop exits, no overlapping positions)

pub mod data;
pub mod domain;
pub mod engine;

pub use domain::{ExitReason, ParamError, ParameterSet, PriceBar, Trade};
pub use engine::{backtest, AbandonedPosition, BacktestOutcome};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn domain_types_are_send_sync() {
        assert_send::<PriceBar>();
        assert_sync::<PriceBar>();
        assert_send::<ParameterSet>();
        assert_sync::<ParameterSet>();
        assert_send::<Trade>();
        assert_sync::<Trade>();
        assert_send::<BacktestOutcome>();
        assert_sync::<BacktestOutcome>();
    }

    #[test]
    fn data_layer_is_send_sync() {
        assert_send::<data::CsvCache>();
        assert_sync::<data::CsvCache>();
        assert_send::<data::YahooProvider>();
        assert_sync::<data::YahooProvider>();
    }
}
