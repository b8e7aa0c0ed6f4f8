//! ParameterSet: the five knobs that fully determine one instrument's run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected parameter values.
#[derive(Debug, Error, PartialEq)]
pub enum ParamError {
    #[error("lookback_days must be at least 1")]
    ZeroLookback,
    #[error("hold_days must be at least 1")]
    ZeroHold,
    #[error("{field} must be a finite number, got {value}")]
    NotFinite { field: &'static str, value: f64 },
    #[error("fee_rate must be in [0, 1), got {0}")]
    FeeOutOfRange(f64),
}

/// Strategy parameters for a single backtest run.
///
/// Percentages are expressed in percent (`5.0` means 5%); `fee_rate` is a
/// fraction charged on each side (`0.001` means 0.1% per order).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    /// Decline over `lookback_days` (percent) that triggers a buy signal.
    pub drop_threshold_pct: f64,
    pub lookback_days: usize,
    /// Maximum bars a position stays open, counting the entry bar.
    pub hold_days: usize,
    pub take_profit_pct: f64,
    pub fee_rate: f64,
}

impl ParameterSet {
    pub fn validate(&self) -> Result<(), ParamError> {
        if self.lookback_days == 0 {
            return Err(ParamError::ZeroLookback);
        }
        if self.hold_days == 0 {
            return Err(ParamError::ZeroHold);
        }
        for (field, value) in [
            ("drop_threshold_pct", self.drop_threshold_pct),
            ("take_profit_pct", self.take_profit_pct),
            ("fee_rate", self.fee_rate),
        ] {
            if !value.is_finite() {
                return Err(ParamError::NotFinite { field, value });
            }
        }
        if !(0.0..1.0).contains(&self.fee_rate) {
            return Err(ParamError::FeeOutOfRange(self.fee_rate));
        }
        Ok(())
    }

    /// Signal threshold as a (negative) fractional return.
    pub fn signal_threshold(&self) -> f64 {
        -(self.drop_threshold_pct / 100.0)
    }

    /// Limit price for the take-profit exit given the raw entry price.
    pub fn target_price(&self, raw_entry: f64) -> f64 {
        raw_entry * (1.0 + self.take_profit_pct / 100.0)
    }

    /// Raw price inflated by the buy-side fee.
    pub fn effective_entry(&self, raw_entry: f64) -> f64 {
        raw_entry * (1.0 + self.fee_rate)
    }

    /// Raw price deflated by the sell-side fee.
    pub fn effective_exit(&self, raw_exit: f64) -> f64 {
        raw_exit * (1.0 - self.fee_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ParameterSet {
        ParameterSet {
            drop_threshold_pct: 10.0,
            lookback_days: 15,
            hold_days: 780,
            take_profit_pct: 5.0,
            fee_rate: 0.001,
        }
    }

    #[test]
    fn valid_params_pass() {
        assert_eq!(params().validate(), Ok(()));
    }

    #[test]
    fn zero_windows_rejected() {
        let mut p = params();
        p.lookback_days = 0;
        assert_eq!(p.validate(), Err(ParamError::ZeroLookback));

        let mut p = params();
        p.hold_days = 0;
        assert_eq!(p.validate(), Err(ParamError::ZeroHold));
    }

    #[test]
    fn fee_must_be_a_fraction() {
        let mut p = params();
        p.fee_rate = 1.0;
        assert_eq!(p.validate(), Err(ParamError::FeeOutOfRange(1.0)));
        p.fee_rate = -0.01;
        assert!(p.validate().is_err());
    }

    #[test]
    fn nan_threshold_rejected() {
        let mut p = params();
        p.drop_threshold_pct = f64::NAN;
        assert!(matches!(
            p.validate(),
            Err(ParamError::NotFinite {
                field: "drop_threshold_pct",
                ..
            })
        ));
    }

    #[test]
    fn price_helpers() {
        let p = params();
        assert!((p.signal_threshold() + 0.10).abs() < 1e-12);
        assert!((p.target_price(100.0) - 105.0).abs() < 1e-9);
        assert!((p.effective_entry(100.0) - 100.1).abs() < 1e-9);
        assert!((p.effective_exit(100.0) - 99.9).abs() < 1e-9);
    }
}
