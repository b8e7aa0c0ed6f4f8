//! Trade: a completed round trip produced by the backtest engine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitReason {
    #[serde(rename = "Take Profit")]
    TakeProfit,
    #[serde(rename = "Time Stop")]
    TimeStop,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::TakeProfit => f.write_str("Take Profit"),
            ExitReason::TimeStop => f.write_str("Time Stop"),
        }
    }
}

/// A completed long round trip: next-bar-open entry, take-profit or time-stop exit.
///
/// Prices are raw chart prices; fees only enter through `profit_pct`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub instrument: String,

    // ── Bar indices into the instrument's series ──
    pub signal_bar: usize,
    pub entry_bar: usize,
    pub exit_bar: usize,

    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    /// `exit_bar - entry_bar`; zero for a same-bar take-profit.
    pub days_held: usize,
    pub exit_reason: ExitReason,

    pub entry_price: f64,
    pub exit_price: f64,

    /// Net return after fees as a fraction (`0.05` is +5%).
    pub profit_pct: f64,
    /// `initial_capital * profit_pct`. Every trade is scored against the full
    /// initial capital; profits never compound into later position sizes.
    pub profit_abs: f64,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.profit_abs > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_trade() -> Trade {
        Trade {
            instrument: "MSFT".into(),
            signal_bar: 3,
            entry_bar: 4,
            exit_bar: 6,
            entry_date: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
            exit_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            days_held: 2,
            exit_reason: ExitReason::TimeStop,
            entry_price: 91.0,
            exit_price: 95.0,
            profit_pct: 0.04,
            profit_abs: 400.0,
        }
    }

    #[test]
    fn winner_is_strictly_positive() {
        let mut trade = sample_trade();
        assert!(trade.is_winner());
        trade.profit_abs = 0.0;
        assert!(!trade.is_winner());
    }

    #[test]
    fn exit_reason_uses_readable_labels() {
        assert_eq!(ExitReason::TakeProfit.to_string(), "Take Profit");
        let json = serde_json::to_string(&ExitReason::TimeStop).unwrap();
        assert_eq!(json, "\"Time Stop\"");
    }
}
