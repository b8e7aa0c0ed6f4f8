//! Drop detection: lookback percentage change and the bars where it fires.
//!
//! The change at bar `i` uses closes `i - lookback` and `i` only, so a
//! signal on bar `i` is known at that bar's close and never depends on
//! later bars.

use crate::domain::PriceBar;

/// `close[i] / close[i - lookback] - 1` for every bar, `None` where undefined.
///
/// Undefined for the first `lookback` bars, and wherever the reference close
/// is non-positive or either close is not finite.
pub fn lookback_change(bars: &[PriceBar], lookback: usize) -> Vec<Option<f64>> {
    (0..bars.len())
        .map(|i| {
            let reference = bars.get(i.checked_sub(lookback)?)?.close;
            let close = bars[i].close;
            if !(reference.is_finite() && close.is_finite()) || reference <= 0.0 {
                return None;
            }
            Some(close / reference - 1.0)
        })
        .collect()
}

/// Indices (ascending) where the change is strictly below `threshold`.
pub fn signal_bars(changes: &[Option<f64>], threshold: f64) -> Vec<usize> {
    changes
        .iter()
        .enumerate()
        .filter_map(|(i, c)| c.filter(|c| *c < threshold).map(|_| i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bars_from_closes(closes: &[f64]) -> Vec<PriceBar> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar::new(base + chrono::Duration::days(i as i64), c, c, c, c))
            .collect()
    }

    #[test]
    fn warmup_bars_are_undefined() {
        let bars = bars_from_closes(&[100.0, 90.0, 81.0]);
        let changes = lookback_change(&bars, 2);
        assert_eq!(changes[0], None);
        assert_eq!(changes[1], None);
        assert!((changes[2].unwrap() + 0.19).abs() < 1e-12);
    }

    #[test]
    fn one_day_drop_fires_once() {
        let bars =
            bars_from_closes(&[100.0, 99.0, 98.0, 90.0, 91.0, 92.0, 95.0, 97.0, 99.0, 101.0]);
        let changes = lookback_change(&bars, 1);
        assert_eq!(signal_bars(&changes, -0.08), vec![3]);
    }

    #[test]
    fn non_positive_reference_is_undefined() {
        let bars = bars_from_closes(&[0.0, 10.0, -5.0, 4.0]);
        let changes = lookback_change(&bars, 1);
        assert_eq!(changes[1], None);
        assert_eq!(changes[3], None);
        assert_eq!(changes[2], Some(-1.5));
    }

    #[test]
    fn threshold_is_strict() {
        let changes = vec![Some(-0.1), Some(-0.1000001), None];
        assert_eq!(signal_bars(&changes, -0.1), vec![1]);
    }
}
