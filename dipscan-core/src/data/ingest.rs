//! Ingest pipeline: turn whatever a source returned into an engine-ready series.
//!
//! Steps, in order:
//! 1. sort by date (stable)
//! 2. drop duplicate dates, keeping the first occurrence
//! 3. drop leading bars that have no finite close
//! 4. forward-fill non-finite OHLC fields from the previous bar
//! 5. count bars that still fail [`PriceBar::is_sane`] (inverted high/low,
//!    non-positive prices); such bars are kept

use crate::domain::PriceBar;

/// Counts of what [`clean`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub duplicates_dropped: usize,
    pub leading_dropped: usize,
    pub fields_filled: usize,
    pub insane_bars: usize,
}

/// Clean a raw series. The result is sorted, unique by date, and every OHLC
/// field is finite.
pub fn clean(mut bars: Vec<PriceBar>) -> (Vec<PriceBar>, IngestReport) {
    let mut report = IngestReport::default();

    bars.sort_by_key(|b| b.date);
    let before = bars.len();
    bars.dedup_by_key(|b| b.date);
    report.duplicates_dropped = before - bars.len();

    let first_valid = bars
        .iter()
        .position(|b| b.close.is_finite())
        .unwrap_or(bars.len());
    report.leading_dropped = first_valid;
    bars.drain(..first_valid);

    let mut prev: Option<PriceBar> = None;
    for bar in bars.iter_mut() {
        if let Some(p) = prev {
            for (field, fallback) in [
                (&mut bar.open, p.open),
                (&mut bar.high, p.high),
                (&mut bar.low, p.low),
                (&mut bar.close, p.close),
            ] {
                if !field.is_finite() {
                    *field = fallback;
                    report.fields_filled += 1;
                }
            }
        } else {
            // First bar: borrow from its own close so no field stays void.
            let close = bar.close;
            for field in [&mut bar.open, &mut bar.high, &mut bar.low] {
                if !field.is_finite() {
                    *field = close;
                    report.fields_filled += 1;
                }
            }
        }
        prev = Some(*bar);
    }
    report.insane_bars = bars.iter().filter(|b| !b.is_sane()).count();

    (bars, report)
}
