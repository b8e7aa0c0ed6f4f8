//! Multi-instrument calendar alignment.
//!
//! Instruments trade on different calendars (exchange holidays, late
//! listings). Alignment maps each instrument's closes onto the union
//! calendar; unlike the engine's own series, the aligned view may carry
//! gaps, which callers fill explicitly.

use crate::domain::PriceBar;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

/// Sorted, deduplicated union of every series' trading dates.
pub fn union_calendar<'a, I>(series: I) -> Vec<NaiveDate>
where
    I: IntoIterator<Item = &'a [PriceBar]>,
{
    let mut all_dates = BTreeSet::new();
    for bars in series {
        all_dates.extend(bars.iter().map(|b| b.date));
    }
    all_dates.into_iter().collect()
}

/// Closes for `bars` on each calendar date; `None` where the instrument has
/// no bar or a non-finite close.
pub fn align_closes(calendar: &[NaiveDate], bars: &[PriceBar]) -> Vec<Option<f64>> {
    let by_date: HashMap<NaiveDate, f64> = bars.iter().map(|b| (b.date, b.close)).collect();
    calendar
        .iter()
        .map(|d| by_date.get(d).copied().filter(|c| c.is_finite()))
        .collect()
}

/// Forward-fill, then backward-fill the leading gap.
///
/// Returns `None` when no value is present at all.
pub fn fill_forward_backward(values: &[Option<f64>]) -> Option<Vec<f64>> {
    let first = values.iter().flatten().copied().next()?;
    let mut last = first;
    Some(
        values
            .iter()
            .map(|v| {
                if let Some(x) = v {
                    last = *x;
                }
                last
            })
            .collect(),
    )
}
