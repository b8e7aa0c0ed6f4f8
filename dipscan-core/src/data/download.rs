//! Download orchestrator: fetch, ingest and cache a batch of symbols.

use super::cache::{CoverageResult, CsvCache};
use super::ingest;
use super::provider::{DataError, DataProvider, DownloadProgress};
use chrono::NaiveDate;

/// Download multiple symbols, running each through the ingest pipeline and
/// into the cache. A symbol whose cache already covers the range is skipped
/// unless `force` is set.
pub fn download_symbols(
    provider: &dyn DataProvider,
    cache: &CsvCache,
    symbols: &[&str],
    start: NaiveDate,
    end: NaiveDate,
    force: bool,
    progress: &dyn DownloadProgress,
) -> DownloadSummary {
    let total = symbols.len();
    let mut succeeded = 0;
    let mut errors: Vec<(String, DataError)> = Vec::new();

    for (i, symbol) in symbols.iter().enumerate() {
        progress.on_start(symbol, i, total);

        if !force && cache.covers_range(symbol, start, end) == CoverageResult::FullyCovered {
            progress.on_complete(symbol, i, total, &Ok(()));
            succeeded += 1;
            continue;
        }

        let result = download_single(provider, cache, symbol, start, end);
        progress.on_complete(symbol, i, total, &result);

        match result {
            Ok(()) => succeeded += 1,
            Err(e) => errors.push((symbol.to_string(), e)),
        }

        if !provider.is_available() {
            for sym in &symbols[(i + 1)..] {
                errors.push((sym.to_string(), DataError::ProviderBlocked));
            }
            break;
        }
    }

    let failed = errors.len();
    progress.on_batch_complete(succeeded, failed, total);

    DownloadSummary {
        total,
        succeeded,
        failed,
        errors,
    }
}

/// Fetch, clean and cache one symbol.
pub fn download_single(
    provider: &dyn DataProvider,
    cache: &CsvCache,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<(), DataError> {
    let fetched = provider.fetch(symbol, start, end)?;
    let (bars, report) = ingest::clean(fetched);
    if report.fields_filled > 0 {
        log::debug!("{symbol}: forward-filled {} field(s)", report.fields_filled);
    }
    if report.insane_bars > 0 {
        log::warn!("{symbol}: {} bar(s) fail the OHLC sanity check", report.insane_bars);
    }
    cache.write_for_range(symbol, &bars, provider.name(), start, end)
}

/// Summary of a batch download operation.
#[derive(Debug)]
pub struct DownloadSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<(String, DataError)>,
}

impl DownloadSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}
