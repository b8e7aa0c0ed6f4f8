//! Universe loading for the runner.
//!
//! Resolves each symbol to a price series with this fallback order:
//! 1. cached CSV (skipped when `force_refresh` is set)
//! 2. download through the provider, then cache (unless `offline`)
//! 3. seeded random walk when `synthetic` is set
//! 4. an empty series; the symbol is listed in [`LoadedUniverse::missing`]
//!
//! A symbol that can't be loaded never fails the load. It just trades nothing.

use chrono::{Datelike, NaiveDate};
use dipscan_core::data::{
    ingest, CsvCache, DataError, DataProvider, DataSource, DownloadProgress,
};
use dipscan_core::PriceBar;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("start date {start} is after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("data error: {0}")]
    Data(#[from] DataError),
}

/// Options controlling how a universe is loaded.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Never make network requests.
    pub offline: bool,
    /// Generate synthetic bars when real data is unavailable.
    pub synthetic: bool,
    /// Re-download even if cached.
    pub force_refresh: bool,
}

/// Price series for every requested symbol, with provenance.
#[derive(Debug, Clone, Default)]
pub struct LoadedUniverse {
    /// Symbols in request order.
    pub symbols: Vec<String>,
    /// Bars per symbol, filtered to the requested range. Missing symbols map
    /// to an empty vector.
    pub series: HashMap<String, Vec<PriceBar>>,
    pub sources: HashMap<String, DataSource>,
    /// Symbols that ended up with no data.
    pub missing: Vec<String>,
    /// BLAKE3 over all loaded bars, in sorted symbol order.
    pub dataset_hash: String,
    pub has_synthetic: bool,
}

impl LoadedUniverse {
    /// Build a universe straight from in-memory series (tests, callers with
    /// their own data source). Symbols without bars count as missing.
    pub fn from_series(symbols: &[&str], mut series: HashMap<String, Vec<PriceBar>>) -> Self {
        let mut sources = HashMap::new();
        let mut missing = Vec::new();
        for symbol in symbols {
            let bars = series.entry(symbol.to_string()).or_default();
            if bars.is_empty() {
                missing.push(symbol.to_string());
                sources.insert(symbol.to_string(), DataSource::Missing);
            } else {
                sources.insert(symbol.to_string(), DataSource::Cache);
            }
        }
        let dataset_hash = compute_dataset_hash(&series);
        Self {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            series,
            sources,
            missing,
            dataset_hash,
            has_synthetic: false,
        }
    }

    /// Bars for a symbol; empty when the symbol is unknown or missing.
    pub fn bars(&self, symbol: &str) -> &[PriceBar] {
        self.series.get(symbol).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Instruments with at least one bar in range.
    pub fn loaded_count(&self) -> usize {
        self.symbols.len() - self.missing.len()
    }
}

/// Load every symbol of a universe. Only an invalid date range is an error.
pub fn load_universe(
    symbols: &[&str],
    cache: &CsvCache,
    provider: Option<&dyn DataProvider>,
    progress: Option<&dyn DownloadProgress>,
    opts: &LoadOptions,
) -> Result<LoadedUniverse, LoadError> {
    if opts.start > opts.end {
        return Err(LoadError::InvalidRange {
            start: opts.start,
            end: opts.end,
        });
    }

    let total = symbols.len();
    let mut series: HashMap<String, Vec<PriceBar>> = HashMap::new();
    let mut sources: HashMap<String, DataSource> = HashMap::new();
    let mut missing = Vec::new();
    let mut has_synthetic = false;

    for (i, symbol) in symbols.iter().enumerate() {
        let (bars, source) = match resolve_symbol(symbol, i, total, cache, provider, progress, opts)
        {
            Some(found) => found,
            None if opts.synthetic => {
                log::warn!("{symbol}: generating synthetic data, results are tagged synthetic");
                has_synthetic = true;
                (
                    generate_synthetic_bars(symbol, opts.start, opts.end),
                    DataSource::Synthetic,
                )
            }
            None => {
                log::warn!("{symbol}: no data available, instrument will trade nothing");
                (Vec::new(), DataSource::Missing)
            }
        };

        let bars = within_range(bars, opts.start, opts.end);
        if bars.is_empty() {
            if source != DataSource::Missing {
                log::warn!(
                    "{symbol}: no bars between {} and {}",
                    opts.start,
                    opts.end
                );
            }
            missing.push(symbol.to_string());
        }
        sources.insert(symbol.to_string(), source);
        series.insert(symbol.to_string(), bars);
    }

    if let Some(p) = progress {
        p.on_batch_complete(total - missing.len(), missing.len(), total);
    }

    let dataset_hash = compute_dataset_hash(&series);
    let universe = LoadedUniverse {
        symbols: symbols.iter().map(|s| s.to_string()).collect(),
        series,
        sources,
        missing,
        dataset_hash,
        has_synthetic,
    };
    log::info!(
        "loaded {}/{} instrument(s), dataset {}",
        universe.loaded_count(),
        total,
        &universe.dataset_hash[..12]
    );

    Ok(universe)
}

/// Cache, then provider. `None` when neither produced bars.
fn resolve_symbol(
    symbol: &str,
    index: usize,
    total: usize,
    cache: &CsvCache,
    provider: Option<&dyn DataProvider>,
    progress: Option<&dyn DownloadProgress>,
    opts: &LoadOptions,
) -> Option<(Vec<PriceBar>, DataSource)> {
    if !opts.force_refresh {
        match cache.load(symbol) {
            Ok(cached) => return Some((cached.bars, DataSource::Cache)),
            Err(DataError::NoCachedData { .. }) => {}
            Err(e) => log::warn!("{symbol}: unreadable cache entry: {e}"),
        }
    }

    if opts.offline {
        return None;
    }
    let prov = provider.filter(|p| p.is_available())?;

    if let Some(p) = progress {
        p.on_start(symbol, index, total);
    }
    let fetched = prov.fetch(symbol, opts.start, opts.end).and_then(|raw| {
        let (bars, report) = ingest::clean(raw);
        if report.insane_bars > 0 {
            log::warn!("{symbol}: {} bar(s) fail the OHLC sanity check", report.insane_bars);
        }
        cache.write_for_range(symbol, &bars, prov.name(), opts.start, opts.end)?;
        Ok(bars)
    });
    let status = fetched.as_ref().map(|_| ()).map_err(clone_error);
    if let Some(p) = progress {
        p.on_complete(symbol, index, total, &status);
    }

    match fetched {
        Ok(bars) if !bars.is_empty() => Some((bars, DataSource::YahooFinance)),
        Ok(_) => None,
        Err(e) => {
            log::warn!("{symbol}: download failed: {e}");
            None
        }
    }
}

/// Progress callbacks take a `Result<(), DataError>`; `DataError` wraps
/// non-clonable io/csv errors, so those are flattened to text.
fn clone_error(e: &DataError) -> DataError {
    match e {
        DataError::NetworkUnreachable(msg) => DataError::NetworkUnreachable(msg.clone()),
        DataError::RateLimited { retry_after_secs } => DataError::RateLimited {
            retry_after_secs: *retry_after_secs,
        },
        DataError::SymbolNotFound { symbol } => DataError::SymbolNotFound {
            symbol: symbol.clone(),
        },
        DataError::ProviderBlocked => DataError::ProviderBlocked,
        other => DataError::Other(other.to_string()),
    }
}

fn within_range(bars: Vec<PriceBar>, start: NaiveDate, end: NaiveDate) -> Vec<PriceBar> {
    bars.into_iter()
        .filter(|b| b.date >= start && b.date <= end)
        .collect()
}

/// Deterministic BLAKE3 hash over every bar, independent of map order.
pub fn compute_dataset_hash(series: &HashMap<String, Vec<PriceBar>>) -> String {
    let mut hasher = blake3::Hasher::new();

    let mut symbols: Vec<&String> = series.keys().collect();
    symbols.sort();

    for symbol in symbols {
        hasher.update(symbol.as_bytes());
        for bar in &series[symbol] {
            hasher.update(bar.date.to_string().as_bytes());
            hasher.update(&bar.open.to_le_bytes());
            hasher.update(&bar.high.to_le_bytes());
            hasher.update(&bar.low.to_le_bytes());
            hasher.update(&bar.close.to_le_bytes());
        }
    }

    hasher.finalize().to_hex().to_string()
}

/// Seeded random walk from 100.0 on weekdays. Development only.
pub fn generate_synthetic_bars(symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<PriceBar> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut bars = Vec::new();
    let mut price = 100.0_f64;
    let mut current = start;

    while current <= end {
        let weekday = current.weekday();
        if weekday != chrono::Weekday::Sat && weekday != chrono::Weekday::Sun {
            let daily_return: f64 = rng.gen_range(-0.03..0.03);
            let open = price * (1.0 + rng.gen_range(-0.005..0.005));
            let close = price * (1.0 + daily_return);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
            bars.push(PriceBar::new(current, open, high, low, close));
            price = close;
        }
        current += chrono::Duration::days(1);
    }

    bars
}
