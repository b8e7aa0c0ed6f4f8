//! CSV price cache.
//!
//! Layout: `{cache_dir}/{SYMBOL}.csv` plus a `{SYMBOL}.meta.json` sidecar.
//!
//! - Atomic writes (write to .tmp, rename into place)
//! - Malformed rows are skipped on load, never fatal
//! - Sidecar records date range, bar count and a blake3 content hash
//! - Coverage is judged against the range that was requested, since a
//!   series never starts or ends on an exchange holiday

use super::csv_io::{read_bars, write_bars, CsvReadStats};
use super::ingest;
use super::provider::DataError;
use crate::domain::PriceBar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Metadata sidecar for a cached symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bar_count: usize,
    pub data_hash: String,
    pub source: String,
    pub cached_at: chrono::NaiveDateTime,
    /// Range the download asked for; `None` for entries written without one.
    #[serde(default)]
    pub requested_start: Option<NaiveDate>,
    #[serde(default)]
    pub requested_end: Option<NaiveDate>,
}

impl CacheMeta {
    /// Dates this entry answers for: the bar range widened to the request.
    pub fn covered_range(&self) -> (NaiveDate, NaiveDate) {
        let start = self
            .requested_start
            .map_or(self.start_date, |r| r.min(self.start_date));
        let end = self
            .requested_end
            .map_or(self.end_date, |r| r.max(self.end_date));
        (start, end)
    }
}

/// How well the cache covers a requested date range.
#[derive(Debug, Clone, PartialEq)]
pub enum CoverageResult {
    NotCached,
    FullyCovered,
    PartiallyCovered {
        cached_start: NaiveDate,
        cached_end: NaiveDate,
    },
}

/// Bars loaded from the cache together with read diagnostics.
#[derive(Debug, Clone)]
pub struct CachedSeries {
    pub bars: Vec<PriceBar>,
    pub stats: CsvReadStats,
}

pub struct CsvCache {
    cache_dir: PathBuf,
}

impl CsvCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Symbols such as `^GDAXI` are kept verbatim; only path separators are replaced.
    fn file_stem(symbol: &str) -> String {
        symbol.replace(['/', '\\'], "_")
    }

    pub fn data_path(&self, symbol: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.csv", Self::file_stem(symbol)))
    }

    fn meta_path(&self, symbol: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}.meta.json", Self::file_stem(symbol)))
    }

    /// Write bars for a symbol, replacing any previous file.
    pub fn write(&self, symbol: &str, bars: &[PriceBar], source: &str) -> Result<(), DataError> {
        self.write_entry(symbol, bars, source, None)
    }

    /// Write bars fetched for `start..=end`, so later requests for the same
    /// range count as covered even when its endpoints are not trading days.
    pub fn write_for_range(
        &self,
        symbol: &str,
        bars: &[PriceBar],
        source: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<(), DataError> {
        self.write_entry(symbol, bars, source, Some((start, end)))
    }

    fn write_entry(
        &self,
        symbol: &str,
        bars: &[PriceBar],
        source: &str,
        requested: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<(), DataError> {
        let (first, last) = match (bars.first(), bars.last()) {
            (Some(f), Some(l)) => (f.date, l.date),
            _ => return Err(DataError::CacheError("no bars to cache".into())),
        };

        fs::create_dir_all(&self.cache_dir)
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;

        let path = self.data_path(symbol);
        let tmp_path = path.with_extension("csv.tmp");
        {
            let file = fs::File::create(&tmp_path)?;
            write_bars(file, bars)?;
        }
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::CacheError(format!("atomic rename failed: {e}"))
        })?;

        let hash_input = serde_json::to_vec(bars)
            .map_err(|e| DataError::CacheError(format!("hash serialization: {e}")))?;
        let meta = CacheMeta {
            symbol: symbol.to_string(),
            start_date: first,
            end_date: last,
            bar_count: bars.len(),
            data_hash: blake3::hash(&hash_input).to_hex().to_string(),
            source: source.to_string(),
            cached_at: chrono::Local::now().naive_local(),
            requested_start: requested.map(|(start, _)| start),
            requested_end: requested.map(|(_, end)| end),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(symbol), meta_json)
            .map_err(|e| DataError::CacheError(format!("meta write: {e}")))?;

        Ok(())
    }

    /// Load the cached series for a symbol, cleaned and sorted by date.
    pub fn load(&self, symbol: &str) -> Result<CachedSeries, DataError> {
        let path = self.data_path(symbol);
        if !path.exists() {
            return Err(DataError::NoCachedData {
                symbol: symbol.to_string(),
            });
        }

        let file = fs::File::open(&path)?;
        let (raw, stats) = read_bars(BufReader::new(file))?;
        if stats.skipped_rows > 0 {
            log::warn!(
                "{symbol}: skipped {} malformed row(s) in {}",
                stats.skipped_rows,
                path.display()
            );
        }

        let (bars, _) = ingest::clean(raw);
        if bars.is_empty() {
            return Err(DataError::NoCachedData {
                symbol: symbol.to_string(),
            });
        }
        Ok(CachedSeries { bars, stats })
    }

    pub fn get_meta(&self, symbol: &str) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(symbol)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Every symbol with a sidecar in the cache directory, sorted.
    pub fn list(&self) -> Vec<CacheMeta> {
        let Ok(entries) = fs::read_dir(&self.cache_dir) else {
            return Vec::new();
        };
        let mut metas: Vec<CacheMeta> = entries
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().ends_with(".meta.json"))
            .filter_map(|e| fs::read_to_string(e.path()).ok())
            .filter_map(|content| serde_json::from_str(&content).ok())
            .collect();
        metas.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        metas
    }

    pub fn covers_range(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> CoverageResult {
        match self.get_meta(symbol) {
            None => CoverageResult::NotCached,
            Some(meta) => {
                let (covered_start, covered_end) = meta.covered_range();
                if covered_start <= start && covered_end >= end {
                    CoverageResult::FullyCovered
                } else {
                    CoverageResult::PartiallyCovered {
                        cached_start: meta.start_date,
                        cached_end: meta.end_date,
                    }
                }
            }
        }
    }
}
