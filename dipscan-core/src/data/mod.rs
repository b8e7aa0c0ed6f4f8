//! Price data: provider trait, Yahoo client, CSV cache, ingest and alignment.

pub mod align;
pub mod cache;
pub mod csv_io;
pub mod download;
pub mod ingest;
pub mod provider;
pub mod yahoo;

pub use align::{align_closes, fill_forward_backward, union_calendar};
pub use cache::{CacheMeta, CachedSeries, CoverageResult, CsvCache};
pub use csv_io::{read_bars, write_bars, CsvReadStats};
pub use download::{download_single, download_symbols, DownloadSummary};
pub use ingest::{clean, IngestReport};
pub use provider::{DataError, DataProvider, DataSource, DownloadProgress, LogProgress};
pub use yahoo::YahooProvider;
