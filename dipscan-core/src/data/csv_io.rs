//! CSV reading and writing for daily OHLC series.
//!
//! Two layouts are accepted on read:
//! - flat: a single header row naming `date, open, high, low, close` (any
//!   case, extra columns ignored)
//! - multi-row: the layout pandas writes for multi-ticker downloads, where
//!   row one names the field (`Price, Close, High, ...`), row two the ticker
//!   and row three is `Date,,,`. The first column carrying a field wins.
//!
//! Rows with an unparseable date or price are skipped and counted. Empty
//! price cells are read as NaN and left for [`super::ingest::clean`].

use crate::domain::PriceBar;
use chrono::NaiveDate;
use csv::StringRecord;
use std::io::{Read, Write};

use super::provider::DataError;

/// What happened while reading a CSV.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvReadStats {
    pub rows_read: usize,
    pub skipped_rows: usize,
}

#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
}

impl ColumnMap {
    fn from_header(header: &StringRecord) -> Result<Self, DataError> {
        let find = |name: &str| {
            header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let missing = |name: &str| DataError::Other(format!("csv header has no '{name}' column"));

        // pandas writes the index column under the "Price" label in the
        // multi-row layout, so fall back to column 0 for dates.
        let date = find("date").unwrap_or(0);
        Ok(Self {
            date,
            open: find("open").ok_or_else(|| missing("open"))?,
            high: find("high").ok_or_else(|| missing("high"))?,
            low: find("low").ok_or_else(|| missing("low"))?,
            close: find("close").ok_or_else(|| missing("close"))?,
        })
    }
}

fn is_header_continuation(record: &StringRecord) -> bool {
    matches!(
        record.get(0).map(|c| c.trim().to_ascii_lowercase()).as_deref(),
        Some("ticker") | Some("date")
    )
}

/// Parse `YYYY-MM-DD`, tolerating a trailing time or offset.
fn parse_date(cell: &str) -> Option<NaiveDate> {
    let cell = cell.trim();
    let head = cell.get(..10).unwrap_or(cell);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

fn parse_price(cell: Option<&str>) -> Option<f64> {
    let cell = cell?.trim();
    if cell.is_empty() {
        return Some(f64::NAN);
    }
    cell.parse::<f64>().ok()
}

fn parse_row(record: &StringRecord, cols: &ColumnMap) -> Option<PriceBar> {
    let date = parse_date(record.get(cols.date)?)?;
    Some(PriceBar {
        date,
        open: parse_price(record.get(cols.open))?,
        high: parse_price(record.get(cols.high))?,
        low: parse_price(record.get(cols.low))?,
        close: parse_price(record.get(cols.close))?,
    })
}

/// Read bars from any reader. Output keeps file order; callers sort via ingest.
pub fn read_bars<R: Read>(reader: R) -> Result<(Vec<PriceBar>, CsvReadStats), DataError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut records = rdr.records();
    let header = match records.next() {
        Some(h) => h?,
        None => return Ok((Vec::new(), CsvReadStats::default())),
    };
    let cols = ColumnMap::from_header(&header)?;

    let mut stats = CsvReadStats::default();
    let mut bars = Vec::new();
    for record in records {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                log::debug!("skipping unreadable csv row: {e}");
                stats.skipped_rows += 1;
                continue;
            }
        };
        if is_header_continuation(&record) {
            continue;
        }
        stats.rows_read += 1;
        match parse_row(&record, &cols) {
            Some(bar) => bars.push(bar),
            None => {
                log::debug!("skipping malformed csv row: {:?}", record);
                stats.skipped_rows += 1;
            }
        }
    }

    Ok((bars, stats))
}

/// Write bars in the flat layout.
pub fn write_bars<W: Write>(writer: W, bars: &[PriceBar]) -> Result<(), DataError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for bar in bars {
        wtr.serialize(bar)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_flat_layout() {
        let data = "Date,Open,High,Low,Close,Volume\n\
                    2024-01-02,100,102,99,101,1000\n\
                    2024-01-03,101,103,100,102,1100\n";
        let (bars, stats) = read_bars(data.as_bytes()).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].close, 102.0);
        assert_eq!(stats.skipped_rows, 0);
    }

    #[test]
    fn reads_multi_row_header_layout() {
        let data = "Price,Close,High,Low,Open,Volume\n\
                    Ticker,MSFT,MSFT,MSFT,MSFT,MSFT\n\
                    Date,,,,,\n\
                    2024-01-02 00:00:00+00:00,101,102,99,100,1000\n";
        let (bars, stats) = read_bars(data.as_bytes()).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].close, 101.0);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(stats.rows_read, 1);
    }

    #[test]
    fn skips_malformed_rows() {
        let data = "date,open,high,low,close\n\
                    2024-01-02,100,102,99,101\n\
                    not-a-date,1,1,1,1\n\
                    2024-01-04,abc,1,1,1\n\
                    2024-01-05,100,,99,101\n";
        let (bars, stats) = read_bars(data.as_bytes()).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(stats.skipped_rows, 2);
        assert!(bars[1].high.is_nan());
    }

    #[test]
    fn missing_column_is_an_error() {
        let data = "date,open,high,close\n2024-01-02,1,1,1\n";
        assert!(read_bars(data.as_bytes()).is_err());
    }

    #[test]
    fn written_file_reads_back() {
        let bars = vec![PriceBar::new(
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            100.0,
            102.0,
            99.0,
            101.5,
        )];
        let mut buf = Vec::new();
        write_bars(&mut buf, &bars).unwrap();
        let (back, _) = read_bars(buf.as_slice()).unwrap();
        assert_eq!(back, bars);
    }
}
