//! CSV ingestion for per-ticker daily bar files.
//!
//! Converts a CSV file (or in-memory CSV text) into [`PriceRecord`]s for
//! catalog insertion. Read side only: no fetching, no catalog mutation
//! beyond the directory loader convenience.
//!
//! ## CSV column contract (case-insensitive, order-independent)
//!
//! | Column      | Type / example | Notes                    |
//! |-------------|----------------|--------------------------|
//! | `timestamp` | `2024-05-21`   | ISO calendar date        |
//! | `open`      | `191.09`       |                          |
//! | `high`      | `193.00`       |                          |
//! | `low`       | `189.10`       |                          |
//! | `close`     | `192.35`       |                          |
//! | `volume`    | `42309401`     | Integer ≥ 0              |
//!
//! This is the daily-export shape the desk's data directory stores one
//! file per ticker in (`<TICKER>.csv`). Rows with unparseable dates or
//! numbers are skipped and counted, not errors; only structural problems
//! (unreadable file, missing header column) fail the parse.

use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::catalog::{PriceCatalog, PriceRecord};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors produced by CSV parsing in this module.
#[derive(Debug)]
pub enum CsvIngestError {
    /// An I/O error while reading the source.
    Io(String),
    /// The header row is missing a required column.
    MissingHeader(String),
}

impl fmt::Display for CsvIngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CsvIngestError::Io(msg) => write!(f, "csv io error: {msg}"),
            CsvIngestError::MissingHeader(col) => {
                write!(f, "csv missing required header column: '{col}'")
            }
        }
    }
}

impl std::error::Error for CsvIngestError {}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Result of a parse: the usable records plus how many rows were dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvIngestReport {
    pub records: Vec<PriceRecord>,
    pub skipped_rows: usize,
}

/// Parse a daily-bar CSV file at `path`.
pub fn parse_csv_file(path: &Path) -> Result<CsvIngestReport, CsvIngestError> {
    let mut file = std::fs::File::open(path)
        .map_err(|e| CsvIngestError::Io(format!("open '{}': {e}", path.display())))?;
    let mut buf = String::new();
    file.read_to_string(&mut buf)
        .map_err(|e| CsvIngestError::Io(format!("read '{}': {e}", path.display())))?;
    parse_csv_str(&buf)
}

/// Parse a daily-bar CSV from a string slice (tests, in-memory payloads).
pub fn parse_csv_str(src: &str) -> Result<CsvIngestReport, CsvIngestError> {
    let mut lines = src.lines();

    let header_line = match lines.next() {
        Some(l) => l,
        None => {
            return Ok(CsvIngestReport {
                records: Vec::new(),
                skipped_rows: 0,
            })
        }
    };
    let col_idx = build_col_index(header_line)?;

    let mut records = Vec::new();
    let mut skipped_rows = 0usize;

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        // Minimal field split: comma-separated, no quoting (sufficient for OHLCV).
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let get = |name: &str| -> Option<&str> { fields.get(col_idx[name]).copied() };

        let parsed = (|| -> Option<PriceRecord> {
            let date: NaiveDate = get("timestamp")?.parse().ok()?;
            Some(PriceRecord {
                date,
                open: get("open")?.parse().ok()?,
                high: get("high")?.parse().ok()?,
                low: get("low")?.parse().ok()?,
                close: get("close")?.parse().ok()?,
                volume: get("volume")?.parse().ok()?,
            })
        })();

        match parsed {
            Some(record) => records.push(record),
            None => skipped_rows += 1,
        }
    }

    Ok(CsvIngestReport {
        records,
        skipped_rows,
    })
}

/// Fill a catalog from a directory of `<TICKER>.csv` files.
///
/// The file stem, uppercased, becomes the ticker. Non-CSV entries are
/// ignored. Per-file skip counts are summed into the returned total.
pub fn load_catalog_dir(dir: &Path) -> Result<(PriceCatalog, usize)> {
    let mut catalog = PriceCatalog::new();
    let mut skipped_rows = 0usize;

    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("read data directory '{}'", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("list data directory '{}'", dir.display()))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let ticker = match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => stem.to_ascii_uppercase(),
            None => continue,
        };
        let report = parse_csv_file(&path)
            .with_context(|| format!("parse bars for {ticker} from '{}'", path.display()))?;
        skipped_rows += report.skipped_rows;
        catalog.insert_series(ticker, report.records);
    }

    Ok((catalog, skipped_rows))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const REQUIRED_COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

/// Build a case-insensitive column-name → index map from a CSV header line.
fn build_col_index(header_line: &str) -> Result<HashMap<String, usize>, CsvIngestError> {
    let mut idx = HashMap::new();
    for (i, col) in header_line.split(',').enumerate() {
        idx.insert(col.trim().to_ascii_lowercase(), i);
    }
    for required in REQUIRED_COLUMNS {
        if !idx.contains_key(required) {
            return Err(CsvIngestError::MissingHeader(required.to_string()));
        }
    }
    Ok(idx)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = "\
timestamp,open,high,low,close,volume
2024-05-21,191.09,193.00,189.10,192.35,42309401
2024-05-22,192.27,194.00,190.50,193.17,34648547
";

    #[test]
    fn parses_well_formed_rows() {
        let report = parse_csv_str(GOOD).unwrap();
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.skipped_rows, 0);
        assert_eq!(report.records[0].date, "2024-05-21".parse().unwrap());
        assert_eq!(report.records[1].close, 193.17);
    }

    #[test]
    fn header_is_case_insensitive_and_order_independent() {
        let src = "\
Volume,Close,Low,High,Open,Timestamp
100,4.0,2.0,5.0,3.0,2024-05-21
";
        let report = parse_csv_str(src).unwrap();
        assert_eq!(report.records.len(), 1);
        let r = report.records[0];
        assert_eq!(r.open, 3.0);
        assert_eq!(r.high, 5.0);
        assert_eq!(r.low, 2.0);
        assert_eq!(r.close, 4.0);
        assert_eq!(r.volume, 100);
    }

    #[test]
    fn malformed_rows_are_skipped_and_counted() {
        let src = "\
timestamp,open,high,low,close,volume
2024-05-21,191.09,193.00,189.10,192.35,42309401
not-a-date,1,2,3,4,5
2024-05-22,oops,194.00,190.50,193.17,100
2024-05-23,192.00,194.00,190.50,193.17,100
";
        let report = parse_csv_str(src).unwrap();
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.skipped_rows, 2);
    }

    #[test]
    fn short_rows_are_skipped() {
        let src = "\
timestamp,open,high,low,close,volume
2024-05-21,191.09
";
        let report = parse_csv_str(src).unwrap();
        assert!(report.records.is_empty());
        assert_eq!(report.skipped_rows, 1);
    }

    #[test]
    fn missing_header_column_is_structural_error() {
        let src = "timestamp,open,high,low,close\n2024-05-21,1,2,3,4\n";
        let err = parse_csv_str(src).unwrap_err();
        assert!(err.to_string().contains("volume"));
    }

    #[test]
    fn empty_input_yields_empty_report() {
        let report = parse_csv_str("").unwrap();
        assert!(report.records.is_empty());
        assert_eq!(report.skipped_rows, 0);
    }

    #[test]
    fn directory_loader_uses_file_stem_as_ticker() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("aapl.csv"), GOOD).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let (catalog, skipped) = load_catalog_dir(dir.path()).unwrap();
        assert_eq!(skipped, 0);
        assert!(catalog.has_ticker("AAPL"));
        assert_eq!(catalog.record_count("AAPL"), 2);
    }
}
