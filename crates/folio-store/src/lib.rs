//! folio-store
//!
//! File-backed persistence for named portfolios. One CSV per portfolio,
//! one row per holding:
//!
//! ```text
//! ticker,total_shares,deltas
//! AAPL,8.5,2024-05-21,5.0,2024-05-22,3.5
//! MSFT,2.0,2024-05-23,2.0
//! ```
//!
//! After the ticker and the cumulative share count at save time, each
//! row carries repeated `date,delta` pairs — the ledger's raw series.
//! Dates are unique keys, so the round-trip is order-independent and
//! lossless: rehydrating answers `shares_as_of` identically for every
//! date in the original delta set.
//!
//! [`PortfolioStore`] is the explicit repository object the desk passes
//! by reference wherever named portfolios are looked up or put back —
//! there is no process-wide registry.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;

use folio_ledger::{PortfolioAggregate, PortfolioBuilder, ShareLedger};

/// Tolerance when checking the stored cumulative count against the
/// recomputed one; the stored value is informational, never trusted.
const TOTAL_TOLERANCE: f64 = 1e-6;

const HEADER: [&str; 3] = ["ticker", "total_shares", "deltas"];

/// File-backed repository of named portfolios under one root directory.
#[derive(Debug, Clone)]
pub struct PortfolioStore {
    root: PathBuf,
}

impl PortfolioStore {
    /// A store rooted at `root`. The directory is created on first save.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.csv"))
    }

    /// Whether a portfolio with this name has been saved.
    pub fn contains(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }

    /// Saved portfolio names, in lexical order.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        if !self.root.is_dir() {
            return Ok(names);
        }
        let entries = std::fs::read_dir(&self.root)
            .with_context(|| format!("read portfolio directory '{}'", self.root.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Write the portfolio to `<root>/<name>.csv`, replacing any prior
    /// save of the same name.
    pub fn save(&self, portfolio: &PortfolioAggregate) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("create portfolio directory '{}'", self.root.display()))?;
        let path = self.path_for(portfolio.name());

        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(&path)
            .with_context(|| format!("open '{}' for writing", path.display()))?;
        writer
            .write_record(HEADER)
            .context("write portfolio header")?;

        for (ticker, ledger) in portfolio.holdings() {
            let mut row: Vec<String> = Vec::with_capacity(2 + 2 * ledger.deltas().count());
            row.push(ticker.to_string());
            row.push(ledger.total_shares().to_string());
            for (date, qty) in ledger.deltas() {
                row.push(date.to_string());
                row.push(qty.to_string());
            }
            writer
                .write_record(&row)
                .with_context(|| format!("write holding row for {ticker}"))?;
        }
        writer.flush().context("flush portfolio csv")?;
        Ok(())
    }

    /// Rehydrate the portfolio saved as `name`.
    ///
    /// The stored cumulative count is recomputed from the delta pairs;
    /// a mismatch means the file was edited or truncated and is
    /// rejected rather than repaired.
    pub fn load(&self, name: &str) -> Result<PortfolioAggregate> {
        let path = self.path_for(name);
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_path(&path)
            .with_context(|| format!("no saved portfolio '{name}' at '{}'", path.display()))?;

        let mut builder = PortfolioBuilder::new();
        for (row_num, record) in reader.records().enumerate() {
            let record =
                record.with_context(|| format!("read '{name}' row {}", row_num + 1))?;
            let ledger = parse_holding_row(&record)
                .with_context(|| format!("parse '{name}' row {}", row_num + 1))?;
            builder = builder.with_holding(ledger);
        }
        Ok(builder.build(name))
    }
}

fn parse_holding_row(record: &csv::StringRecord) -> Result<ShareLedger> {
    let ticker = match record.get(0) {
        Some(t) if !t.trim().is_empty() => t.trim().to_string(),
        _ => bail!("missing ticker"),
    };
    let stored_total: f64 = record
        .get(1)
        .context("missing total_shares")?
        .trim()
        .parse()
        .context("unparseable total_shares")?;

    let mut deltas: Vec<(NaiveDate, f64)> = Vec::new();
    let mut fields = record.iter().skip(2);
    while let Some(raw_date) = fields.next() {
        let raw_date = raw_date.trim();
        if raw_date.is_empty() {
            continue;
        }
        let date: NaiveDate = raw_date
            .parse()
            .with_context(|| format!("unparseable delta date '{raw_date}'"))?;
        let raw_qty = fields
            .next()
            .with_context(|| format!("delta date {date} has no quantity"))?;
        let qty: f64 = raw_qty
            .trim()
            .parse()
            .with_context(|| format!("unparseable delta quantity '{}'", raw_qty.trim()))?;
        deltas.push((date, qty));
    }

    let ledger = ShareLedger::from_deltas(ticker, deltas);
    let recomputed = ledger.total_shares();
    if (recomputed - stored_total).abs() > TOTAL_TOLERANCE {
        bail!(
            "stored total {} for {} disagrees with deltas summing to {}",
            stored_total,
            ledger.ticker(),
            recomputed
        );
    }
    Ok(ledger)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
