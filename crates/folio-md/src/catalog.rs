//! In-memory OHLCV catalog keyed by (ticker, date).
//!
//! # Purpose
//! The catalog is the single read-only price source for the ledger and
//! analytics crates. It is filled once per ticker (provider fetch or CSV
//! ingest) and then only queried. A missing record means "no data for
//! that trading day" — the catalog never substitutes zeros, and callers
//! never learn whether absence came from a closed market or a fetch that
//! was not run.
//!
//! # Determinism
//! Pure container — no IO, no time, no randomness. Series are `BTreeMap`s
//! so iteration order is the calendar order.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily OHLCV bar for a ticker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl PriceRecord {
    /// Midpoint of the day's range, the input to moving averages.
    pub fn mid(&self) -> f64 {
        (self.high + self.low) / 2.0
    }
}

/// Per-ticker daily price series, shared read-only across portfolios.
///
/// Inserting a record for an existing (ticker, date) replaces the prior
/// one; re-ingesting a refreshed file is therefore idempotent.
#[derive(Debug, Clone, Default)]
pub struct PriceCatalog {
    series: BTreeMap<String, BTreeMap<NaiveDate, PriceRecord>>,
}

impl PriceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a single record, replacing any prior record for that date.
    pub fn insert<S: Into<String>>(&mut self, ticker: S, record: PriceRecord) {
        self.series
            .entry(ticker.into())
            .or_default()
            .insert(record.date, record);
    }

    /// Insert a whole series for one ticker.
    pub fn insert_series<S, I>(&mut self, ticker: S, records: I)
    where
        S: Into<String>,
        I: IntoIterator<Item = PriceRecord>,
    {
        let entry = self.series.entry(ticker.into()).or_default();
        for record in records {
            entry.insert(record.date, record);
        }
    }

    /// The record for (ticker, date), if the catalog has ingested one.
    pub fn record(&self, ticker: &str, date: NaiveDate) -> Option<&PriceRecord> {
        self.series.get(ticker)?.get(&date)
    }

    /// Whether a record exists for (ticker, date).
    pub fn has_record(&self, ticker: &str, date: NaiveDate) -> bool {
        self.record(ticker, date).is_some()
    }

    /// Whether any data exists for the ticker at all.
    pub fn has_ticker(&self, ticker: &str) -> bool {
        self.series.contains_key(ticker)
    }

    /// Tickers with at least one ingested record, in lexical order.
    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn open(&self, ticker: &str, date: NaiveDate) -> Option<f64> {
        self.record(ticker, date).map(|r| r.open)
    }

    pub fn high(&self, ticker: &str, date: NaiveDate) -> Option<f64> {
        self.record(ticker, date).map(|r| r.high)
    }

    pub fn low(&self, ticker: &str, date: NaiveDate) -> Option<f64> {
        self.record(ticker, date).map(|r| r.low)
    }

    pub fn close(&self, ticker: &str, date: NaiveDate) -> Option<f64> {
        self.record(ticker, date).map(|r| r.close)
    }

    pub fn volume(&self, ticker: &str, date: NaiveDate) -> Option<i64> {
        self.record(ticker, date).map(|r| r.volume)
    }

    /// First date with data for the ticker.
    pub fn earliest_date(&self, ticker: &str) -> Option<NaiveDate> {
        self.series.get(ticker)?.keys().next().copied()
    }

    /// Last date with data for the ticker.
    pub fn latest_date(&self, ticker: &str) -> Option<NaiveDate> {
        self.series.get(ticker)?.keys().next_back().copied()
    }

    /// Number of ingested records for the ticker (0 if unknown).
    pub fn record_count(&self, ticker: &str) -> usize {
        self.series.get(ticker).map(BTreeMap::len).unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
