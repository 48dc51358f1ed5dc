//! Pluggable historical daily-price providers.
//!
//! This module owns the provider boundary only: the raw bar type, the
//! fetch request, the [`DailyProvider`] trait, and the Alpha Vantage
//! implementation. It does not touch the catalog; callers normalize the
//! returned bars (see [`DailyBar::into_record`]) and insert them.
//!
//! Prices cross the boundary as decimal strings exactly as the upstream
//! API sends them, so normalization happens in one place and a provider
//! swap cannot change rounding behavior.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::catalog::PriceRecord;

/// A raw daily bar as returned by an upstream provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: i64,
}

impl DailyBar {
    /// Normalize the decimal-string prices into a catalog record.
    pub fn into_record(self) -> Result<PriceRecord> {
        let parse = |field: &'static str, raw: &str| -> Result<f64> {
            raw.trim()
                .parse::<f64>()
                .with_context(|| format!("{}: cannot parse {field} value '{raw}'", self.symbol))
        };
        Ok(PriceRecord {
            date: self.date,
            open: parse("open", &self.open)?,
            high: parse("high", &self.high)?,
            low: parse("low", &self.low)?,
            close: parse("close", &self.close)?,
            volume: self.volume,
        })
    }
}

/// Parameters for a historical daily fetch.
#[derive(Debug, Clone)]
pub struct FetchDailyRequest {
    /// One or more ticker symbols to retrieve.
    pub symbols: Vec<String>,
    /// Inclusive start date.
    pub start: NaiveDate,
    /// Inclusive end date.
    pub end: NaiveDate,
}

/// Upstream daily-price provider contract.
///
/// Object-safe so callers can hold a `Box<dyn DailyProvider>` without
/// knowing the concrete type.
#[async_trait::async_trait]
pub trait DailyProvider: Send + Sync {
    /// Human-readable name identifying this provider (e.g. `"alphavantage"`).
    fn source_name(&self) -> &'static str;

    /// Fetch daily bars for the symbols and inclusive date range in `req`.
    async fn fetch_daily(&self, req: &FetchDailyRequest) -> Result<Vec<DailyBar>>;
}

/// Alpha Vantage `TIME_SERIES_DAILY` provider.
///
/// API key is read by the caller and passed in; do not log it.
#[derive(Debug, Clone)]
pub struct AlphaVantageProvider {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
}

impl AlphaVantageProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, "https://www.alphavantage.co".to_string())
    }

    /// Base URL injection point for tests.
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            http: reqwest::Client::new(),
            base_url,
        }
    }

    fn query_url(&self) -> String {
        format!("{}/query", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl DailyProvider for AlphaVantageProvider {
    fn source_name(&self) -> &'static str {
        "alphavantage"
    }

    async fn fetch_daily(&self, req: &FetchDailyRequest) -> Result<Vec<DailyBar>> {
        // Alpha Vantage is one-symbol-per-call; fetch per symbol deterministically.
        let mut out: Vec<DailyBar> = Vec::new();

        for symbol in req.symbols.iter() {
            let resp = self
                .http
                .get(self.query_url())
                .query(&[
                    ("function", "TIME_SERIES_DAILY"),
                    ("symbol", symbol.as_str()),
                    ("outputsize", "full"),
                    ("apikey", self.api_key.as_str()),
                ])
                .send()
                .await
                .context("alphavantage request failed")?;

            let status = resp.status();
            if !status.is_success() {
                return Err(anyhow!(
                    "alphavantage http error status={} symbol={}",
                    status.as_u16(),
                    symbol
                ));
            }

            let body: AlphaVantageDailyResponse = resp
                .json()
                .await
                .context("alphavantage response json decode failed")?;

            if let Some(message) = body.error_message() {
                return Err(anyhow!("alphavantage error for {}: {}", symbol, message));
            }

            let series = body
                .series
                .ok_or_else(|| anyhow!("alphavantage returned no daily series for {}", symbol))?;

            for (raw_date, day) in series {
                let date: NaiveDate = raw_date
                    .parse()
                    .with_context(|| format!("alphavantage date parse failed: {raw_date}"))?;
                if date < req.start || date > req.end {
                    continue;
                }
                out.push(DailyBar {
                    symbol: symbol.clone(),
                    date,
                    open: day.open,
                    high: day.high,
                    low: day.low,
                    close: day.close,
                    volume: day.volume.parse::<i64>().unwrap_or(0),
                });
            }
        }

        Ok(out)
    }
}

#[derive(Debug, Deserialize)]
struct AlphaVantageDailyResponse {
    // The API signals failure inside a 200 body through one of these keys.
    #[serde(rename = "Error Message")]
    error: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(rename = "Time Series (Daily)")]
    series: Option<BTreeMap<String, AlphaVantageDay>>,
}

impl AlphaVantageDailyResponse {
    fn error_message(&self) -> Option<&str> {
        self.error
            .as_deref()
            .or(self.note.as_deref())
            .or(self.information.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AlphaVantageDay {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume", default)]
    volume: String,
}

// ---------------------------------------------------------------------------
// Tests (no network; httpmock)
// ---------------------------------------------------------------------------
