//! Valuation primitives: moving averages, crossovers, performance,
//! distribution.
//!
//! # Missing-data policy
//! Two regimes coexist and must not be mixed up:
//!
//! - **Skip/zero semantics** where valuation defines them: moving-average
//!   windows skip days without data, and portfolio-wide performance
//!   counts a holding with no close price that day as contributing zero
//!   (see [`holding_value_or_zero`] — the fallback lives in exactly one
//!   named function so the strict paths stay strict).
//! - **Strict errors** everywhere presence is part of the contract:
//!   single-instrument performance and distribution fail with
//!   [`ValuationError::MissingPriceData`].

use chrono::{Days, NaiveDate};
use std::collections::BTreeMap;

use folio_ledger::{PortfolioAggregate, PortfolioError, ShareLedger};
use folio_md::PriceCatalog;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures surfaced by valuation queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValuationError {
    /// A (ticker, date) lookup the contract assumes present was absent.
    MissingPriceData { ticker: String, date: NaiveDate },
    /// The query needs at least one holding with a transaction.
    EmptyPortfolio { name: String },
}

impl std::fmt::Display for ValuationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingPriceData { ticker, date } => {
                write!(f, "no price data for {ticker} on {date}")
            }
            Self::EmptyPortfolio { name } => {
                write!(f, "portfolio '{name}' has no purchased holdings")
            }
        }
    }
}

impl std::error::Error for ValuationError {}

impl From<PortfolioError> for ValuationError {
    fn from(err: PortfolioError) -> Self {
        match err {
            PortfolioError::EmptyPortfolio { name } => ValuationError::EmptyPortfolio { name },
        }
    }
}

fn missing(ticker: &str, date: NaiveDate) -> ValuationError {
    ValuationError::MissingPriceData {
        ticker: ticker.to_string(),
        date,
    }
}

// ---------------------------------------------------------------------------
// Moving average & crossovers
// ---------------------------------------------------------------------------

/// Trailing moving average of the daily (high+low)/2 midpoint.
///
/// Averages over the `window` calendar days strictly before `anchor`
/// that have a catalog record; days without one are skipped, not zeroed.
/// When none of the days has data the average is defined as 0.0 — an
/// explicit edge case, not an error.
pub fn moving_average(
    catalog: &PriceCatalog,
    ticker: &str,
    anchor: NaiveDate,
    window: u32,
) -> f64 {
    let mut sum = 0.0;
    let mut count = 0u32;
    for back in 1..=u64::from(window) {
        let day = match anchor.checked_sub_days(Days::new(back)) {
            Some(day) => day,
            None => break,
        };
        if let Some(record) = catalog.record(ticker, day) {
            sum += record.mid();
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / f64::from(count)
    }
}

/// Dates in `[start, end]` where the close crosses above the trailing
/// `window`-day moving average.
///
/// Only dates with a catalog record participate; for each, the average
/// ends the day before, per [`moving_average`]. The returned dates are
/// in calendar order.
///
/// # Errors
/// [`ValuationError::MissingPriceData`] if a close is absent for a date
/// the catalog reported valid — defensive, should not occur once the
/// range is pre-filtered.
pub fn crossovers(
    catalog: &PriceCatalog,
    ticker: &str,
    start: NaiveDate,
    end: NaiveDate,
    window: u32,
) -> Result<Vec<NaiveDate>, ValuationError> {
    let mut flagged = Vec::new();
    let mut day = start;
    while day <= end {
        if catalog.has_record(ticker, day) {
            let average = moving_average(catalog, ticker, day, window);
            let close = catalog
                .close(ticker, day)
                .ok_or_else(|| missing(ticker, day))?;
            if close > average {
                flagged.push(day);
            }
        }
        day = match day.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    Ok(flagged)
}

// ---------------------------------------------------------------------------
// Performance
// ---------------------------------------------------------------------------

/// Gain or loss of one instrument over `[start, end]`:
/// `close(end) - open(start)`. Sign carries the direction.
///
/// # Errors
/// [`ValuationError::MissingPriceData`] when either date has no record.
pub fn performance(
    catalog: &PriceCatalog,
    ticker: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<f64, ValuationError> {
    let open = catalog
        .open(ticker, start)
        .ok_or_else(|| missing(ticker, start))?;
    let close = catalog
        .close(ticker, end)
        .ok_or_else(|| missing(ticker, end))?;
    Ok(close - open)
}

/// One holding's value at `date`, with the silent zero fallback.
///
/// A holding whose ticker has no close price that day contributes 0.0
/// instead of failing. Portfolio-wide performance depends on this
/// behavior; nothing else may use it.
pub fn holding_value_or_zero(catalog: &PriceCatalog, ledger: &ShareLedger, date: NaiveDate) -> f64 {
    match catalog.close(ledger.ticker(), date) {
        Some(close) => close * ledger.shares_as_of(date),
        None => 0.0,
    }
}

/// Point-in-time value of the whole portfolio at `date`.
///
/// Dates at or before the portfolio's purchase date yield 0.0 — "not yet
/// invested", not an error. After that, the value is the sum of
/// [`holding_value_or_zero`] over the holdings.
///
/// # Errors
/// [`ValuationError::EmptyPortfolio`] when no holding has a transaction.
pub fn portfolio_value(
    catalog: &PriceCatalog,
    portfolio: &PortfolioAggregate,
    date: NaiveDate,
) -> Result<f64, ValuationError> {
    let purchased = portfolio.purchase_date()?;
    if date <= purchased {
        return Ok(0.0);
    }
    Ok(portfolio
        .holdings()
        .map(|(_, ledger)| holding_value_or_zero(catalog, ledger, date))
        .sum())
}

// ---------------------------------------------------------------------------
// Distribution
// ---------------------------------------------------------------------------

/// Per-holding value breakdown of a portfolio at a fixed date.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub date: NaiveDate,
    /// Value of each holding; sums to `total`.
    pub by_ticker: BTreeMap<String, f64>,
    pub total: f64,
}

/// Value of every holding at `date` plus the portfolio total.
///
/// Callers gate the date with
/// [`PortfolioAggregate::is_valid_for_all`] first; a close that is still
/// absent here is a strict error, unlike the portfolio-value fallback.
///
/// # Errors
/// [`ValuationError::EmptyPortfolio`] on a holdings-less aggregate,
/// [`ValuationError::MissingPriceData`] on an absent close.
pub fn distribution(
    catalog: &PriceCatalog,
    portfolio: &PortfolioAggregate,
    date: NaiveDate,
) -> Result<Distribution, ValuationError> {
    if portfolio.is_empty() {
        return Err(ValuationError::EmptyPortfolio {
            name: portfolio.name().to_string(),
        });
    }

    let mut by_ticker = BTreeMap::new();
    let mut total = 0.0;
    for (ticker, ledger) in portfolio.holdings() {
        let close = catalog
            .close(ticker, date)
            .ok_or_else(|| missing(ticker, date))?;
        let value = close * ledger.shares_as_of(date);
        total += value;
        by_ticker.insert(ticker.to_string(), value);
    }
    Ok(Distribution {
        date,
        by_ticker,
        total,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use folio_ledger::PortfolioBuilder;
    use folio_md::PriceRecord;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn bar(date: &str, open: f64, high: f64, low: f64, close: f64) -> PriceRecord {
        PriceRecord {
            date: d(date),
            open,
            high,
            low,
            close,
            volume: 1_000,
        }
    }

    fn flat_bar(date: &str, price: f64) -> PriceRecord {
        bar(date, price, price, price, price)
    }

    // --- Moving average ---

    #[test]
    fn moving_average_skips_days_without_data() {
        let mut catalog = PriceCatalog::new();
        // Only 3 of the 10 requested days have data.
        catalog.insert("AAPL", bar("2024-05-13", 0.0, 12.0, 8.0, 0.0)); // mid 10
        catalog.insert("AAPL", bar("2024-05-15", 0.0, 22.0, 18.0, 0.0)); // mid 20
        catalog.insert("AAPL", bar("2024-05-17", 0.0, 32.0, 28.0, 0.0)); // mid 30

        let avg = moving_average(&catalog, "AAPL", d("2024-05-21"), 10);
        assert_eq!(avg, 20.0, "divide by the 3 days with data, not by 10");
    }

    #[test]
    fn moving_average_excludes_the_anchor_day() {
        let mut catalog = PriceCatalog::new();
        catalog.insert("AAPL", bar("2024-05-21", 0.0, 1000.0, 1000.0, 0.0));
        catalog.insert("AAPL", bar("2024-05-20", 0.0, 12.0, 8.0, 0.0)); // mid 10

        let avg = moving_average(&catalog, "AAPL", d("2024-05-21"), 5);
        assert_eq!(avg, 10.0, "the anchor day itself must not participate");
    }

    #[test]
    fn moving_average_with_no_data_is_zero() {
        let catalog = PriceCatalog::new();
        assert_eq!(moving_average(&catalog, "AAPL", d("2024-05-21"), 30), 0.0);
    }

    #[test]
    fn moving_average_zero_window_is_zero() {
        let mut catalog = PriceCatalog::new();
        catalog.insert("AAPL", flat_bar("2024-05-20", 10.0));
        assert_eq!(moving_average(&catalog, "AAPL", d("2024-05-21"), 0), 0.0);
    }

    // --- Crossovers ---

    #[test]
    fn crossover_flags_close_above_trailing_average() {
        let mut catalog = PriceCatalog::new();
        // Trailing mids are 10; closes alternate around that level.
        catalog.insert("AAPL", bar("2024-05-20", 0.0, 12.0, 8.0, 10.0));
        catalog.insert("AAPL", bar("2024-05-21", 0.0, 12.0, 8.0, 15.0)); // above
        catalog.insert("AAPL", bar("2024-05-22", 0.0, 12.0, 8.0, 5.0)); // below
        catalog.insert("AAPL", bar("2024-05-23", 0.0, 12.0, 8.0, 11.0)); // above

        let dates = crossovers(&catalog, "AAPL", d("2024-05-21"), d("2024-05-23"), 2).unwrap();
        assert_eq!(dates, vec![d("2024-05-21"), d("2024-05-23")]);
    }

    #[test]
    fn crossover_skips_dates_without_records() {
        let mut catalog = PriceCatalog::new();
        catalog.insert("AAPL", bar("2024-05-21", 0.0, 12.0, 8.0, 15.0));
        // 22nd..24th absent entirely.
        let dates = crossovers(&catalog, "AAPL", d("2024-05-20"), d("2024-05-24"), 3).unwrap();
        // With an empty trailing window the average is 0, so the single
        // recorded day flags.
        assert_eq!(dates, vec![d("2024-05-21")]);
    }

    // --- Single-instrument performance ---

    #[test]
    fn performance_is_close_minus_open() {
        let mut catalog = PriceCatalog::new();
        catalog.insert("AAPL", bar("2024-05-21", 100.0, 0.0, 0.0, 0.0));
        catalog.insert("AAPL", bar("2024-05-24", 0.0, 0.0, 0.0, 93.0));

        let delta = performance(&catalog, "AAPL", d("2024-05-21"), d("2024-05-24")).unwrap();
        assert_eq!(delta, -7.0, "sign carries the loss");
    }

    #[test]
    fn performance_requires_both_endpoints() {
        let mut catalog = PriceCatalog::new();
        catalog.insert("AAPL", flat_bar("2024-05-21", 100.0));

        let err = performance(&catalog, "AAPL", d("2024-05-21"), d("2024-05-24")).unwrap_err();
        assert_eq!(
            err,
            ValuationError::MissingPriceData {
                ticker: "AAPL".to_string(),
                date: d("2024-05-24"),
            }
        );
    }

    // --- Portfolio value ---

    fn portfolio() -> PortfolioAggregate {
        PortfolioBuilder::new()
            .with_holding(ShareLedger::opening("AAPL", d("2024-05-21"), 10.0).unwrap())
            .with_holding(ShareLedger::opening("MSFT", d("2024-05-22"), 4.0).unwrap())
            .build("retirement")
    }

    #[test]
    fn value_before_or_at_purchase_date_is_zero() {
        let mut catalog = PriceCatalog::new();
        catalog.insert("AAPL", flat_bar("2024-05-21", 100.0));

        let p = portfolio();
        assert_eq!(portfolio_value(&catalog, &p, d("2024-05-20")).unwrap(), 0.0);
        assert_eq!(portfolio_value(&catalog, &p, d("2024-05-21")).unwrap(), 0.0);
    }

    #[test]
    fn value_sums_close_times_position() {
        let mut catalog = PriceCatalog::new();
        catalog.insert("AAPL", flat_bar("2024-05-23", 100.0));
        catalog.insert("MSFT", flat_bar("2024-05-23", 50.0));

        let p = portfolio();
        let value = portfolio_value(&catalog, &p, d("2024-05-23")).unwrap();
        assert_eq!(value, 10.0 * 100.0 + 4.0 * 50.0);
    }

    #[test]
    fn holding_without_close_contributes_zero() {
        let mut catalog = PriceCatalog::new();
        catalog.insert("AAPL", flat_bar("2024-05-23", 100.0));
        // MSFT has no bar on the 23rd.

        let p = portfolio();
        let value = portfolio_value(&catalog, &p, d("2024-05-23")).unwrap();
        assert_eq!(value, 1_000.0, "the missing holding silently adds zero");
    }

    #[test]
    fn value_on_empty_portfolio_is_an_error() {
        let catalog = PriceCatalog::new();
        let p = PortfolioAggregate::empty("fresh");
        assert!(matches!(
            portfolio_value(&catalog, &p, d("2024-05-23")),
            Err(ValuationError::EmptyPortfolio { .. })
        ));
    }

    // --- Distribution ---

    #[test]
    fn distribution_totals_per_holding_values() {
        let mut catalog = PriceCatalog::new();
        catalog.insert("AAPL", flat_bar("2024-05-23", 100.0));
        catalog.insert("MSFT", flat_bar("2024-05-23", 50.0));

        let dist = distribution(&catalog, &portfolio(), d("2024-05-23")).unwrap();
        assert_eq!(dist.by_ticker["AAPL"], 1_000.0);
        assert_eq!(dist.by_ticker["MSFT"], 200.0);
        assert_eq!(dist.total, 1_200.0);
    }

    #[test]
    fn distribution_is_strict_about_missing_closes() {
        let mut catalog = PriceCatalog::new();
        catalog.insert("AAPL", flat_bar("2024-05-23", 100.0));

        let err = distribution(&catalog, &portfolio(), d("2024-05-23")).unwrap_err();
        assert!(matches!(err, ValuationError::MissingPriceData { ticker, .. } if ticker == "MSFT"));
    }
}
