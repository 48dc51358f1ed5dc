//! Time-bucketed portfolio performance series for charting.
//!
//! The bucket width is chosen from the total span, the value is sampled
//! at each bucket boundary, and a sample landing on a day with no value
//! (non-trading day, every holding missing a close) snaps backward one
//! calendar day at a time to the most recent prior nonzero value. The
//! walk is iterative and bounded below by the portfolio's purchase date,
//! where the value is 0 by definition, so it always terminates.

use chrono::{Days, Months, NaiveDate};

use folio_ledger::PortfolioAggregate;
use folio_md::PriceCatalog;

use crate::valuation::{portfolio_value, ValuationError};

// ---------------------------------------------------------------------------
// Bucket selection
// ---------------------------------------------------------------------------

/// Sampling granularity, derived from the span between start and end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketWidth {
    Yearly,
    BiMonthly,
    Monthly,
    Daily,
    FiveDay,
}

impl BucketWidth {
    /// Pick the width for a span of `days` calendar days.
    ///
    /// Thresholds use the charting layer's approximations (a year is
    /// 365 days, a month 30) so bucket counts match the rendered axis.
    pub fn for_span(days: i64) -> Self {
        let years = days as f64 / 365.0;
        let months = days as f64 / 30.0;
        if years >= 5.0 {
            BucketWidth::Yearly
        } else if months > 30.0 {
            BucketWidth::BiMonthly
        } else if months >= 5.0 {
            BucketWidth::Monthly
        } else if days < 30 {
            BucketWidth::Daily
        } else {
            BucketWidth::FiveDay
        }
    }

    /// Number of samples drawn across a span of `days` calendar days.
    fn sample_count(self, days: i64) -> i64 {
        let n = match self {
            BucketWidth::Yearly => (days as f64 / 365.0) as i64,
            BucketWidth::BiMonthly => (days as f64 / 30.0 / 2.0) as i64,
            BucketWidth::Monthly => (days as f64 / 30.0) as i64,
            BucketWidth::Daily => days,
            BucketWidth::FiveDay => days / 5,
        };
        n.max(1)
    }

    /// The next bucket boundary after `date`.
    fn advance(self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            BucketWidth::Yearly => date.checked_add_months(Months::new(12)),
            BucketWidth::BiMonthly => date.checked_add_months(Months::new(2)),
            BucketWidth::Monthly => date.checked_add_months(Months::new(1)),
            BucketWidth::Daily => date.checked_add_days(Days::new(1)),
            BucketWidth::FiveDay => date.checked_add_days(Days::new(5)),
        }
    }
}

// ---------------------------------------------------------------------------
// Series
// ---------------------------------------------------------------------------

/// One sampled bucket boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    /// The boundary the sample was taken at (before any backward snap).
    pub date: NaiveDate,
    pub value: f64,
}

/// A sampled performance curve plus the width it was sampled at.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceSeries {
    pub width: BucketWidth,
    pub points: Vec<SeriesPoint>,
}

/// Sample the portfolio's value across `[start, end]`.
///
/// # Errors
/// [`ValuationError::EmptyPortfolio`] when no holding has a transaction.
pub fn performance_series(
    catalog: &PriceCatalog,
    portfolio: &PortfolioAggregate,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<PerformanceSeries, ValuationError> {
    let purchased = portfolio.purchase_date()?;
    let days = (end - start).num_days().max(0);
    let width = BucketWidth::for_span(days);
    let samples = width.sample_count(days);

    let mut points = Vec::with_capacity(samples as usize);
    let mut boundary = start;
    for _ in 0..samples {
        let value = backfilled_value(catalog, portfolio, boundary, purchased)?;
        points.push(SeriesPoint {
            date: boundary,
            value,
        });
        boundary = match width.advance(boundary) {
            Some(next) => next,
            None => break,
        };
    }

    Ok(PerformanceSeries { width, points })
}

/// Value at `date`, snapping backward to the most recent prior nonzero
/// value when the instantaneous value is exactly 0.
///
/// Iterative with `floor` (the purchase date) as the explicit lower
/// bound: at or below it the value is 0 by definition and the walk
/// stops, so a degenerate all-zero range cannot loop.
fn backfilled_value(
    catalog: &PriceCatalog,
    portfolio: &PortfolioAggregate,
    date: NaiveDate,
    floor: NaiveDate,
) -> Result<f64, ValuationError> {
    let mut day = date;
    loop {
        let value = portfolio_value(catalog, portfolio, day)?;
        if value != 0.0 || day <= floor {
            return Ok(value);
        }
        day = match day.pred_opt() {
            Some(prev) => prev,
            None => return Ok(0.0),
        };
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use folio_ledger::{PortfolioBuilder, ShareLedger};
    use folio_md::PriceRecord;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn flat_bar(date: &str, price: f64) -> PriceRecord {
        PriceRecord {
            date: d(date),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 1,
        }
    }

    fn one_share_portfolio(purchase: &str) -> PortfolioAggregate {
        PortfolioBuilder::new()
            .with_holding(ShareLedger::opening("AAPL", d(purchase), 1.0).unwrap())
            .build("p")
    }

    // --- Width selection ---

    #[test]
    fn width_thresholds_follow_span() {
        assert_eq!(BucketWidth::for_span(6 * 365), BucketWidth::Yearly);
        assert_eq!(BucketWidth::for_span(365 * 5), BucketWidth::Yearly);
        assert_eq!(BucketWidth::for_span(32 * 30), BucketWidth::BiMonthly);
        assert_eq!(BucketWidth::for_span(6 * 30), BucketWidth::Monthly);
        assert_eq!(BucketWidth::for_span(10), BucketWidth::Daily);
        assert_eq!(BucketWidth::for_span(29), BucketWidth::Daily);
        assert_eq!(BucketWidth::for_span(60), BucketWidth::FiveDay);
    }

    // --- Sampling ---

    #[test]
    fn daily_series_samples_consecutive_days() {
        let mut catalog = PriceCatalog::new();
        for (i, day) in ["2024-05-21", "2024-05-22", "2024-05-23", "2024-05-24"]
            .iter()
            .enumerate()
        {
            catalog.insert("AAPL", flat_bar(day, 100.0 + i as f64));
        }
        let p = one_share_portfolio("2024-05-21");

        let series =
            performance_series(&catalog, &p, d("2024-05-21"), d("2024-05-24")).unwrap();
        assert_eq!(series.width, BucketWidth::Daily);
        assert_eq!(series.points.len(), 3);
        assert_eq!(series.points[0].date, d("2024-05-21"));
        // The purchase day itself values at 0 and cannot snap further back.
        assert_eq!(series.points[0].value, 0.0);
        assert_eq!(series.points[1].value, 101.0);
        assert_eq!(series.points[2].value, 102.0);
    }

    #[test]
    fn zero_sample_snaps_back_to_prior_nonzero_value() {
        let mut catalog = PriceCatalog::new();
        catalog.insert("AAPL", flat_bar("2024-05-22", 110.0));
        // 23rd-25th: no bars (long weekend).
        catalog.insert("AAPL", flat_bar("2024-05-26", 120.0));
        let p = one_share_portfolio("2024-05-21");

        let series =
            performance_series(&catalog, &p, d("2024-05-22"), d("2024-05-27")).unwrap();
        // Samples on the quiet days carry the 22nd's value forward-by-backfill.
        for point in &series.points {
            if point.date >= d("2024-05-26") {
                assert_eq!(point.value, 120.0);
            } else {
                assert_eq!(point.value, 110.0, "snap at {}", point.date);
            }
        }
    }

    #[test]
    fn backfill_terminates_on_all_zero_range_at_purchase_floor() {
        // No prices at all: every sample is 0 and the walk must stop at
        // the purchase date instead of recursing forever.
        let catalog = PriceCatalog::new();
        let p = one_share_portfolio("2024-05-21");

        let series =
            performance_series(&catalog, &p, d("2024-06-01"), d("2024-06-10")).unwrap();
        assert!(series.points.iter().all(|pt| pt.value == 0.0));
    }

    #[test]
    fn empty_portfolio_is_an_error() {
        let catalog = PriceCatalog::new();
        let p = PortfolioAggregate::empty("fresh");
        assert!(matches!(
            performance_series(&catalog, &p, d("2024-05-21"), d("2024-05-24")),
            Err(ValuationError::EmptyPortfolio { .. })
        ));
    }

    #[test]
    fn single_day_span_still_produces_one_sample() {
        let catalog = PriceCatalog::new();
        let p = one_share_portfolio("2024-05-21");
        let series =
            performance_series(&catalog, &p, d("2024-05-21"), d("2024-05-21")).unwrap();
        assert_eq!(series.points.len(), 1);
    }
}
