//! folio-analytics
//!
//! Stateless valuation and rebalancing over a [`folio_md::PriceCatalog`]
//! and the [`folio_ledger`] model:
//! - Trailing moving averages and crossover detection
//! - Point-in-time instrument and portfolio performance
//! - Per-holding value distribution
//! - Time-bucketed performance series for charting
//! - Percentage-target rebalancing with all-or-nothing apply
//!
//! Everything here is a pure function: catalog and aggregate in,
//! computed values out. No IO, no retries, no mutation of inputs.

mod rebalance;
mod series;
mod valuation;

pub use rebalance::{
    allocation, rebalance, RebalanceAction, RebalanceError, RebalanceOutcome, RebalanceTrade,
    TargetAllocation,
};
pub use series::{performance_series, BucketWidth, PerformanceSeries, SeriesPoint};
pub use valuation::{
    crossovers, distribution, holding_value_or_zero, moving_average, performance,
    portfolio_value, Distribution, ValuationError,
};
