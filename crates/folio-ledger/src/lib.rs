//! folio-ledger
//!
//! Share-ledger and portfolio model:
//! - Per-instrument record of signed share-count deltas keyed by date,
//!   with derived cumulative position queries
//! - Immutable portfolio aggregate over those ledgers, with date-range
//!   and price-validity queries
//! - Pure deterministic logic (no IO, no time, no prices held locally)
//!
//! Every "mutation" constructs and returns a new value; a previously held
//! ledger or aggregate is never affected by later operations.

mod ledger;
mod portfolio;

pub use ledger::{LedgerError, ShareLedger};
pub use portfolio::{PortfolioAggregate, PortfolioBuilder, PortfolioError};

use std::collections::BTreeMap;

use chrono::NaiveDate;

/// Canonical delta-map type (date -> signed share quantity).
pub type DeltaMap = BTreeMap<NaiveDate, f64>;

/// Tolerance for share-quantity comparisons.
///
/// Rebalancing derives sell quantities by dividing values that were
/// produced by multiplying the same price, so a full liquidation can land
/// one ulp above the held position. Comparisons that gate on "more than
/// held" allow this much slack.
pub const QTY_EPSILON: f64 = 1e-9;
