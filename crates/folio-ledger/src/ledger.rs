//! Share ledger — the per-instrument record of share-count deltas.
//!
//! # Purpose
//! A [`ShareLedger`] answers "how many shares of this instrument were
//! held as of date D" from a sparse series of signed deltas. It owns the
//! invariant boundary for that series:
//!
//! - Quantities entering through [`increase`](ShareLedger::increase) /
//!   [`decrease`](ShareLedger::decrease) must be strictly positive and
//!   finite.
//! - A decrease may not drive the position as of its date negative, nor
//!   drive a purchase recorded on that exact date negative.
//! - Operations never mutate in place: each returns a new ledger and the
//!   old value stays valid for any other holder.
//!
//! # Determinism
//! Pure — no IO, no time, no randomness. The delta map is a `BTreeMap`,
//! so iteration is calendar order and rehydration is order-independent.

use chrono::NaiveDate;

use crate::{DeltaMap, QTY_EPSILON};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Invariant violations a [`ShareLedger`] operation can surface.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// The quantity of an increase/decrease must be strictly positive
    /// and finite.
    NonPositiveQuantity { qty: f64 },
    /// The decrease would take the position (or the same-date purchase)
    /// below zero.
    InsufficientShares {
        ticker: String,
        date: NaiveDate,
        requested: f64,
        available: f64,
    },
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonPositiveQuantity { qty } => {
                write!(f, "ledger invariant: quantity must be > 0, got {qty}")
            }
            Self::InsufficientShares {
                ticker,
                date,
                requested,
                available,
            } => write!(
                f,
                "insufficient shares of {ticker} at {date}: requested {requested}, available {available}"
            ),
        }
    }
}

impl std::error::Error for LedgerError {}

// ---------------------------------------------------------------------------
// ShareLedger
// ---------------------------------------------------------------------------

/// Immutable per-instrument share-delta ledger.
///
/// The cumulative position is always derived from the delta map on
/// demand; nothing cached is authoritative.
#[derive(Debug, Clone, PartialEq)]
pub struct ShareLedger {
    ticker: String,
    deltas: DeltaMap,
}

impl ShareLedger {
    /// A ledger with no transactions yet.
    pub fn new<S: Into<String>>(ticker: S) -> Self {
        Self {
            ticker: ticker.into(),
            deltas: DeltaMap::new(),
        }
    }

    /// A fresh ledger opened by a single purchase.
    pub fn opening<S: Into<String>>(
        ticker: S,
        date: NaiveDate,
        qty: f64,
    ) -> Result<Self, LedgerError> {
        Self::new(ticker).increase(date, qty)
    }

    /// Rehydrate from persisted (date, signed delta) pairs.
    ///
    /// A later pair for an already-seen date overwrites the earlier one;
    /// pairs do not accumulate.
    pub fn from_deltas<S, I>(ticker: S, deltas: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        Self {
            ticker: ticker.into(),
            deltas: deltas.into_iter().collect(),
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    /// The raw delta series, for lossless serialization.
    pub fn deltas(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.deltas.iter().map(|(d, q)| (*d, *q))
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    // -----------------------------------------------------------------------
    // Write surface (returns new values)
    // -----------------------------------------------------------------------

    /// Record a share purchase at `date`.
    ///
    /// Nets into an existing same-date delta; otherwise inserts one.
    ///
    /// # Errors
    /// [`LedgerError::NonPositiveQuantity`] unless `qty > 0` and finite.
    /// `self` is never affected by the outcome.
    pub fn increase(&self, date: NaiveDate, qty: f64) -> Result<Self, LedgerError> {
        validate_qty(qty)?;
        let mut deltas = self.deltas.clone();
        *deltas.entry(date).or_insert(0.0) += qty;
        Ok(Self {
            ticker: self.ticker.clone(),
            deltas,
        })
    }

    /// Record a share sale at `date`.
    ///
    /// Nets into an existing same-date delta; otherwise inserts a
    /// negative one.
    ///
    /// # Errors
    /// [`LedgerError::NonPositiveQuantity`] unless `qty > 0` and finite.
    /// [`LedgerError::InsufficientShares`] when the position as of `date`
    /// cannot cover `qty`, or when a purchase recorded exactly at `date`
    /// would be driven negative. `self` is never affected by the outcome.
    pub fn decrease(&self, date: NaiveDate, qty: f64) -> Result<Self, LedgerError> {
        validate_qty(qty)?;

        let available = self.shares_as_of(date);
        if qty - available > QTY_EPSILON {
            return Err(LedgerError::InsufficientShares {
                ticker: self.ticker.clone(),
                date,
                requested: qty,
                available,
            });
        }
        // A purchase recorded on this exact date cannot be sold past
        // itself; sales against earlier purchases insert their own entry.
        if let Some(&same_day) = self.deltas.get(&date) {
            if same_day > 0.0 && qty - same_day > QTY_EPSILON {
                return Err(LedgerError::InsufficientShares {
                    ticker: self.ticker.clone(),
                    date,
                    requested: qty,
                    available: same_day,
                });
            }
        }

        let mut deltas = self.deltas.clone();
        *deltas.entry(date).or_insert(0.0) -= qty;
        Ok(Self {
            ticker: self.ticker.clone(),
            deltas,
        })
    }

    // -----------------------------------------------------------------------
    // Read surface
    // -----------------------------------------------------------------------

    /// Cumulative position as of `date` (deltas dated ≤ `date`).
    ///
    /// 0.0 when no delta qualifies — never a sentinel.
    pub fn shares_as_of(&self, date: NaiveDate) -> f64 {
        self.deltas
            .range(..=date)
            .map(|(_, qty)| qty)
            .sum()
    }

    /// Sum of all deltas, the position after the final transaction.
    pub fn total_shares(&self) -> f64 {
        self.deltas.values().sum()
    }

    /// Earliest delta date; `None` for an empty ledger.
    pub fn first_transaction_date(&self) -> Option<NaiveDate> {
        self.deltas.keys().next().copied()
    }

    /// Latest delta date; `None` for an empty ledger.
    pub fn last_transaction_date(&self) -> Option<NaiveDate> {
        self.deltas.keys().next_back().copied()
    }
}

fn validate_qty(qty: f64) -> Result<(), LedgerError> {
    if qty.is_finite() && qty > 0.0 {
        Ok(())
    } else {
        Err(LedgerError::NonPositiveQuantity { qty })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
