//! Portfolio aggregate — an immutable collection of share ledgers.
//!
//! Holdings are keyed by ticker and the key always equals the ledger's
//! own ticker (enforced at every insertion point). "Mutation" is
//! copy-on-write over the holdings map: the ledgers themselves are
//! cloned values, so no aggregate ever shares a mutable map with its
//! predecessor.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use folio_md::PriceCatalog;

use crate::ShareLedger;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures surfaced by date queries on an aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortfolioError {
    /// The query needs at least one holding with a transaction.
    EmptyPortfolio { name: String },
}

impl std::fmt::Display for PortfolioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPortfolio { name } => {
                write!(f, "portfolio '{name}' has no purchased holdings")
            }
        }
    }
}

impl std::error::Error for PortfolioError {}

// ---------------------------------------------------------------------------
// PortfolioAggregate
// ---------------------------------------------------------------------------

/// Immutable named collection of [`ShareLedger`]s, keyed by ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioAggregate {
    name: String,
    holdings: BTreeMap<String, ShareLedger>,
}

impl PortfolioAggregate {
    /// A portfolio with no holdings yet.
    pub fn empty<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            holdings: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    pub fn holding_count(&self) -> usize {
        self.holdings.len()
    }

    /// The ledger for `ticker`, if held.
    pub fn holding(&self, ticker: &str) -> Option<&ShareLedger> {
        self.holdings.get(ticker)
    }

    /// (ticker, ledger) pairs in ticker order.
    pub fn holdings(&self) -> impl Iterator<Item = (&str, &ShareLedger)> {
        self.holdings.iter().map(|(t, l)| (t.as_str(), l))
    }

    /// Held tickers in lexical order.
    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.holdings.keys().map(String::as_str)
    }

    /// Earliest transaction date across all holdings — the date the
    /// portfolio came into existence.
    ///
    /// # Errors
    /// [`PortfolioError::EmptyPortfolio`] when no holding has recorded a
    /// transaction (holdings without deltas do not count).
    pub fn purchase_date(&self) -> Result<NaiveDate, PortfolioError> {
        self.holdings
            .values()
            .filter_map(ShareLedger::first_transaction_date)
            .min()
            .ok_or_else(|| PortfolioError::EmptyPortfolio {
                name: self.name.clone(),
            })
    }

    /// Latest transaction date across all holdings.
    ///
    /// # Errors
    /// Same as [`purchase_date`](Self::purchase_date).
    pub fn latest_date(&self) -> Result<NaiveDate, PortfolioError> {
        self.holdings
            .values()
            .filter_map(ShareLedger::last_transaction_date)
            .max()
            .ok_or_else(|| PortfolioError::EmptyPortfolio {
                name: self.name.clone(),
            })
    }

    /// Whether the catalog has a record at `date` for every held ticker.
    ///
    /// Membership gates this, not position: a ticker sold down to zero
    /// still participates. This is the precondition for valuation and
    /// rebalancing at `date`.
    pub fn is_valid_for_all(&self, catalog: &PriceCatalog, date: NaiveDate) -> bool {
        self.holdings
            .keys()
            .all(|ticker| catalog.has_record(ticker, date))
    }

    /// A new aggregate with `ledger` added (or replacing the holding
    /// with the same ticker). `self` is unaffected.
    pub fn with_added(&self, ledger: ShareLedger) -> Self {
        let mut holdings = self.holdings.clone();
        holdings.insert(ledger.ticker().to_string(), ledger);
        Self {
            name: self.name.clone(),
            holdings,
        }
    }

    /// A new aggregate without `ticker`. Removing an absent ticker is a
    /// no-op, matching the observed contract of the desk's callers.
    pub fn with_removed(&self, ticker: &str) -> Self {
        let mut holdings = self.holdings.clone();
        holdings.remove(ticker);
        Self {
            name: self.name.clone(),
            holdings,
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Functional builder: each step consumes the builder and returns a new
/// one, so no partially built aggregate is ever shared.
#[derive(Debug, Clone, Default)]
pub struct PortfolioBuilder {
    holdings: BTreeMap<String, ShareLedger>,
}

impl PortfolioBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a ledger, keyed by its own ticker. A second ledger with the
    /// same ticker replaces the first.
    pub fn with_holding(mut self, ledger: ShareLedger) -> Self {
        self.holdings.insert(ledger.ticker().to_string(), ledger);
        self
    }

    pub fn build<S: Into<String>>(self, name: S) -> PortfolioAggregate {
        PortfolioAggregate {
            name: name.into(),
            holdings: self.holdings,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
