//! Rebalancing: move a portfolio's value distribution to a target
//! percentage allocation.
//!
//! The solver computes, per holding, the signed share delta that brings
//! `close(D) × total_shares` to `total × pct / 100`, then applies every
//! delta as a ledger operation at `D`. Application is all-or-nothing:
//! ledger operations are staged against copies, and the new aggregate is
//! produced only when every holding succeeded — a failure leaves the
//! caller's aggregate untouched.
//!
//! Share deltas are fractional here; whole-share rounding is a concern
//! of whichever caller imposes it.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use folio_ledger::{LedgerError, PortfolioAggregate};
use folio_md::PriceCatalog;

// ---------------------------------------------------------------------------
// Allocation
// ---------------------------------------------------------------------------

/// Target percentages by ticker. Whole numbers; negatives are
/// unrepresentable by construction.
pub type TargetAllocation = BTreeMap<String, u32>;

/// Helper to build a [`TargetAllocation`] with minimal boilerplate.
pub fn allocation<I, S>(items: I) -> TargetAllocation
where
    I: IntoIterator<Item = (S, u32)>,
    S: Into<String>,
{
    let mut map = TargetAllocation::new();
    for (ticker, pct) in items {
        map.insert(ticker.into(), pct);
    }
    map
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures surfaced by the rebalance solver.
#[derive(Debug, Clone, PartialEq)]
pub enum RebalanceError {
    /// Percentages do not sum to 100, or do not cover exactly the
    /// portfolio's holdings.
    InvalidAllocation { detail: String },
    /// `date` is not valid for every holding, or a close vanished
    /// mid-computation.
    MissingPriceData { ticker: String, date: NaiveDate },
    /// The portfolio has no holdings to rebalance.
    EmptyPortfolio { name: String },
    /// A staged ledger operation failed (e.g. insufficient shares).
    Ledger(LedgerError),
}

impl std::fmt::Display for RebalanceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAllocation { detail } => write!(f, "invalid allocation: {detail}"),
            Self::MissingPriceData { ticker, date } => {
                write!(f, "no price data for {ticker} on {date}")
            }
            Self::EmptyPortfolio { name } => {
                write!(f, "portfolio '{name}' has no holdings to rebalance")
            }
            Self::Ledger(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for RebalanceError {}

impl From<LedgerError> for RebalanceError {
    fn from(err: LedgerError) -> Self {
        RebalanceError::Ledger(err)
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Buy or sell, from the portfolio's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebalanceAction {
    Buy,
    Sell,
}

/// One executed adjustment, for display layers.
#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceTrade {
    pub ticker: String,
    pub action: RebalanceAction,
    pub shares: f64,
    pub value: f64,
}

/// The rebalanced aggregate plus the adjustments that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceOutcome {
    pub portfolio: PortfolioAggregate,
    pub trades: Vec<RebalanceTrade>,
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

/// Rebalance `portfolio` at `date` to the target allocation.
///
/// # Errors
/// - [`RebalanceError::EmptyPortfolio`] on a holdings-less aggregate.
/// - [`RebalanceError::InvalidAllocation`] when the percentages do not
///   sum to 100 or do not cover exactly the held tickers.
/// - [`RebalanceError::MissingPriceData`] when `date` is not valid for
///   every holding.
/// - [`RebalanceError::Ledger`] when a staged operation fails.
///
/// On any error the input aggregate is observably unchanged.
pub fn rebalance(
    catalog: &PriceCatalog,
    portfolio: &PortfolioAggregate,
    date: NaiveDate,
    targets: &TargetAllocation,
) -> Result<RebalanceOutcome, RebalanceError> {
    if portfolio.is_empty() {
        return Err(RebalanceError::EmptyPortfolio {
            name: portfolio.name().to_string(),
        });
    }
    validate_allocation(portfolio, targets)?;

    for ticker in portfolio.tickers() {
        if !catalog.has_record(ticker, date) {
            return Err(RebalanceError::MissingPriceData {
                ticker: ticker.to_string(),
                date,
            });
        }
    }

    // Pass 1: current value per holding and the portfolio total.
    let mut currents = Vec::with_capacity(portfolio.holding_count());
    let mut total = 0.0;
    for (ticker, ledger) in portfolio.holdings() {
        let close = catalog
            .close(ticker, date)
            .ok_or_else(|| RebalanceError::MissingPriceData {
                ticker: ticker.to_string(),
                date,
            })?;
        let value = close * ledger.total_shares();
        total += value;
        currents.push((ticker, ledger, close, value));
    }

    // Pass 2: stage every ledger operation; nothing is visible yet.
    let mut staged = Vec::with_capacity(currents.len());
    let mut trades = Vec::new();
    for (ticker, ledger, close, value) in currents {
        let pct = targets[ticker];
        let target_value = total / 100.0 * f64::from(pct);
        let difference = value - target_value;
        let shares = difference.abs() / close;

        if difference > 0.0 {
            staged.push(ledger.decrease(date, shares)?);
            trades.push(RebalanceTrade {
                ticker: ticker.to_string(),
                action: RebalanceAction::Sell,
                shares,
                value: difference,
            });
        } else if shares > 0.0 {
            staged.push(ledger.increase(date, shares)?);
            trades.push(RebalanceTrade {
                ticker: ticker.to_string(),
                action: RebalanceAction::Buy,
                shares,
                value: -difference,
            });
        } else {
            // Already on target: no entry, no trade.
            staged.push(ledger.clone());
        }
    }

    // Pass 3: commit — every operation succeeded.
    let mut rebalanced = portfolio.clone();
    for ledger in staged {
        rebalanced = rebalanced.with_added(ledger);
    }
    Ok(RebalanceOutcome {
        portfolio: rebalanced,
        trades,
    })
}

fn validate_allocation(
    portfolio: &PortfolioAggregate,
    targets: &TargetAllocation,
) -> Result<(), RebalanceError> {
    for ticker in portfolio.tickers() {
        if !targets.contains_key(ticker) {
            return Err(RebalanceError::InvalidAllocation {
                detail: format!("no target percentage for held ticker {ticker}"),
            });
        }
    }
    for ticker in targets.keys() {
        if portfolio.holding(ticker).is_none() {
            return Err(RebalanceError::InvalidAllocation {
                detail: format!("target names unheld ticker {ticker}"),
            });
        }
    }
    let sum: u32 = targets.values().sum();
    if sum != 100 {
        return Err(RebalanceError::InvalidAllocation {
            detail: format!("percentages sum to {sum}, expected 100"),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
