//! Scenario: copy-on-write isolation across ledgers and aggregates.
//!
//! The desk hands the same ledger/aggregate values to several callers
//! (display layers, the rebalance solver, persistence). A "new" value
//! returned by any operation must never share mutable state with its
//! predecessor: the old reference has to answer every query exactly as
//! it did before the operation ran.

use chrono::NaiveDate;
use folio_ledger::{PortfolioBuilder, ShareLedger};

fn d(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

#[test]
fn ledger_fanout_diverges_without_interference() {
    let base = ShareLedger::opening("AAPL", d("2024-05-21"), 10.0).unwrap();

    // Two independent futures branch from the same base.
    let aggressive = base
        .increase(d("2024-05-22"), 90.0)
        .unwrap()
        .increase(d("2024-05-23"), 50.0)
        .unwrap();
    let cautious = base.decrease(d("2024-05-22"), 5.0).unwrap();

    assert_eq!(base.total_shares(), 10.0);
    assert_eq!(aggressive.total_shares(), 150.0);
    assert_eq!(cautious.total_shares(), 5.0);

    // The base's delta series is still the single opening purchase.
    let deltas: Vec<_> = base.deltas().collect();
    assert_eq!(deltas, vec![(d("2024-05-21"), 10.0)]);
}

#[test]
fn aggregate_chain_keeps_every_generation_intact() {
    let gen0 = PortfolioBuilder::new()
        .with_holding(ShareLedger::opening("AAPL", d("2024-05-21"), 5.0).unwrap())
        .build("retirement");

    let gen1 = gen0.with_added(ShareLedger::opening("MSFT", d("2024-05-22"), 3.0).unwrap());
    let gen2 = gen1.with_removed("AAPL");

    assert_eq!(gen0.holding_count(), 1);
    assert_eq!(gen1.holding_count(), 2);
    assert_eq!(gen2.holding_count(), 1);

    assert!(gen0.holding("MSFT").is_none());
    assert!(gen2.holding("AAPL").is_none());
    assert!(gen1.holding("AAPL").is_some());

    // Date queries on the older generations are computed from their own
    // holdings, not the newest map.
    assert_eq!(gen0.latest_date().unwrap(), d("2024-05-21"));
    assert_eq!(gen1.latest_date().unwrap(), d("2024-05-22"));
    assert_eq!(gen2.purchase_date().unwrap(), d("2024-05-22"));
}

#[test]
fn replacing_a_holding_in_a_new_aggregate_leaves_the_old_ledger_visible() {
    let portfolio = PortfolioBuilder::new()
        .with_holding(ShareLedger::opening("AAPL", d("2024-05-21"), 5.0).unwrap())
        .build("retirement");

    let sold = portfolio
        .holding("AAPL")
        .unwrap()
        .decrease(d("2024-05-22"), 2.0)
        .unwrap();
    let after_sale = portfolio.with_added(sold);

    assert_eq!(portfolio.holding("AAPL").unwrap().total_shares(), 5.0);
    assert_eq!(after_sale.holding("AAPL").unwrap().total_shares(), 3.0);
}
