//! Scenario: cumulative position reconstruction from a sparse delta series.
//!
//! # Invariants under test
//!
//! 1. The position as of any date D equals the sum of all deltas dated
//!    ≤ D; later deltas never leak in.
//! 2. `total_shares()` always equals `shares_as_of(last_transaction_date())`,
//!    even after sells lower intermediate positions.
//! 3. Positions are not monotone — a sell between two queries may lower
//!    the later one.
//! 4. Serialize/rehydrate through the delta pairs answers identically
//!    for every date in the original delta set.
//!
//! All tests are pure; no IO, no prices.

use chrono::NaiveDate;
use folio_ledger::ShareLedger;

fn d(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

#[test]
fn staircase_of_buys_accumulates_by_date() {
    let ledger = ShareLedger::opening("GOOG", d("2024-05-21"), 5.0)
        .unwrap()
        .increase(d("2024-05-22"), 6.0)
        .unwrap()
        .increase(d("2024-05-23"), 10.0)
        .unwrap();

    assert_eq!(ledger.shares_as_of(d("2024-05-21")), 5.0);
    assert_eq!(ledger.shares_as_of(d("2024-05-22")), 11.0);
    assert_eq!(ledger.shares_as_of(d("2024-05-23")), 21.0);
    // A date between transactions sees the position standing at the time.
    assert_eq!(ledger.shares_as_of(d("2024-05-25")), 21.0);
}

#[test]
fn position_is_not_monotone_but_total_matches_last_date() {
    let ledger = ShareLedger::opening("GOOG", d("2024-05-21"), 10.0)
        .unwrap()
        .decrease(d("2024-05-23"), 7.0)
        .unwrap()
        .increase(d("2024-05-24"), 1.0)
        .unwrap();

    let early = ledger.shares_as_of(d("2024-05-21"));
    let later = ledger.shares_as_of(d("2024-05-23"));
    assert!(later < early, "a sell must lower the later position");

    let last = ledger.last_transaction_date().unwrap();
    assert_eq!(ledger.total_shares(), ledger.shares_as_of(last));
}

#[test]
fn same_day_buy_then_partial_sell_nets() {
    let ledger = ShareLedger::opening("GOOG", d("2024-05-21"), 5.0)
        .unwrap()
        .decrease(d("2024-05-21"), 3.0)
        .unwrap();
    assert_eq!(ledger.shares_as_of(d("2024-05-21")), 2.0);
}

#[test]
fn rehydration_round_trip_preserves_every_queried_position() {
    let original = ShareLedger::opening("GOOG", d("2024-05-21"), 5.0)
        .unwrap()
        .increase(d("2024-05-22"), 6.0)
        .unwrap()
        .decrease(d("2024-05-24"), 2.5)
        .unwrap()
        .increase(d("2024-06-03"), 0.5)
        .unwrap();

    // The persistence layer sees only (date, delta) pairs.
    let pairs: Vec<_> = original.deltas().collect();
    let rehydrated = ShareLedger::from_deltas("GOOG", pairs);

    for (date, _) in original.deltas() {
        assert_eq!(
            original.shares_as_of(date),
            rehydrated.shares_as_of(date),
            "divergence at {date}"
        );
    }
    assert_eq!(original.total_shares(), rehydrated.total_shares());
}
