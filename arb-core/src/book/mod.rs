//! Book normalization: vendor-shaped level lists to top-N snapshots,
//! YES→NO derivation, and crossed-book detection.

use crate::model::{OrderBookLevel, OrderBookSnapshot, Venue, BOOK_DEPTH};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Round a price to the authoritative 3-decimal precision used
/// throughout the system.
pub fn round_price(price: Decimal) -> Decimal {
    price.round_dp(3)
}

/// Build a normalized snapshot from raw (price, size) pairs. Sorts bids
/// descending and asks ascending, rounds every price to 3 decimals, and
/// truncates each side to [`BOOK_DEPTH`].
pub fn normalize(
    raw_bids: &[(Decimal, Decimal)],
    raw_asks: &[(Decimal, Decimal)],
    source: Venue,
    token_id: impl Into<String>,
    timestamp: f64,
) -> OrderBookSnapshot {
    let mut bids: Vec<OrderBookLevel> = raw_bids
        .iter()
        .map(|&(p, s)| OrderBookLevel { price: round_price(p), size: s })
        .collect();
    bids.sort_by(|a, b| b.price.cmp(&a.price));
    bids.truncate(BOOK_DEPTH);

    let mut asks: Vec<OrderBookLevel> = raw_asks
        .iter()
        .map(|&(p, s)| OrderBookLevel { price: round_price(p), size: s })
        .collect();
    asks.sort_by(|a, b| a.price.cmp(&b.price));
    asks.truncate(BOOK_DEPTH);

    OrderBookSnapshot {
        bids,
        asks,
        source,
        token_id: token_id.into(),
        timestamp,
    }
}

/// Derive the NO-token snapshot from a YES-token snapshot:
/// `bid_NO(p, s) <- ask_YES(1-p, s)` and symmetrically for asks.
pub fn derive_no_from_yes(yes: &OrderBookSnapshot, no_token_id: impl Into<String>) -> OrderBookSnapshot {
    let mut bids: Vec<OrderBookLevel> = yes
        .asks
        .iter()
        .map(|lvl| OrderBookLevel {
            price: round_price(dec!(1) - lvl.price),
            size: lvl.size,
        })
        .collect();
    bids.sort_by(|a, b| b.price.cmp(&a.price));

    let mut asks: Vec<OrderBookLevel> = yes
        .bids
        .iter()
        .map(|lvl| OrderBookLevel {
            price: round_price(dec!(1) - lvl.price),
            size: lvl.size,
        })
        .collect();
    asks.sort_by(|a, b| a.price.cmp(&b.price));

    OrderBookSnapshot {
        bids,
        asks,
        source: yes.source,
        token_id: no_token_id.into(),
        timestamp: yes.timestamp,
    }
}

/// Skew gate: true when two snapshots' acquisition timestamps differ by
/// more than `max_skew_seconds`, meaning both should be discarded for
/// this cycle.
pub fn is_skewed(a: &OrderBookSnapshot, b: &OrderBookSnapshot, max_skew_seconds: f64) -> bool {
    (a.timestamp - b.timestamp).abs() > max_skew_seconds
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn normalize_sorts_and_rounds() {
        let bids = [(dec!(0.4321), dec!(10)), (dec!(0.50001), dec!(5))];
        let asks = [(dec!(0.6), dec!(10)), (dec!(0.55), dec!(5))];
        let snap = normalize(&bids, &asks, Venue::A, "tok", 1.0);
        assert_eq!(snap.bids[0].price, dec!(0.500));
        assert_eq!(snap.bids[1].price, dec!(0.432));
        assert_eq!(snap.asks[0].price, dec!(0.55));
        assert_eq!(snap.asks[1].price, dec!(0.6));
    }

    #[test]
    fn normalize_truncates_to_depth() {
        let bids: Vec<(Decimal, Decimal)> = (0..10)
            .map(|i| (Decimal::new(500 - i, 3), dec!(1)))
            .collect();
        let snap = normalize(&bids, &[], Venue::A, "tok", 0.0);
        assert_eq!(snap.bids.len(), BOOK_DEPTH);
    }

    #[test]
    fn no_derivation_matches_spec_formula() {
        let yes = normalize(
            &[(dec!(0.40), dec!(100))],
            &[(dec!(0.45), dec!(200))],
            Venue::A,
            "yes_tok",
            5.0,
        );
        let no = derive_no_from_yes(&yes, "no_tok");
        // ask_YES(0.45) -> bid_NO(0.55)
        assert_eq!(no.bids[0].price, dec!(0.55));
        assert_eq!(no.bids[0].size, dec!(200));
        // bid_YES(0.40) -> ask_NO(0.60)
        assert_eq!(no.asks[0].price, dec!(0.60));
        assert_eq!(no.asks[0].size, dec!(100));
    }

    #[test]
    fn skew_gate_flags_timestamp_drift() {
        let a = normalize(&[], &[], Venue::A, "t", 100.0);
        let b = normalize(&[], &[], Venue::B, "t", 104.0);
        assert!(is_skewed(&a, &b, 3.0));
        assert!(!is_skewed(&a, &b, 5.0));
    }

    proptest! {
        #[test]
        fn rounding_is_idempotent(cents in 0i64..=1000, extra in 0i64..=999) {
            let raw = Decimal::new(cents * 1000 + extra, 3);
            let once = round_price(raw);
            let twice = round_price(once);
            prop_assert_eq!(once, twice);
            prop_assert!(once.scale() <= 3);
        }

        #[test]
        fn no_derivation_symmetry(price in 1i64..999, size in 1i64..100000) {
            let p = Decimal::new(price, 3);
            let s = Decimal::new(size, 0);
            let yes = normalize(&[], &[(p, s)], Venue::A, "yes", 0.0);
            let no = derive_no_from_yes(&yes, "no");
            prop_assert_eq!(no.bids[0].price, round_price(dec!(1) - p));
            prop_assert_eq!(no.bids[0].size, s);
        }
    }
}
