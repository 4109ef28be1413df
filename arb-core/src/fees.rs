//! Fee model
//!
//! Venue A charges a taker fee that depends on price (maximal near
//! p=0.5, minimal near the extremes) with an absolute floor; venue B's
//! effective cost is simply its rounded price plus a flat taker adder.
//! Ported from `arbitrage_core/fees.py::FeeCalculator`.

use crate::book::round_price;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// `order_size * price` must be at least this to place a maker order on
/// venue A.
pub const NOTIONAL_FLOOR: Decimal = dec!(1.3);

/// `0.06 * p * (1 - p) + 0.0025`
pub fn venue_a_fee_rate(price: Decimal) -> Decimal {
    dec!(0.06) * price * (dec!(1) - price) + dec!(0.0025)
}

/// Gross order quantity to place on venue A so that, post-fee, the fill
/// delivers `target_net` tokens. Two-branch rule: the percentage-fee
/// path applies unless the implied fee would fall below `min_fee`, in
/// which case the floor dominates.
pub fn venue_a_adjusted_quantity(target_net: Decimal, price: Decimal, min_fee: Decimal) -> Decimal {
    if price.is_zero() {
        return target_net;
    }
    let rate = venue_a_fee_rate(price);
    let provisional_qty = target_net / (dec!(1) - rate);
    let provisional_fee = price * provisional_qty * rate;
    if provisional_fee <= min_fee {
        target_net + min_fee / price
    } else {
        provisional_qty
    }
}

/// Per-token cost including fees, under the same two-branch rule as
/// [`venue_a_adjusted_quantity`], used directly in opportunity scoring.
pub fn venue_a_effective_unit_cost(price: Decimal, size: Decimal, min_fee: Decimal) -> Decimal {
    if size.is_zero() {
        return price;
    }
    let rate = venue_a_fee_rate(price);
    let percentage_fee = price * size * rate;
    if percentage_fee <= min_fee {
        price + min_fee / size
    } else {
        round_price(price / (dec!(1) - rate))
    }
}

/// Venue B's effective unit cost: the rounded price plus a flat taker
/// adder when the leg is a taker fill (zero for maker legs).
pub fn venue_b_effective_unit_cost(price: Decimal, taker_adder: Decimal, is_taker: bool) -> Decimal {
    let rounded = round_price(price);
    if is_taker {
        rounded + taker_adder
    } else {
        rounded
    }
}

/// Whether `order_size * price` clears venue A's maker notional floor.
pub fn meets_notional_floor(order_size: Decimal, price: Decimal) -> bool {
    order_size * price >= NOTIONAL_FLOOR
}

/// The tick size a venue-B order should be quoted with: 0.001 when the
/// reference price carries 3+ decimal digits, else 0.01.
pub fn tick_size_for(price: Decimal) -> Decimal {
    if price.round_dp(2) == price {
        dec!(0.01)
    } else {
        dec!(0.001)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fee_rate_peaks_near_half() {
        let at_half = venue_a_fee_rate(dec!(0.5));
        let near_edge = venue_a_fee_rate(dec!(0.05));
        assert!(at_half > near_edge);
    }

    #[test]
    fn floor_dominates_for_small_orders() {
        // at p=0.05, tiny size: percentage fee is negligible, floor wins.
        let price = dec!(0.05);
        let qty = venue_a_adjusted_quantity(dec!(1), price, dec!(0.5));
        let rate = venue_a_fee_rate(price);
        let naive = dec!(1) / (dec!(1) - rate);
        assert!(qty > naive, "floor-dominated path should require more gross size");
    }

    #[test]
    fn percentage_path_for_large_orders() {
        let price = dec!(0.5);
        let qty = venue_a_adjusted_quantity(dec!(1000), price, dec!(0.5));
        let rate = venue_a_fee_rate(price);
        let expected = dec!(1000) / (dec!(1) - rate);
        assert_eq!(qty, expected);
    }

    #[test]
    fn notional_floor_check() {
        assert!(meets_notional_floor(dec!(10), dec!(0.2)));
        assert!(!meets_notional_floor(dec!(1), dec!(0.2)));
    }

    #[test]
    fn tick_size_selection() {
        assert_eq!(tick_size_for(dec!(0.45)), dec!(0.01));
        assert_eq!(tick_size_for(dec!(0.453)), dec!(0.001));
    }

    proptest! {
        #[test]
        fn effective_cost_monotonic_in_price(
            p1 in 1i64..980,
            delta in 1i64..10,
        ) {
            // large size keeps the percentage branch dominant across the whole range
            let price1 = Decimal::new(p1, 3);
            let price2 = Decimal::new(p1 + delta, 3);
            let size = dec!(100000);
            let c1 = venue_a_effective_unit_cost(price1, size, dec!(0.5));
            let c2 = venue_a_effective_unit_cost(price2, size, dec!(0.5));
            prop_assert!(c2 >= c1);
        }
    }
}
