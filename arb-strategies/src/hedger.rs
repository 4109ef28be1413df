//! Hedger (C10)
//!
//! Consumes a fill delta observed on a resting venue-A maker order and
//! loop-fills the counter-leg on venue B, walking down the book one
//! level at a time when the top ask is thinner than what remains
//! (§4.10). Invoked synchronously from the single order-tracker
//! background worker, so fills and hedges for a given order observe a
//! total order (§5 "Ordering").

use arb_core::fees::tick_size_for;
use arb_core::venue::{TimeInForce, VenueBOptions};
use arb_core::{LiquidityOrderIndex, OrderRequest, VenueBAdapter};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;
use tracing::{info, warn};

use crate::stats::Stats;

/// Floor below which a remaining/tradable amount is treated as noise
/// rather than a real residual to keep filling.
const EPSILON: Decimal = dec!(0.000001);

/// Sleep briefly between successive loop-filler iterations so the
/// engine does not hammer venue B's order-entry endpoint while walking
/// multiple book levels for one large fill.
const INTER_STEP_SLEEP: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, PartialEq)]
pub enum HedgeOutcome {
    /// The entire delta was hedged, possibly across multiple book levels.
    Completed { hedged: Decimal },
    /// Some of the delta was hedged before a placement failed or
    /// liquidity ran out; `hedged` is what got through.
    Partial { hedged: Decimal, reason: String },
    /// Venue B has no signing key configured; the order would-place is
    /// logged but not submitted (§3 of SPEC_FULL, read-only mode).
    Disabled,
    /// The order was no longer tracked by the time the hedger ran.
    UnknownOrder,
}

/// Hedge `delta` newly-filled units of `order_id`'s venue-A leg by
/// taking venue B's best ask repeatedly until `delta` is consumed or
/// liquidity/placement failures stop the loop.
pub fn hedge_fill(
    index: &Mutex<LiquidityOrderIndex>,
    order_id: &str,
    delta: Decimal,
    venue_b: &dyn VenueBAdapter,
    stats: &Stats,
) -> HedgeOutcome {
    let (token_b, side_b, market_id_a, neg_risk_b) = {
        let idx = index.lock();
        match idx.get_by_id(order_id) {
            Some(state) => (
                state.token_b.clone(),
                state.side_b,
                state.market.market_id_a.clone(),
                state.market.neg_risk_b,
            ),
            None => return HedgeOutcome::UnknownOrder,
        }
    };

    if !venue_b.trading_enabled() {
        warn!(
            order_id,
            market_id_a = %market_id_a,
            %delta,
            "venue B trading disabled (read-only mode): hedge suppressed, position left unhedged"
        );
        return HedgeOutcome::Disabled;
    }

    let mut remaining = delta;
    let mut hedged_total = Decimal::ZERO;

    while remaining > EPSILON {
        let book = match venue_b.fetch_book(&token_b) {
            Ok(book) => book,
            Err(err) => {
                warn!(order_id, error = %err, "hedger: book fetch failed");
                stats.record_hedge_failure();
                return partial_or_completed(hedged_total, delta, "book fetch failed");
            }
        };
        let ask = match book.best_ask() {
            Some(ask) => ask,
            None => {
                warn!(order_id, "hedger: no liquidity on venue B top-of-book");
                stats.record_hedge_failure();
                return partial_or_completed(hedged_total, delta, "no liquidity");
            }
        };

        let tradable = remaining.min(ask.size);
        if tradable <= EPSILON {
            warn!(order_id, "hedger: top-ask too thin to make progress");
            stats.record_hedge_failure();
            return partial_or_completed(hedged_total, delta, "top-ask too thin");
        }

        let request = OrderRequest::new(market_id_a.clone(), token_b.clone(), side_b, ask.price, tradable)
            .with_tif(TimeInForce::Gtc)
            .with_venue_b_options(VenueBOptions { tick_size: tick_size_for(ask.price), neg_risk: neg_risk_b });

        match venue_b.place_order(&request) {
            Ok(_) => {
                remaining -= tradable;
                hedged_total += tradable;
                stats.record_hedge(tradable);
                {
                    let mut idx = index.lock();
                    if let Some(state) = idx.get_by_id_mut(order_id) {
                        state.hedged += tradable;
                    }
                }
                info!(order_id, price = %ask.price, size = %tradable, "hedge leg placed on venue B");
                if remaining > EPSILON {
                    std::thread::sleep(INTER_STEP_SLEEP);
                }
            }
            Err(err) => {
                warn!(order_id, error = %err, "hedger: venue B placement failed");
                stats.record_hedge_failure();
                return partial_or_completed(hedged_total, delta, &err.to_string());
            }
        }
    }

    HedgeOutcome::Completed { hedged: hedged_total }
}

fn partial_or_completed(hedged: Decimal, delta: Decimal, reason: &str) -> HedgeOutcome {
    if hedged >= delta {
        HedgeOutcome::Completed { hedged }
    } else {
        HedgeOutcome::Partial { hedged, reason: reason.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MockVenues;
    use arb_core::{LiquidityOrderState, MarketMatch, OrderStatus, Side, Venue};
    use rust_decimal_macros::dec;

    fn sample_match() -> MarketMatch {
        MarketMatch {
            question: "q".into(),
            market_id_a: "m1".into(),
            yes_token_a: "ya".into(),
            no_token_a: "na".into(),
            condition_id_b: "c1".into(),
            yes_token_b: "yb".into(),
            no_token_b: "nb".into(),
            venue_b_slug: "slug".into(),
            cutoff_at: None,
            fee_rate_bps_b: 0,
            neg_risk_b: false,
        }
    }

    fn register_order(index: &Mutex<LiquidityOrderIndex>, order_id: &str) {
        let state = LiquidityOrderState {
            key: "k1".into(),
            order_id: order_id.into(),
            market: sample_match(),
            token_a: "ya".into(),
            price_a: dec!(0.43),
            side_a: Side::Buy,
            order_size_a: dec!(300),
            effective_size: dec!(300),
            token_b: "nb".into(),
            side_b: Side::Buy,
            price_b_reference: dec!(0.50),
            status: OrderStatus::Partial,
            filled: dec!(300),
            hedged: dec!(0),
            created_at: 0.0,
            updated_at: 0.0,
            marked_for_removal: false,
            last_status_check: 0.0,
            last_status_log: None,
        };
        index.lock().insert(state);
    }

    #[test]
    fn s5_hedge_walks_two_book_levels() {
        let mocks = MockVenues::new();
        // top ask 0.500 size 180, second ask 0.510 size 200
        mocks.set_book_b("nb", Venue::B, &[], &[(dec!(0.500), dec!(180)), (dec!(0.510), dec!(200))]);
        let index = Mutex::new(LiquidityOrderIndex::new());
        register_order(&index, "a-order-1");
        let stats = Stats::new();

        let outcome = hedge_fill(&index, "a-order-1", dec!(300), &mocks.venue_b, &stats);
        match outcome {
            HedgeOutcome::Completed { hedged } => assert_eq!(hedged, dec!(300)),
            other => panic!("expected completed, got {other:?}"),
        }

        let placed = mocks.venue_b.placed_orders();
        assert_eq!(placed.len(), 2);
        assert_eq!(placed[0].price, dec!(0.500));
        assert_eq!(placed[0].size, dec!(180));
        assert_eq!(placed[1].price, dec!(0.510));
        assert_eq!(placed[1].size, dec!(120));

        let idx = index.lock();
        assert_eq!(idx.get_by_id("a-order-1").unwrap().hedged, dec!(300));
    }

    #[test]
    fn no_liquidity_reports_partial() {
        let mocks = MockVenues::new();
        let index = Mutex::new(LiquidityOrderIndex::new());
        register_order(&index, "a-order-1");
        let stats = Stats::new();

        let outcome = hedge_fill(&index, "a-order-1", dec!(100), &mocks.venue_b, &stats);
        match outcome {
            HedgeOutcome::Partial { hedged, .. } => assert_eq!(hedged, dec!(0)),
            other => panic!("expected partial, got {other:?}"),
        }
        assert_eq!(stats.snapshot().hedge_failures, 1);
    }

    #[test]
    fn trading_disabled_suppresses_hedge() {
        let mocks = MockVenues::new();
        mocks.venue_b.set_trading_enabled(false);
        mocks.set_book_b("nb", Venue::B, &[], &[(dec!(0.50), dec!(500))]);
        let index = Mutex::new(LiquidityOrderIndex::new());
        register_order(&index, "a-order-1");
        let stats = Stats::new();

        let outcome = hedge_fill(&index, "a-order-1", dec!(100), &mocks.venue_b, &stats);
        assert_eq!(outcome, HedgeOutcome::Disabled);
        assert!(mocks.venue_b.placed_orders().is_empty());
    }

    #[test]
    fn unknown_order_is_reported() {
        let mocks = MockVenues::new();
        let index = Mutex::new(LiquidityOrderIndex::new());
        let stats = Stats::new();
        let outcome = hedge_fill(&index, "ghost", dec!(10), &mocks.venue_b, &stats);
        assert_eq!(outcome, HedgeOutcome::UnknownOrder);
    }
}
