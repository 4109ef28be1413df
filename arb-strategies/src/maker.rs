//! Maker Provider (C8)
//!
//! Drives a set-reconciliation state machine over resting venue-A bids
//! (§4.8). Each cycle computes the desired set of maker candidates
//! (capped at `max_liquidity_orders`, ranked by annualized descending),
//! places orders for newly-desired keys, cancels orders whose key
//! dropped out of the desired set, and reprices orders whose key is
//! still desired but whose price has moved past tolerance.
//!
//! The cancel protocol (§4.8 steps 1-5) guarantees the no-orphan-fill
//! invariant: an order asked to cancel but that actually filled is
//! still observed (via the dwell-then-requery step) and handed to the
//! hedger before being force-removed.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use arb_core::fees::{meets_notional_floor, venue_a_adjusted_quantity};
use arb_core::{LiquidityOrderIndex, LiquidityOrderState, MarketMatch, Opportunity, OrderRequest, OrderStatus, VenueAAdapter, VenueBAdapter};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::hedger::{hedge_fill, HedgeOutcome};
use crate::stats::Stats;

#[derive(Debug, Clone)]
pub struct MakerConfig {
    pub max_liquidity_orders: usize,
    pub liquidity_price_tolerance: Decimal,
    pub liquidity_requote_increment: Decimal,
    pub liquidity_target_size: Decimal,
    pub opinion_min_fee: Decimal,
    /// Dwell between a cancel request and the status re-query that
    /// confirms it (§4.8 step 2); ~0.5s in the reference example.
    pub cancel_dwell: Duration,
}

#[derive(Debug, Default, Clone)]
pub struct MakerStats {
    pub placed: u64,
    pub cancelled: u64,
    pub repriced: u64,
    pub skipped_notional_floor: u64,
}

/// A maker candidate paired with the match it was derived from, since
/// `Opportunity` itself does not carry `venue_b_slug` or `neg_risk_b`.
#[derive(Debug, Clone)]
pub struct MakerCandidate {
    pub market: MarketMatch,
    pub opportunity: Opportunity,
}

pub struct MakerProvider {
    cfg: MakerConfig,
    placed: std::sync::atomic::AtomicU64,
    cancelled: std::sync::atomic::AtomicU64,
    repriced: std::sync::atomic::AtomicU64,
    skipped_notional_floor: std::sync::atomic::AtomicU64,
}

impl MakerProvider {
    pub fn new(cfg: MakerConfig) -> Self {
        use std::sync::atomic::AtomicU64;
        Self {
            cfg,
            placed: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
            repriced: AtomicU64::new(0),
            skipped_notional_floor: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> MakerStats {
        use std::sync::atomic::Ordering;
        MakerStats {
            placed: self.placed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            repriced: self.repriced.load(Ordering::Relaxed),
            skipped_notional_floor: self.skipped_notional_floor.load(Ordering::Relaxed),
        }
    }

    /// One reconciliation pass. `candidates` should be every maker
    /// opportunity that passed the detector for this batch of matches,
    /// paired with their originating match, one or two per match (one
    /// per buy direction).
    pub fn reconcile(
        &self,
        index: &Mutex<LiquidityOrderIndex>,
        candidates: &[MakerCandidate],
        venue_a: &dyn VenueAAdapter,
        venue_b: &dyn VenueBAdapter,
        stats: &Stats,
        now: f64,
    ) {
        let desired = desired_set(candidates, self.cfg.max_liquidity_orders);
        let desired_keys: HashSet<&str> = desired.iter().map(|(k, _)| k.as_str()).collect();

        let existing_keys: Vec<String> = {
            let idx = index.lock();
            idx.keys().map(String::from).collect()
        };

        for key in existing_keys {
            if !desired_keys.contains(key.as_str()) {
                if let Some(order_id) = self.order_id_for_key(index, &key) {
                    self.cancel_protocol(index, venue_a, venue_b, stats, &order_id, now);
                }
            }
        }

        for (key, candidate) in &desired {
            let existing_order_id = {
                let idx = index.lock();
                idx.get_by_key(key).map(|s| s.order_id.clone())
            };
            match existing_order_id {
                None => self.place_new(index, venue_a, key, candidate, now),
                Some(order_id) => self.maybe_reprice(index, venue_a, venue_b, stats, &order_id, candidate, now),
            }
        }
    }

    fn order_id_for_key(&self, index: &Mutex<LiquidityOrderIndex>, key: &str) -> Option<String> {
        index.lock().get_by_key(key).map(|s| s.order_id.clone())
    }

    fn place_new(&self, index: &Mutex<LiquidityOrderIndex>, venue_a: &dyn VenueAAdapter, key: &str, candidate: &MakerCandidate, now: f64) {
        let opp = &candidate.opportunity;
        let price = opp.first_leg.price;
        let order_size = self.cfg.liquidity_target_size.min(opp.min_size);
        if !meets_notional_floor(order_size, price) {
            self.skipped_notional_floor.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            info!(key, %price, %order_size, "maker: skipping placement, below venue A notional floor");
            return;
        }
        let effective_size = venue_a_adjusted_quantity(order_size, price, self.cfg.opinion_min_fee);

        let request = OrderRequest::new(opp.market_id_a.clone(), opp.first_leg.token.clone(), opp.first_leg.side, price, order_size);
        match venue_a.place_order(&request) {
            Ok(ack) => {
                let state = LiquidityOrderState {
                    key: key.to_string(),
                    order_id: ack.order_id,
                    market: candidate.market.clone(),
                    token_a: opp.first_leg.token.clone(),
                    price_a: price,
                    side_a: opp.first_leg.side,
                    order_size_a: order_size,
                    effective_size,
                    token_b: opp.second_leg.token.clone(),
                    side_b: opp.second_leg.side,
                    price_b_reference: opp.second_leg.price,
                    status: OrderStatus::Pending,
                    filled: Decimal::ZERO,
                    hedged: Decimal::ZERO,
                    created_at: now,
                    updated_at: now,
                    marked_for_removal: false,
                    last_status_check: now,
                    last_status_log: None,
                };
                index.lock().insert(state);
                self.placed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                info!(key, %price, %order_size, "maker: placed new resting order");
            }
            Err(err) => {
                warn!(key, error = %err, "maker: order placement rejected");
            }
        }
    }

    /// Reprice rule (§4.8): a best-bid move past the requote increment,
    /// or any price drift past tolerance, triggers cancel+requote;
    /// otherwise keep the order and only refresh the hedge reference
    /// price.
    fn maybe_reprice(
        &self,
        index: &Mutex<LiquidityOrderIndex>,
        venue_a: &dyn VenueAAdapter,
        venue_b: &dyn VenueBAdapter,
        stats: &Stats,
        order_id: &str,
        candidate: &MakerCandidate,
        now: f64,
    ) {
        let (resting_price, key) = {
            let idx = index.lock();
            match idx.get_by_id(order_id) {
                Some(state) => (state.price_a, state.key.clone()),
                None => return,
            }
        };
        let new_price = candidate.opportunity.first_leg.price;

        let best_bid_moved_up = new_price > resting_price + self.cfg.liquidity_requote_increment;
        let drifted_past_tolerance = (new_price - resting_price).abs() > self.cfg.liquidity_price_tolerance;

        if best_bid_moved_up || drifted_past_tolerance {
            self.cancel_protocol(index, venue_a, venue_b, stats, order_id, now);
            self.place_new(index, venue_a, &key, candidate, now);
            self.repriced.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        } else {
            let mut idx = index.lock();
            if let Some(state) = idx.get_by_id_mut(order_id) {
                state.price_b_reference = candidate.opportunity.second_leg.price;
                state.updated_at = now;
            }
        }
    }

    /// Cancel protocol (§4.8 steps 1-5): send cancel, dwell, re-query.
    /// A confirmed-cancelled order is soft-removed (kept in the by-id
    /// index so a late fill is still hedged); a cancel that raced a
    /// fill synthesizes the delta and hands it to the hedger before
    /// force-removal, so the fill is never orphaned.
    fn cancel_protocol(
        &self,
        index: &Mutex<LiquidityOrderIndex>,
        venue_a: &dyn VenueAAdapter,
        venue_b: &dyn VenueBAdapter,
        stats: &Stats,
        order_id: &str,
        now: f64,
    ) {
        if let Err(err) = venue_a.cancel(order_id) {
            warn!(order_id, error = %err, "maker: cancel request rejected, order remains tracked");
            return;
        }

        std::thread::sleep(self.cfg.cancel_dwell);

        let query = match venue_a.get_order(order_id) {
            Ok(query) => query,
            Err(err) => {
                warn!(order_id, error = %err, "maker: cancel-verify status query failed");
                return;
            }
        };

        enum Resolution {
            RacedFill(Decimal),
            Cancelled(String),
            StillPending,
        }

        let resolution = {
            let mut idx = index.lock();
            match idx.get_by_id_mut(order_id) {
                Some(state) => {
                    let prior_filled = state.filled;
                    state.status = query.status;
                    state.filled = query.filled;
                    state.updated_at = now;

                    if query.status.is_filled() && query.filled > prior_filled {
                        Resolution::RacedFill(query.filled - prior_filled)
                    } else if query.status.is_terminal_cancelled() {
                        state.marked_for_removal = true;
                        Resolution::Cancelled(state.key.clone())
                    } else {
                        Resolution::StillPending
                    }
                }
                None => return,
            }
        };

        match resolution {
            Resolution::RacedFill(delta) => {
                warn!(order_id, %delta, "maker: cancel raced a fill, hedging before removal");
                stats.record_fill(delta);
                let outcome = hedge_fill(index, order_id, delta, venue_b, stats);
                match &outcome {
                    HedgeOutcome::Completed { hedged } => {
                        info!(order_id, %hedged, "maker: raced fill fully hedged before removal");
                    }
                    HedgeOutcome::Partial { hedged, reason } => {
                        warn!(order_id, %hedged, %delta, reason, "maker: raced fill only partially hedged before removal");
                    }
                    HedgeOutcome::Disabled => {
                        warn!(order_id, %delta, "maker: raced fill left unhedged, venue B trading disabled");
                    }
                    HedgeOutcome::UnknownOrder => {}
                }
                index.lock().force_remove(order_id);
            }
            Resolution::Cancelled(key) => {
                index.lock().soft_remove(&key);
                self.cancelled.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                info!(order_id, "maker: order confirmed cancelled, soft-removed from active set");
            }
            Resolution::StillPending => {
                info!(order_id, status = ?query.status, "maker: cancel still pending, will retry next cycle");
            }
        }
    }
}

/// Rank `candidates` by annualized rate descending (`None` always
/// loses), keep at most one candidate per key, and cap the result at
/// `cap` entries (§4.6 tie-break, §4.8 desired-set cardinality,
/// property 7).
pub fn desired_set(candidates: &[MakerCandidate], cap: usize) -> Vec<(String, MakerCandidate)> {
    let mut best_by_key: HashMap<String, MakerCandidate> = HashMap::new();
    for candidate in candidates {
        let key = key_for_match(&candidate.market, &candidate.opportunity);
        let challenger_rank = candidate.opportunity.annualized_rate.unwrap_or(f64::NEG_INFINITY);
        match best_by_key.get(&key) {
            Some(existing) if existing.opportunity.annualized_rate.unwrap_or(f64::NEG_INFINITY) >= challenger_rank => {}
            _ => {
                best_by_key.insert(key, candidate.clone());
            }
        }
    }

    let mut ranked: Vec<(String, MakerCandidate)> = best_by_key.into_iter().collect();
    ranked.sort_by(|(_, a), (_, b)| {
        let ra = a.opportunity.annualized_rate.unwrap_or(f64::NEG_INFINITY);
        let rb = b.opportunity.annualized_rate.unwrap_or(f64::NEG_INFINITY);
        rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(cap);
    ranked
}

/// The by-key identity for a maker candidate: `(market_id_a, token_a,
/// direction, slug_b)` per §3's model.
pub fn key_for_match(market: &MarketMatch, opp: &Opportunity) -> String {
    LiquidityOrderState::make_key(&market.market_id_a, &opp.first_leg.token, opp.strategy.as_str(), &market.venue_b_slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MockVenues;
    use arb_core::{LegSpec, Side, Strategy, Venue};
    use rust_decimal_macros::dec;

    fn cfg() -> MakerConfig {
        MakerConfig {
            max_liquidity_orders: 2,
            liquidity_price_tolerance: dec!(0.003),
            liquidity_requote_increment: dec!(0.0),
            liquidity_target_size: dec!(250),
            opinion_min_fee: dec!(0.5),
            cancel_dwell: Duration::from_millis(0),
        }
    }

    fn sample_match(market_id: &str) -> MarketMatch {
        MarketMatch {
            question: "q".into(),
            market_id_a: market_id.into(),
            yes_token_a: "ya".into(),
            no_token_a: "na".into(),
            condition_id_b: "c1".into(),
            yes_token_b: "yb".into(),
            no_token_b: "nb".into(),
            venue_b_slug: format!("slug-{market_id}"),
            cutoff_at: None,
            fee_rate_bps_b: 0,
            neg_risk_b: false,
        }
    }

    fn candidate(market_id: &str, price_a: Decimal, price_b: Decimal, annualized: f64) -> MakerCandidate {
        let opportunity = Opportunity {
            market_id_a: market_id.into(),
            strategy: Strategy::YaNbMaker,
            first_leg: LegSpec::new(Venue::A, "ya", Side::Buy, price_a, dec!(300)),
            second_leg: LegSpec::new(Venue::B, "nb", Side::Buy, price_b, dec!(300)),
            cost: 0.9,
            profit_rate: 0.1,
            annualized_rate: Some(annualized),
            min_size: dec!(300),
            timestamp: 0.0,
        };
        MakerCandidate { market: sample_match(market_id), opportunity }
    }

    #[test]
    fn desired_set_ranks_and_caps() {
        let a = candidate("m1", dec!(0.40), dec!(0.55), 10.0);
        let b = candidate("m2", dec!(0.41), dec!(0.55), 50.0);
        let c = candidate("m3", dec!(0.42), dec!(0.55), 30.0);
        let ranked = desired_set(&[a, b, c], 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].1.market.market_id_a, "m2");
        assert_eq!(ranked[1].1.market.market_id_a, "m3");
    }

    #[test]
    fn s3_reprice_on_best_bid_improvement() {
        let mocks = MockVenues::new();
        let index = Mutex::new(LiquidityOrderIndex::new());
        let provider = MakerProvider::new(MakerConfig { liquidity_requote_increment: dec!(0.001), ..cfg() });

        let stats = Stats::new();
        let first = candidate("m1", dec!(0.430), dec!(0.55), 30.0);
        let key = key_for_match(&first.market, &first.opportunity);
        provider.reconcile(&index, &[first.clone()], &mocks.venue_a, &mocks.venue_b, &stats, 0.0);
        assert_eq!(mocks.venue_a.placed_orders().len(), 1);
        let original_order_id = index.lock().get_by_key(&key).unwrap().order_id.clone();

        let moved = candidate("m1", dec!(0.435), dec!(0.55), 30.0);
        provider.reconcile(&index, &[moved.clone()], &mocks.venue_a, &mocks.venue_b, &stats, 1.0);

        assert!(mocks.venue_a.cancelled_ids().contains(&original_order_id));
        assert_eq!(mocks.venue_a.placed_orders().len(), 2);
        let new_key = key_for_match(&moved.market, &moved.opportunity);
        let new_state = index.lock().get_by_key(&new_key).unwrap().clone();
        assert_eq!(new_state.price_a, dec!(0.435));
        assert_ne!(new_state.order_id, original_order_id);
    }

    #[test]
    fn s4_cancel_races_fill_hedges_before_force_remove() {
        let mocks = MockVenues::new();
        mocks.set_book_b("nb", Venue::B, &[], &[(dec!(0.55), dec!(300))]);
        let index = Mutex::new(LiquidityOrderIndex::new());
        let provider = MakerProvider::new(cfg());
        let stats = Stats::new();

        let a = candidate("m1", dec!(0.430), dec!(0.55), 30.0);
        let key = key_for_match(&a.market, &a.opportunity);
        provider.reconcile(&index, &[a], &mocks.venue_a, &mocks.venue_b, &stats, 0.0);
        let order_id = index.lock().get_by_key(&key).unwrap().order_id.clone();

        // venue now reports filled when we verify the cancel
        mocks.venue_a.queue_status(&order_id, OrderStatus::Filled, dec!(250), dec!(250));

        // next cycle: candidate drops out of the desired set entirely
        provider.reconcile(&index, &[], &mocks.venue_a, &mocks.venue_b, &stats, 1.0);

        assert!(mocks.venue_a.cancelled_ids().contains(&order_id));
        assert!(index.lock().get_by_id(&order_id).is_none(), "force-removed after racing a fill");

        let hedges = mocks.venue_b.placed_orders();
        assert_eq!(hedges.len(), 1, "raced fill must be hedged before removal");
        assert_eq!(hedges[0].size, dec!(250));
        assert_eq!(stats.snapshot().fills_volume, dec!(250));
    }

    #[test]
    fn cardinality_never_exceeds_cap() {
        let mocks = MockVenues::new();
        let index = Mutex::new(LiquidityOrderIndex::new());
        let provider = MakerProvider::new(cfg());

        let candidates: Vec<MakerCandidate> = (0..5).map(|i| candidate(&format!("m{i}"), dec!(0.40), dec!(0.55), 10.0 + i as f64)).collect();
        let stats = Stats::new();
        provider.reconcile(&index, &candidates, &mocks.venue_a, &mocks.venue_b, &stats, 0.0);
        assert!(index.lock().key_count() <= cfg().max_liquidity_orders);
    }

    #[test]
    fn skips_placement_below_notional_floor() {
        let mocks = MockVenues::new();
        let index = Mutex::new(LiquidityOrderIndex::new());
        let provider = MakerProvider::new(MakerConfig { liquidity_target_size: dec!(1), ..cfg() });
        let stats = Stats::new();

        let tiny = candidate("m1", dec!(0.01), dec!(0.55), 30.0);
        provider.reconcile(&index, &[tiny], &mocks.venue_a, &mocks.venue_b, &stats, 0.0);
        assert!(mocks.venue_a.placed_orders().is_empty());
        assert_eq!(provider.stats().skipped_notional_floor, 1);
    }
}
