//! Order Tracker (C9)
//!
//! A single background worker owned by the maker loop polls order
//! status and venue A's trade tape (§4.9). Both streams advance
//! `state.filled`; the hedger is handed only the *new* delta each time,
//! and since `state.filled` is the single value both streams compare
//! against, no trade is ever hedged twice even though two independent
//! polling loops observe it (property 6, the no-orphan-fill invariant).

use std::collections::{HashSet, VecDeque};

use arb_core::{LiquidityOrderIndex, OrderStatus, VenueAAdapter};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::stats::Stats;

/// Bounded LRU-style dedup set over trade ids (§4.9: capacity 500).
pub struct TradeDedup {
    order: VecDeque<String>,
    set: HashSet<String>,
    capacity: usize,
}

impl TradeDedup {
    pub fn new(capacity: usize) -> Self {
        Self { order: VecDeque::with_capacity(capacity), set: HashSet::with_capacity(capacity), capacity: capacity.max(1) }
    }

    /// Returns `true` if `id` had not been seen before (and records it).
    pub fn insert_if_new(&mut self, id: &str) -> bool {
        if self.set.contains(id) {
            return false;
        }
        self.set.insert(id.to_string());
        self.order.push_back(id.to_string());
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.set.remove(&oldest);
            }
        }
        true
    }
}

/// A fill delta ready to be handed to the hedger, attributed to a
/// specific tracked order.
#[derive(Debug, Clone, PartialEq)]
pub struct FillDelta {
    pub order_id: String,
    pub delta: Decimal,
}

pub struct OrderTracker {
    dedup: Mutex<TradeDedup>,
}

impl OrderTracker {
    pub fn new(trade_dedup_capacity: usize) -> Self {
        Self { dedup: Mutex::new(TradeDedup::new(trade_dedup_capacity)) }
    }

    /// Poll `get_order` for every tracked order, update its normalized
    /// status/filled/total, and return the new-fill deltas observed
    /// this pass. A terminal status (filled or cancelled-terminal) is
    /// not itself removed here: §4.8's cancel protocol and the
    /// marked-for-removal sweep own index mutation so a late fill from
    /// the *other* stream (trade tape) is never missed mid-poll.
    pub fn poll_statuses(&self, index: &Mutex<LiquidityOrderIndex>, venue_a: &dyn VenueAAdapter, now: f64) -> Vec<FillDelta> {
        let order_ids: Vec<String> = {
            let idx = index.lock();
            idx.ids().map(|s| s.order_id.clone()).collect()
        };

        let mut deltas = Vec::new();
        for order_id in order_ids {
            match venue_a.get_order(&order_id) {
                Ok(query) => {
                    let mut idx = index.lock();
                    if let Some(state) = idx.get_by_id_mut(&order_id) {
                        let prior_filled = state.filled;
                        state.status = query.status;
                        state.filled = query.filled;
                        state.updated_at = now;
                        state.last_status_check = now;
                        let delta = (query.filled - prior_filled).max(Decimal::ZERO);
                        if delta > Decimal::ZERO {
                            deltas.push(FillDelta { order_id: order_id.clone(), delta });
                        }
                        if query.status == OrderStatus::Filled {
                            info!(order_id, filled = %query.filled, "order tracker: status poll observed full fill");
                        }
                    }
                }
                Err(err) => {
                    warn!(order_id, error = %err, "order tracker: status poll failed");
                }
            }
        }
        deltas
    }

    /// Poll the last `trade_limit` venue-A trades, de-duplicate by
    /// trade id, and aggregate new filled-status trades into one fill
    /// delta per tracked order for this poll (§4.9).
    pub fn poll_trades(&self, index: &Mutex<LiquidityOrderIndex>, venue_a: &dyn VenueAAdapter, trade_limit: usize, stats: &Stats) -> Vec<FillDelta> {
        let trades = match venue_a.get_recent_trades(trade_limit) {
            Ok(trades) => trades,
            Err(err) => {
                warn!(error = %err, "order tracker: trade tape poll failed");
                return Vec::new();
            }
        };

        let mut grouped: std::collections::HashMap<String, Decimal> = std::collections::HashMap::new();
        {
            let mut dedup = self.dedup.lock();
            for trade in &trades {
                if !trade.is_filled() {
                    continue;
                }
                if !dedup.insert_if_new(&trade.trade_id) {
                    continue;
                }
                if let Some(shares) = trade.resolved_shares() {
                    *grouped.entry(trade.order_id.clone()).or_insert(Decimal::ZERO) += shares;
                } else {
                    warn!(trade_id = %trade.trade_id, "order tracker: trade carried no resolvable share count");
                }
            }
        }

        let mut deltas = Vec::new();
        for (order_id, shares) in grouped {
            let mut idx = index.lock();
            match idx.get_by_id_mut(&order_id) {
                Some(state) => {
                    state.filled += shares;
                    deltas.push(FillDelta { order_id, delta: shares });
                }
                None => {
                    // Trade references an order id we are not (or no
                    // longer) tracking (§7 TrackingDrift).
                    drop(idx);
                    stats.record_untracked_trade();
                    info!(order_id, %shares, "order tracker: fill observed for untracked order, no hedge attempted");
                }
            }
        }
        deltas
    }

    /// Force-remove entries that have sat marked-for-removal longer than
    /// `timeout_seconds` (§4.8's soft-remove timeout).
    pub fn sweep_marked_for_removal(&self, index: &Mutex<LiquidityOrderIndex>, now: f64, timeout_seconds: f64) {
        let mut idx = index.lock();
        let stale: Vec<String> = idx
            .ids()
            .filter(|s| s.marked_for_removal && now - s.updated_at > timeout_seconds)
            .map(|s| s.order_id.clone())
            .collect();
        for order_id in stale {
            warn!(order_id, "order tracker: force-removing order past marked-for-removal timeout");
            idx.force_remove(&order_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MockVenues;
    use arb_core::{LiquidityOrderState, MarketMatch, Side, Trade};
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

    fn register(index: &Mutex<LiquidityOrderIndex>, order_id: &str) {
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
            status: OrderStatus::Pending,
            filled: dec!(0),
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
    fn status_poll_reports_new_fill_delta() {
        let mocks = MockVenues::new();
        let index = Mutex::new(LiquidityOrderIndex::new());
        register(&index, "a-order-1");
        mocks.venue_a.queue_status("a-order-1", OrderStatus::Partial, dec!(150), dec!(300));

        let tracker = OrderTracker::new(500);
        let deltas = tracker.poll_statuses(&index, &mocks.venue_a, 1.0);
        assert_eq!(deltas, vec![FillDelta { order_id: "a-order-1".into(), delta: dec!(150) }]);

        // second poll with the same filled amount yields no new delta
        let deltas2 = tracker.poll_statuses(&index, &mocks.venue_a, 2.0);
        assert!(deltas2.is_empty());
    }

    #[test]
    fn s4_cancel_races_fill_is_observed_via_status_poll() {
        let mocks = MockVenues::new();
        let index = Mutex::new(LiquidityOrderIndex::new());
        register(&index, "a-order-1");
        mocks.venue_a.queue_status("a-order-1", OrderStatus::Filled, dec!(250), dec!(250));

        let tracker = OrderTracker::new(500);
        let deltas = tracker.poll_statuses(&index, &mocks.venue_a, 1.0);
        assert_eq!(deltas, vec![FillDelta { order_id: "a-order-1".into(), delta: dec!(250) }]);
        assert_eq!(index.lock().get_by_id("a-order-1").unwrap().status, OrderStatus::Filled);
    }

    #[test]
    fn trade_tape_dedups_by_trade_id_across_polls() {
        let mocks = MockVenues::new();
        let index = Mutex::new(LiquidityOrderIndex::new());
        register(&index, "a-order-1");
        mocks.venue_a.push_trade(Trade {
            trade_id: "t1".into(),
            order_id: "a-order-1".into(),
            price: dec!(0.43),
            shares: Some(dec!(80)),
            usd_amount_wei: None,
            status_raw: "MATCHED".into(),
        });

        let tracker = OrderTracker::new(500);
        let stats = Stats::new();
        let first = tracker.poll_trades(&index, &mocks.venue_a, 40, &stats);
        assert_eq!(first, vec![FillDelta { order_id: "a-order-1".into(), delta: dec!(80) }]);

        // re-polling the same (undeleted) trade tape must not double-count
        let second = tracker.poll_trades(&index, &mocks.venue_a, 40, &stats);
        assert!(second.is_empty());
        assert_eq!(index.lock().get_by_id("a-order-1").unwrap().filled, dec!(80));
    }

    #[test]
    fn trade_for_untracked_order_is_counted_not_hedged() {
        let mocks = MockVenues::new();
        let index = Mutex::new(LiquidityOrderIndex::new());
        mocks.venue_a.push_trade(Trade {
            trade_id: "t2".into(),
            order_id: "ghost-order".into(),
            price: dec!(0.5),
            shares: Some(dec!(10)),
            usd_amount_wei: None,
            status_raw: "filled".into(),
        });

        let tracker = OrderTracker::new(500);
        let stats = Stats::new();
        let deltas = tracker.poll_trades(&index, &mocks.venue_a, 40, &stats);
        assert!(deltas.is_empty());
        assert_eq!(stats.snapshot().untracked_trades, 1);
    }

    #[test]
    fn marked_for_removal_sweep_force_removes_past_timeout() {
        let index = Mutex::new(LiquidityOrderIndex::new());
        register(&index, "a-order-1");
        {
            let mut idx = index.lock();
            let state = idx.get_by_id_mut("a-order-1").unwrap();
            state.marked_for_removal = true;
            state.updated_at = 0.0;
            idx.soft_remove("k1");
        }

        let tracker = OrderTracker::new(500);
        tracker.sweep_marked_for_removal(&index, 400.0, 300.0);
        assert_eq!(index.lock().id_count(), 0);
    }
}
