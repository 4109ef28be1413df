//! Taker Executor (C7)
//!
//! Fires both legs of an immediate opportunity as two separate,
//! independent order placements. Neither leg waits on the other: both
//! are aggressive takers on visible crossable asks, so both are
//! expected to fill or be rejected by the venue on their own. A prior
//! execution of the same `(market, strategy)` key within
//! `execution_cooldown` is skipped and counted as a de-duplication
//! (property 5).
//!
//! This executor does **not** add a confirm-then-fire sequencer: if
//! one leg is rejected (e.g. a stale ask) while the other fills, the
//! position ends up directionally exposed. Spec.md §9 names this as an
//! acknowledged open question rather than a defect to paper over; a
//! confirm-then-fire variant is left to a future iteration.

use arb_core::fees::venue_a_adjusted_quantity;
use arb_core::{ArbError, Opportunity, OrderRequest, Side, VenueAAdapter, VenueBAdapter};
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct TakerConfig {
    pub immediate_min_percent: f64,
    pub immediate_max_percent: f64,
    pub immediate_order_size: Decimal,
    pub execution_cooldown: Duration,
    pub order_max_retries: u32,
    pub order_retry_delay: Duration,
    pub opinion_min_fee: Decimal,
}

#[derive(Debug, Default, Clone)]
pub struct TakerStats {
    pub fired: u64,
    pub deduplicated: u64,
    pub leg_failures: u64,
}

/// Cooldown map keyed by `(market_id, strategy)`, reaped of entries
/// older than 60s opportunistically on every dedup check (§5 "Shared
/// state").
pub struct TakerExecutor {
    cfg: TakerConfig,
    recent_executions: DashMap<String, Instant>,
    fired: AtomicU64,
    deduplicated: AtomicU64,
    leg_failures: AtomicU64,
}

impl TakerExecutor {
    pub fn new(cfg: TakerConfig) -> Self {
        Self {
            cfg,
            recent_executions: DashMap::new(),
            fired: AtomicU64::new(0),
            deduplicated: AtomicU64::new(0),
            leg_failures: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> TakerStats {
        TakerStats {
            fired: self.fired.load(Ordering::Relaxed),
            deduplicated: self.deduplicated.load(Ordering::Relaxed),
            leg_failures: self.leg_failures.load(Ordering::Relaxed),
        }
    }

    /// True when `opportunity` sits within the immediate-execution
    /// annualized window. A `None` annualized rate never qualifies.
    pub fn in_window(&self, opportunity: &Opportunity) -> bool {
        match opportunity.annualized_rate {
            Some(rate) => rate >= self.cfg.immediate_min_percent && rate <= self.cfg.immediate_max_percent,
            None => false,
        }
    }

    /// Reap cooldown entries older than 60s, then check-and-set the
    /// key. Returns `true` if this key was already in cooldown (the
    /// caller should skip and count a dedup), `false` if this call
    /// claimed the key.
    fn check_and_claim_cooldown(&self, key: &str) -> bool {
        let now = Instant::now();
        self.recent_executions.retain(|_, ts| now.duration_since(*ts) < Duration::from_secs(60));

        if let Some(entry) = self.recent_executions.get(key) {
            if now.duration_since(*entry) < self.cfg.execution_cooldown {
                return true;
            }
        }
        self.recent_executions.insert(key.to_string(), now);
        false
    }

    /// Dispatch both legs of `opportunity` on separate threads, firing
    /// and reporting without waiting for fills. Returns immediately
    /// after spawning; the caller (the loop driver) joins all such
    /// handles before starting the next cycle.
    pub fn execute(
        &self,
        opportunity: &Opportunity,
        venue_a: &(dyn VenueAAdapter + Sync),
        venue_b: &(dyn VenueBAdapter + Sync),
    ) -> Result<(), ArbError> {
        let key = opportunity.cooldown_key();
        if self.check_and_claim_cooldown(&key) {
            self.deduplicated.fetch_add(1, Ordering::Relaxed);
            info!(key = %key, "taker execution de-duplicated within cooldown window");
            return Ok(());
        }

        let order_size = self.cfg.immediate_order_size.min(opportunity.min_size * Decimal::new(9, 1)).min(Decimal::new(1000, 0));

        let leg_a_target = order_size;
        let leg_a_gross = if opportunity.first_leg.venue == arb_core::Venue::A {
            venue_a_adjusted_quantity(leg_a_target, opportunity.first_leg.price, self.cfg.opinion_min_fee)
        } else {
            leg_a_target
        };

        let fatal = Mutex::new(None::<ArbError>);
        std::thread::scope(|scope| {
            scope.spawn(|| {
                let result = self.submit_with_retries(
                    venue_a,
                    &opportunity.first_leg.token,
                    opportunity.market_id_a.clone(),
                    opportunity.first_leg.side,
                    opportunity.first_leg.price,
                    leg_a_gross,
                );
                self.record_leg_outcome("venue_a", result, &fatal);
            });
            scope.spawn(|| {
                let result = self.submit_with_retries_b(
                    venue_b,
                    &opportunity.second_leg.token,
                    opportunity.market_id_a.clone(),
                    opportunity.second_leg.side,
                    opportunity.second_leg.price,
                    leg_a_target,
                );
                self.record_leg_outcome("venue_b", result, &fatal);
            });
        });

        self.fired.fetch_add(1, Ordering::Relaxed);
        if let Some(err) = fatal.into_inner() {
            return Err(err);
        }
        Ok(())
    }

    fn record_leg_outcome(&self, venue: &'static str, result: Result<(), ArbError>, fatal: &Mutex<Option<ArbError>>) {
        match result {
            Ok(()) => {}
            Err(err) => {
                self.leg_failures.fetch_add(1, Ordering::Relaxed);
                warn!(venue, error = %err, "taker leg failed after retries");
                if err.is_fatal() {
                    *fatal.lock() = Some(err);
                }
            }
        }
    }

    fn submit_with_retries(
        &self,
        venue_a: &(dyn VenueAAdapter + Sync),
        token: &str,
        market_id: String,
        side: Side,
        price: Decimal,
        size: Decimal,
    ) -> Result<(), ArbError> {
        let request = OrderRequest::new(market_id, token, side, price, size);
        let mut attempt = 0;
        loop {
            match venue_a.place_order(&request) {
                Ok(_) => return Ok(()),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) if err.is_retryable() && attempt < self.cfg.order_max_retries => {
                    attempt += 1;
                    std::thread::sleep(self.cfg.order_retry_delay);
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn submit_with_retries_b(
        &self,
        venue_b: &(dyn VenueBAdapter + Sync),
        token: &str,
        market_id: String,
        side: Side,
        price: Decimal,
        size: Decimal,
    ) -> Result<(), ArbError> {
        let request = OrderRequest::new(market_id, token, side, price, size);
        let mut attempt = 0;
        loop {
            match venue_b.place_order(&request) {
                Ok(_) => return Ok(()),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) if err.is_retryable() && attempt < self.cfg.order_max_retries => {
                    attempt += 1;
                    std::thread::sleep(self.cfg.order_retry_delay);
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MockVenues;
    use arb_core::{LegSpec, Strategy, Venue};
    use rust_decimal_macros::dec;

    fn cfg() -> TakerConfig {
        TakerConfig {
            immediate_min_percent: 5.0,
            immediate_max_percent: 200.0,
            immediate_order_size: dec!(200),
            execution_cooldown: Duration::from_secs(5),
            order_max_retries: 3,
            order_retry_delay: Duration::from_millis(0),
            opinion_min_fee: dec!(0.5),
        }
    }

    fn sample_opportunity(annualized: Option<f64>) -> Opportunity {
        Opportunity {
            market_id_a: "M1".into(),
            strategy: Strategy::YaNbTaker,
            first_leg: LegSpec::new(Venue::A, "ya", Side::Buy, dec!(0.450), dec!(400)),
            second_leg: LegSpec::new(Venue::B, "nb", Side::Buy, dec!(0.500), dec!(400)),
            cost: 0.968,
            profit_rate: 0.033,
            annualized_rate: annualized,
            min_size: dec!(400),
            timestamp: 0.0,
        }
    }

    #[test]
    fn s1_taker_fires_both_legs_once() {
        let mocks = MockVenues::new();
        let executor = TakerExecutor::new(cfg());
        let opp = sample_opportunity(Some(35.0));
        assert!(executor.in_window(&opp));
        executor.execute(&opp, &mocks.venue_a, &mocks.venue_b).unwrap();
        assert_eq!(mocks.venue_a.placed_orders().len(), 1);
        assert_eq!(mocks.venue_b.placed_orders().len(), 1);
        assert_eq!(executor.stats().fired, 1);
    }

    #[test]
    fn s2_rerun_within_cooldown_is_deduplicated() {
        let mocks = MockVenues::new();
        let executor = TakerExecutor::new(cfg());
        let opp = sample_opportunity(Some(35.0));
        executor.execute(&opp, &mocks.venue_a, &mocks.venue_b).unwrap();
        executor.execute(&opp, &mocks.venue_a, &mocks.venue_b).unwrap();

        assert_eq!(mocks.venue_a.placed_orders().len(), 1, "second run must not place new orders");
        assert_eq!(mocks.venue_b.placed_orders().len(), 1);
        assert_eq!(executor.stats().deduplicated, 1);
    }

    #[test]
    fn out_of_window_annualized_is_not_eligible() {
        let executor = TakerExecutor::new(cfg());
        assert!(!executor.in_window(&sample_opportunity(Some(1.0))));
        assert!(!executor.in_window(&sample_opportunity(Some(500.0))));
        assert!(!executor.in_window(&sample_opportunity(None)));
    }

    #[test]
    fn s6_balance_exhausted_propagates_as_fatal_error() {
        let mocks = MockVenues::new();
        mocks.venue_a.set_balance_exhausted();
        let executor = TakerExecutor::new(cfg());
        let opp = sample_opportunity(Some(35.0));
        let result = executor.execute(&opp, &mocks.venue_a, &mocks.venue_b);
        assert!(result.is_err());
        assert!(result.unwrap_err().is_fatal());
    }
}
