//! Loop Driver (C11)
//!
//! Ties the detector, taker executor, maker provider, order tracker,
//! and hedger into the two run modes named by §6: a taker loop that
//! scans and fires on a fixed cadence, and a maker loop that
//! reconciles resting orders on its own cadence while a background
//! worker polls order status and the trade tape continuously once at
//! least one order is resting (§4.11's lazy-spawn design note).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arb_core::monitoring::MetricsRegistry;
use arb_core::resilience::RateGate;
use arb_core::{LiquidityOrderIndex, MarketMatch, VenueAAdapter, VenueBAdapter};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::book_fetcher::{fetch_match_books, unix_now};
use crate::detector::{detect_maker, detect_taker, pick_best, DetectorConfig};
use crate::hedger::{hedge_fill, HedgeOutcome};
use crate::maker::{MakerCandidate, MakerProvider};
use crate::stats::{fail_stop_on_fatal, Stats};
use crate::taker::TakerExecutor;
use crate::tracker::OrderTracker;

/// A cooperative stop flag shared between the main loop thread and any
/// background worker it spawns. Sleeps are chunked so a stop request
/// is noticed within one chunk rather than one full interval.
#[derive(Clone)]
pub struct StopSignal(Arc<AtomicBool>);

const SLEEP_CHUNK: Duration = Duration::from_millis(200);

impl StopSignal {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early (and returning) as soon as
    /// `stop()` is called.
    pub fn sleep_or_stop(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while !self.is_stopped() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            std::thread::sleep(remaining.min(SLEEP_CHUNK));
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives one scan-and-fire cycle per tick: fetch books for every
/// configured match, detect taker candidates, and fire the best one
/// per match that falls inside the immediate-execution window.
pub struct TakerLoop<'a> {
    pub matches: &'a [MarketMatch],
    pub venue_a: &'a dyn VenueAAdapter,
    pub venue_b: &'a dyn VenueBAdapter,
    pub rate_gate: &'a RateGate,
    pub detector_cfg: DetectorConfig,
    pub executor: &'a TakerExecutor,
    pub metrics: Option<&'a MetricsRegistry>,
    pub orderbook_workers: usize,
    pub books_chunk: usize,
    pub max_orderbook_skew: f64,
    pub immediate_exec_enabled: bool,
}

impl<'a> TakerLoop<'a> {
    /// One scan across every match, firing at most one opportunity per
    /// match (the highest-annualized candidate in the immediate window).
    pub fn run_once(&self) {
        let now = unix_now();
        let resolved = fetch_match_books(
            self.venue_a,
            self.venue_b,
            self.rate_gate,
            self.matches,
            self.orderbook_workers,
            self.books_chunk,
            self.max_orderbook_skew,
        );

        for mb in resolved {
            let candidates: Vec<_> = detect_taker(mb.market, &mb.yes_a, &mb.yes_b, now, &self.detector_cfg)
                .into_iter()
                .filter(|o| self.executor.in_window(o))
                .collect();

            let Some(opp) = pick_best(&candidates) else { continue };

            match self.executor.execute(opp, self.venue_a, self.venue_b) {
                Ok(()) => {
                    if let Some(metrics) = self.metrics {
                        metrics.trading().taker_executions_total.with_label_values(&["fired"]).inc();
                    }
                }
                Err(err) => {
                    if let Some(metrics) = self.metrics {
                        metrics.trading().taker_executions_total.with_label_values(&["failed"]).inc();
                    }
                    warn!(market_id_a = %mb.market.market_id_a, error = %err, "taker: execution failed");
                    fail_stop_on_fatal(&err);
                }
            }
        }
    }

    /// Run until `stop` is requested, ticking every `interval`. A
    /// no-op (single informational log) when immediate execution is
    /// disabled in configuration.
    pub fn run(&self, stop: &StopSignal, interval: Duration) {
        if !self.immediate_exec_enabled {
            info!("taker loop: immediate execution disabled, not starting");
            return;
        }
        while !stop.is_stopped() {
            self.run_once();
            stop.sleep_or_stop(interval);
        }
    }
}

/// Drives the maker reconciliation cycle plus the lazily-spawned
/// background status/trade-tape worker that feeds the hedger.
pub struct MakerLoop<'a> {
    pub matches: &'a [MarketMatch],
    pub venue_a: &'a dyn VenueAAdapter,
    pub venue_b: &'a dyn VenueBAdapter,
    pub rate_gate: &'a RateGate,
    pub detector_cfg: DetectorConfig,
    pub provider: &'a MakerProvider,
    pub tracker: &'a OrderTracker,
    pub stats: &'a Stats,
    pub index: &'a Mutex<LiquidityOrderIndex>,
    pub metrics: Option<&'a MetricsRegistry>,
    pub orderbook_workers: usize,
    pub books_chunk: usize,
    pub max_orderbook_skew: f64,
    pub trade_limit: usize,
    pub status_poll_interval: Duration,
    pub trade_poll_interval: Duration,
    pub marked_for_removal_timeout: f64,
    pub wait_timeout: Duration,
}

impl<'a> MakerLoop<'a> {
    /// One reconciliation cycle: fetch books, detect maker candidates
    /// across every match, and hand them to the provider.
    fn run_cycle(&self) {
        let now = unix_now();
        let resolved = fetch_match_books(
            self.venue_a,
            self.venue_b,
            self.rate_gate,
            self.matches,
            self.orderbook_workers,
            self.books_chunk,
            self.max_orderbook_skew,
        );

        let candidates: Vec<MakerCandidate> = resolved
            .iter()
            .flat_map(|mb| {
                detect_maker(mb.market, &mb.yes_a, &mb.yes_b, now, &self.detector_cfg)
                    .into_iter()
                    .map(|opportunity| MakerCandidate { market: mb.market.clone(), opportunity })
            })
            .collect();

        self.provider.reconcile(self.index, &candidates, self.venue_a, self.venue_b, self.stats, now);

        if let Some(metrics) = self.metrics {
            metrics.trading().active_maker_orders.set(self.index.lock().key_count() as f64);
        }
    }

    /// One status-poll pass, forwarding every new fill delta to the
    /// hedger.
    fn poll_statuses_and_hedge(&self) {
        let now = unix_now();
        for delta in self.tracker.poll_statuses(self.index, self.venue_a, now) {
            self.stats.record_fill(delta.delta);
            if let Some(metrics) = self.metrics {
                metrics.trading().maker_fills_total.inc();
            }
            self.dispatch_hedge(&delta.order_id, delta.delta);
        }
    }

    /// One trade-tape-poll pass, forwarding every new fill delta to the
    /// hedger.
    fn poll_trades_and_hedge(&self) {
        for delta in self.tracker.poll_trades(self.index, self.venue_a, self.trade_limit, self.stats) {
            self.stats.record_fill(delta.delta);
            if let Some(metrics) = self.metrics {
                metrics.trading().maker_fills_total.inc();
            }
            self.dispatch_hedge(&delta.order_id, delta.delta);
        }
    }

    fn dispatch_hedge(&self, order_id: &str, delta: rust_decimal::Decimal) {
        let outcome = hedge_fill(self.index, order_id, delta, self.venue_b, self.stats);
        let label = match &outcome {
            HedgeOutcome::Completed { .. } => "filled",
            HedgeOutcome::Partial { .. } => "partial",
            HedgeOutcome::Disabled => "skipped_disabled",
            HedgeOutcome::UnknownOrder => "unknown_order",
        };
        if let Some(metrics) = self.metrics {
            metrics.trading().hedge_attempts_total.with_label_values(&[label]).inc();
        }
        match outcome {
            HedgeOutcome::Partial { hedged, reason } => {
                warn!(order_id, %hedged, %delta, reason, "hedger: fill only partially hedged");
            }
            HedgeOutcome::Disabled => {
                warn!(order_id, %delta, "hedger: venue B trading disabled, fill left unhedged");
            }
            HedgeOutcome::UnknownOrder => {
                warn!(order_id, "hedger: fill delta referenced an order no longer tracked");
            }
            HedgeOutcome::Completed { .. } => {}
        }
    }

    /// The background worker: polls status/trade streams on their own
    /// cadence and sweeps marked-for-removal entries, until `stop` has
    /// been requested and either every tracked order has drained or
    /// `wait_timeout` has elapsed since the stop request.
    fn run_background_worker(&self, stop: &StopSignal) {
        let mut last_status_poll = Instant::now() - self.status_poll_interval;
        let mut last_trade_poll = Instant::now() - self.trade_poll_interval;
        let mut stopped_at: Option<Instant> = None;

        loop {
            if stop.is_stopped() {
                let stopped_at = *stopped_at.get_or_insert_with(Instant::now);
                let drained = self.index.lock().id_count() == 0;
                let timed_out = stopped_at.elapsed() >= self.wait_timeout;
                if drained {
                    info!("maker loop worker: all tracked orders drained, stopping");
                    break;
                }
                if timed_out {
                    warn!(
                        remaining = self.index.lock().id_count(),
                        "maker loop worker: wait_timeout elapsed with tracked orders still open"
                    );
                    break;
                }
            }

            let now_instant = Instant::now();
            if now_instant.duration_since(last_status_poll) >= self.status_poll_interval {
                self.poll_statuses_and_hedge();
                last_status_poll = now_instant;
            }
            if now_instant.duration_since(last_trade_poll) >= self.trade_poll_interval {
                self.poll_trades_and_hedge();
                last_trade_poll = now_instant;
            }
            self.tracker.sweep_marked_for_removal(self.index, unix_now(), self.marked_for_removal_timeout);

            std::thread::sleep(Duration::from_millis(250).min(self.status_poll_interval));
        }
    }

    /// Run exactly one reconciliation cycle, then — if it rested any
    /// orders — drain them by running the background status/trade
    /// worker until they fill or `wait_timeout` elapses. Used by the
    /// single-cycle CLI variant in place of the continuous `run` loop.
    pub fn run_once(&self, stop: &StopSignal) {
        self.run_cycle();
        if self.index.lock().id_count() > 0 {
            stop.stop();
            self.run_background_worker(stop);
        }
    }

    /// Run the maker loop until `stop` is requested: tick reconciliation
    /// every `loop_interval`, lazily spawning the background
    /// status/trade worker the first time an order is resting.
    pub fn run(&self, stop: &StopSignal, loop_interval: Duration) {
        std::thread::scope(|scope| {
            let mut worker_handle = None;

            while !stop.is_stopped() {
                self.run_cycle();

                if worker_handle.is_none() && self.index.lock().id_count() > 0 {
                    info!("maker loop: spawning background status/trade poll worker");
                    worker_handle = Some(scope.spawn(|| self.run_background_worker(stop)));
                }

                stop.sleep_or_stop(loop_interval);
            }

            match worker_handle {
                Some(handle) => {
                    handle.join().ok();
                }
                None => {
                    if self.index.lock().id_count() > 0 {
                        // Orders were placed in the final cycle before shutdown
                        // but the worker was never started; run it once now so
                        // they still get a chance to drain within wait_timeout.
                        self.run_background_worker(stop);
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::DetectorConfig;
    use crate::maker::MakerConfig;
    use crate::taker::TakerConfig;
    use crate::test_helpers::MockVenues;
    use arb_core::Venue;
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
            cutoff_at: Some(1_000_000),
            fee_rate_bps_b: 0,
            neg_risk_b: false,
        }
    }

    #[test]
    fn taker_loop_fires_once_per_tick() {
        let mocks = MockVenues::new();
        mocks.set_book_a("ya", Venue::A, &[], &[(dec!(0.450), dec!(400))]);
        mocks.set_book_b("yb", Venue::B, &[(dec!(0.500), dec!(400))], &[]);
        let matches = vec![sample_match()];

        let executor = TakerExecutor::new(TakerConfig {
            immediate_min_percent: 0.0,
            immediate_max_percent: 1_000_000.0,
            immediate_order_size: dec!(200),
            execution_cooldown: Duration::from_secs(5),
            order_max_retries: 1,
            order_retry_delay: Duration::from_millis(0),
            opinion_min_fee: dec!(0.5),
        });
        let rate_gate = RateGate::new(0.0);

        let taker_loop = TakerLoop {
            matches: &matches,
            venue_a: &mocks.venue_a,
            venue_b: &mocks.venue_b,
            rate_gate: &rate_gate,
            detector_cfg: DetectorConfig::default(),
            executor: &executor,
            metrics: None,
            orderbook_workers: 2,
            books_chunk: 25,
            max_orderbook_skew: 3.0,
            immediate_exec_enabled: true,
        };

        taker_loop.run_once();
        assert_eq!(mocks.venue_a.placed_orders().len(), 1);
        assert_eq!(mocks.venue_b.placed_orders().len(), 1);
    }

    #[test]
    fn disabled_taker_loop_does_not_run() {
        let mocks = MockVenues::new();
        let matches = vec![sample_match()];
        let executor = TakerExecutor::new(TakerConfig {
            immediate_min_percent: 0.0,
            immediate_max_percent: 100.0,
            immediate_order_size: dec!(200),
            execution_cooldown: Duration::from_secs(5),
            order_max_retries: 1,
            order_retry_delay: Duration::from_millis(0),
            opinion_min_fee: dec!(0.5),
        });
        let rate_gate = RateGate::new(0.0);
        let taker_loop = TakerLoop {
            matches: &matches,
            venue_a: &mocks.venue_a,
            venue_b: &mocks.venue_b,
            rate_gate: &rate_gate,
            detector_cfg: DetectorConfig::default(),
            executor: &executor,
            metrics: None,
            orderbook_workers: 2,
            books_chunk: 25,
            max_orderbook_skew: 3.0,
            immediate_exec_enabled: false,
        };
        let stop = StopSignal::new();
        taker_loop.run(&stop, Duration::from_secs(60));
        assert!(mocks.venue_a.placed_orders().is_empty());
    }

    #[test]
    fn maker_loop_one_cycle_places_resting_order() {
        let mocks = MockVenues::new();
        mocks.set_book_a("ya", Venue::A, &[(dec!(0.430), dec!(300))], &[]);
        mocks.set_book_b("yb", Venue::B, &[], &[(dec!(0.500), dec!(300))]);
        let matches = vec![sample_match()];

        let provider = MakerProvider::new(MakerConfig {
            max_liquidity_orders: 5,
            liquidity_price_tolerance: dec!(0.003),
            liquidity_requote_increment: dec!(0.0),
            liquidity_target_size: dec!(250),
            opinion_min_fee: dec!(0.5),
            cancel_dwell: Duration::from_millis(0),
        });
        let tracker = OrderTracker::new(500);
        let stats = Stats::new();
        let index = Mutex::new(LiquidityOrderIndex::new());
        let rate_gate = RateGate::new(0.0);

        let maker_loop = MakerLoop {
            matches: &matches,
            venue_a: &mocks.venue_a,
            venue_b: &mocks.venue_b,
            rate_gate: &rate_gate,
            detector_cfg: DetectorConfig::default(),
            provider: &provider,
            tracker: &tracker,
            stats: &stats,
            index: &index,
            metrics: None,
            orderbook_workers: 2,
            books_chunk: 25,
            max_orderbook_skew: 3.0,
            trade_limit: 40,
            status_poll_interval: Duration::from_millis(10),
            trade_poll_interval: Duration::from_millis(10),
            marked_for_removal_timeout: 300.0,
            wait_timeout: Duration::from_millis(0),
        };

        maker_loop.run_cycle();
        assert_eq!(index.lock().key_count(), 1);
        assert_eq!(mocks.venue_a.placed_orders().len(), 1);
    }
}
