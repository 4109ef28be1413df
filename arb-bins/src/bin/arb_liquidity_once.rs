//! `arb-liquidity-once`: single-cycle maker variant (spec.md §6
//! `liquidity-once` mode). Runs one reconciliation cycle plus a bounded
//! window of the background status/trade-poll worker so any order
//! placed that cycle gets a chance to be observed and hedged, then
//! exits. Useful for CI smoke checks and manual inspection via
//! `arb-debug`.

use anyhow::Result;
use arb_bins::common::{load_config, init_logging, print_stats, CommonArgs};
use arb_bins::matches::load_market_matches;
use arb_bins::simulated_venue::SimulatedVenue;
use arb_core::model::{LiquidityOrderIndex, Venue};
use arb_core::resilience::RateGate;
use arb_strategies::detector::DetectorConfig;
use arb_strategies::loop_driver::{MakerLoop, StopSignal};
use arb_strategies::maker::{MakerConfig, MakerProvider};
use arb_strategies::stats::Stats;
use arb_strategies::tracker::OrderTracker;
use clap::Parser;
use parking_lot::Mutex;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use std::time::Duration;

fn main() -> Result<()> {
    let args = CommonArgs::parse();
    let cfg = load_config(&args)?;
    init_logging(&cfg);

    let matches = load_market_matches(&args.matches_file)?;
    tracing::info!(count = matches.len(), "loaded market matches");

    let venue_a = SimulatedVenue::seeded(&matches, Venue::A, true);
    let venue_b = SimulatedVenue::seeded(&matches, Venue::B, true);

    let rate_gate = RateGate::new(cfg.opinion_max_rps);
    let detector_cfg = DetectorConfig {
        liquidity_min_size: Decimal::from_f64(cfg.liquidity_min_size).unwrap_or_default(),
        liquidity_min_annualized_percent: cfg.liquidity_min_annualized,
        opinion_min_fee: Decimal::from_f64(cfg.opinion_min_fee).unwrap_or_default(),
        seconds_per_year: cfg.seconds_per_year,
        ..DetectorConfig::default()
    };

    let provider = MakerProvider::new(MakerConfig {
        max_liquidity_orders: cfg.max_liquidity_orders,
        liquidity_price_tolerance: Decimal::from_f64(cfg.liquidity_price_tolerance).unwrap_or_default(),
        liquidity_requote_increment: Decimal::from_f64(cfg.liquidity_requote_increment).unwrap_or_default(),
        liquidity_target_size: Decimal::from_f64(cfg.liquidity_target_size).unwrap_or_default(),
        opinion_min_fee: Decimal::from_f64(cfg.opinion_min_fee).unwrap_or_default(),
        cancel_dwell: Duration::from_millis(500),
    });
    let tracker = OrderTracker::new(500);
    let stats = Stats::new();
    let index = Mutex::new(LiquidityOrderIndex::new());

    // A single-cycle run has no long-lived interrupt handler; the stop
    // signal here only bounds how long the post-cycle drain worker
    // waits for resting orders to fill before this process exits.
    let stop = StopSignal::new();
    let wait_timeout = Duration::from_secs_f64(if cfg.liquidity_wait_timeout > 0.0 { cfg.liquidity_wait_timeout } else { 10.0 });

    let maker_loop = MakerLoop {
        matches: &matches,
        venue_a: &venue_a,
        venue_b: &venue_b,
        rate_gate: &rate_gate,
        detector_cfg,
        provider: &provider,
        tracker: &tracker,
        stats: &stats,
        index: &index,
        metrics: None,
        orderbook_workers: cfg.opinion_orderbook_workers,
        books_chunk: cfg.polymarket_books_chunk,
        max_orderbook_skew: cfg.max_orderbook_skew,
        trade_limit: cfg.liquidity_trade_limit,
        status_poll_interval: Duration::from_millis(250),
        trade_poll_interval: Duration::from_millis(250),
        marked_for_removal_timeout: cfg.marked_for_removal_timeout,
        wait_timeout,
    };

    tracing::info!("arb-liquidity-once: running a single reconciliation cycle");
    maker_loop.run_once(&stop);

    let maker_stats = provider.stats();
    tracing::info!(
        placed = maker_stats.placed,
        cancelled = maker_stats.cancelled,
        repriced = maker_stats.repriced,
        "arb-liquidity-once: maker provider totals"
    );
    print_stats(&stats.snapshot());

    Ok(())
}
