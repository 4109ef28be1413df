//! `arb-liquidity`: continuous maker-loop binary (spec.md §6
//! `liquidity` mode).
//!
//! Reconciles resting venue-A bids against the current maker
//! candidates on a fixed cadence (`--interval`, defaulting to
//! `liquidity_loop_interval`), lazily spawning the background
//! status/trade-tape worker that feeds the hedger once an order is
//! resting. Mirrors `modular_arbitrage_mm_clean.py::main`'s
//! `--liquidity` run mode.

use anyhow::Result;
use arb_bins::common::{install_interrupt_handler, load_config, init_logging, print_stats, spawn_metrics_server, CommonArgs};
use arb_bins::matches::load_market_matches;
use arb_bins::simulated_venue::SimulatedVenue;
use arb_core::model::{LiquidityOrderIndex, Venue};
use arb_core::monitoring::MetricsRegistry;
use arb_core::resilience::RateGate;
use arb_strategies::detector::DetectorConfig;
use arb_strategies::loop_driver::MakerLoop;
use arb_strategies::maker::{MakerConfig, MakerProvider};
use arb_strategies::stats::Stats;
use arb_strategies::tracker::OrderTracker;
use clap::Parser;
use parking_lot::Mutex;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    let args = CommonArgs::parse();
    let cfg = load_config(&args)?;
    init_logging(&cfg);
    cfg.log_summary();

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

    let registry = Arc::new(MetricsRegistry::new()?);
    spawn_metrics_server(&cfg, registry.clone());

    let stop = install_interrupt_handler()?;
    let loop_interval = Duration::from_secs_f64(args.interval.unwrap_or(cfg.liquidity_loop_interval).max(5.0));
    let wait_timeout = if cfg.liquidity_wait_timeout > 0.0 {
        Duration::from_secs_f64(cfg.liquidity_wait_timeout)
    } else {
        Duration::from_secs_f64(cfg.liquidity_loop_interval.max(5.0))
    };

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
        metrics: Some(registry.as_ref()),
        orderbook_workers: cfg.opinion_orderbook_workers,
        books_chunk: cfg.polymarket_books_chunk,
        max_orderbook_skew: cfg.max_orderbook_skew,
        trade_limit: cfg.liquidity_trade_limit,
        status_poll_interval: Duration::from_secs_f64(cfg.liquidity_status_poll_interval.max(0.5)),
        trade_poll_interval: Duration::from_secs_f64(cfg.liquidity_trade_poll_interval.max(0.5)),
        marked_for_removal_timeout: cfg.marked_for_removal_timeout,
        wait_timeout,
    };

    tracing::info!(interval_secs = loop_interval.as_secs_f64(), "arb-liquidity: starting maker loop");
    maker_loop.run(&stop, loop_interval);

    let maker_stats = provider.stats();
    tracing::info!(
        placed = maker_stats.placed,
        cancelled = maker_stats.cancelled,
        repriced = maker_stats.repriced,
        skipped_notional_floor = maker_stats.skipped_notional_floor,
        "arb-liquidity: maker provider totals"
    );
    print_stats(&stats.snapshot());

    Ok(())
}
