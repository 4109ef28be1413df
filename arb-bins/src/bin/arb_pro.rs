//! `arb-pro`: continuous taker-loop binary.
//!
//! Scans every configured match on a fixed cadence (`--interval`,
//! defaulting to `pro_loop_interval`) and fires the single best
//! in-window taker opportunity per match, until interrupted. Mirrors
//! `modular_arbitrage_mm_clean.py::main`'s default (`pro`) run mode.

use anyhow::Result;
use arb_bins::common::{install_interrupt_handler, load_config, init_logging, spawn_metrics_server, CommonArgs};
use arb_bins::matches::load_market_matches;
use arb_bins::simulated_venue::SimulatedVenue;
use arb_core::model::Venue;
use arb_core::monitoring::MetricsRegistry;
use arb_core::resilience::RateGate;
use arb_strategies::detector::DetectorConfig;
use arb_strategies::loop_driver::TakerLoop;
use arb_strategies::taker::{TakerConfig, TakerExecutor};
use clap::Parser;
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

    let executor = TakerExecutor::new(TakerConfig {
        immediate_min_percent: cfg.immediate_min_percent,
        immediate_max_percent: cfg.immediate_max_percent,
        immediate_order_size: Decimal::from_f64(cfg.immediate_order_size).unwrap_or_default(),
        execution_cooldown: Duration::from_secs_f64(cfg.execution_cooldown.max(0.0)),
        order_max_retries: cfg.order_max_retries,
        order_retry_delay: cfg.order_retry_delay_duration(),
        opinion_min_fee: Decimal::from_f64(cfg.opinion_min_fee).unwrap_or_default(),
    });

    let registry = Arc::new(MetricsRegistry::new()?);
    spawn_metrics_server(&cfg, registry.clone());

    let stop = install_interrupt_handler()?;
    let interval = Duration::from_secs_f64(args.interval.unwrap_or(cfg.pro_loop_interval).max(0.0));

    let taker_loop = TakerLoop {
        matches: &matches,
        venue_a: &venue_a,
        venue_b: &venue_b,
        rate_gate: &rate_gate,
        detector_cfg,
        executor: &executor,
        metrics: Some(registry.as_ref()),
        orderbook_workers: cfg.opinion_orderbook_workers,
        books_chunk: cfg.polymarket_books_chunk,
        max_orderbook_skew: cfg.max_orderbook_skew,
        immediate_exec_enabled: cfg.immediate_exec_enabled,
    };

    tracing::info!(interval_secs = interval.as_secs_f64(), "arb-pro: starting taker loop");
    taker_loop.run(&stop, interval);

    let taker_stats = executor.stats();
    tracing::info!("=== Final Statistics ===");
    tracing::info!(
        fired = taker_stats.fired,
        deduplicated = taker_stats.deduplicated,
        leg_failures = taker_stats.leg_failures,
        "arb-pro: taker executor totals"
    );

    Ok(())
}
