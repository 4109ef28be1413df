//! Prometheus metrics for the arbitrage engine
//!
//! Exposes the stats C12 is responsible for tracking: immediate (taker)
//! fills, maker fills, hedge attempts/failures, deduplicated
//! opportunities, balance-exhaustion fail-stops, and process uptime.

use prometheus::{Counter, Gauge, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;
use tracing::info;

/// Central registry for all Prometheus metrics.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Arc<Registry>,
    trading: Arc<TradingMetrics>,
    system: Arc<SystemMetrics>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Arc::new(Registry::new());

        let trading = Arc::new(TradingMetrics::new(&registry)?);
        let system = Arc::new(SystemMetrics::new(&registry)?);

        info!("prometheus metrics registry initialized");

        Ok(Self {
            registry,
            trading,
            system,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn trading(&self) -> &TradingMetrics {
        &self.trading
    }

    pub fn system(&self) -> &SystemMetrics {
        &self.system
    }
}

impl Default for MetricsRegistry {
    #[allow(clippy::panic)]
    fn default() -> Self {
        Self::new().unwrap_or_else(|e| {
            tracing::error!("failed to create metrics registry: {}", e);
            panic!("cannot create metrics registry")
        })
    }
}

/// Taker/maker trading activity metrics.
pub struct TradingMetrics {
    /// Immediate (taker) executions attempted, by outcome.
    pub taker_executions_total: IntCounterVec,
    /// Maker orders placed.
    pub maker_orders_placed_total: IntCounter,
    /// Maker orders cancelled.
    pub maker_orders_cancelled_total: IntCounter,
    /// Maker fills observed (partial or full).
    pub maker_fills_total: IntCounter,
    /// Hedge attempts, by outcome (filled / failed / skipped_disabled).
    pub hedge_attempts_total: IntCounterVec,
    /// Opportunities discarded as duplicates of an in-flight execution.
    pub duplicate_opportunities_total: IntCounter,
    /// Realized cumulative edge in USD notional, cost-adjusted.
    pub realized_edge_usd: Counter,
    /// Currently active maker order count.
    pub active_maker_orders: Gauge,
}

impl TradingMetrics {
    fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let taker_executions_total = IntCounterVec::new(
            Opts::new(
                "taker_executions_total",
                "Immediate execution attempts by outcome",
            )
            .namespace("arb"),
            &["outcome"],
        )?;
        registry.register(Box::new(taker_executions_total.clone()))?;

        let maker_orders_placed_total = IntCounter::new(
            "arb_maker_orders_placed_total",
            "Total maker orders placed",
        )?;
        registry.register(Box::new(maker_orders_placed_total.clone()))?;

        let maker_orders_cancelled_total = IntCounter::new(
            "arb_maker_orders_cancelled_total",
            "Total maker orders cancelled",
        )?;
        registry.register(Box::new(maker_orders_cancelled_total.clone()))?;

        let maker_fills_total =
            IntCounter::new("arb_maker_fills_total", "Total maker fills observed")?;
        registry.register(Box::new(maker_fills_total.clone()))?;

        let hedge_attempts_total = IntCounterVec::new(
            Opts::new("hedge_attempts_total", "Hedge attempts by outcome").namespace("arb"),
            &["outcome"],
        )?;
        registry.register(Box::new(hedge_attempts_total.clone()))?;

        let duplicate_opportunities_total = IntCounter::new(
            "arb_duplicate_opportunities_total",
            "Opportunities discarded as duplicates of an in-flight execution",
        )?;
        registry.register(Box::new(duplicate_opportunities_total.clone()))?;

        let realized_edge_usd = Counter::new(
            "arb_realized_edge_usd_total",
            "Cumulative realized edge in USD, cost-adjusted",
        )?;
        registry.register(Box::new(realized_edge_usd.clone()))?;

        let active_maker_orders =
            Gauge::new("arb_active_maker_orders", "Currently active maker orders")?;
        registry.register(Box::new(active_maker_orders.clone()))?;

        Ok(Self {
            taker_executions_total,
            maker_orders_placed_total,
            maker_orders_cancelled_total,
            maker_fills_total,
            hedge_attempts_total,
            duplicate_opportunities_total,
            realized_edge_usd,
            active_maker_orders,
        })
    }
}

/// System / fail-stop health metrics.
pub struct SystemMetrics {
    /// 1 once a balance-exhaustion fail-stop has tripped, else 0.
    pub balance_exhausted: IntGauge,
    /// Total errors observed, by component and severity.
    pub errors_total: IntCounterVec,
    /// Total venue-adapter calls that hit a transient-network error.
    pub transient_errors_total: IntCounterVec,
    /// Process uptime in seconds, updated on each loop tick.
    pub uptime_seconds: IntGauge,
}

impl SystemMetrics {
    fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let balance_exhausted = IntGauge::new(
            "arb_balance_exhausted",
            "1 once balance-exhaustion fail-stop has tripped",
        )?;
        registry.register(Box::new(balance_exhausted.clone()))?;

        let errors_total = IntCounterVec::new(
            Opts::new("errors_total", "Total errors by component and severity").namespace("arb"),
            &["component", "severity"],
        )?;
        registry.register(Box::new(errors_total.clone()))?;

        let transient_errors_total = IntCounterVec::new(
            Opts::new("transient_errors_total", "Transient network errors by venue")
                .namespace("arb"),
            &["venue"],
        )?;
        registry.register(Box::new(transient_errors_total.clone()))?;

        let uptime_seconds = IntGauge::new("arb_uptime_seconds", "Process uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        Ok(Self {
            balance_exhausted,
            errors_total,
            transient_errors_total,
            uptime_seconds,
        })
    }
}
