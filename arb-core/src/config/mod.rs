//! Configuration
//!
//! Nothing in this engine sits on a sub-millisecond hot path: every
//! tunable here is plain runtime configuration, loaded from a TOML file
//! with every field defaulted, each overridable by an environment
//! variable of the same name. Defaults mirror
//! `arbitrage_core/config.py`'s `ArbitrageConfig` field for field.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

fn env_override<T: std::str::FromStr>(key: &str, current: T) -> T {
    match env::var(key) {
        Ok(v) => v.parse().unwrap_or(current),
        Err(_) => current,
    }
}

fn env_bool(key: &str, current: bool) -> bool {
    match env::var(key) {
        Ok(v) => !matches!(v.as_str(), "0" | "false" | "False"),
        Err(_) => current,
    }
}

/// Full runtime configuration for the arbitrage engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbitrageConfig {
    // order book acquisition
    pub orderbook_batch_size: usize,
    pub polymarket_books_chunk: usize,
    pub opinion_orderbook_workers: usize,
    pub opinion_max_rps: f64,
    pub max_orderbook_skew: f64,
    pub opinion_orderbook_timeout: Option<f64>,
    pub polymarket_orderbook_timeout: Option<f64>,

    // order placement
    pub order_max_retries: u32,
    pub order_retry_delay: f64,

    // price / fee
    pub price_decimals: u32,
    pub opinion_min_fee: f64,

    // profitability
    pub roi_reference_size: f64,
    pub seconds_per_year: f64,
    pub min_annualized_percent: f64,

    // immediate (taker) execution
    pub immediate_exec_enabled: bool,
    pub immediate_min_percent: f64,
    pub immediate_max_percent: f64,
    pub immediate_order_size: f64,

    // liquidity (maker) provision
    pub liquidity_min_annualized: f64,
    pub liquidity_min_size: f64,
    pub liquidity_target_size: f64,
    pub max_liquidity_orders: usize,
    pub liquidity_price_tolerance: f64,
    pub liquidity_status_poll_interval: f64,
    pub liquidity_loop_interval: f64,
    pub liquidity_requote_increment: f64,
    pub liquidity_wait_timeout: f64,
    pub liquidity_trade_poll_interval: f64,
    pub liquidity_trade_limit: usize,
    pub liquidity_debug: bool,
    pub marked_for_removal_timeout: f64,

    // taker execution dedup
    pub execution_cooldown: f64,

    // monitoring
    pub account_monitor_interval: f64,
    pub order_status_fallback_after: Option<f64>,

    // loop cadence
    pub pro_loop_interval: f64,
    pub pending_exec_timeout: f64,
    pub pending_poll_interval: f64,

    // logging / metrics
    pub log_level: String,
    pub json_logs: bool,
    pub metrics_addr: String,
}

impl Default for ArbitrageConfig {
    fn default() -> Self {
        Self {
            orderbook_batch_size: 20,
            polymarket_books_chunk: 25,
            opinion_orderbook_workers: 5,
            opinion_max_rps: 15.0,
            max_orderbook_skew: 3.0,
            opinion_orderbook_timeout: None,
            polymarket_orderbook_timeout: None,

            order_max_retries: 3,
            order_retry_delay: 1.0,

            price_decimals: 3,
            opinion_min_fee: 0.5,

            roi_reference_size: 200.0,
            seconds_per_year: (365 * 24 * 60 * 60) as f64,
            min_annualized_percent: 18.0,

            immediate_exec_enabled: true,
            immediate_min_percent: 2.0,
            immediate_max_percent: 50.0,
            immediate_order_size: 200.0,

            liquidity_min_annualized: 20.0,
            liquidity_min_size: 100.0,
            liquidity_target_size: 250.0,
            max_liquidity_orders: 20,
            liquidity_price_tolerance: 0.003,
            liquidity_status_poll_interval: 1.5,
            liquidity_loop_interval: 12.0,
            liquidity_requote_increment: 0.0,
            liquidity_wait_timeout: 0.0,
            liquidity_trade_poll_interval: 2.0,
            liquidity_trade_limit: 40,
            liquidity_debug: true,
            marked_for_removal_timeout: 300.0,

            execution_cooldown: 5.0,

            account_monitor_interval: 3.0,
            order_status_fallback_after: None,

            pro_loop_interval: 90.0,
            pending_exec_timeout: 300.0,
            pending_poll_interval: 5.0,

            log_level: "info".to_string(),
            json_logs: false,
            metrics_addr: "127.0.0.1:9090".to_string(),
        }
    }
}

impl ArbitrageConfig {
    /// Load from a TOML file, falling back to defaults for any field the
    /// file omits, then apply environment variable overrides (matching
    /// the Python original's per-field `os.getenv` defaults).
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut cfg: Self = if path.exists() {
            let text = std::fs::read_to_string(path)?;
            toml::from_str(&text)?
        } else {
            Self::default()
        };
        cfg.apply_env_overrides();
        cfg.post_init();
        Ok(cfg)
    }

    /// Build purely from defaults plus environment, without a config file.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        cfg.post_init();
        cfg
    }

    fn apply_env_overrides(&mut self) {
        self.orderbook_batch_size =
            env_override("ORDERBOOK_BATCH_SIZE", self.orderbook_batch_size).max(1);
        self.polymarket_books_chunk =
            env_override("POLYMARKET_BOOKS_BATCH", self.polymarket_books_chunk).max(1);
        self.opinion_orderbook_workers =
            env_override("OPINION_ORDERBOOK_WORKERS", self.opinion_orderbook_workers).max(1);
        self.opinion_max_rps = env_override("OPINION_MAX_RPS", self.opinion_max_rps);
        self.max_orderbook_skew =
            env_override("MAX_ORDERBOOK_SKEW", self.max_orderbook_skew).max(0.0);

        self.order_max_retries = env_override("ORDER_MAX_RETRIES", self.order_max_retries).max(1);
        self.order_retry_delay =
            env_override("ORDER_RETRY_DELAY", self.order_retry_delay).max(0.0);

        self.opinion_min_fee = env_override("OPINION_MIN_FEE", self.opinion_min_fee).max(0.0);

        self.roi_reference_size = env_override("ROI_BASE_SIZE", self.roi_reference_size).max(1.0);
        self.seconds_per_year = env_override("SECONDS_PER_YEAR", self.seconds_per_year);
        self.min_annualized_percent =
            env_override("MIN_ANNUALIZED_PERCENT", self.min_annualized_percent);

        self.immediate_exec_enabled =
            env_bool("IMMEDIATE_EXEC_ENABLED", self.immediate_exec_enabled);
        self.immediate_min_percent =
            env_override("IMMEDIATE_MIN_PERCENT", self.immediate_min_percent);
        self.immediate_max_percent =
            env_override("IMMEDIATE_MAX_PERCENT", self.immediate_max_percent);
        self.immediate_order_size =
            env_override("IMMEDIATE_ORDER_SIZE", self.immediate_order_size);

        self.liquidity_min_annualized = env_override(
            "LIQUIDITY_MIN_ANNUALIZED_PERCENT",
            self.liquidity_min_annualized,
        );
        self.liquidity_min_size =
            env_override("LIQUIDITY_MIN_SIZE", self.liquidity_min_size).max(1.0);
        self.liquidity_target_size =
            env_override("LIQUIDITY_TARGET_SIZE", self.liquidity_target_size).max(100.0);
        self.max_liquidity_orders =
            env_override("LIQUIDITY_MAX_ACTIVE", self.max_liquidity_orders).max(1);
        self.liquidity_price_tolerance =
            env_override("LIQUIDITY_PRICE_TOLERANCE", self.liquidity_price_tolerance).max(0.0);
        self.liquidity_status_poll_interval = env_override(
            "LIQUIDITY_STATUS_POLL_INTERVAL",
            self.liquidity_status_poll_interval,
        )
        .max(0.5);
        self.liquidity_loop_interval =
            env_override("LIQUIDITY_LOOP_INTERVAL", self.liquidity_loop_interval).max(5.0);
        self.liquidity_requote_increment = env_override(
            "LIQUIDITY_REQUOTE_INCREMENT",
            self.liquidity_requote_increment,
        )
        .max(0.0);
        self.liquidity_wait_timeout =
            env_override("LIQUIDITY_WAIT_TIMEOUT", self.liquidity_wait_timeout).max(0.0);
        self.liquidity_trade_poll_interval = env_override(
            "LIQUIDITY_TRADE_POLL_INTERVAL",
            self.liquidity_trade_poll_interval,
        )
        .max(0.5);
        self.liquidity_trade_limit =
            env_override("LIQUIDITY_TRADE_LIMIT", self.liquidity_trade_limit).max(10);
        self.liquidity_debug = env_bool("LIQUIDITY_DEBUG", self.liquidity_debug);

        self.account_monitor_interval =
            env_override("ACCOUNT_MONITOR_INTERVAL", self.account_monitor_interval);

        self.pro_loop_interval =
            env_override("PRO_LOOP_INTERVAL", self.pro_loop_interval).max(0.0);
        self.pending_exec_timeout =
            env_override("PENDING_EXEC_TIMEOUT", self.pending_exec_timeout);
        self.pending_poll_interval =
            env_override("PENDING_POLL_INTERVAL", self.pending_poll_interval);

        if let Ok(v) = env::var("ORDER_STATUS_FALLBACK_AFTER") {
            if let Ok(v) = v.parse() {
                self.order_status_fallback_after = Some(v);
            }
        }
        if let Ok(v) = env::var("OPINION_ORDERBOOK_TIMEOUT") {
            if let Ok(v) = v.parse() {
                self.opinion_orderbook_timeout = Some(v);
            }
        }
        if let Ok(v) = env::var("POLYMARKET_ORDERBOOK_TIMEOUT") {
            if let Ok(v) = v.parse() {
                self.polymarket_orderbook_timeout = Some(v);
            }
        }

        self.log_level = env::var("LOG_LEVEL").unwrap_or(self.log_level.clone());
        self.json_logs = env_bool("JSON_LOGS", self.json_logs);
        self.metrics_addr = env::var("METRICS_ADDR").unwrap_or(self.metrics_addr.clone());
    }

    /// Mirrors `config.py::__post_init__`: the target liquidity order
    /// size can never sit below the minimum acceptable size.
    fn post_init(&mut self) {
        if self.liquidity_target_size < self.liquidity_min_size {
            self.liquidity_target_size = self.liquidity_min_size;
        }
    }

    pub fn order_retry_delay_duration(&self) -> Duration {
        Duration::from_secs_f64(self.order_retry_delay.max(0.0))
    }

    pub fn liquidity_loop_interval_duration(&self) -> Duration {
        Duration::from_secs_f64(self.liquidity_loop_interval.max(5.0))
    }

    pub fn pro_loop_interval_duration(&self) -> Duration {
        Duration::from_secs_f64(self.pro_loop_interval.max(0.0))
    }

    /// One-time startup summary, mirrors `config.py::display_summary`.
    pub fn log_summary(&self) {
        tracing::info!("configuration summary:");
        tracing::info!("  orderbook batch size = {}", self.orderbook_batch_size);
        tracing::info!("  opinion max rps = {}", self.opinion_max_rps);
        tracing::info!(
            "  min annualized percent = {}%",
            self.min_annualized_percent
        );
        if self.immediate_exec_enabled {
            tracing::info!(
                "  immediate execution enabled (profit window [{}%, {}%])",
                self.immediate_min_percent,
                self.immediate_max_percent
            );
        } else {
            tracing::info!("  immediate execution disabled");
        }
        tracing::info!(
            "  liquidity provision: min_annualized={}% target_size={} max_orders={}",
            self.liquidity_min_annualized,
            self.liquidity_target_size,
            self.max_liquidity_orders
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_python_original() {
        let cfg = ArbitrageConfig::default();
        assert_eq!(cfg.orderbook_batch_size, 20);
        assert_eq!(cfg.polymarket_books_chunk, 25);
        assert_eq!(cfg.opinion_orderbook_workers, 5);
        assert_eq!(cfg.order_max_retries, 3);
        assert_eq!(cfg.price_decimals, 3);
        assert_eq!(cfg.min_annualized_percent, 18.0);
        assert_eq!(cfg.immediate_min_percent, 2.0);
        assert_eq!(cfg.immediate_max_percent, 50.0);
        assert_eq!(cfg.liquidity_min_annualized, 20.0);
        assert_eq!(cfg.max_liquidity_orders, 20);
        assert_eq!(cfg.pro_loop_interval, 90.0);
    }

    #[test]
    fn liquidity_target_never_below_min() {
        let mut cfg = ArbitrageConfig {
            liquidity_min_size: 500.0,
            liquidity_target_size: 100.0,
            ..ArbitrageConfig::default()
        };
        cfg.post_init();
        assert_eq!(cfg.liquidity_target_size, 500.0);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = ArbitrageConfig::load("/nonexistent/path/arb.toml").unwrap();
        assert_eq!(cfg.orderbook_batch_size, 20);
    }
}
