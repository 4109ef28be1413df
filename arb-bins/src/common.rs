//! Common utilities for all binaries
//!
//! Shared CLI parsing, config loading, logging init, and stats printing
//! used by every `arb-*` binary.

use anyhow::Result;
use arb_core::config::ArbitrageConfig;
use arb_core::monitoring::{MetricsRegistry, MetricsServer, MetricsServerConfig};
use arb_strategies::loop_driver::StopSignal;
use arb_strategies::stats::StatsSnapshot;
use clap::Parser;
use std::sync::Arc;

/// Common CLI arguments shared by every binary: where to load matches
/// and config from, and the usual logging/metrics knobs.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CommonArgs {
    /// Path to a market-matches JSON file, or a comma-separated list of
    /// them (mirrors the original bot's `--matches-file`).
    #[arg(long, default_value = "market_matches.json")]
    pub matches_file: String,

    /// Path to a TOML config file; falls back to built-in defaults plus
    /// environment overrides when omitted or missing.
    #[arg(long)]
    pub config: Option<String>,

    /// Override the loop/poll interval (seconds) this binary's mode
    /// uses by default.
    #[arg(long)]
    pub interval: Option<f64>,

    /// Log level (overrides the config file's `log_level`).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Emit structured JSON logs instead of pretty-printed ones.
    #[arg(long)]
    pub json_logs: bool,
}

/// Load configuration from `--config` (or defaults+env when absent),
/// then apply the common CLI overrides on top.
pub fn load_config(args: &CommonArgs) -> Result<ArbitrageConfig> {
    let mut cfg = match &args.config {
        Some(path) => ArbitrageConfig::load(path)?,
        None => ArbitrageConfig::from_env(),
    };

    if let Some(level) = &args.log_level {
        cfg.log_level = level.clone();
    }
    if args.json_logs {
        cfg.json_logs = true;
    }

    Ok(cfg)
}

/// Initialize tracing/logging from the resolved config.
pub fn init_logging(cfg: &ArbitrageConfig) {
    arb_core::utils::logger::init_logger(&cfg.log_level, cfg.json_logs);
}

/// Installs a `ctrlc` handler that requests the returned `StopSignal` to
/// stop exactly once. Mirrors the original bot's
/// `signal.signal(SIGINT, ...)` shutdown hook.
pub fn install_interrupt_handler() -> Result<StopSignal> {
    let stop = StopSignal::new();
    let flag = stop.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("interrupt received, shutting down");
        flag.stop();
    })?;
    Ok(stop)
}

/// Spawns the Prometheus `/metrics` HTTP server on its own OS thread
/// with a dedicated single-threaded tokio runtime — the only place in
/// any binary a tokio runtime is built, matching the rest of the engine's
/// synchronous, thread-based design. Binds best-effort: a
/// bad `metrics_addr` is logged and otherwise ignored rather than
/// failing the whole binary.
pub fn spawn_metrics_server(cfg: &ArbitrageConfig, registry: Arc<MetricsRegistry>) {
    let listen_addr = match cfg.metrics_addr.parse() {
        Ok(addr) => addr,
        Err(err) => {
            tracing::warn!(addr = %cfg.metrics_addr, error = %err, "invalid metrics_addr, metrics server not started");
            return;
        }
    };
    let server_cfg = MetricsServerConfig { listen_addr, metrics_path: "/metrics".to_string() };

    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(err) => {
                tracing::error!(error = %err, "failed to build metrics server runtime");
                return;
            }
        };
        let server = MetricsServer::new(server_cfg, registry);
        if let Err(err) = runtime.block_on(server.serve()) {
            tracing::error!(error = %err, "metrics server exited with error");
        }
    });
}

/// Print final statistics, mirrors the original bot's end-of-run
/// summary print.
pub fn print_stats(stats: &StatsSnapshot) {
    tracing::info!("=== Final Statistics ===");
    tracing::info!("Fills: {} ({} shares)", stats.fills_count, stats.fills_volume);
    tracing::info!("Hedges: {} ({} shares)", stats.hedge_count, stats.hedge_volume);
    tracing::info!("Hedge failures: {}", stats.hedge_failures);
    tracing::info!("Untracked trades: {}", stats.untracked_trades);
    tracing::info!("Uptime: {:.1}s", stats.uptime_seconds);
}
