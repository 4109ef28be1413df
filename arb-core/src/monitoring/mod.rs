//! Monitoring and observability
//!
//! Prometheus metrics export plus a minimal HTTP server for scraping.
//! A graded alerting engine (`alert_rules`, `alerts`) has no counterpart
//! here: C12's fail-stop is a terminal process exit, not a graded alert
//! severity ladder, so only `metrics` and `server` are carried.

pub mod metrics;
pub mod server;

pub use metrics::{MetricsRegistry, SystemMetrics, TradingMetrics};
pub use server::{MetricsServer, MetricsServerConfig};
