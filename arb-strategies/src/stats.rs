//! Stats / Fail-Stop (C12)
//!
//! Tracks the counters named in spec.md §4.12 (fills, hedges, hedge
//! failures, uptime) and implements the balance-exhaustion hard-stop:
//! any [`ArbError::BalanceExhausted`] anywhere in the engine terminates
//! the process immediately with exit code 1, before any further order
//! is placed (property 9).

use arb_core::ArbError;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::time::Instant;
use tracing::error;

#[derive(Debug, Clone, Default)]
pub struct StatsSnapshot {
    pub fills_count: u64,
    pub fills_volume: Decimal,
    pub hedge_count: u64,
    pub hedge_volume: Decimal,
    pub hedge_failures: u64,
    pub untracked_trades: u64,
    pub uptime_seconds: f64,
}

#[derive(Debug)]
struct Inner {
    fills_count: u64,
    fills_volume: Decimal,
    hedge_count: u64,
    hedge_volume: Decimal,
    hedge_failures: u64,
    untracked_trades: u64,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            fills_count: 0,
            fills_volume: Decimal::ZERO,
            hedge_count: 0,
            hedge_volume: Decimal::ZERO,
            hedge_failures: 0,
            untracked_trades: 0,
        }
    }
}

/// Process-lifetime counters, guarded by a single lightweight lock
/// (§5's "Shared state" lists these alongside `recent_executions`).
pub struct Stats {
    inner: Mutex<Inner>,
    started_at: Instant,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            started_at: Instant::now(),
        }
    }

    pub fn record_fill(&self, size: Decimal) {
        let mut inner = self.inner.lock();
        inner.fills_count += 1;
        inner.fills_volume += size;
    }

    pub fn record_hedge(&self, size: Decimal) {
        let mut inner = self.inner.lock();
        inner.hedge_count += 1;
        inner.hedge_volume += size;
    }

    pub fn record_hedge_failure(&self) {
        self.inner.lock().hedge_failures += 1;
    }

    pub fn record_untracked_trade(&self) {
        self.inner.lock().untracked_trades += 1;
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.inner.lock();
        StatsSnapshot {
            fills_count: inner.fills_count,
            fills_volume: inner.fills_volume,
            hedge_count: inner.hedge_count,
            hedge_volume: inner.hedge_volume,
            hedge_failures: inner.hedge_failures,
            untracked_trades: inner.untracked_trades,
            uptime_seconds: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

/// Terminates the process with exit code 1 if `err` is fatal
/// (balance-exhaustion). Returns `false` when `err` was not fatal so
/// callers can fall through to their own (non-fatal) error handling.
///
/// This is the only place in the engine that calls `process::exit`: the
/// spec's fail-stop is deliberately a hard, unconditional stop rather
/// than a recoverable error path (§4.12, §7, property 9).
pub fn fail_stop_on_fatal(err: &ArbError) -> bool {
    if err.is_fatal() {
        error!(error = %err, "balance exhausted: fail-stop triggered, terminating process");
        std::process::exit(1);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn records_accumulate() {
        let stats = Stats::new();
        stats.record_fill(dec!(100));
        stats.record_fill(dec!(50));
        stats.record_hedge(dec!(120));
        stats.record_hedge_failure();
        stats.record_untracked_trade();

        let snap = stats.snapshot();
        assert_eq!(snap.fills_count, 2);
        assert_eq!(snap.fills_volume, dec!(150));
        assert_eq!(snap.hedge_count, 1);
        assert_eq!(snap.hedge_volume, dec!(120));
        assert_eq!(snap.hedge_failures, 1);
        assert_eq!(snap.untracked_trades, 1);
    }

    #[test]
    fn non_fatal_error_does_not_exit() {
        let err = ArbError::TransientNetwork { venue: "venue_a", detail: "timeout".into() };
        assert!(!fail_stop_on_fatal(&err));
    }
}
