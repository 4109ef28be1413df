//! Monotonic-clock rate gate
//!
//! Venue A's REST API is rate-limited per wall-clock second, not by
//! burst capacity, so a token-bucket limiter would either under- or
//! over-shoot depending on burst timing. Instead this gate divides time
//! into fixed-width slots (`1 / max_rps` wide) and blocks a caller until
//! the next slot boundary, admitting at most one caller per slot. This
//! matches the original bot's `time.sleep`-based pacing in
//! `arbitrage_core/clients.py` rather than a burst-capacity token
//! bucket.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Gates calls to at most one per `1 / max_rps` seconds.
pub struct RateGate {
    slot_width: Duration,
    next_slot: Mutex<Instant>,
}

impl RateGate {
    pub fn new(max_rps: f64) -> Self {
        let slot_width = if max_rps > 0.0 {
            Duration::from_secs_f64(1.0 / max_rps)
        } else {
            Duration::ZERO
        };
        Self {
            slot_width,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// Block the calling thread until this call's slot arrives, then
    /// reserve the following slot for the next caller.
    pub fn acquire(&self) {
        if self.slot_width.is_zero() {
            return;
        }
        let wait = {
            let mut next = self.next_slot.lock();
            let now = Instant::now();
            let scheduled = if *next > now { *next } else { now };
            *next = scheduled + self.slot_width;
            scheduled.saturating_duration_since(now)
        };
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rps_never_blocks() {
        let gate = RateGate::new(0.0);
        let start = Instant::now();
        for _ in 0..5 {
            gate.acquire();
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn slots_are_spaced_at_least_slot_width_apart() {
        let gate = RateGate::new(50.0); // 20ms slots
        let start = Instant::now();
        for _ in 0..3 {
            gate.acquire();
        }
        // third call should not complete before ~40ms have elapsed
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
