//! Resilience patterns
//!
//! - Exponential backoff for retry of transient venue errors
//! - A monotonic-clock rate limiter gating venue A REST calls

pub mod backoff;
pub mod rate_limiter;

pub use backoff::{BackoffConfig, ExponentialBackoff};
pub use rate_limiter::RateGate;
