//! Domain-specific error types
//!
//! Manual `Display` + `std::error::Error` implementations, matching the
//! style of the rest of this codebase's error types rather than a
//! derive macro.

use std::fmt;

/// The closed error taxonomy every venue adapter call and strategy
/// operation is expected to normalize into.
#[derive(Debug, Clone)]
pub enum ArbError {
    /// A network call failed for a reason that is expected to clear on
    /// its own (timeout, connection reset, 5xx). Safe to retry.
    TransientNetwork { venue: &'static str, detail: String },

    /// A fetched order book failed the crossed-book sanity check
    /// (best bid >= best ask on the same side after normalization).
    BookCrossed { token_id: String, detail: String },

    /// An order placement was rejected by the venue.
    OrderRejected { venue: &'static str, retryable: bool, detail: String },

    /// A cancel request was rejected by the venue.
    CancelRejected { venue: &'static str, detail: String },

    /// A cancel raced a fill: the venue reports the order both
    /// cancelled and (partially) filled. Handled via the no-orphan-fill
    /// invariant rather than surfaced as a hard failure, but recorded.
    CancelRacedFill { order_id: String, filled_size: f64 },

    /// A venue call failed because of insufficient balance/allowance.
    /// Fatal: triggers the C12 fail-stop.
    BalanceExhausted { venue: &'static str, detail: String },

    /// Locally tracked order state has drifted from venue-reported
    /// state beyond what reconciliation can repair automatically.
    TrackingDrift { order_id: String, detail: String },
}

impl fmt::Display for ArbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArbError::TransientNetwork { venue, detail } => {
                write!(f, "transient network error on {venue}: {detail}")
            }
            ArbError::BookCrossed { token_id, detail } => {
                write!(f, "crossed book for token {token_id}: {detail}")
            }
            ArbError::OrderRejected {
                venue,
                retryable,
                detail,
            } => write!(
                f,
                "order rejected on {venue} (retryable={retryable}): {detail}"
            ),
            ArbError::CancelRejected { venue, detail } => {
                write!(f, "cancel rejected on {venue}: {detail}")
            }
            ArbError::CancelRacedFill {
                order_id,
                filled_size,
            } => write!(
                f,
                "cancel raced a fill for order {order_id}: {filled_size} already filled"
            ),
            ArbError::BalanceExhausted { venue, detail } => {
                write!(f, "balance exhausted on {venue}: {detail}")
            }
            ArbError::TrackingDrift { order_id, detail } => {
                write!(f, "order tracking drift for {order_id}: {detail}")
            }
        }
    }
}

impl std::error::Error for ArbError {}

impl ArbError {
    /// Whether the operation that produced this error should be retried
    /// by the caller without operator intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ArbError::TransientNetwork { .. } | ArbError::OrderRejected { retryable: true, .. }
        )
    }

    /// Whether this error should trigger the global fail-stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ArbError::BalanceExhausted { .. })
    }
}

/// Case-insensitive substring match against the balance-exhaustion
/// vocabulary the venues use in error messages, grounded in
/// `arbitrage_websocket_realtime.py`'s `_is_balance_error` checks.
pub fn is_balance_exhaustion_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    const NEEDLES: &[&str] = &[
        "insufficient balance",
        "not enough balance",
        "balance / allowance",
        "balance/allowance",
        "insufficient funds",
    ];
    NEEDLES.iter().any(|needle| lower.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_known_balance_phrases_case_insensitively() {
        assert!(is_balance_exhaustion_message("Insufficient Balance for order"));
        assert!(is_balance_exhaustion_message("ERROR: not enough balance"));
        assert!(is_balance_exhaustion_message("check balance / allowance"));
        assert!(!is_balance_exhaustion_message("order book crossed"));
    }

    #[test]
    fn transient_and_retryable_rejected_are_retryable() {
        let transient = ArbError::TransientNetwork {
            venue: "opinion",
            detail: "timeout".into(),
        };
        assert!(transient.is_retryable());

        let rejected = ArbError::OrderRejected {
            venue: "polymarket",
            retryable: false,
            detail: "bad price".into(),
        };
        assert!(!rejected.is_retryable());
    }

    #[test]
    fn balance_exhausted_is_fatal() {
        let err = ArbError::BalanceExhausted {
            venue: "opinion",
            detail: "insufficient balance".into(),
        };
        assert!(err.is_fatal());
    }
}
