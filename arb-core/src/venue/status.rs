//! Order status normalization
//!
//! Venue A reports status through two parallel vocabularies: a small
//! integer code and a string enum. Both collapse into
//! [`crate::model::OrderStatus`] at the adapter boundary so the rest of
//! the core only ever handles the closed set. Grounded in
//! `arbitrage_market_maker.py`'s `_parse_opinion_status`.

use crate::model::OrderStatus;

/// Normalize a numeric status code (1=pending, 2=filled, 3=cancelled-ish).
pub fn from_numeric(code: i64) -> OrderStatus {
    match code {
        1 => OrderStatus::Pending,
        2 => OrderStatus::Filled,
        3 => OrderStatus::Cancelled,
        _ => OrderStatus::Unknown,
    }
}

/// Normalize a string status enum as returned by the venue.
pub fn from_string(raw: &str) -> OrderStatus {
    match raw.to_ascii_lowercase().as_str() {
        "pending" | "open" | "live" | "new" => OrderStatus::Pending,
        "partial" | "partially_filled" | "partial_fill" => OrderStatus::Partial,
        "filled" | "matched" | "complete" | "completed" => OrderStatus::Filled,
        "cancelled" | "canceled" | "cancel" => OrderStatus::Cancelled,
        "cancel_in_progress" | "cancelling" | "canceling" => OrderStatus::CancelInProgress,
        _ => OrderStatus::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_vocabulary() {
        assert_eq!(from_numeric(1), OrderStatus::Pending);
        assert_eq!(from_numeric(2), OrderStatus::Filled);
        assert_eq!(from_numeric(3), OrderStatus::Cancelled);
        assert_eq!(from_numeric(99), OrderStatus::Unknown);
    }

    #[test]
    fn string_vocabulary_is_case_insensitive() {
        assert_eq!(from_string("FILLED"), OrderStatus::Filled);
        assert_eq!(from_string("Cancel_In_Progress"), OrderStatus::CancelInProgress);
        assert_eq!(from_string("partially_filled"), OrderStatus::Partial);
        assert_eq!(from_string("weird"), OrderStatus::Unknown);
    }
}
