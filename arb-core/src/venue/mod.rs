//! Venue adapter surface (C1)
//!
//! The core never depends on a concrete venue SDK. Everything it needs
//! from "venue A" and "venue B" is expressed as the two narrow traits
//! below; a real adapter (HTTP client, WebSocket feed, whatever the
//! venue exposes) lives outside this crate and is handed in by the
//! binary that wires the engine together.

pub mod status;

use crate::errors::ArbError;
use crate::model::{OrderBookSnapshot, OrderStatus, Side};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Time-in-force for a placed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeInForce {
    /// Good-till-cancelled: rests until filled or explicitly cancelled.
    Gtc,
    /// Fill-or-kill: fully fills immediately or is rejected.
    Fok,
}

/// Venue-B-specific placement options (§4.1, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VenueBOptions {
    pub tick_size: Decimal,
    pub neg_risk: bool,
}

/// A request to place a single-leg order, common to both venues. Venue
/// A additionally enforces a nominal-floor check (§4.5) at the adapter
/// boundary; venue B takes [`VenueBOptions`].
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub market_id: String,
    pub token: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub time_in_force: TimeInForce,
    pub venue_b_options: Option<VenueBOptions>,
}

impl OrderRequest {
    pub fn new(market_id: impl Into<String>, token: impl Into<String>, side: Side, price: Decimal, size: Decimal) -> Self {
        Self {
            market_id: market_id.into(),
            token: token.into(),
            side,
            price,
            size,
            time_in_force: TimeInForce::Gtc,
            venue_b_options: None,
        }
    }

    pub fn with_tif(mut self, tif: TimeInForce) -> Self {
        self.time_in_force = tif;
        self
    }

    pub fn with_venue_b_options(mut self, options: VenueBOptions) -> Self {
        self.venue_b_options = Some(options);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderAck {
    pub order_id: String,
}

/// Normalized order status as returned by `get_order`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderQuery {
    pub status: OrderStatus,
    pub filled: Decimal,
    pub total: Decimal,
}

/// A single trade-tape entry from venue A's recent-trades endpoint
/// (§4.1, §4.9). `shares` is the native field; when absent the size is
/// reconstructed from `usd_amount` (an 18-decimal fixed-point value)
/// divided by `price`.
#[derive(Debug, Clone)]
pub struct Trade {
    pub trade_id: String,
    pub order_id: String,
    pub price: Decimal,
    pub shares: Option<Decimal>,
    pub usd_amount_wei: Option<Decimal>,
    pub status_raw: String,
}

impl Trade {
    /// Resolve the traded share count, falling back to the 18-decimal
    /// `usd_amount` encoding when `shares` was not reported (grounded
    /// in `arbitrage_market_maker.py:2608-2614`).
    pub fn resolved_shares(&self) -> Option<Decimal> {
        if let Some(shares) = self.shares {
            return Some(shares);
        }
        let usd = self.usd_amount_wei?;
        if self.price.is_zero() {
            return None;
        }
        let usd_decimal = usd / Decimal::new(1_000_000_000_000_000_000, 0);
        Some(usd_decimal / self.price)
    }

    pub fn is_filled(&self) -> bool {
        status::from_string(&self.status_raw) == OrderStatus::Filled
    }
}

/// Venue A: no bulk book fetch, rate-limited, exposes the trade tape
/// C9 polls.
pub trait VenueAAdapter: Send + Sync {
    fn fetch_book(&self, token: &str) -> Result<OrderBookSnapshot, ArbError>;
    fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, ArbError>;
    fn cancel(&self, order_id: &str) -> Result<(), ArbError>;
    fn get_order(&self, order_id: &str) -> Result<OrderQuery, ArbError>;
    fn get_recent_trades(&self, limit: usize) -> Result<Vec<Trade>, ArbError>;
}

/// Venue B: supports bulk book fetch, no RPS gate (bulk calls are
/// chunked instead), and a read-only mode gate for when no signing key
/// is configured (§3 of SPEC_FULL, ported from `config.py`'s
/// `polymarket_trading_enabled`).
pub trait VenueBAdapter: Send + Sync {
    fn fetch_book(&self, token: &str) -> Result<OrderBookSnapshot, ArbError>;
    fn fetch_books_bulk(&self, tokens: &[String]) -> Result<HashMap<String, OrderBookSnapshot>, ArbError>;
    fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, ArbError>;
    fn cancel(&self, order_id: &str) -> Result<(), ArbError>;
    fn get_order(&self, order_id: &str) -> Result<OrderQuery, ArbError>;

    /// True iff a signing key is configured for venue B. When false the
    /// maker provider still scans and logs would-place orders, but the
    /// hedger refuses to fire (mirrors `arbitrage_market_maker.py`'s
    /// repeated `if self.polymarket_trading_enabled` guards).
    fn trading_enabled(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn resolved_shares_prefers_native_field() {
        let trade = Trade {
            trade_id: "t1".into(),
            order_id: "o1".into(),
            price: dec!(0.5),
            shares: Some(dec!(42)),
            usd_amount_wei: Some(dec!(999)),
            status_raw: "filled".into(),
        };
        assert_eq!(trade.resolved_shares(), Some(dec!(42)));
    }

    #[test]
    fn resolved_shares_falls_back_to_wei_usd_amount() {
        // 25 USD (18-decimal wei-style) at price 0.50 -> 50 shares
        let trade = Trade {
            trade_id: "t1".into(),
            order_id: "o1".into(),
            price: dec!(0.50),
            shares: None,
            usd_amount_wei: Some(Decimal::new(25_000_000_000_000_000_000, 0)),
            status_raw: "filled".into(),
        };
        assert_eq!(trade.resolved_shares(), Some(dec!(50)));
    }

    #[test]
    fn trade_filled_status_normalizes_through_string_vocabulary() {
        let trade = Trade {
            trade_id: "t1".into(),
            order_id: "o1".into(),
            price: dec!(0.5),
            shares: Some(dec!(1)),
            usd_amount_wei: None,
            status_raw: "MATCHED".into(),
        };
        assert!(trade.is_filled());
    }
}
