//! In-memory venue doubles used by this crate's tests: programmable
//! doubles standing in for a real venue SDK, with interior mutability so
//! a single instance can be shared between the code under test and the
//! assertions that inspect what it was asked to do.

#![cfg(test)]

use arb_core::book::normalize;
use arb_core::{
    ArbError, OrderAck, OrderBookSnapshot, OrderQuery, OrderRequest, OrderStatus, Trade, Venue,
    VenueAAdapter, VenueBAdapter,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct VenueState {
    books: HashMap<String, OrderBookSnapshot>,
    orders: HashMap<String, OrderQuery>,
    placed: Vec<OrderRequest>,
    cancelled: Vec<String>,
    trades: Vec<Trade>,
    bulk_request_lens: Vec<usize>,
    fail_balance_exhausted: bool,
    fail_cancel: bool,
    trading_enabled: bool,
}

pub struct MockVenueA {
    state: Mutex<VenueState>,
    next_id: AtomicU64,
}

pub struct MockVenueB {
    state: Mutex<VenueState>,
    next_id: AtomicU64,
}

impl MockVenueA {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(VenueState { trading_enabled: true, ..Default::default() }),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn set_book(&self, token: &str, venue: Venue, bids: &[(Decimal, Decimal)], asks: &[(Decimal, Decimal)]) {
        let snap = normalize(bids, asks, venue, token, 0.0);
        self.state.lock().books.insert(token.to_string(), snap);
    }

    pub fn queue_status(&self, order_id: &str, status: OrderStatus, filled: Decimal, total: Decimal) {
        self.state.lock().orders.insert(order_id.to_string(), OrderQuery { status, filled, total });
    }

    pub fn push_trade(&self, trade: Trade) {
        self.state.lock().trades.push(trade);
    }

    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        self.state.lock().placed.clone()
    }

    pub fn cancelled_ids(&self) -> Vec<String> {
        self.state.lock().cancelled.clone()
    }

    pub fn set_balance_exhausted(&self) {
        self.state.lock().fail_balance_exhausted = true;
    }

    pub fn set_cancel_fails(&self) {
        self.state.lock().fail_cancel = true;
    }
}

impl VenueAAdapter for MockVenueA {
    fn fetch_book(&self, token: &str) -> Result<OrderBookSnapshot, ArbError> {
        self.state
            .lock()
            .books
            .get(token)
            .cloned()
            .ok_or_else(|| ArbError::TransientNetwork { venue: "venue_a", detail: format!("no book for {token}") })
    }

    fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, ArbError> {
        let mut state = self.state.lock();
        if state.fail_balance_exhausted {
            return Err(ArbError::BalanceExhausted { venue: "venue_a", detail: "insufficient balance".into() });
        }
        let id = format!("a-order-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        state.orders.insert(id.clone(), OrderQuery { status: OrderStatus::Pending, filled: Decimal::ZERO, total: request.size });
        state.placed.push(request.clone());
        Ok(OrderAck { order_id: id })
    }

    fn cancel(&self, order_id: &str) -> Result<(), ArbError> {
        let mut state = self.state.lock();
        if state.fail_cancel {
            return Err(ArbError::CancelRejected { venue: "venue_a", detail: "rejected".into() });
        }
        state.cancelled.push(order_id.to_string());
        Ok(())
    }

    fn get_order(&self, order_id: &str) -> Result<OrderQuery, ArbError> {
        self.state
            .lock()
            .orders
            .get(order_id)
            .copied()
            .ok_or_else(|| ArbError::TrackingDrift { order_id: order_id.to_string(), detail: "unknown order".into() })
    }

    fn get_recent_trades(&self, limit: usize) -> Result<Vec<Trade>, ArbError> {
        let state = self.state.lock();
        Ok(state.trades.iter().rev().take(limit).cloned().collect())
    }
}

impl MockVenueB {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(VenueState { trading_enabled: true, ..Default::default() }),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn set_book(&self, token: &str, venue: Venue, bids: &[(Decimal, Decimal)], asks: &[(Decimal, Decimal)]) {
        let snap = normalize(bids, asks, venue, token, 0.0);
        self.state.lock().books.insert(token.to_string(), snap);
    }

    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        self.state.lock().placed.clone()
    }

    pub fn max_bulk_request_len(&self) -> usize {
        self.state.lock().bulk_request_lens.iter().copied().max().unwrap_or(0)
    }

    pub fn set_trading_enabled(&self, enabled: bool) {
        self.state.lock().trading_enabled = enabled;
    }

    pub fn set_balance_exhausted(&self) {
        self.state.lock().fail_balance_exhausted = true;
    }
}

impl VenueBAdapter for MockVenueB {
    fn fetch_book(&self, token: &str) -> Result<OrderBookSnapshot, ArbError> {
        self.state
            .lock()
            .books
            .get(token)
            .cloned()
            .ok_or_else(|| ArbError::TransientNetwork { venue: "venue_b", detail: format!("no book for {token}") })
    }

    fn fetch_books_bulk(&self, tokens: &[String]) -> Result<HashMap<String, OrderBookSnapshot>, ArbError> {
        let mut state = self.state.lock();
        state.bulk_request_lens.push(tokens.len());
        Ok(tokens.iter().filter_map(|t| state.books.get(t).cloned().map(|s| (t.clone(), s))).collect())
    }

    fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, ArbError> {
        let mut state = self.state.lock();
        if state.fail_balance_exhausted {
            return Err(ArbError::BalanceExhausted { venue: "venue_b", detail: "insufficient balance".into() });
        }
        let id = format!("b-order-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        state.orders.insert(id.clone(), OrderQuery { status: OrderStatus::Filled, filled: request.size, total: request.size });
        state.placed.push(request.clone());
        Ok(OrderAck { order_id: id })
    }

    fn cancel(&self, order_id: &str) -> Result<(), ArbError> {
        self.state.lock().cancelled.push(order_id.to_string());
        Ok(())
    }

    fn get_order(&self, order_id: &str) -> Result<OrderQuery, ArbError> {
        self.state
            .lock()
            .orders
            .get(order_id)
            .copied()
            .ok_or_else(|| ArbError::TrackingDrift { order_id: order_id.to_string(), detail: "unknown order".into() })
    }

    fn trading_enabled(&self) -> bool {
        self.state.lock().trading_enabled
    }
}

/// A paired venue-A/venue-B mock double, sized for the common case of
/// a single test touching both sides of a match.
pub struct MockVenues {
    pub venue_a: MockVenueA,
    pub venue_b: MockVenueB,
}

impl MockVenues {
    pub fn new() -> Self {
        Self { venue_a: MockVenueA::new(), venue_b: MockVenueB::new() }
    }

    pub fn set_book_a(&self, token: &str, venue: Venue, bids: &[(Decimal, Decimal)], asks: &[(Decimal, Decimal)]) {
        self.venue_a.set_book(token, venue, bids, asks);
    }

    pub fn set_book_b(&self, token: &str, venue: Venue, bids: &[(Decimal, Decimal)], asks: &[(Decimal, Decimal)]) {
        self.venue_b.set_book(token, venue, bids, asks);
    }

    pub fn max_bulk_request_len(&self) -> usize {
        self.venue_b.max_bulk_request_len()
    }
}
