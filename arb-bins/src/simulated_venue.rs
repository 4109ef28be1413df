//! In-memory venue stand-in used by every `arb-*` binary.
//!
//! Real Opinion/Polymarket HTTP clients are named out-of-scope "external
//! collaborators" in spec.md §1/§6; this adapter gives the CLI binaries
//! something to actually run against. It seeds a synthetic, lightly
//! jittered order book per token from the loaded match file and settles
//! orders deterministically but probabilistically: a fill-or-kill request
//! (the taker path) is filled instantly and pessimistically at the
//! requested price; a good-till-cancelled request (a resting maker order)
//! starts `Pending` and is advanced toward `Filled` probabilistically each
//! time it's polled, rather than filling everything on contact.

use arb_core::book::normalize;
use arb_core::model::BOOK_DEPTH;
use arb_core::venue::TimeInForce;
use arb_core::{
    ArbError, MarketMatch, OrderAck, OrderBookSnapshot, OrderQuery, OrderRequest, OrderStatus,
    Trade, Venue, VenueAAdapter, VenueBAdapter,
};
use parking_lot::Mutex;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Probability that a resting order advances one step closer to fully
/// filled each time its status is polled. Tuned so a maker loop running
/// at the configured status-poll interval sees orders fill over a
/// handful of cycles rather than instantly or never.
const RESTING_FILL_PROBABILITY: f64 = 0.35;

struct RestingOrder {
    request: OrderRequest,
    filled: Decimal,
    status: OrderStatus,
}

/// One venue's worth of simulated state: a book per token, a ledger of
/// orders placed against it, and the trade tape those fills produce.
pub struct SimulatedVenue {
    venue: Venue,
    books: Mutex<HashMap<String, OrderBookSnapshot>>,
    orders: Mutex<HashMap<String, RestingOrder>>,
    trades: Mutex<Vec<Trade>>,
    next_id: AtomicU64,
    trading_enabled: bool,
}

impl SimulatedVenue {
    /// Build a venue stand-in with a synthetic book for every non-empty
    /// YES/NO token named by `matches` on this venue's side. Fair prices
    /// are randomized per match and mirrored (`no = 1 - yes`) so the
    /// NO-derivation symmetry and occasional crossed/arbable books show
    /// up the same way they would against a live venue.
    pub fn seeded(matches: &[MarketMatch], venue: Venue, trading_enabled: bool) -> Self {
        let mut books = HashMap::new();
        let mut rng = rand::thread_rng();

        for m in matches {
            let (yes_token, no_token) = match venue {
                Venue::A => (&m.yes_token_a, &m.no_token_a),
                Venue::B => (&m.yes_token_b, &m.no_token_b),
            };
            let fair_yes = Decimal::new(rng.gen_range(200..800), 3);
            if !yes_token.is_empty() {
                books.insert(yes_token.clone(), synthetic_book(yes_token, venue, fair_yes, &mut rng));
            }
            if !no_token.is_empty() {
                books.insert(no_token.clone(), synthetic_book(no_token, venue, dec!(1) - fair_yes, &mut rng));
            }
        }

        Self {
            venue,
            books: Mutex::new(books),
            orders: Mutex::new(HashMap::new()),
            trades: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            trading_enabled,
        }
    }

    fn venue_name(&self) -> &'static str {
        self.venue.as_str()
    }

    fn do_fetch_book(&self, token: &str) -> Result<OrderBookSnapshot, ArbError> {
        self.books
            .lock()
            .get(token)
            .cloned()
            .ok_or_else(|| ArbError::TransientNetwork { venue: self.venue_name(), detail: format!("no simulated book for {token}") })
    }

    fn do_place(&self, request: &OrderRequest) -> Result<OrderAck, ArbError> {
        if request.size <= Decimal::ZERO {
            return Err(ArbError::OrderRejected {
                venue: self.venue_name(),
                retryable: false,
                detail: "order size must be positive".into(),
            });
        }

        let id = format!("{}-sim-{}", self.venue_name(), self.next_id.fetch_add(1, Ordering::SeqCst));

        let (status, filled) = match request.time_in_force {
            TimeInForce::Fok => {
                self.record_trade(&id, request.price, request.size);
                (OrderStatus::Filled, request.size)
            }
            TimeInForce::Gtc => (OrderStatus::Pending, Decimal::ZERO),
        };

        self.orders.lock().insert(id.clone(), RestingOrder { request: request.clone(), filled, status });
        Ok(OrderAck { order_id: id })
    }

    fn do_cancel(&self, order_id: &str) -> Result<(), ArbError> {
        let mut orders = self.orders.lock();
        match orders.get_mut(order_id) {
            Some(order) if order.status.is_terminal_cancelled() || order.status.is_filled() => {
                Err(ArbError::CancelRejected { venue: self.venue_name(), detail: "order already terminal".into() })
            }
            Some(order) => {
                order.status = OrderStatus::Cancelled;
                Ok(())
            }
            None => Err(ArbError::TrackingDrift { order_id: order_id.to_string(), detail: "unknown order".into() }),
        }
    }

    fn do_get_order(&self, order_id: &str) -> Result<OrderQuery, ArbError> {
        let mut orders = self.orders.lock();
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| ArbError::TrackingDrift { order_id: order_id.to_string(), detail: "unknown order".into() })?;

        if !order.status.is_terminal_cancelled() && !order.status.is_filled() {
            self.advance_resting_order(order_id, order);
        }

        Ok(OrderQuery { status: order.status, filled: order.filled, total: order.request.size })
    }

    /// Probabilistically step a still-open resting order toward fully
    /// filled, recording a trade-tape entry for whatever increment
    /// fills this poll so `get_recent_trades` has matching entries.
    fn advance_resting_order(&self, order_id: &str, order: &mut RestingOrder) {
        let mut rng = rand::thread_rng();
        if !rng.gen_bool(RESTING_FILL_PROBABILITY) {
            return;
        }
        let remaining = order.request.size - order.filled;
        if remaining <= Decimal::ZERO {
            return;
        }
        let step = (remaining * Decimal::new(rng.gen_range(250..750), 3)).min(remaining);
        if step <= Decimal::ZERO {
            return;
        }
        order.filled += step;
        order.status = if order.filled >= order.request.size { OrderStatus::Filled } else { OrderStatus::Partial };
        self.record_trade(order_id, order.request.price, step);
    }

    fn record_trade(&self, order_id: &str, price: Decimal, shares: Decimal) {
        let trade_id = format!("{order_id}-t{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.trades.lock().push(Trade {
            trade_id,
            order_id: order_id.to_string(),
            price,
            shares: Some(shares),
            usd_amount_wei: None,
            status_raw: "filled".into(),
        });
    }
}

fn synthetic_book(token: &str, venue: Venue, fair: Decimal, rng: &mut impl Rng) -> OrderBookSnapshot {
    let half_spread = Decimal::new(rng.gen_range(2..8), 3);
    let mut bids = Vec::new();
    let mut asks = Vec::new();

    for level in 0..BOOK_DEPTH {
        let step = Decimal::new(level as i64, 0) * dec!(0.002);
        let size = Decimal::new(rng.gen_range(50_000..500_000), 3);
        let bid_price = fair - half_spread - step;
        let ask_price = fair + half_spread + step;
        if bid_price > Decimal::ZERO {
            bids.push((bid_price, size));
        }
        if ask_price < dec!(1) {
            asks.push((ask_price, size));
        }
    }

    normalize(&bids, &asks, venue, token, unix_now())
}

fn unix_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

impl VenueAAdapter for SimulatedVenue {
    fn fetch_book(&self, token: &str) -> Result<OrderBookSnapshot, ArbError> {
        self.do_fetch_book(token)
    }

    fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, ArbError> {
        self.do_place(request)
    }

    fn cancel(&self, order_id: &str) -> Result<(), ArbError> {
        self.do_cancel(order_id)
    }

    fn get_order(&self, order_id: &str) -> Result<OrderQuery, ArbError> {
        self.do_get_order(order_id)
    }

    fn get_recent_trades(&self, limit: usize) -> Result<Vec<Trade>, ArbError> {
        Ok(self.trades.lock().iter().rev().take(limit).cloned().collect())
    }
}

impl VenueBAdapter for SimulatedVenue {
    fn fetch_book(&self, token: &str) -> Result<OrderBookSnapshot, ArbError> {
        self.do_fetch_book(token)
    }

    fn fetch_books_bulk(&self, tokens: &[String]) -> Result<HashMap<String, OrderBookSnapshot>, ArbError> {
        let books = self.books.lock();
        Ok(tokens.iter().filter_map(|t| books.get(t).cloned().map(|s| (t.clone(), s))).collect())
    }

    fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, ArbError> {
        self.do_place(request)
    }

    fn cancel(&self, order_id: &str) -> Result<(), ArbError> {
        self.do_cancel(order_id)
    }

    fn get_order(&self, order_id: &str) -> Result<OrderQuery, ArbError> {
        self.do_get_order(order_id)
    }

    fn trading_enabled(&self) -> bool {
        self.trading_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_match() -> MarketMatch {
        MarketMatch {
            question: "q".into(),
            market_id_a: "m1".into(),
            yes_token_a: "ya".into(),
            no_token_a: "na".into(),
            condition_id_b: "c1".into(),
            yes_token_b: "yb".into(),
            no_token_b: "nb".into(),
            venue_b_slug: "slug".into(),
            cutoff_at: None,
            fee_rate_bps_b: 0,
            neg_risk_b: false,
        }
    }

    #[test]
    fn seeds_a_book_for_every_named_token() {
        let venue = SimulatedVenue::seeded(&[sample_match()], Venue::A, true);
        assert!(venue.fetch_book("ya").is_ok());
        assert!(venue.fetch_book("na").is_ok());
        assert!(VenueAAdapter::fetch_book(&venue, "yb").is_err());
    }

    #[test]
    fn fok_order_fills_instantly() {
        let venue = SimulatedVenue::seeded(&[sample_match()], Venue::A, true);
        let req = OrderRequest::new("m1", "ya", arb_core::Side::Buy, dec!(0.45), dec!(10)).with_tif(TimeInForce::Fok);
        let ack = VenueAAdapter::place_order(&venue, &req).unwrap();
        let query = VenueAAdapter::get_order(&venue, &ack.order_id).unwrap();
        assert_eq!(query.status, OrderStatus::Filled);
        assert_eq!(query.filled, dec!(10));
        assert_eq!(VenueAAdapter::get_recent_trades(&venue, 10).unwrap().len(), 1);
    }

    #[test]
    fn gtc_order_starts_pending_and_eventually_fills() {
        let venue = SimulatedVenue::seeded(&[sample_match()], Venue::A, true);
        let req = OrderRequest::new("m1", "ya", arb_core::Side::Buy, dec!(0.45), dec!(10));
        let ack = VenueAAdapter::place_order(&venue, &req).unwrap();

        let mut last = VenueAAdapter::get_order(&venue, &ack.order_id).unwrap();
        assert_eq!(last.status, OrderStatus::Pending);

        for _ in 0..500 {
            last = VenueAAdapter::get_order(&venue, &ack.order_id).unwrap();
            if last.status == OrderStatus::Filled {
                break;
            }
        }
        assert_eq!(last.status, OrderStatus::Filled);
        assert_eq!(last.filled, dec!(10));
    }

    #[test]
    fn cancel_rejects_unknown_order() {
        let venue = SimulatedVenue::seeded(&[], Venue::B, true);
        assert!(VenueBAdapter::cancel(&venue, "ghost").is_err());
    }

    #[test]
    fn bulk_fetch_skips_unknown_tokens() {
        let venue = SimulatedVenue::seeded(&[sample_match()], Venue::B, true);
        let books = VenueBAdapter::fetch_books_bulk(&venue, &["yb".to_string(), "missing".to_string()]).unwrap();
        assert_eq!(books.len(), 1);
        assert!(books.contains_key("yb"));
    }

    #[test]
    fn trading_enabled_flag_is_read_only() {
        let venue = SimulatedVenue::seeded(&[], Venue::B, false);
        assert!(!VenueBAdapter::trading_enabled(&venue));
    }
}
