//! Core data model: order book levels/snapshots, market matches,
//! opportunities, and maker order state.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which of the two venues a level, snapshot, or leg belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Venue {
    A,
    B,
}

impl Venue {
    pub fn other(self) -> Venue {
        match self {
            Venue::A => Venue::B,
            Venue::B => Venue::A,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Venue::A => "venue_a",
            Venue::B => "venue_b",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

/// A single price/size level of a book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderBookLevel {
    pub price: Decimal,
    pub size: Decimal,
}

/// Top-N order book snapshot for one token, one side of the spread per
/// vector, already normalized (bids descending, asks ascending, at most
/// `DEPTH` levels, prices rounded to 3 decimals).
pub const BOOK_DEPTH: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub bids: Vec<OrderBookLevel>,
    pub asks: Vec<OrderBookLevel>,
    pub source: Venue,
    pub token_id: String,
    /// Monotonic acquisition time, in seconds, used only for skew gating
    /// (never persisted across a process run as wall-clock time).
    pub timestamp: f64,
}

impl OrderBookSnapshot {
    pub fn best_bid(&self) -> Option<OrderBookLevel> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<OrderBookLevel> {
        self.asks.first().copied()
    }

    /// True when the book violates `best_ask > best_bid`.
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => ask.price <= bid.price,
            _ => false,
        }
    }
}

/// One matched pair of markets across the two venues, loaded once from an
/// external match file and immutable for the process lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketMatch {
    pub question: String,
    pub market_id_a: String,
    pub yes_token_a: String,
    pub no_token_a: String,
    pub condition_id_b: String,
    pub yes_token_b: String,
    pub no_token_b: String,
    pub venue_b_slug: String,
    pub cutoff_at: Option<i64>,
    pub fee_rate_bps_b: i32,
    pub neg_risk_b: bool,
}

/// Which pairing of (venue, outcome) legs an opportunity represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// Buy YES on venue A, buy NO on venue B.
    YaNbTaker,
    /// Buy NO on venue A, buy YES on venue B.
    NaYbTaker,
    /// Buy YES on venue A, buy NO on venue B (maker leg on A).
    YaNbMaker,
    /// Buy NO on venue A, buy YES on venue B (maker leg on A).
    NaYbMaker,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::YaNbTaker => "YA+NB_taker",
            Strategy::NaYbTaker => "NA+YB_taker",
            Strategy::YaNbMaker => "YA+NB_maker",
            Strategy::NaYbMaker => "NA+YB_maker",
        }
    }

    pub fn is_maker(self) -> bool {
        matches!(self, Strategy::YaNbMaker | Strategy::NaYbMaker)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegSpec {
    pub venue: Venue,
    pub token: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
}

impl LegSpec {
    pub fn new(venue: Venue, token: impl Into<String>, side: Side, price: Decimal, size: Decimal) -> Self {
        Self {
            venue,
            token: token.into(),
            side,
            price,
            size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub market_id_a: String,
    pub strategy: Strategy,
    pub first_leg: LegSpec,
    pub second_leg: LegSpec,
    pub cost: f64,
    pub profit_rate: f64,
    pub annualized_rate: Option<f64>,
    pub min_size: Decimal,
    pub timestamp: f64,
}

impl Opportunity {
    pub fn cooldown_key(&self) -> String {
        format!("{}||{}", self.market_id_a, self.strategy.as_str())
    }
}

/// Normalized terminal/non-terminal status for a resting maker order.
/// Both venue-native status vocabularies (numeric and string) collapse
/// into this closed set at the adapter boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Partial,
    Filled,
    Cancelled,
    CancelInProgress,
    Unknown,
}

impl OrderStatus {
    /// Treats `CancelInProgress` as cancelled-terminal, matching the
    /// original's handling (documented open question: whether to revisit
    /// on a later fill observation — it is not, the no-orphan-fill
    /// invariant keeps this safe either way).
    pub fn is_terminal_cancelled(self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::CancelInProgress)
    }

    pub fn is_filled(self) -> bool {
        matches!(self, OrderStatus::Filled)
    }
}

/// Resting maker order state, keyed uniquely by `(market_id_a, token_a,
/// direction, slug_b)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityOrderState {
    pub key: String,
    pub order_id: String,
    pub market: MarketMatch,
    pub token_a: String,
    pub price_a: Decimal,
    pub side_a: Side,
    pub order_size_a: Decimal,
    pub effective_size: Decimal,
    pub token_b: String,
    pub side_b: Side,
    pub price_b_reference: Decimal,
    pub status: OrderStatus,
    pub filled: Decimal,
    pub hedged: Decimal,
    pub created_at: f64,
    pub updated_at: f64,
    pub marked_for_removal: bool,
    pub last_status_check: f64,
    pub last_status_log: Option<String>,
}

impl LiquidityOrderState {
    pub fn make_key(market_id_a: &str, token_a: &str, direction: &str, slug_b: &str) -> String {
        format!("{market_id_a}|{token_a}|{direction}|{slug_b}")
    }

    /// The fill delta not yet forwarded to the hedger.
    pub fn unhedged(&self) -> Decimal {
        self.filled - self.hedged
    }
}

/// By-key and by-id indices over the live set of maker orders. Only one
/// mutex (held by the caller) protects both maps so register/remove/
/// force-remove update them atomically together.
#[derive(Debug, Default)]
pub struct LiquidityOrderIndex {
    by_key: BTreeMap<String, String>,
    by_id: BTreeMap<String, LiquidityOrderState>,
}

impl LiquidityOrderIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, state: LiquidityOrderState) {
        self.by_key.insert(state.key.clone(), state.order_id.clone());
        self.by_id.insert(state.order_id.clone(), state);
    }

    pub fn get_by_key(&self, key: &str) -> Option<&LiquidityOrderState> {
        self.by_key.get(key).and_then(|id| self.by_id.get(id))
    }

    pub fn get_by_id(&self, order_id: &str) -> Option<&LiquidityOrderState> {
        self.by_id.get(order_id)
    }

    pub fn get_by_id_mut(&mut self, order_id: &str) -> Option<&mut LiquidityOrderState> {
        self.by_id.get_mut(order_id)
    }

    /// Soft-remove: drop from the by-key index (no longer "desired" or
    /// newly placeable at this key) while keeping the by-id entry so a
    /// late fill is still observed and hedged.
    pub fn soft_remove(&mut self, key: &str) {
        self.by_key.remove(key);
    }

    /// Force-remove: drop from both indices entirely.
    pub fn force_remove(&mut self, order_id: &str) {
        if let Some(state) = self.by_id.remove(order_id) {
            if self.by_key.get(&state.key) == Some(&order_id.to_string()) {
                self.by_key.remove(&state.key);
            }
        }
    }

    pub fn key_count(&self) -> usize {
        self.by_key.len()
    }

    pub fn id_count(&self) -> usize {
        self.by_id.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.by_key.keys().map(|s| s.as_str())
    }

    pub fn ids(&self) -> impl Iterator<Item = &LiquidityOrderState> {
        self.by_id.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_match() -> MarketMatch {
        MarketMatch {
            question: "Will it rain".into(),
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

    fn sample_state(key: &str, order_id: &str) -> LiquidityOrderState {
        LiquidityOrderState {
            key: key.to_string(),
            order_id: order_id.to_string(),
            market: sample_match(),
            token_a: "ya".into(),
            price_a: dec!(0.45),
            side_a: Side::Buy,
            order_size_a: dec!(100),
            effective_size: dec!(95),
            token_b: "nb".into(),
            side_b: Side::Buy,
            price_b_reference: dec!(0.50),
            status: OrderStatus::Pending,
            filled: dec!(0),
            hedged: dec!(0),
            created_at: 0.0,
            updated_at: 0.0,
            marked_for_removal: false,
            last_status_check: 0.0,
            last_status_log: None,
        }
    }

    #[test]
    fn crossed_book_detection() {
        let crossed = OrderBookSnapshot {
            bids: vec![OrderBookLevel { price: dec!(0.50), size: dec!(10) }],
            asks: vec![OrderBookLevel { price: dec!(0.49), size: dec!(10) }],
            source: Venue::A,
            token_id: "t".into(),
            timestamp: 0.0,
        };
        assert!(crossed.is_crossed());

        let fine = OrderBookSnapshot {
            bids: vec![OrderBookLevel { price: dec!(0.40), size: dec!(10) }],
            asks: vec![OrderBookLevel { price: dec!(0.50), size: dec!(10) }],
            source: Venue::A,
            token_id: "t".into(),
            timestamp: 0.0,
        };
        assert!(!fine.is_crossed());
    }

    #[test]
    fn soft_remove_then_force_remove() {
        let mut idx = LiquidityOrderIndex::new();
        idx.insert(sample_state("k1", "o1"));
        assert_eq!(idx.key_count(), 1);
        assert_eq!(idx.id_count(), 1);

        idx.soft_remove("k1");
        assert_eq!(idx.key_count(), 0);
        assert_eq!(idx.id_count(), 1, "by-id entry survives soft remove");
        assert!(idx.get_by_key("k1").is_none());
        assert!(idx.get_by_id("o1").is_some());

        idx.force_remove("o1");
        assert_eq!(idx.id_count(), 0);
    }

    #[test]
    fn cooldown_key_combines_market_and_strategy() {
        let opp = Opportunity {
            market_id_a: "m1".into(),
            strategy: Strategy::YaNbTaker,
            first_leg: LegSpec::new(Venue::A, "ya", Side::Buy, dec!(0.45), dec!(100)),
            second_leg: LegSpec::new(Venue::B, "nb", Side::Buy, dec!(0.50), dec!(100)),
            cost: 0.95,
            profit_rate: 0.05,
            annualized_rate: Some(35.0),
            min_size: dec!(100),
            timestamp: 0.0,
        };
        assert_eq!(opp.cooldown_key(), "m1||YA+NB_taker");
    }
}
