//! Opportunity Detector (C6)
//!
//! For a match with both YES books present, derives both NO books and
//! evaluates the four YES/NO x venue combinations named by
//! [`arb_core::Strategy`]. Taker candidates require the effective cost
//! to clear a threshold at a minimum crossable size (§4.6); maker
//! candidates additionally require the venue-A leg to sit at (or
//! improve on) the current best bid and the venue-B hedge leg to carry
//! enough visible size, gated by an annualized-yield floor.

use arb_core::book::derive_no_from_yes;
use arb_core::{LegSpec, MarketMatch, Opportunity, OrderBookSnapshot, Side, Strategy, Venue};
use arb_core::fees::{venue_a_effective_unit_cost, venue_b_effective_unit_cost};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;

/// Thresholds and fee inputs the detector needs. Maps 1:1 onto the
/// relevant fields of `ArbitrageConfig`.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub taker_threshold_cost: Decimal,
    pub taker_threshold_size: Decimal,
    pub liquidity_min_size: Decimal,
    pub liquidity_min_annualized_percent: f64,
    pub opinion_min_fee: Decimal,
    pub polymarket_taker_adder: Decimal,
    pub seconds_per_year: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            taker_threshold_cost: Decimal::new(99, 2),
            taker_threshold_size: Decimal::new(200, 0),
            liquidity_min_size: Decimal::new(100, 0),
            liquidity_min_annualized_percent: 20.0,
            opinion_min_fee: Decimal::new(5, 1),
            polymarket_taker_adder: Decimal::ZERO,
            seconds_per_year: (365 * 24 * 60 * 60) as f64,
        }
    }
}

/// `profit_rate = (1 - eff_cost) / eff_cost`.
pub fn profit_rate(eff_cost: Decimal) -> f64 {
    if eff_cost.is_zero() {
        return 0.0;
    }
    ((Decimal::ONE - eff_cost) / eff_cost).to_f64().unwrap_or(0.0)
}

/// `profit_rate * seconds_per_year / max(0, cutoff_at - now)`, `None`
/// when the match carries no cutoff or the cutoff has already passed.
pub fn annualized_rate(profit_rate: f64, cutoff_at: Option<i64>, now: f64, seconds_per_year: f64) -> Option<f64> {
    let cutoff = cutoff_at? as f64;
    let remaining = cutoff - now;
    if remaining <= 0.0 {
        return None;
    }
    Some(profit_rate * (seconds_per_year / remaining))
}

struct CandidateLegs {
    strategy: Strategy,
    leg_a: LegSpec,
    leg_b: LegSpec,
}

/// Evaluate the two taker combinations for this match. Both the
/// venue-A and venue-B tops must be present; a candidate is emitted
/// only when `eff_cost < threshold_cost` and the crossable size clears
/// `threshold_size` (property 4).
pub fn detect_taker(
    market: &MarketMatch,
    yes_a: &OrderBookSnapshot,
    yes_b: &OrderBookSnapshot,
    now: f64,
    cfg: &DetectorConfig,
) -> Vec<Opportunity> {
    let no_a = derive_no_from_yes(yes_a, &market.no_token_a);
    let no_b = derive_no_from_yes(yes_b, &market.no_token_b);

    let mut candidates = Vec::new();
    if let (Some(ask_ya), Some(ask_nb)) = (yes_a.best_ask(), no_b.best_ask()) {
        candidates.push(CandidateLegs {
            strategy: Strategy::YaNbTaker,
            leg_a: LegSpec::new(Venue::A, &market.yes_token_a, Side::Buy, ask_ya.price, ask_ya.size),
            leg_b: LegSpec::new(Venue::B, &market.no_token_b, Side::Buy, ask_nb.price, ask_nb.size),
        });
    }
    if let (Some(ask_na), Some(ask_yb)) = (no_a.best_ask(), yes_b.best_ask()) {
        candidates.push(CandidateLegs {
            strategy: Strategy::NaYbTaker,
            leg_a: LegSpec::new(Venue::A, &market.no_token_a, Side::Buy, ask_na.price, ask_na.size),
            leg_b: LegSpec::new(Venue::B, &market.yes_token_b, Side::Buy, ask_yb.price, ask_yb.size),
        });
    }

    candidates
        .into_iter()
        .filter_map(|c| {
            let size = c.leg_a.size.min(c.leg_b.size);
            let eff_cost = venue_a_effective_unit_cost(c.leg_a.price, size, cfg.opinion_min_fee)
                + venue_b_effective_unit_cost(c.leg_b.price, cfg.polymarket_taker_adder, true);
            if eff_cost >= cfg.taker_threshold_cost || size < cfg.taker_threshold_size {
                return None;
            }
            Some(build_opportunity(market, c, eff_cost, size, now, cfg))
        })
        .collect()
}

/// Evaluate the two maker combinations: the venue-A leg rests at its
/// current best bid (a resting quote, not a cross), hedged by taking
/// the venue-B ask. Requires the hedge leg's visible ask size to clear
/// `liquidity_min_size` and the annualized yield to clear
/// `liquidity_min_annualized_percent`; a match with no cutoff
/// (`annualized_rate = None`) fails this threshold unconditionally.
pub fn detect_maker(
    market: &MarketMatch,
    yes_a: &OrderBookSnapshot,
    yes_b: &OrderBookSnapshot,
    now: f64,
    cfg: &DetectorConfig,
) -> Vec<Opportunity> {
    let no_a = derive_no_from_yes(yes_a, &market.no_token_a);
    let no_b = derive_no_from_yes(yes_b, &market.no_token_b);

    let mut candidates = Vec::new();
    if let (Some(bid_ya), Some(ask_nb)) = (yes_a.best_bid(), no_b.best_ask()) {
        candidates.push(CandidateLegs {
            strategy: Strategy::YaNbMaker,
            leg_a: LegSpec::new(Venue::A, &market.yes_token_a, Side::Buy, bid_ya.price, bid_ya.size),
            leg_b: LegSpec::new(Venue::B, &market.no_token_b, Side::Buy, ask_nb.price, ask_nb.size),
        });
    }
    if let (Some(bid_na), Some(ask_yb)) = (no_a.best_bid(), yes_b.best_ask()) {
        candidates.push(CandidateLegs {
            strategy: Strategy::NaYbMaker,
            leg_a: LegSpec::new(Venue::A, &market.no_token_a, Side::Buy, bid_na.price, bid_na.size),
            leg_b: LegSpec::new(Venue::B, &market.yes_token_b, Side::Buy, ask_yb.price, ask_yb.size),
        });
    }

    candidates
        .into_iter()
        .filter_map(|c| {
            if c.leg_b.size < cfg.liquidity_min_size {
                return None;
            }
            let size = c.leg_a.size.min(c.leg_b.size);
            let eff_cost = venue_a_effective_unit_cost(c.leg_a.price, size, cfg.opinion_min_fee)
                + venue_b_effective_unit_cost(c.leg_b.price, cfg.polymarket_taker_adder, true);
            let opp = build_opportunity(market, c, eff_cost, size, now, cfg);
            let annualized = opp.annualized_rate?;
            if annualized < cfg.liquidity_min_annualized_percent {
                return None;
            }
            Some(opp)
        })
        .collect()
}

fn build_opportunity(
    market: &MarketMatch,
    candidate: CandidateLegs,
    eff_cost: Decimal,
    size: Decimal,
    now: f64,
    cfg: &DetectorConfig,
) -> Opportunity {
    let rate = profit_rate(eff_cost);
    let annualized = annualized_rate(rate, market.cutoff_at, now, cfg.seconds_per_year);
    Opportunity {
        market_id_a: market.market_id_a.clone(),
        strategy: candidate.strategy,
        first_leg: candidate.leg_a,
        second_leg: candidate.leg_b,
        cost: eff_cost.to_f64().unwrap_or(0.0),
        profit_rate: rate,
        annualized_rate: annualized,
        min_size: size,
        timestamp: now,
    }
}

/// Among candidates sharing a tie-break key (e.g. the same market),
/// the higher annualized rate wins; `None` always loses (§4.6).
pub fn pick_best(candidates: &[Opportunity]) -> Option<&Opportunity> {
    candidates.iter().max_by(|a, b| {
        let ka = a.annualized_rate.unwrap_or(f64::NEG_INFINITY);
        let kb = b.annualized_rate.unwrap_or(f64::NEG_INFINITY);
        ka.partial_cmp(&kb).unwrap_or(std::cmp::Ordering::Equal)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arb_core::book::normalize;
    use rust_decimal_macros::dec;

    fn sample_match(cutoff: Option<i64>) -> MarketMatch {
        MarketMatch {
            question: "q".into(),
            market_id_a: "m1".into(),
            yes_token_a: "ya".into(),
            no_token_a: "na".into(),
            condition_id_b: "c1".into(),
            yes_token_b: "yb".into(),
            no_token_b: "nb".into(),
            venue_b_slug: "slug".into(),
            cutoff_at: cutoff,
            fee_rate_bps_b: 0,
            neg_risk_b: false,
        }
    }

    #[test]
    fn s1_taker_fires_above_threshold() {
        // venue-A YES ask 0.450 size 400; venue-B NO ask 0.500 size 400
        let yes_a = normalize(&[], &[(dec!(0.450), dec!(400))], Venue::A, "ya", 0.0);
        // venue-B YES book must produce NO ask 0.500 => YES bid 0.500
        let yes_b = normalize(&[(dec!(0.500), dec!(400))], &[], Venue::B, "yb", 0.0);
        let market = sample_match(Some(1_000_000));
        let cfg = DetectorConfig::default();
        let opps = detect_taker(&market, &yes_a, &yes_b, 0.0, &cfg);
        assert_eq!(opps.len(), 1);
        let opp = &opps[0];
        assert_eq!(opp.strategy, Strategy::YaNbTaker);
        assert!(opp.cost < 0.99);
        assert_eq!(opp.min_size, dec!(400));
    }

    #[test]
    fn no_candidate_when_size_below_threshold() {
        let yes_a = normalize(&[], &[(dec!(0.450), dec!(50))], Venue::A, "ya", 0.0);
        let yes_b = normalize(&[(dec!(0.500), dec!(50))], &[], Venue::B, "yb", 0.0);
        let market = sample_match(None);
        let cfg = DetectorConfig::default();
        assert!(detect_taker(&market, &yes_a, &yes_b, 0.0, &cfg).is_empty());
    }

    #[test]
    fn no_candidate_when_either_top_missing() {
        let yes_a = normalize(&[], &[], Venue::A, "ya", 0.0);
        let yes_b = normalize(&[(dec!(0.50), dec!(400))], &[], Venue::B, "yb", 0.0);
        let market = sample_match(None);
        let cfg = DetectorConfig::default();
        assert!(detect_taker(&market, &yes_a, &yes_b, 0.0, &cfg).is_empty());
    }

    #[test]
    fn maker_requires_annualized_floor_and_none_cutoff_fails() {
        let yes_a = normalize(&[(dec!(0.430), dec!(300))], &[], Venue::A, "ya", 0.0);
        let yes_b = normalize(&[], &[(dec!(0.500), dec!(300))], Venue::B, "yb", 0.0);
        let market = sample_match(None);
        let cfg = DetectorConfig::default();
        assert!(detect_maker(&market, &yes_a, &yes_b, 0.0, &cfg).is_empty());
    }

    #[test]
    fn maker_fires_with_cutoff_and_sufficient_annualized() {
        let yes_a = normalize(&[(dec!(0.430), dec!(300))], &[], Venue::A, "ya", 0.0);
        let yes_b = normalize(&[], &[(dec!(0.500), dec!(300))], Venue::B, "yb", 0.0);
        // cutoff far enough in the future but close enough for a large annualized rate
        let market = sample_match(Some(3600));
        let cfg = DetectorConfig::default();
        let opps = detect_maker(&market, &yes_a, &yes_b, 0.0, &cfg);
        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].strategy, Strategy::YaNbMaker);
        assert!(opps[0].annualized_rate.unwrap() >= cfg.liquidity_min_annualized_percent);
    }

    #[test]
    fn pick_best_prefers_higher_annualized_and_none_always_loses() {
        let mut a = sample_opportunity();
        a.annualized_rate = Some(10.0);
        let mut b = sample_opportunity();
        b.annualized_rate = Some(50.0);
        let mut c = sample_opportunity();
        c.annualized_rate = None;
        let best = pick_best(&[a.clone(), b.clone(), c]).unwrap();
        assert_eq!(best.annualized_rate, Some(50.0));
    }

    fn sample_opportunity() -> Opportunity {
        Opportunity {
            market_id_a: "m1".into(),
            strategy: Strategy::YaNbTaker,
            first_leg: LegSpec::new(Venue::A, "ya", Side::Buy, dec!(0.45), dec!(100)),
            second_leg: LegSpec::new(Venue::B, "nb", Side::Buy, dec!(0.50), dec!(100)),
            cost: 0.95,
            profit_rate: 0.05,
            annualized_rate: None,
            min_size: dec!(100),
            timestamp: 0.0,
        }
    }
}
