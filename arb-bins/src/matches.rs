//! Market-match file loading
//!
//! Grounded in the original bot's `load_market_matches`: a single
//! filename, or a comma-separated list of them, each holding a JSON
//! array of match objects. Field names are matched tolerantly (both
//! snake_case and the camelCase spellings the original accepted) since
//! match files are produced by an external matcher this crate does not
//! own.

use anyhow::{bail, Context, Result};
use arb_core::MarketMatch;
use serde::Deserialize;
use serde_json::Value;

/// Raw on-disk shape before field-name reconciliation. Every field is
/// optional so a file produced by a different matcher version still
/// loads, with the gaps filled by `RawMatch::into_market_match`'s
/// fallbacks.
#[derive(Debug, Deserialize)]
struct RawMatch {
    question: Option<String>,

    market_id_a: Option<String>,
    #[serde(rename = "opinion_market_id")]
    opinion_market_id: Option<String>,
    #[serde(rename = "opinionMarketId")]
    opinion_market_id_camel: Option<Value>,

    yes_token_a: Option<String>,
    #[serde(rename = "opinion_yes_token")]
    opinion_yes_token: Option<String>,
    #[serde(rename = "opinionYesToken")]
    opinion_yes_token_camel: Option<String>,

    no_token_a: Option<String>,
    #[serde(rename = "opinion_no_token")]
    opinion_no_token: Option<String>,
    #[serde(rename = "opinionNoToken")]
    opinion_no_token_camel: Option<String>,

    condition_id_b: Option<String>,
    #[serde(rename = "polymarket_condition_id")]
    polymarket_condition_id: Option<String>,
    #[serde(rename = "polymarketConditionId")]
    polymarket_condition_id_camel: Option<String>,

    yes_token_b: Option<String>,
    #[serde(rename = "polymarket_yes_token")]
    polymarket_yes_token: Option<String>,
    #[serde(rename = "polymarketYesToken")]
    polymarket_yes_token_camel: Option<String>,

    no_token_b: Option<String>,
    #[serde(rename = "polymarket_no_token")]
    polymarket_no_token: Option<String>,
    #[serde(rename = "polymarketNoToken")]
    polymarket_no_token_camel: Option<String>,

    venue_b_slug: Option<String>,
    #[serde(rename = "polymarket_slug")]
    polymarket_slug: Option<String>,
    #[serde(rename = "polymarketSlug")]
    polymarket_slug_camel: Option<String>,

    cutoff_at: Option<Value>,

    fee_rate_bps_b: Option<i32>,
    neg_risk_b: Option<bool>,
}

/// Coerce a loosely-typed JSON cutoff (int, float, or numeric string)
/// into an `i64`, mirroring the original bot's `_to_int` helper.
fn to_int(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok().or_else(|| s.trim().parse::<f64>().ok().map(|f| f as i64)),
        _ => None,
    }
}

fn first_string(opts: &[Option<&str>]) -> String {
    opts.iter().find_map(|o| *o).unwrap_or("").to_string()
}

/// A numeric-or-string JSON value, rendered as a plain string (the
/// original bot accepted both a numeric and a string market id).
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl RawMatch {
    fn into_market_match(self) -> MarketMatch {
        let market_id_a = self
            .market_id_a
            .or(self.opinion_market_id)
            .or_else(|| self.opinion_market_id_camel.as_ref().and_then(value_to_string))
            .unwrap_or_default();

        MarketMatch {
            question: self.question.unwrap_or_default(),
            market_id_a,
            yes_token_a: first_string(&[
                self.yes_token_a.as_deref(),
                self.opinion_yes_token.as_deref(),
                self.opinion_yes_token_camel.as_deref(),
            ]),
            no_token_a: first_string(&[
                self.no_token_a.as_deref(),
                self.opinion_no_token.as_deref(),
                self.opinion_no_token_camel.as_deref(),
            ]),
            condition_id_b: first_string(&[
                self.condition_id_b.as_deref(),
                self.polymarket_condition_id.as_deref(),
                self.polymarket_condition_id_camel.as_deref(),
            ]),
            yes_token_b: first_string(&[
                self.yes_token_b.as_deref(),
                self.polymarket_yes_token.as_deref(),
                self.polymarket_yes_token_camel.as_deref(),
            ]),
            no_token_b: first_string(&[
                self.no_token_b.as_deref(),
                self.polymarket_no_token.as_deref(),
                self.polymarket_no_token_camel.as_deref(),
            ]),
            venue_b_slug: first_string(&[
                self.venue_b_slug.as_deref(),
                self.polymarket_slug.as_deref(),
                self.polymarket_slug_camel.as_deref(),
            ]),
            cutoff_at: to_int(self.cutoff_at.as_ref()),
            fee_rate_bps_b: self.fee_rate_bps_b.unwrap_or(0),
            neg_risk_b: self.neg_risk_b.unwrap_or(false),
        }
    }
}

/// Load market matches from `spec`, a single path or a comma-separated
/// list of paths, each holding a JSON array. Files that don't exist are
/// skipped with a warning rather than failing the whole load, matching
/// the original bot's tolerant multi-file behavior; the call only fails
/// if *no* file yielded any matches.
pub fn load_market_matches(spec: &str) -> Result<Vec<MarketMatch>> {
    let files: Vec<&str> = if spec.contains(',') {
        spec.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()).collect()
    } else {
        vec![spec.trim()]
    };

    let mut combined = Vec::new();
    let mut any_file_existed = false;

    for path in &files {
        if !std::path::Path::new(path).exists() {
            tracing::warn!(file = %path, "match file does not exist, skipping");
            continue;
        }
        any_file_existed = true;

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading match file {path}"))?;
        let raw: Vec<RawMatch> = serde_json::from_str(&text)
            .with_context(|| format!("parsing match file {path} (expected a JSON array)"))?;

        tracing::info!(file = %path, count = raw.len(), "loaded market matches");
        combined.extend(raw.into_iter().map(RawMatch::into_market_match));
    }

    if combined.is_empty() {
        if any_file_existed {
            bail!("no market matches could be loaded from: {}", spec);
        }
        bail!("none of the configured match files exist: {}", spec);
    }

    Ok(combined)
}
