//! Book Fetcher (C4)
//!
//! Per scan cycle, fetches the venue-A and venue-B YES books needed by
//! a batch of matches: one bulk, chunked venue-B request (two workers
//! in flight) and a bounded venue-A worker pool gated by the C2 rate
//! limiter. Missing tokens are tolerated — the detector simply skips
//! matches it can't resolve both sides for. The skew gate (§4.4)
//! discards a match's pair of snapshots outright when their
//! acquisition timestamps drift too far apart.

use arb_core::book::is_skewed;
use arb_core::resilience::RateGate;
use arb_core::{MarketMatch, OrderBookSnapshot, VenueAAdapter, VenueBAdapter};
use crossbeam::channel;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

fn monotonic_seconds(start: Instant) -> f64 {
    start.elapsed().as_secs_f64()
}

/// Resolved YES books for both venues, ready for the detector.
pub struct MatchBooks<'a> {
    pub market: &'a MarketMatch,
    pub yes_a: OrderBookSnapshot,
    pub yes_b: OrderBookSnapshot,
}

/// Fetches venue-A and venue-B YES books for every match in the batch,
/// then applies the skew gate per match. Returns only the matches for
/// which both tops resolved and passed the skew check.
pub fn fetch_match_books<'a>(
    venue_a: &dyn VenueAAdapter,
    venue_b: &dyn VenueBAdapter,
    rate_gate: &RateGate,
    matches: &'a [MarketMatch],
    workers: usize,
    books_chunk: usize,
    max_orderbook_skew: f64,
) -> Vec<MatchBooks<'a>> {
    let clock = Instant::now();
    let a_tokens: Vec<String> = matches.iter().map(|m| m.yes_token_a.clone()).collect();
    let b_tokens: Vec<String> = matches.iter().map(|m| m.yes_token_b.clone()).collect();

    let a_books = fetch_venue_a_pool(venue_a, rate_gate, &a_tokens, workers, &clock);
    let b_books = fetch_venue_b_bulk(venue_b, &b_tokens, books_chunk, &clock);

    matches
        .iter()
        .filter_map(|m| {
            let yes_a = a_books.get(&m.yes_token_a)?.clone();
            let yes_b = b_books.get(&m.yes_token_b)?.clone();
            if is_skewed(&yes_a, &yes_b, max_orderbook_skew) {
                warn!(
                    market_id_a = %m.market_id_a,
                    skew = (yes_a.timestamp - yes_b.timestamp).abs(),
                    "discarding match for this cycle: orderbook skew exceeds threshold"
                );
                return None;
            }
            Some(MatchBooks { market: m, yes_a, yes_b })
        })
        .collect()
}

/// Bounded worker pool over venue A, rate-gated per request (§4.2).
fn fetch_venue_a_pool(
    venue_a: &dyn VenueAAdapter,
    rate_gate: &RateGate,
    tokens: &[String],
    workers: usize,
    clock: &Instant,
) -> HashMap<String, OrderBookSnapshot> {
    if tokens.is_empty() {
        return HashMap::new();
    }
    let workers = workers.max(1).min(tokens.len());
    let (task_tx, task_rx) = channel::unbounded::<String>();
    for token in tokens {
        task_tx.send(token.clone()).ok();
    }
    drop(task_tx);

    let (result_tx, result_rx) = channel::unbounded::<(String, Option<OrderBookSnapshot>)>();
    std::thread::scope(|scope| {
        for _ in 0..workers {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                while let Ok(token) = task_rx.recv() {
                    rate_gate.acquire();
                    let snapshot = match venue_a.fetch_book(&token) {
                        Ok(mut snap) => {
                            snap.timestamp = monotonic_seconds(*clock);
                            Some(snap)
                        }
                        Err(err) => {
                            warn!(token = %token, error = %err, "venue A book fetch failed, skipping this cycle");
                            None
                        }
                    };
                    result_tx.send((token, snapshot)).ok();
                }
            });
        }
        drop(result_tx);
    });

    result_rx
        .iter()
        .filter_map(|(token, snap)| snap.map(|s| (token, s)))
        .collect()
}

/// Bulk venue-B fetch, chunked to `books_chunk` tokens per request, two
/// workers in flight (§4.2, property 8).
fn fetch_venue_b_bulk(
    venue_b: &dyn VenueBAdapter,
    tokens: &[String],
    books_chunk: usize,
    clock: &Instant,
) -> HashMap<String, OrderBookSnapshot> {
    if tokens.is_empty() {
        return HashMap::new();
    }
    let chunk_size = books_chunk.max(1);
    let chunks: Vec<Vec<String>> = tokens.chunks(chunk_size).map(|c| c.to_vec()).collect();
    let (task_tx, task_rx) = channel::unbounded::<Vec<String>>();
    for chunk in chunks {
        task_tx.send(chunk).ok();
    }
    drop(task_tx);

    let (result_tx, result_rx) = channel::unbounded::<HashMap<String, OrderBookSnapshot>>();
    std::thread::scope(|scope| {
        for _ in 0..2 {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                while let Ok(chunk) = task_rx.recv() {
                    debug!(chunk_len = chunk.len(), "fetching venue B books bulk");
                    match venue_b.fetch_books_bulk(&chunk) {
                        Ok(mut map) => {
                            let ts = monotonic_seconds(*clock);
                            for snap in map.values_mut() {
                                snap.timestamp = ts;
                            }
                            result_tx.send(map).ok();
                        }
                        Err(err) => {
                            warn!(error = %err, "venue B bulk book fetch failed, skipping this chunk");
                        }
                    }
                }
            });
        }
        drop(result_tx);
    });

    let mut merged = HashMap::new();
    for map in result_rx.iter() {
        merged.extend(map);
    }
    merged
}

/// Convenience for callers that already hold `Arc`-wrapped adapters
/// (binaries sharing adapters across the taker and maker loops).
pub fn fetch_match_books_arc<'a>(
    venue_a: &Arc<dyn VenueAAdapter>,
    venue_b: &Arc<dyn VenueBAdapter>,
    rate_gate: &RateGate,
    matches: &'a [MarketMatch],
    workers: usize,
    books_chunk: usize,
    max_orderbook_skew: f64,
) -> Vec<MatchBooks<'a>> {
    fetch_match_books(
        venue_a.as_ref(),
        venue_b.as_ref(),
        rate_gate,
        matches,
        workers,
        books_chunk,
        max_orderbook_skew,
    )
}

pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
