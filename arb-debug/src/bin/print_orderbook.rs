//! Orderbook Snapshot Printer
//!
//! Loads a match file, seeds the simulated venues the same way the
//! `arb-*` CLI binaries do, and prints the resolved YES/NO book for one
//! match side by side across both venues.
//!
//! ## Usage
//!
//! ```bash
//! # Print top 5 levels for the first loaded match
//! print-orderbook --matches-file market_matches.json
//!
//! # Print the NO side of the third match, 10 levels, JSON
//! print-orderbook --match-index 2 --side no --levels 10 --format json
//! ```

use anyhow::{bail, Result};
use arb_bins::matches::load_market_matches;
use arb_bins::simulated_venue::SimulatedVenue;
use arb_core::{MarketMatch, OrderBookSnapshot, Venue, VenueAAdapter, VenueBAdapter};
use clap::Parser;
use rust_decimal::Decimal;
use serde_json::json;

#[derive(Parser)]
#[command(name = "print-orderbook")]
#[command(about = "Print a simulated match's order book", long_about = None)]
struct Args {
    /// Path to a market-matches JSON file, or a comma-separated list.
    #[arg(long, default_value = "market_matches.json")]
    matches_file: String,

    /// Index into the loaded matches array.
    #[arg(long, default_value = "0")]
    match_index: usize,

    /// Which token to print: yes or no.
    #[arg(short, long, default_value = "yes")]
    side: String,

    /// Number of levels to display.
    #[arg(short, long, default_value = "5")]
    levels: usize,

    /// Output format (pretty, compact, json).
    #[arg(short, long, default_value = "pretty")]
    format: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let matches = load_market_matches(&args.matches_file)?;
    let market = matches
        .get(args.match_index)
        .ok_or_else(|| anyhow::anyhow!("match index {} out of range (loaded {} matches)", args.match_index, matches.len()))?
        .clone();

    let token_a = match args.side.as_str() {
        "yes" => &market.yes_token_a,
        "no" => &market.no_token_a,
        other => bail!("unknown --side {other}, expected yes or no"),
    };
    let token_b = match args.side.as_str() {
        "yes" => &market.yes_token_b,
        _ => &market.no_token_b,
    };

    let venue_a = SimulatedVenue::seeded(&matches, Venue::A, true);
    let venue_b = SimulatedVenue::seeded(&matches, Venue::B, true);
    let book_a = VenueAAdapter::fetch_book(&venue_a, token_a)?;
    let book_b = VenueBAdapter::fetch_book(&venue_b, token_b)?;

    match args.format.as_str() {
        "json" => print_json(&market, &book_a, &book_b, args.levels)?,
        "compact" => print_compact(&market, &book_a, &book_b, args.levels),
        _ => print_pretty(&market, &book_a, &book_b, args.levels),
    }

    Ok(())
}

fn print_pretty(market: &MarketMatch, book_a: &OrderBookSnapshot, book_b: &OrderBookSnapshot, max_levels: usize) {
    println!();
    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║  {:<58}║", market.question);
    println!("║  market_id_a={}  slug_b={}", market.market_id_a, market.venue_b_slug);
    println!("╚══════════════════════════════════════════════════════════╝");

    print_venue_panel("VENUE A (opinion)", book_a, max_levels);
    print_venue_panel("VENUE B (polymarket)", book_b, max_levels);

    if let (Some(bid_a), Some(ask_b)) = (book_a.best_bid(), book_b.best_ask()) {
        println!();
        println!("cross-venue: venue A bid {:.3}  vs  venue B ask {:.3}  (cost {:.3})", bid_a.price, ask_b.price, bid_a.price + ask_b.price);
    }
    println!();
}

fn print_venue_panel(label: &str, book: &OrderBookSnapshot, max_levels: usize) {
    println!();
    println!("  {label}  (token {})", book.token_id);
    println!("    ────────────────────────────────────────");
    let max_size = book
        .asks
        .iter()
        .chain(book.bids.iter())
        .map(|l| l.size)
        .max()
        .unwrap_or(Decimal::ZERO);

    println!("         ASKS        SIZE       BAR");
    for level in book.asks.iter().take(max_levels).rev() {
        println!("    {:>10.3}   {:>8.2}  {}", level.price, level.size, create_ascii_bar(level.size, max_size, 15));
    }
    match (book.best_bid(), book.best_ask()) {
        (Some(bid), Some(ask)) => {
            let spread = ask.price - bid.price;
            println!("    ─── mid {:.3}  spread {:.4} ───", (bid.price + ask.price) / Decimal::TWO, spread);
        }
        _ => println!("    ─── book incomplete ───"),
    }
    println!("         BIDS        SIZE       BAR");
    for level in book.bids.iter().take(max_levels) {
        println!("    {:>10.3}   {:>8.2}  {}", level.price, level.size, create_ascii_bar(level.size, max_size, 15));
    }
    if book.is_crossed() {
        println!("    !! book crossed !!");
    }
}

fn print_compact(market: &MarketMatch, book_a: &OrderBookSnapshot, book_b: &OrderBookSnapshot, max_levels: usize) {
    println!("{}  ({})", market.question, market.market_id_a);
    for (label, book) in [("A", book_a), ("B", book_b)] {
        for level in book.asks.iter().take(max_levels).rev() {
            println!("{label} ASK  {:>10.3}  {:>8.2}", level.price, level.size);
        }
        for level in book.bids.iter().take(max_levels) {
            println!("{label} BID  {:>10.3}  {:>8.2}", level.price, level.size);
        }
    }
}

fn print_json(market: &MarketMatch, book_a: &OrderBookSnapshot, book_b: &OrderBookSnapshot, max_levels: usize) -> Result<()> {
    fn levels_json(levels: &[arb_core::OrderBookLevel], max_levels: usize) -> Vec<serde_json::Value> {
        levels.iter().take(max_levels).map(|l| json!({"price": l.price, "size": l.size})).collect()
    }

    let output = json!({
        "market_id_a": market.market_id_a,
        "venue_b_slug": market.venue_b_slug,
        "venue_a": {
            "token_id": book_a.token_id,
            "bids": levels_json(&book_a.bids, max_levels),
            "asks": levels_json(&book_a.asks, max_levels),
            "crossed": book_a.is_crossed(),
        },
        "venue_b": {
            "token_id": book_b.token_id,
            "bids": levels_json(&book_b.bids, max_levels),
            "asks": levels_json(&book_b.asks, max_levels),
            "crossed": book_b.is_crossed(),
        },
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn create_ascii_bar(size: Decimal, max_size: Decimal, width: usize) -> String {
    if max_size.is_zero() {
        return " ".repeat(width);
    }
    let ratio: f64 = (size / max_size).to_string().parse().unwrap_or(0.0);
    let filled = ((ratio * width as f64) as usize).min(width);
    "█".repeat(filled) + &"░".repeat(width - filled)
}
