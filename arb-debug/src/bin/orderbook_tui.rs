//! Real-Time Orderbook Terminal UI
//!
//! Live visualization of a loaded match's YES book on both venues, plus
//! the cross-venue opportunity the detector currently sees for it.
//! Runs entirely against the in-memory `SimulatedVenue` stand-in (no
//! real venue feed is in scope) — the book is periodically reseeded with
//! a fresh random top-of-book so the ladder visibly moves.
//!
//! ## Usage
//!
//! ```bash
//! orderbook-tui --matches-file market_matches.json
//! ```
//!
//! ## Keyboard Controls
//!
//! - `q` or `Ctrl-C` - Quit
//! - `p` - Pause/Resume updates
//! - `m` - Toggle metrics panel
//! - `n` / `N` - Next / previous match

use anyhow::Result;
use arb_bins::matches::load_market_matches;
use arb_bins::simulated_venue::SimulatedVenue;
use arb_core::{MarketMatch, OrderBookLevel, OrderBookSnapshot, Venue, VenueAAdapter, VenueBAdapter};
use arb_strategies::detector::{detect_maker, detect_taker, pick_best, DetectorConfig};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "orderbook-tui")]
#[command(about = "Live terminal view of a simulated match's order book", long_about = None)]
struct Args {
    /// Path to a market-matches JSON file, or a comma-separated list.
    #[arg(long, default_value = "market_matches.json")]
    matches_file: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let matches = load_market_matches(&args.matches_file)?;
    if matches.is_empty() {
        anyhow::bail!("no matches loaded from {}", args.matches_file);
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, matches);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

/// Best opportunity currently visible for the selected match, across
/// both the taker and maker evaluations (§4.6's tie-break applies).
struct OpportunitySummary {
    strategy: &'static str,
    cost: f64,
    profit_rate: f64,
    annualized_rate: Option<f64>,
}

struct App {
    matches: Vec<MarketMatch>,
    match_idx: usize,
    venue_a: SimulatedVenue,
    venue_b: SimulatedVenue,
    detector_cfg: DetectorConfig,
    paused: bool,
    tick_count: u64,
    reseed_every: u64,
    show_metrics: bool,
}

impl App {
    fn new(matches: Vec<MarketMatch>) -> Self {
        let venue_a = SimulatedVenue::seeded(&matches, Venue::A, true);
        let venue_b = SimulatedVenue::seeded(&matches, Venue::B, true);
        Self {
            matches,
            match_idx: 0,
            venue_a,
            venue_b,
            detector_cfg: DetectorConfig::default(),
            paused: false,
            tick_count: 0,
            reseed_every: 20,
            show_metrics: true,
        }
    }

    fn current_match(&self) -> &MarketMatch {
        &self.matches[self.match_idx]
    }

    fn next_match(&mut self) {
        self.match_idx = (self.match_idx + 1) % self.matches.len();
    }

    fn prev_match(&mut self) {
        self.match_idx = (self.match_idx + self.matches.len() - 1) % self.matches.len();
    }

    fn tick(&mut self) {
        if self.paused {
            return;
        }
        self.tick_count += 1;
        if self.tick_count % self.reseed_every == 0 {
            self.venue_a = SimulatedVenue::seeded(&self.matches, Venue::A, true);
            self.venue_b = SimulatedVenue::seeded(&self.matches, Venue::B, true);
        }
    }

    fn yes_books(&self) -> Option<(OrderBookSnapshot, OrderBookSnapshot)> {
        let m = self.current_match();
        let book_a = VenueAAdapter::fetch_book(&self.venue_a, &m.yes_token_a).ok()?;
        let book_b = VenueBAdapter::fetch_book(&self.venue_b, &m.yes_token_b).ok()?;
        Some((book_a, book_b))
    }

    fn best_opportunity(&self) -> Option<OpportunitySummary> {
        let (yes_a, yes_b) = self.yes_books()?;
        let now = arb_strategies::book_fetcher::unix_now();
        let mut candidates = detect_taker(self.current_match(), &yes_a, &yes_b, now, &self.detector_cfg);
        candidates.extend(detect_maker(self.current_match(), &yes_a, &yes_b, now, &self.detector_cfg));
        let best = pick_best(&candidates)?;
        Some(OpportunitySummary {
            strategy: best.strategy.as_str(),
            cost: best.cost,
            profit_rate: best.profit_rate,
            annualized_rate: best.annualized_rate,
        })
    }
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, matches: Vec<MarketMatch>) -> Result<()> {
    let mut app = App::new(matches);
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, &app))?;

        let timeout = tick_rate.checked_sub(last_tick.elapsed()).unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Char('p') => app.paused = !app.paused,
                    KeyCode::Char('m') => app.show_metrics = !app.show_metrics,
                    KeyCode::Char('n') => app.next_match(),
                    KeyCode::Char('N') => app.prev_match(),
                    _ => {}
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick();
            last_tick = Instant::now();
        }
    }
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(10), Constraint::Length(3)])
        .split(f.area());

    render_header(f, chunks[0], app);
    render_orderbook(f, chunks[1], app);
    render_footer(f, chunks[2]);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let market = app.current_match();
    let status = if app.paused { "PAUSED" } else { "LIVE" };
    let status_color = if app.paused { Color::Yellow } else { Color::Green };

    let title = Line::from(vec![
        Span::styled("ARB ORDERBOOK VIEWER", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(" | "),
        Span::styled(status, Style::default().fg(status_color).add_modifier(Modifier::BOLD)),
        Span::raw(format!(" | match {}/{}", app.match_idx + 1, app.matches.len())),
    ]);
    let info = Line::from(vec![
        Span::raw(market.question.clone()),
        Span::raw(format!("  (market_id_a={}  slug_b={})", market.market_id_a, market.venue_b_slug)),
    ]);

    let block = Block::default().borders(Borders::ALL).style(Style::default().fg(Color::White));
    let paragraph = Paragraph::new(vec![title, info]).block(block).alignment(Alignment::Center);
    f.render_widget(paragraph, area);
}

fn render_orderbook(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(area);

    render_ladder(f, chunks[0], app);
    if app.show_metrics {
        render_metrics(f, chunks[1], app);
    }
}

fn render_ladder(f: &mut Frame, area: Rect, app: &App) {
    let Some((book_a, book_b)) = app.yes_books() else {
        let paragraph = Paragraph::new("no book available for this match")
            .block(Block::default().title("Orderbook").borders(Borders::ALL));
        f.render_widget(paragraph, area);
        return;
    };

    let max_size = book_a
        .asks
        .iter()
        .chain(book_a.bids.iter())
        .chain(book_b.asks.iter())
        .chain(book_b.bids.iter())
        .map(|l| l.size)
        .max()
        .unwrap_or_default();

    let mut items = Vec::new();
    for level in book_b.asks.iter().take(5).rev() {
        items.push(level_item("B ASK", level, max_size, Color::Red));
    }
    for level in book_a.asks.iter().take(5).rev() {
        items.push(level_item("A ASK", level, max_size, Color::Red));
    }
    items.push(ListItem::new(Line::from(vec![
        Span::raw("──── "),
        Span::styled("venue A bid vs venue B ask drives the cross", Style::default().fg(Color::Yellow)),
        Span::raw(" ────"),
    ])));
    for level in book_a.bids.iter().take(5) {
        items.push(level_item("A BID", level, max_size, Color::Green));
    }
    for level in book_b.bids.iter().take(5) {
        items.push(level_item("B BID", level, max_size, Color::Green));
    }

    let list = List::new(items)
        .block(Block::default().title("YES Orderbook (A & B, top 5)").borders(Borders::ALL).border_style(Style::default().fg(Color::White)))
        .style(Style::default().fg(Color::White));
    f.render_widget(list, area);
}

fn level_item(label: &str, level: &OrderBookLevel, max_size: rust_decimal::Decimal, color: Color) -> ListItem<'static> {
    let bar = create_bar(level.size, max_size, 20);
    let line = Line::from(vec![
        Span::styled(format!("{label} "), Style::default().fg(color)),
        Span::styled(format!("{:>8.3}", level.price), Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        Span::styled(bar, Style::default().fg(color)),
        Span::raw("  "),
        Span::styled(format!("{:.2}", level.size), Style::default().fg(Color::White)),
    ]);
    ListItem::new(line)
}

fn render_metrics(f: &mut Frame, area: Rect, app: &App) {
    let mut text = vec![Line::from(vec![Span::styled("BEST OPPORTUNITY", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))]), Line::from("")];

    match app.best_opportunity() {
        Some(opp) => {
            text.push(Line::from(vec![Span::raw("Strategy: "), Span::styled(opp.strategy, Style::default().fg(Color::White))]));
            text.push(Line::from(vec![Span::raw("Cost: "), Span::styled(format!("{:.4}", opp.cost), Style::default().fg(Color::Yellow))]));
            text.push(Line::from(vec![Span::raw("Profit rate: "), Span::styled(format!("{:.2}%", opp.profit_rate * 100.0), Style::default().fg(Color::Green))]));
            let annualized = match opp.annualized_rate {
                Some(rate) => format!("{:.1}%", rate),
                None => "n/a (no cutoff)".to_string(),
            };
            text.push(Line::from(vec![Span::raw("Annualized: "), Span::styled(annualized, Style::default().fg(Color::Magenta))]));
        }
        None => text.push(Line::from(Span::styled("none this tick", Style::default().fg(Color::DarkGray)))),
    }

    text.push(Line::from(""));
    text.push(Line::from(vec![Span::styled("STATISTICS", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))]));
    text.push(Line::from(vec![Span::raw("Ticks: "), Span::styled(format!("{}", app.tick_count), Style::default().fg(Color::White))]));
    text.push(Line::from(vec![Span::raw("Reseeds every: "), Span::styled(format!("{} ticks", app.reseed_every), Style::default().fg(Color::White))]));

    let paragraph = Paragraph::new(text)
        .block(Block::default().title("Metrics").borders(Borders::ALL).border_style(Style::default().fg(Color::White)))
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn render_footer(f: &mut Frame, area: Rect) {
    let controls = Line::from(vec![
        Span::styled("Controls: ", Style::default().fg(Color::Cyan)),
        Span::raw("[Q]uit "),
        Span::raw("[P]ause "),
        Span::raw("[M]etrics "),
        Span::raw("[N]ext match "),
        Span::raw("shift+[N] prev match"),
    ]);
    let paragraph = Paragraph::new(controls).block(Block::default().borders(Borders::ALL)).alignment(Alignment::Center);
    f.render_widget(paragraph, area);
}

/// Create a horizontal bar chart for size visualization.
fn create_bar(size: rust_decimal::Decimal, max_size: rust_decimal::Decimal, width: usize) -> String {
    if max_size.is_zero() {
        return " ".repeat(width);
    }
    let ratio: f64 = (size / max_size).to_string().parse().unwrap_or(0.0);
    let filled = ((ratio * width as f64) as usize).min(width);
    "█".repeat(filled) + &"░".repeat(width - filled)
}
