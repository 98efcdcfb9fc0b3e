use chart_data::debounce::{self, Debouncer};
use chart_data::{ChartConfig, ChartEngine, ChartSnapshot, ChartStatus, StatusKind, Timeframe};
use chrono::DateTime;
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{
        Block, BorderType, Borders, Paragraph,
        canvas::{Canvas, Line as CanvasLine, Rectangle},
    },
};
use std::{io, sync::Arc, time::Duration};
use tokio::sync::{mpsc, watch};
use tracing::info;

const GREEN: Color = Color::Rgb(0, 255, 127);
const RED: Color = Color::Rgb(255, 69, 58);
const GOLD: Color = Color::Rgb(255, 215, 0);
const GREY: Color = Color::Rgb(128, 128, 150);
const PANEL_BG: Color = Color::Rgb(15, 15, 25);

/// Application state: the engine plus locally cached copies of the last
/// snapshot and status pulled from its watch channels.
struct App {
    engine: ChartEngine,
    snapshots: watch::Receiver<ChartSnapshot>,
    statuses: watch::Receiver<ChartStatus>,
    snapshot: ChartSnapshot,
    status: ChartStatus,
    debouncer: Debouncer,
    redraws: mpsc::Receiver<()>,
}

impl App {
    fn new(engine: ChartEngine) -> Self {
        let snapshots = engine.subscribe();
        let statuses = engine.subscribe_status();
        let snapshot = engine.snapshot();
        let status = engine.status();
        let (debouncer, redraws) = Debouncer::new(debounce::DEFAULT_QUIET);

        Self {
            engine,
            snapshots,
            statuses,
            snapshot,
            status,
            debouncer,
            redraws,
        }
    }

    fn absorb_updates(&mut self) {
        if self.snapshots.has_changed().unwrap_or(false) {
            self.snapshot = self.snapshots.borrow_and_update().clone();
        }
        if self.statuses.has_changed().unwrap_or(false) {
            self.status = self.statuses.borrow_and_update().clone();
        }
    }

    fn select_timeframe(&self, digit: char) {
        let index = (digit as usize).saturating_sub('1' as usize);
        if let Some(timeframe) = Timeframe::ALL.get(index) {
            self.engine.set_timeframe(*timeframe);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging()?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Start the data pipeline
    let mut engine = ChartEngine::new(ChartConfig::from_env());
    engine.start();
    let mut app = App::new(engine);
    info!("terminal chart started");

    // Run TUI
    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    app.engine.stop();
    res?;

    Ok(())
}

// Initialise an INFO `Subscriber` for `Tracing` logs and install it as the
// global default. Logs go to a file because the alternate screen owns stdout.
fn init_logging() -> io::Result<()> {
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("chart-tui.log")?;

    tracing_subscriber::fmt()
        // Filter messages based on the INFO level
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(Arc::new(log_file))
        .with_ansi(false)
        // Install this Tracing subscriber as global default
        .init();

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);

    loop {
        app.absorb_updates();

        // A settled resize burst forces a full clean repaint.
        if app.redraws.try_recv().is_ok() {
            terminal.clear()?;
        }

        terminal.draw(|f| ui(f, app))?;

        if event::poll(tick_rate)? {
            match event::read()? {
                Event::Key(key) => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Char(digit @ '1'..='6') => app.select_timeframe(digit),
                    _ => {}
                },
                Event::Resize(_, _) => app.debouncer.trigger(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(10),
            Constraint::Length(4),
        ])
        .split(f.area());

    render_status_bar(f, chunks[0], app);
    render_chart(f, chunks[1], app);
    render_stats(f, chunks[2], app);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let (symbol, color) = match app.status.kind {
        StatusKind::Connected => ("●", GREEN),
        StatusKind::Connecting => ("◌", GOLD),
        StatusKind::Error => ("○", RED),
    };

    let title = Span::styled(
        " ◆ BTC/USD LIVE CHART ◆ ",
        Style::default().fg(GOLD).add_modifier(Modifier::BOLD),
    );
    let status = Span::styled(
        format!(" {} {} ", symbol, app.status.message),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    );
    let help = Span::styled(" [1-6] Timeframe  [Q] Quit ", Style::default().fg(GREY));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Double)
        .border_style(Style::default().fg(Color::Rgb(138, 43, 226)))
        .style(Style::default().bg(Color::Rgb(18, 18, 28)));

    let paragraph = Paragraph::new(Line::from(vec![title, status, help]))
        .block(block)
        .alignment(Alignment::Center);

    f.render_widget(paragraph, area);
}

fn render_chart(f: &mut Frame, area: Rect, app: &App) {
    let candles = &app.snapshot.candles;

    let title = Line::from(vec![
        Span::styled(
            format!(" {} ", app.snapshot.timeframe),
            Style::default().fg(GOLD).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            "CANDLES",
            Style::default()
                .fg(Color::Rgb(255, 255, 255))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!(" ({}) ", candles.len()), Style::default().fg(GREY)),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(100, 255, 218)))
        .title_top(title.alignment(Alignment::Center))
        .style(Style::default().bg(PANEL_BG));

    if candles.is_empty() {
        let waiting = Paragraph::new(Text::from(vec![
            Line::from(""),
            Line::from(Span::styled(
                "⏳ Waiting for candle data...",
                Style::default().fg(GREY).add_modifier(Modifier::ITALIC),
            )),
        ]))
        .block(block)
        .alignment(Alignment::Center);

        f.render_widget(waiting, area);
        return;
    }

    let range = app.snapshot.price_range;
    let (y_min, y_max) = if range.span() > 0.0 {
        (range.min, range.max)
    } else {
        (range.min - 1.0, range.max + 1.0)
    };
    // Wicks and bodies vanish at zero height, so floor the body size to a
    // sliver of the visible band.
    let min_body = (y_max - y_min) * 0.004;

    let canvas = Canvas::default()
        .block(block)
        .x_bounds([0.0, candles.len() as f64])
        .y_bounds([y_min, y_max])
        .paint(move |ctx| {
            for (i, candle) in candles.iter().enumerate() {
                let color = if candle.is_bullish() { GREEN } else { RED };
                let x = i as f64 + 0.5;

                ctx.draw(&CanvasLine {
                    x1: x,
                    y1: candle.low,
                    x2: x,
                    y2: candle.high,
                    color,
                });

                let body_bottom = candle.open.min(candle.close);
                let body_top = candle.open.max(candle.close);
                ctx.draw(&Rectangle {
                    x: i as f64 + 0.15,
                    y: body_bottom,
                    width: 0.7,
                    height: (body_top - body_bottom).max(min_body),
                    color,
                });
            }
        });

    f.render_widget(canvas, area);
}

fn render_stats(f: &mut Frame, area: Rect, app: &App) {
    let (price, change, change_color, volume) = match app.snapshot.spot {
        Some(spot) => (
            format!("${:.2}", spot.price),
            format!(
                "{} {:+.2}%",
                if spot.change_24h >= 0.0 { "▲" } else { "▼" },
                spot.change_24h
            ),
            if spot.change_24h >= 0.0 { GREEN } else { RED },
            format!("${:.0}", spot.volume_24h),
        ),
        None => (
            "$--.--".to_string(),
            "--.--%".to_string(),
            GREY,
            "$--".to_string(),
        ),
    };

    let updated = app
        .snapshot
        .candles
        .last()
        .and_then(|candle| DateTime::from_timestamp_millis(candle.timestamp))
        .map(|time| time.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());

    let stats_line = Line::from(vec![
        Span::styled(" Price: ", Style::default().fg(GREY)),
        Span::styled(price, Style::default().fg(GOLD).add_modifier(Modifier::BOLD)),
        Span::styled("  24h: ", Style::default().fg(GREY)),
        Span::styled(
            change,
            Style::default()
                .fg(change_color)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled("  24h Vol: ", Style::default().fg(GREY)),
        Span::styled(volume, Style::default().fg(Color::Rgb(100, 200, 255))),
        Span::styled("  Updated: ", Style::default().fg(GREY)),
        Span::styled(updated, Style::default().fg(Color::Rgb(100, 149, 237))),
    ]);

    let help_line = Line::from(Span::styled(
        " [1] 1m  [2] 5m  [3] 15m  [4] 1h  [5] 4h  [6] 1d ",
        Style::default().fg(GREY),
    ));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(100, 149, 237)))
        .style(Style::default().bg(PANEL_BG));

    let paragraph = Paragraph::new(Text::from(vec![stats_line, help_line]))
        .block(block)
        .alignment(Alignment::Center);

    f.render_widget(paragraph, area);
}
