mod app;

use std::io;
use std::sync::Mutex;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use app::{format_count, format_pct, truncate, AppState, Focus, KeyAction, RunStatus};
use oi_screener::config::Config;
use oi_screener::run_screener;
use oi_screener::source::NseClient;
use oi_screener::types::{MoverDirection, ScreenerReport};

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> io::Result<()> {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    // stdout belongs to the terminal UI, so logs go to a file
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&cfg.log_file)?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();

    let nse = match NseClient::from_config(&cfg) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to build NSE client: {e}");
            std::process::exit(1);
        }
    };

    let mut app = AppState::new(&cfg);

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut report_state = TableState::default();

    let result = run_loop(&mut terminal, &mut app, &nse, &mut report_state).await;

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    nse: &NseClient,
    report_state: &mut TableState,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| render(f, app, report_state))?;

        let Event::Key(key) = event::read()? else { continue };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match app.handle_key(key.code) {
            KeyAction::Quit => return Ok(()),
            KeyAction::Run => run_once(terminal, app, nse, report_state).await?,
            KeyAction::Export => {
                if let Some(paths) = app.export() {
                    info!("Downloaded {} and {}", paths.report.display(), paths.movers.display());
                }
            }
            KeyAction::None => {}
        }
        report_state.select(app.selected_row);
    }
}

async fn run_once(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    nse: &NseClient,
    report_state: &mut TableState,
) -> io::Result<()> {
    let params = match app.params() {
        Ok(p) => p,
        Err(e) => {
            app.finish_run(Err(e));
            return Ok(());
        }
    };

    app.start_run();
    report_state.select(None);
    terminal.draw(|f| render(f, app, report_state))?;

    let result = run_screener(nse, nse, params).await;
    match &result {
        Ok(r) => info!("Dashboard run for {} finished with {} movers", r.date, r.movers.len()),
        Err(e) => error!("Dashboard run failed: {e}"),
    }
    app.finish_run(result);
    report_state.select(app.selected_row);
    Ok(())
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, app: &AppState, report_state: &mut TableState) {
    let area = f.area();

    // Outer vertical split: header | body | footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(0),    // body
            Constraint::Length(1), // footer
        ])
        .split(area);

    render_header(f, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(32), Constraint::Min(0)])
        .split(chunks[1]);

    render_sidebar(f, app, body[0]);
    render_main(f, app, report_state, body[1]);
    render_footer(f, chunks[2]);
}

fn render_header(f: &mut Frame, area: Rect) {
    let line = Line::from(vec![
        Span::styled(
            " Combined Open Interest Screener  ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            "stocks with significant combined OI build-up or unwinding",
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    let paragraph = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(paragraph, area);
}

fn render_sidebar(f: &mut Frame, app: &AppState, area: Rect) {
    let label = |focus: Focus, text: &'static str| {
        let style = if app.focus == focus {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };
        Span::styled(text, style)
    };

    let date_cursor = if app.focus == Focus::Date { "▏" } else { "" };
    let status = match &app.status {
        RunStatus::Idle => Span::styled("idle", Style::default().fg(Color::DarkGray)),
        RunStatus::Running => Span::styled("◌ fetching…", Style::default().fg(Color::Yellow)),
        RunStatus::Done => Span::styled("● done", Style::default().fg(Color::Green)),
        RunStatus::Error { .. } => Span::styled("✗ error", Style::default().fg(Color::Red)),
    };

    let lines = vec![
        label(Focus::Date, "Bhavcopy Date (DD-MM-YYYY)").into(),
        Line::from(format!("  {}{}", app.date_input, date_cursor)),
        Line::raw(""),
        label(Focus::Gain, "OI Gainers Threshold (%)").into(),
        Line::from(format!("  ◀ {:>4.0} ▶   (5..50)", app.gain)),
        Line::raw(""),
        label(Focus::Loss, "OI Losers Threshold (%)").into(),
        Line::from(format!("  ◀ {:>4.0} ▶   (-50..-1)", app.loss)),
        Line::raw(""),
        Line::from(vec![Span::raw("Status: "), status]),
    ];

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                " SCREENER CONTROLS ",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
    );
    f.render_widget(paragraph, area);
}

fn render_main(f: &mut Frame, app: &AppState, report_state: &mut TableState, area: Rect) {
    match (&app.status, &app.report) {
        (RunStatus::Error { message, detail }, _) => render_error(f, message, detail, area),
        (RunStatus::Running, _) => render_info(f, "Fetching F&O symbols and bhavcopy data…", area),
        (_, Some(report)) => {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(3),
                    Constraint::Min(6),
                    Constraint::Percentage(35),
                    Constraint::Length(1),
                ])
                .split(area);
            render_metrics(f, report, chunks[0]);
            render_report_table(f, report, report_state, chunks[1]);
            render_movers_table(f, report, chunks[2]);
            if let Some(notice) = &app.notice {
                f.render_widget(
                    Paragraph::new(truncate(notice, chunks[3].width as usize))
                        .style(Style::default().fg(Color::Green)),
                    chunks[3],
                );
            }
        }
        _ => render_info(f, "◀ Set parameters and press Enter to run the screener", area),
    }
}

fn render_info(f: &mut Frame, text: &str, area: Rect) {
    let paragraph = Paragraph::new(text)
        .style(Style::default().fg(Color::Cyan))
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::DarkGray)));
    f.render_widget(paragraph, area);
}

fn render_error(f: &mut Frame, message: &str, detail: &str, area: Rect) {
    let lines = vec![
        Line::from(Span::styled(
            format!("⚠ {message}"),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::raw(""),
        Line::from(Span::styled(detail.to_string(), Style::default().fg(Color::White))),
    ];
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red)),
    );
    f.render_widget(paragraph, area);
}

fn render_metrics(f: &mut Frame, report: &ScreenerReport, area: Rect) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(34),
            Constraint::Percentage(33),
            Constraint::Percentage(33),
        ])
        .split(area);

    let metrics = [
        ("Total Stocks", report.total_symbols(), Color::White),
        ("OI Gainers", report.gainers(), Color::Green),
        ("OI Losers", report.losers(), Color::Red),
    ];
    for ((title, value, color), col) in metrics.into_iter().zip(cols.iter()) {
        let paragraph = Paragraph::new(Line::from(Span::styled(
            value.to_string(),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(format!(" {title} ")),
        );
        f.render_widget(paragraph, *col);
    }
}

fn pct_color(report: &ScreenerReport, pct: f64) -> Color {
    match report.thresholds.classify(pct) {
        Some(MoverDirection::Gainer) => Color::Green,
        Some(MoverDirection::Loser) => Color::Red,
        None => Color::White,
    }
}

fn render_report_table(f: &mut Frame, report: &ScreenerReport, state: &mut TableState, area: Rect) {
    let header_cells = ["Symbol", "Combined OI", "Chg in OI", "Prev Day OI", "% Chg"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = report
        .report
        .iter()
        .map(|a| {
            Row::new(vec![
                Cell::from(truncate(&a.symbol, 14)),
                Cell::from(format_count(a.combined_open_interest)),
                Cell::from(format_count(a.combined_change_in_open_interest)),
                Cell::from(format_count(a.previous_open_interest)),
                Cell::from(format_pct(a.percent_change))
                    .style(Style::default().fg(pct_color(report, a.percent_change))),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(14),
            Constraint::Length(14),
            Constraint::Length(12),
            Constraint::Length(14),
            Constraint::Length(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                format!(" COMBINED OI SCREENER RESULTS · {} ", report.date),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
    )
    .row_highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    );

    f.render_stateful_widget(table, area, state);
}

fn render_movers_table(f: &mut Frame, report: &ScreenerReport, area: Rect) {
    let header_cells = ["Date", "Symbol", "% Chg in OI"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = report
        .movers
        .iter()
        .map(|m| {
            let color = match m.direction {
                MoverDirection::Gainer => Color::Green,
                MoverDirection::Loser => Color::Red,
            };
            Row::new(vec![
                Cell::from(m.date.to_string()).style(Style::default().fg(Color::DarkGray)),
                Cell::from(truncate(&m.symbol, 14)),
                Cell::from(format_pct(m.percent_change)).style(Style::default().fg(color)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [Constraint::Length(12), Constraint::Length(14), Constraint::Length(12)],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                " HIGH-CONVICTION OI MOVERS ",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
    );

    f.render_widget(table, area);
}

fn render_footer(f: &mut Frame, area: Rect) {
    let line = Line::from(vec![
        Span::styled(" [q] ", Style::default().fg(Color::Yellow)),
        Span::raw("quit  "),
        Span::styled("[Tab] ", Style::default().fg(Color::Yellow)),
        Span::raw("next control  "),
        Span::styled("[← →] ", Style::default().fg(Color::Yellow)),
        Span::raw("adjust threshold  "),
        Span::styled("[Enter] ", Style::default().fg(Color::Yellow)),
        Span::raw("run screener  "),
        Span::styled("[d] ", Style::default().fg(Color::Yellow)),
        Span::raw("download CSVs  "),
        Span::styled("[↑↓ / j k] ", Style::default().fg(Color::Yellow)),
        Span::raw("scroll"),
    ]);
    let paragraph = Paragraph::new(line).style(Style::default().fg(Color::White));
    f.render_widget(paragraph, area);
}
