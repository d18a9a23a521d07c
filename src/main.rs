use std::io;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols;
use ratatui::widgets::{
    Axis, Bar, BarChart, BarGroup, Block, Borders, Chart, Clear, Dataset, GraphType, Paragraph,
};

use wc22_weather::artifacts;
use wc22_weather::combined::{CombinedRecord, MissingCount};
use wc22_weather::config::DashboardConfig;
use wc22_weather::state::{DashboardState, Range};
use wc22_weather::view::{BoxStats, COLOR_BUCKETS, DashboardView, MissingnessPanel};

const BUCKET_COLORS: [Color; COLOR_BUCKETS] = [
    Color::Blue,
    Color::Cyan,
    Color::Green,
    Color::Yellow,
    Color::Red,
];

struct App {
    rows: &'static [CombinedRecord],
    missingness: Option<&'static [MissingCount]>,
    state: DashboardState,
    view: DashboardView,
    should_quit: bool,
}

impl App {
    fn new(rows: &'static [CombinedRecord], missingness: Option<&'static [MissingCount]>) -> Self {
        let mut state = DashboardState::new(rows);
        state.push_log(format!("[INFO] loaded {} matches", rows.len()));
        if missingness.is_none() {
            state.push_log("[WARN] missingness summary not found; run preprocess first");
        }
        let view = DashboardView::compute(rows, missingness, &state);
        Self {
            rows,
            missingness,
            state,
            view,
            should_quit: false,
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                return;
            }
            KeyCode::Tab => self.state.cycle_focus(),
            KeyCode::Char('h') | KeyCode::Left => self.state.nudge(-1),
            KeyCode::Char('l') | KeyCode::Right => self.state.nudge(1),
            KeyCode::Char('m') => {
                self.state.cycle_metric();
                let label = self.state.metric.label();
                self.state.push_log(format!("[INFO] metric: {label}"));
            }
            KeyCode::Char('s') => self.state.toggle_table(),
            KeyCode::Char('r') => {
                self.state.reset_filters();
                self.state.push_log("[INFO] filters reset");
            }
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            _ => return,
        }
        self.recompute();
    }

    fn recompute(&mut self) {
        self.view = DashboardView::compute(self.rows, self.missingness, &self.state);
    }
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let config = DashboardConfig::from_env();
    let rows = artifacts::cached_dataset(&config.data_path)?;
    let missingness = artifacts::cached_missingness(&config.missingness_path)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let mut app = App::new(rows, missingness);
    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res.context("dashboard terminated")
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(app))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    render_body(frame, chunks[1], app);

    let footer = Paragraph::new(
        "Tab Focus | ←/→ Adjust | m Metric | s Summary | r Reset | ? Help | q Quit",
    )
    .block(Block::default().borders(Borders::TOP));
    frame.render_widget(footer, chunks[2]);

    if app.state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(app: &App) -> String {
    let state = &app.state;
    let line1 = format!(
        "WC22 WEATHER | Metric: {} | Showing {} matches within selected range",
        state.metric.label(),
        app.view.count
    );
    let line2 = format!(
        "Temp {} | Humidity {} | Editing: {}",
        range_text(state.temp_range),
        range_text(state.humidity_range),
        state.focus.label()
    );
    format!("{line1}\n{line2}")
}

fn range_text(range: Range) -> String {
    format!("{:.1}..{:.1}", range.lo, range.hi)
}

fn render_body(frame: &mut Frame, area: Rect, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(50),
            Constraint::Percentage(30),
            Constraint::Min(5),
        ])
        .split(area);

    let charts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[0]);
    render_score_chart(frame, charts[0], &app.view);
    render_weather_chart(frame, charts[1], app);

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(rows[1]);
    render_missingness(frame, middle[0], &app.view.missingness);
    let boxes = Paragraph::new(boxplot_text(&app.view, middle[1].width.saturating_sub(2)))
        .block(
            Block::default()
                .title(format!("{} by temperature group", app.view.metric.label()))
                .borders(Borders::ALL),
        );
    frame.render_widget(boxes, middle[1]);

    let console_area = if app.view.summary.is_some() {
        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(rows[2]);
        let summary = Paragraph::new(summary_text(&app.view))
            .block(Block::default().title("Summary").borders(Borders::ALL));
        frame.render_widget(summary, bottom[0]);
        bottom[1]
    } else {
        rows[2]
    };
    let console_height = console_area.height.saturating_sub(2) as usize;
    let console = Paragraph::new(console_text(&app.state, console_height))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, console_area);
}

fn render_score_chart(frame: &mut Frame, area: Rect, view: &DashboardView) {
    let (y_lo, y_hi) = padded_bounds(view.value_range);
    let mut datasets = vec![
        Dataset::default()
            .name("matches")
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(Color::Magenta))
            .data(&view.score_points),
    ];
    if let Some(fit) = view.trend {
        datasets.push(
            Dataset::default()
                .name(format!("trend {:+.2}x", fit.slope))
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::White))
                .data(&view.trend_line),
        );
    }

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .title(format!("Climate impact vs {}", view.metric.label()))
                .borders(Borders::ALL),
        )
        .x_axis(
            Axis::default()
                .title("Climate Impact Score (0-1)")
                .bounds([0.0, 1.0])
                .labels(axis_labels(0.0, 1.0)),
        )
        .y_axis(
            Axis::default()
                .title(view.metric.label())
                .bounds([y_lo, y_hi])
                .labels(axis_labels(y_lo, y_hi)),
        );
    frame.render_widget(chart, area);
}

fn render_weather_chart(frame: &mut Frame, area: Rect, app: &App) {
    let mut buckets = vec![Vec::new(); COLOR_BUCKETS];
    for point in &app.view.weather_points {
        buckets[point.bucket].push((point.temp, point.humidity));
    }
    let datasets = buckets
        .iter()
        .zip(BUCKET_COLORS)
        .filter(|(points, _)| !points.is_empty())
        .map(|(points, color)| {
            Dataset::default()
                .marker(symbols::Marker::Dot)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(color))
                .data(points)
        })
        .collect::<Vec<_>>();

    let (x_lo, x_hi) = padded_bounds(Some(app.state.temp_bounds));
    let (y_lo, y_hi) = padded_bounds(Some(app.state.humidity_bounds));
    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .title(format!(
                    "Temperature vs humidity (colour: {}, cold→warm)",
                    app.view.metric.label()
                ))
                .borders(Borders::ALL),
        )
        .x_axis(
            Axis::default()
                .title("Temperature")
                .bounds([x_lo, x_hi])
                .labels(axis_labels(x_lo, x_hi)),
        )
        .y_axis(
            Axis::default()
                .title("Humidity")
                .bounds([y_lo, y_hi])
                .labels(axis_labels(y_lo, y_hi)),
        );
    frame.render_widget(chart, area);
}

fn render_missingness(frame: &mut Frame, area: Rect, panel: &MissingnessPanel) {
    let block = Block::default().title("Missing values").borders(Borders::ALL);
    match panel {
        MissingnessPanel::Unavailable => {
            let warn = Paragraph::new("Missingness summary not found. Run preprocess first.")
                .style(Style::default().fg(Color::Yellow))
                .block(block);
            frame.render_widget(warn, area);
        }
        MissingnessPanel::NoneMissing => {
            let info = Paragraph::new("No missing values detected.")
                .style(Style::default().fg(Color::Green))
                .block(block);
            frame.render_widget(info, area);
        }
        MissingnessPanel::Bars(counts) => {
            let bars = counts
                .iter()
                .map(|(column, count)| {
                    Bar::default()
                        .value(*count)
                        .label(Line::from(column.clone()))
                        .text_value(count.to_string())
                        .style(Style::default().fg(Color::Red))
                })
                .collect::<Vec<_>>();
            let chart = BarChart::default()
                .block(block)
                .data(BarGroup::default().bars(&bars))
                .direction(Direction::Horizontal)
                .bar_width(1)
                .bar_gap(0)
                .group_gap(0);
            frame.render_widget(chart, area);
        }
    }
}

fn padded_bounds(range: Option<Range>) -> (f64, f64) {
    match range {
        Some(r) if r.width() > 0.0 => (r.lo, r.hi),
        Some(r) => (r.lo - 1.0, r.hi + 1.0),
        None => (0.0, 1.0),
    }
}

fn axis_labels(lo: f64, hi: f64) -> Vec<Span<'static>> {
    let mid = (lo + hi) / 2.0;
    vec![
        Span::raw(format!("{lo:.1}")),
        Span::raw(format!("{mid:.1}")),
        Span::raw(format!("{hi:.1}")),
    ]
}

fn boxplot_text(view: &DashboardView, width: u16) -> String {
    let Some(scale) = view.value_range else {
        return "No matches within selected range".to_string();
    };
    let track = (width as usize).saturating_sub(12).max(10);
    view.boxes
        .iter()
        .map(|b| match &b.stats {
            Some(stats) => {
                let mut line = format!(
                    "{:<5} {}",
                    b.group.label(),
                    box_track(stats, &b.fliers, scale, track)
                );
                line.push_str(&format!(
                    "\n      n={} q1={:.2} median={:.2} q3={:.2} fliers={}",
                    stats.n,
                    stats.q1,
                    stats.median,
                    stats.q3,
                    b.fliers.len()
                ));
                line
            }
            None => format!("{:<5} no data", b.group.label()),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn box_track(stats: &BoxStats, fliers: &[f64], scale: Range, width: usize) -> String {
    let pos = |v: f64| {
        if scale.width() <= 0.0 {
            return width / 2;
        }
        let frac = ((v - scale.lo) / scale.width()).clamp(0.0, 1.0);
        ((frac * (width - 1) as f64).round() as usize).min(width - 1)
    };
    let (lo, hi) = (pos(stats.whisker_lo), pos(stats.whisker_hi));
    let (q1, q3) = (pos(stats.q1), pos(stats.q3));
    let mut cells = vec![' '; width];
    for cell in &mut cells[lo.min(hi)..=lo.max(hi)] {
        *cell = '─';
    }
    for cell in &mut cells[q1.min(q3)..=q1.max(q3)] {
        *cell = '█';
    }
    cells[lo] = '├';
    cells[hi] = '┤';
    cells[pos(stats.median)] = '┃';
    for flier in fliers {
        cells[pos(*flier)] = '•';
    }
    cells.into_iter().collect()
}

fn summary_text(view: &DashboardView) -> Text<'static> {
    let mut lines = vec![Line::from(Span::styled(
        format!(
            "{:<22}{:>6}{:>9}{:>9}{:>9}{:>9}{:>9}",
            "column", "count", "mean", "std", "min", "50%", "max"
        ),
        Style::default().add_modifier(Modifier::BOLD),
    ))];
    for (column, describe) in view.summary.iter().flatten() {
        let line = match describe {
            Some(d) => format!(
                "{:<22}{:>6}{:>9.2}{:>9.2}{:>9.2}{:>9.2}{:>9.2}",
                column, d.count, d.mean, d.std, d.min, d.q50, d.max
            ),
            None => format!("{column:<22}{:>6}", 0),
        };
        lines.push(Line::from(line));
    }
    Text::from(lines)
}

fn console_text(state: &DashboardState, visible: usize) -> String {
    if state.logs.is_empty() {
        return "No messages yet".to_string();
    }
    let skip = state.logs.len().saturating_sub(visible.max(1));
    state
        .logs
        .iter()
        .skip(skip)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "WC22 Weather - Help",
        "",
        "Filters:",
        "  Tab          Cycle bound (temp min/max, humidity min/max)",
        "  ←/→ or h/l   Move the selected bound",
        "  r            Reset to full data range",
        "",
        "View:",
        "  m            Cycle metric",
        "  s            Toggle summary table",
        "  ?            Toggle help",
        "  q            Quit",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
