use std::collections::VecDeque;
use std::io;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Axis, Block, Borders, Chart, Dataset, Paragraph};
use ratatui::Terminal;
use wican_core::{Engine, GatewayClient, GatewayData, SnapshotStore};

/// Series are created for numeric PIDs as the car config exposes them,
/// first come first charted.
const MAX_SERIES: usize = 8;

const SERIES_COLORS: [Color; MAX_SERIES] = [
    Color::Yellow,
    Color::Cyan,
    Color::Green,
    Color::Magenta,
    Color::Blue,
    Color::Red,
    Color::LightYellow,
    Color::LightGreen,
];

struct PidSeries {
    key: String,
    label: String,
    color: Color,
    points: VecDeque<(f64, f64)>,
}

impl PidSeries {
    fn new(key: &str, unit: &str, color: Color) -> Self {
        let label = if unit == "none" || unit.is_empty() {
            key.to_string()
        } else {
            format!("{key} ({unit})")
        };
        Self {
            key: key.to_string(),
            label,
            color,
            points: VecDeque::new(),
        }
    }

    fn push(&mut self, x: f64, y: f64, window_sec: f64) {
        self.points.push_back((x, y));
        while let Some((old_x, _)) = self.points.front() {
            if x - old_x > window_sec {
                self.points.pop_front();
            } else {
                break;
            }
        }
    }

    fn bounds(&self) -> [f64; 2] {
        if self.points.is_empty() {
            return [0.0, 1.0];
        }
        let mut min = f64::MAX;
        let mut max = f64::MIN;
        for (_, y) in &self.points {
            min = min.min(*y);
            max = max.max(*y);
        }
        if (max - min).abs() < f64::EPSILON {
            [min - 1.0, max + 1.0]
        } else {
            let pad = (max - min) * 0.1;
            [min - pad, max + pad]
        }
    }
}

struct ViewerState {
    start: Instant,
    latest: Option<GatewayData>,
    available: bool,
    stale: bool,
    ecu_online: bool,
    last_update: Option<chrono::DateTime<chrono::Utc>>,
    waiting: Option<String>,
    series: Vec<PidSeries>,
}

impl ViewerState {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            latest: None,
            available: false,
            stale: false,
            ecu_online: false,
            last_update: None,
            waiting: None,
            series: Vec::new(),
        }
    }

    fn update<C: GatewayClient, S: SnapshotStore>(
        &mut self,
        engine: &Engine<C, S>,
        data: GatewayData,
        window_sec: f64,
    ) {
        let t = self.start.elapsed().as_secs_f64();
        for (key, entry) in &data.pid {
            let Some(value) = entry.value.as_ref().and_then(|v| v.as_f64()) else {
                continue;
            };
            let idx = match self.series.iter().position(|s| s.key == *key) {
                Some(idx) => idx,
                None if self.series.len() < MAX_SERIES => {
                    let color = SERIES_COLORS[self.series.len()];
                    self.series.push(PidSeries::new(key, &entry.unit, color));
                    self.series.len() - 1
                }
                None => continue,
            };
            self.series[idx].push(t, value, window_sec);
        }

        self.available = engine.is_available();
        self.stale = engine.is_stale();
        self.ecu_online = engine.ecu_online();
        self.last_update = engine.last_successful_update();
        self.waiting = None;
        self.latest = Some(data);
    }

    fn note_not_ready(&mut self, message: String) {
        self.waiting = Some(message);
    }
}

pub async fn run_viewer<C: GatewayClient, S: SnapshotStore>(
    engine: &mut Engine<C, S>,
    window_sec: f64,
) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut state = ViewerState::new();
    let mut next_tick = Instant::now();

    let run_result = async {
        loop {
            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => break,
                        _ => {}
                    }
                }
            }

            if Instant::now() >= next_tick {
                match engine.poll().await {
                    Ok(data) => state.update(engine, data, window_sec),
                    Err(err) => state.note_not_ready(err.to_string()),
                }
                next_tick = Instant::now() + engine.config().poll_interval;
            }

            terminal.draw(|frame| draw_ui(frame.size(), frame, &state, window_sec))?;
        }

        Ok::<(), anyhow::Error>(())
    }
    .await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    run_result
}

fn draw_ui(area: Rect, frame: &mut ratatui::Frame<'_>, state: &ViewerState, window_sec: f64) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(0)])
        .split(area);

    frame.render_widget(render_header(state, window_sec), rows[0]);

    let chart_rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
        ])
        .split(rows[1]);

    let mut idx = 0;
    for row_area in chart_rows.iter().copied() {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(row_area);

        for col in cols.iter().copied() {
            if idx < state.series.len() {
                render_pid_chart(
                    frame,
                    col,
                    &state.series[idx],
                    state.start.elapsed().as_secs_f64(),
                    window_sec,
                );
            } else {
                frame.render_widget(Paragraph::new(Line::from(" ")), col);
            }
            idx += 1;
        }
    }
}

fn render_header(state: &ViewerState, window_sec: f64) -> Paragraph<'static> {
    let mut lines = Vec::new();

    if let Some(message) = &state.waiting {
        lines.push(Line::from(vec![
            Span::styled(
                "WiCAN Live Viewer  ",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!("waiting for gateway: {message}")),
        ]));
    }

    if let Some(data) = &state.latest {
        let summary = format!(
            "available={} stale={} ecu_link={} last_ok={}",
            state.available,
            state.stale,
            if state.ecu_online { "online" } else { "offline" },
            state
                .last_update
                .map(|ts| ts.to_rfc3339())
                .unwrap_or_else(|| "never".to_string()),
        );
        let device = format!(
            "device={} fw={} ip={}  window={}s  (press 'q' to quit)",
            data.device_id().unwrap_or("unknown"),
            data.status
                .get("fw_version")
                .and_then(|v| v.as_str())
                .unwrap_or("n/a"),
            data.status
                .get("sta_ip")
                .and_then(|v| v.as_str())
                .unwrap_or("n/a"),
            window_sec as u64,
        );
        lines.push(Line::from(vec![
            Span::styled(
                "WiCAN Live Viewer  ",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::raw(summary),
        ]));
        lines.push(Line::from(device));
    } else if state.waiting.is_none() {
        lines.push(Line::from("Waiting first poll..."));
    }

    Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Status"))
}

fn render_pid_chart(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    series: &PidSeries,
    now_sec: f64,
    window_sec: f64,
) {
    let points: Vec<(f64, f64)> = series.points.iter().copied().collect();

    let x_min = (now_sec - window_sec).max(0.0);
    let x_max = now_sec.max(window_sec);
    let x_mid = (x_min + x_max) / 2.0;
    let y_bounds = series.bounds();

    let dataset = Dataset::default()
        .name(series.label.clone())
        .marker(symbols::Marker::Braille)
        .graph_type(ratatui::widgets::GraphType::Line)
        .style(Style::default().fg(series.color))
        .data(&points);

    let chart = Chart::new(vec![dataset])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(series.label.clone()),
        )
        .x_axis(
            Axis::default()
                .title("time (s)")
                .style(Style::default().fg(Color::Gray))
                .bounds([x_min, x_max])
                .labels(vec![
                    Span::raw(format!("{x_min:.0}")),
                    Span::raw(format!("{x_mid:.0}")),
                    Span::raw(format!("{x_max:.0}")),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("value")
                .style(Style::default().fg(Color::Gray))
                .bounds(y_bounds)
                .labels(vec![
                    Span::raw(format!("{:.1}", y_bounds[0])),
                    Span::raw(format!("{:.1}", (y_bounds[0] + y_bounds[1]) / 2.0)),
                    Span::raw(format!("{:.1}", y_bounds[1])),
                ]),
        );

    frame.render_widget(chart, area);
}
