//! Ratatui-based terminal UI.
//!
//! Left: the event list. Right: the overlaid strain chart above the settings
//! panel (time range, whitening, band-pass, per-detector offset and inversion).
//! Every settings change queues a render on the pipeline worker; the UI thread
//! never blocks on the network.

use std::io;
use std::path::Path;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};

use crate::app::pipeline::{CancelToken, Pipeline};
use crate::domain::gps::format_utc;
use crate::domain::{
    ArchiveConfig, BAND_MAX_HZ, BAND_MIN_HZ, Detector, DisplayParams, HALF_WIDTH_MAX, HALF_WIDTH_MIN,
    OFFSET_LIMIT_MS, OFFSET_STEP_MS,
};
use crate::error::AppError;

mod plotters_chart;
pub mod worker;

use plotters_chart::{ChartTrace, StrainChart, detector_color, legend_color};
use worker::{Job, Rendered, WorkerHandle, WorkerMsg, spawn_worker};

const EXPORT_DIR: &str = "export";
const DEBUG_DIR: &str = "debug";
const DEFAULT_EVENT: &str = "GW150914";

/// Half-width step: the time-range control moves in 0.1 s.
const HALF_WIDTH_STEP: f64 = 0.05;
const BAND_LOW_STEP: f64 = 5.0;
const BAND_HIGH_STEP: f64 = 10.0;
/// Offset step with Shift held (milliseconds).
const OFFSET_COARSE_STEP_MS: f64 = 1.0;

/// Start the TUI.
pub fn run(config: ArchiveConfig, initial_event: Option<String>, params: DisplayParams) -> Result<(), AppError> {
    let pipeline = Pipeline::from_config(&config)?;
    let worker = spawn_worker(pipeline);

    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    let mut app = App::new(worker, initial_event, params, config.offline);
    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(4, format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Events,
    Settings,
}

/// One adjustable row of the settings panel.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Setting {
    TimeRange,
    Whiten,
    BandLow,
    BandHigh,
    Offset(Detector),
    Invert(Detector),
}

struct App {
    worker: WorkerHandle,
    offline: bool,
    events: Vec<String>,
    event_state: ListState,
    focus: Focus,
    settings_index: usize,
    params: DisplayParams,
    /// Event of the latest render request.
    requested_event: Option<String>,
    /// Generation of the latest render request; older results are dropped.
    generation: u64,
    cancel: CancelToken,
    rendering: bool,
    current: Option<Rendered>,
    status: String,
}

impl App {
    fn new(worker: WorkerHandle, initial_event: Option<String>, params: DisplayParams, offline: bool) -> Self {
        let mut app = Self {
            worker,
            offline,
            events: Vec::new(),
            event_state: ListState::default(),
            focus: Focus::Events,
            settings_index: 0,
            params,
            requested_event: None,
            generation: 0,
            cancel: CancelToken::new(),
            rendering: false,
            current: None,
            status: "Loading event catalog...".to_string(),
        };
        app.send(Job::ListEvents);
        if let Some(name) = initial_event {
            app.request_render(name);
        }
        app
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if self.drain_worker() {
                needs_redraw = true;
            }

            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(4, format!("Event poll error: {e}")))? {
                continue;
            }

            match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code, key.modifiers) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        self.cancel.cancel();
        Ok(())
    }

    fn send(&mut self, job: Job) {
        if self.worker.jobs.send(job).is_err() {
            self.status = "Pipeline worker stopped; restart gwq.".to_string();
        }
    }

    /// Queue a render for `event` with the current parameters, superseding any in flight.
    fn request_render(&mut self, event: String) {
        self.cancel.cancel();
        self.cancel = CancelToken::new();
        self.generation += 1;
        self.rendering = true;
        self.requested_event = Some(event.clone());
        self.status = format!("Loading {event}...");
        let job = Job::Render {
            generation: self.generation,
            event,
            params: self.params.clone(),
            cancel: self.cancel.clone(),
        };
        self.send(job);
    }

    /// Re-render the current event after a settings change.
    fn rerender(&mut self) {
        if let Some(event) = self.requested_event.clone() {
            self.request_render(event);
        }
    }

    /// Apply worker messages. Returns true when something changed.
    fn drain_worker(&mut self) -> bool {
        let mut changed = false;
        while let Ok(msg) = self.worker.results.try_recv() {
            changed = true;
            match msg {
                WorkerMsg::Events(Ok(names)) => self.on_events(names),
                WorkerMsg::Events(Err(err)) => {
                    self.status = err.to_string();
                }
                WorkerMsg::Rendered { generation, result } => {
                    if generation != self.generation {
                        log::debug!("dropping stale render #{generation}");
                        continue;
                    }
                    self.rendering = false;
                    match result {
                        Ok(rendered) => {
                            self.status = format!(
                                "{} ready ({} detectors)",
                                rendered.prepared.event.name,
                                rendered.prepared.traces.len()
                            );
                            self.current = Some(rendered);
                        }
                        Err(err) => {
                            log::warn!("render failed: {err}");
                            self.status = err.to_string();
                        }
                    }
                }
            }
        }
        changed
    }

    fn on_events(&mut self, names: Vec<String>) {
        self.events = names;
        let target = self
            .requested_event
            .clone()
            .or_else(|| self.events.iter().find(|n| *n == DEFAULT_EVENT).cloned())
            .or_else(|| self.events.first().cloned());
        let index = target
            .as_ref()
            .and_then(|t| self.events.iter().position(|n| n == t));
        self.event_state.select(index.or(if self.events.is_empty() { None } else { Some(0) }));

        if self.requested_event.is_none() {
            match target {
                Some(name) => self.request_render(name),
                None => self.status = "The catalog lists no events.".to_string(),
            }
        } else if !self.rendering {
            self.status = format!("{} events in catalog", self.events.len());
        }
    }

    fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => return true,
            KeyCode::Tab | KeyCode::BackTab => {
                self.focus = match self.focus {
                    Focus::Events => Focus::Settings,
                    Focus::Settings => Focus::Events,
                };
            }
            KeyCode::Char('e') => self.export(),
            KeyCode::Char('d') => self.write_debug(),
            KeyCode::Char('r') => self.rerender(),
            _ => match self.focus {
                Focus::Events => self.handle_events_key(code),
                Focus::Settings => self.handle_settings_key(code, modifiers),
            },
        }
        false
    }

    fn handle_events_key(&mut self, code: KeyCode) {
        if self.events.is_empty() {
            return;
        }
        let last = self.events.len() - 1;
        let current = self.event_state.selected().unwrap_or(0);
        match code {
            KeyCode::Up => self.event_state.select(Some(current.saturating_sub(1))),
            KeyCode::Down => self.event_state.select(Some((current + 1).min(last))),
            KeyCode::PageUp => self.event_state.select(Some(current.saturating_sub(10))),
            KeyCode::PageDown => self.event_state.select(Some((current + 10).min(last))),
            KeyCode::Home => self.event_state.select(Some(0)),
            KeyCode::End => self.event_state.select(Some(last)),
            KeyCode::Enter | KeyCode::Char(' ') => {
                if let Some(name) = self.events.get(current).cloned() {
                    self.request_render(name);
                }
            }
            _ => {}
        }
    }

    fn handle_settings_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        let rows = self.settings_rows();
        match code {
            KeyCode::Up => self.settings_index = self.settings_index.saturating_sub(1),
            KeyCode::Down => self.settings_index = (self.settings_index + 1).min(rows.len().saturating_sub(1)),
            KeyCode::Left | KeyCode::Right | KeyCode::Enter | KeyCode::Char(' ') => {
                let Some(setting) = rows.get(self.settings_index).cloned() else {
                    return;
                };
                let delta = match code {
                    KeyCode::Left => -1.0,
                    _ => 1.0,
                };
                let coarse = modifiers.contains(KeyModifiers::SHIFT);
                if adjust_setting(&mut self.params, &setting, delta, coarse) {
                    self.rerender();
                }
            }
            _ => {}
        }
    }

    fn settings_rows(&self) -> Vec<Setting> {
        let mut rows = vec![Setting::TimeRange, Setting::Whiten, Setting::BandLow, Setting::BandHigh];
        for det in self.detectors() {
            rows.push(Setting::Offset(det.clone()));
            rows.push(Setting::Invert(det));
        }
        rows
    }

    /// Detectors of the displayed event.
    fn detectors(&self) -> Vec<Detector> {
        self.current
            .as_ref()
            .map(|r| r.prepared.event.detectors.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn export(&mut self) {
        let Some(rendered) = &self.current else {
            self.status = "Nothing to export yet.".to_string();
            return;
        };
        self.status = match crate::io::export::write_all_csv(Path::new(EXPORT_DIR), &rendered.prepared) {
            Ok(paths) => format!("Wrote {} CSV file(s) to {EXPORT_DIR}/", paths.len()),
            Err(err) => format!("Export failed: {err}"),
        };
    }

    fn write_debug(&mut self) {
        let Some(rendered) = &self.current else {
            self.status = "No render to describe yet.".to_string();
            return;
        };
        self.status = match crate::debug::write_debug_bundle(
            Path::new(DEBUG_DIR),
            &rendered.prepared,
            rendered.cache,
            rendered.page_url.as_deref(),
        ) {
            Ok(path) => format!("Wrote debug bundle: {}", path.display()),
            Err(err) => format!("Debug write failed: {err}"),
        };
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(5), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut lines: Vec<Line> = Vec::new();
        let source = if self.offline { "synthetic archive (offline)" } else { "GWOSC open data" };
        lines.push(Line::from(vec![
            Span::styled("gwq", Style::default().fg(Color::Cyan)),
            Span::raw(format!(" - gravitational-wave quick view | {source}")),
        ]));

        match &self.current {
            Some(rendered) => {
                let event = &rendered.prepared.event;
                let mut spans = vec![Span::styled(
                    format!("{} | GPS {:.3} | {} | ", event.name, event.gps, format_utc(event.gps)),
                    Style::default().fg(Color::Gray),
                )];
                for det in &event.detectors {
                    spans.push(Span::styled(
                        format!("{det} "),
                        Style::default().fg(legend_color(det)).add_modifier(Modifier::BOLD),
                    ));
                }
                lines.push(Line::from(spans));

                let meta_line = match &event.metadata {
                    Some(meta) if !meta.is_empty() => format!(
                        "m1={} m2={} Msun | SNR={} | D={} Mpc{}",
                        fmt_opt(meta.mass_1_source, 1),
                        fmt_opt(meta.mass_2_source, 1),
                        fmt_opt(meta.network_snr, 1),
                        fmt_opt(meta.luminosity_distance, 0),
                        rendered
                            .page_url
                            .as_deref()
                            .map(|u| format!(" | {u}"))
                            .unwrap_or_default(),
                    ),
                    _ => "metadata unavailable".to_string(),
                };
                lines.push(Line::from(Span::styled(meta_line, Style::default().fg(Color::Gray))));
            }
            None => {
                lines.push(Line::from(Span::styled(
                    "no event loaded",
                    Style::default().fg(Color::Gray),
                )));
            }
        }

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&mut self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(24), Constraint::Min(0)])
            .split(area);

        self.draw_events(frame, columns[0]);

        let settings_height = (self.settings_rows().len() as u16 + 2).min(columns[1].height / 2);
        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(settings_height)])
            .split(columns[1]);

        self.draw_chart(frame, right[0]);
        self.draw_settings(frame, right[1]);
    }

    fn draw_events(&mut self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let items: Vec<ListItem> = self.events.iter().map(|n| ListItem::new(n.as_str())).collect();
        let list = List::new(items)
            .block(focus_block("Events", self.focus == Focus::Events))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");
        frame.render_stateful_widget(list, area, &mut self.event_state);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let title = if self.rendering { "Strain (updating...)" } else { "Strain" };
        let block = Block::default().title(title).borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let Some(rendered) = &self.current else {
            let msg = Paragraph::new("Waiting for data...")
                .style(Style::default().fg(Color::Yellow))
                .block(Block::default());
            frame.render_widget(msg, inner);
            return;
        };

        let (series, x_bounds, y_bounds) = chart_series(rendered);
        let traces: Vec<ChartTrace> = series
            .iter()
            .map(|(det, points)| ChartTrace {
                points: points.as_slice(),
                color: detector_color(det),
            })
            .collect();

        let y_label = if rendered.prepared.params.whiten { "whitened strain" } else { "strain" };
        let (chart_rect, insets) = chart_layout(inner);
        let widget = StrainChart {
            traces: &traces,
            x_bounds,
            y_bounds,
            x_label: "t - gps (s)",
            y_label: y_label.to_string(),
            fmt_x: fmt_axis_x,
            fmt_y: fmt_axis_y,
        };

        frame.render_widget(widget, chart_rect);
        if let Some(insets) = insets {
            draw_axis_ticks(frame, inner, chart_rect, insets, x_bounds, y_bounds, y_label);
        }
    }

    fn draw_settings(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let items: Vec<ListItem> = self
            .settings_rows()
            .iter()
            .map(|s| ListItem::new(setting_label(&self.params, s)))
            .collect();

        let list = List::new(items)
            .block(focus_block("Settings", self.focus == Focus::Settings))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");

        let mut state = ListState::default();
        if self.focus == Focus::Settings {
            state.select(Some(self.settings_index));
        }
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "Tab focus  ↑/↓ select  Enter load  ←/→ adjust (Shift: coarse)  e export  d debug  r reload  q quit";
        let status_style = if self.rendering {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::Yellow)
        };
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, status_style),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

fn focus_block(title: &str, focused: bool) -> Block<'_> {
    let style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Block::default().title(title).borders(Borders::ALL).border_style(style)
}

/// Apply one control step. Returns true when the parameters changed.
///
/// Limits mirror the controls: time range `[0.1, 2.0]` s, band `[10, 2000]` Hz
/// with `low < high`, offset `[-20, 20]` ms.
fn adjust_setting(params: &mut DisplayParams, setting: &Setting, delta: f64, coarse: bool) -> bool {
    let before = params.clone();
    match setting {
        Setting::TimeRange => {
            let next = params.half_width + delta * HALF_WIDTH_STEP;
            params.half_width = round_to(next, HALF_WIDTH_STEP / 10.0).clamp(HALF_WIDTH_MIN, HALF_WIDTH_MAX);
        }
        Setting::Whiten => params.whiten = !params.whiten,
        Setting::BandLow => {
            let next = params.band.low + delta * BAND_LOW_STEP;
            params.band.low = next.min(params.band.high - BAND_LOW_STEP).max(BAND_MIN_HZ);
        }
        Setting::BandHigh => {
            let next = params.band.high + delta * BAND_HIGH_STEP;
            params.band.high = next.max(params.band.low + BAND_LOW_STEP).min(BAND_MAX_HZ);
        }
        Setting::Offset(det) => {
            let step = if coarse { OFFSET_COARSE_STEP_MS } else { OFFSET_STEP_MS };
            let p = params.detector_mut(det);
            let next = round_to(p.offset_ms + delta * step, OFFSET_STEP_MS);
            p.offset_ms = next.clamp(-OFFSET_LIMIT_MS, OFFSET_LIMIT_MS);
        }
        Setting::Invert(det) => {
            let p = params.detector_mut(det);
            p.invert = !p.invert;
        }
    }
    *params != before
}

fn setting_label(params: &DisplayParams, setting: &Setting) -> String {
    match setting {
        Setting::TimeRange => format!("Time range: {:.2} s", 2.0 * params.half_width),
        Setting::Whiten => format!("Whiten: {}", on_off(params.whiten)),
        Setting::BandLow => format!("Band-pass low: {:.0} Hz", params.band.low),
        Setting::BandHigh => format!("Band-pass high: {:.0} Hz", params.band.high),
        Setting::Offset(det) => format!("{det} offset: {:+.1} ms", params.for_detector(det).offset_ms),
        Setting::Invert(det) => format!("{det} invert: {}", on_off(params.for_detector(det).invert)),
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

/// Snap to a multiple of `step`, hiding float drift from repeated steps.
fn round_to(value: f64, step: f64) -> f64 {
    (value / step).round() * step
}

type ChartSeries = Vec<(Detector, Vec<(f64, f64)>)>;

/// Per-detector points relative to the trigger, plus chart bounds.
fn chart_series(rendered: &Rendered) -> (ChartSeries, [f64; 2], [f64; 2]) {
    let prepared = &rendered.prepared;
    let gps = prepared.event.gps;

    let series: ChartSeries = prepared
        .traces
        .iter()
        .map(|t| {
            let points = t
                .series
                .times()
                .zip(&t.series.values)
                .map(|(x, &y)| (x - gps, y))
                .collect();
            (t.series.detector.clone(), points)
        })
        .collect();

    let x_bounds = [prepared.window.0 - gps, prepared.window.1 - gps];

    let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for (_, points) in &series {
        for &(_, y) in points {
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }
    }
    if !y_min.is_finite() || !y_max.is_finite() || y_max <= y_min {
        y_min = -1.0;
        y_max = 1.0;
    }
    let pad = ((y_max - y_min).abs() * 0.05).max(1e-30);
    let y_bounds = [y_min - pad, y_max + pad];

    (series, x_bounds, y_bounds)
}

fn fmt_axis_x(v: f64) -> String {
    format!("{v:+.2}")
}

fn fmt_axis_y(v: f64) -> String {
    if v != 0.0 && (v.abs() < 1e-2 || v.abs() >= 1e4) {
        format!("{v:.1e}")
    } else {
        format!("{v:.1}")
    }
}

fn fmt_opt(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.decimals$}"),
        _ => "-".to_string(),
    }
}

#[derive(Debug, Clone, Copy)]
struct AxisInsets {
    left: u16,
    right: u16,
    top: u16,
    bottom: u16,
}

fn chart_layout(inner: Rect) -> (Rect, Option<AxisInsets>) {
    let insets = AxisInsets {
        left: 9,
        right: 2,
        top: 1,
        bottom: 2,
    };

    if inner.width <= insets.left + insets.right + 10
        || inner.height <= insets.top + insets.bottom + 5
    {
        return (inner, None);
    }

    let rect = Rect {
        x: inner.x + insets.left,
        y: inner.y + insets.top,
        width: inner.width - insets.left - insets.right,
        height: inner.height - insets.top - insets.bottom,
    };

    (rect, Some(insets))
}

fn draw_axis_ticks(
    frame: &mut ratatui::Frame<'_>,
    inner: Rect,
    chart: Rect,
    insets: AxisInsets,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
    y_label: &str,
) {
    let ticks = 5usize;
    let style = Style::default().fg(Color::Gray);

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let x_val = x_bounds[0] + u * (x_bounds[1] - x_bounds[0]);
        let x = chart.x + ((chart.width - 1) as f64 * u).round() as u16;
        let label = fmt_axis_x(x_val);
        let label_len = label.len() as u16;
        let start = x.saturating_sub((label.len() / 2) as u16);
        let y = chart.y + chart.height;
        if y >= inner.y + inner.height - 1 {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let y_val = y_bounds[0] + u * (y_bounds[1] - y_bounds[0]);
        let y = chart.y + (chart.height - 1) - ((chart.height - 1) as f64 * u).round() as u16;
        let label = fmt_axis_y(y_val);
        let label_len = label.len() as u16;
        let x = inner.x + insets.left.saturating_sub(1);
        let start = x.saturating_sub(label.len() as u16);
        if start < inner.x {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    let x_label = Paragraph::new("t - gps (s)")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray));
    let x_rect = Rect {
        x: chart.x,
        y: chart.y + chart.height + 1,
        width: chart.width,
        height: 1,
    };
    if x_rect.y < inner.y + inner.height {
        frame.render_widget(x_label, x_rect);
    }

    let y_title = Paragraph::new(y_label.to_string())
        .style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD));
    let y_rect = Rect {
        x: inner.x,
        y: inner.y,
        width: inner.width.min(y_label.len() as u16),
        height: 1,
    };
    frame.render_widget(y_title, y_rect);
}
