//! Ratatui-based terminal UI.
//!
//! Runs the same pipeline as `exo rank`, then shows the ranked planets, the
//! score breakdown of the selected one, the candidate model metrics and a
//! score-vs-temperature chart.

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};

use crate::app::pipeline::{self, RunOutput};
use crate::cli::RankArgs;
use crate::domain::{LabelingPolicy, PlanetRecord, PriorityLabel, RankedEntry, RunConfig};
use crate::error::AppError;
use crate::report::truncate;

mod plotters_chart;

use plotters_chart::ScoreChart;

/// Start the TUI.
pub fn run(args: RankArgs) -> Result<(), AppError> {
    let config = crate::app::run_config_from_args(&args)?;
    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    let mut app = App::new(args, config);
    app.status = "Training candidates...".to_string();
    terminal
        .draw(|f| app.draw(f))
        .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
    app.rerun();
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

struct App {
    args: RankArgs,
    config: RunConfig,
    selected: usize,
    status: String,
    run: Option<RunOutput>,
}

impl App {
    fn new(args: RankArgs, config: RunConfig) -> Self {
        Self {
            args,
            config,
            selected: 0,
            status: String::new(),
            run: None,
        }
    }

    /// Reload the catalog and retrain; failures are shown, not fatal.
    fn rerun(&mut self) {
        let seed = self.config.trainer.seed;
        let request = crate::app::catalog_request(&self.args.catalog, seed);
        let result = pipeline::load_catalog(&request, self.args.catalog.lum_scale)
            .and_then(|catalog| pipeline::run_pipeline(catalog, &self.config));
        match result {
            Ok(run) => {
                self.status = format!(
                    "best: {} | seed {} | {}",
                    run.best().name,
                    seed,
                    labeling_name(self.config.labeling)
                );
                self.selected = self.selected.min(run.ranking.len().saturating_sub(1));
                self.run = Some(run);
            }
            Err(err) => {
                self.status = format!("Run failed: {err}");
            }
        }
    }

    fn event_loop<B: ratatui::backend::Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
    ) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(4, format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code, terminal)? {
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
        Ok(())
    }

    fn handle_key<B: ratatui::backend::Backend>(
        &mut self,
        code: KeyCode,
        terminal: &mut Terminal<B>,
    ) -> Result<bool, AppError> {
        let n = self.run.as_ref().map(|r| r.ranking.len()).unwrap_or(0);
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Up => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down => {
                if self.selected + 1 < n {
                    self.selected += 1;
                }
            }
            KeyCode::PageUp => self.selected = self.selected.saturating_sub(10),
            KeyCode::PageDown => self.selected = (self.selected + 10).min(n.saturating_sub(1)),
            KeyCode::Home => self.selected = 0,
            KeyCode::End => self.selected = n.saturating_sub(1),
            KeyCode::Char('r') => {
                self.config.trainer.seed = self.config.trainer.seed.wrapping_add(1);
                self.rerun_with_notice(terminal)?;
            }
            KeyCode::Char('l') => {
                self.config.labeling = match self.config.labeling {
                    LabelingPolicy::Thresholds => LabelingPolicy::Quantiles,
                    LabelingPolicy::Quantiles => LabelingPolicy::Thresholds,
                };
                self.rerun_with_notice(terminal)?;
            }
            _ => {}
        }
        Ok(false)
    }

    fn rerun_with_notice<B: ratatui::backend::Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
    ) -> Result<(), AppError> {
        self.status = "Training candidates...".to_string();
        terminal
            .draw(|f| self.draw(f))
            .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
        self.rerun();
        Ok(())
    }

    fn draw(&self, frame: &mut ratatui::Frame<'_>) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4),
                Constraint::Min(0),
                Constraint::Length(3),
            ])
            .split(frame.area());

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut lines = vec![Line::from(vec![
            Span::styled("exo", Style::default().fg(Color::Cyan)),
            Span::raw(" - exoplanet observation priorities"),
        ])];
        if let Some(run) = &self.run {
            let m = &run.best().metrics;
            lines.push(Line::from(Span::styled(
                format!(
                    "{} | n={} | model: {} (bal={:.3}, cv_bal={:.3}) | labels: {}",
                    run.catalog.source,
                    run.ranking.len(),
                    run.best().name,
                    m.balanced_accuracy,
                    m.cv_mean_balanced_accuracy,
                    labeling_name(self.config.labeling),
                ),
                Style::default().fg(Color::Gray),
            )));
        }
        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let Some(run) = &self.run else {
            let msg = Paragraph::new("Waiting for results...")
                .style(Style::default().fg(Color::Yellow))
                .block(Block::default().borders(Borders::ALL));
            frame.render_widget(msg, area);
            return;
        };

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(area);
        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(10),
                Constraint::Length(7),
                Constraint::Min(0),
            ])
            .split(columns[1]);

        self.draw_ranking(frame, columns[0], &run.ranking);
        self.draw_breakdown(frame, right[0], run);
        draw_metrics(frame, right[1], run);
        self.draw_chart(frame, right[2], run);
    }

    fn draw_ranking(&self, frame: &mut ratatui::Frame<'_>, area: Rect, ranking: &[RankedEntry]) {
        let items: Vec<ListItem> = ranking
            .iter()
            .map(|e| {
                ListItem::new(Line::from(vec![
                    Span::raw(format!(
                        "{:>4} {:<22} {:>5.1} ",
                        e.rank,
                        truncate(&e.planet_name, 22),
                        e.scores.total
                    )),
                    Span::styled(
                        e.predicted.display_name(),
                        Style::default().fg(label_color(e.predicted)),
                    ),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(Block::default().title("Ranking").borders(Borders::ALL))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("» ");

        let mut state = ListState::default();
        state.select(Some(self.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_breakdown(&self, frame: &mut ratatui::Frame<'_>, area: Rect, run: &RunOutput) {
        let block = Block::default().title("Selected").borders(Borders::ALL);
        let Some(entry) = run.ranking.get(self.selected) else {
            frame.render_widget(block, area);
            return;
        };
        let record = &run.catalog.records[entry.row];
        let s = &entry.scores;
        let zone = s
            .zone
            .map(|z| format!("{:.3}-{:.3} AU", z.inner_au, z.outer_au))
            .unwrap_or_else(|| "undefined".to_string());

        let lines = vec![
            Line::from(Span::styled(
                format!("#{} {} ({})", entry.rank, entry.planet_name, entry.host_name),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(format!(
                "total {:.1} | hab {:.1} det {:.1} bio {:.1} act {:.1}",
                s.total, s.habitability, s.detectability, s.biosignature, s.stellar_activity
            )),
            Line::from(format!(
                "predicted {} ({:.0}%)",
                entry.predicted.display_name(),
                entry.confidence * 100.0
            )),
            Line::from(format!("HZ: {zone} | a = {}", fmt_opt(record.semi_major_axis, "AU"))),
            Line::from(format!(
                "R = {} | M = {} | Teq = {}",
                fmt_opt(record.radius, "Re"),
                fmt_opt(record.mass, "Me"),
                fmt_opt(record.eq_temp, "K")
            )),
            Line::from(format!(
                "Teff = {} | J = {} | type {}",
                fmt_opt(record.star_teff, "K"),
                fmt_opt(record.j_mag, ""),
                record.spectral_type.as_deref().unwrap_or("-")
            )),
        ];
        frame.render_widget(Paragraph::new(Text::from(lines)).block(block), area);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect, run: &RunOutput) {
        let block = Block::default()
            .title("Total vs equilibrium temperature")
            .borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let series = chart_series(&run.catalog.records, &run.ranking, self.selected);
        let widget = ScoreChart {
            points: &series.points,
            priority: &series.priority,
            selected: series.selected,
            band: self.config.scoring.habitability.temperate_range,
            x_bounds: series.x_bounds,
            y_bounds: [0.0, 100.0],
        };
        frame.render_widget(widget, inner);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "↑/↓ select  PgUp/PgDn page  r reseed  l labeling  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

fn draw_metrics(frame: &mut ratatui::Frame<'_>, area: Rect, run: &RunOutput) {
    let best = &run.best().name;
    let mut lines: Vec<Line> = run
        .training
        .trained
        .iter()
        .map(|t| {
            let marker = if &t.name == best { "*" } else { " " };
            Line::from(format!(
                "{marker} {:<16} acc {:.3} bal {:.3} cv {:.3}",
                truncate(&t.name, 16),
                t.metrics.accuracy,
                t.metrics.balanced_accuracy,
                t.metrics.cv_mean_balanced_accuracy
            ))
        })
        .collect();
    for f in &run.training.failures {
        lines.push(Line::from(Span::styled(
            format!("  {:<16} {}", truncate(&f.name, 16), f.reason),
            Style::default().fg(Color::Red),
        )));
    }
    let p = Paragraph::new(Text::from(lines))
        .block(Block::default().title("Models").borders(Borders::ALL));
    frame.render_widget(p, area);
}

struct ChartSeries {
    points: Vec<(f64, f64)>,
    priority: Vec<(f64, f64)>,
    selected: Option<(f64, f64)>,
    x_bounds: [f64; 2],
}

/// Planets with a known equilibrium temperature, as (eq_temp, total).
fn chart_series(records: &[PlanetRecord], ranking: &[RankedEntry], selected: usize) -> ChartSeries {
    let point = |e: &RankedEntry| {
        records
            .get(e.row)
            .and_then(|r| r.eq_temp)
            .filter(|t| t.is_finite())
            .map(|t| (t, e.scores.total))
    };

    let points: Vec<(f64, f64)> = ranking.iter().filter_map(point).collect();
    let priority = ranking
        .iter()
        .filter(|e| e.predicted >= PriorityLabel::High)
        .filter_map(point)
        .collect();
    let selected = ranking.get(selected).and_then(point);

    let (lo, hi) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(t, _)| {
            (lo.min(t), hi.max(t))
        });
    let x_bounds = if lo.is_finite() && hi.is_finite() && hi > lo {
        let pad = (hi - lo) * 0.05;
        [(lo - pad).max(0.0), hi + pad]
    } else {
        [0.0, 1000.0]
    };

    ChartSeries {
        points,
        priority,
        selected,
        x_bounds,
    }
}

fn label_color(label: PriorityLabel) -> Color {
    match label {
        PriorityLabel::NoViable => Color::DarkGray,
        PriorityLabel::Low => Color::Gray,
        PriorityLabel::Medium => Color::White,
        PriorityLabel::High => Color::LightGreen,
        PriorityLabel::PrimeTarget => Color::Green,
    }
}

fn labeling_name(policy: LabelingPolicy) -> &'static str {
    match policy {
        LabelingPolicy::Thresholds => "thresholds",
        LabelingPolicy::Quantiles => "quantiles",
    }
}

fn fmt_opt(v: Option<f64>, unit: &str) -> String {
    match v {
        Some(v) if unit.is_empty() => format!("{v:.2}"),
        Some(v) => format!("{v:.2} {unit}"),
        None => "-".to_string(),
    }
}
