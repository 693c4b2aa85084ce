use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, LineGauge, Paragraph, Row, Table, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, Screen};
use crate::clock::Clock;
use crate::notify::Severity;
use crate::session::Goal;
use crate::stats::format_clock;
use crate::watchdog::{warning_opacity, Warning};

const HORIZONTAL_MARGIN: u16 = 2;
const CURSOR: &str = "▏";
const BORDER_GRAY: (u8, u8, u8) = (110, 110, 110);

/// Linear mix of `base` toward `tint`.
pub fn blend(base: (u8, u8, u8), tint: (u8, u8, u8), amount: f64) -> Color {
    let a = amount.clamp(0.0, 1.0);
    let mix = |b: u8, t: u8| (b as f64 + (t as f64 - b as f64) * a).round() as u8;
    Color::Rgb(mix(base.0, tint.0), mix(base.1, tint.1), mix(base.2, tint.2))
}

/// Rows `text` occupies when wrapped at `width` columns.
fn wrapped_rows(text: &str, width: u16) -> usize {
    let width = width.max(1) as usize;
    text.split('\n')
        .map(|line| line.width().div_ceil(width).max(1))
        .sum()
}

fn severity_style(severity: Severity) -> Style {
    match severity {
        Severity::Info => Style::default().fg(Color::Gray),
        Severity::Success => Style::default().fg(Color::Green),
        Severity::Warning => Style::default().fg(Color::Yellow),
        Severity::Error => Style::default()
            .fg(Color::Red)
            .add_modifier(Modifier::BOLD),
    }
}

impl<C: Clock> Widget for &App<C> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.screen {
            Screen::Writing => render_writing(self, area, buf),
            Screen::History => render_history(self, area, buf),
        }
    }
}

fn render_writing<C: Clock>(app: &App<C>, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(1), // status
            Constraint::Length(1), // progress
            Constraint::Min(3),    // editor
            Constraint::Length(1), // latest notice
            Constraint::Length(1), // legend
        ])
        .split(area);

    render_status(app, chunks[0], buf);
    if let Some(progress) = app.machine.progress() {
        LineGauge::default()
            .filled_style(Style::default().fg(Color::Green))
            .ratio(progress.fraction)
            .label(format!("{:>3.0}%", progress.fraction * 100.0))
            .render(chunks[1], buf);
    }
    render_editor(app, chunks[2], buf);

    if let Some(notice) = app.inbox.latest() {
        Paragraph::new(Span::styled(notice.message, severity_style(notice.severity)))
            .render(chunks[3], buf);
    }

    let legend = "(ctrl+g) start / (tab) switch / (ctrl+x) stop / (ctrl+r) recover / (ctrl+s) save / (ctrl+h) history / (esc) quit";
    Paragraph::new(Span::styled(
        legend,
        Style::default().add_modifier(Modifier::ITALIC | Modifier::DIM),
    ))
    .render(chunks[4], buf);
}

fn render_status<C: Clock>(app: &App<C>, area: Rect, buf: &mut Buffer) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().add_modifier(Modifier::DIM);

    let line = match app.machine.progress() {
        Some(progress) => {
            let elapsed = progress.elapsed_ms / 1000;
            let goal = match progress.goal {
                Goal::Duration { duration_ms } => format!(
                    "{} / {}",
                    format_clock(elapsed),
                    format_clock(duration_ms / 1000)
                ),
                Goal::WordCount { words } => {
                    format!("{} / {words} words", progress.words_written)
                }
            };
            let idle_secs = progress.idle_remaining_ms.max(0) as f64 / 1000.0;
            Line::from(vec![
                Span::styled("● writing ", bold.fg(Color::Green)),
                Span::styled(goal, bold),
                Span::styled(
                    format!(
                        "  ·  {} words  ·  {}  ·  idle {idle_secs:.1}s",
                        progress.words_written,
                        format_clock(elapsed)
                    ),
                    dim,
                ),
            ])
        }
        None => {
            let settings = &app.settings;
            Line::from(vec![
                Span::styled("○ idle ", bold),
                Span::styled(
                    format!(
                        "goal {}  ·  penalty {}  ·  idle after {}s{}",
                        settings.goal(),
                        settings.penalty_mode,
                        settings.idle_timeout_secs,
                        if settings.practice_mode { "  ·  practice" } else { "" }
                    ),
                    dim,
                ),
            ])
        }
    };
    Paragraph::new(line).render(area, buf);
}

fn render_editor<C: Clock>(app: &App<C>, area: Rect, buf: &mut Buffer) {
    let active_id = app.workspace.active_id();
    let target = app.machine.state().map(|s| &s.target);

    let mut title = vec![Span::raw(" ")];
    for buffer in app.workspace.buffers() {
        let mut style = Style::default().add_modifier(Modifier::DIM);
        if Some(&buffer.id) == active_id {
            style = Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
        }
        let marker = if Some(&buffer.id) == target { "*" } else { "" };
        title.push(Span::styled(format!("{}{marker}", buffer.id), style));
        title.push(Span::raw(" "));
    }

    let warning = app.machine.warning();
    let border_color = match warning {
        Warning::Clear if app.machine.is_active() => Color::Green,
        Warning::Clear => Color::DarkGray,
        Warning::Approaching(_) | Warning::Expired => blend(
            BORDER_GRAY,
            app.settings.warning_rgb(),
            warning_opacity(warning.intensity()),
        ),
    };

    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(Line::from(title));
    if warning.is_active() {
        block = block.title_bottom(
            Line::from(Span::styled(
                " keep writing! ",
                Style::default().fg(border_color).add_modifier(Modifier::BOLD),
            ))
            .alignment(Alignment::Right),
        );
    }

    let inner = block.inner(area);
    let mut text = app.workspace.active_text().to_string();
    text.push_str(CURSOR);

    // keep the end of the text, where the writing happens, in view
    let rows = wrapped_rows(&text, inner.width);
    let scroll = rows.saturating_sub(inner.height as usize) as u16;

    Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0))
        .render(area, buf);
}

fn render_history<C: Clock>(app: &App<C>, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(1)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    let summary = app.summary();
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut header = vec![Line::from(vec![
        Span::styled(format!("{} sessions", summary.total_sessions), bold),
        Span::raw(format!(
            "  ·  {:.0}% completed  ·  streak {}  ·  {} words  ·  {} writing",
            summary.success_rate(),
            summary.current_streak,
            summary.total_words,
            format_clock(summary.total_seconds)
        )),
    ])];
    if let Some(best) = summary.best_day() {
        header.push(Line::from(Span::styled(
            format!("best day {}: {} words", best.day.format("%Y-%m-%d"), best.words),
            Style::default().add_modifier(Modifier::DIM),
        )));
    }
    Paragraph::new(header).render(chunks[0], buf);

    let rows = app
        .machine
        .history()
        .iter()
        .rev()
        .skip(app.history_scroll)
        .map(|record| {
            let (result, style) = if record.completed {
                ("completed", Style::default().fg(Color::Green))
            } else {
                ("failed", Style::default().fg(Color::Red))
            };
            Row::new(vec![
                Cell::from(record.timestamp.format("%Y-%m-%d %H:%M").to_string()),
                Cell::from(format_clock(record.duration_seconds)),
                Cell::from(record.words_written.to_string()),
                Cell::from(Span::styled(result, style)),
            ])
        });

    Table::new(
        rows,
        [
            Constraint::Length(17),
            Constraint::Length(9),
            Constraint::Length(7),
            Constraint::Min(9),
        ],
    )
    .header(Row::new(vec!["date", "duration", "words", "result"]).style(bold))
    .block(Block::default().borders(Borders::TOP))
    .render(chunks[1], buf);

    Paragraph::new(Span::styled(
        "(↑/↓) scroll / (ctrl+h) back / (esc) quit",
        Style::default().add_modifier(Modifier::ITALIC | Modifier::DIM),
    ))
    .render(chunks[2], buf);
}
