use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::playback::{Mode, Playback};
use crate::rsvp::{orp_index, strip_edges};
use crate::scroll::ScrollPhase;

const HORIZONTAL_MARGIN: u16 = 4;

impl Widget for &Playback {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .constraints([
                Constraint::Length(1), // status
                Constraint::Min(1),    // script area
                Constraint::Length(1), // caption / hints
            ])
            .split(area);

        render_status(self, chunks[0], buf);

        if let Some(count) = self.scroller.countdown() {
            render_countdown(count, chunks[1], buf);
        } else {
            match self.mode {
                Mode::Rsvp => render_rsvp(self, chunks[1], buf),
                _ => render_lines(self, chunks[1], buf),
            }
        }

        render_footer(self, chunks[2], buf);
    }
}

fn render_status(playback: &Playback, area: Rect, buf: &mut Buffer) {
    let dim = Style::default().add_modifier(Modifier::DIM);
    let bold = Style::default().add_modifier(Modifier::BOLD);

    let state = match playback.mode {
        Mode::Continuous => match playback.scroller.phase() {
            ScrollPhase::Idle => "paused",
            ScrollPhase::CountingDown => "countdown",
            ScrollPhase::RampingUp => "ramping up",
            ScrollPhase::Steady => "playing",
            ScrollPhase::RampingDown => "ramping down",
        },
        Mode::Paging => "paging",
        Mode::Voice => {
            if playback.align.is_listening() {
                "listening"
            } else {
                "idle"
            }
        }
        Mode::Rsvp => {
            if playback.rsvp.is_running() {
                "running"
            } else if playback.rsvp.is_complete() {
                "done"
            } else {
                "paused"
            }
        }
    };

    let pace = match playback.mode {
        Mode::Rsvp => format!("{} wpm", playback.rsvp.words_per_minute),
        _ => format!("{:.2} lines/s", playback.scroller.speed_lines_per_sec),
    };

    let mut spans = vec![
        Span::styled(format!(" {} ", playback.mode), bold.fg(Color::Cyan)),
        Span::styled(format!("[{state}] "), dim),
        Span::styled(pace, dim),
    ];
    if let Some(err) = &playback.speech_fault {
        spans.push(Span::styled(
            format!("  {err}"),
            Style::default().fg(Color::Red),
        ));
    }

    Paragraph::new(Line::from(spans)).render(area, buf);
}

fn render_countdown(count: u32, area: Rect, buf: &mut Buffer) {
    let big = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    Paragraph::new(Span::styled(format!("{count}"), big))
        .alignment(Alignment::Center)
        .render(centered_line(area), buf);
}

/// Visible script window for continuous, paging, and voice modes. One text
/// row per derived script line; the scroller's pixel offset maps 1:1 onto
/// rows because main.rs fixes line_height at 1.
fn render_lines(playback: &Playback, area: Rect, buf: &mut Buffer) {
    let top_offset = match playback.mode {
        Mode::Paging => playback
            .paginator
            .page_offset(f64::from(area.height))
            .round()
            .max(0.0) as usize,
        _ => (-playback.scroller.offset_px).round().max(0.0) as usize,
    };
    let active = playback.active_line();

    let mut lines = Vec::with_capacity(area.height as usize);
    for row in 0..area.height as usize {
        let idx = top_offset + row;
        if idx >= playback.script.line_count() {
            break;
        }
        let style = if idx == active {
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().add_modifier(Modifier::DIM)
        };
        lines.push(Line::from(Span::styled(playback.script.line_text(idx), style)));
    }

    Paragraph::new(lines).render(area, buf);
}

/// Single RSVP word with its recognition point pinned to the center column.
fn render_rsvp(playback: &Playback, area: Rect, buf: &mut Buffer) {
    let word = playback.rsvp.current_word_text();
    let core = strip_edges(word);
    let pivot = orp_index(word);

    let graphemes: Vec<&str> = core.graphemes(true).collect();
    let before: String = graphemes[..pivot.min(graphemes.len())].concat();
    let at: String = graphemes.get(pivot).copied().unwrap_or("").to_string();
    let after: String = graphemes[(pivot + 1).min(graphemes.len())..].concat();

    let center_col = area.width / 2;
    let pad = center_col.saturating_sub(before.width() as u16);

    let line = Line::from(vec![
        Span::raw(" ".repeat(pad as usize)),
        Span::raw(before),
        Span::styled(
            at,
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
        Span::raw(after),
    ]);

    Paragraph::new(line).render(centered_line(area), buf);
}

fn render_footer(playback: &Playback, area: Rect, buf: &mut Buffer) {
    let dim_italic = Style::default()
        .add_modifier(Modifier::DIM)
        .add_modifier(Modifier::ITALIC);

    let text = match (&playback.caption, playback.mode) {
        (Some((caption, interim)), Mode::Voice) => {
            let style = if *interim {
                dim_italic
            } else {
                Style::default().add_modifier(Modifier::ITALIC)
            };
            Line::from(Span::styled(caption.clone(), style))
        }
        _ => Line::from(Span::styled(
            "space play/pause  tab mode  j/k seek  +/- pace  q quit",
            dim_italic,
        )),
    };

    Paragraph::new(text).render(area, buf);
}

fn centered_line(area: Rect) -> Rect {
    let y = area.y + area.height / 2;
    Rect::new(area.x, y.min(area.y + area.height.saturating_sub(1)), area.width, 1)
}
