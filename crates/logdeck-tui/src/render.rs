//! Pure view functions for the console.
//!
//! Functions here take `&AppState`, draw into a ratatui `Frame`, and never
//! mutate state. The scrollback rows are refreshed by
//! [`crate::update::sync_view`] right before each draw.

use logdeck_core::ansi::{self, AnsiColor, SgrStyle};
use logdeck_core::repl::POPUP_HEIGHT;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Clear, Paragraph};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::scrollbar::Scrollbar;
use crate::state::AppState;

const INPUT_HEIGHT: u16 = 1;
const STATUS_HEIGHT: u16 = 1;
const SCROLLBAR_WIDTH: u16 = 1;

/// Prompt drawn in front of the input.
pub const PROMPT: &str = "▶ ";

const HINTS: &[(&str, &str)] = &[("Ctrl+L", " clear  "), ("Ctrl+C", " quit")];

/// Scrollback viewport inside `area`: everything above the input and status
/// lines, minus the scrollbar column.
pub fn scrollback_area(area: Rect) -> Rect {
    Rect {
        x: area.x,
        y: area.y,
        width: area.width.saturating_sub(SCROLLBAR_WIDTH),
        height: area.height.saturating_sub(INPUT_HEIGHT + STATUS_HEIGHT),
    }
}

pub fn render(app: &AppState, frame: &mut Frame) {
    let area = frame.area();
    let [body, input, status] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(INPUT_HEIGHT),
        Constraint::Length(STATUS_HEIGHT),
    ])
    .areas(area);

    render_scrollback(app, frame, scrollback_area(area));
    frame.render_widget(
        Scrollbar::new(
            app.scroll.total_lines,
            body.height as usize,
            app.scroll.offset,
        ),
        body,
    );
    let input_skip = render_input(app, frame, input);
    render_status_line(app, frame, status);
    render_autocomplete(app, frame, input, input_skip);
}

fn render_scrollback(app: &AppState, frame: &mut Frame, area: Rect) {
    let selection = app.scrollback.selection();
    let lines: Vec<Line<'static>> = app
        .view
        .iter()
        .map(|row| {
            let line = styled_line(&row.text, app.color);
            if selection == Some(row.index) {
                line.style(Style::default().bg(Color::Indexed(236)))
            } else {
                line
            }
        })
        .collect();
    // Rows are pre-wrapped by the scrollback; no `.wrap()` here.
    frame.render_widget(Paragraph::new(lines), area);
}

/// Draws the prompt and input, scrolled horizontally to keep the cursor in
/// view. Returns how many columns of input were scrolled off the left.
fn render_input(app: &AppState, frame: &mut Frame, area: Rect) -> usize {
    let prompt_width = PROMPT.width();
    let available = (area.width as usize).saturating_sub(prompt_width).max(1);
    let cursor = app.input.cursor_column();
    let skip = (cursor + 1).saturating_sub(available);
    let shown = column_window(app.input.text(), skip, available);

    let line = Line::from(vec![
        Span::styled(PROMPT, Style::default().fg(Color::Cyan)),
        Span::raw(shown),
    ]);
    frame.render_widget(Paragraph::new(line), area);
    frame.set_cursor_position((
        area.x + (prompt_width + cursor - skip) as u16,
        area.y,
    ));
    skip
}

fn render_status_line(app: &AppState, frame: &mut Frame, area: Rect) {
    let muted = Style::default().fg(Color::DarkGray);

    let mut right: Vec<Span<'static>> = Vec::new();
    if app.is_scrolled_up() {
        right.push(Span::styled(
            format!("↑ {:.0}%  ", app.scroll.percentage),
            Style::default().fg(Color::Yellow),
        ));
    }
    for (key, action) in HINTS {
        right.push(Span::styled(*key, muted));
        right.push(Span::raw(*action));
    }
    let right = Line::from(right);
    let right_width = right.width() as u16;

    let [left_area, right_area] =
        Layout::horizontal([Constraint::Min(0), Constraint::Length(right_width)]).areas(area);

    let mut left = Vec::new();
    if let Some(frame_glyph) = app.status.spinner_frame(app.now) {
        left.push(Span::styled(frame_glyph, Style::default().fg(Color::Cyan)));
        left.push(Span::raw(" "));
    }
    if let Some(text) = app.status.text() {
        left.push(Span::raw(text.to_string()));
    }
    frame.render_widget(Paragraph::new(Line::from(left)), left_area);
    frame.render_widget(
        Paragraph::new(right).alignment(Alignment::Right),
        right_area,
    );
}

/// Candidate list drawn above the input, anchored at the completed segment.
fn render_autocomplete(app: &AppState, frame: &mut Frame, input: Rect, input_skip: usize) {
    let ac = app.repl.autocomplete();
    if !ac.is_open() || ac.candidates().is_empty() {
        return;
    }
    let rows = ac.candidates().len().min(POPUP_HEIGHT).min(input.y as usize);
    if rows == 0 {
        return;
    }
    let width = ac
        .candidates()
        .iter()
        .map(|c| c.width() + 2)
        .max()
        .unwrap_or(2)
        .min(input.width as usize) as u16;
    let anchor = input.x as usize + PROMPT.width() + ac.anchor_column().saturating_sub(input_skip);
    let x = (anchor as u16).min(input.right().saturating_sub(width));
    let popup = Rect::new(x, input.y - rows as u16, width, rows as u16);

    let start = (ac.selected() + 1).saturating_sub(rows);
    let lines: Vec<Line<'static>> = ac
        .candidates()
        .iter()
        .enumerate()
        .skip(start)
        .take(rows)
        .map(|(i, name)| {
            let style = if i == ac.selected() {
                Style::default().fg(Color::Black).bg(Color::Cyan)
            } else {
                Style::default().fg(Color::White).bg(Color::Indexed(238))
            };
            let padded = format!(" {name:<w$}", w = (width as usize).saturating_sub(1));
            Line::from(Span::styled(padded, style))
        })
        .collect();

    frame.render_widget(Clear, popup);
    frame.render_widget(Paragraph::new(lines), popup);
}

/// Slice of `text` starting `skip` display columns in, at most `max`
/// columns wide.
fn column_window(text: &str, skip: usize, max: usize) -> String {
    let mut col = 0;
    let mut out = String::new();
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if col >= skip {
            if col + w - skip > max {
                break;
            }
            out.push(c);
        }
        col += w;
    }
    out
}

/// Converts a string carrying SGR escapes into a styled line.
pub fn styled_line(text: &str, color: bool) -> Line<'static> {
    if !color {
        return Line::raw(ansi::strip(text).into_owned());
    }
    ansi::segments(text)
        .into_iter()
        .map(|seg| Span::styled(seg.text, to_style(seg.style)))
        .collect()
}

fn to_style(sgr: SgrStyle) -> Style {
    let mut style = Style::default();
    if let Some(fg) = sgr.fg {
        style = style.fg(to_color(fg));
    }
    if let Some(bg) = sgr.bg {
        style = style.bg(to_color(bg));
    }
    let flags = [
        (sgr.bold, Modifier::BOLD),
        (sgr.dim, Modifier::DIM),
        (sgr.italic, Modifier::ITALIC),
        (sgr.underline, Modifier::UNDERLINED),
    ];
    for (on, modifier) in flags {
        if on {
            style = style.add_modifier(modifier);
        }
    }
    style
}

fn to_color(color: AnsiColor) -> Color {
    match color {
        AnsiColor::Indexed(n) => match n {
            0 => Color::Black,
            1 => Color::Red,
            2 => Color::Green,
            3 => Color::Yellow,
            4 => Color::Blue,
            5 => Color::Magenta,
            6 => Color::Cyan,
            7 => Color::Gray,
            8 => Color::DarkGray,
            9 => Color::LightRed,
            10 => Color::LightGreen,
            11 => Color::LightYellow,
            12 => Color::LightBlue,
            13 => Color::LightMagenta,
            14 => Color::LightCyan,
            15 => Color::White,
            n => Color::Indexed(n),
        },
        AnsiColor::Rgb(r, g, b) => Color::Rgb(r, g, b),
    }
}

#[cfg(test)]
mod tests {
    use logdeck_core::ansi::esc;

    use super::*;

    #[test]
    fn test_styled_line_maps_sgr_to_spans() {
        let line = styled_line(&format!("a{}", esc("31", "b")), true);
        assert_eq!(line.spans.len(), 2);
        assert_eq!(line.spans[0].content, "a");
        assert_eq!(line.spans[1].content, "b");
        assert_eq!(line.spans[1].style.fg, Some(Color::Red));
    }

    #[test]
    fn test_styled_line_without_color_strips() {
        let line = styled_line(&esc("1;33", "warn"), false);
        assert_eq!(line.spans.len(), 1);
        assert_eq!(line.spans[0].content, "warn");
        assert_eq!(line.spans[0].style, Style::default());
    }

    #[test]
    fn test_extended_colors() {
        let line = styled_line(&esc("38;5;74", "x"), true);
        assert_eq!(line.spans[0].style.fg, Some(Color::Indexed(74)));
    }

    #[test]
    fn test_column_window_respects_wide_chars() {
        assert_eq!(column_window("abcdef", 2, 3), "cde");
        assert_eq!(column_window("日本語", 2, 3), "本");
        assert_eq!(column_window("abc", 0, 10), "abc");
    }

    #[test]
    fn test_scrollback_area_leaves_room_for_chrome() {
        let area = scrollback_area(Rect::new(0, 0, 80, 24));
        assert_eq!(area, Rect::new(0, 0, 79, 22));
        let tiny = scrollback_area(Rect::new(0, 0, 1, 1));
        assert_eq!((tiny.width, tiny.height), (0, 0));
    }
}
