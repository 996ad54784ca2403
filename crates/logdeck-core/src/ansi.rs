//! Escape-aware text measurement and layout.
//!
//! Everything here treats `ESC [ digits (;digits)* m` as zero-width and
//! atomic: widths ignore it and wrapping never splits it.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::error::RenderError;

pub const RESET: &str = "\x1b[0m";

static SGR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9]+(?:;[0-9]+)*m").expect("SGR pattern is a valid static regex")
});

static LITERAL_SGR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(?:u001[bB]|x1[bB])\[[0-9]+(?:;[0-9]+)*m")
        .expect("literal SGR pattern is a valid static regex")
});

/// Wraps `text` in the given SGR code followed by a reset.
pub fn esc(code: &str, text: &str) -> String {
    format!("\x1b[{code}m{text}{RESET}")
}

/// Display width of `s` with escape sequences excluded.
pub fn visible_length(s: &str) -> usize {
    strip(s).width()
}

/// Removes every SGR escape sequence.
pub fn strip(s: &str) -> Cow<'_, str> {
    SGR.replace_all(s, "")
}

/// Like [`strip`], but also removes backslash-escaped spellings of the same
/// sequences (`\u001b[31m`, `\x1b[0m`) left behind by serialization.
pub fn strip_literal(s: &str) -> String {
    let stripped = strip(s);
    LITERAL_SGR.replace_all(&stripped, "").into_owned()
}

/// A piece of a styled string: either an escape sequence or one visible char.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Escape(&'a str),
    Char(char),
}

fn tokens(s: &str) -> Vec<Token<'_>> {
    let mut out = Vec::with_capacity(s.len());
    let mut last = 0;
    for m in SGR.find_iter(s) {
        out.extend(s[last..m.start()].chars().map(Token::Char));
        out.push(Token::Escape(m.as_str()));
        last = m.end();
    }
    out.extend(s[last..].chars().map(Token::Char));
    out
}

/// Tracks which SGR sequences are in effect so they can be closed before a
/// line break and reopened after the continuation indent.
#[derive(Debug, Default)]
struct SgrState {
    open: Vec<String>,
}

impl SgrState {
    fn apply(&mut self, seq: &str) {
        if is_reset(seq) {
            self.open.clear();
        } else {
            self.open.push(seq.to_string());
        }
    }

    fn is_active(&self) -> bool {
        !self.open.is_empty()
    }

    fn reopen(&self, out: &mut String) {
        for seq in &self.open {
            out.push_str(seq);
        }
    }
}

fn is_reset(seq: &str) -> bool {
    let params = &seq[2..seq.len() - 1];
    params.split(';').all(|p| p.trim_start_matches('0').is_empty())
}

/// Indents and hard-wraps `text` for a viewport `width` columns wide.
///
/// When `wrap_first_line` is set, the first line is assumed to already start
/// with `prefix` and is left unindented; every other line (and every wrapped
/// continuation) is indented by `visible_length(prefix)` spaces, capped at
/// `width - 1` so every row keeps at least one column for text. Lines are
/// split at the visible column, never inside an escape sequence, and the
/// active color is reset before each break and restored after the indent.
///
/// # Errors
/// Returns [`RenderError::ZeroWidth`] when `width` is zero.
pub fn wrap_and_indent(
    text: &str,
    prefix: &str,
    wrap_first_line: bool,
    width: usize,
) -> Result<String, RenderError> {
    if width == 0 {
        return Err(RenderError::ZeroWidth);
    }

    let indent_width = visible_length(prefix).min(width - 1);
    let indent = " ".repeat(indent_width);
    let mut state = SgrState::default();
    let mut out = String::with_capacity(text.len() + indent_width * 2);

    for (line_nr, line) in text.split('\n').enumerate() {
        let mut column = 0;
        let mut row_start = 0;
        if line_nr > 0 {
            if state.is_active() {
                out.push_str(RESET);
            }
            out.push('\n');
        }
        if line_nr > 0 || !wrap_first_line {
            out.push_str(&indent);
            state.reopen(&mut out);
            column = indent_width;
            row_start = indent_width;
        }

        for token in tokens(line) {
            match token {
                Token::Escape(seq) => {
                    state.apply(seq);
                    out.push_str(seq);
                }
                Token::Char(c) => {
                    let w = c.width().unwrap_or(0);
                    // Always place at least one char per row so wrapping terminates.
                    if column + w > width && column > row_start {
                        if state.is_active() {
                            out.push_str(RESET);
                        }
                        out.push('\n');
                        out.push_str(&indent);
                        state.reopen(&mut out);
                        column = indent_width;
                        row_start = indent_width;
                    }
                    out.push(c);
                    column += w;
                }
            }
        }
    }

    Ok(out)
}

/// Color carried by an SGR sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnsiColor {
    Indexed(u8),
    Rgb(u8, u8, u8),
}

/// Style accumulated from SGR sequences, independent of any UI toolkit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SgrStyle {
    pub fg: Option<AnsiColor>,
    pub bg: Option<AnsiColor>,
    pub bold: bool,
    pub dim: bool,
    pub italic: bool,
    pub underline: bool,
}

impl SgrStyle {
    fn apply(&mut self, seq: &str) {
        let params: Vec<u16> = seq[2..seq.len() - 1]
            .split(';')
            .map(|p| p.parse().unwrap_or(0))
            .collect();
        let mut i = 0;
        while i < params.len() {
            match params[i] {
                0 => *self = Self::default(),
                1 => self.bold = true,
                2 => self.dim = true,
                3 => self.italic = true,
                4 => self.underline = true,
                22 => {
                    self.bold = false;
                    self.dim = false;
                }
                23 => self.italic = false,
                24 => self.underline = false,
                n @ 30..=37 => self.fg = Some(AnsiColor::Indexed((n - 30) as u8)),
                n @ 90..=97 => self.fg = Some(AnsiColor::Indexed((n - 90 + 8) as u8)),
                39 => self.fg = None,
                n @ 40..=47 => self.bg = Some(AnsiColor::Indexed((n - 40) as u8)),
                n @ 100..=107 => self.bg = Some(AnsiColor::Indexed((n - 100 + 8) as u8)),
                49 => self.bg = None,
                38 | 48 => {
                    let (color, used) = extended_color(&params[i + 1..]);
                    if params[i] == 38 {
                        self.fg = color.or(self.fg);
                    } else {
                        self.bg = color.or(self.bg);
                    }
                    i += used;
                }
                _ => {}
            }
            i += 1;
        }
    }
}

/// Parses the tail of a `38;...`/`48;...` sequence, returning the color and
/// how many parameters it consumed.
fn extended_color(rest: &[u16]) -> (Option<AnsiColor>, usize) {
    match rest {
        [5, n, ..] => (Some(AnsiColor::Indexed(*n as u8)), 2),
        [2, r, g, b, ..] => (Some(AnsiColor::Rgb(*r as u8, *g as u8, *b as u8)), 4),
        _ => (None, rest.len()),
    }
}

/// A run of text sharing one style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub style: SgrStyle,
}

/// Splits a styled string into runs of uniformly styled text.
pub fn segments(s: &str) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::new();
    let mut style = SgrStyle::default();
    for token in tokens(s) {
        match token {
            Token::Escape(seq) => style.apply(seq),
            Token::Char(c) => match out.last_mut() {
                Some(last) if last.style == style => last.text.push(c),
                _ => out.push(Segment {
                    text: c.to_string(),
                    style,
                }),
            },
        }
    }
    out
}
