//! Application state for the console surface.
//!
//! ```text
//! AppState
//! ├── scrollback: Scrollback   (entries, scroll, selection)
//! ├── repl: ReplSession        (history, autocomplete, evaluator)
//! ├── input: InputLine         (prompt being edited)
//! ├── status: Status           (status text + spinner)
//! └── view: Vec<VisibleLine>   (rows refreshed before each draw)
//! ```

use std::time::Instant;

use logdeck_core::Scrollback;
use logdeck_core::config::{ColorMode, Config};
use logdeck_core::repl::ReplSession;
use logdeck_core::scrollback::VisibleLine;
use logdeck_core::status::Status;
use ratatui::layout::Rect;

use crate::input::InputLine;

/// Scroll position as of the last view refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollMetrics {
    pub total_lines: usize,
    pub offset: usize,
    pub percentage: f64,
}

pub struct AppState {
    pub should_quit: bool,
    /// Set by the reducer when the next loop iteration must redraw.
    pub dirty: bool,
    pub scrollback: Scrollback,
    pub repl: ReplSession,
    pub input: InputLine,
    pub status: Status,
    pub color: bool,
    pub page_lines: usize,
    pub wheel_lines: usize,
    /// Terminal size seen by the last `Frame` event.
    pub terminal_size: (u16, u16),
    /// Screen area of the scrollback viewport.
    pub viewport: Rect,
    pub view: Vec<VisibleLine>,
    pub scroll: ScrollMetrics,
    /// Time of the last tick; the spinner is drawn relative to it.
    pub now: Instant,
}

impl AppState {
    pub fn new(config: &Config, repl: ReplSession) -> Self {
        let scrollback = Scrollback::new(config.scrollback.max_entries)
            .with_follow_output(config.scrollback.follow_output);
        Self {
            should_quit: false,
            dirty: true,
            scrollback,
            repl,
            input: InputLine::default(),
            status: Status::default(),
            // The surface paints through crossterm, so only `never` turns color off.
            color: config.color != ColorMode::Never,
            page_lines: config.scrollback.page_lines.max(1),
            wheel_lines: config.scrollback.wheel_lines.max(1),
            terminal_size: (0, 0),
            viewport: Rect::default(),
            view: Vec::new(),
            scroll: ScrollMetrics::default(),
            now: Instant::now(),
        }
    }

    /// Whether the user scrolled away from the newest output.
    pub fn is_scrolled_up(&self) -> bool {
        !self.scrollback.is_following()
    }
}
