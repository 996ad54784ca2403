//! Scrollbar for the scrollback viewport.
//!
//! The thumb length is computed once from the content/viewport ratio so it
//! does not change size while scrolling, and it touches the bottom of the
//! track exactly when the viewport is at the newest line.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::Widget;

const THUMB_SYMBOL: &str = "█";
const TRACK_SYMBOL: &str = "│";

#[derive(Debug, Clone)]
pub struct Scrollbar {
    total_lines: usize,
    viewport_height: usize,
    /// Top line of the viewport.
    offset: usize,
}

impl Scrollbar {
    pub fn new(total_lines: usize, viewport_height: usize, offset: usize) -> Self {
        Self {
            total_lines,
            viewport_height,
            offset,
        }
    }

    fn should_display(&self) -> bool {
        self.total_lines > self.viewport_height
    }

    /// Thumb start and length on a track of `track_len` cells.
    fn thumb(&self, track_len: usize) -> Option<(usize, usize)> {
        let max_offset = self.total_lines.saturating_sub(self.viewport_height);
        if !self.should_display() || track_len == 0 || max_offset == 0 {
            return None;
        }
        let viewport_len = self.viewport_height.min(track_len);
        let denom = (self.total_lines - 1 + viewport_len) as u64;
        let rounded = (track_len as u64 * viewport_len as u64 + denom / 2) / denom;
        let len = (rounded as usize).clamp(1, track_len);
        let available = track_len - len;
        let start = (self.offset.min(max_offset) as u64 * available as u64 / max_offset as u64)
            as usize;
        Some((start, len))
    }
}

impl Widget for Scrollbar {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some((start, len)) = self.thumb(area.height as usize) else {
            return;
        };
        let x = area.x + area.width.saturating_sub(1);
        let style = Style::default().fg(Color::DarkGray);
        for (idx, y) in (area.y..area.y + area.height).enumerate() {
            let symbol = if idx >= start && idx < start + len {
                THUMB_SYMBOL
            } else {
                TRACK_SYMBOL
            };
            buf.set_string(x, y, symbol, style);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_when_content_fits() {
        assert!(Scrollbar::new(10, 20, 0).thumb(20).is_none());
        assert!(Scrollbar::new(20, 20, 0).thumb(20).is_none());
    }

    #[test]
    fn test_thumb_keeps_its_length() {
        let top = Scrollbar::new(100, 20, 0).thumb(20).unwrap();
        let middle = Scrollbar::new(100, 20, 40).thumb(20).unwrap();
        let bottom = Scrollbar::new(100, 20, 80).thumb(20).unwrap();
        assert_eq!(top.0, 0);
        assert_eq!(top.1, middle.1);
        assert_eq!(middle.1, bottom.1);
        assert_eq!(bottom.0 + bottom.1, 20);
    }
}
