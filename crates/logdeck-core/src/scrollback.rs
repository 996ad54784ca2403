//! Ordered, indexable store of log entries plus the scroll and selection
//! state that the render surface reads.
//!
//! Entries are laid out into terminal lines at the current width. The
//! layout keeps the start line of every entry so that both "which entries
//! are visible" and "which entry is under this row" are binary searches.

use serde_json::Value as Json;

use crate::entry::LogEntry;
use crate::error::ScrollbackError;

/// Default bound on the number of live entries.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Scroll mode for the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollMode {
    /// Keep the newest line at the bottom of the viewport.
    FollowLatest,
    /// User scrolled manually; offset is the top line index.
    Anchored { offset: usize },
}

/// Line span of one entry.
#[derive(Debug, Clone, Copy)]
struct EntryLines {
    start_line: usize,
    line_count: usize,
}

/// One row of the visible window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleLine {
    /// Styled text with SGR escapes.
    pub text: String,
    /// Index of the entry the row belongs to.
    pub index: usize,
}

#[derive(Debug)]
pub struct Scrollback {
    entries: Vec<LogEntry>,
    selection: Option<usize>,
    mode: ScrollMode,
    width: usize,
    viewport_height: usize,
    max_entries: usize,
    follow_output: bool,
    layout: Vec<EntryLines>,
    total_lines: usize,
    layout_dirty: bool,
}

impl Default for Scrollback {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl Scrollback {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            selection: None,
            mode: ScrollMode::FollowLatest,
            width: 80,
            viewport_height: 24,
            max_entries: max_entries.max(1),
            follow_output: true,
            layout: Vec::new(),
            total_lines: 0,
            layout_dirty: false,
        }
    }

    /// When disabled, new output arriving at the bottom does not drag the
    /// viewport along.
    #[must_use]
    pub fn with_follow_output(mut self, follow: bool) -> Self {
        self.follow_output = follow;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Updates the render width and viewport height. Width is clamped to 1.
    pub fn set_viewport(&mut self, width: usize, height: usize) {
        let width = width.max(1);
        if width != self.width {
            self.width = width;
            self.layout_dirty = true;
        }
        self.viewport_height = height;
    }

    pub fn viewport_height(&self) -> usize {
        self.viewport_height
    }

    /// Appends `entry` and returns its index.
    pub fn push_line(&mut self, entry: LogEntry) -> usize {
        self.pin_if_not_following();
        self.entries.push(entry);
        let index = self.entries.len() - 1;
        self.entries[index].index = index;
        self.layout_dirty = true;
        let dropped = self.enforce_bound();
        index - dropped
    }

    /// Inserts `entry` directly after the entry at `after`.
    ///
    /// # Errors
    /// [`ScrollbackError::NotFound`] when `after` is not a live index. The new
    /// entry always outlives eviction, since only entries up to `after` can be
    /// dropped to make room.
    pub fn insert_after(&mut self, entry: LogEntry, after: usize) -> Result<usize, ScrollbackError> {
        self.check(after)?;
        self.insert_at(entry, after + 1)
    }

    /// Inserts `entry` so that it ends up at `index`, shifting later entries.
    /// `index == len()` appends.
    ///
    /// # Errors
    /// [`ScrollbackError::NotFound`] when `index` is past the end, or
    /// [`ScrollbackError::Evicted`] when the buffer was full and the new entry
    /// was among the oldest dropped to stay within bound.
    pub fn insert_at(&mut self, entry: LogEntry, index: usize) -> Result<usize, ScrollbackError> {
        if index > self.entries.len() {
            return Err(ScrollbackError::NotFound {
                index,
                len: self.entries.len(),
            });
        }
        self.pin_if_not_following();
        self.entries.insert(index, entry);
        self.reindex_from(index);
        if let Some(sel) = self.selection
            && sel >= index
        {
            self.selection = Some(sel + 1);
        }
        self.layout_dirty = true;
        let dropped = self.enforce_bound();
        if index < dropped {
            return Err(ScrollbackError::Evicted {
                index,
                max: self.max_entries,
            });
        }
        Ok(index - dropped)
    }

    /// Empties the buffer and resets selection and scroll.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.selection = None;
        self.mode = ScrollMode::FollowLatest;
        self.layout.clear();
        self.total_lines = 0;
        self.layout_dirty = false;
        tracing::debug!("scrollback cleared");
    }

    /// # Errors
    /// [`ScrollbackError::NotFound`] when `index` is not a live index.
    pub fn get(&self, index: usize) -> Result<&LogEntry, ScrollbackError> {
        self.entries.get(index).ok_or(ScrollbackError::NotFound {
            index,
            len: self.entries.len(),
        })
    }

    /// # Errors
    /// [`ScrollbackError::NotFound`] when `index` is not a live index.
    pub fn select(&mut self, index: usize) -> Result<(), ScrollbackError> {
        self.check(index)?;
        self.selection = Some(index);
        Ok(())
    }

    pub fn selection(&self) -> Option<usize> {
        self.selection
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// The selected entry exported as JSON, for copying.
    pub fn selection_json(&self) -> Option<Json> {
        self.selection
            .and_then(|i| self.entries.get(i))
            .map(LogEntry::to_json)
    }

    /// Expands the entry's structured value into `Property` entries placed
    /// right after it, or collapses them if already expanded. Returns whether
    /// the entry is expanded afterwards.
    ///
    /// # Errors
    /// [`ScrollbackError::NotFound`] when `index` is not a live index.
    pub fn toggle_expansion(&mut self, index: usize) -> Result<bool, ScrollbackError> {
        self.check(index)?;
        let entry = &self.entries[index];
        if !entry.is_expandable() {
            return Ok(false);
        }
        if entry.is_expanded() {
            let depth = entry.depth();
            let end = self.entries[index + 1..]
                .iter()
                .position(|e| e.kind() != crate::EntryKind::Property || e.depth() <= depth)
                .map_or(self.entries.len(), |p| index + 1 + p);
            let removed = end - (index + 1);
            self.entries.drain(index + 1..end);
            self.entries[index].set_expanded(false);
            self.selection = match self.selection {
                Some(sel) if sel > index && sel < end => Some(index),
                Some(sel) if sel >= end => Some(sel - removed),
                other => other,
            };
            self.reindex_from(index);
            self.layout_dirty = true;
            return Ok(false);
        }
        let children = self.entries[index].children();
        let added = children.len();
        self.entries.splice(index + 1..index + 1, children);
        self.entries[index].set_expanded(true);
        if let Some(sel) = self.selection
            && sel > index
        {
            self.selection = Some(sel + added);
        }
        self.reindex_from(index);
        self.layout_dirty = true;
        let dropped = self.enforce_bound();
        Ok(index >= dropped)
    }

    // ---- scrolling ----

    pub fn mode(&self) -> ScrollMode {
        self.mode
    }

    pub fn is_following(&self) -> bool {
        matches!(self.mode, ScrollMode::FollowLatest)
    }

    pub fn total_lines(&mut self) -> usize {
        self.ensure_layout();
        self.total_lines
    }

    fn max_offset(&self) -> usize {
        self.total_lines.saturating_sub(self.viewport_height)
    }

    /// Top line of the viewport.
    pub fn offset(&mut self) -> usize {
        self.ensure_layout();
        match self.mode {
            ScrollMode::FollowLatest => self.max_offset(),
            ScrollMode::Anchored { offset } => offset.min(self.max_offset()),
        }
    }

    /// How far down the buffer the viewport is, 0.0 (top) to 100.0 (bottom).
    pub fn percentage(&mut self) -> f64 {
        let offset = self.offset();
        let max = self.max_offset();
        if max == 0 {
            0.0
        } else {
            offset as f64 * 100.0 / max as f64
        }
    }

    /// Scrolls by `delta` lines (negative is up). A scroll that leaves the
    /// visible percentage unchanged is undone and reports `false`. Reaching
    /// the bottom switches back to follow mode.
    pub fn scroll(&mut self, delta: isize) -> bool {
        let before_mode = self.mode;
        let before = self.percentage();
        let current = self.offset();
        let max = self.max_offset();
        let target = current.saturating_add_signed(delta).min(max);
        self.mode = if target >= max {
            ScrollMode::FollowLatest
        } else {
            ScrollMode::Anchored { offset: target }
        };
        let after = self.percentage();
        if (before - after).abs() < f64::EPSILON {
            self.mode = before_mode;
            return false;
        }
        true
    }

    pub fn scroll_to_top(&mut self) {
        self.mode = ScrollMode::Anchored { offset: 0 };
    }

    pub fn scroll_to_bottom(&mut self) {
        self.mode = ScrollMode::FollowLatest;
    }

    /// Maps a screen row to the entry rendered there.
    ///
    /// Follow mode maps relative to the bottom-anchored offset; scrolled-up
    /// mode maps relative to the anchored top. Rows outside the viewport or
    /// below the last line give `None`.
    pub fn resolve_coordinate(
        &mut self,
        screen_row: usize,
        viewport_top: usize,
        viewport_height: usize,
        is_scrolled_up: bool,
    ) -> Option<usize> {
        self.ensure_layout();
        let row = screen_row.checked_sub(viewport_top)?;
        if row >= viewport_height {
            return None;
        }
        let bottom_offset = self.total_lines.saturating_sub(viewport_height);
        let offset = match self.mode {
            ScrollMode::Anchored { offset } if is_scrolled_up => offset.min(bottom_offset),
            _ => bottom_offset,
        };
        self.entry_at_line(offset + row)
    }

    fn entry_at_line(&self, line: usize) -> Option<usize> {
        if line >= self.total_lines {
            return None;
        }
        let i = self
            .layout
            .partition_point(|l| l.start_line + l.line_count <= line);
        (i < self.layout.len()).then_some(i)
    }

    /// Styled rows currently in view, top-aligned.
    pub fn visible_lines(&mut self, viewport_height: usize) -> Vec<VisibleLine> {
        self.viewport_height = viewport_height;
        self.ensure_layout();
        let offset = self.offset();
        let end = (offset + viewport_height).min(self.total_lines);
        if offset >= end {
            return Vec::new();
        }
        let first = self
            .layout
            .partition_point(|l| l.start_line + l.line_count <= offset);
        let last = self.layout.partition_point(|l| l.start_line < end);

        let width = self.width;
        let mut rows = Vec::with_capacity(end - offset);
        for index in first..last {
            let start = self.layout[index].start_line;
            let lines = self.entries[index].lines(width);
            for (n, text) in lines.iter().enumerate() {
                let line = start + n;
                if line >= offset && line < end {
                    rows.push(VisibleLine {
                        text: text.clone(),
                        index,
                    });
                }
            }
        }
        rows
    }

    // ---- internals ----

    fn check(&self, index: usize) -> Result<(), ScrollbackError> {
        if index < self.entries.len() {
            Ok(())
        } else {
            Err(ScrollbackError::NotFound {
                index,
                len: self.entries.len(),
            })
        }
    }

    fn reindex_from(&mut self, start: usize) {
        for (i, entry) in self.entries.iter_mut().enumerate().skip(start) {
            entry.index = i;
        }
    }

    /// Freezes the viewport before new output when following is disabled.
    fn pin_if_not_following(&mut self) {
        if !self.follow_output && self.is_following() {
            let offset = self.offset();
            self.mode = ScrollMode::Anchored { offset };
        }
    }

    /// Drops the oldest entries beyond the bound; returns how many went.
    fn enforce_bound(&mut self) -> usize {
        let excess = self.entries.len().saturating_sub(self.max_entries);
        if excess == 0 {
            return 0;
        }
        let width = self.width;
        let removed_lines: usize = self.entries[..excess]
            .iter_mut()
            .map(|e| e.line_count(width))
            .sum();
        self.entries.drain(..excess);
        self.reindex_from(0);
        self.selection = self.selection.and_then(|s| s.checked_sub(excess));
        if let ScrollMode::Anchored { offset } = self.mode {
            self.mode = ScrollMode::Anchored {
                offset: offset.saturating_sub(removed_lines),
            };
        }
        self.layout_dirty = true;
        tracing::debug!(excess, "dropped oldest scrollback entries");
        excess
    }

    fn ensure_layout(&mut self) {
        if !self.layout_dirty && self.layout.len() == self.entries.len() {
            return;
        }
        let width = self.width;
        self.layout.clear();
        let mut cumulative = 0;
        for entry in &mut self.entries {
            let line_count = entry.line_count(width);
            self.layout.push(EntryLines {
                start_line: cumulative,
                line_count,
            });
            cumulative += line_count;
        }
        self.total_lines = cumulative;
        self.layout_dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ansi;

    fn filled(n: usize) -> Scrollback {
        let mut sb = Scrollback::default();
        sb.set_viewport(40, 5);
        for i in 0..n {
            sb.push_line(LogEntry::plain(format!("line {i}")));
        }
        sb
    }

    fn plain_text(sb: &Scrollback, i: usize) -> String {
        ansi::strip(&sb.get(i).unwrap().text()).into_owned()
    }

    #[test]
    fn test_push_assigns_dense_indices() {
        let sb = filled(3);
        let indices: Vec<usize> = sb.entries().map(LogEntry::index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_insert_after_places_entry_and_shifts() {
        let mut sb = filled(3);
        sb.select(2).unwrap();
        let at = sb.insert_after(LogEntry::plain("inserted"), 0).unwrap();
        assert_eq!(at, 1);
        assert_eq!(plain_text(&sb, 1), "inserted");
        assert_eq!(plain_text(&sb, 2), "line 1");
        assert_eq!(sb.selection(), Some(3));
        let indices: Vec<usize> = sb.entries().map(LogEntry::index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_insert_after_unknown_index_fails() {
        let mut sb = filled(2);
        let err = sb.insert_after(LogEntry::plain("x"), 5).unwrap_err();
        assert_eq!(err, ScrollbackError::NotFound { index: 5, len: 2 });
    }

    #[test]
    fn test_insert_at_front_and_end() {
        let mut sb = filled(2);
        assert_eq!(sb.insert_at(LogEntry::plain("first"), 0).unwrap(), 0);
        assert_eq!(sb.insert_at(LogEntry::plain("last"), 3).unwrap(), 3);
        assert_eq!(plain_text(&sb, 0), "first");
        assert_eq!(plain_text(&sb, 1), "line 0");
        assert_eq!(plain_text(&sb, 3), "last");
        assert!(sb.insert_at(LogEntry::plain("x"), 9).is_err());
    }

    #[test]
    fn test_insert_at_front_of_full_buffer_is_evicted() {
        let mut sb = Scrollback::new(2);
        sb.push_line(LogEntry::plain("old"));
        sb.push_line(LogEntry::plain("new"));
        let err = sb.insert_at(LogEntry::plain("front"), 0).unwrap_err();
        assert_eq!(err, ScrollbackError::Evicted { index: 0, max: 2 });
        assert_eq!(sb.len(), 2);
        assert_eq!(plain_text(&sb, 0), "old");
        assert_eq!(plain_text(&sb, 1), "new");

        // Inserting past the evicted slot still reports the surviving index.
        assert_eq!(sb.insert_at(LogEntry::plain("mid"), 1).unwrap(), 0);
        assert_eq!(plain_text(&sb, 0), "mid");
        assert_eq!(plain_text(&sb, 1), "new");
    }

    #[test]
    fn test_clear_resets_state() {
        let mut sb = filled(10);
        sb.select(3).unwrap();
        sb.scroll(-2);
        sb.clear();
        assert!(sb.is_empty());
        assert_eq!(sb.selection(), None);
        assert!(sb.is_following());
    }

    #[test]
    fn test_bound_drops_oldest_and_keeps_selection_consistent() {
        let mut sb = Scrollback::new(3);
        for i in 0..3 {
            sb.push_line(LogEntry::plain(format!("{i}")));
        }
        sb.select(1).unwrap();
        let index = sb.push_line(LogEntry::plain("3"));
        assert_eq!(index, 2);
        assert_eq!(sb.len(), 3);
        assert_eq!(plain_text(&sb, 0), "1");
        assert_eq!(sb.selection(), Some(0));
    }

    #[test]
    fn test_scroll_clamps_and_reports_noop() {
        let mut sb = filled(10);
        assert!(!sb.scroll(3), "already at the bottom");
        assert!(sb.scroll(-3));
        assert_eq!(sb.offset(), 2);
        assert!(sb.scroll(-100));
        assert_eq!(sb.offset(), 0);
        assert!(!sb.scroll(-1), "already at the top");
        assert!(sb.scroll(100));
        assert!(sb.is_following());
    }

    #[test]
    fn test_short_buffer_does_not_scroll() {
        let mut sb = filled(2);
        assert!(!sb.scroll(-1));
        assert!(sb.is_following());
    }

    #[test]
    fn test_visible_lines_follow_latest() {
        let mut sb = filled(10);
        let rows = sb.visible_lines(5);
        let indices: Vec<usize> = rows.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![5, 6, 7, 8, 9]);
        assert_eq!(ansi::strip(&rows[0].text), "line 5");
    }

    #[test]
    fn test_resolve_coordinate_inverts_layout() {
        let mut sb = Scrollback::default();
        sb.set_viewport(6, 4);
        sb.push_line(LogEntry::plain("a"));
        sb.push_line(LogEntry::plain("wrapped text"));
        sb.push_line(LogEntry::plain("c"));
        sb.push_line(LogEntry::plain("d"));
        for following in [true, false] {
            if !following {
                sb.scroll(-1);
            }
            let rows = sb.visible_lines(4);
            for (row, line) in rows.iter().enumerate() {
                let resolved = sb.resolve_coordinate(row + 2, 2, 4, !following);
                assert_eq!(resolved, Some(line.index));
            }
        }
        assert_eq!(sb.resolve_coordinate(1, 2, 4, false), None);
        assert_eq!(sb.resolve_coordinate(6, 2, 4, false), None);
    }

    #[test]
    fn test_top_aligned_rows_below_content_resolve_to_none() {
        let mut sb = filled(2);
        assert_eq!(sb.resolve_coordinate(0, 0, 5, false), Some(0));
        assert_eq!(sb.resolve_coordinate(3, 0, 5, false), None);
    }

    #[test]
    fn test_toggle_expansion_inserts_and_removes_properties() {
        let mut sb = filled(1);
        let mut obj = crate::eval::Object::new();
        obj.set("a", crate::eval::Value::Number(1.0));
        obj.set("b", crate::eval::Value::Number(2.0));
        let idx = sb.push_line(LogEntry::eval_output(&crate::eval::Value::object(obj)));
        sb.push_line(LogEntry::plain("after"));

        assert!(sb.toggle_expansion(idx).unwrap());
        assert_eq!(sb.len(), 5);
        assert_eq!(plain_text(&sb, 2), "  a: 1");
        assert_eq!(plain_text(&sb, 4), "after");

        assert!(!sb.toggle_expansion(idx).unwrap());
        assert_eq!(sb.len(), 3);
        assert_eq!(plain_text(&sb, 2), "after");
        assert!(!sb.toggle_expansion(0).unwrap());
    }

    #[test]
    fn test_selection_json_exports_entry() {
        let mut sb = filled(2);
        assert!(sb.selection_json().is_none());
        sb.select(1).unwrap();
        let json = sb.selection_json().unwrap();
        assert_eq!(json["index"], 1);
        assert_eq!(json["args"][0], "line 1");
    }
}
