//! Single-line input editor for the REPL prompt.
//!
//! The cursor is a byte offset that always sits on a grapheme boundary.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

#[derive(Debug, Clone, Default)]
pub struct InputLine {
    text: String,
    cursor: usize,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum CharClass {
    Whitespace,
    Word,
    Punct,
}

fn char_class(c: char) -> CharClass {
    if c.is_whitespace() {
        CharClass::Whitespace
    } else if c.is_alphanumeric() || c == '_' || c == '$' {
        CharClass::Word
    } else {
        CharClass::Punct
    }
}

impl InputLine {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn cursor_at_end(&self) -> bool {
        self.cursor == self.text.len()
    }

    /// Display column of the cursor.
    pub fn cursor_column(&self) -> usize {
        self.text[..self.cursor].width()
    }

    /// Replaces the whole line and puts the cursor at the end.
    pub fn set(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.cursor = self.text.len();
    }

    /// Empties the line, returning what it held.
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.text)
    }

    /// Inserts at the cursor. Line breaks become spaces.
    pub fn insert_str(&mut self, s: &str) {
        let flat: String = s
            .chars()
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .collect();
        self.text.insert_str(self.cursor, &flat);
        self.cursor += flat.len();
    }

    pub fn insert_char(&mut self, c: char) {
        let mut buf = [0u8; 4];
        self.insert_str(c.encode_utf8(&mut buf));
    }

    fn prev_boundary(&self) -> usize {
        self.text[..self.cursor]
            .grapheme_indices(true)
            .next_back()
            .map_or(0, |(i, _)| i)
    }

    fn next_boundary(&self) -> usize {
        self.text[self.cursor..]
            .graphemes(true)
            .next()
            .map_or(self.cursor, |g| self.cursor + g.len())
    }

    pub fn move_left(&mut self) {
        self.cursor = self.prev_boundary();
    }

    pub fn move_right(&mut self) {
        self.cursor = self.next_boundary();
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.text.len();
    }

    /// Backspace.
    pub fn delete_prev(&mut self) {
        let start = self.prev_boundary();
        self.text.replace_range(start..self.cursor, "");
        self.cursor = start;
    }

    /// Delete.
    pub fn delete_next(&mut self) {
        let end = self.next_boundary();
        self.text.replace_range(self.cursor..end, "");
    }

    /// Ctrl+U.
    pub fn delete_to_start(&mut self) {
        self.text.replace_range(..self.cursor, "");
        self.cursor = 0;
    }

    /// Ctrl+K.
    pub fn delete_to_end(&mut self) {
        self.text.truncate(self.cursor);
    }

    /// Ctrl+W: deletes one run of same-class characters left of the cursor.
    pub fn delete_word_left(&mut self) {
        let head = &self.text[..self.cursor];
        let Some(last) = head.chars().next_back() else {
            return;
        };
        let class = char_class(last);
        let start = head
            .char_indices()
            .rev()
            .find(|(_, c)| char_class(*c) != class)
            .map_or(0, |(i, c)| i + c.len_utf8());
        self.text.replace_range(start..self.cursor, "");
        self.cursor = start;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str) -> InputLine {
        let mut input = InputLine::default();
        input.set(text);
        input
    }

    #[test]
    fn test_insert_in_the_middle() {
        let mut input = line("Mth.max");
        input.move_home();
        input.move_right();
        input.insert_char('a');
        assert_eq!(input.text(), "Math.max");
        assert_eq!(input.cursor_column(), 2);
    }

    #[test]
    fn test_paste_flattens_newlines() {
        let mut input = InputLine::default();
        input.insert_str("1 +\n2");
        assert_eq!(input.text(), "1 + 2");
    }

    #[test]
    fn test_delete_word_left_by_segments() {
        let mut input = line("process.env.HOME");
        input.delete_word_left();
        assert_eq!(input.text(), "process.env.");
        input.delete_word_left();
        assert_eq!(input.text(), "process.env");
        input.delete_word_left();
        assert_eq!(input.text(), "process.");
    }

    #[test]
    fn test_kill_to_start_and_end() {
        let mut input = line("let a = 1");
        input.move_home();
        for _ in 0..4 {
            input.move_right();
        }
        input.delete_to_end();
        assert_eq!(input.text(), "let ");
        input.insert_str("b");
        input.delete_to_start();
        assert_eq!(input.text(), "");
    }

    #[test]
    fn test_graphemes_move_as_one() {
        let mut input = line("a\u{0301}b");
        input.move_home();
        input.move_right();
        input.delete_prev();
        assert_eq!(input.text(), "b");
        input.delete_next();
        assert!(input.is_empty());
    }

    #[test]
    fn test_wide_characters_report_display_column() {
        let input = line("日本");
        assert_eq!(input.cursor_column(), 4);
    }
}
