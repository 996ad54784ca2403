//! Bounded command history with a stash for the in-progress input.

use std::fs;
use std::path::Path;

use crate::error::ConfigError;

pub const DEFAULT_MAX_ENTRIES: usize = 500;

#[derive(Debug, Clone)]
pub struct History {
    /// Most recent first.
    entries: Vec<String>,
    /// `None` when not navigating.
    cursor: Option<usize>,
    stash: String,
    max_entries: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl History {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: None,
            stash: String::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Seeds history with entries ordered most recent first.
    #[must_use]
    pub fn with_entries(mut self, entries: Vec<String>) -> Self {
        self.entries = Vec::new();
        for entry in entries.into_iter().rev() {
            self.record(&entry);
        }
        self
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn stash(&self) -> &str {
        &self.stash
    }

    pub fn is_navigating(&self) -> bool {
        self.cursor.is_some()
    }

    /// Puts `command` at the head. An older copy is moved rather than
    /// duplicated. Navigation ends.
    pub fn record(&mut self, command: &str) {
        self.reset_navigation();
        if command.is_empty() {
            return;
        }
        if let Some(pos) = self.entries.iter().position(|e| e == command) {
            self.entries.remove(pos);
        }
        self.entries.insert(0, command.to_string());
        self.entries.truncate(self.max_entries);
    }

    pub fn reset_navigation(&mut self) {
        self.cursor = None;
        self.stash.clear();
    }

    /// Steps to an older entry and returns the text to show.
    ///
    /// The first step stashes `current`. At the oldest entry this stays put.
    pub fn older(&mut self, current: &str) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        let next = match self.cursor {
            None => {
                self.stash = current.to_string();
                0
            }
            Some(idx) if idx + 1 < self.entries.len() => idx + 1,
            Some(idx) => idx,
        };
        self.cursor = Some(next);
        self.entries.get(next).map(String::as_str)
    }

    /// Steps towards the head. Stepping past it restores the stash and
    /// ends navigation. Returns `None` when not navigating.
    pub fn newer(&mut self) -> Option<String> {
        match self.cursor? {
            0 => {
                self.cursor = None;
                Some(std::mem::take(&mut self.stash))
            }
            idx => {
                self.cursor = Some(idx - 1);
                self.entries.get(idx - 1).cloned()
            }
        }
    }

    /// Reads a JSON array of strings, most recent first. A missing file is
    /// an empty history.
    ///
    /// # Errors
    /// [`ConfigError::Read`] or [`ConfigError::History`] when the file exists
    /// but cannot be read or parsed.
    pub fn load(path: &Path, max_entries: usize) -> Result<Self, ConfigError> {
        let history = Self::new(max_entries);
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(history),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let entries: Vec<String> =
            serde_json::from_str(&contents).map_err(|source| ConfigError::History {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(history.with_entries(entries))
    }

    /// Writes the history as a JSON array, creating parent directories.
    ///
    /// # Errors
    /// [`ConfigError::Write`] when the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| write_err(std::io::Error::other(e)))?;
        fs::write(path, json).map_err(write_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(commands: &[&str]) -> History {
        let mut h = History::default();
        for c in commands {
            h.record(c);
        }
        h
    }

    #[test]
    fn test_resubmission_moves_to_head() {
        let h = history(&["a", "b", "a"]);
        assert_eq!(h.entries(), ["a", "b"]);
    }

    #[test]
    fn test_consecutive_duplicates_collapse() {
        let h = history(&["x", "x", "x"]);
        assert_eq!(h.entries(), ["x"]);
    }

    #[test]
    fn test_navigation_restores_stash() {
        let mut h = history(&["a", "b", "a"]);
        assert_eq!(h.older("draft"), Some("a"));
        assert_eq!(h.older("a"), Some("b"));
        assert_eq!(h.older("b"), Some("b"));
        assert_eq!(h.stash(), "draft");
        assert_eq!(h.newer().as_deref(), Some("a"));
        assert_eq!(h.newer().as_deref(), Some("draft"));
        assert!(!h.is_navigating());
        assert_eq!(h.newer(), None);
    }

    #[test]
    fn test_empty_history_does_not_navigate() {
        let mut h = History::default();
        assert_eq!(h.older("typed"), None);
        assert!(!h.is_navigating());
    }

    #[test]
    fn test_bounded() {
        let mut h = History::new(2);
        for c in ["1", "2", "3"] {
            h.record(c);
        }
        assert_eq!(h.entries(), ["3", "2"]);
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.json");
        let h = history(&["first", "second"]);
        h.save(&path).unwrap();

        let loaded = History::load(&path, 10).unwrap();
        assert_eq!(loaded.entries(), ["second", "first"]);
    }

    #[test]
    fn test_missing_file_is_empty_and_garbage_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = History::load(&dir.path().join("none.json"), 10).unwrap();
        assert!(missing.entries().is_empty());

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{not json").unwrap();
        assert!(matches!(
            History::load(&bad, 10),
            Err(ConfigError::History { .. })
        ));
    }
}
