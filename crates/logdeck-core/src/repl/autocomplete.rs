//! Member-name completion for the REPL input.

use crate::eval::NameEnumerator;

/// Height of the popup listing candidates.
pub const POPUP_HEIGHT: usize = 6;

#[derive(Debug, Clone, Default)]
pub struct Autocomplete {
    /// Input up to and including the last `.` of the completed expression.
    base: String,
    prefix: String,
    candidates: Vec<String>,
    selected: usize,
    open: bool,
}

fn is_path_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '.'
}

impl Autocomplete {
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_candidate(&self) -> Option<&str> {
        self.open
            .then(|| self.candidates.get(self.selected))
            .flatten()
            .map(String::as_str)
    }

    /// Column of the completed segment within the input, for anchoring.
    pub fn anchor_column(&self) -> usize {
        self.base.chars().count()
    }

    pub fn close(&mut self) {
        self.open = false;
        self.candidates.clear();
        self.selected = 0;
    }

    /// Recomputes candidates for `input`. Only the trailing dotted path is
    /// completed: `foo(Math.fl` completes `fl` against `Math`.
    pub fn update(&mut self, input: &str, names: &dyn NameEnumerator) {
        let start = input
            .char_indices()
            .rev()
            .find(|(_, c)| !is_path_char(*c))
            .map_or(0, |(i, c)| i + c.len_utf8());
        let expr = &input[start..];
        if expr.is_empty() || expr.starts_with('.') {
            self.close();
            return;
        }

        let (path, prefix) = match expr.rfind('.') {
            Some(dot) => (&expr[..dot], &expr[dot + 1..]),
            None => ("", expr),
        };
        let segments: Vec<&str> = if path.is_empty() {
            Vec::new()
        } else {
            path.split('.').collect()
        };
        if segments.iter().any(|s| s.is_empty()) {
            self.close();
            return;
        }

        let Some(all) = names.names_at(&segments) else {
            self.close();
            return;
        };
        let candidates: Vec<String> = all
            .into_iter()
            .filter(|name| name.starts_with(prefix))
            .collect();
        if candidates.is_empty() || (candidates.len() == 1 && candidates[0] == prefix) {
            self.close();
            return;
        }

        let keep = self.open && self.prefix == prefix && self.candidates == candidates;
        self.base = input[..input.len() - prefix.len()].to_string();
        self.prefix = prefix.to_string();
        self.candidates = candidates;
        if !keep {
            self.selected = 0;
        }
        self.open = true;
    }

    pub fn select_next(&mut self) {
        if self.open && self.selected + 1 < self.candidates.len() {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        if self.open {
            self.selected = self.selected.saturating_sub(1);
        }
    }

    /// Replaces the completed segment with the selected candidate and
    /// returns the new input. The popup closes; callers reopen it against
    /// the returned text.
    pub fn accept(&mut self) -> Option<String> {
        let candidate = self.selected_candidate()?.to_string();
        let input = format!("{}{candidate}", self.base);
        self.close();
        Some(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{Context, Value};

    fn context() -> Context {
        let mut ctx = Context::new();
        ctx.expose("profile", Value::from("dev"));
        ctx
    }

    #[test]
    fn test_own_names_before_globals() {
        let ctx = context();
        let mut ac = Autocomplete::default();
        ac.update("pro", &ctx);
        assert!(ac.is_open());
        assert_eq!(ac.candidates(), ["profile", "process"]);
    }

    #[test]
    fn test_member_path_resolution() {
        let ctx = context();
        let mut ac = Autocomplete::default();
        ac.update("Math.fl", &ctx);
        assert_eq!(ac.candidates(), ["floor"]);
        assert_eq!(ac.prefix(), "fl");
        assert_eq!(ac.accept().as_deref(), Some("Math.floor"));
        assert!(!ac.is_open());
    }

    #[test]
    fn test_prototype_names_follow_own_names() {
        let ctx = context();
        let mut ac = Autocomplete::default();
        ac.update("profile.", &ctx);
        let names = ac.candidates();
        assert_eq!(names[0], "length");
        let to_upper = names.iter().position(|n| n == "toUpperCase").unwrap();
        let has_own = names.iter().position(|n| n == "hasOwnProperty").unwrap();
        assert!(to_upper < has_own);
    }

    #[test]
    fn test_completes_trailing_expression_only() {
        let ctx = context();
        let mut ac = Autocomplete::default();
        ac.update("[1, 2].concat(Math.ma", &ctx);
        assert_eq!(ac.candidates(), ["max"]);
        assert_eq!(
            ac.accept().as_deref(),
            Some("[1, 2].concat(Math.max")
        );
    }

    #[test]
    fn test_closing_is_idempotent() {
        let ctx = context();
        let mut ac = Autocomplete::default();
        ac.update("", &ctx);
        assert!(!ac.is_open());
        ac.update("zzz", &ctx);
        assert!(!ac.is_open());
        ac.update("nope.x", &ctx);
        assert!(!ac.is_open());
        ac.close();
        ac.close();
        assert!(ac.accept().is_none());
    }

    #[test]
    fn test_selection_moves_within_bounds() {
        let ctx = context();
        let mut ac = Autocomplete::default();
        ac.update("pro", &ctx);
        ac.select_prev();
        assert_eq!(ac.selected(), 0);
        ac.select_next();
        ac.select_next();
        assert_eq!(ac.selected_candidate(), Some("process"));
    }
}
