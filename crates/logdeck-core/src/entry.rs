//! Scrollback entries.
//!
//! An entry owns its formatted text (with SGR escapes) and lazily wraps it
//! to the current width. The cache is keyed by width, so a resize simply
//! misses and re-wraps.

use chrono::{DateTime, Local};
use serde_json::{Value as Json, json};

use crate::ansi;
use crate::caller::CallerInfo;
use crate::eval::{Value, inspect};
use crate::verbosity::Verbosity;

/// Which kind of record an entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Free text with no arguments attached.
    Plain,
    /// A routed logging call: header plus formatted arguments.
    Args,
    /// Echo of a submitted REPL command.
    Command,
    /// Result of evaluating a REPL command.
    EvalOutput,
    /// An evaluation failure or an error-level routed call.
    Error,
    /// One member of an expanded structured value.
    Property,
    /// A line written to a raw output stream.
    StringLine,
    Other,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Args => "args",
            Self::Command => "command",
            Self::EvalOutput => "eval_output",
            Self::Error => "error",
            Self::Property => "property",
            Self::StringLine => "string",
            Self::Other => "other",
        }
    }
}

const COMMAND_COLOR: &str = "38;5;74";
const MUTED: &str = "90";

#[derive(Debug, Clone)]
struct Rendered {
    width: usize,
    lines: Vec<String>,
}

/// One logical record in the scrollback.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub(crate) index: usize,
    kind: EntryKind,
    label: String,
    verbosity: Verbosity,
    timestamp: DateTime<Local>,
    caller: Option<CallerInfo>,
    raw_arguments: Vec<Json>,
    /// Styled text shown before the body on the first line.
    prefix: String,
    body: String,
    /// Structured value whose members can be expanded in place.
    target: Option<Json>,
    /// Nesting level for `Property` entries; zero otherwise.
    depth: usize,
    expanded: bool,
    rendered: Option<Rendered>,
}

impl LogEntry {
    fn new(kind: EntryKind, label: &str, body: String) -> Self {
        Self {
            index: 0,
            kind,
            label: label.to_string(),
            verbosity: Verbosity::Info,
            timestamp: Local::now(),
            caller: None,
            raw_arguments: Vec::new(),
            prefix: String::new(),
            body,
            target: None,
            depth: 0,
            expanded: false,
            rendered: None,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut entry = Self::new(EntryKind::Plain, "log", text.clone());
        entry.raw_arguments = vec![Json::String(text)];
        entry
    }

    /// A routed logging call. `message` is the already formatted argument
    /// list; the header is built from `label` and the caller location.
    pub fn args(
        label: &str,
        verbosity: Verbosity,
        raw_arguments: Vec<Json>,
        message: String,
        caller: Option<CallerInfo>,
    ) -> Self {
        let kind = if verbosity <= Verbosity::Error {
            EntryKind::Error
        } else {
            EntryKind::Args
        };
        let mut entry = Self::new(kind, label, message);
        entry.prefix = header(label, caller.as_ref());
        entry.verbosity = verbosity;
        entry.target = raw_arguments
            .iter()
            .find(|v| is_structured(v))
            .cloned();
        entry.raw_arguments = raw_arguments;
        entry.caller = caller;
        entry
    }

    pub fn command(source: &str) -> Self {
        let mut entry = Self::new(EntryKind::Command, "command", ansi::esc(COMMAND_COLOR, source));
        entry.prefix = ansi::esc(MUTED, "> ");
        entry.raw_arguments = vec![Json::String(source.to_string())];
        entry
    }

    pub fn eval_output(value: &Value) -> Self {
        let json = value.to_json();
        let mut entry = Self::new(EntryKind::EvalOutput, "result", inspect(value, true));
        entry.prefix = ansi::esc(MUTED, "< ");
        entry.target = is_structured(&json).then(|| json.clone());
        entry.raw_arguments = vec![json];
        entry
    }

    /// An evaluation failure; `message` may span several lines (a stack).
    pub fn error(message: &str, raw: Json) -> Self {
        let mut entry = Self::new(EntryKind::Error, "error", ansi::esc("31", message));
        entry.prefix = ansi::esc("31", "✖ ");
        entry.verbosity = Verbosity::Error;
        entry.raw_arguments = vec![raw];
        entry
    }

    /// A member of an expanded value, nested one level below its parent.
    pub fn property(key: &str, value: Json, depth: usize) -> Self {
        let shown = inspect(&Value::from_json(&value), true);
        let mut entry = Self::new(EntryKind::Property, "property", shown);
        entry.prefix = format!("{}{}: ", "  ".repeat(depth), ansi::esc("36", key));
        entry.depth = depth;
        entry.target = is_structured(&value).then(|| value.clone());
        entry.raw_arguments = vec![value];
        entry
    }

    /// A line captured from a raw output stream.
    pub fn string_line(label: &str, line: &str) -> Self {
        let mut entry = Self::new(EntryKind::StringLine, label, line.to_string());
        entry.raw_arguments = vec![Json::String(ansi::strip_literal(line))];
        entry
    }

    pub fn other(label: &str, text: impl Into<String>) -> Self {
        Self::new(EntryKind::Other, label, text.into())
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn caller(&self) -> Option<&CallerInfo> {
        self.caller.as_ref()
    }

    pub fn raw_arguments(&self) -> &[Json] {
        &self.raw_arguments
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn is_expandable(&self) -> bool {
        self.target.is_some()
    }

    pub(crate) fn set_expanded(&mut self, expanded: bool) {
        self.expanded = expanded;
    }

    /// Property entries for each member of the expandable value.
    pub(crate) fn children(&self) -> Vec<LogEntry> {
        let depth = self.depth + 1;
        match &self.target {
            Some(Json::Object(map)) => map
                .iter()
                .map(|(k, v)| Self::property(k, v.clone(), depth))
                .collect(),
            Some(Json::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, v)| Self::property(&i.to_string(), v.clone(), depth))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Same entry with every SGR sequence removed.
    #[must_use]
    pub fn without_color(mut self) -> Self {
        self.prefix = ansi::strip(&self.prefix).into_owned();
        self.body = ansi::strip(&self.body).into_owned();
        self.rendered = None;
        self
    }

    /// Full styled text: prefix followed by the body.
    pub fn text(&self) -> String {
        format!("{}{}", self.prefix, self.body)
    }

    /// Wrapped lines for `width`, computed once per width.
    pub fn lines(&mut self, width: usize) -> &[String] {
        let stale = self.rendered.as_ref().is_none_or(|r| r.width != width);
        if stale {
            let lines = self.layout(width);
            self.rendered = Some(Rendered { width, lines });
        }
        self.rendered.as_ref().map_or(&[], |r| r.lines.as_slice())
    }

    pub fn line_count(&mut self, width: usize) -> usize {
        self.lines(width).len()
    }

    fn layout(&self, width: usize) -> Vec<String> {
        let text = self.text();
        let wrapped = match ansi::wrap_and_indent(&text, &self.prefix, true, width) {
            Ok(wrapped) => wrapped,
            Err(err) => {
                tracing::warn!(index = self.index, %err, "falling back to unwrapped entry text");
                text
            }
        };
        wrapped.split('\n').map(str::to_string).collect()
    }

    /// Exported form used by selection copy.
    pub fn to_json(&self) -> Json {
        json!({
            "index": self.index,
            "kind": self.kind.as_str(),
            "label": self.label,
            "verbosity": self.verbosity.as_str(),
            "timestamp": self.timestamp.to_rfc3339(),
            "caller": self.caller,
            "args": self.raw_arguments,
        })
    }
}

fn is_structured(value: &Json) -> bool {
    match value {
        Json::Object(map) => !map.is_empty(),
        Json::Array(items) => !items.is_empty(),
        _ => false,
    }
}

/// `[kind] [file:line] ` with muted brackets and a bold location.
pub fn header(label: &str, caller: Option<&CallerInfo>) -> String {
    let mut out = format!("{}{label}{}", ansi::esc(MUTED, "["), ansi::esc(MUTED, "] "));
    if let Some(caller) = caller {
        out.push_str(&ansi::esc(MUTED, "["));
        out.push_str(&ansi::esc("1", &caller.location_label()));
        out.push_str(&ansi::esc(MUTED, "] "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caller::CallerInfo;

    #[test]
    fn test_header_layout() {
        let caller = CallerInfo::from_parts(None, Some("src/app.rs"), Some(12));
        let h = header("info", Some(&caller));
        assert_eq!(ansi::strip(&h), "[info] [app.rs:12] ");
    }

    #[test]
    fn test_args_entry_wraps_under_header() {
        let mut entry = LogEntry::args(
            "info",
            Verbosity::Info,
            vec![json!("hello world")],
            "hello world".to_string(),
            None,
        );
        let lines: Vec<String> = entry
            .lines(12)
            .iter()
            .map(|l| ansi::strip(l).into_owned())
            .collect();
        assert_eq!(lines[0], "[info] hello");
        assert!(lines[1].starts_with("       "));
        assert_eq!(entry.kind(), EntryKind::Args);
    }

    #[test]
    fn test_error_verbosity_marks_error_kind() {
        let entry = LogEntry::args("error", Verbosity::Error, Vec::new(), "boom".into(), None);
        assert_eq!(entry.kind(), EntryKind::Error);
    }

    #[test]
    fn test_render_cache_follows_width() {
        let mut entry = LogEntry::plain("abcdefghij");
        assert_eq!(entry.line_count(20), 1);
        assert_eq!(entry.line_count(4), 3);
        assert_eq!(entry.line_count(20), 1);
    }

    #[test]
    fn test_eval_output_expansion_children() {
        let mut obj = crate::eval::Object::new();
        obj.set("a", Value::Number(1.0));
        obj.set("b", Value::array(vec![Value::Bool(true)]));
        let entry = LogEntry::eval_output(&Value::object(obj));
        assert!(entry.is_expandable());
        let children = entry.children();
        assert_eq!(children.len(), 2);
        assert_eq!(ansi::strip(&children[0].text()), "  a: 1");
        assert!(children[1].is_expandable());
        assert_eq!(children[1].depth(), 1);
    }

    #[test]
    fn test_primitive_output_is_not_expandable() {
        let entry = LogEntry::eval_output(&Value::Number(2.0));
        assert!(!entry.is_expandable());
        assert_eq!(ansi::strip(&entry.text()), "< 2");
    }
}
