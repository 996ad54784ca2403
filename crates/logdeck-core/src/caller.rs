//! Caller attribution for log entries.
//!
//! Traces are handled as text in the canonical `at <name> (<path>:<line>:<col>)`
//! form, one frame per line after a header line. Captured Rust backtraces are
//! normalized into that form so supplied traces and captured ones share one
//! parser.

use std::backtrace::Backtrace;
use std::fmt;
use std::panic::Location;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Trace lines in front of the first frame a caller can ask for: the header,
/// [`build_caller_info`] itself and the function that called it.
const INTERNAL_FRAMES: usize = 3;

static CANONICAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*at (.+?) \((.+?):(\d+):(\d+)\)\s*$")
        .expect("canonical frame pattern is a valid static regex")
});

static BARE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*at (.+?):(\d+):(\d+)\s*$").expect("bare frame pattern is a valid static regex")
});

static BACKTRACE_SYMBOL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\d+: (.+?)(?:::h[0-9a-f]{16})?\s*$")
        .expect("backtrace symbol pattern is a valid static regex")
});

static BACKTRACE_LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*at (.+:\d+:\d+)\s*$").expect("backtrace location pattern is a valid static regex")
});

/// One parsed stack frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub function_name: String,
    pub file_path: String,
    pub file_name: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl Frame {
    pub fn unknown() -> Self {
        Self {
            function_name: "unknown".to_string(),
            file_path: "unknown".to_string(),
            file_name: "unknown".to_string(),
            line: None,
            column: None,
        }
    }

    fn new(function_name: &str, file_path: &str, line: Option<u32>, column: Option<u32>) -> Self {
        Self {
            function_name: function_name.to_string(),
            file_path: file_path.to_string(),
            file_name: file_name_of(file_path).to_string(),
            line,
            column,
        }
    }

    /// `file:line`, as shown in the entry prefix.
    pub fn location_label(&self) -> String {
        match self.line {
            Some(line) => format!("{}:{line}", self.file_name),
            None => format!("{}:unknown", self.file_name),
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(
                f,
                "at {} ({}:{line}:{column})",
                self.function_name, self.file_path
            ),
            _ => write!(f, "at {} ({})", self.function_name, self.file_path),
        }
    }
}

fn file_name_of(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Parses one stack-trace line.
///
/// Falls back to a bare `at <path>:<line>:<col>` (recorded as `anonymous`),
/// and to an all-`unknown` frame when neither shape matches.
pub fn extract_frame(line: &str) -> Frame {
    if let Some(caps) = CANONICAL.captures(line) {
        return Frame::new(
            &caps[1],
            &caps[2],
            caps[3].parse().ok(),
            caps[4].parse().ok(),
        );
    }
    if let Some(caps) = BARE.captures(line) {
        return Frame::new("anonymous", &caps[1], caps[2].parse().ok(), caps[3].parse().ok());
    }
    Frame::unknown()
}

/// A textual stack trace: a header line followed by frame lines.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StackTrace {
    lines: Vec<String>,
}

impl StackTrace {
    /// Splits trace text (for example an error's stack) into lines.
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    /// Converts the `Display` form of a Rust backtrace into canonical lines,
    /// dropping the frames of the backtrace machinery itself.
    pub fn from_backtrace_text(message: &str, text: &str) -> Self {
        let mut lines = vec![header(message)];
        let mut pending: Option<String> = None;

        for raw in text.lines() {
            if let Some(caps) = BACKTRACE_SYMBOL.captures(raw) {
                if let Some(symbol) = pending.take() {
                    push_frame(&mut lines, &symbol, None);
                }
                pending = Some(caps[1].to_string());
            } else if let Some(caps) = BACKTRACE_LOCATION.captures(raw)
                && let Some(symbol) = pending.take()
            {
                push_frame(&mut lines, &symbol, Some(&caps[1]));
            }
        }
        if let Some(symbol) = pending.take() {
            push_frame(&mut lines, &symbol, None);
        }

        Self { lines }
    }

    /// Captures the current thread's stack.
    #[inline(never)]
    pub fn capture(message: &str) -> Self {
        let backtrace = Backtrace::force_capture();
        Self::from_backtrace_text(message, &backtrace.to_string())
    }

    /// Keeps the header plus at most `frames` frame lines.
    #[must_use]
    pub fn truncated(mut self, frames: usize) -> Self {
        self.lines.truncate(frames + 1);
        self
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

fn push_frame(lines: &mut Vec<String>, symbol: &str, location: Option<&str>) {
    if is_backtrace_internal(symbol) {
        return;
    }
    match location {
        Some(loc) => lines.push(format!("    at {symbol} ({loc})")),
        None => lines.push(format!("    at {symbol}")),
    }
}

fn header(message: &str) -> String {
    if message.is_empty() {
        "Trace".to_string()
    } else {
        format!("Trace: {message}")
    }
}

fn is_backtrace_internal(symbol: &str) -> bool {
    const INTERNAL: &[&str] = &[
        "std::backtrace",
        "<std::backtrace",
        "std::sys::backtrace",
        "backtrace::",
        "logdeck_core::caller::StackTrace::capture",
    ];
    INTERNAL.iter().any(|p| symbol.starts_with(p))
}

/// Structured location attached to a single log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallerInfo {
    #[serde(flatten)]
    pub frame: Frame,
    /// Header line of the trace the info was built from.
    pub message: String,
    /// Every frame after the header, outer to inner as captured.
    pub frames: Vec<Frame>,
    /// Frame the info was re-focused on, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<usize>,
}

impl CallerInfo {
    /// Builds info from a `#[track_caller]` location.
    pub fn from_location(location: &Location<'_>) -> Self {
        let frame = Frame::new(
            "anonymous",
            location.file(),
            Some(location.line()),
            Some(location.column()),
        );
        Self {
            frames: vec![frame.clone()],
            frame,
            message: String::new(),
            level: None,
        }
    }

    /// Builds info from event metadata (module path, file, line).
    pub fn from_parts(module: Option<&str>, file: Option<&str>, line: Option<u32>) -> Self {
        let frame = match file {
            Some(file) => Frame::new(module.unwrap_or("anonymous"), file, line, None),
            None => Frame::unknown(),
        };
        Self {
            frames: vec![frame.clone()],
            frame,
            message: String::new(),
            level: None,
        }
    }

    /// Moves the primary frame to `frames[level]`; out of range keeps it.
    #[must_use]
    pub fn focus(mut self, level: usize) -> Self {
        if let Some(frame) = self.frames.get(level) {
            self.frame = frame.clone();
            self.level = Some(level);
        }
        self
    }

    pub fn location_label(&self) -> String {
        self.frame.location_label()
    }
}

impl fmt::Display for CallerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.location_label())
    }
}

/// Where [`build_caller_info`] gets its trace from.
#[derive(Debug, Clone)]
pub enum CallerSource {
    /// Capture the current stack.
    Capture,
    /// Capture the current stack, using the text as the header message.
    Message(String),
    /// Use a trace obtained elsewhere, such as an error's.
    Trace(StackTrace),
    /// Reuse info built earlier; returned as a copy.
    Info(CallerInfo),
}

/// Resolves the caller `skip_levels` frames above whoever called this.
///
/// The primary frame is trace line `skip_levels + 3`; when the trace is
/// shorter, the last line is used instead.
#[inline(never)]
pub fn build_caller_info(skip_levels: usize, source: CallerSource) -> CallerInfo {
    let level = skip_levels + INTERNAL_FRAMES;
    let trace = match source {
        CallerSource::Info(info) => {
            return match info.level {
                Some(level) => info.focus(level),
                None => info,
            };
        }
        CallerSource::Trace(trace) => trace,
        CallerSource::Capture => StackTrace::capture("").truncated(level + 1),
        CallerSource::Message(message) => StackTrace::capture(&message).truncated(level + 1),
    };

    let lines = trace.lines();
    let caller_line = lines
        .get(level)
        .or_else(|| lines.last())
        .map_or("", String::as_str);

    CallerInfo {
        frame: extract_frame(caller_line),
        message: lines.first().cloned().unwrap_or_default(),
        frames: lines.iter().skip(1).map(|l| extract_frame(l)).collect(),
        level: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_trace() -> StackTrace {
        StackTrace::parse(
            "Error: boom\n\
             \x20   at Object.print (/srv/console/lib/init.js:620:9)\n\
             \x20   at Console.info (/srv/console/lib/init.js:300:3)\n\
             \x20   at handleRequest (/srv/app/routes/users.js:42:17)\n\
             \x20   at /srv/app/server.js:10:5\n\
             \x20   at Module._compile (node:internal/modules/cjs/loader:1105:14)",
        )
    }

    #[test]
    fn test_extract_frame_canonical() {
        let frame = extract_frame("    at handleRequest (/srv/app/routes/users.js:42:17)");
        assert_eq!(frame.function_name, "handleRequest");
        assert_eq!(frame.file_path, "/srv/app/routes/users.js");
        assert_eq!(frame.file_name, "users.js");
        assert_eq!(frame.line, Some(42));
        assert_eq!(frame.column, Some(17));
    }

    #[test]
    fn test_extract_frame_anonymous_fallback() {
        let frame = extract_frame("    at /srv/app/server.js:10:5");
        assert_eq!(frame.function_name, "anonymous");
        assert_eq!(frame.file_name, "server.js");
        assert_eq!(frame.line, Some(10));
    }

    #[test]
    fn test_extract_frame_unknown() {
        let frame = extract_frame("not a stack line");
        assert_eq!(frame, Frame::unknown());
        assert_eq!(frame.location_label(), "unknown:unknown");
    }

    #[test]
    fn test_build_selects_frame_after_internal_levels() {
        let info = build_caller_info(0, CallerSource::Trace(sample_trace()));
        assert_eq!(info.frame.function_name, "handleRequest");
        assert_eq!(info.message, "Error: boom");
        assert_eq!(info.frames.len(), 5);
        assert_eq!(info.frames[0].function_name, "Object.print");

        let info = build_caller_info(1, CallerSource::Trace(sample_trace()));
        assert_eq!(info.frame.function_name, "anonymous");
        assert_eq!(info.location_label(), "server.js:10");
    }

    #[test]
    fn test_build_out_of_range_uses_last_line() {
        let info = build_caller_info(10, CallerSource::Trace(sample_trace()));
        assert_eq!(info.frame.function_name, "Module._compile");
    }

    #[test]
    fn test_build_reuses_existing_info() {
        let info = build_caller_info(0, CallerSource::Trace(sample_trace()));
        let copy = build_caller_info(5, CallerSource::Info(info.clone()));
        assert_eq!(copy, info);

        let focused = build_caller_info(0, CallerSource::Info(info.focus(0)));
        assert_eq!(focused.frame.function_name, "Object.print");
        assert_eq!(focused.level, Some(0));
    }

    #[test]
    fn test_from_backtrace_text_normalizes_frames() {
        let text = "   0: std::backtrace_rs::backtrace::libunwind::trace\n\
                    \x20            at /rustc/library/std/src/backtrace.rs:116:5\n\
                    \x20  1: std::backtrace::Backtrace::create\n\
                    \x20  2: myapp::server::handle::h0123456789abcdef\n\
                    \x20            at ./src/server.rs:88:13\n\
                    \x20  3: main\n";
        let trace = StackTrace::from_backtrace_text("oops", text);
        assert_eq!(
            trace.lines(),
            &[
                "Trace: oops".to_string(),
                "    at myapp::server::handle (./src/server.rs:88:13)".to_string(),
                "    at main".to_string(),
            ]
        );
        let frame = extract_frame(&trace.lines()[1]);
        assert_eq!(frame.file_name, "server.rs");
        assert_eq!(frame.line, Some(88));
    }

    #[test]
    fn test_capture_is_bounded() {
        let info = build_caller_info(0, CallerSource::Message("probe".to_string()));
        assert!(info.frames.len() <= INTERNAL_FRAMES + 1);
        assert_eq!(info.message, "Trace: probe");
    }

    #[test]
    fn test_from_location_uses_track_caller() {
        let info = CallerInfo::from_location(Location::caller());
        assert_eq!(info.frame.file_name, "caller.rs");
        assert!(info.frame.line.is_some());
    }
}
