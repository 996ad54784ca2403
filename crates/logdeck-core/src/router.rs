//! Routing of external logging calls into scrollback entries.
//!
//! Every call (`info`, `warn`, `error`, `dir`, raw stream writes and
//! `tracing` events) goes through [`ConsoleRouter::print`], which tags it
//! with caller information, filters by verbosity, formats the arguments and
//! hands the finished entry to the current [`LogSink`].

use std::fmt::{self, Write as _};
use std::io::{self, Write};
use std::panic::Location;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value as Json;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context as LayerContext;
use tracing_subscriber::Layer;

use crate::ansi;
use crate::caller::{CallerInfo, CallerSource, build_caller_info};
use crate::entry::LogEntry;
use crate::eval::{Value, format_arg};
use crate::verbosity::Verbosity;

/// Messages the console runtime accepts from other threads.
#[derive(Debug, Clone)]
pub enum ConsoleEvent {
    Entry(LogEntry),
    Status { text: String, spinner: bool },
    ClearStatus,
    Title(String),
}

/// Destination for finished entries.
pub trait LogSink: Send + Sync {
    /// Whether entries may keep their SGR escapes.
    fn supports_color(&self) -> bool;

    fn deliver(&self, entry: LogEntry);
}

/// Writes each entry to stderr as `[kind] [file:line] message`.
#[derive(Debug, Clone)]
pub struct PassthroughSink {
    color: bool,
    width: usize,
}

impl PassthroughSink {
    pub fn new(color: bool, width: usize) -> Self {
        Self {
            color,
            width: width.max(1),
        }
    }
}

impl LogSink for PassthroughSink {
    fn supports_color(&self) -> bool {
        self.color
    }

    fn deliver(&self, mut entry: LogEntry) {
        let text = entry.lines(self.width).join("\n");
        let mut stderr = io::stderr().lock();
        if let Err(err) = writeln!(stderr, "{text}") {
            tracing::warn!(%err, "failed to write log entry to stderr");
        }
    }
}

/// Forwards entries to the console runtime's inbox.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ConsoleEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<ConsoleEvent>) -> Self {
        Self { tx }
    }
}

impl LogSink for ChannelSink {
    fn supports_color(&self) -> bool {
        true
    }

    fn deliver(&self, entry: LogEntry) {
        // The runtime is gone once the receiver drops; nothing left to show.
        let _ = self.tx.send(ConsoleEvent::Entry(entry));
    }
}

/// Per-call overrides for [`ConsoleRouter::print`].
#[derive(Debug, Clone, Default)]
pub struct PrintOptions {
    /// Use this trace or pre-built info instead of the call site.
    pub source: Option<CallerSource>,
    /// Capture the stack and skip this many frames above the caller.
    pub skip_levels: Option<usize>,
    pub verbosity: Option<Verbosity>,
}

pub struct ConsoleRouter {
    sink: RwLock<Arc<dyn LogSink>>,
    threshold: AtomicU8,
    capture_frames: AtomicBool,
}

impl fmt::Debug for ConsoleRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleRouter")
            .field("threshold", &self.threshold())
            .field("capture_frames", &self.capture_frames.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Restores the previous sink when dropped.
#[must_use = "the previous sink is restored as soon as the guard drops"]
pub struct SinkGuard<'a> {
    router: &'a ConsoleRouter,
    previous: Option<Arc<dyn LogSink>>,
}

impl Drop for SinkGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.router.replace_sink(previous);
        }
    }
}

impl ConsoleRouter {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink: RwLock::new(sink),
            threshold: AtomicU8::new(Verbosity::default() as u8),
            capture_frames: AtomicBool::new(false),
        }
    }

    /// Swaps in `sink` until the returned guard drops.
    pub fn set_sink(&self, sink: Arc<dyn LogSink>) -> SinkGuard<'_> {
        let previous = self.replace_sink(sink);
        SinkGuard {
            router: self,
            previous: Some(previous),
        }
    }

    fn replace_sink(&self, sink: Arc<dyn LogSink>) -> Arc<dyn LogSink> {
        let mut slot = self.sink.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, sink)
    }

    fn current_sink(&self) -> Arc<dyn LogSink> {
        Arc::clone(&self.sink.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn threshold(&self) -> Verbosity {
        let n = self.threshold.load(Ordering::Relaxed);
        Verbosity::ALL
            .get(usize::from(n))
            .copied()
            .unwrap_or_default()
    }

    pub fn set_threshold(&self, threshold: Verbosity) {
        self.threshold.store(threshold as u8, Ordering::Relaxed);
    }

    /// When set, call sites are resolved by capturing the stack instead of
    /// `#[track_caller]` locations.
    pub fn set_capture_frames(&self, capture: bool) {
        self.capture_frames.store(capture, Ordering::Relaxed);
    }

    /// Routes one logging call.
    #[track_caller]
    pub fn print(&self, kind: &str, args: &[Json], options: PrintOptions) {
        let verbosity = options
            .verbosity
            .unwrap_or_else(|| Verbosity::from_kind(kind));
        if !verbosity.passes(self.threshold()) {
            return;
        }

        let caller = match (options.source, options.skip_levels) {
            (Some(source), skip) => build_caller_info(skip.unwrap_or(0), source),
            (None, Some(skip)) => build_caller_info(skip, CallerSource::Capture),
            (None, None) if self.capture_frames.load(Ordering::Relaxed) => {
                build_caller_info(0, CallerSource::Capture)
            }
            (None, None) => CallerInfo::from_location(Location::caller()),
        };

        let message = format_arguments(args);
        let entry = LogEntry::args(kind, verbosity, args.to_vec(), message, Some(caller));
        self.deliver(entry);
    }

    fn deliver(&self, entry: LogEntry) {
        let sink = self.current_sink();
        let entry = if sink.supports_color() {
            entry
        } else {
            entry.without_color()
        };
        sink.deliver(entry);
    }

    #[track_caller]
    pub fn info(&self, args: &[Json]) {
        self.print("info", args, PrintOptions::default());
    }

    #[track_caller]
    pub fn warn(&self, args: &[Json]) {
        self.print("warn", args, PrintOptions::default());
    }

    #[track_caller]
    pub fn error(&self, args: &[Json]) {
        self.print("error", args, PrintOptions::default());
    }

    #[track_caller]
    pub fn dir(&self, args: &[Json]) {
        self.print("dir", args, PrintOptions::default());
    }

    /// Routes a line written to a raw output stream named `stream`.
    pub fn write(&self, stream: &str, line: &str) {
        if !Verbosity::Info.passes(self.threshold()) {
            return;
        }
        self.deliver(LogEntry::string_line(stream, line));
    }

    /// A `std::io::Write` adapter that routes each written line.
    pub fn writer(self: &Arc<Self>, stream: &str) -> RouterWriter {
        RouterWriter {
            router: Arc::clone(self),
            stream: stream.to_string(),
            buffer: Vec::new(),
        }
    }
}

/// Formats arguments the way `console.log` does: strings raw, everything
/// else inspected, separated by spaces.
pub fn format_arguments(args: &[Json]) -> String {
    args.iter()
        .map(|arg| match arg {
            Json::String(s) => s.clone(),
            other => format_arg(&Value::from_json(other), true),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Line-buffered writer feeding [`ConsoleRouter::write`].
pub struct RouterWriter {
    router: Arc<ConsoleRouter>,
    stream: String,
    buffer: Vec<u8>,
}

impl RouterWriter {
    fn emit(&self, bytes: &[u8]) {
        let line = String::from_utf8_lossy(bytes);
        let line = line.strip_suffix('\r').unwrap_or(&line);
        self.router.write(&self.stream, line);
    }
}

impl Write for RouterWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.emit(&line[..line.len() - 1]);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.emit(&rest);
        }
        Ok(())
    }
}

impl Drop for RouterWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// `tracing` layer that routes events from other crates into the console.
///
/// Events whose target starts with `logdeck` are the console's own
/// diagnostics and stay in the side-channel log.
pub struct ConsoleLayer {
    router: Arc<ConsoleRouter>,
}

impl ConsoleLayer {
    pub fn new(router: Arc<ConsoleRouter>) -> Self {
        Self { router }
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={value}", field.name());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={value:?}", field.name());
        }
    }
}

impl<S: Subscriber> Layer<S> for ConsoleLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: LayerContext<'_, S>) {
        let meta = event.metadata();
        if meta.target().starts_with("logdeck") {
            return;
        }
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let text = format!("{}{}", visitor.message, ansi::esc("90", &visitor.fields));
        let caller = CallerInfo::from_parts(meta.module_path(), meta.file(), meta.line());
        let kind = meta.level().as_str().to_ascii_lowercase();
        self.router.print(
            &kind,
            &[Json::String(text)],
            PrintOptions {
                source: Some(CallerSource::Info(caller)),
                skip_levels: None,
                verbosity: Some(Verbosity::from_tracing(*meta.level())),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;
    use tracing_subscriber::layer::SubscriberExt;

    use super::*;

    #[derive(Default)]
    struct Collect {
        color: bool,
        entries: Mutex<Vec<LogEntry>>,
    }

    impl LogSink for Collect {
        fn supports_color(&self) -> bool {
            self.color
        }

        fn deliver(&self, entry: LogEntry) {
            self.entries.lock().unwrap().push(entry);
        }
    }

    impl Collect {
        fn texts(&self) -> Vec<String> {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .map(LogEntry::text)
                .collect()
        }
    }

    fn router_with(color: bool) -> (Arc<ConsoleRouter>, Arc<Collect>) {
        let sink = Arc::new(Collect {
            color,
            ..Collect::default()
        });
        (Arc::new(ConsoleRouter::new(Arc::clone(&sink) as Arc<dyn LogSink>)), sink)
    }

    #[test]
    fn test_print_tags_call_site() {
        let (router, sink) = router_with(false);
        router.info(&[json!("hello"), json!({"n": 1})]);
        let line = line!() - 1;
        let texts = sink.texts();
        assert_eq!(texts[0], format!("[info] [router.rs:{line}] hello {{ n: 1 }}"));
        let entries = sink.entries.lock().unwrap();
        assert!(entries[0].is_expandable());
    }

    #[test]
    fn test_color_kept_for_color_sinks() {
        let (router, sink) = router_with(true);
        router.warn(&[json!(5)]);
        assert!(sink.texts()[0].contains('\x1b'));
    }

    #[test]
    fn test_threshold_drops_verbose_calls() {
        let (router, sink) = router_with(false);
        router.set_threshold(Verbosity::Warning);
        router.print("debug", &[json!("hidden")], PrintOptions::default());
        router.info(&[json!("hidden")]);
        router.error(&[json!("shown")]);
        assert_eq!(sink.texts().len(), 1);
    }

    #[test]
    fn test_prebuilt_caller_is_used() {
        let (router, sink) = router_with(false);
        let caller = CallerInfo::from_parts(None, Some("lib/other.rs"), Some(7));
        router.print(
            "dir",
            &[json!([1, 2])],
            PrintOptions {
                source: Some(CallerSource::Info(caller)),
                ..PrintOptions::default()
            },
        );
        assert_eq!(sink.texts()[0], "[dir] [other.rs:7] [ 1, 2 ]");
    }

    #[test]
    fn test_sink_guard_restores_previous() {
        let (router, first) = router_with(false);
        let second = Arc::new(Collect::default());
        {
            let _guard = router.set_sink(Arc::clone(&second) as Arc<dyn LogSink>);
            router.info(&[json!("to second")]);
        }
        router.info(&[json!("to first")]);
        assert_eq!(second.texts().len(), 1);
        assert_eq!(first.texts().len(), 1);
    }

    #[test]
    fn test_writer_splits_lines() {
        let (router, sink) = router_with(false);
        {
            let mut w = router.writer("stdout");
            write!(w, "one\ntw").unwrap();
            write!(w, "o\r\nthree").unwrap();
        }
        assert_eq!(sink.texts(), ["one", "two", "three"]);
    }

    #[test]
    fn test_channel_sink_forwards_entries() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let router = ConsoleRouter::new(Arc::new(ChannelSink::new(tx)));
        router.info(&[json!("queued")]);
        assert!(matches!(rx.try_recv(), Ok(ConsoleEvent::Entry(_))));
    }

    #[test]
    fn test_tracing_layer_routes_foreign_targets() {
        let (router, sink) = router_with(false);
        let subscriber = tracing_subscriber::registry().with(ConsoleLayer::new(router));
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "app::db", rows = 3, "slow query");
            tracing::warn!(target: "logdeck_core::x", "internal");
        });
        let texts = sink.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("[warn] ["));
        assert!(texts[0].ends_with("slow query rows=3"));
    }
}
