//! Interactive console command.

use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use logdeck_core::config::Config;
use logdeck_core::eval::Value;
use logdeck_core::router::{ConsoleRouter, PassthroughSink};
use logdeck_tui::{Console, ConsoleHandle};
use serde_json::json;

use crate::logging;

/// Width used for passthrough output when the terminal size is unknown.
const FALLBACK_WIDTH: u16 = 80;

pub fn run(config: Config, demo: bool) -> Result<()> {
    let width = crossterm::terminal::size().map_or(FALLBACK_WIDTH, |(w, _)| w);
    let router = Arc::new(ConsoleRouter::new(Arc::new(PassthroughSink::new(
        config.color_enabled(),
        usize::from(width),
    ))));
    router.set_threshold(config.verbosity);
    router.set_capture_frames(config.caller.capture_frames);

    let _log_guard = logging::init(Some(Arc::clone(&router)));
    tracing::debug!(verbosity = %config.verbosity, demo, "starting console");

    let mut console = Console::new(config, router);
    console.session_mut().context_mut().expose(
        "app",
        Value::from_json(&json!({
            "name": "logdeck",
            "version": env!("CARGO_PKG_VERSION"),
            "pid": std::process::id(),
        })),
    );

    if demo {
        console = console.on_ready(|handle| {
            let handle = handle.clone();
            thread::spawn(move || play_demo(&handle));
        });
    }
    console.run()
}

/// Sample traffic through every routing path, paced so the status spinner
/// is visible.
fn play_demo(handle: &ConsoleHandle) {
    let pause = || thread::sleep(Duration::from_millis(400));
    let router = handle.router();

    handle.set_title("logdeck demo");
    handle.set_status("Loading demo data", true);
    router.info(&[json!("Console ready. Try typing"), json!("app.")]);
    pause();

    router.info(&[
        json!("request served"),
        json!({ "method": "GET", "path": "/users", "status": 200, "ms": 12 }),
    ]);
    router.dir(&[json!({
        "user": { "id": 7, "name": "Ada", "roles": ["admin", "dev"] },
        "flags": { "beta": true },
    })]);
    pause();

    router.warn(&[json!("cache miss rate above"), json!(0.25)]);
    tracing::info!(target: "demo::worker", jobs = 3, "worker pool started");
    pause();

    let mut stdout = router.writer("stdout");
    let _ = writeln!(stdout, "raw line written to stdout");
    drop(stdout);

    router.error(&[json!("upstream timed out after"), json!(3000), json!("ms")]);
    pause();

    handle.clear_status();
    router.info(&[json!("Click an object entry to expand it.")]);
}
