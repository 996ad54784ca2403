//! Full-screen console surface for logdeck.

pub mod effects;
pub mod events;
pub mod exceptions;
pub mod input;
pub mod render;
pub mod runtime;
pub mod scrollbar;
pub mod state;
pub mod terminal;
pub mod update;

use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::Result;
use logdeck_core::config::Config;
use logdeck_core::repl::{History, ReplSession};
use logdeck_core::router::{ChannelSink, ConsoleEvent, ConsoleRouter};
use logdeck_core::{ConsoleError, LogEntry};
pub use runtime::ConsoleRuntime;
use runtime::ReadyHook;
use tokio::sync::mpsc;

use crate::state::AppState;

/// Cloneable handle for talking to a running console from any thread.
#[derive(Debug, Clone)]
pub struct ConsoleHandle {
    tx: mpsc::UnboundedSender<ConsoleEvent>,
    router: Arc<ConsoleRouter>,
}

impl ConsoleHandle {
    /// Router for logging calls that should carry caller information.
    pub fn router(&self) -> &Arc<ConsoleRouter> {
        &self.router
    }

    pub fn set_status(&self, text: impl Into<String>, spinner: bool) {
        self.send(ConsoleEvent::Status {
            text: text.into(),
            spinner,
        });
    }

    pub fn clear_status(&self) {
        self.send(ConsoleEvent::ClearStatus);
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.send(ConsoleEvent::Title(title.into()));
    }

    /// Appends an already built entry, bypassing the verbosity filter.
    pub fn push(&self, entry: LogEntry) {
        self.send(ConsoleEvent::Entry(entry));
    }

    fn send(&self, event: ConsoleEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("console closed; dropping event");
        }
    }
}

/// The interactive console: scrollback, REPL and status line.
pub struct Console {
    config: Config,
    router: Arc<ConsoleRouter>,
    session: ReplSession,
    tx: mpsc::UnboundedSender<ConsoleEvent>,
    rx: mpsc::UnboundedReceiver<ConsoleEvent>,
    on_ready: Option<ReadyHook>,
}

impl Console {
    /// Builds a console, loading the command history when persistence is on.
    pub fn new(config: Config, router: Arc<ConsoleRouter>) -> Self {
        let max = config.history.max_entries;
        let history = if config.history.persist {
            let path = config.history.resolved_path();
            History::load(&path, max).unwrap_or_else(|err| {
                tracing::warn!(%err, "starting with empty history");
                History::new(max)
            })
        } else {
            History::new(max)
        };
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            config,
            router,
            session: ReplSession::new(history),
            tx,
            rx,
            on_ready: None,
        }
    }

    pub fn handle(&self) -> ConsoleHandle {
        ConsoleHandle {
            tx: self.tx.clone(),
            router: Arc::clone(&self.router),
        }
    }

    /// REPL session, for exposing host values before the console starts.
    pub fn session_mut(&mut self) -> &mut ReplSession {
        &mut self.session
    }

    /// Runs `hook` once the first frame has been drawn.
    #[must_use]
    pub fn on_ready(mut self, hook: impl FnOnce(&ConsoleHandle) + Send + 'static) -> Self {
        self.on_ready = Some(Box::new(hook));
        self
    }

    /// Takes over the terminal until the user quits. Routed log calls land in
    /// the scrollback while it runs; the previous sink is restored after.
    ///
    /// # Errors
    /// [`ConsoleError::NotATerminal`] when stdout is not a terminal, or any
    /// terminal I/O failure from the runtime.
    pub fn run(self) -> Result<()> {
        if !io::stdout().is_terminal() {
            return Err(ConsoleError::NotATerminal.into());
        }
        let handle = self.handle();
        let Self {
            config,
            router,
            session,
            tx,
            rx,
            on_ready,
        } = self;

        let _hook = exceptions::install_hook(config.exceptions.clone(), tx.clone());
        let _sink = router.set_sink(Arc::new(ChannelSink::new(tx)));

        let state = AppState::new(&config, session);
        let mut runtime =
            ConsoleRuntime::new(state, rx, handle, config.exceptions.catch, on_ready)?;
        let result = runtime.run();

        if config.history.persist {
            let path = config.history.resolved_path();
            if let Err(err) = runtime.state.repl.save_history(&path) {
                tracing::warn!(%err, "failed to save history");
            }
        }
        drop(runtime);
        result
    }
}

#[cfg(test)]
mod tests {
    use logdeck_core::router::PassthroughSink;

    use super::*;

    fn console() -> Console {
        let mut config = Config::default();
        config.history.persist = false;
        let router = Arc::new(ConsoleRouter::new(Arc::new(PassthroughSink::new(false, 80))));
        Console::new(config, router)
    }

    #[test]
    fn test_handle_sends_status_and_title() {
        let mut console = console();
        let handle = console.handle();
        handle.set_status("indexing", true);
        handle.clear_status();
        handle.set_title("logdeck");

        assert!(matches!(
            console.rx.try_recv(),
            Ok(ConsoleEvent::Status { spinner: true, .. })
        ));
        assert!(matches!(console.rx.try_recv(), Ok(ConsoleEvent::ClearStatus)));
        assert!(matches!(console.rx.try_recv(), Ok(ConsoleEvent::Title(t)) if t == "logdeck"));
    }

    #[test]
    fn test_history_loaded_from_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, r#"["second", "first"]"#).unwrap();

        let mut config = Config::default();
        config.history.path = Some(path);
        let router = Arc::new(ConsoleRouter::new(Arc::new(PassthroughSink::new(false, 80))));
        let mut console = Console::new(config, router);
        assert_eq!(console.session_mut().history().entries(), ["second", "first"]);
    }
}
