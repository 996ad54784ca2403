//! Uncaught panic policy.
//!
//! The hook installed here either turns a panic into an error entry in the
//! scrollback (`exceptions.catch`) or restores the terminal and hands the
//! panic to the previous hook. Panics raised inside [`guarded`] on the loop
//! thread are swallowed there; with `exceptions.shutdown` the console quits
//! afterwards. A panic on the loop thread outside [`guarded`] always tears
//! the console down.

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe, PanicHookInfo};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use logdeck_core::LogEntry;
use logdeck_core::config::ExceptionsConfig;
use logdeck_core::router::ConsoleEvent;
use serde_json::Value as Json;
use tokio::sync::mpsc;

use crate::terminal;

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

thread_local! {
    static GUARDED: Cell<bool> = const { Cell::new(false) };
    static LOOP_THREAD: Cell<bool> = const { Cell::new(false) };
}

/// Whether a caught panic asked the console to exit.
pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::Relaxed)
}

type PanicHook = dyn Fn(&PanicHookInfo<'_>) + Send + Sync + 'static;

/// Puts the previous panic hook back when dropped.
#[must_use = "dropping the guard uninstalls the hook"]
pub struct HookGuard {
    previous: Arc<PanicHook>,
}

impl Drop for HookGuard {
    fn drop(&mut self) {
        let previous = Arc::clone(&self.previous);
        panic::set_hook(Box::new(move |info| previous(info)));
    }
}

/// Installs the console's panic hook. Call before entering the alternate
/// screen.
pub fn install_hook(
    policy: ExceptionsConfig,
    tx: mpsc::UnboundedSender<ConsoleEvent>,
) -> HookGuard {
    SHUTDOWN_REQUESTED.store(false, Ordering::Relaxed);
    let previous: Arc<PanicHook> = Arc::from(panic::take_hook());
    let original_hook = Arc::clone(&previous);
    panic::set_hook(Box::new(move |info| {
        let recoverable = policy.catch && (is_guarded() || !is_loop_thread());
        if !recoverable {
            let _ = terminal::restore_terminal();
            original_hook(info);
            return;
        }
        let message = describe(info);
        tracing::error!(%message, "caught panic");
        let entry = LogEntry::error(&format!("Uncaught panic: {message}"), Json::String(message));
        let _ = tx.send(ConsoleEvent::Entry(entry));
        if policy.shutdown {
            SHUTDOWN_REQUESTED.store(true, Ordering::Relaxed);
        }
    }));
    HookGuard { previous }
}

/// Runs `f`, turning a panic into `None` when the policy catches panics.
/// Without `catch` the panic keeps unwinding.
pub fn guarded<R>(catch: bool, f: impl FnOnce() -> R) -> Option<R> {
    if !catch {
        return Some(f());
    }
    GUARDED.with(|g| g.set(true));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    GUARDED.with(|g| g.set(false));
    match result {
        Ok(value) => Some(value),
        Err(payload) => {
            tracing::debug!(message = payload_message(payload.as_ref()), "reducer panicked");
            None
        }
    }
}

/// Whether the current thread is inside [`guarded`].
pub fn is_guarded() -> bool {
    GUARDED.with(Cell::get)
}

/// Marks the calling thread as the one running the event loop.
pub fn mark_loop_thread() {
    LOOP_THREAD.with(|t| t.set(true));
}

fn is_loop_thread() -> bool {
    LOOP_THREAD.with(Cell::get)
}

fn describe(info: &PanicHookInfo<'_>) -> String {
    let message = payload_message(info.payload());
    match info.location() {
        Some(loc) => format!("{message} ({}:{})", loc.file(), loc.line()),
        None => message.to_string(),
    }
}

fn payload_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("Box<dyn Any>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_message_variants() {
        let s: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(payload_message(s.as_ref()), "static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(payload_message(owned.as_ref()), "owned");
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(payload_message(other.as_ref()), "Box<dyn Any>");
    }

    #[test]
    fn test_guarded_passes_values_through() {
        assert_eq!(guarded(true, || 3), Some(3));
        assert_eq!(guarded(false, || 4), Some(4));
        assert!(!is_guarded());
    }
}
