//! Core logdeck library (scrollback, caller tagging, evaluator, REPL, routing, config).

pub mod ansi;
pub mod caller;
pub mod config;
pub mod entry;
pub mod error;
pub mod eval;
pub mod repl;
pub mod router;
pub mod scrollback;
pub mod status;
pub mod verbosity;

pub use entry::{EntryKind, LogEntry};
pub use error::{ConsoleError, RenderError, ScrollbackError};
pub use scrollback::Scrollback;
