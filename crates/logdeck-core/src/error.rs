//! Error types shared across the console.
//!
//! Parse failures never reach this module: stack-line and completion-path
//! mismatches degrade to an "unknown" frame or a closed popup where they
//! happen. Evaluation failures are values (`eval::Condition`) and become
//! scrollback entries instead of errors.

use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by [`crate::Scrollback`] index operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScrollbackError {
    #[error("no entry at index {index} (scrollback holds {len})")]
    NotFound { index: usize, len: usize },
    /// The entry was inserted but dropped again by the size bound.
    #[error("entry inserted at {index} was evicted (scrollback keeps {max})")]
    Evicted { index: usize, max: usize },
}

/// Failures raised while laying out styled text.
///
/// Callers log these to the side channel and fall back to the raw text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("cannot wrap text to a zero-width viewport")]
    ZeroWidth,
}

/// Failures raised by configuration and history files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config file already exists at {0}")]
    AlreadyExists(PathBuf),
    #[error("malformed history file {path}")]
    History {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Host conditions that stop the console from starting at all.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("logdeck requires an interactive terminal (stdout is not a TTY)")]
    NotATerminal,
    #[error("terminal I/O failed")]
    Terminal(#[from] std::io::Error),
}
