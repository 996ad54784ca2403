//! Severity levels used to filter routed output.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lower is more severe. Entries above the configured threshold are dropped.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Fatal = 0,
    Severe = 1,
    Error = 2,
    Warning = 3,
    Todo = 4,
    #[default]
    Info = 5,
    Debug = 6,
    #[serde(rename = "hidebug")]
    HiDebug = 7,
}

impl Verbosity {
    pub const ALL: [Self; 8] = [
        Self::Fatal,
        Self::Severe,
        Self::Error,
        Self::Warning,
        Self::Todo,
        Self::Info,
        Self::Debug,
        Self::HiDebug,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fatal => "fatal",
            Self::Severe => "severe",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Todo => "todo",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::HiDebug => "hidebug",
        }
    }

    /// Whether an entry at `self` passes a `threshold`.
    pub fn passes(self, threshold: Self) -> bool {
        self <= threshold
    }

    /// Verbosity of a logging call named `kind` (`log`, `warn`, `error`, ...).
    pub fn from_kind(kind: &str) -> Self {
        match kind {
            "fatal" => Self::Fatal,
            "severe" => Self::Severe,
            "error" => Self::Error,
            "warn" | "warning" => Self::Warning,
            "todo" => Self::Todo,
            "debug" | "trace" => Self::Debug,
            "hidebug" => Self::HiDebug,
            _ => Self::Info,
        }
    }

    pub fn from_tracing(level: tracing::Level) -> Self {
        match level {
            tracing::Level::ERROR => Self::Error,
            tracing::Level::WARN => Self::Warning,
            tracing::Level::INFO => Self::Info,
            tracing::Level::DEBUG => Self::Debug,
            tracing::Level::TRACE => Self::HiDebug,
        }
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        if let Ok(n) = lower.parse::<usize>() {
            return Self::ALL
                .get(n)
                .copied()
                .ok_or_else(|| format!("verbosity must be 0-7, got {n}"));
        }
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == lower || (lower == "warn" && *v == Self::Warning))
            .ok_or_else(|| format!("unknown verbosity '{s}'"))
    }
}
