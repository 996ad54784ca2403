//! Configuration management for logdeck.
//!
//! Loads configuration from `${LOGDECK_HOME}/config.toml` with sensible
//! defaults. Every field is optional.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::verbosity::Verbosity;

/// When to emit SGR color sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// On when the environment advertises color support (`COLORTERM`).
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    /// Resolves the mode against the environment.
    pub fn enabled(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => std::env::var_os("COLORTERM").is_some_and(|v| !v.is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollbackConfig {
    pub max_entries: usize,
    pub follow_output: bool,
    pub page_lines: usize,
    pub wheel_lines: usize,
}

impl Default for ScrollbackConfig {
    fn default() -> Self {
        Self {
            max_entries: crate::scrollback::DEFAULT_MAX_ENTRIES,
            follow_output: true,
            page_lines: 20,
            wheel_lines: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_entries: usize,
    pub persist: bool,
    /// Defaults to `$LOGDECK_HOME/history.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: crate::repl::DEFAULT_MAX_ENTRIES,
            persist: true,
            path: None,
        }
    }
}

impl HistoryConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(paths::history_path)
    }
}

/// What to do with panics raised on the console thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExceptionsConfig {
    /// Show the panic as an error entry instead of tearing the console down.
    pub catch: bool,
    /// After showing a caught panic, exit anyway.
    pub shutdown: bool,
}

impl Default for ExceptionsConfig {
    fn default() -> Self {
        Self {
            catch: true,
            shutdown: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallerConfig {
    /// Capture the stack for every call instead of using `#[track_caller]`.
    pub capture_frames: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub color: ColorMode,
    pub verbosity: Verbosity,
    pub scrollback: ScrollbackConfig,
    pub history: HistoryConfig,
    pub exceptions: ExceptionsConfig,
    pub caller: CallerConfig,
}

/// Default configuration with comments, embedded at compile time.
pub fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for logdeck configuration and data files.
    //!
    //! `LOGDECK_HOME` resolution order:
    //! 1. `LOGDECK_HOME` environment variable (if set)
    //! 2. `~/.config/logdeck`
    //! 3. `./.logdeck` when no home directory is known

    use std::path::PathBuf;

    pub fn logdeck_home() -> PathBuf {
        if let Some(home) = std::env::var_os("LOGDECK_HOME") {
            return PathBuf::from(home);
        }
        dirs::home_dir().map_or_else(
            || PathBuf::from(".logdeck"),
            |h| h.join(".config").join("logdeck"),
        )
    }

    pub fn config_path() -> PathBuf {
        logdeck_home().join("config.toml")
    }

    pub fn history_path() -> PathBuf {
        logdeck_home().join("history.json")
    }

    /// Side-channel diagnostics log.
    pub fn log_path() -> PathBuf {
        logdeck_home().join("logdeck.log")
    }
}

impl Config {
    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// See [`Config::load_from`].
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path. A missing file gives the
    /// defaults.
    ///
    /// # Errors
    /// [`ConfigError::Read`] or [`ConfigError::Parse`] when the file exists
    /// but cannot be read or is not valid TOML for this schema.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the commented default config, creating parent directories.
    ///
    /// # Errors
    /// [`ConfigError::AlreadyExists`] when a file is already there, or
    /// [`ConfigError::Write`] when it cannot be written.
    pub fn init(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Err(ConfigError::AlreadyExists(path.to_path_buf()));
        }
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, default_config_template()).map_err(write_err)
    }

    pub fn color_enabled(&self) -> bool {
        self.color.enabled()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nonexistent.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.scrollback.wheel_lines, 5);
        assert_eq!(config.history.max_entries, 500);
    }

    #[test]
    fn test_load_partial_config_merges_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "verbosity = \"debug\"\n[scrollback]\npage_lines = 40\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.verbosity, Verbosity::Debug);
        assert_eq!(config.scrollback.page_lines, 40);
        assert_eq!(config.scrollback.wheel_lines, 5);
        assert!(config.exceptions.catch);
    }

    #[test]
    fn test_invalid_config_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "color = \"sometimes\"\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_template_matches_defaults() {
        let parsed: Config = toml::from_str(default_config_template()).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_init_creates_file_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("subdir").join("config.toml");
        Config::init(&path).unwrap();
        assert!(path.exists());
        assert!(matches!(
            Config::init(&path),
            Err(ConfigError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_explicit_color_modes() {
        assert!(ColorMode::Always.enabled());
        assert!(!ColorMode::Never.enabled());
    }
}
