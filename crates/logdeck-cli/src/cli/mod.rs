//! CLI entry and dispatch.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use logdeck_core::config::{self, ColorMode, Config};
use logdeck_core::verbosity::Verbosity;

mod commands;

#[derive(Parser)]
#[command(name = "logdeck")]
#[command(version)]
#[command(about = "Interactive terminal console for application logs")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Read configuration from this file instead of $LOGDECK_HOME/config.toml
    #[arg(long, global = true, value_name = "PATH", env = "LOGDECK_CONFIG")]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long = "no-color", global = true)]
    no_color: bool,

    /// Drop entries less severe than this (fatal..hidebug or 0-7)
    #[arg(long, global = true, value_name = "LEVEL")]
    verbosity: Option<Verbosity>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Start the interactive console (default)
    Run {
        /// Feed the console sample log output once it is on screen
        #[arg(long)]
        demo: bool,
    },
    /// Evaluate one expression and print the result
    Eval {
        /// Source to evaluate, e.g. "Math.max(1, 2)"
        #[arg(value_name = "EXPR")]
        expr: String,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let Cli {
        command,
        config: config_override,
        no_color,
        verbosity,
    } = cli;
    let config_path = config_override.unwrap_or_else(config::paths::config_path);

    let overrides = Overrides {
        no_color,
        verbosity,
    };

    match command.unwrap_or(Commands::Run { demo: false }) {
        Commands::Run { demo } => commands::run::run(load_config(&config_path, overrides)?, demo),
        Commands::Eval { expr } => {
            commands::eval::run(&expr, &load_config(&config_path, overrides)?)
        }
        // These never parse the existing file, so they work even when it is broken.
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path(&config_path);
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(&config_path),
        },
    }
}

/// Command-line settings that win over the config file.
#[derive(Clone, Copy)]
struct Overrides {
    no_color: bool,
    verbosity: Option<Verbosity>,
}

fn load_config(path: &Path, overrides: Overrides) -> Result<Config> {
    let mut config = Config::load_from(path)
        .with_context(|| format!("load config from {}", path.display()))?;
    if overrides.no_color {
        config.color = ColorMode::Never;
    }
    if let Some(level) = overrides.verbosity {
        config.verbosity = level;
    }
    Ok(config)
}
