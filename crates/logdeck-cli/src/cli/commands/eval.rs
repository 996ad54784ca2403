//! One-shot evaluation without the full-screen console.

use anyhow::{Result, bail};
use logdeck_core::config::Config;
use logdeck_core::eval::{format_arg, inspect};
use logdeck_core::repl::{History, ReplSession};

use crate::logging;

/// Prints `console.*` output from the expression, then the inspected result.
/// A raised condition is returned as the error.
pub fn run(expr: &str, config: &Config) -> Result<()> {
    let _log_guard = logging::init(None);
    let color = config.color_enabled();
    let mut session = ReplSession::new(History::new(0));
    let outcome = session.evaluate(expr);

    for call in session.context_mut().take_console() {
        let line = call
            .args
            .iter()
            .map(|arg| format_arg(arg, color))
            .collect::<Vec<_>>()
            .join(" ");
        println!("{line}");
    }

    match outcome {
        Ok(value) => {
            println!("{}", inspect(&value, color));
            Ok(())
        }
        Err(cond) => bail!("{cond}"),
    }
}
