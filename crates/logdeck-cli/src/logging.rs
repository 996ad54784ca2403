//! Tracing setup.
//!
//! Internal diagnostics go to `$LOGDECK_HOME/logdeck.log`, filtered by
//! `LOGDECK_LOG` (default `warn`). When a router is given, `tracing` events
//! from the host also land in the console as entries.

use std::sync::Arc;

use logdeck_core::config::paths;
use logdeck_core::router::{ConsoleLayer, ConsoleRouter};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

const LOG_ENV: &str = "LOGDECK_LOG";

/// Installs the global subscriber. Keep the returned guard alive until exit
/// so buffered lines reach the file.
pub fn init(router: Option<Arc<ConsoleRouter>>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    let log_path = paths::log_path();
    let appender = log_path.parent().and_then(|dir| {
        RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix("logdeck.log")
            .build(dir)
            .inspect_err(|err| {
                eprintln!("warning: file logging disabled ({}): {err}", dir.display());
            })
            .ok()
    });

    let (file_layer, guard) = match appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let console_layer = router.map(ConsoleLayer::new);
    if tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .is_err()
    {
        eprintln!("warning: a tracing subscriber was already installed");
    }
    guard
}
