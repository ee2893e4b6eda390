//! Logging setup for the tunnelsmith binary
//!
//! Events go to stderr and are appended to `<log dir>/tunnelsmith.log`, so
//! every run leaves a timestamped trail next to the daemon's own logs.

use std::io;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogSettings;

/// File name of the run log inside the log directory
pub const RUN_LOG_FILE: &str = "tunnelsmith.log";

/// Keeps the background log writer alive; dropping it flushes the run log.
#[must_use = "dropping the guard stops writing the run log"]
pub struct LogGuard {
    _file: WorkerGuard,
}

/// Install the console and run-log layers.
///
/// `RUST_LOG` wins over the configured level; `verbose` raises the configured
/// level to `debug`.
pub fn init_logging(settings: &LogSettings, verbose: bool) -> Result<LogGuard> {
    let level = if verbose { "debug" } else { settings.level.as_str() };
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("Invalid log level '{}'", level))?,
    };

    std::fs::create_dir_all(&settings.dir)
        .with_context(|| format!("Failed to create log directory {}", settings.dir.display()))?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(RUN_LOG_FILE)
        .build(&settings.dir)
        .with_context(|| format!("Failed to open run log in {}", settings.dir.display()))?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let console_layer = fmt::layer().with_writer(io::stderr).with_target(false);
    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_target(false)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(LogGuard { _file: guard })
}
