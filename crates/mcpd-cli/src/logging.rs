//! Logging/tracing layer (C13, §4.13).
//!
//! Grounded on `turbomcp-server`'s `logging.rs`: a layered
//! `tracing_subscriber::registry()` with an `EnvFilter` and an `fmt::layer()`
//! writing through `tracing_appender::non_blocking`, returning a guard the
//! caller must hold for the process lifetime. Stdout is used in place of
//! stderr since this server has no STDIO transport whose protocol channel
//! would collide with it.

use std::io;
use std::path::Path;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

/// Holds the non-blocking writer alive; drop only at process exit or
/// buffered log lines are lost.
#[derive(Debug)]
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Initialise the global `tracing` subscriber from `config`'s `log_level`
/// and `log_path`. Writes to a daily-rotated file when `log_path` is set,
/// otherwise to stdout. Returns an error if a subscriber is already set.
pub fn init(config: &Config) -> io::Result<LoggingGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let subscriber = tracing_subscriber::registry().with(filter);

    let (writer, guard) = match &config.log_path {
        Some(path) => file_writer(path),
        None => tracing_appender::non_blocking(io::stdout()),
    };

    subscriber
        .with(fmt::layer().with_writer(writer))
        .try_init()
        .map_err(io::Error::other)?;

    Ok(LoggingGuard { _guard: guard })
}

fn file_writer(path: &Path) -> (tracing_appender::non_blocking::NonBlocking, tracing_appender::non_blocking::WorkerGuard) {
    let directory = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let filename = path.file_name().map_or_else(|| "mcpd.log".to_string(), |n| n.to_string_lossy().to_string());
    tracing_appender::non_blocking(tracing_appender::rolling::daily(directory, filename))
}
