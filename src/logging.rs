//! Tracing subscriber setup for the server process.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::Result;

/// Map a configured level name to a tracing level. Unknown names mean INFO.
fn parse_level(level: &str) -> Level {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// `RUST_LOG` directives win over the configured floor.
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::from_default_env().add_directive(parse_level(level).into())
}

/// Install the global subscriber: stdout plus an append-only log file.
///
/// An empty `file` setting logs to the console only. Fails when the log
/// directory or file can't be created; the caller is expected to fall back
/// to [`init_console_only`].
pub fn init(config: &LoggingConfig) -> Result<()> {
    let path = config.file.trim();
    if path.is_empty() {
        init_console_only(&config.level);
        return Ok(());
    }

    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let log_file = OpenOptions::new().create(true).append(true).open(path)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout.and(Arc::new(log_file)))
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(build_filter(&config.level))
        .init();

    Ok(())
}

/// Console-only subscriber with colors, used when file logging is off or
/// failed to start.
pub fn init_console_only(level: &str) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(build_filter(level))
        .init();
}
