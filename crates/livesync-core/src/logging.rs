//! Logging configuration using tracing
//!
//! Every run appends to a daily log file. With `verbose`, the same events are
//! mirrored to stderr so a one-shot CLI invocation can be watched live; stdout
//! stays reserved for command output.

use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::Result;

const LOG_FILE_PREFIX: &str = "livesync.log";
const LOG_ENV: &str = "LIVESYNC_LOG";
const LOG_DIR_ENV: &str = "LIVESYNC_LOG_DIR";
const DEFAULT_FILTER: &str = "livesync=info,warn";
const VERBOSE_FILTER: &str = "livesync=debug,warn";

/// Initialize the logging subsystem
///
/// Logs go to [`log_directory()`]. Levels come from `LIVESYNC_LOG`; without
/// it, `verbose` raises the default from info to debug.
///
/// Socket-level debug channel events are only visible at `trace`.
///
/// # Examples
/// ```bash
/// LIVESYNC_LOG=debug livesync sync app/app.css
/// LIVESYNC_LOG=livesync_device=trace livesync -v sync app/app.css
/// ```
pub fn init(verbose: bool) -> Result<()> {
    let log_dir = log_directory();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_PREFIX);

    let default_filter = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_filter));

    let stderr_layer = verbose.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .with(stderr_layer)
        .init();

    tracing::debug!("Logging to {}", log_dir.display());
    Ok(())
}

/// Directory holding the daily log files.
///
/// `LIVESYNC_LOG_DIR` overrides the platform data directory.
pub fn log_directory() -> PathBuf {
    if let Some(dir) = std::env::var_os(LOG_DIR_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("livesync")
        .join("logs")
}
