//! Tracing initialization and subscriber setup.
//!
//! This module configures the tracing subscriber, wiring `tracing` macros to a
//! rotating log file through the fmt layer.

use super::file_writer::RotatingFileWriter;
use crate::Config;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// File name used when no `log_file` is configured.
const DEFAULT_LOG_FILE: &str = "batchlabel.log";

/// Initializes the tracing subscriber with a rotating file sink.
///
/// Sets up a subscriber pipeline that:
/// 1. Filters spans and events by the configured trace level
/// 2. Formats them as plain text (no ANSI colors)
/// 3. Writes to a rotating file with backups
///
/// # Trace Level Resolution
///
/// Level is determined by:
/// 1. `config.trace_level` if set (any `EnvFilter` directive works)
/// 2. Default: `"info"`
///
/// # File Location
///
/// `config.log_file` if set, otherwise `batchlabel.log` in
/// [`get_data_dir`](crate::infrastructure::get_data_dir).
///
/// # Initialization Behavior
///
/// - Creates the log directory if it doesn't exist
/// - Silently gives up if directory creation fails (logging is optional)
/// - Idempotent: only the first successful call takes effect
///
/// Returns whether this call installed the subscriber.
///
/// # Example
///
/// ```
/// use batchlabel::observability::init_tracing;
/// use batchlabel::Config;
///
/// let dir = std::env::temp_dir().join("batchlabel-doc");
/// let config = Config {
///     trace_level: Some("debug".to_string()),
///     log_file: Some(dir.join("session.log")),
///     ..Default::default()
/// };
///
/// init_tracing(&config);
/// tracing::debug!("tracing is now active");
/// ```
pub fn init_tracing(config: &Config) -> bool {
    let level = config
        .trace_level
        .clone()
        .unwrap_or_else(|| "info".to_string());

    let log_file = config
        .log_file
        .clone()
        .unwrap_or_else(|| crate::infrastructure::get_data_dir().join(DEFAULT_LOG_FILE));

    if let Some(dir) = log_file.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        if std::fs::create_dir_all(dir).is_err() {
            return false;
        }
    }

    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));
    let writer = RotatingFileWriter::new(log_file);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(writer),
        )
        .try_init()
        .is_ok()
}
