//! Logging infrastructure for channelscope
//!
//! Logs go to the XDG state directory and rotate daily:
//! `~/.local/state/channelscope/channelscope.log.YYYY-MM-DD` (UTC date).
//! Only the newest `logging.max_files` files are kept.

use crate::config::{Config, LoggingConfig, LOG_FILE_PREFIX};
use crate::error::Error;
use chrono::{NaiveDate, Utc};
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Initialize the logging system
///
/// `RUST_LOG` overrides `logging.level` when set. Logs never go to stdout,
/// which carries the CLI's report output.
pub fn init(config: &LoggingConfig) -> crate::error::Result<LoggingGuard> {
    let log_dir = Config::state_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .max_log_files(config.max_files.max(1))
        .build(&log_dir)
        .map_err(|e| Error::Config(format!("failed to create log appender: {}", e)))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();

    tracing::info!(
        log_file = %log_file_path().display(),
        level = %config.level,
        max_files = config.max_files,
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Initialize logging for tests (logs to the test writer)
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Flushes pending log lines when dropped. Hold it for the life of `main`.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Log file being written today.
pub fn log_file_path() -> PathBuf {
    log_file_path_for(Utc::now().date_naive())
}

/// Log file for a given UTC day.
pub fn log_file_path_for(day: NaiveDate) -> PathBuf {
    let mut name = Config::log_path().into_os_string();
    name.push(format!(".{}", day.format("%Y-%m-%d")));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_path_carries_date_suffix() {
        let day = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();
        let path = log_file_path_for(day);

        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            "channelscope.log.2025-06-03"
        );
        assert_eq!(path.parent(), Some(Config::state_dir().as_path()));
    }

    #[test]
    fn test_todays_log_file_is_not_the_bare_prefix() {
        assert_ne!(log_file_path(), Config::log_path());
        assert!(log_file_path().starts_with(Config::state_dir()));
    }
}
