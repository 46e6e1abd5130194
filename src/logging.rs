use crate::error::{Result, WatchdogError};
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::{self, format::Writer, time::FormatTime};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Rotated log files kept next to the current one
pub const MAX_LOG_FILES: usize = 3;

const LOG_FILE_PREFIX: &str = "camping";
const LOG_FILE_SUFFIX: &str = "log";

/// Local-time timestamps, matching the stderr CRITICAL line
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Level for this crate's targets when `RUST_LOG` is unset
    pub level: &'static str,
    /// `json`, `pretty` or `compact`
    pub format: Option<String>,
    /// Include thread ids, files and line numbers
    pub detailed: bool,
    /// Directory for the rolling log file; `None` logs to stderr only
    pub log_dir: Option<PathBuf>,
}

impl LogOptions {
    /// `--debug` wins over `--verbose`, which wins over `--quiet`
    pub fn from_flags(debug: bool, verbose: bool, quiet: bool) -> Self {
        let level = if debug {
            "debug"
        } else if verbose {
            "info"
        } else if quiet {
            "error"
        } else {
            "info"
        };

        Self {
            level,
            format: None,
            detailed: debug || verbose,
            log_dir: None,
        }
    }

    pub fn filter_directive(&self) -> String {
        format!("camping={}", self.level)
    }
}

/// Install the global subscriber: stderr plus an optional daily rolling file.
///
/// Keep the returned guard alive until exit or buffered file lines are lost.
pub fn init_logging(options: &LogOptions) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.filter_directive()));

    let stderr_layer = match options.format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("pretty") => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_timer(LocalTimer)
            .with_target(true)
            .with_thread_ids(options.detailed)
            .with_file(options.detailed)
            .with_line_number(options.detailed)
            .boxed(),
        Some("compact") | None => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_timer(LocalTimer)
            .with_target(false)
            .with_thread_ids(options.detailed)
            .with_file(options.detailed)
            .with_line_number(options.detailed)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_timer(LocalTimer)
                .boxed()
        }
    };

    let (file_writer, guard) = match options.log_dir.as_deref().map(open_log_file) {
        Some(Ok(appender)) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        Some(Err(e)) => {
            // Losing the file log is not fatal; stderr still works
            eprintln!("Warning: {}; logging to stderr only", e);
            (None, None)
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_writer.map(|writer| {
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false)
                .with_timer(LocalTimer)
        }))
        .with(env_filter)
        .try_init()
        .map_err(|e| WatchdogError::system(format!("failed to install log subscriber: {}", e)))?;

    Ok(guard)
}

fn open_log_file(dir: &Path) -> Result<RollingFileAppender> {
    std::fs::create_dir_all(dir)?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .max_log_files(MAX_LOG_FILES)
        .build(dir)
        .map_err(|e| {
            WatchdogError::system(format!("cannot open log file in {}: {}", dir.display(), e))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_from_flags() {
        assert_eq!(LogOptions::from_flags(false, false, false).level, "info");
        assert_eq!(LogOptions::from_flags(true, false, false).level, "debug");
        assert_eq!(LogOptions::from_flags(false, false, true).level, "error");
        assert_eq!(LogOptions::from_flags(true, false, true).level, "debug");
        assert_eq!(LogOptions::from_flags(false, true, true).level, "info");
        assert!(LogOptions::from_flags(false, true, false).detailed);
        assert!(!LogOptions::from_flags(false, false, false).detailed);
    }

    #[test]
    fn test_filter_directive() {
        let options = LogOptions::from_flags(false, false, true);
        assert_eq!(options.filter_directive(), "camping=error");
        assert!(EnvFilter::try_new(options.filter_directive()).is_ok());
    }

    #[test]
    fn test_open_log_file_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("nested").join("logs");

        open_log_file(&log_dir).unwrap();

        assert!(log_dir.is_dir());
    }
}
