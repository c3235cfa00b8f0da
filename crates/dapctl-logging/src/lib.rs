//! Centralized logging configuration for dapctl
//!
//! Wraps `tracing` and `tracing-subscriber` so the CLI and the tests set up
//! logging the same way.
//!
//! # Usage
//!
//! ```rust,ignore
//! use dapctl_logging::{init, init_with_file, LogConfig};
//!
//! // CLI with debug flag
//! init(LogConfig::cli(true));
//!
//! // File logging; hold the guard until exit
//! let _guard = init_with_file(LogConfig::new(), Path::new("/tmp/dapctl.log"))?;
//! ```
//!
//! Adapter stderr and protocol traffic are logged under the `dapctl_dap`
//! target, so `RUST_LOG=dapctl_dap=trace` shows every DAP frame.

use std::io::IsTerminal;
use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use tracing::{debug, error, info, instrument, trace, warn, Level};

pub use tracing_appender::non_blocking::WorkerGuard;

/// Output destination for logs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogOutput {
    /// Stderr keeps stdout free for command output
    #[default]
    Stderr,
    Stdout,
}

/// Timestamp format for log output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimestampFormat {
    #[default]
    Local,
    Utc,
}

/// Configuration for logging initialization
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Enable debug-level logging (overrides default_level)
    pub debug: bool,
    /// Default log level when RUST_LOG is not set
    pub default_level: String,
    pub output: LogOutput,
    /// Show module target in log output
    pub show_target: bool,
    pub timestamp_format: TimestampFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            default_level: "warn".to_string(),
            output: LogOutput::Stderr,
            show_target: false,
            timestamp_format: TimestampFormat::default(),
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Set the default log level (used when RUST_LOG is not set)
    pub fn default_level(mut self, level: impl Into<String>) -> Self {
        self.default_level = level.into();
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn show_target(mut self, show: bool) -> Self {
        self.show_target = show;
        self
    }

    pub fn timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    pub fn utc(self) -> Self {
        self.timestamp_format(TimestampFormat::Utc)
    }

    /// Configure for CLI usage
    pub fn cli(debug: bool) -> Self {
        Self::new().debug(debug).show_target(debug)
    }

    fn build_filter(&self) -> EnvFilter {
        if self.debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&self.default_level))
        }
    }
}

/// Initialize the logging system.
///
/// Call once at startup; `RUST_LOG` overrides the configured level unless
/// `debug` is set.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init(config: LogConfig) {
    use tracing_subscriber::fmt::time::{LocalTime, UtcTime};

    let filter = config.build_filter();

    macro_rules! with_timer_init {
        ($builder:expr, $ts_format:expr) => {
            match $ts_format {
                TimestampFormat::Utc => $builder.with_timer(UtcTime::rfc_3339()).init(),
                TimestampFormat::Local => $builder.with_timer(LocalTime::rfc_3339()).init(),
            }
        };
    }

    match config.output {
        LogOutput::Stdout => {
            let is_tty = std::io::stdout().is_terminal();
            let builder = fmt()
                .with_env_filter(filter)
                .with_target(config.show_target)
                .with_ansi(is_tty);
            with_timer_init!(builder, config.timestamp_format);
        }
        LogOutput::Stderr => {
            let is_tty = std::io::stderr().is_terminal();
            let builder = fmt()
                .with_env_filter(filter)
                .with_target(config.show_target)
                .with_writer(std::io::stderr)
                .with_ansi(is_tty);
            with_timer_init!(builder, config.timestamp_format);
        }
    }
}

/// Initialize logging into a daily rotated file.
///
/// The returned `WorkerGuard` must be held until exit so buffered lines are
/// flushed.
///
/// # Errors
///
/// Returns an error if the parent directory cannot be created.
pub fn init_with_file(config: LogConfig, log_path: &Path) -> std::io::Result<WorkerGuard> {
    use tracing_subscriber::fmt::time::{LocalTime, UtcTime};

    let filter = config.build_filter();

    dapctl_config::paths::ensure_parent_dir(log_path)
        .map_err(|e| std::io::Error::other(format!("Failed to create log directory: {}", e)))?;

    let log_dir = log_path.parent().unwrap_or(Path::new("."));
    let log_filename = log_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("dapctl.log");

    // Files named {prefix}.YYYY-MM-DD
    let file_appender = tracing_appender::rolling::daily(log_dir, log_filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(non_blocking)
        .with_ansi(false);

    match config.timestamp_format {
        TimestampFormat::Utc => builder.with_timer(UtcTime::rfc_3339()).init(),
        TimestampFormat::Local => builder.with_timer(LocalTime::rfc_3339()).init(),
    }

    Ok(guard)
}

/// Initialize logging for tests.
///
/// Safe to call from every test (uses `try_init`).
pub fn init_test() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_test_writer())
        .try_init();
}

/// Delete rotated log files (`{prefix}.YYYY-MM-DD`) older than `retention_days`.
///
/// Returns the number of deleted files. A missing directory counts as empty;
/// `retention_days == 0` disables cleanup.
pub fn cleanup_old_logs(log_dir: &Path, prefix: &str, retention_days: u32) -> std::io::Result<usize> {
    use std::time::{Duration, SystemTime};

    if retention_days == 0 {
        return Ok(0);
    }

    let cutoff = SystemTime::now() - Duration::from_secs(u64::from(retention_days) * 24 * 60 * 60);
    let rotated_prefix = format!("{}.", prefix);
    let mut deleted = 0;

    let entries = match std::fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !file_name.starts_with(&rotated_prefix) {
            continue;
        }

        let modified = entry.metadata().and_then(|m| m.modified());
        if let Ok(modified) = modified {
            if modified < cutoff {
                match std::fs::remove_file(&path) {
                    Ok(()) => {
                        info!("Deleted old log file: {:?}", path);
                        deleted += 1;
                    }
                    Err(e) => warn!("Failed to delete old log file {:?}: {}", path, e),
                }
            }
        }
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration, SystemTime};

    fn backdate(path: &Path, days: u64) {
        let then = SystemTime::now() - Duration::from_secs(days * 24 * 60 * 60);
        filetime::set_file_mtime(path, filetime::FileTime::from_system_time(then)).unwrap();
    }

    #[test]
    fn test_build_filter_respects_debug_flag() {
        let config = LogConfig::new().default_level("warn").debug(true);
        let filter_str = format!("{:?}", config.build_filter());
        assert!(
            filter_str.contains("debug") || filter_str.contains("DEBUG"),
            "Expected debug level in filter: {}",
            filter_str
        );
    }

    #[test]
    fn test_cli_config_shows_target_in_debug() {
        assert!(LogConfig::cli(true).show_target);
        assert!(!LogConfig::cli(false).show_target);
        assert_eq!(LogConfig::new().utc().timestamp_format, TimestampFormat::Utc);
    }

    #[test]
    fn test_init_test_does_not_panic() {
        init_test();
        init_test();
    }

    #[test]
    fn test_cleanup_disabled_when_zero() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert_eq!(cleanup_old_logs(temp_dir.path(), "dapctl.log", 0).unwrap(), 0);
    }

    #[test]
    fn test_cleanup_nonexistent_dir() {
        let missing = Path::new("/nonexistent/dapctl/logs");
        assert_eq!(cleanup_old_logs(missing, "dapctl.log", 7).unwrap(), 0);
    }

    #[test]
    fn test_cleanup_deletes_only_expired_rotations() {
        let temp_dir = tempfile::tempdir().unwrap();
        let old = temp_dir.path().join("dapctl.log.2026-01-01");
        let recent = temp_dir.path().join("dapctl.log.2026-10-15");
        let other = temp_dir.path().join("launch.json");
        for path in [&old, &recent, &other] {
            File::create(path).unwrap();
        }
        backdate(&old, 10);
        backdate(&other, 10);

        assert_eq!(cleanup_old_logs(temp_dir.path(), "dapctl.log", 7).unwrap(), 1);
        assert!(!old.exists());
        assert!(recent.exists());
        assert!(other.exists());
    }
}
