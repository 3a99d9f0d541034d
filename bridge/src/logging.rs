//! Console and rotating-file logging built on tracing-appender.
//!
//! Rotation is handled in-process, old files are pruned at startup, so no
//! external logrotate setup is needed.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const LOG_SUFFIX: &str = "log";

/// How often a new log file is started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum RotationPeriod {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

impl RotationPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RotationPeriod::Minutely => "minutely",
            RotationPeriod::Hourly => "hourly",
            RotationPeriod::Daily => "daily",
            RotationPeriod::Never => "never",
        }
    }
}

impl std::str::FromStr for RotationPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "minutely" | "minute" => Ok(RotationPeriod::Minutely),
            "hourly" | "hour" => Ok(RotationPeriod::Hourly),
            "daily" | "day" => Ok(RotationPeriod::Daily),
            "never" | "none" => Ok(RotationPeriod::Never),
            _ => Err(format!(
                "Invalid rotation period '{}'. Valid options: minutely, hourly, daily, never",
                s
            )),
        }
    }
}

impl From<RotationPeriod> for String {
    fn from(period: RotationPeriod) -> Self {
        period.as_str().to_string()
    }
}

impl TryFrom<String> for RotationPeriod {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RotationPeriod> for Rotation {
    fn from(period: RotationPeriod) -> Self {
        match period {
            RotationPeriod::Minutely => Rotation::MINUTELY,
            RotationPeriod::Hourly => Rotation::HOURLY,
            RotationPeriod::Daily => Rotation::DAILY,
            RotationPeriod::Never => Rotation::NEVER,
        }
    }
}

/// The `log` section of the settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub dir: PathBuf,
    pub prefix: String,
    pub rotation: RotationPeriod,
    /// Files kept after pruning, 0 keeps everything.
    pub max_files: usize,
    /// Mirror file output on stdout.
    pub console: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            prefix: "ac-partner-bridge".to_string(),
            rotation: RotationPeriod::Daily,
            max_files: 7,
            console: true,
        }
    }
}

/// Keeps the non-blocking writer alive; logs are flushed when it is dropped.
pub struct LogGuard {
    _guard: Option<WorkerGuard>,
}

/// Installs the global subscriber. Without a file configuration everything
/// goes to stdout, filtered by `RUST_LOG`.
pub fn init_logging(config: Option<&LogConfig>) -> io::Result<LogGuard> {
    match config {
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .init();
            Ok(LogGuard { _guard: None })
        }
        Some(config) => {
            let (writer, guard) = file_writer(config)?;
            let file_layer = Layer::default()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true);
            let console_layer = config.console.then(|| {
                Layer::default()
                    .with_writer(io::stdout)
                    .with_ansi(true)
                    .with_target(true)
            });

            tracing_subscriber::registry()
                .with(EnvFilter::from_default_env())
                .with(file_layer)
                .with(console_layer)
                .init();

            Ok(LogGuard {
                _guard: Some(guard),
            })
        }
    }
}

fn file_writer(config: &LogConfig) -> io::Result<(NonBlocking, WorkerGuard)> {
    if config.max_files > 0 {
        cleanup_old_logs(&config.dir, &config.prefix, config.max_files)?;
    }

    let mut builder = RollingFileAppender::builder()
        .rotation(config.rotation.into())
        .filename_prefix(&config.prefix)
        .filename_suffix(LOG_SUFFIX);
    if config.max_files > 0 {
        builder = builder.max_log_files(config.max_files);
    }
    let appender = builder.build(&config.dir).map_err(io::Error::other)?;

    Ok(tracing_appender::non_blocking(appender))
}

/// Removes the oldest `{prefix}*.log` files so that at most `max_files` remain.
fn cleanup_old_logs(log_dir: &Path, prefix: &str, max_files: usize) -> io::Result<()> {
    if !log_dir.exists() {
        return Ok(());
    }

    let mut log_files: Vec<_> = std::fs::read_dir(log_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(prefix) && name.ends_with(".log"))
        })
        .filter_map(|entry| {
            let modified = entry.metadata().and_then(|m| m.modified()).ok()?;
            Some((modified, entry.path()))
        })
        .collect();

    // newest first; file names carry the date so they break mtime ties
    log_files.sort_by(|a, b| b.cmp(a));

    for (_, path) in log_files.into_iter().skip(max_files) {
        if let Err(e) = std::fs::remove_file(&path) {
            eprintln!("Warning: failed to remove old log file {:?}: {}", path, e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rotation_period_from_str() {
        assert_eq!(
            "hourly".parse::<RotationPeriod>().unwrap(),
            RotationPeriod::Hourly
        );
        assert_eq!(
            "Minute".parse::<RotationPeriod>().unwrap(),
            RotationPeriod::Minutely
        );
        assert_eq!(
            "NONE".parse::<RotationPeriod>().unwrap(),
            RotationPeriod::Never
        );
        assert!("weekly".parse::<RotationPeriod>().is_err());
    }

    #[test]
    fn test_log_config_defaults_fill_missing_fields() {
        let config: LogConfig =
            serde_json::from_str(r#"{ "dir": "/var/log/ac-partner", "rotation": "hourly" }"#)
                .unwrap();
        assert_eq!(config.dir, PathBuf::from("/var/log/ac-partner"));
        assert_eq!(config.prefix, "ac-partner-bridge");
        assert_eq!(config.rotation, RotationPeriod::Hourly);
        assert_eq!(config.max_files, 7);
        assert!(config.console);

        let invalid = serde_json::from_str::<LogConfig>(r#"{ "rotation": "weekly" }"#);
        assert!(invalid.is_err());
    }

    #[test]
    fn test_cleanup_keeps_newest_files() {
        let temp_dir = TempDir::new().unwrap();
        let log_dir = temp_dir.path();

        for i in 0..5 {
            let path = log_dir.join(format!("bridge.2026-10-0{}.log", i + 1));
            std::fs::write(&path, format!("log content {}", i)).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        std::fs::write(log_dir.join("other.log"), "kept").unwrap();

        cleanup_old_logs(log_dir, "bridge.", 2).unwrap();

        let mut remaining: Vec<_> = std::fs::read_dir(log_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        remaining.sort();

        assert_eq!(
            remaining,
            vec![
                "bridge.2026-10-04.log".to_string(),
                "bridge.2026-10-05.log".to_string(),
                "other.log".to_string(),
            ]
        );
    }

    #[test]
    fn test_cleanup_ignores_missing_dir() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");
        assert!(cleanup_old_logs(&missing, "bridge.", 2).is_ok());
    }
}
