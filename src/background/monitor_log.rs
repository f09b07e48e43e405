//! Per-monitor append-only log file.
//!
//! Lines are `[ISO-8601 timestamp] [LEVEL] message`. Each line is mirrored
//! to `tracing`. Write failures are reported through `tracing` and never
//! reach the caller.

use chrono::{SecondsFormat, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorLog {
    monitor: &'static str,
    path: PathBuf,
}

impl MonitorLog {
    /// Log for `monitor` stored at `<dir>/<monitor>-monitor.log`.
    pub fn new(dir: &Path, monitor: &'static str) -> Self {
        Self {
            monitor,
            path: dir.join(format!("{monitor}-monitor.log")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.write(LogLevel::Info, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.write(LogLevel::Warn, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.write(LogLevel::Error, message.as_ref());
    }

    pub fn write(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Info => info!(monitor = self.monitor, "{message}"),
            LogLevel::Warn => warn!(monitor = self.monitor, "{message}"),
            LogLevel::Error => error!(monitor = self.monitor, "{message}"),
        }

        let line = format_line(level, message);
        if let Err(e) = self.append(&line) {
            warn!(
                monitor = self.monitor,
                path = %self.path.display(),
                error = %e,
                "Failed to append to monitor log"
            );
        }
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

fn format_line(level: LogLevel, message: &str) -> String {
    format!(
        "[{}] [{}] {}\n",
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        level.as_str(),
        message
    )
}
