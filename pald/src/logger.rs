//! # Stderr Logger
//!
//! Structured log entries for the daemon, installed behind the `log` facade.
//!
//! ## Philosophy
//!
//! Logging is explicit and structured: every line is a level, a target, a
//! message and a list of key/value fields.

use std::fmt;
use std::io::Write;

use log::{LevelFilter, Log, Metadata, Record};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("Unknown log level: {0}")]
    UnknownLevel(String),

    #[error("A logger is already installed")]
    AlreadyInstalled,
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational messages
    Info,
    /// Warnings
    Warn,
    /// Errors
    Error,
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Trace | log::Level::Debug => LogLevel::Debug,
            log::Level::Info => LogLevel::Info,
            log::Level::Warn => LogLevel::Warn,
            log::Level::Error => LogLevel::Error,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        })
    }
}

/// A structured log entry
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    /// Module or subsystem that produced the entry
    pub target: String,
    pub message: String,
    /// Structured fields
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    /// Creates a new log entry
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            target: target.into(),
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a field to the log entry
    pub fn with_field(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.fields.push((key.into(), value.to_string()));
        self
    }

    /// Builds an entry from a facade record; debug entries carry their
    /// source location
    pub fn from_record(record: &Record<'_>) -> Self {
        let level = LogLevel::from(record.level());
        let mut entry = Self::new(level, record.target(), record.args().to_string());
        if level == LogLevel::Debug {
            if let (Some(file), Some(line)) = (record.file(), record.line()) {
                entry = entry.with_field("at", format!("{}:{}", file, line));
            }
        }
        entry
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:<5}] {}: {}", self.level, self.target, self.message)?;
        for (key, value) in &self.fields {
            write!(f, " {}={}", key, value)?;
        }
        Ok(())
    }
}

/// Writes entries to stderr, one per line
#[derive(Debug)]
pub struct StderrLogger {
    level: LevelFilter,
}

impl StderrLogger {
    pub fn new(level: LevelFilter) -> Self {
        Self { level }
    }

    /// Parses a level name such as `"info"` or `"debug"`
    pub fn parse_level(name: &str) -> Result<LevelFilter, LoggerError> {
        name.parse()
            .map_err(|_| LoggerError::UnknownLevel(name.to_string()))
    }

    /// Installs the logger as the process-wide `log` backend
    pub fn install(self) -> Result<(), LoggerError> {
        let level = self.level;
        log::set_logger(Box::leak(Box::new(self))).map_err(|_| LoggerError::AlreadyInstalled)?;
        log::set_max_level(level);
        Ok(())
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let entry = LogEntry::from_record(record);
        // nowhere left to report a failed stderr write
        let _ = writeln!(std::io::stderr().lock(), "{}", entry);
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert_eq!(LogLevel::from(log::Level::Trace), LogLevel::Debug);
    }

    #[test]
    fn test_entry_rendering() {
        let entry = LogEntry::new(LogLevel::Info, "pald", "demo finished")
            .with_field("frames", 12)
            .with_field("quit", true);
        assert_eq!(entry.to_string(), "[INFO ] pald: demo finished frames=12 quit=true");
    }

    #[test]
    fn test_from_record() {
        let record = Record::builder()
            .args(format_args!("surface 64x48"))
            .level(log::Level::Debug)
            .target("pal::framebuffer")
            .file(Some("framebuffer.rs"))
            .line(Some(42))
            .build();
        let entry = LogEntry::from_record(&record);
        assert_eq!(entry.level, LogLevel::Debug);
        assert_eq!(entry.target, "pal::framebuffer");
        assert_eq!(entry.message, "surface 64x48");
        assert_eq!(entry.fields, vec![("at".to_string(), "framebuffer.rs:42".to_string())]);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(StderrLogger::parse_level("debug").unwrap(), LevelFilter::Debug);
        assert_eq!(StderrLogger::parse_level("WARN").unwrap(), LevelFilter::Warn);
        assert!(matches!(
            StderrLogger::parse_level("chatty"),
            Err(LoggerError::UnknownLevel(_))
        ));
    }

    #[test]
    fn test_enabled_respects_level() {
        let logger = StderrLogger::new(LevelFilter::Warn);
        let warn = Metadata::builder().level(log::Level::Warn).build();
        let info = Metadata::builder().level(log::Level::Info).build();
        assert!(logger.enabled(&warn));
        assert!(!logger.enabled(&info));
    }
}
