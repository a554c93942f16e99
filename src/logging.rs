//! Logging
//!
//! `log` backend for rumkit: text or JSON lines, console and/or file
//! destinations with independent levels, local timestamps
//! (`YYYY-MM-DD HH:mm:ss`).
//!
//! The logger also exposes a tap slot. Whatever is installed in the slot sees
//! every record before level filtering; the console producer uses it to turn
//! warnings and errors into telemetry.
//!
//! ```no_run
//! use rumkit::logging::{init_logger, LogConfig, LogDestination, LogFormat};
//! use log::LevelFilter;
//! use std::path::PathBuf;
//!
//! let config = LogConfig {
//!     console_level: LevelFilter::Info,
//!     file_level: Some(LevelFilter::Debug),
//!     format: LogFormat::Json,
//!     destination: LogDestination::Both(PathBuf::from("rumkit.log")),
//! };
//! init_logger(config)?;
//! log::info!("telemetry pipeline started");
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::{Level, LevelFilter};
use serde::{Deserialize, Serialize};

use crate::plugin::interceptor::Interceptor;

/// Log output format options
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: {}. Valid options: text, json", s)),
        }
    }
}

/// Log destination options
#[derive(Debug, Clone, PartialEq)]
pub enum LogDestination {
    Console,
    File(PathBuf),
    Both(PathBuf),
}

/// JSON log line
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonLogEntry {
    pub timestamp: String,
    pub level: String,
    pub target: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub console_level: LevelFilter,
    pub file_level: Option<LevelFilter>,
    pub format: LogFormat,
    pub destination: LogDestination,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_level: LevelFilter::Warn,
            file_level: None,
            format: LogFormat::Text,
            destination: LogDestination::Console,
        }
    }
}

impl LogConfig {
    /// Most verbose level any destination wants
    pub fn max_level(&self) -> LevelFilter {
        match self.file_level {
            Some(file_level) => file_level.max(self.console_level),
            None => self.console_level,
        }
    }
}

/// A log record as seen by a tap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TappedRecord {
    pub level: Level,
    pub target: String,
    pub message: String,
}

/// Observer of log records
pub type LogTap = dyn Fn(&TappedRecord) + Send + Sync;

/// Process-wide tap slot read by the installed logger
pub fn console_tap() -> Interceptor<LogTap> {
    static TAP: OnceLock<Interceptor<LogTap>> = OnceLock::new();
    TAP.get_or_init(Interceptor::new).clone()
}

pub struct RumLogger {
    config: LogConfig,
    tap: Interceptor<LogTap>,
}

impl RumLogger {
    pub fn new(config: LogConfig) -> Self {
        Self::with_tap(config, console_tap())
    }

    pub fn with_tap(config: LogConfig, tap: Interceptor<LogTap>) -> Self {
        Self { config, tap }
    }

    fn format_timestamp() -> String {
        let now: DateTime<Local> = Local::now();
        now.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    fn format_text_message(&self, level: Level, target: &str, message: &str) -> String {
        format!(
            "{} [{}] {}: {}",
            Self::format_timestamp(),
            level.to_string().to_uppercase(),
            target,
            message
        )
    }

    fn format_json_message(&self, level: Level, target: &str, message: &str) -> Result<String> {
        let entry = JsonLogEntry {
            timestamp: Self::format_timestamp(),
            level: level.to_string().to_uppercase(),
            target: target.to_string(),
            message: message.to_string(),
        };
        serde_json::to_string(&entry).context("Failed to serialize log entry to JSON")
    }

    fn should_log_to_console(&self, level: Level) -> bool {
        level <= self.config.console_level
    }

    fn should_log_to_file(&self, level: Level) -> bool {
        self.config.file_level.map_or(false, |file_level| level <= file_level)
    }

    fn write_to_console(&self, formatted_message: &str) -> Result<()> {
        writeln!(io::stderr(), "{}", formatted_message).context("Failed to write to console")
    }

    fn write_to_file(&self, formatted_message: &str, file_path: &PathBuf) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)
            .with_context(|| format!("Failed to open log file: {}", file_path.display()))?;

        writeln!(file, "{}", formatted_message).context("Failed to write to log file")
    }

    fn format(&self, level: Level, target: &str, message: &str) -> String {
        match self.config.format {
            LogFormat::Text => self.format_text_message(level, target, message),
            LogFormat::Json => self.format_json_message(level, target, message).unwrap_or_else(|e| {
                eprintln!("JSON formatting error: {}. Falling back to text format.", e);
                self.format_text_message(level, target, message)
            }),
        }
    }
}

impl log::Log for RumLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.should_log_to_console(metadata.level()) || self.should_log_to_file(metadata.level())
    }

    fn log(&self, record: &log::Record) {
        let message = record.args().to_string();
        let level = record.level();

        if let Some(tap) = self.tap.current() {
            tap(&TappedRecord {
                level,
                target: record.target().to_string(),
                message: message.clone(),
            });
        }

        if !self.enabled(record.metadata()) {
            return;
        }
        let formatted_message = self.format(level, record.target(), &message);

        let (to_console, file) = match &self.config.destination {
            LogDestination::Console => (self.should_log_to_console(level), None),
            LogDestination::File(path) => (false, Some(path)),
            LogDestination::Both(path) => (self.should_log_to_console(level), Some(path)),
        };

        if to_console {
            if let Err(e) = self.write_to_console(&formatted_message) {
                eprintln!("Console logging error: {}", e);
            }
        }
        if let Some(path) = file.filter(|_| self.should_log_to_file(level)) {
            if let Err(e) = self.write_to_file(&formatted_message, path) {
                eprintln!("File logging error: {}", e);
                if matches!(self.config.destination, LogDestination::File(_)) {
                    let _ = self.write_to_console(&formatted_message);
                }
            }
        }
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

/// Initialize the logging system with the given configuration
pub fn init_logger(config: LogConfig) -> Result<()> {
    let max_level = config.max_level();
    log::set_boxed_logger(Box::new(RumLogger::new(config))).context("Failed to set global logger")?;
    log::set_max_level(max_level);
    Ok(())
}

/// Convert string to LevelFilter
pub fn parse_log_level(level_str: &str) -> Result<LevelFilter> {
    match level_str.to_lowercase().as_str() {
        "error" => Ok(LevelFilter::Error),
        "warn" => Ok(LevelFilter::Warn),
        "info" => Ok(LevelFilter::Info),
        "debug" => Ok(LevelFilter::Debug),
        "trace" => Ok(LevelFilter::Trace),
        "off" => Ok(LevelFilter::Off),
        _ => Err(anyhow::anyhow!(
            "Invalid log level: {}. Valid levels: error, warn, info, debug, trace, off",
            level_str
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Log;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(parse_log_level("error").unwrap(), LevelFilter::Error);
        assert_eq!(parse_log_level("Debug").unwrap(), LevelFilter::Debug);
        assert_eq!(parse_log_level("off").unwrap(), LevelFilter::Off);
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_max_level_takes_most_verbose() {
        let config = LogConfig {
            console_level: LevelFilter::Warn,
            file_level: Some(LevelFilter::Debug),
            ..LogConfig::default()
        };
        assert_eq!(config.max_level(), LevelFilter::Debug);
        assert_eq!(LogConfig::default().max_level(), LevelFilter::Warn);
    }

    #[test]
    fn test_timestamp_format() {
        let timestamp = RumLogger::format_timestamp();
        assert_eq!(timestamp.len(), 19);
        assert_eq!(timestamp.chars().nth(4), Some('-'));
        assert_eq!(timestamp.chars().nth(10), Some(' '));
        assert_eq!(timestamp.chars().nth(16), Some(':'));
    }

    #[test]
    fn test_json_message_formatting() {
        let logger = RumLogger::with_tap(LogConfig::default(), Interceptor::new());
        let formatted = logger.format_json_message(Level::Warn, "rumkit::transport", "flush failed").unwrap();
        let entry: JsonLogEntry = serde_json::from_str(&formatted).unwrap();
        assert_eq!(entry.level, "WARN");
        assert_eq!(entry.target, "rumkit::transport");
        assert_eq!(entry.message, "flush failed");
    }

    #[test]
    fn test_tap_sees_records_below_threshold() {
        let tap: Interceptor<LogTap> = Interceptor::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _guard = tap.install(Arc::new(move |record: &TappedRecord| sink.lock().push(record.clone())));
        let config = LogConfig {
            console_level: LevelFilter::Off,
            ..LogConfig::default()
        };
        let logger = RumLogger::with_tap(config, tap);

        logger.log(
            &log::Record::builder()
                .level(Level::Warn)
                .target("app::db")
                .args(format_args!("slow query"))
                .build(),
        );

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].target, "app::db");
        assert_eq!(seen[0].message, "slow query");
    }

    #[test]
    fn test_file_destination() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rumkit.log");
        let config = LogConfig {
            console_level: LevelFilter::Off,
            file_level: Some(LevelFilter::Info),
            format: LogFormat::Text,
            destination: LogDestination::File(path.clone()),
        };
        let logger = RumLogger::with_tap(config, Interceptor::new());

        logger.log(
            &log::Record::builder()
                .level(Level::Info)
                .target("rumkit")
                .args(format_args!("batch delivered"))
                .build(),
        );
        logger.log(
            &log::Record::builder()
                .level(Level::Debug)
                .target("rumkit")
                .args(format_args!("hidden"))
                .build(),
        );

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[INFO] rumkit: batch delivered"));
        assert!(!content.contains("hidden"));
    }
}
