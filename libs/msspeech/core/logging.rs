//! Per-context logging configuration
//!
//! There is no process-wide log level or sink. A `LogConfig` is handed to
//! `Context::new`, turned into a `Logger`, and cloned into every connection.

use crate::traits::callbacks::LogSink;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::Level;

/// Log verbosity, ordered from least to most verbose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl From<Level> for LogLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::ERROR => LogLevel::Error,
            Level::WARN => LogLevel::Warn,
            Level::INFO => LogLevel::Info,
            Level::DEBUG => LogLevel::Debug,
            Level::TRACE => LogLevel::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" | "none" => Ok(LogLevel::Off),
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logging configuration for a context
#[derive(Clone, Default)]
pub struct LogConfig {
    pub level: LogLevel,
    /// Receives formatted records instead of `tracing`
    pub sink: Option<Arc<dyn LogSink>>,
}

impl LogConfig {
    pub fn new(level: LogLevel) -> Self {
        Self { level, sink: None }
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }
}

impl fmt::Debug for LogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogConfig")
            .field("level", &self.level)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

/// Level filter plus destination, injected into each component that logs
#[derive(Clone, Default)]
pub struct Logger {
    level: LogLevel,
    sink: Option<Arc<dyn LogSink>>,
}

impl Logger {
    pub fn new(config: &LogConfig) -> Self {
        Self {
            level: config.level,
            sink: config.sink.clone(),
        }
    }

    /// Same filter, but `sink` replaces the current destination when present
    pub fn with_sink_override(&self, sink: Option<Arc<dyn LogSink>>) -> Self {
        Self {
            level: self.level,
            sink: sink.or_else(|| self.sink.clone()),
        }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn enabled(&self, level: Level) -> bool {
        LogLevel::from(level) <= self.level
    }

    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        if !self.enabled(level) {
            return;
        }

        match &self.sink {
            Some(sink) => sink.log(level, &args.to_string()),
            None => match level {
                Level::ERROR => tracing::error!("{}", args),
                Level::WARN => tracing::warn!("{}", args),
                Level::INFO => tracing::info!("{}", args),
                Level::DEBUG => tracing::debug!("{}", args),
                Level::TRACE => tracing::trace!("{}", args),
            },
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

macro_rules! log_error {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log(::tracing::Level::ERROR, format_args!($($arg)*))
    };
}

macro_rules! log_warn {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log(::tracing::Level::WARN, format_args!($($arg)*))
    };
}

macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log(::tracing::Level::INFO, format_args!($($arg)*))
    };
}

macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log(::tracing::Level::DEBUG, format_args!($($arg)*))
    };
}

pub(crate) use {log_debug, log_error, log_info, log_warn};

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn capture() -> (Arc<Mutex<Vec<(Level, String)>>>, Arc<dyn LogSink>) {
        let records = Arc::new(Mutex::new(Vec::new()));
        let sink_records = records.clone();
        let sink: Arc<dyn LogSink> = Arc::new(move |level: Level, message: &str| {
            sink_records.lock().push((level, message.to_string()));
        });
        (records, sink)
    }

    #[test]
    fn test_level_filter() {
        let (records, sink) = capture();
        let logger = Logger::new(&LogConfig::new(LogLevel::Warn).with_sink(sink));

        log_debug!(logger, "dropped {}", 1);
        log_warn!(logger, "kept {}", 2);
        log_error!(logger, "kept {}", 3);

        let records = records.lock();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], (Level::WARN, "kept 2".to_string()));
        assert_eq!(records[1].0, Level::ERROR);
    }

    #[test]
    fn test_off_silences_everything() {
        let (records, sink) = capture();
        let logger = Logger::new(&LogConfig::new(LogLevel::Off).with_sink(sink));
        log_error!(logger, "nothing");
        assert!(records.lock().is_empty());
    }

    #[test]
    fn test_connection_sink_overrides_context_sink() {
        let (context_records, context_sink) = capture();
        let (connection_records, connection_sink) = capture();
        let logger = Logger::new(&LogConfig::new(LogLevel::Info).with_sink(context_sink));

        let overridden = logger.with_sink_override(Some(connection_sink));
        log_info!(overridden, "to connection");
        let inherited = logger.with_sink_override(None);
        log_info!(inherited, "to context");

        assert_eq!(connection_records.lock().len(), 1);
        assert_eq!(context_records.lock()[0].1, "to context");
    }

    #[test]
    fn test_parse_levels() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("trace".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
