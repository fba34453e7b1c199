//! Logging
//!
//! Structured logging for token and request operations.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::REDACTED;
use crate::types::LoggingSettings;

/// Log level.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warn level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// OAuth2 log context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OAuth2LogContext {
    /// Service name.
    pub service: Option<String>,
    /// Operation name.
    pub operation: Option<String>,
    /// Structured fields.
    pub fields: Map<String, Value>,
}

impl OAuth2LogContext {
    /// Create new log context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set service.
    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Set operation.
    pub fn operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Add a structured field.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Copy of the context with the given dotted paths redacted in `fields`.
    pub fn redacted(&self, paths: &[String]) -> Self {
        let mut fields = Value::Object(self.fields.clone());
        redact_paths(&mut fields, paths);
        Self {
            service: self.service.clone(),
            operation: self.operation.clone(),
            fields: match fields {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }
}

/// Replace the values at dotted `paths` (e.g. `options.headers.authorization`)
/// with the redaction placeholder. Missing paths are ignored.
pub fn redact_paths(value: &mut Value, paths: &[String]) {
    for path in paths {
        let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        if let Some((last, parents)) = segments.split_last() {
            let target = parents
                .iter()
                .try_fold(&mut *value, |current, segment| current.get_mut(*segment))
                .and_then(|parent| parent.get_mut(*last));
            if let Some(target) = target {
                *target = Value::String(REDACTED.to_string());
            }
        }
    }
}

/// Logger interface.
pub trait Logger: Send + Sync {
    /// Log a message at `level`.
    fn log(&self, level: LogLevel, message: &str, context: &OAuth2LogContext);

    /// Check if a log level is enabled.
    fn is_enabled(&self, level: LogLevel) -> bool;

    /// Log at trace level.
    fn trace(&self, message: &str, context: &OAuth2LogContext) {
        self.log(LogLevel::Trace, message, context);
    }

    /// Log at debug level.
    fn debug(&self, message: &str, context: &OAuth2LogContext) {
        self.log(LogLevel::Debug, message, context);
    }

    /// Log at info level.
    fn info(&self, message: &str, context: &OAuth2LogContext) {
        self.log(LogLevel::Info, message, context);
    }

    /// Log at warn level.
    fn warn(&self, message: &str, context: &OAuth2LogContext) {
        self.log(LogLevel::Warn, message, context);
    }

    /// Log at error level.
    fn error(&self, message: &str, context: &OAuth2LogContext) {
        self.log(LogLevel::Error, message, context);
    }
}

/// No-op logger implementation.
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn log(&self, _level: LogLevel, _message: &str, _context: &OAuth2LogContext) {}

    fn is_enabled(&self, _level: LogLevel) -> bool {
        false
    }
}

/// No-op logger singleton.
pub fn no_op_logger() -> NoOpLogger {
    NoOpLogger
}

/// Logger emitting `tracing` events.
///
/// Fields are redacted, then attached as a JSON `context` field next to
/// `service` and `operation`.
pub struct TracingLogger {
    min_level: LogLevel,
    redact: Vec<String>,
}

impl TracingLogger {
    /// Create tracing logger with minimum level and redacted paths.
    pub fn new(min_level: LogLevel, redact: Vec<String>) -> Self {
        Self { min_level, redact }
    }
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self::new(LogLevel::Info, Vec::new())
    }
}

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str, context: &OAuth2LogContext) {
        if !self.is_enabled(level) {
            return;
        }

        let context = context.redacted(&self.redact);
        let service = context.service.as_deref().unwrap_or("");
        let operation = context.operation.as_deref().unwrap_or("");
        let fields = Value::Object(context.fields);

        match level {
            LogLevel::Trace => {
                tracing::trace!(service, operation, context = %fields, "{}", message)
            }
            LogLevel::Debug => {
                tracing::debug!(service, operation, context = %fields, "{}", message)
            }
            LogLevel::Info => {
                tracing::info!(service, operation, context = %fields, "{}", message)
            }
            LogLevel::Warn => {
                tracing::warn!(service, operation, context = %fields, "{}", message)
            }
            LogLevel::Error => {
                tracing::error!(service, operation, context = %fields, "{}", message)
            }
        }
    }

    fn is_enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }
}

/// Log entry for in-memory storage.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub context: OAuth2LogContext,
    pub timestamp: DateTime<Utc>,
}

/// In-memory logger for testing.
pub struct InMemoryLogger {
    entries: Mutex<Vec<LogEntry>>,
    min_level: LogLevel,
    redact: Vec<String>,
}

impl InMemoryLogger {
    /// Create new in-memory logger.
    pub fn new() -> Self {
        Self::with_level(LogLevel::Trace)
    }

    /// Create in-memory logger with minimum level.
    pub fn with_level(min_level: LogLevel) -> Self {
        Self::with_redaction(min_level, Vec::new())
    }

    /// Create in-memory logger that redacts the given paths.
    pub fn with_redaction(min_level: LogLevel, redact: Vec<String>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            min_level,
            redact,
        }
    }

    /// Get all log entries.
    pub fn get_entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Get entries by level.
    pub fn get_entries_by_level(&self, level: LogLevel) -> Vec<LogEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.level == level)
            .cloned()
            .collect()
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Default for InMemoryLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger for InMemoryLogger {
    fn log(&self, level: LogLevel, message: &str, context: &OAuth2LogContext) {
        if self.is_enabled(level) {
            self.entries.lock().push(LogEntry {
                level,
                message: message.to_string(),
                context: context.redacted(&self.redact),
                timestamp: Utc::now(),
            });
        }
    }

    fn is_enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }
}

/// Build the logger described by logging settings.
pub fn create_logger(settings: &LoggingSettings) -> Arc<dyn Logger> {
    if settings.enabled {
        Arc::new(TracingLogger::new(settings.level, settings.redact.clone()))
    } else {
        Arc::new(NoOpLogger)
    }
}

/// Create in-memory logger for testing.
pub fn create_in_memory_logger() -> InMemoryLogger {
    InMemoryLogger::new()
}
