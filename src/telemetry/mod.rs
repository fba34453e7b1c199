//! Telemetry
//!
//! Structured logging with context and field redaction.

pub mod logging;

pub use logging::{
    create_in_memory_logger, create_logger, no_op_logger, redact_paths, InMemoryLogger,
    LogEntry, LogLevel, Logger, NoOpLogger, OAuth2LogContext, TracingLogger,
};
