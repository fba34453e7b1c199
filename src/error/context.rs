//! Error Context
//!
//! Diagnostic fields attached to raised errors.

use serde::Serialize;
use serde_json::{Map, Value};

/// Placeholder written in place of sensitive values.
pub const REDACTED: &str = "[REDACTED]";

/// Mapping of diagnostic fields carried by an [`OAuth2Error`](super::OAuth2Error).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ErrorContext(Map<String, Value>);

impl ErrorContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context scoped to a service.
    pub fn for_service(service: &str) -> Self {
        Self::new().with("service", service)
    }

    /// Add a field.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Add a response body.
    ///
    /// The raw text is kept under `response_body`; when it parses as JSON the
    /// parsed document is also stored under `response`.
    pub fn with_response(mut self, body: &str) -> Self {
        if let Ok(parsed) = serde_json::from_str::<Value>(body) {
            self.0.insert("response".to_string(), parsed);
        }
        self.0
            .insert("response_body".to_string(), Value::String(body.to_string()));
        self
    }

    /// Get a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Access the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert into a JSON object.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}
