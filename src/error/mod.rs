//! OAuth2 Error Types
//!
//! A single error type is raised to callers. Every variant carries a message,
//! an optional HTTP status and a diagnostic [`ErrorContext`].

pub mod context;
pub mod response;

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

pub use context::{ErrorContext, REDACTED};
pub use response::{debug_requested, render_error, ErrorResponse};

/// Root error type for the OAuth2 service client.
#[derive(Error, Debug)]
pub enum OAuth2Error {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Stored expiry could not be read back as a timestamp.
    #[error("{message}")]
    CacheCorruption {
        message: String,
        context: ErrorContext,
    },

    /// Token endpoint answered with a failure status or could not be reached.
    #[error("{message}")]
    TokenFetch {
        message: String,
        status: Option<u16>,
        context: ErrorContext,
        #[source]
        source: Option<TransportError>,
    },

    /// Token endpoint answered 2xx without the required fields.
    #[error("{message}")]
    InvalidTokenResponse {
        message: String,
        context: ErrorContext,
    },

    /// Authenticated call to the downstream API failed.
    #[error("{message}")]
    Request {
        message: String,
        status: Option<u16>,
        context: ErrorContext,
        #[source]
        source: Option<TransportError>,
    },

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

impl OAuth2Error {
    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "OAUTH2_CONFIG",
            Self::CacheCorruption { .. } => "OAUTH2_CACHE_CORRUPTION",
            Self::TokenFetch { .. } => "OAUTH2_TOKEN_FETCH",
            Self::InvalidTokenResponse { .. } => "OAUTH2_INVALID_TOKEN_RESPONSE",
            Self::Request { .. } => "OAUTH2_REQUEST",
            Self::Cache(_) => "OAUTH2_CACHE",
        }
    }

    /// Name of the error kind, as exposed in debug error responses.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "ConfigurationError",
            Self::CacheCorruption { .. } => "CacheCorruptionError",
            Self::TokenFetch { .. } => "TokenFetchError",
            Self::InvalidTokenResponse { .. } => "InvalidTokenResponseError",
            Self::Request { .. } => "RequestError",
            Self::Cache(_) => "CacheError",
        }
    }

    /// HTTP status the error was derived from, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::TokenFetch { status, .. } | Self::Request { status, .. } => *status,
            _ => None,
        }
    }

    /// Numeric status code; `0` when the error is not HTTP-derived.
    pub fn status_code(&self) -> u16 {
        self.status().unwrap_or(0)
    }

    /// Diagnostic context.
    pub fn context(&self) -> ErrorContext {
        match self {
            Self::Configuration(e) => ErrorContext::for_service(e.service()),
            Self::CacheCorruption { context, .. }
            | Self::TokenFetch { context, .. }
            | Self::InvalidTokenResponse { context, .. }
            | Self::Request { context, .. } => context.clone(),
            Self::Cache(e) => ErrorContext::new().with("key", e.key()),
        }
    }

    /// Parsed response document, or the raw body when it was not JSON.
    pub fn response_data(&self) -> Option<Value> {
        let context = self.context();
        context
            .get("response")
            .or_else(|| context.get("response_body"))
            .cloned()
    }

    /// Check if the error came from a 401 answer.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Message without the `"... for service X with status N: "` prefix.
    ///
    /// Falls back to the full message when it matches no known shape.
    pub fn clean_message(&self) -> String {
        clean_message(&self.to_string())
    }
}

/// Strip the service/status prefix from a formatted error message.
pub fn clean_message(message: &str) -> String {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        [
            Regex::new(r"(?s)^.*? for service \S+ with status \d+: (.*)$")
                .expect("status message pattern is valid"),
            Regex::new(r"(?s)^.*? for service \S+: (.*)$")
                .expect("service message pattern is valid"),
        ]
    });

    patterns
        .iter()
        .find_map(|pattern| {
            pattern
                .captures(message)
                .and_then(|captures| captures.get(1))
                .map(|m| m.as_str().trim())
                .filter(|cleaned| !cleaned.is_empty())
        })
        .unwrap_or(message)
        .to_string()
}

/// Service configuration error, raised when a client is constructed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("OAuth2 configuration for service {service} not found")]
    NotFound { service: String },

    #[error("OAuth2 configuration for service {service} must be a mapping, found {found}")]
    InvalidType { service: String, found: String },

    #[error("OAuth2 configuration for service {service} has invalid field {field}: {reason}")]
    InvalidFormat {
        service: String,
        field: String,
        reason: String,
    },
}

impl ConfigurationError {
    /// Service the error refers to.
    pub fn service(&self) -> &str {
        match self {
            Self::NotFound { service }
            | Self::InvalidType { service, .. }
            | Self::InvalidFormat { service, .. } => service,
        }
    }
}

/// Transport-level failure: the request never produced an HTTP response.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Request timeout after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Response too large: {size} bytes")]
    ResponseTooLarge { size: usize },
}

/// Cache backend failure.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    #[error("Read failed for {key}: {message}")]
    ReadFailed { key: String, message: String },

    #[error("Write failed for {key}: {message}")]
    WriteFailed { key: String, message: String },

    #[error("Delete failed for {key}: {message}")]
    DeleteFailed { key: String, message: String },
}

impl CacheError {
    pub fn key(&self) -> &str {
        match self {
            Self::ReadFailed { key, .. }
            | Self::WriteFailed { key, .. }
            | Self::DeleteFailed { key, .. } => key,
        }
    }
}

/// Result type for OAuth2 operations.
pub type OAuth2Result<T> = Result<T, OAuth2Error>;

/// OAuth2 error response from provider.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct OAuth2ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub error_uri: Option<String>,
}

/// Parse error response from HTTP body.
pub fn parse_error_response(body: &str) -> Option<OAuth2ErrorResponse> {
    serde_json::from_str(body).ok()
}

const MAX_DETAIL_LEN: usize = 512;

/// Short human-readable description of a failure body.
///
/// Prefers the OAuth2 `error`/`error_description` pair, then a `message`
/// field, then the raw text.
pub fn describe_error_body(body: &str) -> String {
    if let Some(response) = parse_error_response(body) {
        return match response.error_description {
            Some(description) if !description.is_empty() => {
                format!("{}: {}", response.error, description)
            }
            _ => response.error,
        };
    }

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        let message = map
            .get("message")
            .or_else(|| map.get("error").and_then(|e| e.get("message")));
        if let Some(Value::String(message)) = message {
            return message.clone();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    if trimmed.len() > MAX_DETAIL_LEN {
        let cut = (0..=MAX_DETAIL_LEN)
            .rev()
            .find(|i| trimmed.is_char_boundary(*i))
            .unwrap_or(0);
        return format!("{}...", &trimmed[..cut]);
    }
    trimmed.to_string()
}
