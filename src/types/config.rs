//! Configuration Types
//!
//! Global client settings and the resolved per-service configuration.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::core::ServiceConfigResolver;
use crate::error::ConfigurationError;
use crate::telemetry::LogLevel;

/// Default cache key prefix.
pub const DEFAULT_CACHE_PREFIX: &str = "oauth2_";
/// Default grace period before token expiry, in seconds.
pub const DEFAULT_EXPIRATION_BUFFER_SECS: u64 = 60;
/// Largest accepted grace period before token expiry, in seconds.
pub const MAX_EXPIRATION_BUFFER_SECS: u64 = 86_400;

/// Resolved OAuth2 settings for one service.
///
/// Built once by [`ServiceConfigResolver`] and never mutated afterwards.
#[derive(Clone)]
pub struct ServiceConfig {
    /// Token endpoint URL.
    pub token_url: String,
    /// Client identifier.
    pub client_id: String,
    /// Client secret.
    pub client_secret: SecretString,
    /// Requested scope (space separated, may be empty).
    pub scope: String,
    /// Verify TLS certificates on token and resource calls.
    pub verify_tls: bool,
}

impl ServiceConfig {
    /// Create a configuration with empty scope and TLS verification on.
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
            scope: String::new(),
            verify_tls: true,
        }
    }

    /// Set scope.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Enable or disable TLS verification.
    pub fn with_verify_tls(mut self, verify_tls: bool) -> Self {
        self.verify_tls = verify_tls;
        self
    }
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("scope", &self.scope)
            .field("verify_tls", &self.verify_tls)
            .finish()
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Emit log events at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Minimum level emitted.
    #[serde(default)]
    pub level: LogLevel,
    /// Dotted field paths whose values are redacted before emission.
    #[serde(default = "default_redact")]
    pub redact: Vec<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            level: LogLevel::default(),
            redact: default_redact(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_redact() -> Vec<String> {
    vec!["access_token".to_string(), "client_secret".to_string()]
}

fn default_cache_prefix() -> String {
    DEFAULT_CACHE_PREFIX.to_string()
}

fn default_expiration_buffer() -> u64 {
    DEFAULT_EXPIRATION_BUFFER_SECS
}

/// Service name reported by errors in the global options.
const SETTINGS: &str = "settings";

fn document_error(e: serde_json::Error) -> ConfigurationError {
    ConfigurationError::InvalidFormat {
        service: SETTINGS.to_string(),
        field: "document".to_string(),
        reason: e.to_string(),
    }
}

/// Client settings: raw service entries plus global options.
///
/// Service entries stay untyped until [`OAuth2Settings::resolve`] validates
/// them, so a malformed entry only fails the client built for that service.
#[derive(Clone, Debug, Deserialize)]
pub struct OAuth2Settings {
    /// Service entries keyed by service name.
    #[serde(default)]
    pub services: Map<String, Value>,
    /// Prefix for cache keys.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,
    /// Grace period before expiry, in seconds.
    #[serde(default = "default_expiration_buffer", rename = "expiration_buffer")]
    pub expiration_buffer_secs: u64,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Default for OAuth2Settings {
    fn default() -> Self {
        Self {
            services: Map::new(),
            cache_prefix: default_cache_prefix(),
            expiration_buffer_secs: DEFAULT_EXPIRATION_BUFFER_SECS,
            logging: LoggingSettings::default(),
        }
    }
}

impl OAuth2Settings {
    /// Parse settings from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        let settings: Self = serde_json::from_str(json).map_err(document_error)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Build settings from an already parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, ConfigurationError> {
        let settings: Self = serde_json::from_value(value).map_err(document_error)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check the global options.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.expiration_buffer_secs > MAX_EXPIRATION_BUFFER_SECS {
            return Err(ConfigurationError::InvalidFormat {
                service: SETTINGS.to_string(),
                field: "expiration_buffer".to_string(),
                reason: format!(
                    "must be at most {} seconds, got {}",
                    MAX_EXPIRATION_BUFFER_SECS, self.expiration_buffer_secs
                ),
            });
        }
        Ok(())
    }

    /// Grace period before expiry.
    pub fn expiration_buffer(&self) -> Duration {
        Duration::from_secs(self.expiration_buffer_secs)
    }

    /// Validate and return the configuration of a service.
    pub fn resolve(&self, service_name: &str) -> Result<ServiceConfig, ConfigurationError> {
        self.validate()?;
        ServiceConfigResolver::new(&self.services).resolve(service_name)
    }
}
