//! Settings Builder
//!
//! Fluent builder for client settings.

use secrecy::ExposeSecret;
use serde_json::{json, Map, Value};
use std::time::Duration;

use crate::error::{ConfigurationError, OAuth2Error};
use crate::telemetry::LogLevel;
use crate::types::{
    LoggingSettings, OAuth2Settings, ServiceConfig, DEFAULT_CACHE_PREFIX,
    DEFAULT_EXPIRATION_BUFFER_SECS,
};

/// OAuth2 settings builder.
pub struct OAuth2SettingsBuilder {
    services: Map<String, Value>,
    typed_services: Vec<String>,
    cache_prefix: String,
    expiration_buffer: Duration,
    logging: LoggingSettings,
}

impl Default for OAuth2SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OAuth2SettingsBuilder {
    /// Create new settings builder.
    pub fn new() -> Self {
        Self {
            services: Map::new(),
            typed_services: Vec::new(),
            cache_prefix: DEFAULT_CACHE_PREFIX.to_string(),
            expiration_buffer: Duration::from_secs(DEFAULT_EXPIRATION_BUFFER_SECS),
            logging: LoggingSettings::default(),
        }
    }

    /// Add or replace a service.
    pub fn service(mut self, name: impl Into<String>, config: ServiceConfig) -> Self {
        let entry = json!({
            "token_url": config.token_url,
            "client_id": config.client_id,
            "client_secret": config.client_secret.expose_secret(),
            "scope": config.scope,
            "verify": config.verify_tls,
        });
        let name = name.into();
        self.services.insert(name.clone(), entry);
        self.typed_services.push(name);
        self
    }

    /// Add a raw service entry, validated only when a client is built for it.
    pub fn raw_service(mut self, name: impl Into<String>, entry: Value) -> Self {
        let name = name.into();
        self.typed_services.retain(|typed| *typed != name);
        self.services.insert(name, entry);
        self
    }

    /// Set cache key prefix.
    pub fn cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_prefix = prefix.into();
        self
    }

    /// Set expiration buffer.
    pub fn expiration_buffer(mut self, buffer: Duration) -> Self {
        self.expiration_buffer = buffer;
        self
    }

    /// Set logging settings.
    pub fn logging(mut self, logging: LoggingSettings) -> Self {
        self.logging = logging;
        self
    }

    /// Set minimum log level.
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.logging.level = level;
        self
    }

    /// Disable logging.
    pub fn disable_logging(mut self) -> Self {
        self.logging.enabled = false;
        self
    }

    /// Build the settings.
    ///
    /// Every typed service is validated; raw entries are left for resolution
    /// time.
    pub fn build(self) -> Result<OAuth2Settings, OAuth2Error> {
        let settings = OAuth2Settings {
            services: self.services,
            cache_prefix: self.cache_prefix,
            expiration_buffer_secs: self.expiration_buffer.as_secs(),
            logging: self.logging,
        };

        if settings.cache_prefix.chars().any(char::is_whitespace) {
            return Err(OAuth2Error::Configuration(ConfigurationError::InvalidFormat {
                service: "settings".to_string(),
                field: "cache_prefix".to_string(),
                reason: "must not contain whitespace".to_string(),
            }));
        }
        settings.validate()?;

        for name in &self.typed_services {
            settings.resolve(name)?;
        }

        Ok(settings)
    }
}

/// Create a new OAuth2 settings builder.
pub fn oauth2_settings() -> OAuth2SettingsBuilder {
    OAuth2SettingsBuilder::new()
}
