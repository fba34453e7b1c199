//! Service Configuration Resolver
//!
//! Validates raw service entries into [`ServiceConfig`] values.

use serde_json::{Map, Value};
use url::Url;

use crate::error::ConfigurationError;
use crate::types::ServiceConfig;

/// Resolves service entries by name.
pub struct ServiceConfigResolver<'a> {
    services: &'a Map<String, Value>,
}

impl<'a> ServiceConfigResolver<'a> {
    pub fn new(services: &'a Map<String, Value>) -> Self {
        Self { services }
    }

    /// Validate and return the configuration of `service_name`.
    ///
    /// Absent, `null` or empty entries are `NotFound`, non-mapping entries
    /// are `InvalidType`, and bad fields are `InvalidFormat`.
    pub fn resolve(&self, service_name: &str) -> Result<ServiceConfig, ConfigurationError> {
        let entry = match self.services.get(service_name) {
            Some(entry) if !is_empty(entry) => entry,
            _ => {
                return Err(ConfigurationError::NotFound {
                    service: service_name.to_string(),
                })
            }
        };

        let fields = entry
            .as_object()
            .ok_or_else(|| ConfigurationError::InvalidType {
                service: service_name.to_string(),
                found: json_type_name(entry).to_string(),
            })?;

        let field = FieldReader {
            service: service_name,
            fields,
        };

        let token_url = field.required_string("token_url")?;
        let parsed = Url::parse(&token_url)
            .map_err(|e| field.invalid("token_url", format!("not a valid URL ({})", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(field.invalid("token_url", "scheme must be http or https"));
        }

        let client_id = field.required_string("client_id")?;
        let client_secret = field.required_string("client_secret")?;
        let scope = field.optional_string("scope")?.unwrap_or_default();
        let verify_tls = field.optional_bool("verify")?.unwrap_or(true);

        Ok(ServiceConfig::new(token_url, client_id, client_secret)
            .with_scope(scope)
            .with_verify_tls(verify_tls))
    }
}

struct FieldReader<'a> {
    service: &'a str,
    fields: &'a Map<String, Value>,
}

impl FieldReader<'_> {
    fn invalid(&self, field: &str, reason: impl Into<String>) -> ConfigurationError {
        ConfigurationError::InvalidFormat {
            service: self.service.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    fn present(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|value| !value.is_null())
    }

    fn required_string(&self, name: &str) -> Result<String, ConfigurationError> {
        match self.present(name) {
            None => Err(self.invalid(name, "missing")),
            Some(Value::String(s)) if s.trim().is_empty() => Err(self.invalid(name, "empty")),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(self.invalid(
                name,
                format!("expected string, found {}", json_type_name(other)),
            )),
        }
    }

    fn optional_string(&self, name: &str) -> Result<Option<String>, ConfigurationError> {
        match self.present(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.invalid(
                name,
                format!("expected string, found {}", json_type_name(other)),
            )),
        }
    }

    fn optional_bool(&self, name: &str) -> Result<Option<bool>, ConfigurationError> {
        match self.present(name) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(self.invalid(
                name,
                format!("expected boolean, found {}", json_type_name(other)),
            )),
        }
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
