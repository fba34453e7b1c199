//! Request Types
//!
//! Caller-supplied request options and the per-call request context.

use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;

use crate::core::{HttpMethod, MultipartField, RequestBody};
use crate::error::REDACTED;

/// Options for an authenticated request.
///
/// At most one body is sent; when several are set the precedence is
/// `json`, then `form_params`, then `multipart`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestOptions {
    /// Extra request headers.
    pub headers: HashMap<String, String>,
    /// Query parameters.
    pub query: Vec<(String, String)>,
    /// JSON body.
    pub json: Option<Value>,
    /// Form-encoded body.
    pub form_params: Option<Vec<(String, String)>>,
    /// Multipart body.
    pub multipart: Option<Vec<MultipartField>>,
    /// Per-request timeout.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Add a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set JSON body.
    pub fn json(mut self, payload: Value) -> Self {
        self.json = Some(payload);
        self
    }

    /// Set form body.
    pub fn form_params(mut self, params: Vec<(String, String)>) -> Self {
        self.form_params = Some(params);
        self
    }

    /// Set multipart body.
    pub fn multipart(mut self, fields: Vec<MultipartField>) -> Self {
        self.multipart = Some(fields);
        self
    }

    /// Set request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Body to send, following the documented precedence.
    pub fn body(&self) -> Option<RequestBody> {
        if let Some(payload) = &self.json {
            return Some(RequestBody::Json(payload.clone()));
        }
        if let Some(params) = &self.form_params {
            return Some(RequestBody::Form(params.clone()));
        }
        self.multipart
            .as_ref()
            .map(|fields| RequestBody::Multipart(fields.clone()))
    }

    /// Options as JSON with body payloads replaced by a placeholder.
    ///
    /// `json`, `form_params` and `multipart` are redacted; headers, query and
    /// timeout pass through.
    pub fn sanitized(&self) -> Value {
        let mut map = Map::new();

        if !self.headers.is_empty() {
            map.insert("headers".to_string(), json!(self.headers));
        }
        if !self.query.is_empty() {
            map.insert("query".to_string(), json!(self.query));
        }
        if self.json.is_some() {
            map.insert("json".to_string(), json!(REDACTED));
        }
        if self.form_params.is_some() {
            map.insert("form_params".to_string(), json!(REDACTED));
        }
        if self.multipart.is_some() {
            map.insert("multipart".to_string(), json!(REDACTED));
        }
        if let Some(timeout) = self.timeout {
            map.insert("timeout".to_string(), json!(timeout.as_secs_f64()));
        }

        Value::Object(map)
    }
}

/// State of one caller-initiated request.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub method: HttpMethod,
    pub url: String,
    pub options: RequestOptions,
    /// Already re-sent after a 401.
    pub retried: bool,
}

impl RequestContext {
    pub fn new(method: HttpMethod, url: impl Into<String>, options: RequestOptions) -> Self {
        Self {
            method,
            url: url.into(),
            options,
            retried: false,
        }
    }
}
