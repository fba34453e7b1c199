//! Error Responses
//!
//! Conversion of an [`OAuth2Error`] into an HTTP error payload for services
//! that surface client failures to their own callers.

use serde_json::{json, Value};
use std::collections::HashMap;

use super::OAuth2Error;

/// Rendered error response.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    /// HTTP status to answer with.
    pub status: u16,
    /// JSON body.
    pub body: Value,
}

/// Render an error as `{message, code, context, response_data?}`.
///
/// With `debug` set, `exception` (the error kind) and `trace` (the source
/// chain) are added. The status falls back to 500 when the carried code is
/// not a valid HTTP status.
pub fn render_error(error: &OAuth2Error, debug: bool) -> ErrorResponse {
    let code = error.status_code();
    let status = if (100..=599).contains(&code) { code } else { 500 };

    let mut body = json!({
        "message": error.to_string(),
        "code": code,
        "context": error.context(),
    });

    if let Some(response_data) = error.response_data() {
        body["response_data"] = response_data;
    }

    if debug {
        body["exception"] = json!(error.kind_name());
        body["trace"] = json!(source_chain(error));
    }

    ErrorResponse { status, body }
}

fn source_chain(error: &OAuth2Error) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = std::error::Error::source(error);
    while let Some(source) = current {
        chain.push(source.to_string());
        current = source.source();
    }
    chain
}

/// Check whether the incoming request asked for debug output.
///
/// Debug is on for an `X-Debug: 1` header (any case) or a `debug=1` query
/// parameter.
pub fn debug_requested(headers: &HashMap<String, String>, query: Option<&str>) -> bool {
    let header_flag = headers
        .iter()
        .any(|(name, value)| name.eq_ignore_ascii_case("x-debug") && value.trim() == "1");

    let query_flag = query
        .map(|q| {
            url::form_urlencoded::parse(q.trim_start_matches('?').as_bytes())
                .any(|(key, value)| key == "debug" && value == "1")
        })
        .unwrap_or(false);

    header_flag || query_flag
}
