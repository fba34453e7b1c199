//! Token Types
//!
//! Token endpoint response and the cached token state.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;

/// Token response from the authorization server.
///
/// `access_token` and `expires_in` are required; a body without them does
/// not deserialize.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
    /// Access token.
    pub access_token: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
    /// Token type (usually "Bearer").
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
    /// Additional fields.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Token held for one service.
///
/// The default state is empty and expired at the unix epoch.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TokenState {
    /// Access token, empty when none is held.
    pub access_token: String,
    /// Expiration time.
    pub expires_at: DateTime<Utc>,
}

impl TokenState {
    /// Create state from a token response received at `now`.
    ///
    /// Returns `None` when `expires_in` puts the expiry past the range of
    /// representable timestamps.
    pub fn from_response(response: &TokenResponse, now: DateTime<Utc>) -> Option<Self> {
        let expires_at = offset(now, response.expires_in)?;
        Some(Self {
            access_token: response.access_token.clone(),
            expires_at,
        })
    }

    /// A token is valid when present and not expiring within `buffer`.
    ///
    /// A buffer too large to add to `now` leaves no token valid.
    pub fn is_valid_at(&self, now: DateTime<Utc>, buffer: std::time::Duration) -> bool {
        !self.access_token.is_empty()
            && offset(now, buffer.as_secs()).is_some_and(|threshold| self.expires_at > threshold)
    }

    /// Remaining lifetime at `now`, zero once expired.
    pub fn remaining_lifetime(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.expires_at - now).to_std().unwrap_or_default()
    }
}

fn offset(now: DateTime<Utc>, secs: u64) -> Option<DateTime<Utc>> {
    let delta = Duration::try_seconds(i64::try_from(secs).ok()?)?;
    now.checked_add_signed(delta)
}

impl std::fmt::Debug for TokenState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenState")
            .field(
                "access_token",
                &if self.access_token.is_empty() { "" } else { "[REDACTED]" },
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
