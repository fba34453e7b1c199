//! Token Manager
//!
//! Acquires client-credentials tokens for one service and keeps them in the
//! shared cache.
//!
//! The cache is the source of truth: every lookup re-reads it before judging
//! validity, so a token refreshed by any client sharing the cache is picked up
//! by all of them. Within one manager, refreshes are single-flight. Across
//! processes, concurrent refreshes are last-write-wins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use secrecy::ExposeSecret;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::core::{HttpMethod, HttpRequest, HttpTransport, RequestBody};
use crate::error::{describe_error_body, ErrorContext, OAuth2Error};
use crate::telemetry::{create_logger, Logger, OAuth2LogContext, TracingLogger};
use crate::token::CacheStore;
use crate::types::{
    OAuth2Settings, ServiceConfig, TokenResponse, TokenState, DEFAULT_CACHE_PREFIX,
    DEFAULT_EXPIRATION_BUFFER_SECS,
};

/// Token manager interface.
#[async_trait]
pub trait TokenManager: Send + Sync {
    /// Name of the service the manager acquires tokens for.
    fn service_name(&self) -> &str;

    /// Resolved service configuration.
    fn service_config(&self) -> &ServiceConfig;

    /// Current access token, fetching a new one when the cached token is
    /// missing or about to expire.
    async fn ensure_valid_token(&self) -> Result<String, OAuth2Error>;

    /// Fetch a new token regardless of the cached one.
    async fn force_refresh(&self) -> Result<String, OAuth2Error>;
}

/// Token manager configuration.
#[derive(Debug, Clone)]
pub struct TokenManagerConfig {
    /// Prefix for cache keys.
    pub cache_prefix: String,
    /// Tokens expiring within this window are treated as expired.
    pub expiration_buffer: Duration,
}

impl Default for TokenManagerConfig {
    fn default() -> Self {
        Self {
            cache_prefix: DEFAULT_CACHE_PREFIX.to_string(),
            expiration_buffer: Duration::from_secs(DEFAULT_EXPIRATION_BUFFER_SECS),
        }
    }
}

impl From<&OAuth2Settings> for TokenManagerConfig {
    fn from(settings: &OAuth2Settings) -> Self {
        Self {
            cache_prefix: settings.cache_prefix.clone(),
            expiration_buffer: settings.expiration_buffer(),
        }
    }
}

/// Default token manager implementation.
pub struct DefaultTokenManager<T: HttpTransport, C: CacheStore> {
    service_name: String,
    service_config: ServiceConfig,
    manager_config: TokenManagerConfig,
    transport: Arc<T>,
    cache: Arc<C>,
    logger: Arc<dyn Logger>,
    state: RwLock<TokenState>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl<T: HttpTransport, C: CacheStore> DefaultTokenManager<T, C> {
    /// Create a token manager for a configured service.
    ///
    /// Fails with a configuration error, before any network call, when the
    /// service entry is missing or malformed.
    pub fn new(
        service_name: &str,
        settings: &OAuth2Settings,
        transport: Arc<T>,
        cache: Arc<C>,
    ) -> Result<Self, OAuth2Error> {
        let service_config = settings.resolve(service_name)?;
        Ok(Self::with_config(
            service_name,
            service_config,
            TokenManagerConfig::from(settings),
            transport,
            cache,
        )
        .with_logger(create_logger(&settings.logging)))
    }

    /// Create a token manager from an already resolved configuration.
    pub fn with_config(
        service_name: &str,
        service_config: ServiceConfig,
        manager_config: TokenManagerConfig,
        transport: Arc<T>,
        cache: Arc<C>,
    ) -> Self {
        Self {
            service_name: service_name.to_string(),
            service_config,
            manager_config,
            transport,
            cache,
            logger: Arc::new(TracingLogger::default()),
            state: RwLock::new(TokenState::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Replace the logger.
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Cache key holding the access token.
    pub fn access_token_key(&self) -> String {
        format!(
            "{}{}_access_token",
            self.manager_config.cache_prefix, self.service_name
        )
    }

    /// Cache key holding the expiry as a unix timestamp.
    pub fn expires_at_key(&self) -> String {
        format!(
            "{}{}_expires_at",
            self.manager_config.cache_prefix, self.service_name
        )
    }

    /// Token state as last read from or written to the cache.
    pub fn current_state(&self) -> TokenState {
        self.state.read().clone()
    }

    /// Drop the cached token so the next lookup fetches a new one.
    pub async fn invalidate(&self) -> Result<(), OAuth2Error> {
        self.cache.forget(&self.access_token_key()).await?;
        self.cache.forget(&self.expires_at_key()).await?;
        *self.state.write() = TokenState::default();
        self.logger
            .info("Cached access token invalidated", &self.log_context("invalidate"));
        Ok(())
    }

    fn log_context(&self, operation: &str) -> OAuth2LogContext {
        OAuth2LogContext::new()
            .service(&self.service_name)
            .operation(operation)
    }

    fn is_valid(&self, state: &TokenState) -> bool {
        state.is_valid_at(Utc::now(), self.manager_config.expiration_buffer)
    }

    /// Reload token state from the cache into the local copy.
    async fn load_state(&self) -> Result<TokenState, OAuth2Error> {
        let access_token = self
            .cache
            .get(&self.access_token_key())
            .await?
            .unwrap_or_default();

        let expires_at = match self.cache.get(&self.expires_at_key()).await? {
            Some(raw) => self.parse_expiry(&raw)?,
            None => DateTime::<Utc>::default(),
        };

        let state = TokenState {
            access_token,
            expires_at,
        };
        *self.state.write() = state.clone();
        Ok(state)
    }

    fn parse_expiry(&self, raw: &str) -> Result<DateTime<Utc>, OAuth2Error> {
        raw.trim()
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or_else(|| {
                let context = ErrorContext::for_service(&self.service_name)
                    .with("key", self.expires_at_key())
                    .with("value", raw);
                self.logger.error(
                    "Cached token expiry is not a unix timestamp",
                    &self.log_context("load_token").field("value", raw),
                );
                OAuth2Error::CacheCorruption {
                    message: format!(
                        "Corrupted token expiry in cache for service {}: {:?} is not a unix timestamp",
                        self.service_name, raw
                    ),
                    context,
                }
            })
    }

    fn build_token_request(&self) -> HttpRequest {
        let config = &self.service_config;
        let mut params = vec![
            ("grant_type".to_string(), "client_credentials".to_string()),
            ("client_id".to_string(), config.client_id.clone()),
            (
                "client_secret".to_string(),
                config.client_secret.expose_secret().to_string(),
            ),
        ];
        if !config.scope.is_empty() {
            params.push(("scope".to_string(), config.scope.clone()));
        }

        let mut request = HttpRequest::new(HttpMethod::Post, config.token_url.clone());
        request
            .headers
            .insert("accept".to_string(), "application/json".to_string());
        request.body = Some(RequestBody::Form(params));
        request.verify_tls = config.verify_tls;
        request
    }

    fn token_context(&self) -> ErrorContext {
        ErrorContext::for_service(&self.service_name)
            .with("token_url", self.service_config.token_url.as_str())
    }

    async fn fetch_new_token(&self) -> Result<String, OAuth2Error> {
        self.logger.info(
            "Requesting access token",
            &self
                .log_context("fetch_token")
                .field("token_url", self.service_config.token_url.as_str())
                .field("scope", self.service_config.scope.as_str())
                .field("verify_tls", self.service_config.verify_tls),
        );

        let response = match self.transport.send(self.build_token_request()).await {
            Ok(response) => response,
            Err(e) => {
                self.logger.error(
                    "Token endpoint unreachable",
                    &self.log_context("fetch_token").field("reason", e.to_string()),
                );
                return Err(OAuth2Error::TokenFetch {
                    message: format!(
                        "Failed to fetch access token for service {}: {}",
                        self.service_name, e
                    ),
                    status: None,
                    context: self.token_context().with("reason", e.to_string()),
                    source: Some(e),
                });
            }
        };

        if !response.is_success() {
            self.logger.error(
                "Token endpoint returned an error",
                &self
                    .log_context("fetch_token")
                    .field("status", response.status),
            );
            return Err(OAuth2Error::TokenFetch {
                message: format!(
                    "Failed to fetch access token for service {} with status {}: {}",
                    self.service_name,
                    response.status,
                    describe_error_body(&response.body)
                ),
                status: Some(response.status),
                context: self
                    .token_context()
                    .with("status", response.status)
                    .with_response(&response.body),
                source: None,
            });
        }

        let invalid = |reason: String| {
            self.logger.error(
                "Token endpoint returned an invalid token response",
                &self.log_context("fetch_token").field("reason", reason.as_str()),
            );
            OAuth2Error::InvalidTokenResponse {
                message: format!(
                    "Invalid token response for service {}: {}",
                    self.service_name, reason
                ),
                context: self
                    .token_context()
                    .with("status", response.status)
                    .with("reason", reason.as_str())
                    .with_response(&response.body),
            }
        };

        let token_response: TokenResponse =
            response.json().map_err(|e| invalid(e.to_string()))?;
        if token_response.access_token.is_empty() {
            return Err(invalid("access_token is empty".to_string()));
        }

        let now = Utc::now();
        let state = TokenState::from_response(&token_response, now).ok_or_else(|| {
            invalid(format!(
                "expires_in {} is out of range",
                token_response.expires_in
            ))
        })?;
        let state = self.store_token(state, now).await?;

        self.logger.info(
            "Access token stored",
            &self
                .log_context("fetch_token")
                .field("expires_in", token_response.expires_in)
                .field("expires_at", state.expires_at.to_rfc3339()),
        );

        Ok(state.access_token)
    }

    /// Write a fresh token to the cache and the local copy.
    ///
    /// Both cache entries live exactly as long as the token received at `now`.
    async fn store_token(
        &self,
        state: TokenState,
        now: DateTime<Utc>,
    ) -> Result<TokenState, OAuth2Error> {
        let ttl = state.remaining_lifetime(now);

        self.cache
            .put(&self.access_token_key(), &state.access_token, ttl)
            .await?;
        self.cache
            .put(
                &self.expires_at_key(),
                &state.expires_at.timestamp().to_string(),
                ttl,
            )
            .await?;

        *self.state.write() = state.clone();
        Ok(state)
    }
}

#[async_trait]
impl<T: HttpTransport, C: CacheStore> TokenManager for DefaultTokenManager<T, C> {
    fn service_name(&self) -> &str {
        &self.service_name
    }

    fn service_config(&self) -> &ServiceConfig {
        &self.service_config
    }

    async fn ensure_valid_token(&self) -> Result<String, OAuth2Error> {
        let state = self.load_state().await?;
        if self.is_valid(&state) {
            self.logger
                .debug("Using cached access token", &self.log_context("ensure_token"));
            return Ok(state.access_token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited for the lock.
        let state = self.load_state().await?;
        if self.is_valid(&state) {
            return Ok(state.access_token);
        }

        self.fetch_new_token().await
    }

    async fn force_refresh(&self) -> Result<String, OAuth2Error> {
        let _guard = self.refresh_lock.lock().await;
        self.logger
            .info("Forcing access token refresh", &self.log_context("force_refresh"));
        self.fetch_new_token().await
    }
}

/// Mock token manager for testing.
///
/// Hands out queued tokens; `ensure_valid_token` keeps returning the current
/// one while `force_refresh` advances to the next.
pub struct MockTokenManager {
    service_name: String,
    service_config: ServiceConfig,
    tokens: Mutex<VecDeque<String>>,
    current: Mutex<Option<String>>,
    ensure_calls: Mutex<u32>,
    refresh_calls: Mutex<u32>,
    next_error: Mutex<Option<OAuth2Error>>,
}

impl MockTokenManager {
    /// Create new mock token manager.
    pub fn new(service_name: &str, service_config: ServiceConfig) -> Self {
        Self {
            service_name: service_name.to_string(),
            service_config,
            tokens: Mutex::new(VecDeque::new()),
            current: Mutex::new(None),
            ensure_calls: Mutex::new(0),
            refresh_calls: Mutex::new(0),
            next_error: Mutex::new(None),
        }
    }

    /// Queue a token.
    pub fn queue_token(&self, token: impl Into<String>) -> &Self {
        self.tokens.lock().push_back(token.into());
        self
    }

    /// Set next error.
    pub fn set_next_error(&self, error: OAuth2Error) -> &Self {
        *self.next_error.lock() = Some(error);
        self
    }

    /// Number of `ensure_valid_token` calls.
    pub fn ensure_calls(&self) -> u32 {
        *self.ensure_calls.lock()
    }

    /// Number of `force_refresh` calls.
    pub fn refresh_calls(&self) -> u32 {
        *self.refresh_calls.lock()
    }

    fn check_error(&self) -> Result<(), OAuth2Error> {
        if let Some(error) = self.next_error.lock().take() {
            return Err(error);
        }
        Ok(())
    }

    fn next_token(&self) -> String {
        let next = self
            .tokens
            .lock()
            .pop_front()
            .unwrap_or_else(|| format!("mock-token-for-{}", self.service_name));
        *self.current.lock() = Some(next.clone());
        next
    }
}

#[async_trait]
impl TokenManager for MockTokenManager {
    fn service_name(&self) -> &str {
        &self.service_name
    }

    fn service_config(&self) -> &ServiceConfig {
        &self.service_config
    }

    async fn ensure_valid_token(&self) -> Result<String, OAuth2Error> {
        *self.ensure_calls.lock() += 1;
        self.check_error()?;
        let current = self.current.lock().clone();
        Ok(current.unwrap_or_else(|| self.next_token()))
    }

    async fn force_refresh(&self) -> Result<String, OAuth2Error> {
        *self.refresh_calls.lock() += 1;
        self.check_error()?;
        Ok(self.next_token())
    }
}
