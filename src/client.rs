//! OAuth2 Client
//!
//! Authenticated request dispatcher for one service. Every call carries the
//! current bearer token; a first 401 forces a token refresh and one retry.

use serde_json::Value;
use std::sync::Arc;
use url::Url;

use crate::core::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestHttpTransport};
use crate::error::{describe_error_body, ErrorContext, OAuth2Error, OAuth2Result};
use crate::telemetry::{create_logger, Logger, OAuth2LogContext, TracingLogger};
use crate::token::{CacheStore, DefaultTokenManager, InMemoryCacheStore, TokenManager};
use crate::types::{OAuth2Settings, RequestContext, RequestOptions};

/// OAuth2 client for calling a protected API on behalf of one service.
pub struct OAuth2Client<
    T: HttpTransport = ReqwestHttpTransport,
    M: TokenManager = DefaultTokenManager<ReqwestHttpTransport, InMemoryCacheStore>,
> {
    transport: Arc<T>,
    token_manager: Arc<M>,
    logger: Arc<dyn Logger>,
}

impl<T: HttpTransport, C: CacheStore> OAuth2Client<T, DefaultTokenManager<T, C>> {
    /// Create a client for a configured service.
    ///
    /// The transport is shared by token fetches and API calls. Fails before
    /// any network call when the service configuration is invalid.
    pub fn for_service(
        service_name: &str,
        settings: &OAuth2Settings,
        transport: Arc<T>,
        cache: Arc<C>,
    ) -> OAuth2Result<Self> {
        let token_manager =
            DefaultTokenManager::new(service_name, settings, transport.clone(), cache)?;
        Ok(Self::with_token_manager(transport, Arc::new(token_manager))
            .with_logger(create_logger(&settings.logging)))
    }
}

impl<T: HttpTransport, M: TokenManager> OAuth2Client<T, M> {
    /// Create a client from an existing token manager.
    pub fn with_token_manager(transport: Arc<T>, token_manager: Arc<M>) -> Self {
        Self {
            transport,
            token_manager,
            logger: Arc::new(TracingLogger::default()),
        }
    }

    /// Replace the logger.
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Name of the service this client authenticates as.
    pub fn service_name(&self) -> &str {
        self.token_manager.service_name()
    }

    /// Get the token manager.
    pub fn token_manager(&self) -> &M {
        &self.token_manager
    }

    /// Send an authenticated request.
    ///
    /// 2xx responses are returned unmodified. A first 401 triggers a forced
    /// token refresh and a single retry; every other failure is raised as
    /// [`OAuth2Error::Request`].
    pub async fn request(
        &self,
        method: HttpMethod,
        url: &str,
        options: RequestOptions,
    ) -> OAuth2Result<HttpResponse> {
        let mut ctx = RequestContext::new(method, url, options);
        self.validate_url(&ctx)?;

        let mut token = self.token_manager.ensure_valid_token().await?;
        loop {
            let response = self.send(&ctx, &token).await?;
            if response.is_success() {
                return Ok(response);
            }

            if response.status == 401 && !ctx.retried {
                self.logger.warn(
                    "Request unauthorized, refreshing token and retrying",
                    &self.log_context(&ctx),
                );
                ctx.retried = true;
                token = self.token_manager.force_refresh().await?;
                continue;
            }

            return Err(self.request_failed(&ctx, &response));
        }
    }

    /// Send an authenticated GET request.
    pub async fn get(&self, url: &str, options: RequestOptions) -> OAuth2Result<HttpResponse> {
        self.request(HttpMethod::Get, url, options).await
    }

    /// Send an authenticated POST request.
    pub async fn post(&self, url: &str, options: RequestOptions) -> OAuth2Result<HttpResponse> {
        self.request(HttpMethod::Post, url, options).await
    }

    /// Send an authenticated PUT request.
    pub async fn put(&self, url: &str, options: RequestOptions) -> OAuth2Result<HttpResponse> {
        self.request(HttpMethod::Put, url, options).await
    }

    /// Send an authenticated PATCH request.
    pub async fn patch(&self, url: &str, options: RequestOptions) -> OAuth2Result<HttpResponse> {
        self.request(HttpMethod::Patch, url, options).await
    }

    /// Send an authenticated DELETE request.
    pub async fn delete(&self, url: &str, options: RequestOptions) -> OAuth2Result<HttpResponse> {
        self.request(HttpMethod::Delete, url, options).await
    }

    /// POST `payload` as JSON. The payload replaces any `json` in `options`.
    pub async fn post_json(
        &self,
        url: &str,
        payload: Value,
        options: RequestOptions,
    ) -> OAuth2Result<HttpResponse> {
        self.post(url, options.json(payload)).await
    }

    /// PUT `payload` as JSON. The payload replaces any `json` in `options`.
    pub async fn put_json(
        &self,
        url: &str,
        payload: Value,
        options: RequestOptions,
    ) -> OAuth2Result<HttpResponse> {
        self.put(url, options.json(payload)).await
    }

    /// PATCH `payload` as JSON. The payload replaces any `json` in `options`.
    pub async fn patch_json(
        &self,
        url: &str,
        payload: Value,
        options: RequestOptions,
    ) -> OAuth2Result<HttpResponse> {
        self.patch(url, options.json(payload)).await
    }

    fn log_context(&self, ctx: &RequestContext) -> OAuth2LogContext {
        OAuth2LogContext::new()
            .service(self.service_name())
            .operation("request")
            .field("method", ctx.method.as_str())
            .field("url", ctx.url.as_str())
            .field("retried", ctx.retried)
    }

    fn error_context(&self, ctx: &RequestContext) -> ErrorContext {
        ErrorContext::for_service(self.service_name())
            .with("method", ctx.method.as_str())
            .with("url", ctx.url.as_str())
            .with("retried", ctx.retried)
            .with("options", ctx.options.sanitized())
    }

    fn validate_url(&self, ctx: &RequestContext) -> OAuth2Result<()> {
        let reason = match Url::parse(&ctx.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => return Ok(()),
            Ok(url) => format!("unsupported scheme {}", url.scheme()),
            Err(e) => e.to_string(),
        };

        Err(OAuth2Error::Request {
            message: format!(
                "Invalid request URL for service {}: {} ({})",
                self.service_name(),
                ctx.url,
                reason
            ),
            status: None,
            context: self.error_context(ctx).with("reason", reason),
            source: None,
        })
    }

    fn build_request(&self, ctx: &RequestContext, token: &str) -> HttpRequest {
        let mut headers = ctx.options.headers.clone();
        headers.retain(|name, _| {
            !name.eq_ignore_ascii_case("authorization") && !name.eq_ignore_ascii_case("accept")
        });
        headers.insert("authorization".to_string(), format!("Bearer {}", token));
        headers.insert("accept".to_string(), "application/json".to_string());

        HttpRequest {
            method: ctx.method,
            url: ctx.url.clone(),
            headers,
            query: ctx.options.query.clone(),
            body: ctx.options.body(),
            timeout: ctx.options.timeout,
            verify_tls: self.token_manager.service_config().verify_tls,
        }
    }

    async fn send(&self, ctx: &RequestContext, token: &str) -> OAuth2Result<HttpResponse> {
        self.logger
            .debug("Sending authenticated request", &self.log_context(ctx));

        self.transport
            .send(self.build_request(ctx, token))
            .await
            .map_err(|e| {
                self.logger.error(
                    "Request transport failure",
                    &self.log_context(ctx).field("reason", e.to_string()),
                );
                OAuth2Error::Request {
                    message: format!(
                        "{} request to {} failed for service {}: {}",
                        ctx.method,
                        ctx.url,
                        self.service_name(),
                        e
                    ),
                    status: None,
                    context: self.error_context(ctx).with("reason", e.to_string()),
                    source: Some(e),
                }
            })
    }

    fn request_failed(&self, ctx: &RequestContext, response: &HttpResponse) -> OAuth2Error {
        self.logger.error(
            "Request failed",
            &self.log_context(ctx).field("status", response.status),
        );

        OAuth2Error::Request {
            message: format!(
                "{} request to {} failed for service {} with status {}: {}",
                ctx.method,
                ctx.url,
                self.service_name(),
                response.status,
                describe_error_body(&response.body)
            ),
            status: Some(response.status),
            context: self
                .error_context(ctx)
                .with("status", response.status)
                .with_response(&response.body),
            source: None,
        }
    }
}

/// Create a client for `service_name` with the default reqwest transport and
/// a private in-memory token cache.
pub fn oauth2_client(service_name: &str, settings: &OAuth2Settings) -> OAuth2Result<OAuth2Client> {
    let transport = ReqwestHttpTransport::new().map_err(|e| OAuth2Error::Request {
        message: format!(
            "Failed to create HTTP transport for service {}: {}",
            service_name, e
        ),
        status: None,
        context: ErrorContext::for_service(service_name),
        source: Some(e),
    })?;

    OAuth2Client::for_service(
        service_name,
        settings,
        Arc::new(transport),
        Arc::new(InMemoryCacheStore::new()),
    )
}
