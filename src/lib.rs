//! OAuth2 Service Client
//!
//! Calls OAuth2-protected APIs on behalf of configured services using the
//! Client Credentials grant (RFC 6749 Section 4.4).
//!
//! # Features
//!
//! - Per-service configuration resolved and validated up front
//! - Token acquisition with a shared, pluggable cache and expiration buffer
//! - Authenticated requests with a single token refresh on 401
//! - One error type with diagnostic context and a renderable error response
//!
//! # Example
//!
//! ```rust,ignore
//! use oauth2_service_client::{oauth2_client, oauth2_settings, RequestOptions, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = oauth2_settings()
//!         .service(
//!             "crm",
//!             ServiceConfig::new("https://auth.example.com/oauth/token", "client-id", "secret")
//!                 .with_scope("contacts:read"),
//!         )
//!         .build()?;
//!
//!     let client = oauth2_client("crm", &settings)?;
//!     let response = client
//!         .get("https://api.example.com/v1/contacts", RequestOptions::new())
//!         .await?;
//!
//!     println!("{}", response.body);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: settings, service configuration, token and request types
//! - `error`: error hierarchy, diagnostic context and error rendering
//! - `core`: HTTP transport and service configuration resolution
//! - `token`: token cache and token manager
//! - `telemetry`: structured logging
//! - `builders`: fluent settings builder
//! - `client`: authenticated request dispatcher

pub mod builders;
pub mod client;
pub mod core;
pub mod error;
pub mod telemetry;
pub mod token;
pub mod types;

// Re-export main client
pub use client::{oauth2_client, OAuth2Client};

// Re-export builders
pub use builders::{oauth2_settings, OAuth2SettingsBuilder};

// Re-export errors
pub use error::{
    clean_message, debug_requested, parse_error_response, render_error, CacheError,
    ConfigurationError, ErrorContext, ErrorResponse, OAuth2Error, OAuth2ErrorResponse,
    OAuth2Result, TransportError, REDACTED,
};

// Re-export types
pub use types::{
    LoggingSettings, OAuth2Settings, RequestContext, RequestOptions, ServiceConfig,
    TokenResponse, TokenState,
};

// Re-export core components
pub use core::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockHttpTransport, MultipartField,
    ReqwestHttpTransport, RequestBody, ServiceConfigResolver,
};

// Re-export token management
pub use token::{
    CacheStore, DefaultTokenManager, InMemoryCacheStore, MockTokenManager, TokenManager,
    TokenManagerConfig,
};

// Re-export telemetry
pub use telemetry::{
    create_in_memory_logger, create_logger, no_op_logger, InMemoryLogger, LogEntry, LogLevel,
    Logger, NoOpLogger, OAuth2LogContext, TracingLogger,
};
