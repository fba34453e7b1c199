//! Builders
//!
//! Fluent builder for client settings.

pub mod config;

pub use config::{oauth2_settings, OAuth2SettingsBuilder};
