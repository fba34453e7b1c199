//! OAuth2 Types
//!
//! Configuration, token and request type definitions.

pub mod config;
pub mod request;
pub mod token;

pub use config::*;
pub use request::*;
pub use token::*;
