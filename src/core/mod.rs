//! OAuth2 Core Components
//!
//! HTTP transport and service configuration resolution.

pub mod resolver;
pub mod transport;

pub use resolver::*;
pub use transport::*;
