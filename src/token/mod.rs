//! Token Management
//!
//! Shared token cache and the per-service token manager.

pub mod cache;
pub mod manager;

pub use cache::{create_in_memory_cache, CacheStore, InMemoryCacheStore};
#[cfg(test)]
pub use cache::MockCacheStore;

pub use manager::{DefaultTokenManager, MockTokenManager, TokenManager, TokenManagerConfig};
