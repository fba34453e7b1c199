//! Token Cache
//!
//! Key-value cache contract used to share tokens between clients, and an
//! in-memory implementation with per-entry expiry.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::error::CacheError;

/// Expiration-aware key-value cache.
///
/// Expired entries read as absent. The contract offers no compare-and-swap.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read a value.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Write a value that expires after `ttl`.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Remove a value, reporting whether it existed.
    async fn forget(&self, key: &str) -> Result<bool, CacheError>;
}

struct CacheEntry {
    value: String,
    /// `None` when the TTL reaches past the clock's range.
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |expires_at| expires_at > now)
    }
}

/// In-memory cache store.
///
/// Shared between clients by wrapping it in an `Arc`.
#[derive(Default)]
pub struct InMemoryCacheStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
    put_history: Mutex<Vec<(String, String, Duration)>>,
}

impl InMemoryCacheStore {
    /// Create new in-memory cache store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `put` seen so far as `(key, value, ttl)`.
    pub fn get_put_history(&self) -> Vec<(String, String, Duration)> {
        self.put_history.lock().clone()
    }

    /// Drop expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        Ok(self
            .entries
            .lock()
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.put_history
            .lock()
            .push((key.to_string(), value.to_string(), ttl));
        self.entries.lock().insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at: Instant::now().checked_add(ttl),
            },
        );
        Ok(())
    }

    async fn forget(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.lock().remove(key).is_some())
    }
}

/// Create in-memory cache store.
pub fn create_in_memory_cache() -> InMemoryCacheStore {
    InMemoryCacheStore::new()
}
