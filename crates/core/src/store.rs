//! KvStore trait: the key/value collaborator behind the cache.
//!
//! Stores hold opaque serialized strings with a time-to-live. They may be
//! slow, remote or absent; every method returns a [`CacheError`] instead of
//! panicking so the cache layer can fail open.

use std::time::Duration;

use async_trait::async_trait;
use crate::error::CacheError;

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Backend name (e.g., "memory", "file", "none").
    fn name(&self) -> &str;

    /// Fetch a live value. Expired entries read as `None`.
    async fn get(&self, key: &str) -> std::result::Result<Option<String>, CacheError>;

    /// Store `value` under `key` for `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration)
        -> std::result::Result<(), CacheError>;
}
