//! No-op store: disables caching entirely.

use async_trait::async_trait;
use caduceus_core::{CacheError, KvStore};
use std::time::Duration;

/// A store that keeps nothing. Every read misses, every write succeeds.
pub struct NoopStore;

#[async_trait]
impl KvStore for NoopStore {
    fn name(&self) -> &str {
        "none"
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }
}
