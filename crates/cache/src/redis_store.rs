//! Redis store: a cache shared across processes and restarts.
//!
//! Built only with the `redis` feature:
//!
//! ```toml
//! caduceus-cache = { workspace = true, features = ["redis"] }
//! ```
//!
//! Entries are written with `SET key value EX ttl`, so Redis owns expiry.

use async_trait::async_trait;
use caduceus_core::{CacheError, KvStore};
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use std::time::Duration;
use tracing::info;

/// Connecting and the startup PING must finish within this long.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    /// Connect to `url` and PING once. Any failure is `Unavailable`.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)
            .map_err(|e| CacheError::Unavailable(format!("invalid redis url: {e}")))?;

        let conn = tokio::time::timeout(CONNECT_TIMEOUT, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| CacheError::Unavailable("redis connect timed out".into()))?
            .map_err(unavailable)?;

        let store = Self { conn };
        tokio::time::timeout(CONNECT_TIMEOUT, store.ping())
            .await
            .map_err(|_| CacheError::Unavailable("redis PING timed out".into()))??;

        info!("Connected to Redis for the result cache");
        Ok(store)
    }

    pub async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let reply: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        if reply.eq_ignore_ascii_case("PONG") {
            Ok(())
        } else {
            Err(CacheError::Backend(format!("unexpected PING reply '{reply}'")))
        }
    }
}

fn unavailable(e: redis::RedisError) -> CacheError {
    CacheError::Unavailable(e.to_string())
}

fn backend(e: redis::RedisError) -> CacheError {
    if e.is_io_error() || e.is_connection_dropped() || e.is_timeout() {
        unavailable(e)
    } else {
        CacheError::Backend(e.to_string())
    }
}

#[async_trait]
impl KvStore for RedisStore {
    fn name(&self) -> &str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await.map_err(backend)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let seconds = ttl.as_secs().max(1);
        let _: () = conn.set_ex(key, value, seconds).await.map_err(backend)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn malformed_url_is_unavailable() {
        let result = RedisStore::connect("not a redis url").await;
        assert!(matches!(result, Err(CacheError::Unavailable(_))));
    }

    #[tokio::test]
    async fn refused_connection_is_unavailable() {
        let result = RedisStore::connect("redis://127.0.0.1:1/").await;
        assert!(matches!(result, Err(CacheError::Unavailable(_))));
    }
}
