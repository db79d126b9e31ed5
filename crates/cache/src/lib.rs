//! Fail-open result cache for Caduceus.
//!
//! [`Cache::lookup`] wraps any fallible fetch. Values are keyed by a logical
//! name plus a structural hash of the fetch arguments, stored as JSON in a
//! [`KvStore`] with a TTL, and sanitized before they are written. A store
//! that errors or disappears only costs latency: every failure is logged
//! and the fetch runs directly.

pub mod file;
pub mod memory;
pub mod noop;
#[cfg(feature = "redis")]
pub mod redis_store;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use noop::NoopStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use caduceus_config::{CacheBackend, CacheConfig};
use caduceus_core::{CacheError, FetchError, KvStore, SourceHit, sanitize_text};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

/// A value that can live in the cache.
pub trait Cacheable: Serialize + DeserializeOwned + Send {
    /// The "no result" sentinel of this type.
    fn is_empty(&self) -> bool;

    /// Bound and clean every string payload before storage.
    fn sanitize(&mut self, max_chars: usize);
}

impl Cacheable for SourceHit {
    fn is_empty(&self) -> bool {
        SourceHit::is_empty(self)
    }

    fn sanitize(&mut self, max_chars: usize) {
        SourceHit::sanitize(self, max_chars);
    }
}

impl Cacheable for String {
    fn is_empty(&self) -> bool {
        self.trim().is_empty()
    }

    fn sanitize(&mut self, max_chars: usize) {
        *self = sanitize_text(self, max_chars);
    }
}

impl<T: Cacheable> Cacheable for Vec<T> {
    fn is_empty(&self) -> bool {
        self.iter().all(Cacheable::is_empty)
    }

    fn sanitize(&mut self, max_chars: usize) {
        for item in self.iter_mut() {
            item.sanitize(max_chars);
        }
    }
}

/// TTL-bound cache in front of a [`KvStore`].
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn KvStore>,
    ttl: Duration,
    cache_empty_results: bool,
    max_value_chars: usize,
}

impl Cache {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        let defaults = CacheConfig::default();
        Self {
            store,
            ttl: defaults.ttl(),
            cache_empty_results: defaults.cache_empty_results,
            max_value_chars: defaults.max_value_chars,
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopStore))
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_empty_results(mut self, cache_empty_results: bool) -> Self {
        self.cache_empty_results = cache_empty_results;
        self
    }

    pub fn with_max_value_chars(mut self, max_value_chars: usize) -> Self {
        self.max_value_chars = max_value_chars;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.store.name()
    }

    /// Return the cached value for `(logical_key, args)` or run `fetch`.
    ///
    /// `Err` from `fetch` is returned unchanged and never stored.
    pub async fn lookup<A, T, F, Fut>(
        &self,
        logical_key: &str,
        args: &A,
        fetch: F,
    ) -> Result<T, FetchError>
    where
        A: Serialize + ?Sized,
        T: Cacheable,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let key = match cache_key(logical_key, args) {
            Ok(key) => key,
            Err(e) => {
                warn!(logical_key, error = %e, "Cache key unavailable, fetching directly");
                return fetch().await;
            }
        };

        match self.store.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    debug!(key = %key, "Cache hit");
                    return Ok(value);
                }
                Err(e) => warn!(key = %key, error = %e, "Discarding undecodable cache entry"),
            },
            Ok(None) => debug!(key = %key, "Cache miss"),
            Err(e) => warn!(
                key = %key,
                backend = self.store.name(),
                error = %e,
                "Cache read failed, fetching directly"
            ),
        }

        let mut value = fetch().await?;
        value.sanitize(self.max_value_chars);

        if value.is_empty() && !self.cache_empty_results {
            return Ok(value);
        }

        match serde_json::to_string(&value) {
            Ok(raw) => {
                if let Err(e) = self.store.set(&key, &raw, self.ttl).await {
                    warn!(
                        key = %key,
                        backend = self.store.name(),
                        error = %e,
                        "Cache write failed"
                    );
                }
            }
            Err(e) => warn!(key = %key, error = %e, "Cache value not serializable"),
        }

        Ok(value)
    }

    /// Write a sentinel entry and read it back.
    pub async fn round_trip(&self) -> Result<bool, CacheError> {
        let key = "cache:health";
        self.store.set(key, "\"ok\"", Duration::from_secs(60)).await?;
        Ok(self.store.get(key).await?.as_deref() == Some("\"ok\""))
    }
}

/// `cache:{logical_key}:{sha256 of the canonical JSON of args}`.
///
/// Object keys are sorted recursively, so the hash does not depend on map
/// iteration order.
pub fn cache_key<A: Serialize + ?Sized>(
    logical_key: &str,
    args: &A,
) -> Result<String, CacheError> {
    let value =
        serde_json::to_value(args).map_err(|e| CacheError::Serialization(e.to_string()))?;
    let mut canonical = String::new();
    write_canonical(&value, &mut canonical);
    let digest = Sha256::digest(canonical.as_bytes());
    Ok(format!("cache:{logical_key}:{}", hex::encode(digest)))
}

fn write_canonical(value: &serde_json::Value, out: &mut String) {
    use serde_json::Value;

    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(k.clone()).to_string());
                out.push(':');
                write_canonical(v, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, v) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(v, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Build the cache described by `[cache]`.
///
/// A Redis backend is connected and pinged here. If that fails, or the
/// binary was built without the `redis` feature, caching is disabled for
/// the life of the process.
pub async fn build_from_config(config: &CacheConfig) -> Cache {
    let store: Arc<dyn KvStore> = match &config.backend {
        CacheBackend::Memory => Arc::new(MemoryStore::with_capacity(config.max_entries)),
        CacheBackend::File => Arc::new(FileStore::new(config.resolved_dir())),
        CacheBackend::Redis { url } => connect_redis(url).await,
        CacheBackend::None => Arc::new(NoopStore),
    };
    info!(
        backend = store.name(),
        ttl_secs = config.ttl_secs,
        cache_empty_results = config.cache_empty_results,
        "Cache initialised"
    );

    Cache::new(store)
        .with_ttl(config.ttl())
        .with_empty_results(config.cache_empty_results)
        .with_max_value_chars(config.max_value_chars)
}

#[cfg(feature = "redis")]
async fn connect_redis(url: &str) -> Arc<dyn KvStore> {
    match RedisStore::connect(url).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(error = %e, "Redis unreachable, caching disabled");
            Arc::new(NoopStore)
        }
    }
}

#[cfg(not(feature = "redis"))]
async fn connect_redis(_url: &str) -> Arc<dyn KvStore> {
    warn!("Redis backend requested but built without the `redis` feature, caching disabled");
    Arc::new(NoopStore)
}
