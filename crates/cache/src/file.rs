//! File-based store: one JSON document per key.
//!
//! Storage location: `~/.caduceus/cache/` unless `cache.dir` is set. Each
//! file is named after the SHA-256 of its key and holds
//! `{ key, expires_at, value }`. Expired files read as misses and are
//! removed on the way out. Writes go to a temporary file first and are
//! renamed into place, so a reader never sees a half-written entry.

use async_trait::async_trait;
use caduceus_core::{CacheError, KvStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

#[derive(Serialize, Deserialize)]
struct Record {
    key: String,
    expires_at: DateTime<Utc>,
    value: String,
}

pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// The directory is created on first write.
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }
}

#[async_trait]
impl KvStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let path = self.path_for(key);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CacheError::Backend(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        let record: Record = serde_json::from_str(&raw)
            .map_err(|e| CacheError::Serialization(format!("{}: {e}", path.display())))?;

        if record.key != key {
            return Ok(None);
        }

        if record.expires_at <= Utc::now() {
            debug!(path = %path.display(), "Removing expired cache file");
            let _ = tokio::fs::remove_file(&path).await;
            return Ok(None);
        }

        Ok(Some(record.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            CacheError::Unavailable(format!(
                "Failed to create cache directory {}: {e}",
                self.dir.display()
            ))
        })?;

        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| CacheError::Backend(format!("TTL out of range: {e}")))?;
        let record = Record {
            key: key.to_string(),
            expires_at: Utc::now() + ttl,
            value: value.to_string(),
        };
        let content = serde_json::to_string(&record)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| CacheError::Backend(format!("Failed to write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| CacheError::Backend(format!("Failed to move {}: {e}", path.display())))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        FileStore::new(dir.path().to_path_buf())
            .set("cache:wikipedia:abc", "{\"text\":\"x\"}", MINUTE)
            .await
            .unwrap();

        let reopened = FileStore::new(dir.path().to_path_buf());
        assert_eq!(
            reopened.get("cache:wikipedia:abc").await.unwrap().as_deref(),
            Some("{\"text\":\"x\"}")
        );
    }

    #[tokio::test]
    async fn missing_key_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("not-yet-created"));
        assert!(store.get("nothing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        store.set("k", "v", Duration::ZERO).await.unwrap();

        assert!(store.get("k").await.unwrap().is_none());
        assert!(!store.path_for("k").exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        std::fs::write(store.path_for("k"), "garbage").unwrap();

        assert!(matches!(
            store.get("k").await,
            Err(CacheError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn unwritable_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "a file, not a directory").unwrap();

        let store = FileStore::new(blocker.join("cache"));
        assert!(store.set("k", "v", MINUTE).await.is_err());
    }
}
