use crate::persist::{read_json, write_json};
use crate::types::CacheEntry;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// SHA-256 hex of the case-folded, trimmed query.
pub fn fingerprint(query: &str) -> String {
    let normalized = query.trim().to_lowercase();
    format!("{:x}", Sha256::digest(normalized.as_bytes()))
}

/// Query → response store backed by one JSON file. Best effort: I/O and
/// parse failures never reach the caller.
pub struct ResponseCache {
    path: PathBuf,
    ttl: Duration,
    enabled: bool,
    entries: Option<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    pub fn new<P: AsRef<Path>>(path: P, ttl: Duration) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ttl,
            enabled: true,
            entries: None,
        }
    }

    pub fn disabled() -> Self {
        Self {
            path: PathBuf::new(),
            ttl: DEFAULT_TTL,
            enabled: false,
            entries: Some(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn lookup(&mut self, query: &str) -> Option<String> {
        self.lookup_at(query, Utc::now()).await
    }

    pub async fn lookup_at(&mut self, query: &str, now: DateTime<Utc>) -> Option<String> {
        if !self.enabled {
            return None;
        }

        let key = fingerprint(query);
        let ttl = self.ttl;
        let entries = self.entries().await;
        let entry = entries.get(&key)?;

        // Future timestamps (clock skew) count as fresh.
        let age = (now - entry.timestamp).to_std().unwrap_or_default();
        if age <= ttl {
            debug!(key = %&key[..12], "cache hit");
            return Some(entry.response.clone());
        }

        debug!(key = %&key[..12], age_secs = age.as_secs(), "evicting stale cache entry");
        entries.remove(&key);
        self.persist().await;
        None
    }

    pub async fn store(&mut self, query: &str, response: &str) {
        self.store_at(query, response, Utc::now()).await;
    }

    pub async fn store_at(&mut self, query: &str, response: &str, now: DateTime<Utc>) {
        if !self.enabled {
            return;
        }

        let key = fingerprint(query);
        self.entries().await.insert(
            key,
            CacheEntry {
                response: response.to_string(),
                timestamp: now,
            },
        );
        self.persist().await;
    }

    /// Number of entries currently held, stale ones included.
    pub async fn len(&mut self) -> usize {
        self.entries().await.len()
    }

    pub async fn is_empty(&mut self) -> bool {
        self.len().await == 0
    }

    async fn entries(&mut self) -> &mut HashMap<String, CacheEntry> {
        if self.entries.is_none() {
            let loaded = match read_json::<HashMap<String, CacheEntry>>(&self.path).await {
                Ok(Some(entries)) => entries,
                Ok(None) => HashMap::new(),
                Err(e) => {
                    warn!(path = ?self.path, error = %e, "unreadable cache file, starting empty");
                    HashMap::new()
                }
            };
            self.entries = Some(loaded);
        }
        self.entries.get_or_insert_with(HashMap::new)
    }

    async fn persist(&self) {
        let Some(entries) = &self.entries else {
            return;
        };
        if let Err(e) = write_json(&self.path, entries).await {
            warn!(path = ?self.path, error = %e, "failed to write cache file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_in(dir: &tempfile::TempDir) -> ResponseCache {
        ResponseCache::new(dir.path().join("cache.json"), DEFAULT_TTL)
    }

    #[test]
    fn test_fingerprint_normalizes() {
        assert_eq!(fingerprint("  List Files "), fingerprint("list files"));
        assert_ne!(fingerprint("list files"), fingerprint("list file"));
        assert_eq!(fingerprint("x").len(), 64);
    }

    #[tokio::test]
    async fn test_store_then_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = cache_in(&dir);

        assert!(cache.lookup("what time is it").await.is_none());
        cache.store("What time is it", "It is noon").await;
        assert_eq!(cache.lookup("what time is it  ").await.as_deref(), Some("It is noon"));
    }

    #[tokio::test]
    async fn test_store_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = cache_in(&dir);

        cache.store("q", "first").await;
        cache.store("q", "second").await;
        assert_eq!(cache.lookup("q").await.as_deref(), Some("second"));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_evicted_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = cache_in(&dir);
        let stored_at = Utc::now();

        cache.store_at("show disk usage", "42%", stored_at).await;
        let fresh = stored_at + chrono::Duration::seconds(299);
        assert!(cache.lookup_at("show disk usage", fresh).await.is_some());

        let stale = stored_at + chrono::Duration::seconds(301);
        assert!(cache.lookup_at("show disk usage", stale).await.is_none());
        assert_eq!(cache.len().await, 0);

        // A fresh instance reading the same file sees the removal too.
        let mut reopened = cache_in(&dir);
        assert!(reopened.is_empty().await);
        assert!(reopened.lookup_at("show disk usage", fresh).await.is_none());
    }

    #[tokio::test]
    async fn test_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut cache = cache_in(&dir);
            cache.store("hello", "hi there").await;
        }
        let mut cache = cache_in(&dir);
        assert_eq!(cache.lookup("hello").await.as_deref(), Some("hi there"));
        assert!(!dir.path().join("cache.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let mut cache = ResponseCache::new(&path, DEFAULT_TTL);
        assert!(cache.lookup("anything").await.is_none());

        cache.store("anything", "works").await;
        assert_eq!(cache.lookup("anything").await.as_deref(), Some("works"));
    }

    #[tokio::test]
    async fn test_unwritable_location_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        tokio::fs::write(&blocker, "x").await.unwrap();

        let mut cache = ResponseCache::new(blocker.join("cache.json"), DEFAULT_TTL);
        cache.store("q", "a").await;
        // Still served from memory.
        assert_eq!(cache.lookup("q").await.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_disabled_cache() {
        let mut cache = ResponseCache::disabled();
        cache.store("q", "a").await;
        assert!(cache.lookup("q").await.is_none());
        assert!(!cache.is_enabled());
    }
}
