//! Cache backend seam.
//!
//! The dedup layer talks to a [`CacheBackend`] trait object rather than a
//! concrete client, so the backing service can be swapped (or stubbed out in
//! tests). The cache is advisory: every caller must treat a backend failure
//! as a soft condition and carry on without it.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Errors returned by cache backends.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// The backend could not be reached or is in a bad state.
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}

/// String-keyed cache with per-entry TTL.
pub trait CacheBackend: Send + Sync {
    /// Fetch a value. Expired entries read as absent.
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value that expires after `ttl`.
    fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Drop a value. Deleting an absent key is not an error.
    fn delete(&self, key: &str) -> Result<(), CacheError>;
}

struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process [`CacheBackend`] backed by a mutexed map.
///
/// Entries are evicted lazily on read. Loss is safe by contract, so there is
/// no persistence and no background sweeper.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheBackend for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CacheError::Unavailable("cache mutex poisoned".into()))?;

        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CacheError::Unavailable("cache mutex poisoned".into()))?;

        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CacheError::Unavailable("cache mutex poisoned".into()))?;

        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{CacheBackend, MemoryCache};
    use std::time::Duration;

    #[test]
    fn set_then_get_roundtrips() {
        let cache = MemoryCache::new();
        cache
            .set_with_ttl("k", "v", Duration::from_secs(60))
            .expect("set");
        assert_eq!(cache.get("k").expect("get"), Some("v".to_string()));
    }

    #[test]
    fn missing_key_reads_absent() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("nope").expect("get"), None);
    }

    #[test]
    fn expired_entry_reads_absent() {
        let cache = MemoryCache::new();
        cache
            .set_with_ttl("k", "v", Duration::from_millis(0))
            .expect("set");
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("k").expect("get"), None);
    }

    #[test]
    fn delete_removes_entry() {
        let cache = MemoryCache::new();
        cache
            .set_with_ttl("k", "v", Duration::from_secs(60))
            .expect("set");
        cache.delete("k").expect("delete");
        assert_eq!(cache.get("k").expect("get"), None);
        // Deleting again is fine.
        cache.delete("k").expect("delete absent");
    }

    #[test]
    fn overwrite_replaces_value_and_ttl() {
        let cache = MemoryCache::new();
        cache
            .set_with_ttl("k", "old", Duration::from_secs(60))
            .expect("set");
        cache
            .set_with_ttl("k", "new", Duration::from_secs(60))
            .expect("set");
        assert_eq!(cache.get("k").expect("get"), Some("new".to_string()));
    }
}
