//! Short-TTL dedup cache for resubmitted identify text.
//!
//! A submission is addressed by who posted it and what they posted:
//! `submitter ':' first-16-hex-of-hash(trimmed text)`. A hit means the same
//! person posted byte-identical (modulo surrounding whitespace) text inside
//! the TTL window, and the cached outcome descriptor is returned without
//! reprocessing. The cache is strictly advisory — a duplicate slipping
//! through under a race or an outage self-heals because the canonical
//! upsert is idempotent by slug.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheBackend, CacheError};
use crate::model::ItemSlug;

/// Default lifetime of a dedup entry.
pub const DEFAULT_DEDUP_TTL: Duration = Duration::from_secs(3600);

/// Key used when the submitter is unknown.
const ANONYMOUS: &str = "anonymous";

/// Number of content-hash hex characters kept in the key.
const HASH_PREFIX_LEN: usize = 16;

/// Descriptor of a previously processed submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupHit {
    /// The raw submission the earlier post created.
    pub submission_id: i64,
    /// The canonical item it resolved to, when the upsert produced one.
    pub slug: Option<ItemSlug>,
    pub submitted_at_us: i64,
}

/// Compute the cache key for a (submitter, text) pair.
#[must_use]
pub fn dedup_key(submitter: Option<&str>, raw_text: &str) -> String {
    let hash = blake3::hash(raw_text.trim().as_bytes());
    let hex = hash.to_hex();
    format!(
        "{}:{}",
        submitter.unwrap_or(ANONYMOUS),
        &hex.as_str()[..HASH_PREFIX_LEN]
    )
}

/// The dedup layer over an injected cache backend.
pub struct DedupCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl DedupCache {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    /// Look up a prior outcome for this (submitter, text) pair.
    ///
    /// Returns `Ok(None)` on a miss. A hit performs no writes. An
    /// undecodable cached value is treated as a miss (reprocessing a
    /// duplicate is safe; failing the submission is not).
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend is unavailable; callers must
    /// treat this as soft and continue uncached.
    pub fn check(&self, submitter: Option<&str>, text: &str) -> Result<Option<DedupHit>, CacheError> {
        let key = dedup_key(submitter, text);
        let Some(value) = self.backend.get(&key)? else {
            return Ok(None);
        };

        match serde_json::from_str::<DedupHit>(&value) {
            Ok(hit) => Ok(Some(hit)),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "discarding undecodable dedup entry");
                let _ = self.backend.delete(&key);
                Ok(None)
            }
        }
    }

    /// Record the outcome of a freshly processed submission.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend is unavailable; the
    /// submission has already been durably processed at this point, so
    /// callers log and move on.
    pub fn record(
        &self,
        submitter: Option<&str>,
        text: &str,
        hit: &DedupHit,
    ) -> Result<(), CacheError> {
        let key = dedup_key(submitter, text);
        let value = serde_json::to_string(hit)
            .map_err(|e| CacheError::Unavailable(format!("encode dedup entry: {e}")))?;
        self.backend.set_with_ttl(&key, &value, self.ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::{DedupCache, DedupHit, dedup_key};
    use crate::cache::{CacheBackend, CacheError, MemoryCache};
    use crate::model::ItemSlug;
    use std::sync::Arc;
    use std::time::Duration;

    fn hit() -> DedupHit {
        DedupHit {
            submission_id: 7,
            slug: Some(ItemSlug::derive("rusty dagger").expect("slug")),
            submitted_at_us: 1_700_000_000_000_000,
        }
    }

    #[test]
    fn key_shape_is_submitter_colon_hash_prefix() {
        let key = dedup_key(Some("alice"), "some text");
        let (submitter, hash) = key.split_once(':').expect("key has separator");
        assert_eq!(submitter, "alice");
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn key_ignores_surrounding_whitespace() {
        assert_eq!(
            dedup_key(Some("alice"), "text"),
            dedup_key(Some("alice"), "  text\n\n")
        );
    }

    #[test]
    fn key_differs_per_submitter_and_content() {
        assert_ne!(dedup_key(Some("alice"), "t"), dedup_key(Some("bob"), "t"));
        assert_ne!(
            dedup_key(Some("alice"), "t1"),
            dedup_key(Some("alice"), "t2")
        );
    }

    #[test]
    fn anonymous_submitters_share_a_bucket() {
        assert_eq!(dedup_key(None, "t"), dedup_key(None, "t"));
        assert!(dedup_key(None, "t").starts_with("anonymous:"));
    }

    #[test]
    fn record_then_check_roundtrips() {
        let cache = DedupCache::new(Arc::new(MemoryCache::new()), Duration::from_secs(60));
        assert_eq!(cache.check(Some("alice"), "text T").expect("check"), None);

        cache
            .record(Some("alice"), "text T", &hit())
            .expect("record");

        let found = cache
            .check(Some("alice"), "text T")
            .expect("check")
            .expect("hit");
        assert_eq!(found, hit());
    }

    #[test]
    fn expired_entries_miss() {
        let cache = DedupCache::new(Arc::new(MemoryCache::new()), Duration::from_millis(0));
        cache
            .record(Some("alice"), "text T", &hit())
            .expect("record");
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.check(Some("alice"), "text T").expect("check"), None);
    }

    #[test]
    fn undecodable_entry_is_discarded_as_miss() {
        let backend = Arc::new(MemoryCache::new());
        backend
            .set_with_ttl(
                &dedup_key(Some("alice"), "text T"),
                "not json",
                Duration::from_secs(60),
            )
            .expect("seed garbage");

        let cache = DedupCache::new(backend.clone(), Duration::from_secs(60));
        assert_eq!(cache.check(Some("alice"), "text T").expect("check"), None);
        // The garbage entry was dropped.
        assert_eq!(
            backend.get(&dedup_key(Some("alice"), "text T")).expect("get"),
            None
        );
    }

    /// Backend that always fails, for soft-failure paths.
    pub(crate) struct DownCache;

    impl CacheBackend for DownCache {
        fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable("backend down".into()))
        }
        fn set_with_ttl(&self, _: &str, _: &str, _: Duration) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("backend down".into()))
        }
        fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("backend down".into()))
        }
    }

    #[test]
    fn backend_outage_surfaces_as_cache_error() {
        let cache = DedupCache::new(Arc::new(DownCache), Duration::from_secs(60));
        assert!(cache.check(Some("alice"), "text").is_err());
        assert!(cache.record(Some("alice"), "text", &hit()).is_err());
    }
}
