//! Submission ingestion pipeline.
//!
//! One front door for raw identify text: validate, consult the dedup cache,
//! durably record the submission, parse, upsert, then cache the outcome.
//! The cache sits strictly on the side — both the pre-check and the
//! post-record degrade to a warning when the backend is down, and the
//! pipeline continues on the durable path.

use std::sync::Arc;

use crate::cache::CacheError;
use crate::dedup::{DedupCache, DedupHit};
use crate::error::ErrorCode;
use crate::model::NewSubmission;
use crate::parse::parse_item_text;
use crate::store::{Store, StoreError};
use crate::time::now_us;
use crate::upsert::{UpsertContext, UpsertEngine, UpsertError, UpsertOutcome};

/// One raw submission handed to the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct IngestRequest<'a> {
    /// Raw identify text as pasted by the poster.
    pub text: &'a str,
    pub submitter: Option<&'a str>,
    /// Where the poster says the item was found.
    pub origin: Option<&'a str>,
    /// Withhold the resulting item from listings for the configured window.
    pub delayed: bool,
}

/// What ingesting one submission produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The submission was new and fully processed.
    Ingested {
        submission_id: i64,
        upsert: UpsertOutcome,
        /// Set when the dedup cache was unreachable and the pipeline
        /// continued uncached.
        cache_warning: Option<String>,
    },
    /// The same submitter posted identical text inside the dedup window;
    /// the prior outcome is returned and nothing was reprocessed.
    Duplicate(DedupHit),
}

/// Errors surfaced by the ingestion pipeline.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("submission text is empty")]
    EmptyText,

    #[error("no item name could be extracted from the submission text")]
    NoItemName,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IngestError {
    /// Stable machine code for this failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::EmptyText => ErrorCode::EmptySubmission,
            Self::NoItemName => ErrorCode::NoItemName,
            Self::Store(_) => ErrorCode::StoreFailure,
        }
    }
}

/// The wired-up ingestion pipeline.
pub struct Ingestor {
    store: Arc<dyn Store>,
    dedup: DedupCache,
    engine: Arc<UpsertEngine>,
}

impl Ingestor {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, dedup: DedupCache, engine: Arc<UpsertEngine>) -> Self {
        Self {
            store,
            dedup,
            engine,
        }
    }

    /// Ingest one raw submission end to end.
    ///
    /// A dedup hit short-circuits before any durable write. A skipped draft
    /// (level 1, corpse, key) is a success with a [`UpsertOutcome::Skipped`]
    /// outcome, and the submission stays on record.
    ///
    /// # Errors
    ///
    /// [`IngestError::EmptyText`] for whitespace-only input,
    /// [`IngestError::NoItemName`] when no name line parses (the raw
    /// submission is still stored for a later reparse), and store failures
    /// otherwise.
    pub fn ingest(&self, request: &IngestRequest<'_>) -> Result<IngestOutcome, IngestError> {
        if request.text.trim().is_empty() {
            return Err(IngestError::EmptyText);
        }

        let mut cache_warning = None;
        match self.dedup.check(request.submitter, request.text) {
            Ok(Some(hit)) => {
                tracing::info!(
                    submission_id = hit.submission_id,
                    "duplicate submission inside dedup window"
                );
                return Ok(IngestOutcome::Duplicate(hit));
            }
            Ok(None) => {}
            Err(e) => cache_warning = Some(soft_cache_failure("dedup check", &e)),
        }

        let submitted_at_us = now_us();
        let submission_id = self.store.insert_submission(&NewSubmission {
            body: request.text,
            submitter: request.submitter,
            origin: request.origin,
            submitted_at_us,
        })?;

        let draft = parse_item_text(request.text);
        let upsert = self
            .engine
            .apply(
                &draft,
                &UpsertContext {
                    submission_id,
                    submitter: request.submitter,
                    origin: request.origin,
                    delayed: request.delayed,
                    credit: true,
                },
            )
            .map_err(|e| match e {
                UpsertError::NoItemName => IngestError::NoItemName,
                UpsertError::Store(e) => IngestError::Store(e),
            })?;

        let hit = DedupHit {
            submission_id,
            slug: upsert.slug().cloned(),
            submitted_at_us,
        };
        if let Err(e) = self.dedup.record(request.submitter, request.text, &hit) {
            cache_warning = Some(soft_cache_failure("dedup record", &e));
        }

        tracing::info!(submission_id, outcome = ?upsert, "submission ingested");
        Ok(IngestOutcome::Ingested {
            submission_id,
            upsert,
            cache_warning,
        })
    }
}

fn soft_cache_failure(stage: &str, e: &CacheError) -> String {
    tracing::warn!(stage, error = %e, "dedup cache unavailable, continuing uncached");
    format!("{stage} unavailable: {e}")
}

#[cfg(test)]
mod tests {
    use super::{IngestError, IngestOutcome, IngestRequest, Ingestor};
    use crate::cache::{CacheBackend, CacheError, MemoryCache};
    use crate::dedup::DedupCache;
    use crate::error::ErrorCode;
    use crate::model::ItemSlug;
    use crate::store::{SqliteStore, Store};
    use crate::upsert::{DEFAULT_VISIBILITY_DELAY, UpsertEngine, UpsertOutcome};
    use std::sync::Arc;
    use std::time::Duration;

    const RUSTY_DAGGER: &str = "\
.. this object, a rusty dagger, is a dagger,
weighs 2 pounds
is of 10th level
wear it on your hands
its attacks take the form of a pierce.
it deals 2d12 damage (averaging at 13).
When worn, it affects you:
  modifies damage roll by 2
  modifies strength by 1
";

    fn pipeline(backend: Arc<dyn CacheBackend>) -> (Ingestor, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::open_in_memory().expect("open store"));
        let dedup = DedupCache::new(backend, Duration::from_secs(60));
        let engine = Arc::new(UpsertEngine::new(store.clone(), DEFAULT_VISIBILITY_DELAY));
        (Ingestor::new(store.clone(), dedup, engine), store)
    }

    fn request(text: &str) -> IngestRequest<'_> {
        IngestRequest {
            text,
            submitter: Some("alice"),
            origin: Some("Old Keep"),
            delayed: false,
        }
    }

    #[test]
    fn full_text_ingests_to_a_created_item() {
        let (ingestor, store) = pipeline(Arc::new(MemoryCache::new()));

        let outcome = ingestor.ingest(&request(RUSTY_DAGGER)).expect("ingest");
        let IngestOutcome::Ingested {
            upsert,
            cache_warning,
            ..
        } = outcome
        else {
            panic!("expected a fresh ingest");
        };
        assert_eq!(
            upsert,
            UpsertOutcome::Created(ItemSlug::new_unchecked("rusty-dagger"))
        );
        assert_eq!(cache_warning, None);

        let item = store
            .item(&ItemSlug::new_unchecked("rusty-dagger"))
            .expect("fetch")
            .expect("present");
        assert_eq!(item.level, 10);
        assert_eq!(item.category, "dagger");
    }

    #[test]
    fn identical_resubmission_is_a_duplicate() {
        let (ingestor, store) = pipeline(Arc::new(MemoryCache::new()));

        let first = ingestor.ingest(&request(RUSTY_DAGGER)).expect("ingest");
        let IngestOutcome::Ingested { submission_id, .. } = first else {
            panic!("expected a fresh ingest");
        };

        // Same submitter, same text modulo surrounding whitespace.
        let padded = format!("\n{RUSTY_DAGGER}\n\n");
        let second = ingestor.ingest(&request(&padded)).expect("ingest");
        let IngestOutcome::Duplicate(hit) = second else {
            panic!("expected a dedup hit");
        };
        assert_eq!(hit.submission_id, submission_id);
        assert_eq!(hit.slug, Some(ItemSlug::new_unchecked("rusty-dagger")));

        // Nothing was written the second time.
        assert_eq!(store.submissions_oldest_first().expect("list").len(), 1);
    }

    #[test]
    fn different_submitter_is_not_a_duplicate() {
        let (ingestor, store) = pipeline(Arc::new(MemoryCache::new()));
        ingestor.ingest(&request(RUSTY_DAGGER)).expect("ingest");

        let mut other = request(RUSTY_DAGGER);
        other.submitter = Some("bob");
        let outcome = ingestor.ingest(&other).expect("ingest");
        assert!(matches!(outcome, IngestOutcome::Ingested { .. }));
        assert_eq!(store.submissions_oldest_first().expect("list").len(), 2);
    }

    #[test]
    fn empty_text_is_rejected_up_front() {
        let (ingestor, store) = pipeline(Arc::new(MemoryCache::new()));
        let err = ingestor.ingest(&request("  \n\t ")).unwrap_err();
        assert!(matches!(err, IngestError::EmptyText));
        assert_eq!(err.code(), ErrorCode::EmptySubmission);
        assert!(store.submissions_oldest_first().expect("list").is_empty());
    }

    #[test]
    fn nameless_text_fails_but_keeps_the_submission() {
        let (ingestor, store) = pipeline(Arc::new(MemoryCache::new()));
        let err = ingestor
            .ingest(&request("no commas here at all"))
            .unwrap_err();
        assert!(matches!(err, IngestError::NoItemName));
        assert_eq!(err.code(), ErrorCode::NoItemName);
        // The raw text survives for a later reparse after parser fixes.
        assert_eq!(store.submissions_oldest_first().expect("list").len(), 1);
    }

    #[test]
    fn skipped_drafts_record_the_submission_without_an_item() {
        let (ingestor, store) = pipeline(Arc::new(MemoryCache::new()));
        let text = ".. this, a practice sword, is a sword,\nweighs 1 pound\nis of 1st level\n";
        let outcome = ingestor.ingest(&request(text)).expect("ingest");
        let IngestOutcome::Ingested { upsert, .. } = outcome else {
            panic!("expected a fresh ingest");
        };
        assert!(matches!(upsert, UpsertOutcome::Skipped(_)));
        assert_eq!(store.item_count().expect("count"), 0);
        assert_eq!(store.submissions_oldest_first().expect("list").len(), 1);
    }

    /// Backend that always fails, for soft-failure paths.
    struct DownCache;

    impl CacheBackend for DownCache {
        fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable("backend down".into()))
        }
        fn set_with_ttl(&self, _: &str, _: &str, _: std::time::Duration) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("backend down".into()))
        }
        fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("backend down".into()))
        }
    }

    #[test]
    fn cache_outage_degrades_to_a_warning() {
        let (ingestor, store) = pipeline(Arc::new(DownCache));

        let outcome = ingestor.ingest(&request(RUSTY_DAGGER)).expect("ingest");
        let IngestOutcome::Ingested { cache_warning, .. } = outcome else {
            panic!("expected a fresh ingest");
        };
        assert!(cache_warning.is_some());

        // The durable path still ran.
        assert!(
            store
                .item(&ItemSlug::new_unchecked("rusty-dagger"))
                .expect("fetch")
                .is_some()
        );
    }
}
