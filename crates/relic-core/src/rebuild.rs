//! Bulk reparse: rebuild the canonical catalog from raw submissions.
//!
//! The raw submission log is the durable source of truth; canonical items
//! are a derived view. After a parser fix, the whole view is wiped and
//! refolded from the log in submission order, then the moderation ledger is
//! replayed so hide/restore decisions survive the rebuild. First-post
//! credits are not re-awarded.
//!
//! Only one reparse may run per data directory at a time, enforced with an
//! advisory file lock so the guarantee holds across processes.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::ErrorCode;
use crate::ledger::{Ledger, ReplayStats};
use crate::parse::parse_item_text;
use crate::store::{Store, StoreError};
use crate::upsert::{UpsertContext, UpsertEngine, UpsertError, UpsertOutcome};

/// Errors surfaced by bulk rebuild operations.
#[derive(Debug, thiserror::Error)]
pub enum RebuildError {
    /// Another process holds the maintenance lock.
    #[error("another reparse is already running")]
    Locked,

    #[error("maintenance lock file: {0}")]
    Lock(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RebuildError {
    /// Stable machine code for this failure.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Locked => ErrorCode::ReparseLocked,
            Self::Lock(_) => ErrorCode::InternalUnexpected,
            Self::Store(_) => ErrorCode::StoreFailure,
        }
    }
}

/// Exclusive cross-process maintenance lock, released on drop.
pub struct MaintenanceLock {
    file: File,
}

impl MaintenanceLock {
    /// Try to take the lock without blocking.
    ///
    /// # Errors
    ///
    /// [`RebuildError::Locked`] when another process holds it; io errors
    /// when the lock file cannot be created.
    pub fn acquire(path: &Path) -> Result<Self, RebuildError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        file.try_lock_exclusive().map_err(|_| RebuildError::Locked)?;
        Ok(Self { file })
    }
}

impl Drop for MaintenanceLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

/// Counters from one full reparse run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReparseReport {
    /// Raw submissions read from the log.
    pub total: usize,
    /// Submissions that produced or merged a canonical item.
    pub succeeded: usize,
    /// Submissions matching a skip rule.
    pub skipped: usize,
    /// Submissions that failed to parse to a usable draft.
    pub failed: usize,
    /// Per-submission failure descriptions.
    pub errors: Vec<String>,
    /// Canonical items present after the rebuild.
    pub item_count: u64,
    /// Outcome of the moderation ledger replay.
    pub replay: ReplayStats,
    pub elapsed: Duration,
}

/// Drives the wipe-and-refold rebuild.
pub struct Rebuilder {
    store: Arc<dyn Store>,
    engine: Arc<UpsertEngine>,
}

impl Rebuilder {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, engine: Arc<UpsertEngine>) -> Self {
        Self { store, engine }
    }

    /// Rebuild every canonical item from the raw submission log.
    ///
    /// Tolerant of per-submission failures: a submission that no longer
    /// parses is counted and reported, and the rebuild continues. The
    /// caller is responsible for holding a [`MaintenanceLock`].
    ///
    /// # Errors
    ///
    /// Returns store failures from the wipe, the refold writes, or the
    /// ledger replay.
    pub fn reparse(&self) -> Result<ReparseReport, RebuildError> {
        let started = Instant::now();

        let cleared = self.store.clear_submission_links()?;
        let deleted = self.store.delete_all_items()?;
        tracing::info!(cleared, deleted, "canonical view wiped for reparse");

        let submissions = self.store.submissions_oldest_first()?;
        let mut report = ReparseReport {
            total: submissions.len(),
            ..ReparseReport::default()
        };

        for submission in &submissions {
            let draft = parse_item_text(&submission.body);
            let ctx = UpsertContext {
                submission_id: submission.id,
                submitter: submission.submitter.as_deref(),
                origin: submission.origin.as_deref(),
                delayed: false,
                credit: false,
            };

            match self.engine.apply(&draft, &ctx) {
                Ok(UpsertOutcome::Skipped(_)) => report.skipped += 1,
                Ok(_) => report.succeeded += 1,
                Err(UpsertError::NoItemName) => {
                    report.failed += 1;
                    report
                        .errors
                        .push(format!("submission {}: no item name", submission.id));
                }
                Err(UpsertError::Store(e)) => return Err(e.into()),
            }
        }

        report.replay = Ledger::new(Arc::clone(&self.store)).replay_all()?;
        report.item_count = self.store.item_count()?;
        report.elapsed = started.elapsed();

        tracing::info!(
            total = report.total,
            succeeded = report.succeeded,
            skipped = report.skipped,
            failed = report.failed,
            items = report.item_count,
            "reparse complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::{MaintenanceLock, RebuildError, Rebuilder};
    use crate::dedup::DedupCache;
    use crate::cache::MemoryCache;
    use crate::ingest::{IngestRequest, Ingestor};
    use crate::ledger::{Ledger, VisibilityAction};
    use crate::model::ItemSlug;
    use crate::store::{SqliteStore, Store};
    use crate::upsert::{DEFAULT_VISIBILITY_DELAY, UpsertEngine};
    use std::sync::Arc;
    use std::time::Duration;

    fn fixture() -> (Ingestor, Rebuilder, Ledger, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::open_in_memory().expect("open store"));
        let engine = Arc::new(UpsertEngine::new(store.clone(), DEFAULT_VISIBILITY_DELAY));
        let dedup = DedupCache::new(Arc::new(MemoryCache::new()), Duration::from_secs(60));
        (
            Ingestor::new(store.clone(), dedup, Arc::clone(&engine)),
            Rebuilder::new(store.clone(), engine),
            Ledger::new(store.clone()),
            store,
        )
    }

    fn identify_text(name: &str, level: i64) -> String {
        format!(".. this, a {name}, is a dagger,\nweighs 1 pound\nis of {level}th level\n")
    }

    fn ingest(ingestor: &Ingestor, submitter: &str, text: &str) {
        ingestor
            .ingest(&IngestRequest {
                text,
                submitter: Some(submitter),
                origin: Some("Old Keep"),
                delayed: false,
            })
            .expect("ingest");
    }

    #[test]
    fn reparse_rebuilds_the_same_catalog() {
        let (ingestor, rebuilder, _ledger, store) = fixture();
        ingest(&ingestor, "alice", &identify_text("rusty dagger", 10));
        ingest(&ingestor, "bob", &identify_text("jeweled blade", 30));
        ingest(&ingestor, "bob", &identify_text("practice sword", 1));

        let before = store.list_items(true).expect("list");

        let report = rebuilder.reparse().expect("reparse");
        assert_eq!(report.total, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(report.item_count, 2);

        let after = store.list_items(true).expect("list");
        assert_eq!(before.len(), after.len());
        for (b, a) in before.iter().zip(&after) {
            assert_eq!(b.slug, a.slug);
            assert_eq!(b.first_poster, a.first_poster);
            assert_eq!(b.locations, a.locations);
        }
    }

    #[test]
    fn moderation_survives_a_reparse() {
        let (ingestor, rebuilder, ledger, store) = fixture();
        ingest(&ingestor, "alice", &identify_text("rusty dagger", 10));

        let slug = ItemSlug::new_unchecked("rusty-dagger");
        ledger
            .apply(&slug, VisibilityAction::Hide, "mod")
            .expect("hide");

        let report = rebuilder.reparse().expect("reparse");
        assert_eq!(report.replay.events, 1);
        assert_eq!(report.replay.flags_written, 1);

        let item = store.item(&slug).expect("fetch").expect("present");
        assert!(item.hidden);
    }

    #[test]
    fn reparse_does_not_recredit_contributors() {
        let (ingestor, rebuilder, _ledger, store) = fixture();
        store
            .insert_contributor(&crate::model::Contributor {
                username: "alice".into(),
                character: None,
                score: 0,
            })
            .expect("insert contributor");

        ingest(&ingestor, "alice", &identify_text("rusty dagger", 10));
        rebuilder.reparse().expect("reparse");
        rebuilder.reparse().expect("reparse again");

        let alice = store
            .contributor("alice")
            .expect("fetch")
            .expect("present");
        assert_eq!(alice.score, 1);
    }

    #[test]
    fn unparsable_submissions_are_counted_not_fatal() {
        let (ingestor, rebuilder, _ledger, store) = fixture();
        ingest(&ingestor, "alice", &identify_text("rusty dagger", 10));
        // Simulate a submission accepted by an older, laxer parser.
        store
            .insert_submission(&crate::model::NewSubmission {
                body: "no commas here at all",
                submitter: None,
                origin: None,
                submitted_at_us: crate::time::now_us(),
            })
            .expect("insert");

        let report = rebuilder.reparse().expect("reparse");
        assert_eq!(report.total, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.item_count, 1);
    }

    #[test]
    fn maintenance_lock_is_exclusive() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("reparse.lock");

        let held = MaintenanceLock::acquire(&path).expect("first acquire");
        let second = MaintenanceLock::acquire(&path);
        assert!(matches!(second, Err(RebuildError::Locked)));

        drop(held);
        MaintenanceLock::acquire(&path).expect("reacquire after release");
    }
}
