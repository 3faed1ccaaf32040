//! Durable store seam.
//!
//! The core treats persistence as a repository trait with explicit
//! create/read/update contracts; [`SqliteStore`] is the shipped
//! implementation. Runtime defaults for SQLite are conservative:
//! - `journal_mode = WAL` to allow concurrent readers while writers append
//! - `busy_timeout = 5s` to reduce transient lock failures under contention
//! - `foreign_keys = ON` for relational integrity

pub mod schema;
pub mod sqlite;

pub use sqlite::SqliteStore;

use crate::ledger::{VisibilityAction, VisibilityEvent};
use crate::model::{CanonicalItem, Contributor, ItemSlug, NewSubmission, RawSubmission};

/// Errors surfaced by store implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Referencing a row that does not exist.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Inserting a row whose unique key already exists.
    #[error("duplicate {entity}: {key}")]
    Conflict { entity: &'static str, key: String },

    /// The backend failed (connection, disk, constraint machinery).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Backend(e.to_string())
    }
}

/// Repository contract over submissions, items, the visibility ledger, and
/// the contributor score table.
///
/// Implementations must be safe to share across threads; per-identifier
/// write serialization is handled above this trait by the upsert engine.
pub trait Store: Send + Sync {
    // -- submissions --------------------------------------------------------

    /// Insert a new raw submission, returning its id.
    fn insert_submission(&self, submission: &NewSubmission<'_>) -> Result<i64, StoreError>;

    /// Fetch one submission by id.
    fn submission(&self, id: i64) -> Result<Option<RawSubmission>, StoreError>;

    /// Attach the canonical slug a submission resolved to.
    fn link_submission(&self, id: i64, slug: &ItemSlug) -> Result<(), StoreError>;

    /// Detach every submission from its canonical item (bulk reparse setup).
    fn clear_submission_links(&self) -> Result<usize, StoreError>;

    /// All submissions, oldest first.
    fn submissions_oldest_first(&self) -> Result<Vec<RawSubmission>, StoreError>;

    // -- canonical items ----------------------------------------------------

    /// Fetch one canonical item by slug.
    fn item(&self, slug: &ItemSlug) -> Result<Option<CanonicalItem>, StoreError>;

    /// Insert a new canonical item; [`StoreError::Conflict`] if the slug
    /// already exists.
    fn insert_item(&self, item: &CanonicalItem) -> Result<(), StoreError>;

    /// Rewrite an existing canonical item; [`StoreError::NotFound`] if the
    /// slug does not exist.
    fn update_item(&self, item: &CanonicalItem) -> Result<(), StoreError>;

    /// Delete every canonical item (bulk reparse setup). Returns the count.
    fn delete_all_items(&self) -> Result<usize, StoreError>;

    fn item_count(&self) -> Result<u64, StoreError>;

    /// All items ordered by slug, optionally including hidden ones.
    fn list_items(&self, include_hidden: bool) -> Result<Vec<CanonicalItem>, StoreError>;

    /// Case-insensitive substring search over name and search text.
    fn search_items(&self, query: &str) -> Result<Vec<CanonicalItem>, StoreError>;

    // -- visibility ledger --------------------------------------------------

    /// Append one moderation event, returning the stored row.
    fn append_visibility_event(
        &self,
        slug: &ItemSlug,
        action: VisibilityAction,
        actor: &str,
        created_at_us: i64,
    ) -> Result<VisibilityEvent, StoreError>;

    /// Every event in chronological order.
    fn visibility_events_oldest_first(&self) -> Result<Vec<VisibilityEvent>, StoreError>;

    /// One slug's events, most recent first.
    fn visibility_history(&self, slug: &ItemSlug) -> Result<Vec<VisibilityEvent>, StoreError>;

    /// Rewrite the materialized hidden flag on an item.
    fn set_item_hidden(&self, slug: &ItemSlug, hidden: bool) -> Result<(), StoreError>;

    // -- contributors -------------------------------------------------------

    /// Insert a contributor row.
    fn insert_contributor(&self, contributor: &Contributor) -> Result<(), StoreError>;

    /// Fetch a contributor by username.
    fn contributor(&self, username: &str) -> Result<Option<Contributor>, StoreError>;

    /// Increment the score of the contributor whose username *or* character
    /// name matches. Returns `false` (and creates nothing) when neither
    /// matches.
    fn credit_contributor(&self, name: &str) -> Result<bool, StoreError>;
}
