//! relic-core: canonical item database for MUD identify text.
//!
//! The pipeline, front to back:
//! - [`parse`] turns raw identify text into a structured draft
//! - [`model`] derives the canonical slug the draft deduplicates under
//! - [`dedup`] short-circuits identical resubmissions inside a TTL window
//! - [`upsert`] creates or merges the canonical item, idempotent by slug
//! - [`ledger`] records hide/restore decisions as an append-only event log
//! - [`rebuild`] refolds the whole catalog from raw submissions
//! - [`store`] is the SQLite-backed repository under all of it
//!
//! # Conventions
//!
//! - **Errors**: module-level `thiserror` enums inside the core;
//!   `anyhow::Result` with context at the edges.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `error!`, `debug!`).
//! - **Time**: `i64` microseconds since the Unix epoch, fields suffixed
//!   `_us`.

pub mod cache;
pub mod config;
pub mod dedup;
pub mod error;
pub mod ingest;
pub mod ledger;
pub mod model;
pub mod parse;
pub mod rebuild;
pub mod store;
pub mod time;
pub mod upsert;

pub use cache::{CacheBackend, CacheError, MemoryCache};
pub use config::RelicConfig;
pub use dedup::{DedupCache, DedupHit};
pub use error::ErrorCode;
pub use ingest::{IngestError, IngestOutcome, IngestRequest, Ingestor};
pub use ledger::{Ledger, VisibilityAction, VisibilityEvent};
pub use model::{CanonicalItem, Contributor, ItemSlug, RawSubmission};
pub use parse::{ItemDraft, parse_item_text};
pub use rebuild::{MaintenanceLock, RebuildError, ReparseReport, Rebuilder};
pub use store::{SqliteStore, Store, StoreError};
pub use upsert::{SkipReason, UpsertEngine, UpsertOutcome};
