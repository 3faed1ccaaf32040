//! Command handlers, one module per subcommand.

pub mod history;
pub mod init;
pub mod list;
pub mod moderate;
pub mod reparse;
pub mod search;
pub mod show;
pub mod submit;

use anyhow::Result;
use relic_core::cache::MemoryCache;
use relic_core::config::{self, RelicConfig};
use relic_core::dedup::DedupCache;
use relic_core::error::ErrorCode;
use relic_core::ledger::Ledger;
use relic_core::store::SqliteStore;
use relic_core::upsert::UpsertEngine;
use std::path::Path;
use std::sync::Arc;

use crate::output::coded_failure;

/// Everything a command needs, opened once per invocation.
pub struct Project {
    pub config: RelicConfig,
    pub store: Arc<SqliteStore>,
    pub engine: Arc<UpsertEngine>,
}

impl Project {
    /// Open the project under `root`.
    ///
    /// # Errors
    ///
    /// A coded failure when `relic init` has not been run or the store
    /// cannot be opened.
    pub fn open(root: &Path) -> Result<Self> {
        if !config::is_initialized(root) {
            return Err(coded_failure(
                ErrorCode::NotInitialized,
                format!("no {} directory under {}", config::DATA_DIR, root.display()),
            ));
        }

        let config = RelicConfig::load(root)?;
        let store = Arc::new(
            SqliteStore::open(&config::db_path(root, &config))
                .map_err(|e| coded_failure(ErrorCode::StoreFailure, e))?,
        );
        let engine = Arc::new(UpsertEngine::new(
            store.clone(),
            config.visibility_delay(),
        ));

        Ok(Self {
            config,
            store,
            engine,
        })
    }

    /// The dedup layer for this invocation.
    ///
    /// The cache is process-local, so dedup only spans submissions inside
    /// one long-running process; separate CLI invocations fall through to
    /// the idempotent upsert, which is the documented degraded mode.
    pub fn dedup(&self) -> DedupCache {
        DedupCache::new(Arc::new(MemoryCache::new()), self.config.dedup_ttl())
    }

    pub fn ledger(&self) -> Ledger {
        Ledger::new(self.store.clone())
    }
}
