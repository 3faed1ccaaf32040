use anyhow::Result;
use clap::Args;
use relic_core::config;
use relic_core::rebuild::{MaintenanceLock, RebuildError, Rebuilder};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use super::Project;
use crate::output::{OutputMode, coded_failure, kv, render};

#[derive(Args, Debug)]
pub struct ReparseArgs {}

#[derive(Serialize)]
struct ReparseResult {
    total: usize,
    succeeded: usize,
    skipped: usize,
    failed: usize,
    items: u64,
    ledger_events_replayed: usize,
    elapsed_ms: u128,
    errors: Vec<String>,
}

/// Execute `relic reparse`: wipe the canonical view and refold it from the
/// raw submission log, then replay the moderation ledger. Guarded by a
/// cross-process lock so only one reparse runs per project.
///
/// # Errors
///
/// A coded failure when another reparse holds the lock; store failures
/// otherwise.
pub fn run_reparse(_args: &ReparseArgs, root: &Path, mode: OutputMode) -> Result<()> {
    let project = Project::open(root)?;

    let _lock = MaintenanceLock::acquire(&config::lock_path(root))
        .map_err(|e: RebuildError| coded_failure(e.code(), &e))?;

    let report = Rebuilder::new(project.store.clone(), Arc::clone(&project.engine))
        .reparse()
        .map_err(|e| coded_failure(e.code(), &e))?;

    let result = ReparseResult {
        total: report.total,
        succeeded: report.succeeded,
        skipped: report.skipped,
        failed: report.failed,
        items: report.item_count,
        ledger_events_replayed: report.replay.events,
        elapsed_ms: report.elapsed.as_millis(),
        errors: report.errors,
    };

    render(mode, &result, |r, w| {
        writeln!(w, "Reparse complete in {}ms.", r.elapsed_ms)?;
        kv(w, "submissions", r.total.to_string())?;
        kv(w, "succeeded", r.succeeded.to_string())?;
        kv(w, "skipped", r.skipped.to_string())?;
        kv(w, "failed", r.failed.to_string())?;
        kv(w, "items", r.items.to_string())?;
        kv(w, "ledger events", r.ledger_events_replayed.to_string())?;
        for error in &r.errors {
            writeln!(w, "warning: {error}")?;
        }
        Ok(())
    })
}
