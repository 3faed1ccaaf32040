use anyhow::Result;
use clap::Args;
use relic_core::error::ErrorCode;
use relic_core::model::ItemSlug;
use relic_core::store::Store as _;
use serde::Serialize;
use std::path::Path;

use super::Project;
use crate::output::{OutputMode, coded_failure, render};

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Slug of the canonical item.
    #[arg(value_name = "SLUG")]
    pub slug: String,
}

#[derive(Serialize)]
struct HistoryEntry {
    event_id: i64,
    action: String,
    actor: String,
    created_at_us: i64,
}

/// Execute `relic history`: the moderation ledger for one item, most
/// recent first.
///
/// # Errors
///
/// A coded failure when the item does not exist; store failures otherwise.
pub fn run_history(args: &HistoryArgs, root: &Path, mode: OutputMode) -> Result<()> {
    let project = Project::open(root)?;
    let slug = ItemSlug::new_unchecked(&args.slug);

    if project
        .store
        .item(&slug)
        .map_err(|e| coded_failure(ErrorCode::StoreFailure, e))?
        .is_none()
    {
        return Err(coded_failure(ErrorCode::ItemNotFound, &slug));
    }

    let events: Vec<HistoryEntry> = project
        .ledger()
        .history(&slug)
        .map_err(|e| coded_failure(ErrorCode::StoreFailure, e))?
        .into_iter()
        .map(|e| HistoryEntry {
            event_id: e.id,
            action: e.action.to_string(),
            actor: e.actor,
            created_at_us: e.created_at_us,
        })
        .collect();

    render(mode, &events, |entries, w| {
        if entries.is_empty() {
            writeln!(w, "No moderation history for '{}'.", args.slug)?;
            return Ok(());
        }
        for entry in entries {
            writeln!(
                w,
                "{:>6}  {:<8} by {:<16} at {}us",
                entry.event_id, entry.action, entry.actor, entry.created_at_us
            )?;
        }
        Ok(())
    })
}
