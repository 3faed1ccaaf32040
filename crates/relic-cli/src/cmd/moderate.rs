use anyhow::Result;
use clap::Args;
use relic_core::error::ErrorCode;
use relic_core::ledger::{LedgerError, VisibilityAction};
use relic_core::model::ItemSlug;
use serde::Serialize;
use std::path::Path;

use super::Project;
use crate::output::{OutputMode, coded_failure, kv, render};

#[derive(Args, Debug)]
pub struct ModerateArgs {
    /// Moderation action: `hide` or `restore`.
    #[arg(value_name = "ACTION")]
    pub action: VisibilityAction,

    /// Slug of the canonical item.
    #[arg(value_name = "SLUG")]
    pub slug: String,

    /// Who is making this decision.
    #[arg(long)]
    pub actor: String,
}

#[derive(Serialize)]
struct ModerateResult {
    event_id: i64,
    slug: String,
    action: String,
    actor: String,
    created_at_us: i64,
}

/// Execute `relic moderate`. The decision is appended to the ledger even
/// when it matches the item's current state.
///
/// # Errors
///
/// A coded failure when the item does not exist; store failures otherwise.
pub fn run_moderate(args: &ModerateArgs, root: &Path, mode: OutputMode) -> Result<()> {
    let project = Project::open(root)?;
    let slug = ItemSlug::new_unchecked(&args.slug);

    let event = project
        .ledger()
        .apply(&slug, args.action, &args.actor)
        .map_err(|e| match e {
            LedgerError::ItemNotFound(slug) => coded_failure(ErrorCode::ItemNotFound, slug),
            LedgerError::Store(e) => coded_failure(ErrorCode::StoreFailure, e),
        })?;

    let result = ModerateResult {
        event_id: event.id,
        slug: event.slug.to_string(),
        action: event.action.to_string(),
        actor: event.actor,
        created_at_us: event.created_at_us,
    };

    render(mode, &result, |r, w| {
        writeln!(w, "Recorded '{}' for item '{}'.", r.action, r.slug)?;
        kv(w, "event", r.event_id.to_string())?;
        kv(w, "actor", &r.actor)
    })
}
