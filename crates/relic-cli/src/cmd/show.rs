use anyhow::Result;
use clap::Args;
use relic_core::error::ErrorCode;
use relic_core::model::{CanonicalItem, ItemSlug};
use relic_core::store::Store as _;
use std::path::Path;

use super::Project;
use crate::output::{OutputMode, coded_failure, kv, render};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Slug of the canonical item.
    #[arg(value_name = "SLUG")]
    pub slug: String,
}

/// Execute `relic show`: full details for one canonical item.
///
/// # Errors
///
/// A coded failure when the item does not exist; store failures otherwise.
pub fn run_show(args: &ShowArgs, root: &Path, mode: OutputMode) -> Result<()> {
    let project = Project::open(root)?;
    let slug = ItemSlug::new_unchecked(&args.slug);

    let item = project
        .store
        .item(&slug)
        .map_err(|e| coded_failure(ErrorCode::StoreFailure, e))?
        .ok_or_else(|| coded_failure(ErrorCode::ItemNotFound, &slug))?;

    render(mode, &item, render_item)
}

fn render_item(item: &CanonicalItem, w: &mut dyn std::io::Write) -> std::io::Result<()> {
    kv(w, "slug", item.slug.as_str())?;
    kv(w, "name", &item.name)?;
    kv(w, "level", item.level.to_string())?;
    kv(w, "category", &item.category)?;
    if let Some(slot) = &item.slot {
        kv(w, "slot", slot)?;
    }
    if let Some(damage_type) = item.damage_type {
        kv(w, "damage type", damage_type.as_str())?;
    }
    if let Some(avg) = item.avg_damage {
        kv(w, "avg damage", avg.to_string())?;
    }
    if let Some(ac) = item.ac_apply {
        kv(w, "ac apply", ac.to_string())?;
    }
    if let Some(ac) = item.ac_bonus {
        kv(w, "armor class", format!("{ac:+}"))?;
    }
    if let Some(damroll) = item.damroll_bonus {
        kv(w, "damage roll", format!("{damroll:+}"))?;
    }
    for (label, value) in item.stat_mods.entries() {
        kv(w, label, format!("{value:+}"))?;
    }
    if !item.locations.is_empty() {
        kv(w, "locations", item.locations.join(", "))?;
    }
    kv(w, "hidden", if item.hidden { "yes" } else { "no" })?;
    if let Some(visible_after) = item.visible_after_us {
        kv(w, "visible after", format!("{visible_after}us"))?;
    }
    if let Some(first_poster) = &item.first_poster {
        kv(w, "first poster", first_poster)?;
    }
    Ok(())
}
