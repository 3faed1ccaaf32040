use anyhow::Result;
use clap::Args;
use relic_core::error::ErrorCode;
use relic_core::store::Store as _;
use std::path::Path;

use super::Project;
use crate::output::{OutputMode, coded_failure, render};

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Substring matched against item names and modifier text.
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Include hidden items in the results.
    #[arg(long)]
    pub hidden: bool,
}

/// Execute `relic search`: case-insensitive substring search over names
/// and rendered modifier text (`strength +2`, `armor class -5`, ...).
///
/// # Errors
///
/// Store failures.
pub fn run_search(args: &SearchArgs, root: &Path, mode: OutputMode) -> Result<()> {
    let project = Project::open(root)?;

    let mut items = project
        .store
        .search_items(&args.query)
        .map_err(|e| coded_failure(ErrorCode::StoreFailure, e))?;

    if !args.hidden {
        items.retain(|item| !item.hidden);
    }

    render(mode, &items, |items, w| {
        if items.is_empty() {
            writeln!(w, "No items match '{}'.", args.query)?;
            return Ok(());
        }
        for item in items {
            writeln!(w, "{:<28} {}", item.slug.as_str(), item.search_text)?;
        }
        Ok(())
    })
}
