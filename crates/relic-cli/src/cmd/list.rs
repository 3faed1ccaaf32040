use anyhow::Result;
use clap::Args;
use relic_core::error::ErrorCode;
use relic_core::model::CanonicalItem;
use relic_core::store::Store as _;
use relic_core::time::now_us;
use std::path::Path;

use super::Project;
use crate::output::{OutputMode, coded_failure, render};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Include hidden and still-embargoed items.
    #[arg(long)]
    pub hidden: bool,
}

/// Execute `relic list`.
///
/// The default view is what a player would see: hidden items and items
/// still inside a delayed-visibility window are withheld unless `--hidden`
/// is passed.
///
/// # Errors
///
/// Store failures.
pub fn run_list(args: &ListArgs, root: &Path, mode: OutputMode) -> Result<()> {
    let project = Project::open(root)?;

    let mut items = project
        .store
        .list_items(args.hidden)
        .map_err(|e| coded_failure(ErrorCode::StoreFailure, e))?;

    if !args.hidden {
        let now = now_us();
        items.retain(|item| item.visible_after_us.is_none_or(|at| at <= now));
    }

    render(mode, &items, |items, w| {
        if items.is_empty() {
            writeln!(w, "No items.")?;
            return Ok(());
        }
        for item in items {
            writeln!(w, "{}", row(item))?;
        }
        Ok(())
    })
}

fn row(item: &CanonicalItem) -> String {
    let mut line = format!(
        "{:<28} lvl {:>3}  {:<14} {}",
        item.slug.as_str(),
        item.level,
        item.category,
        item.name
    );
    if item.hidden {
        line.push_str("  [hidden]");
    }
    line
}
