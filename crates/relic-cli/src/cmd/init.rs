use anyhow::{Context as _, Result};
use clap::Args;
use relic_core::config::{self, RelicConfig};
use relic_core::store::SqliteStore;
use serde::Serialize;
use std::path::Path;

use crate::output::{OutputMode, kv, render};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Force re-initialization even if `.relic/` already exists.
    #[arg(long)]
    pub force: bool,
}

#[derive(Serialize)]
struct InitResult {
    data_dir: String,
    config: String,
    database: String,
}

/// Execute `relic init`. Creates the project skeleton:
///
/// ```text
/// .relic/
///   config.toml    (default project config)
///   relic.db       (SQLite store, migrated to the latest schema)
/// ```
///
/// # Errors
///
/// Returns an error if `.relic/` already exists and `--force` is not set,
/// or if the config or database cannot be created.
pub fn run_init(args: &InitArgs, root: &Path, mode: OutputMode) -> Result<()> {
    if config::is_initialized(root) && !args.force {
        anyhow::bail!(".relic/ already exists. Use `relic init --force` to reinitialize.");
    }

    let config = RelicConfig::default();
    let config_path = config.write(root).context("write default config")?;

    let db_path = config::db_path(root, &config);
    SqliteStore::open(&db_path).context("create database")?;

    let result = InitResult {
        data_dir: config::data_dir(root).display().to_string(),
        config: config_path.display().to_string(),
        database: db_path.display().to_string(),
    };

    render(mode, &result, |r, w| {
        writeln!(w, "Initialized relic project.")?;
        kv(w, "data dir", &r.data_dir)?;
        kv(w, "config", &r.config)?;
        kv(w, "database", &r.database)
    })
}
