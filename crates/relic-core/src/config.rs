//! Project configuration.
//!
//! Everything lives under a `.relic/` directory next to the data: the
//! SQLite database, the TOML config, and the reparse lock file. Every knob
//! has a default, so a missing config file is equivalent to an empty one.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Data directory created by `relic init`.
pub const DATA_DIR: &str = ".relic";
/// Config file name inside [`DATA_DIR`].
pub const CONFIG_FILE: &str = "config.toml";
/// Maintenance lock file name inside [`DATA_DIR`].
pub const LOCK_FILE: &str = "reparse.lock";

/// Top-level configuration, deserialized from `.relic/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelicConfig {
    pub dedup: DedupConfig,
    pub visibility: VisibilityConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Lifetime of a dedup cache entry, in seconds.
    pub ttl_secs: u64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self { ttl_secs: 3600 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityConfig {
    /// How long a delayed submission's item is withheld from listings.
    pub delay_hours: u64,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self { delay_hours: 12 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file name inside the data directory.
    pub db_file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_file: "relic.db".to_string(),
        }
    }
}

impl RelicConfig {
    #[must_use]
    pub const fn dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.dedup.ttl_secs)
    }

    #[must_use]
    pub const fn visibility_delay(&self) -> Duration {
        Duration::from_secs(self.visibility.delay_hours * 60 * 60)
    }

    /// Load the config under `root`, falling back to defaults when the file
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn load(root: &Path) -> anyhow::Result<Self> {
        let path = config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("read config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parse config {}", path.display()))
    }

    /// Write this config to `root`, creating the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory or file cannot be written.
    pub fn write(&self, root: &Path) -> anyhow::Result<PathBuf> {
        let dir = data_dir(root);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create data directory {}", dir.display()))?;

        let path = config_path(root);
        let rendered = toml::to_string_pretty(self).context("render config")?;
        std::fs::write(&path, rendered)
            .with_context(|| format!("write config {}", path.display()))?;
        Ok(path)
    }
}

/// `<root>/.relic`
#[must_use]
pub fn data_dir(root: &Path) -> PathBuf {
    root.join(DATA_DIR)
}

/// `<root>/.relic/config.toml`
#[must_use]
pub fn config_path(root: &Path) -> PathBuf {
    data_dir(root).join(CONFIG_FILE)
}

/// `<root>/.relic/<db_file>`
#[must_use]
pub fn db_path(root: &Path, config: &RelicConfig) -> PathBuf {
    data_dir(root).join(&config.store.db_file)
}

/// `<root>/.relic/reparse.lock`
#[must_use]
pub fn lock_path(root: &Path) -> PathBuf {
    data_dir(root).join(LOCK_FILE)
}

/// Whether `relic init` has been run under `root`.
#[must_use]
pub fn is_initialized(root: &Path) -> bool {
    data_dir(root).is_dir()
}

#[cfg(test)]
mod tests {
    use super::{RelicConfig, config_path, db_path, is_initialized, lock_path};
    use std::time::Duration;

    #[test]
    fn defaults_are_sane() {
        let config = RelicConfig::default();
        assert_eq!(config.dedup_ttl(), Duration::from_secs(3600));
        assert_eq!(config.visibility_delay(), Duration::from_secs(12 * 60 * 60));
        assert_eq!(config.store.db_file, "relic.db");
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = RelicConfig::load(dir.path()).expect("load");
        assert_eq!(config, RelicConfig::default());
        assert!(!is_initialized(dir.path()));
    }

    #[test]
    fn write_then_load_roundtrips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = RelicConfig::default();
        config.dedup.ttl_secs = 60;
        config.visibility.delay_hours = 1;

        config.write(dir.path()).expect("write");
        assert!(is_initialized(dir.path()));

        let loaded = RelicConfig::load(dir.path()).expect("load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(super::data_dir(dir.path())).expect("mkdir");
        std::fs::write(config_path(dir.path()), "[dedup]\nttl_secs = 5\n").expect("write");

        let config = RelicConfig::load(dir.path()).expect("load");
        assert_eq!(config.dedup.ttl_secs, 5);
        assert_eq!(config.visibility.delay_hours, 12);
    }

    #[test]
    fn garbled_config_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(super::data_dir(dir.path())).expect("mkdir");
        std::fs::write(config_path(dir.path()), "not = [valid").expect("write");
        assert!(RelicConfig::load(dir.path()).is_err());
    }

    #[test]
    fn paths_nest_under_the_data_dir() {
        let root = std::path::Path::new("/tmp/project");
        let config = RelicConfig::default();
        assert_eq!(
            db_path(root, &config),
            std::path::PathBuf::from("/tmp/project/.relic/relic.db")
        );
        assert!(config_path(root).ends_with(".relic/config.toml"));
        assert!(lock_path(root).ends_with(".relic/reparse.lock"));
    }
}
