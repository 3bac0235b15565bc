//! Layered application configuration.
//!
//! Built-in defaults, then `<config_dir>/cardvault/config.json`, then
//! `CARDVAULT__*` environment variables (`CARDVAULT__DECK_RULES__MAIN_MAX=50`).

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{deck::DeckRules, query::SortOrder};

/// Directory name under the platform config and data directories.
pub const APP_DIR: &str = "cardvault";
/// File name of the JSON config file.
pub const CONFIG_FILE: &str = "config.json";
/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "CARDVAULT";

/// Runtime settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where the collection snapshot and artwork preferences live.
    pub data_dir: PathBuf,
    /// Where backup envelopes and CSV exports are written.
    pub backup_dir: PathBuf,
    /// Where the binary appends its log file.
    pub log_dir: PathBuf,
    /// Initial sort order of the collection view.
    pub default_sort: SortOrder,
    /// Deck building limits.
    pub deck_rules: DeckRules,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);
        Self {
            backup_dir: data_dir.join("backups"),
            log_dir: data_dir.join("logs"),
            data_dir,
            default_sort: SortOrder::default(),
            deck_rules: DeckRules::default(),
        }
    }
}

impl AppConfig {
    /// Load from the default config path plus environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load from `path` (optional) plus environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = Config::builder()
            .add_source(
                File::from(path.to_path_buf())
                    .format(FileFormat::Json)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        settings
            .try_deserialize()
            .context("failed to deserialize configuration")
    }
}

/// Platform config directory for the application.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Default config file location.
pub fn config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE)
}

/// Write the default config on first run. Returns the config path.
pub fn ensure_default_config() -> Result<PathBuf> {
    ensure_default_config_at(config_path())
}

/// Write the default config to `path` unless a file already exists.
pub fn ensure_default_config_at(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    let serialized = serde_json::to_string_pretty(&AppConfig::default())
        .context("failed to serialize default configuration")?;
    fs::write(path, serialized)
        .with_context(|| format!("failed to write default config {}", path.display()))?;
    info!("wrote default configuration to {}", path.display());
    Ok(path.to_path_buf())
}
