//! Preferred artwork per print, keyed by collection code.

use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::models::ArtworkInfo;

/// Remembers which artwork the user picked for each collection code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtworkPreferences {
    entries: BTreeMap<String, u64>,
}

impl ArtworkPreferences {
    /// Record a choice. Empty codes are ignored.
    pub fn set(&mut self, collection_code: &str, artwork_id: u64) {
        let code = collection_code.trim();
        if code.is_empty() {
            return;
        }
        self.entries.insert(code.to_string(), artwork_id);
    }

    /// Preferred artwork id for a collection code.
    pub fn get(&self, collection_code: &str) -> Option<u64> {
        self.entries.get(collection_code.trim()).copied()
    }

    /// Preferred artwork when listed, else the first one.
    pub fn pick<'a>(&self, artworks: &'a [ArtworkInfo], collection_code: &str) -> Option<&'a ArtworkInfo> {
        self.get(collection_code)
            .and_then(|id| artworks.iter().find(|artwork| artwork.id == id))
            .or_else(|| artworks.first())
    }

    /// Number of stored preferences.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no preference is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Permissive parse of a persisted map. Numeric strings are accepted;
    /// anything else is dropped.
    pub fn from_value(value: &Value) -> Self {
        let mut prefs = Self::default();
        let Some(map) = value.as_object() else {
            return prefs;
        };
        for (code, raw) in map {
            let id = match raw {
                Value::Number(number) => number.as_u64(),
                Value::String(text) => text.trim().parse().ok(),
                _ => None,
            };
            match id {
                Some(id) => prefs.set(code, id),
                None => debug!(code, "dropping unreadable artwork preference"),
            }
        }
        prefs
    }

    /// Load preferences from disk; a missing file yields an empty map.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read artwork preferences {}", path.display()))?;
        let value: Value = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse artwork preferences {}", path.display()))?;
        Ok(Self::from_value(&value))
    }

    /// Persist preferences, creating parent directories if needed.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create preferences directory {}", parent.display())
            })?;
        }

        let serialized =
            serde_json::to_string_pretty(self).context("failed to serialize artwork preferences")?;
        fs::write(path, serialized)
            .with_context(|| format!("failed to write artwork preferences {}", path.display()))
    }
}
