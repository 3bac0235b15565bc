//! On-disk persistence: the collection snapshot, artwork preferences and backups.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    export::{collection_to_csv, Backup, BACKUP_PREFIX},
    migrate::{migrate_state, migrate_text, MigratedState},
    models::{CardRecord, Deck},
    prefs::ArtworkPreferences,
    store::{PersistenceSink, Snapshot},
};

/// File holding cards and decks.
pub const COLLECTION_FILE: &str = "collection.json";
/// File holding artwork preferences.
pub const PREFS_FILE: &str = "artwork-prefs.json";

/// A backup file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    /// Absolute path of the backup.
    pub path: PathBuf,
    /// Timestamp recorded inside the envelope.
    pub created_at: DateTime<Utc>,
    /// Prints in the backup.
    pub prints: usize,
    /// Decks in the backup.
    pub decks: usize,
}

#[derive(Serialize)]
struct StoredCollection<'a> {
    cards: &'a [CardRecord],
    decks: &'a [Deck],
}

/// Reads and writes application state under the configured directories.
#[derive(Debug, Clone)]
pub struct StorageManager {
    data_dir: PathBuf,
    backup_dir: PathBuf,
}

impl StorageManager {
    /// Manager rooted at explicit directories.
    pub fn new(data_dir: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            backup_dir: backup_dir.into(),
        }
    }

    /// Manager using the configured directories.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.data_dir, &config.backup_dir)
    }

    /// Path of the collection snapshot.
    pub fn collection_path(&self) -> PathBuf {
        self.data_dir.join(COLLECTION_FILE)
    }

    /// Path of the artwork preferences.
    pub fn prefs_path(&self) -> PathBuf {
        self.data_dir.join(PREFS_FILE)
    }

    /// Directory backups are written to.
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Load the stored state. Missing files give an empty state; unreadable
    /// contents are logged and treated as empty.
    pub fn load_state(&self) -> Result<MigratedState> {
        let path = self.collection_path();
        let mut state = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            migrate_text(&contents)
        } else {
            MigratedState::default()
        };

        if state.artwork_prefs.is_empty() {
            state.artwork_prefs = match ArtworkPreferences::load(self.prefs_path()) {
                Ok(prefs) => prefs,
                Err(err) => {
                    warn!("ignoring unreadable artwork preferences: {err:#}");
                    ArtworkPreferences::default()
                }
            };
        }

        info!(
            cards = state.cards.len(),
            decks = state.decks.len(),
            skipped = state.skipped.len(),
            "loaded collection"
        );
        Ok(state)
    }

    /// Write cards and decks atomically, then the artwork preferences.
    pub fn write_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let stored = StoredCollection {
            cards: &snapshot.cards,
            decks: &snapshot.decks,
        };
        let serialized =
            serde_json::to_vec_pretty(&stored).context("failed to serialize collection")?;
        write_atomic(&self.collection_path(), &serialized)?;
        snapshot.artwork_prefs.persist(self.prefs_path())
    }

    /// Return all backups sorted by timestamp (most recent first).
    pub fn backups(&self) -> Result<Vec<BackupEntry>> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.backup_dir).context("failed to read backup directory")? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            let is_backup = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(BACKUP_PREFIX) && name.ends_with(".json"));
            if !is_backup {
                continue;
            }

            match read_backup(&path) {
                Ok(backup) => entries.push(BackupEntry {
                    path,
                    created_at: backup.timestamp,
                    prints: backup.collection.len(),
                    decks: backup.decks.len(),
                }),
                Err(err) => {
                    warn!("Failed to read backup {:?}: {err}", path);
                }
            }
        }

        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    /// Write a backup envelope into the backup directory.
    pub fn export_backup(&self, backup: &Backup) -> Result<BackupEntry> {
        let path = self.backup_dir.join(backup.file_name());
        write_atomic(&path, backup.to_json()?.as_bytes())?;
        info!("wrote backup {}", path.display());
        Ok(BackupEntry {
            path,
            created_at: backup.timestamp,
            prints: backup.collection.len(),
            decks: backup.decks.len(),
        })
    }

    /// Write the collection as CSV into the backup directory.
    pub fn export_csv(&self, cards: &[CardRecord], at: DateTime<Utc>) -> Result<PathBuf> {
        let path = self
            .backup_dir
            .join(format!("cardvault-collection-{}.csv", at.format("%Y-%m-%d-%H%M%S")));
        write_atomic(&path, collection_to_csv(cards).as_bytes())?;
        info!("wrote csv export {}", path.display());
        Ok(path)
    }

    /// Read any supported blob (backup envelope, snapshot or bare card array).
    pub fn import_file(&self, path: impl AsRef<Path>) -> Result<MigratedState> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let value: Value = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        if !has_collection(&value) {
            return Err(anyhow!(
                "{} does not contain collection data",
                path.display()
            ));
        }
        let state = migrate_state(&value);
        info!(
            cards = state.cards.len(),
            decks = state.decks.len(),
            skipped = state.skipped.len(),
            "imported {}",
            path.display()
        );
        Ok(state)
    }
}

impl PersistenceSink for StorageManager {
    fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        self.write_snapshot(snapshot)
    }
}

fn has_collection(value: &Value) -> bool {
    match value {
        Value::Array(_) => true,
        Value::Object(object) => ["collection", "cards"]
            .iter()
            .any(|key| object.get(*key).is_some_and(Value::is_array)),
        _ => false,
    }
}

fn read_backup(path: &Path) -> Result<Backup> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let backup = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(backup)
}

/// Write via a temp file in the target directory, then rename over `path`.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow!("{} has no parent directory", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;

    let mut file = NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
    file.write_all(contents)
        .with_context(|| format!("failed to write {}", path.display()))?;
    file.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::tests::card;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::tempdir;

    fn manager(root: &Path) -> StorageManager {
        StorageManager::new(root.join("data"), root.join("backups"))
    }

    fn snapshot() -> Snapshot {
        let mut prefs = ArtworkPreferences::default();
        prefs.set("SET-001", 7);
        let mut deck = Deck::new("d1", "Warriors", 1);
        deck.main_deck = vec!["SET-001-Common-1".to_string()];
        Snapshot {
            cards: vec![card("SET-001-Common-1", 2)],
            decks: vec![deck],
            artwork_prefs: prefs,
        }
    }

    #[test]
    fn empty_directory_loads_empty_state() -> Result<()> {
        let dir = tempdir()?;
        let state = manager(dir.path()).load_state()?;
        assert!(state.cards.is_empty());
        assert!(state.decks.is_empty());
        Ok(())
    }

    #[test]
    fn snapshot_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let storage = manager(dir.path());
        let snapshot = snapshot();
        storage.persist(&snapshot)?;

        let state = storage.load_state()?;
        assert_eq!(state.cards, snapshot.cards);
        assert_eq!(state.decks, snapshot.decks);
        assert_eq!(state.artwork_prefs.get("SET-001"), Some(7));
        Ok(())
    }

    #[test]
    fn corrupt_snapshot_yields_empty_state() -> Result<()> {
        let dir = tempdir()?;
        let storage = manager(dir.path());
        fs::create_dir_all(dir.path().join("data"))?;
        fs::write(storage.collection_path(), "{ definitely not json")?;
        fs::write(storage.prefs_path(), "[]")?;

        let state = storage.load_state()?;
        assert!(state.cards.is_empty());
        assert!(state.artwork_prefs.is_empty());
        Ok(())
    }

    #[test]
    fn backups_are_listed_newest_first() -> Result<()> {
        let dir = tempdir()?;
        let storage = manager(dir.path());
        let snap = snapshot();
        let older = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        storage.export_backup(&Backup::new(&snap.cards, &[], &snap.artwork_prefs, older))?;
        storage.export_backup(&Backup::new(&snap.cards, &snap.decks, &snap.artwork_prefs, newer))?;
        fs::write(storage.backup_dir().join("cardvault-backup-broken.json"), "nope")?;
        fs::write(storage.backup_dir().join("notes.txt"), "ignored")?;

        let entries = storage.backups()?;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].created_at, newer);
        assert_eq!(entries[0].decks, 1);

        let restored = storage.import_file(&entries[0].path)?;
        assert_eq!(restored.cards, snap.cards);
        assert_eq!(restored.artwork_prefs, snap.artwork_prefs);
        Ok(())
    }

    #[test]
    fn import_rejects_files_without_cards() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("other.json");
        fs::write(&path, serde_json::to_string(&json!({"settings": {}}))?)?;
        assert!(manager(dir.path()).import_file(&path).is_err());

        fs::write(&path, serde_json::to_string(&json!([{"id": "x", "name": "Raigeki", "type": "Spell Card"}]))?)?;
        let state = manager(dir.path()).import_file(&path)?;
        assert_eq!(state.cards.len(), 1);
        Ok(())
    }

    #[test]
    fn csv_export_lands_in_backup_dir() -> Result<()> {
        let dir = tempdir()?;
        let storage = manager(dir.path());
        let at = Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap();
        let path = storage.export_csv(&snapshot().cards, at)?;
        assert!(path.starts_with(storage.backup_dir()));
        assert!(fs::read_to_string(path)?.starts_with("id,"));
        Ok(())
    }
}
