#![warn(clippy::all, missing_docs)]

//! Core domain logic for the cardvault collection manager.
//!
//! This crate hosts the card and deck models, type classification,
//! legacy-data migration, print identity, copy allocation, deck building,
//! catalogue lookup projection, configuration and persistence used by the
//! terminal UI.

pub mod allocation;
pub mod classify;
pub mod config;
pub mod deck;
pub mod error;
pub mod export;
pub mod identity;
pub mod lookup;
pub mod migrate;
pub mod models;
pub mod prefs;
pub mod query;
pub mod storage;
pub mod store;

pub use config::AppConfig;
pub use deck::{DeckEditor, DeckRules};
pub use error::{DeckError, EditorError, InUseError, LookupError};
pub use identity::IncomingCard;
pub use models::{ArtworkInfo, CardRecord, Deck, DeckSection, Rarity};
pub use prefs::ArtworkPreferences;
pub use storage::StorageManager;
pub use store::{CollectionStore, PersistenceSink, SharedStore, Snapshot};
