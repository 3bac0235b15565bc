//! Export projections: CSV for spreadsheets, JSON backup envelopes.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    models::{CardRecord, Deck},
    prefs::ArtworkPreferences,
};

/// Envelope version written by [`Backup`].
pub const BACKUP_VERSION: u32 = 1;

/// Prefix of backup file names.
pub const BACKUP_PREFIX: &str = "cardvault-backup-";

const CSV_HEADER: [&str; 19] = [
    "id",
    "cardCode",
    "name",
    "name_pt",
    "type",
    "typeTags",
    "attribute",
    "level",
    "atk",
    "def",
    "description",
    "description_pt",
    "imageUrl",
    "collectionCode",
    "collectionName",
    "releaseDate",
    "rarity",
    "quantity",
    "dateAdded",
];

/// Full application state as written to a backup file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    /// Envelope version.
    pub version: u32,
    /// When the backup was taken.
    pub timestamp: DateTime<Utc>,
    /// Every owned print.
    pub collection: Vec<CardRecord>,
    /// Every saved deck.
    pub decks: Vec<Deck>,
    /// Artwork choices per collection code.
    #[serde(default)]
    pub artwork_prefs: ArtworkPreferences,
}

impl Backup {
    /// Capture the given state at `timestamp`.
    pub fn new(
        collection: &[CardRecord],
        decks: &[Deck],
        artwork_prefs: &ArtworkPreferences,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            version: BACKUP_VERSION,
            timestamp,
            collection: collection.to_vec(),
            decks: decks.to_vec(),
            artwork_prefs: artwork_prefs.clone(),
        }
    }

    /// `cardvault-backup-YYYY-MM-DD-HHMMSS.json`.
    pub fn file_name(&self) -> String {
        format!(
            "{BACKUP_PREFIX}{}.json",
            self.timestamp.format("%Y-%m-%d-%H%M%S")
        )
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize backup")
    }
}

/// One CSV row per print, header first. Tags are joined with `;`.
pub fn collection_to_csv(cards: &[CardRecord]) -> String {
    let mut out = String::new();
    push_row(&mut out, CSV_HEADER.iter().map(|field| field.to_string()));
    for card in cards {
        let optional = |value: &Option<String>| value.clone().unwrap_or_default();
        let number = |value: Option<i64>| value.map(|n| n.to_string()).unwrap_or_default();
        push_row(
            &mut out,
            [
                card.id.clone(),
                card.card_code.clone(),
                card.name.clone(),
                optional(&card.name_pt),
                card.display_type.clone(),
                card.type_tags.join(";"),
                optional(&card.attribute),
                number(card.level.map(i64::from)),
                number(card.atk.map(i64::from)),
                number(card.def.map(i64::from)),
                optional(&card.description),
                optional(&card.description_pt),
                card.image_url.clone(),
                card.collection_code.clone(),
                optional(&card.collection_name),
                optional(&card.release_date),
                card.rarity.to_string(),
                card.quantity.to_string(),
                card.date_added.to_string(),
            ],
        );
    }
    out
}

fn push_row(out: &mut String, fields: impl IntoIterator<Item = String>) {
    for (index, field) in fields.into_iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        out.push_str(&escape_field(&field));
    }
    out.push_str("\r\n");
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
