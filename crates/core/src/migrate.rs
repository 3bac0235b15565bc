//! Normalisation of persisted and imported JSON blobs.
//!
//! Older saves used a different schema (type info in `race`/`subType`, no
//! `typeTags`, no `dateAdded`). Everything that reads stored data goes through
//! here; the rest of the crate only ever sees canonical records.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::{
    classify::{classify_type, TypeInput},
    error::MalformedRecord,
    identity::resolve_identity,
    models::{now_millis, CardRecord, Deck, Rarity},
    prefs::ArtworkPreferences,
};

static ARTWORK_FILE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)\.[A-Za-z]+(?:[?#].*)?$").expect("failed to compile artwork regex")
});

/// Placeholder collection code for prints whose set is unknown.
pub const UNKNOWN_COLLECTION_CODE: &str = "N/A";

/// Cards that survived migration plus the records that had to be skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationReport {
    /// Canonical records.
    pub cards: Vec<CardRecord>,
    /// Entries that could not be turned into a record.
    pub skipped: Vec<MalformedRecord>,
}

/// A full application state recovered from any supported blob shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigratedState {
    /// Canonical records.
    pub cards: Vec<CardRecord>,
    /// Sanitised decks.
    pub decks: Vec<Deck>,
    /// Artwork preferences, empty when the blob carried none.
    pub artwork_prefs: ArtworkPreferences,
    /// Card entries that could not be migrated.
    pub skipped: Vec<MalformedRecord>,
}

/// Migrate a collection blob, discarding the skip report.
pub fn migrate_collection(raw: &Value) -> Vec<CardRecord> {
    migrate_collection_with_report(raw).cards
}

/// Migrate a collection blob and report skipped records.
pub fn migrate_collection_with_report(raw: &Value) -> MigrationReport {
    migrate_collection_at(raw, now_millis())
}

/// [`migrate_collection_with_report`] with an explicit clock.
pub fn migrate_collection_at(raw: &Value, now: i64) -> MigrationReport {
    let Some(entries) = card_array(raw) else {
        warn!("collection blob has no card array; starting empty");
        return MigrationReport::default();
    };

    let objects: Vec<(usize, &Map<String, Value>)> = entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| entry.as_object().map(|object| (index, object)))
        .collect();
    if objects.len() != entries.len() {
        debug!(
            dropped = entries.len() - objects.len(),
            "skipping non-object collection entries"
        );
    }

    let count = objects.len() as i64;
    let mut report = MigrationReport::default();
    for (position, (index, object)) in objects.into_iter().enumerate() {
        let backfill = now - (count - position as i64) * 1000;
        match migrate_card(object, backfill) {
            Ok(card) => merge_duplicate(&mut report.cards, card),
            Err(reason) => {
                warn!(index, %reason, "skipping malformed card record");
                report.skipped.push(MalformedRecord { index, reason });
            }
        }
    }

    info!(
        cards = report.cards.len(),
        skipped = report.skipped.len(),
        "migrated collection"
    );
    report
}

fn card_array(raw: &Value) -> Option<&Vec<Value>> {
    match raw {
        Value::Array(entries) => Some(entries),
        Value::Object(object) => object
            .get("collection")
            .and_then(Value::as_array)
            .or_else(|| object.get("cards").and_then(Value::as_array)),
        _ => None,
    }
}

fn merge_duplicate(cards: &mut Vec<CardRecord>, card: CardRecord) {
    match cards.iter_mut().find(|existing| existing.id == card.id) {
        Some(existing) => {
            debug!(id = %card.id, "merging duplicate record");
            existing.quantity = existing.quantity.saturating_add(card.quantity);
            existing.date_added = existing.date_added.min(card.date_added);
            if existing.collection_name.is_none() {
                existing.collection_name = card.collection_name;
            }
            if existing.release_date.is_none() {
                existing.release_date = card.release_date;
            }
        }
        None => cards.push(card),
    }
}

fn migrate_card(object: &Map<String, Value>, backfill_date: i64) -> Result<CardRecord, String> {
    let name = text(object, "name").ok_or_else(|| "missing name".to_string())?;

    let image_url = text(object, "imageUrl").unwrap_or_default();
    let collection_code =
        text(object, "collectionCode").unwrap_or_else(|| UNKNOWN_COLLECTION_CODE.to_string());
    let rarity = text(object, "rarity")
        .map(|value| Rarity::parse(&value))
        .unwrap_or_default();
    let card_code = text(object, "cardCode").map(|code| pad_card_code(&code));

    let id = match text(object, "id") {
        Some(id) => id,
        None => {
            let artwork_id = artwork_id_from_url(&image_url)
                .or_else(|| card_code.as_deref().and_then(|code| code.parse().ok()))
                .ok_or_else(|| "missing id and no artwork to derive one".to_string())?;
            resolve_identity(&collection_code, &rarity, artwork_id)
        }
    };
    let card_code = card_code
        .or_else(|| artwork_id_from_url(&image_url).map(|id| pad_card_code(&id.to_string())))
        .unwrap_or_default();

    let raw_type = text(object, "type").unwrap_or_default();
    let existing_tags = string_list(object.get("typeTags"));
    let typeline = string_list(object.get("typeline"));
    let race = text(object, "race");
    let sub_type = text(object, "subType");
    let frame_type = text(object, "frameType");
    let classification = classify_type(&TypeInput {
        raw_type: &raw_type,
        existing_tags: &existing_tags,
        race: race.as_deref(),
        sub_type: sub_type.as_deref(),
        frame_type: frame_type.as_deref(),
        typeline: &typeline,
    });

    let quantity = match integer(object, "quantity") {
        None => 1,
        Some(value) => value.clamp(0, i64::from(u32::MAX)) as u32,
    };
    let date_added = integer(object, "dateAdded")
        .filter(|value| *value > 0)
        .unwrap_or(backfill_date);

    Ok(CardRecord {
        id,
        card_code,
        name,
        name_pt: text(object, "name_pt"),
        display_type: classification.display_type,
        type_tags: classification.type_tags,
        attribute: text(object, "attribute"),
        level: integer(object, "level").and_then(|value| u32::try_from(value).ok()),
        atk: integer(object, "atk").and_then(|value| i32::try_from(value).ok()),
        def: integer(object, "def").and_then(|value| i32::try_from(value).ok()),
        description: text(object, "description").or_else(|| text(object, "desc")),
        description_pt: text(object, "description_pt"),
        image_url,
        collection_code,
        collection_name: text(object, "collectionName"),
        release_date: text(object, "releaseDate"),
        rarity,
        quantity,
        date_added,
    })
}

/// Migrate the deck list of a blob (an array, or an object with `decks`).
pub fn migrate_decks(raw: &Value) -> Vec<Deck> {
    migrate_decks_at(raw, now_millis())
}

/// [`migrate_decks`] with an explicit clock.
pub fn migrate_decks_at(raw: &Value, now: i64) -> Vec<Deck> {
    let entries = match raw {
        Value::Array(entries) => entries,
        Value::Object(object) => match object.get("decks").and_then(Value::as_array) {
            Some(entries) => entries,
            None => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    let mut decks = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let Some(object) = entry.as_object() else {
            debug!(index, "skipping non-object deck entry");
            continue;
        };
        let (Some(id), Some(name)) = (text(object, "id"), text(object, "name")) else {
            warn!(index, "skipping deck without id or name");
            continue;
        };
        let date_created = integer(object, "dateCreated").unwrap_or(now);
        decks.push(Deck {
            id,
            name,
            main_deck: string_list(object.get("mainDeck")),
            extra_deck: string_list(object.get("extraDeck")),
            side_deck: string_list(object.get("sideDeck")),
            date_created,
            date_updated: integer(object, "dateUpdated").unwrap_or(date_created),
        });
    }
    decks
}

/// Recover cards, decks and artwork preferences from a persisted snapshot
/// (`{cards, decks}`), a backup envelope (`{collection, decks, artworkPrefs}`)
/// or a bare card array.
pub fn migrate_state(raw: &Value) -> MigratedState {
    migrate_state_at(raw, now_millis())
}

/// [`migrate_state`] with an explicit clock.
pub fn migrate_state_at(raw: &Value, now: i64) -> MigratedState {
    let report = migrate_collection_at(raw, now);
    let (decks, artwork_prefs) = match raw {
        Value::Object(object) => (
            migrate_decks_at(raw, now),
            object
                .get("artworkPrefs")
                .map(ArtworkPreferences::from_value)
                .unwrap_or_default(),
        ),
        _ => (Vec::new(), ArtworkPreferences::default()),
    };
    MigratedState {
        cards: report.cards,
        decks,
        artwork_prefs,
        skipped: report.skipped,
    }
}

/// Parse and migrate raw text. Unparseable input yields an empty state.
pub fn migrate_text(contents: &str) -> MigratedState {
    match serde_json::from_str::<Value>(contents) {
        Ok(value) => migrate_state(&value),
        Err(err) => {
            warn!("stored state is not valid JSON, starting empty: {err}");
            MigratedState::default()
        }
    }
}

/// Left-pad purely numeric card codes to eight digits.
pub fn pad_card_code(code: &str) -> String {
    let code = code.trim();
    if !code.is_empty() && code.chars().all(|ch| ch.is_ascii_digit()) && code.len() < 8 {
        format!("{code:0>8}")
    } else {
        code.to_string()
    }
}

/// Numeric artwork id encoded in an image file name (`.../46986414.jpg`).
pub fn artwork_id_from_url(url: &str) -> Option<u64> {
    ARTWORK_FILE_RE
        .captures(url.trim())
        .and_then(|captures| captures.get(1))
        .and_then(|digits| digits.as_str().parse().ok())
}

fn text(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(value) => {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn integer(object: &Map<String, Value>, key: &str) -> Option<i64> {
    match object.get(key)? {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|value| value.is_finite()).map(|value| value as i64)),
        Value::String(value) => {
            let trimmed = value.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v as i64))
        }
        _ => None,
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
