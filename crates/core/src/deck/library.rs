use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use tracing::info;

use crate::models::{now_millis, CardRecord, Deck};

/// Name given to freshly created decks.
pub const NEW_DECK_NAME: &str = "New Deck";

/// Cards shown on a deck tile.
pub const PREVIEW_SIZE: usize = 4;

static DECK_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Short unique id: base-36 timestamp followed by a base-36 sequence number.
pub fn generate_deck_id(now: i64) -> String {
    let sequence = DECK_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{}{}", to_base36(now.max(0) as u64), to_base36(sequence))
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Empty deck named [`NEW_DECK_NAME`] with a generated id.
pub fn create_deck(now: i64) -> Deck {
    Deck::new(generate_deck_id(now), NEW_DECK_NAME, now)
}

/// Stamp `dateUpdated` and replace the deck with the same id, or append.
/// There is no legality gate; see [`super::DeckRules::validate`].
pub fn save_deck(decks: &[Deck], deck: Deck) -> Vec<Deck> {
    save_deck_at(decks, deck, now_millis())
}

/// [`save_deck`] with an explicit clock.
pub fn save_deck_at(decks: &[Deck], mut deck: Deck, now: i64) -> Vec<Deck> {
    deck.date_updated = now;
    let mut updated = decks.to_vec();
    match updated.iter_mut().find(|existing| existing.id == deck.id) {
        Some(existing) => *existing = deck,
        None => {
            info!(deck = %deck.name, "created deck");
            updated.push(deck);
        }
    }
    updated
}

/// Remove a deck by id. Unknown ids leave the list unchanged.
pub fn delete_deck(decks: &[Deck], deck_id: &str) -> Vec<Deck> {
    decks.iter().filter(|deck| deck.id != deck_id).cloned().collect()
}

/// What a deck list shows for one deck.
#[derive(Debug, Clone, PartialEq)]
pub struct DeckSummary {
    /// Deck id.
    pub id: String,
    /// Deck name.
    pub name: String,
    /// Cards in the main deck.
    pub main_count: usize,
    /// Cards in the extra deck.
    pub extra_count: usize,
    /// Cards in the side deck.
    pub side_count: usize,
    /// First resolvable cards of main then extra deck.
    pub preview: Vec<CardRecord>,
    /// Last save, epoch milliseconds.
    pub date_updated: i64,
}

impl DeckSummary {
    /// Summarise `deck`; dangling references are skipped in the preview.
    pub fn build(deck: &Deck, collection: &[CardRecord]) -> Self {
        let by_id: HashMap<&str, &CardRecord> =
            collection.iter().map(|card| (card.id.as_str(), card)).collect();
        let preview = deck
            .main_deck
            .iter()
            .chain(deck.extra_deck.iter())
            .filter_map(|id| by_id.get(id.as_str()).map(|card| (*card).clone()))
            .take(PREVIEW_SIZE)
            .collect();

        Self {
            id: deck.id.clone(),
            name: deck.name.clone(),
            main_count: deck.main_deck.len(),
            extra_count: deck.extra_deck.len(),
            side_count: deck.side_deck.len(),
            preview,
            date_updated: deck.date_updated,
        }
    }
}
