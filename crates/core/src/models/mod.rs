//! Shared domain models.

mod card;
mod deck;
mod rarity;

pub use card::{ArtworkInfo, CardRecord, EFFECT_TAG, NON_EFFECT_TAG};
pub use deck::{Deck, DeckSection};
pub use rarity::Rarity;

/// Current wall-clock time as epoch milliseconds, the timestamp unit used by
/// persisted records.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
