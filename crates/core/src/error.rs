//! Domain error types.
//!
//! Business-rule rejections are returned as values so callers can branch on
//! them; filesystem and configuration failures travel as `anyhow::Error`.

use thiserror::Error;

use crate::models::DeckSection;

/// Quantity reduction blocked by deck usage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("card {card_id} is used {in_use} time(s) in decks; cannot reduce quantity to {requested}")]
pub struct InUseError {
    /// Card whose quantity was being changed.
    pub card_id: String,
    /// Copies currently committed to decks.
    pub in_use: u32,
    /// Quantity that was requested.
    pub requested: u32,
}

/// Deck add rejected; the deck is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeckError {
    /// Target section is already at its maximum size.
    #[error("{section} is full ({limit} cards)")]
    Capacity {
        /// Section that was full.
        section: DeckSection,
        /// Maximum size of that section.
        limit: usize,
    },
    /// The deck already holds the maximum number of copies of this card.
    #[error("deck already holds {limit} copies of {card_id}")]
    CopyLimit {
        /// Card that hit the limit.
        card_id: String,
        /// Copies allowed per deck.
        limit: usize,
    },
    /// Extra-deck monsters cannot go in the main deck and vice versa.
    #[error("{card_id} cannot be placed in the {section}")]
    WrongSection {
        /// Card being routed.
        card_id: String,
        /// Section that was requested.
        section: DeckSection,
    },
}

/// Failures of the single active deck editor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    /// Another deck is already open for editing.
    #[error("deck {0} is already being edited")]
    AlreadyEditing(String),
    /// No deck is open for editing.
    #[error("no deck is being edited")]
    NotEditing,
    /// Deck id not present in the deck list.
    #[error("unknown deck {0}")]
    UnknownDeck(String),
    /// Card id not present in the collection.
    #[error("unknown card {0}")]
    UnknownCard(String),
    /// Every owned copy is already allocated.
    #[error("no free copies of {0} left in the collection")]
    Unavailable(String),
    /// The deck rules rejected the change.
    #[error(transparent)]
    Deck(#[from] DeckError),
}

/// Problems normalising an external card lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// Card codes are purely numeric; anything else was misread.
    #[error("card code {0:?} is not a valid number")]
    InvalidCardCode(String),
    /// The lookup carried no artwork, so no print can be built.
    #[error("no artwork available for {0}")]
    NoArtwork(String),
}

/// A persisted record the migrator had to skip.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record {index} skipped: {reason}")]
pub struct MalformedRecord {
    /// Position of the record in the source array.
    pub index: usize,
    /// Why it was unusable.
    pub reason: String,
}
