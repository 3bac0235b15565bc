//! Deck legality, composition and the single deck editor.

mod availability;
mod compose;
mod editor;
mod library;
mod rules;

pub use availability::compute_availability;
pub use compose::{
    add_card_to_deck, add_card_to_section, home_section, remove_card_from_deck, validate_deck,
    DeckWarning,
};
pub use editor::{DeckEditor, EditorState};
pub use library::{
    create_deck, delete_deck, generate_deck_id, save_deck, save_deck_at, DeckSummary,
    NEW_DECK_NAME, PREVIEW_SIZE,
};
pub use rules::DeckRules;
