//! The collection store: owns the state and persists every accepted change.
//!
//! Business rejections come back as the inner `Result`; the outer `Result`
//! only fails when the persistence sink does.

use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    allocation::{self, Allocation},
    deck::{self, DeckEditor, DeckRules, DeckSummary},
    error::{EditorError, InUseError},
    identity::{self, IncomingCard},
    migrate::MigratedState,
    models::{now_millis, ArtworkInfo, CardRecord, Deck, DeckSection},
    prefs::ArtworkPreferences,
    query::{visible_cards, CollectionFilter, CollectionStats, SortOrder},
};

/// Whole persisted state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Every owned print.
    pub cards: Vec<CardRecord>,
    /// Every saved deck.
    pub decks: Vec<Deck>,
    /// Artwork choices per collection code.
    #[serde(default)]
    pub artwork_prefs: ArtworkPreferences,
}

/// Receives a full snapshot after every accepted mutation.
pub trait PersistenceSink: Send + Sync {
    /// Store `snapshot`, replacing whatever was stored before.
    fn persist(&self, snapshot: &Snapshot) -> Result<()>;
}

/// Owns cards, decks, artwork preferences and the single deck editor.
pub struct CollectionStore {
    cards: Vec<CardRecord>,
    decks: Vec<Deck>,
    prefs: ArtworkPreferences,
    editor: DeckEditor,
    sink: Box<dyn PersistenceSink>,
}

impl std::fmt::Debug for CollectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionStore")
            .field("cards", &self.cards.len())
            .field("decks", &self.decks.len())
            .field("editing", &self.editor.is_editing())
            .finish()
    }
}

impl CollectionStore {
    /// Store over a migrated state. Nothing is written until the first mutation.
    pub fn new(state: MigratedState, rules: DeckRules, sink: Box<dyn PersistenceSink>) -> Self {
        if !state.skipped.is_empty() {
            warn!(skipped = state.skipped.len(), "some stored records could not be migrated");
        }
        let store = Self {
            cards: state.cards,
            decks: state.decks,
            prefs: state.artwork_prefs,
            editor: DeckEditor::new(rules),
            sink,
        };
        let over = allocation::over_allocations(&store.cards, &store.decks);
        if !over.is_empty() {
            warn!(count = over.len(), "collection holds fewer copies than its decks use");
        }
        store
    }

    /// Every owned print.
    pub fn cards(&self) -> &[CardRecord] {
        &self.cards
    }

    /// Every saved deck.
    pub fn decks(&self) -> &[Deck] {
        &self.decks
    }

    /// Artwork choices per collection code.
    pub fn artwork_prefs(&self) -> &ArtworkPreferences {
        &self.prefs
    }

    /// The deck editor.
    pub fn editor(&self) -> &DeckEditor {
        &self.editor
    }

    /// Collection record by id.
    pub fn card(&self, card_id: &str) -> Option<&CardRecord> {
        self.cards.iter().find(|card| card.id == card_id)
    }

    /// Saved deck by id.
    pub fn deck(&self, deck_id: &str) -> Option<&Deck> {
        self.decks.iter().find(|deck| deck.id == deck_id)
    }

    /// Current state as one value.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            cards: self.cards.clone(),
            decks: self.decks.clone(),
            artwork_prefs: self.prefs.clone(),
        }
    }

    fn persist(&self) -> Result<()> {
        self.sink.persist(&self.snapshot())
    }

    /// Filtered and sorted view of the collection.
    pub fn visible(&self, filter: &CollectionFilter, order: SortOrder) -> Vec<&CardRecord> {
        visible_cards(&self.cards, filter, order)
    }

    /// Header numbers.
    pub fn stats(&self) -> CollectionStats {
        CollectionStats::compute(&self.cards)
    }

    /// Free copies per print, counting the open draft if any.
    pub fn availability(&self) -> HashMap<String, u32> {
        self.editor.availability(&self.cards, &self.decks)
    }

    /// Owned, allocated and free copies per print.
    pub fn allocations(&self) -> Vec<Allocation> {
        allocation::allocation_summary(&self.cards, &self.decks)
    }

    /// Tiles for the deck list.
    pub fn deck_summaries(&self) -> Vec<DeckSummary> {
        self.decks
            .iter()
            .map(|deck| DeckSummary::build(deck, &self.cards))
            .collect()
    }

    /// Add scanned copies and remember the chosen artwork for the print.
    pub fn add_card(&mut self, incoming: IncomingCard) -> Result<String> {
        let id = incoming.id();
        self.prefs.set(&incoming.collection_code, incoming.artwork.id);
        self.cards = identity::upsert_card(&self.cards, incoming);
        self.persist()?;
        Ok(id)
    }

    /// Change the owned quantity of a print. Copies held by the open draft
    /// count as in use.
    pub fn set_quantity(&mut self, card_id: &str, quantity: u32) -> Result<Result<(), InUseError>> {
        let decks = self.editor.decks_with_draft(&self.decks);
        match allocation::set_quantity(&self.cards, &decks, card_id, quantity) {
            Ok(cards) => {
                if cards == self.cards {
                    return Ok(Ok(()));
                }
                self.cards = cards;
                self.persist()?;
                Ok(Ok(()))
            }
            Err(err) => Ok(Err(err)),
        }
    }

    /// Switch a print to another artwork. Returns the id the copies now live under.
    pub fn change_artwork(&mut self, card_id: &str, artwork: &ArtworkInfo) -> Result<String> {
        let Some(collection_code) = self.card(card_id).map(|card| card.collection_code.clone()) else {
            debug!(card_id, "artwork change for unknown card");
            return Ok(card_id.to_string());
        };
        let change = identity::change_artwork(&self.cards, &self.decks, card_id, artwork);
        if change.new_id == card_id {
            return Ok(change.new_id);
        }
        self.cards = change.collection;
        self.decks = change.decks;
        self.editor.rewrite_references(card_id, &change.new_id);
        self.prefs.set(&collection_code, artwork.id);
        self.persist()?;
        Ok(change.new_id)
    }

    /// Open an empty deck in the editor.
    pub fn create_deck(&mut self) -> Result<Deck, EditorError> {
        self.editor.begin_new(now_millis()).cloned()
    }

    /// Open a saved deck in the editor.
    pub fn edit_deck(&mut self, deck_id: &str) -> Result<(), EditorError> {
        let deck = self
            .deck(deck_id)
            .cloned()
            .ok_or_else(|| EditorError::UnknownDeck(deck_id.to_string()))?;
        self.editor.begin(deck)
    }

    /// Add one copy of a collection card to the open deck.
    pub fn editor_add(&mut self, card_id: &str) -> Result<DeckSection, EditorError> {
        let card = self
            .card(card_id)
            .cloned()
            .ok_or_else(|| EditorError::UnknownCard(card_id.to_string()))?;
        self.editor.add_card(&card, &self.decks)
    }

    /// Add one copy of a collection card to the open deck's side deck.
    pub fn editor_add_to_side(&mut self, card_id: &str) -> Result<(), EditorError> {
        let card = self
            .card(card_id)
            .cloned()
            .ok_or_else(|| EditorError::UnknownCard(card_id.to_string()))?;
        self.editor
            .add_card_to_section(&card, DeckSection::Side, &self.decks)
    }

    /// Remove the last copy of `card_id` from a section of the open deck.
    pub fn editor_remove(&mut self, card_id: &str, section: DeckSection) -> Result<(), EditorError> {
        self.editor.remove_card(card_id, section)
    }

    /// Rename the open deck.
    pub fn editor_rename(&mut self, name: &str) -> Result<(), EditorError> {
        self.editor.rename(name)
    }

    /// Discard the open deck's edits.
    pub fn cancel_edit(&mut self) -> Result<Deck, EditorError> {
        self.editor.cancel()
    }

    /// Save the open deck into the deck list.
    pub fn save_deck(&mut self) -> Result<Result<Deck, EditorError>> {
        let (decks, saved) = match self.editor.save(&self.decks, now_millis()) {
            Ok(result) => result,
            Err(err) => return Ok(Err(err)),
        };
        self.decks = decks;
        self.persist()?;
        Ok(Ok(saved))
    }

    /// Delete a saved deck. The deck open in the editor cannot be deleted.
    pub fn delete_deck(&mut self, deck_id: &str) -> Result<Result<(), EditorError>> {
        if self.editor.draft().is_some_and(|draft| draft.id == deck_id) {
            return Ok(Err(EditorError::AlreadyEditing(deck_id.to_string())));
        }
        if self.deck(deck_id).is_none() {
            return Ok(Err(EditorError::UnknownDeck(deck_id.to_string())));
        }
        self.decks = deck::delete_deck(&self.decks, deck_id);
        info!(deck_id, "deleted deck");
        self.persist()?;
        Ok(Ok(()))
    }

    /// Replace everything with an imported state. An open editor is discarded.
    pub fn replace_state(&mut self, state: MigratedState) -> Result<()> {
        if self.editor.is_editing() {
            warn!("discarding open deck edits before import");
            let _ = self.editor.cancel();
        }
        self.cards = state.cards;
        self.decks = state.decks;
        if !state.artwork_prefs.is_empty() {
            self.prefs = state.artwork_prefs;
        }
        info!(cards = self.cards.len(), decks = self.decks.len(), "replaced collection state");
        self.persist()
    }
}

/// A store shared between tasks; writes are serialised by the lock.
#[derive(Debug, Clone)]
pub struct SharedStore {
    inner: Arc<RwLock<CollectionStore>>,
}

impl SharedStore {
    /// Wrap `store` for sharing.
    pub fn new(store: CollectionStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    /// Shared read access.
    pub fn read(&self) -> RwLockReadGuard<'_, CollectionStore> {
        self.inner.read()
    }

    /// Exclusive write access.
    pub fn write(&self) -> RwLockWriteGuard<'_, CollectionStore> {
        self.inner.write()
    }
}
