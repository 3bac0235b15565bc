use std::collections::HashMap;

use tracing::{debug, info};

use super::{compute_availability, home_section, library, remove_card_from_deck, DeckRules};
use crate::{
    error::EditorError,
    identity,
    models::{CardRecord, Deck, DeckSection},
};

/// Where the single deck editor currently is.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum EditorState {
    /// Nothing is being edited.
    #[default]
    Idle,
    /// A deck is open; `original` is the snapshot taken when editing began.
    Editing {
        /// Deck as it was when the session started.
        original: Deck,
        /// Working copy.
        draft: Deck,
    },
}

/// The one active deck editing session.
#[derive(Debug, Clone, Default)]
pub struct DeckEditor {
    state: EditorState,
    rules: DeckRules,
}

impl DeckEditor {
    /// Idle editor enforcing `rules`.
    pub fn new(rules: DeckRules) -> Self {
        Self {
            state: EditorState::Idle,
            rules,
        }
    }

    /// Limits enforced on adds.
    pub fn rules(&self) -> &DeckRules {
        &self.rules
    }

    /// Current session state.
    pub fn state(&self) -> &EditorState {
        &self.state
    }

    /// Whether a deck is open.
    pub fn is_editing(&self) -> bool {
        matches!(self.state, EditorState::Editing { .. })
    }

    /// Working copy of the open deck.
    pub fn draft(&self) -> Option<&Deck> {
        match &self.state {
            EditorState::Editing { draft, .. } => Some(draft),
            EditorState::Idle => None,
        }
    }

    /// Snapshot of the open deck at the start of the session.
    pub fn original(&self) -> Option<&Deck> {
        match &self.state {
            EditorState::Editing { original, .. } => Some(original),
            EditorState::Idle => None,
        }
    }

    /// Whether the draft differs from its snapshot.
    pub fn is_dirty(&self) -> bool {
        match &self.state {
            EditorState::Editing { original, draft } => original != draft,
            EditorState::Idle => false,
        }
    }

    /// Open `deck` for editing.
    pub fn begin(&mut self, deck: Deck) -> Result<(), EditorError> {
        if let EditorState::Editing { draft, .. } = &self.state {
            return Err(EditorError::AlreadyEditing(draft.id.clone()));
        }
        debug!(deck = %deck.id, "editing deck");
        self.state = EditorState::Editing {
            original: deck.clone(),
            draft: deck,
        };
        Ok(())
    }

    /// Open a fresh, unsaved deck.
    pub fn begin_new(&mut self, now: i64) -> Result<&Deck, EditorError> {
        self.begin(library::create_deck(now))?;
        self.draft().ok_or(EditorError::NotEditing)
    }

    fn draft_mut(&mut self) -> Result<&mut Deck, EditorError> {
        match &mut self.state {
            EditorState::Editing { draft, .. } => Ok(draft),
            EditorState::Idle => Err(EditorError::NotEditing),
        }
    }

    /// Add one copy of `card` to its home section. Refused when every owned
    /// copy is already allocated to other decks or the draft.
    pub fn add_card(&mut self, card: &CardRecord, decks: &[Deck]) -> Result<DeckSection, EditorError> {
        let section = home_section(card);
        self.add_card_to_section(card, section, decks)?;
        Ok(section)
    }

    /// Add one copy of `card` to an explicit section.
    pub fn add_card_to_section(
        &mut self,
        card: &CardRecord,
        section: DeckSection,
        decks: &[Deck],
    ) -> Result<(), EditorError> {
        let rules = self.rules;
        let draft = self.draft_mut()?;
        let free = compute_availability(std::slice::from_ref(card), decks, Some(&*draft))
            .get(&card.id)
            .copied()
            .unwrap_or(0);
        if free == 0 {
            return Err(EditorError::Unavailable(card.id.clone()));
        }
        *draft = rules.add_card_to_section(draft, card, section)?;
        Ok(())
    }

    /// Remove the last copy of `card_id` from `section`.
    pub fn remove_card(&mut self, card_id: &str, section: DeckSection) -> Result<(), EditorError> {
        let draft = self.draft_mut()?;
        *draft = remove_card_from_deck(draft, card_id, section);
        Ok(())
    }

    /// Rename the draft. Blank names fall back to the default deck name.
    pub fn rename(&mut self, name: &str) -> Result<(), EditorError> {
        let draft = self.draft_mut()?;
        let trimmed = name.trim();
        draft.name = if trimmed.is_empty() {
            library::NEW_DECK_NAME.to_string()
        } else {
            trimmed.to_string()
        };
        Ok(())
    }

    /// Free copies per print, counting the draft in place of its saved version.
    pub fn availability(&self, collection: &[CardRecord], decks: &[Deck]) -> HashMap<String, u32> {
        compute_availability(collection, decks, self.draft())
    }

    /// Saved decks with the draft standing in for its saved version.
    pub fn decks_with_draft(&self, decks: &[Deck]) -> Vec<Deck> {
        let Some(draft) = self.draft() else {
            return decks.to_vec();
        };
        decks
            .iter()
            .filter(|deck| deck.id != draft.id)
            .chain(std::iter::once(draft))
            .cloned()
            .collect()
    }

    /// Point every slot holding `from` at `to`, in both the draft and its
    /// snapshot. Used when a print is renamed by an artwork change.
    pub fn rewrite_references(&mut self, from: &str, to: &str) {
        if let EditorState::Editing { original, draft } = &mut self.state {
            *original = identity::rewrite_references(original, from, to);
            *draft = identity::rewrite_references(draft, from, to);
            debug!(deck = %draft.id, from, to, "rewrote open deck references");
        }
    }

    /// Close the session and write the draft into `decks`.
    pub fn save(&mut self, decks: &[Deck], now: i64) -> Result<(Vec<Deck>, Deck), EditorError> {
        let EditorState::Editing { draft, .. } = std::mem::take(&mut self.state) else {
            return Err(EditorError::NotEditing);
        };
        let mut saved = draft;
        saved.date_updated = now;
        let updated = library::save_deck_at(decks, saved.clone(), now);
        info!(deck = %saved.name, cards = saved.total_cards(), "saved deck");
        Ok((updated, saved))
    }

    /// Close the session, discarding the draft. Returns the untouched snapshot.
    pub fn cancel(&mut self) -> Result<Deck, EditorError> {
        match std::mem::take(&mut self.state) {
            EditorState::Editing { original, .. } => {
                debug!(deck = %original.id, "discarded deck edits");
                Ok(original)
            }
            EditorState::Idle => Err(EditorError::NotEditing),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::tests::card;

    #[test]
    fn only_one_session_at_a_time() {
        let mut editor = DeckEditor::default();
        editor.begin(Deck::new("d1", "A", 0)).unwrap();
        assert_eq!(
            editor.begin(Deck::new("d2", "B", 0)),
            Err(EditorError::AlreadyEditing("d1".to_string()))
        );
        editor.cancel().unwrap();
        assert_eq!(editor.cancel(), Err(EditorError::NotEditing));
        assert!(!editor.is_editing());
    }

    #[test]
    fn adds_are_bounded_by_free_copies() {
        let target = card("a", 2);
        let mut other = Deck::new("other", "Other", 0);
        other.main_deck = vec!["a".into()];
        let decks = vec![other];

        let mut editor = DeckEditor::default();
        editor.begin(Deck::new("d1", "Mine", 0)).unwrap();
        assert_eq!(editor.add_card(&target, &decks), Ok(DeckSection::Main));
        assert_eq!(
            editor.add_card(&target, &decks),
            Err(EditorError::Unavailable("a".to_string()))
        );
        assert_eq!(editor.availability(&[target], &decks)["a"], 0);
    }

    #[test]
    fn rule_rejections_leave_draft_unchanged() {
        let target = card("a", 10);
        let mut editor = DeckEditor::default();
        editor.begin(Deck::new("d1", "Mine", 0)).unwrap();
        for _ in 0..3 {
            editor.add_card(&target, &[]).unwrap();
        }
        let before = editor.draft().cloned();
        let err = editor.add_card(&target, &[]).unwrap_err();
        assert!(matches!(err, EditorError::Deck(_)));
        assert_eq!(editor.draft().cloned(), before);
    }

    #[test]
    fn save_stamps_and_returns_to_idle() {
        let target = card("a", 3);
        let saved_deck = Deck::new("d1", "Mine", 0);
        let decks = vec![saved_deck.clone()];

        let mut editor = DeckEditor::default();
        editor.begin(saved_deck).unwrap();
        editor.add_card(&target, &decks).unwrap();
        editor.rename("  Warriors ").unwrap();
        assert!(editor.is_dirty());

        let (decks, saved) = editor.save(&decks, 99).unwrap();
        assert_eq!(decks.len(), 1);
        assert_eq!(saved.name, "Warriors");
        assert_eq!(saved.date_updated, 99);
        assert_eq!(saved.main_deck, vec!["a"]);
        assert!(!editor.is_editing());
        assert_eq!(editor.save(&decks, 100).unwrap_err(), EditorError::NotEditing);
    }

    #[test]
    fn draft_counts_in_place_of_saved_deck() {
        let mut saved = Deck::new("d1", "Mine", 0);
        saved.main_deck = vec!["a".into()];
        let decks = vec![saved.clone(), Deck::new("d2", "Other", 0)];

        let mut editor = DeckEditor::default();
        assert_eq!(editor.decks_with_draft(&decks), decks);

        editor.begin(saved).unwrap();
        editor.add_card(&card("a", 3), &decks).unwrap();
        let merged = editor.decks_with_draft(&decks);
        assert_eq!(merged.len(), 2);
        let open = merged.iter().find(|deck| deck.id == "d1").unwrap();
        assert_eq!(open.main_deck, vec!["a", "a"]);
    }

    #[test]
    fn renamed_print_is_rewritten_in_open_deck() {
        let mut saved = Deck::new("d1", "Mine", 0);
        saved.main_deck = vec!["old".into()];
        let mut editor = DeckEditor::default();
        editor.begin(saved).unwrap();
        editor.add_card_to_section(&card("old", 2), DeckSection::Side, &[]).unwrap();

        editor.rewrite_references("old", "new");
        let draft = editor.draft().unwrap();
        assert_eq!(draft.main_deck, vec!["new"]);
        assert_eq!(draft.side_deck, vec!["new"]);
        assert_eq!(editor.original().unwrap().main_deck, vec!["new"]);
        assert_eq!(editor.cancel().unwrap().main_deck, vec!["new"]);
    }

    #[test]
    fn cancel_returns_snapshot() {
        let mut editor = DeckEditor::default();
        editor.begin_new(5).unwrap();
        editor.rename("").unwrap();
        editor.add_card(&card("a", 1), &[]).unwrap();
        let original = editor.cancel().unwrap();
        assert!(original.main_deck.is_empty());
        assert_eq!(original.name, library::NEW_DECK_NAME);
    }
}
