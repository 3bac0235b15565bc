use std::collections::HashMap;

use crate::{
    allocation::usage,
    models::{CardRecord, Deck},
};

/// Free copies per print while `editing` is open.
///
/// The saved version of the edited deck is replaced by the draft, so the
/// result is `total - usage in other decks - usage in the draft`.
pub fn compute_availability(
    collection: &[CardRecord],
    decks: &[Deck],
    editing: Option<&Deck>,
) -> HashMap<String, u32> {
    let editing_id = editing.map(|deck| deck.id.as_str());
    let mut used = usage(decks.iter().filter(|deck| Some(deck.id.as_str()) != editing_id));
    if let Some(draft) = editing {
        for id in draft.all_slots() {
            *used.entry(id.clone()).or_insert(0) += 1;
        }
    }

    collection
        .iter()
        .map(|card| {
            let allocated = used.get(&card.id).copied().unwrap_or(0);
            (card.id.clone(), card.quantity.saturating_sub(allocated))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::tests::card;

    #[test]
    fn draft_replaces_saved_version() {
        let collection = vec![card("a", 3), card("b", 1)];
        let mut saved = Deck::new("d1", "Mine", 0);
        saved.main_deck = vec!["a".into(), "a".into()];
        let mut other = Deck::new("d2", "Other", 0);
        other.main_deck = vec!["a".into()];
        let decks = vec![saved.clone(), other];

        let idle = compute_availability(&collection, &decks, None);
        assert_eq!(idle["a"], 0);

        let mut draft = saved;
        draft.main_deck.pop();
        let editing = compute_availability(&collection, &decks, Some(&draft));
        assert_eq!(editing["a"], 1);
        assert_eq!(editing["b"], 1);
    }

    #[test]
    fn unsaved_new_deck_counts_its_draft() {
        let collection = vec![card("a", 2)];
        let mut draft = Deck::new("new", "New Deck", 0);
        draft.side_deck = vec!["a".into()];
        let availability = compute_availability(&collection, &[], Some(&draft));
        assert_eq!(availability["a"], 1);
    }
}
