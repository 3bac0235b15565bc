use std::{collections::HashMap, fmt};

use super::DeckRules;
use crate::{
    error::DeckError,
    models::{CardRecord, Deck, DeckSection},
};

/// Section a card is routed to when added without an explicit target.
pub fn home_section(card: &CardRecord) -> DeckSection {
    if card.is_extra_deck() {
        DeckSection::Extra
    } else {
        DeckSection::Main
    }
}

/// Append one copy of `card` to its home section under the default rules.
pub fn add_card_to_deck(deck: &Deck, card: &CardRecord) -> Result<Deck, DeckError> {
    DeckRules::default().add_card(deck, card)
}

/// Append one copy of `card` to `section` under the default rules.
pub fn add_card_to_section(
    deck: &Deck,
    card: &CardRecord,
    section: DeckSection,
) -> Result<Deck, DeckError> {
    DeckRules::default().add_card_to_section(deck, card, section)
}

/// Drop the last occurrence of `card_id` in `section`. Other sections are
/// never touched; a missing id leaves the deck as is.
pub fn remove_card_from_deck(deck: &Deck, card_id: &str, section: DeckSection) -> Deck {
    let mut updated = deck.clone();
    let list = updated.section_mut(section);
    if let Some(index) = list.iter().rposition(|id| id == card_id) {
        list.remove(index);
    }
    updated
}

/// Check a deck against the default rules.
pub fn validate_deck(deck: &Deck, collection: &[CardRecord]) -> Vec<DeckWarning> {
    DeckRules::default().validate(deck, collection)
}

impl DeckRules {
    /// Append one copy of `card` to its home section: extra-deck monsters go
    /// to the extra deck, everything else to the main deck.
    pub fn add_card(&self, deck: &Deck, card: &CardRecord) -> Result<Deck, DeckError> {
        self.add_card_to_section(deck, card, home_section(card))
    }

    /// Append one copy of `card` to `section`. The copy limit is checked
    /// before capacity; on rejection the deck is unchanged.
    pub fn add_card_to_section(
        &self,
        deck: &Deck,
        card: &CardRecord,
        section: DeckSection,
    ) -> Result<Deck, DeckError> {
        if section != DeckSection::Side && section != home_section(card) {
            return Err(DeckError::WrongSection {
                card_id: card.id.clone(),
                section,
            });
        }
        if deck.copies_of(&card.id) >= self.copy_limit {
            return Err(DeckError::CopyLimit {
                card_id: card.id.clone(),
                limit: self.copy_limit,
            });
        }
        let limit = self.limit(section);
        if deck.section(section).len() >= limit {
            return Err(DeckError::Capacity { section, limit });
        }

        let mut updated = deck.clone();
        updated.section_mut(section).push(card.id.clone());
        Ok(updated)
    }

    /// Soft legality report. Saving never depends on this.
    pub fn validate(&self, deck: &Deck, collection: &[CardRecord]) -> Vec<DeckWarning> {
        let mut warnings = Vec::new();

        if deck.main_deck.len() < self.main_min {
            warnings.push(DeckWarning::MainBelowMinimum {
                count: deck.main_deck.len(),
                minimum: self.main_min,
            });
        }
        for section in DeckSection::ALL {
            let count = deck.section(section).len();
            let limit = self.limit(section);
            if count > limit {
                warnings.push(DeckWarning::OverMaximum {
                    section,
                    count,
                    limit,
                });
            }
        }

        let by_id: HashMap<&str, &CardRecord> =
            collection.iter().map(|card| (card.id.as_str(), card)).collect();
        let mut seen: Vec<&str> = Vec::new();
        for section in DeckSection::ALL {
            for id in deck.section(section) {
                let Some(card) = by_id.get(id.as_str()) else {
                    if !seen.contains(&id.as_str()) {
                        warnings.push(DeckWarning::Dangling { card_id: id.clone() });
                        seen.push(id);
                    }
                    continue;
                };
                if section != DeckSection::Side
                    && section != home_section(card)
                    && !seen.contains(&id.as_str())
                {
                    warnings.push(DeckWarning::Misplaced {
                        card_id: id.clone(),
                        section,
                    });
                    seen.push(id);
                }
            }
        }

        let mut counted: Vec<&str> = Vec::new();
        for id in deck.all_slots() {
            if counted.contains(&id.as_str()) {
                continue;
            }
            counted.push(id);
            let copies = deck.copies_of(id);
            if copies > self.copy_limit {
                warnings.push(DeckWarning::CopiesOverLimit {
                    card_id: id.clone(),
                    copies,
                    limit: self.copy_limit,
                });
            }
        }

        warnings
    }
}

/// Non-blocking problems found by [`DeckRules::validate`].
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeckWarning {
    /// Main deck is smaller than the tournament minimum.
    MainBelowMinimum { count: usize, minimum: usize },
    /// A section holds more cards than allowed.
    OverMaximum {
        section: DeckSection,
        count: usize,
        limit: usize,
    },
    /// More copies of one print than the copy limit.
    CopiesOverLimit {
        card_id: String,
        copies: usize,
        limit: usize,
    },
    /// Reference to a print no longer in the collection.
    Dangling { card_id: String },
    /// Extra-deck monster in the main deck or the other way around.
    Misplaced { card_id: String, section: DeckSection },
}

impl fmt::Display for DeckWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeckWarning::MainBelowMinimum { count, minimum } => {
                write!(f, "Main Deck has {count} cards (minimum {minimum})")
            }
            DeckWarning::OverMaximum {
                section,
                count,
                limit,
            } => write!(f, "{section} has {count} cards (maximum {limit})"),
            DeckWarning::CopiesOverLimit {
                card_id,
                copies,
                limit,
            } => write!(f, "{copies} copies of {card_id} (limit {limit})"),
            DeckWarning::Dangling { card_id } => write!(f, "{card_id} is no longer in the collection"),
            DeckWarning::Misplaced { card_id, section } => {
                write!(f, "{card_id} does not belong in the {section}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::tests::card;

    fn extra_card(id: &str) -> CardRecord {
        let mut card = card(id, 3);
        card.display_type = "Synchro Monster".to_string();
        card.type_tags = vec!["Dragon".into(), "Synchro".into(), "Effect".into()];
        card
    }

    #[test]
    fn routes_by_tags() {
        let deck = Deck::new("d", "Deck", 0);
        let deck = add_card_to_deck(&deck, &card("main", 3)).unwrap();
        let deck = add_card_to_deck(&deck, &extra_card("extra")).unwrap();
        assert_eq!(deck.main_deck, vec!["main"]);
        assert_eq!(deck.extra_deck, vec!["extra"]);
    }

    #[test]
    fn copy_limit_spans_sections() {
        let target = card("a", 5);
        let mut deck = Deck::new("d", "Deck", 0);
        deck.main_deck = vec!["a".into(), "a".into()];
        deck.side_deck = vec!["a".into()];

        let err = add_card_to_deck(&deck, &target).unwrap_err();
        assert_eq!(
            err,
            DeckError::CopyLimit {
                card_id: "a".to_string(),
                limit: 3
            }
        );
    }

    #[test]
    fn copy_limit_is_checked_before_capacity() {
        let mut deck = Deck::new("d", "Deck", 0);
        deck.main_deck = (0..60).map(|_| "a".to_string()).collect();
        let err = add_card_to_deck(&deck, &card("a", 99)).unwrap_err();
        assert!(matches!(err, DeckError::CopyLimit { .. }));

        let err = add_card_to_deck(&deck, &card("b", 1)).unwrap_err();
        assert_eq!(
            err,
            DeckError::Capacity {
                section: DeckSection::Main,
                limit: 60
            }
        );
    }

    #[test]
    fn extra_deck_capacity() {
        let mut deck = Deck::new("d", "Deck", 0);
        deck.extra_deck = (0..15).map(|n| format!("x{n}")).collect();
        let err = add_card_to_deck(&deck, &extra_card("new")).unwrap_err();
        assert_eq!(
            err,
            DeckError::Capacity {
                section: DeckSection::Extra,
                limit: 15
            }
        );
    }

    #[test]
    fn explicit_sections_respect_routing() {
        let deck = Deck::new("d", "Deck", 0);
        let err = add_card_to_section(&deck, &extra_card("x"), DeckSection::Main).unwrap_err();
        assert!(matches!(err, DeckError::WrongSection { .. }));

        let deck = add_card_to_section(&deck, &extra_card("x"), DeckSection::Side).unwrap();
        assert_eq!(deck.side_deck, vec!["x"]);
    }

    #[test]
    fn removes_last_occurrence_in_one_section() {
        let mut deck = Deck::new("d", "Deck", 0);
        deck.main_deck = vec!["a".into(), "b".into(), "a".into()];
        deck.side_deck = vec!["a".into()];

        let updated = remove_card_from_deck(&deck, "a", DeckSection::Main);
        assert_eq!(updated.main_deck, vec!["a", "b"]);
        assert_eq!(updated.side_deck, vec!["a"]);

        let untouched = remove_card_from_deck(&deck, "zzz", DeckSection::Main);
        assert_eq!(untouched, deck);
    }

    #[test]
    fn validation_reports_soft_problems() {
        let collection = vec![card("a", 4), extra_card("x")];
        let mut deck = Deck::new("d", "Deck", 0);
        deck.main_deck = vec!["a".into(), "a".into(), "a".into(), "a".into(), "x".into(), "gone".into()];

        let warnings = validate_deck(&deck, &collection);
        assert!(warnings.contains(&DeckWarning::MainBelowMinimum {
            count: 6,
            minimum: 40
        }));
        assert!(warnings.contains(&DeckWarning::CopiesOverLimit {
            card_id: "a".to_string(),
            copies: 4,
            limit: 3
        }));
        assert!(warnings.contains(&DeckWarning::Dangling {
            card_id: "gone".to_string()
        }));
        assert!(warnings.contains(&DeckWarning::Misplaced {
            card_id: "x".to_string(),
            section: DeckSection::Main
        }));
    }
}
