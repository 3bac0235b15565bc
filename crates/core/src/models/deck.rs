#![allow(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};

/// A user deck. Lists hold weak references (card ids) into the collection;
/// a repeated id is one more physical copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub main_deck: Vec<String>,
    #[serde(default)]
    pub extra_deck: Vec<String>,
    #[serde(default)]
    pub side_deck: Vec<String>,
    pub date_created: i64,
    pub date_updated: i64,
}

impl Deck {
    /// Empty deck stamped with `now` for both timestamps.
    pub fn new(id: impl Into<String>, name: impl Into<String>, now: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            main_deck: Vec::new(),
            extra_deck: Vec::new(),
            side_deck: Vec::new(),
            date_created: now,
            date_updated: now,
        }
    }

    pub fn section(&self, section: DeckSection) -> &[String] {
        match section {
            DeckSection::Main => &self.main_deck,
            DeckSection::Extra => &self.extra_deck,
            DeckSection::Side => &self.side_deck,
        }
    }

    pub fn section_mut(&mut self, section: DeckSection) -> &mut Vec<String> {
        match section {
            DeckSection::Main => &mut self.main_deck,
            DeckSection::Extra => &mut self.extra_deck,
            DeckSection::Side => &mut self.side_deck,
        }
    }

    /// Every card slot across main, extra and side, in that order.
    pub fn all_slots(&self) -> impl Iterator<Item = &String> {
        self.main_deck
            .iter()
            .chain(self.extra_deck.iter())
            .chain(self.side_deck.iter())
    }

    /// Copies of `card_id` across all three sections.
    pub fn copies_of(&self, card_id: &str) -> usize {
        self.all_slots().filter(|id| id.as_str() == card_id).count()
    }

    pub fn total_cards(&self) -> usize {
        self.main_deck.len() + self.extra_deck.len() + self.side_deck.len()
    }
}

/// The three lists of a deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeckSection {
    #[serde(rename = "mainDeck")]
    Main,
    #[serde(rename = "extraDeck")]
    Extra,
    #[serde(rename = "sideDeck")]
    Side,
}

impl DeckSection {
    pub const ALL: [DeckSection; 3] = [DeckSection::Main, DeckSection::Extra, DeckSection::Side];

    pub fn label(&self) -> &'static str {
        match self {
            DeckSection::Main => "Main Deck",
            DeckSection::Extra => "Extra Deck",
            DeckSection::Side => "Side Deck",
        }
    }
}

impl fmt::Display for DeckSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_count_across_sections() {
        let mut deck = Deck::new("d1", "Dragons", 10);
        deck.main_deck = vec!["a".into(), "b".into(), "a".into()];
        deck.side_deck = vec!["a".into()];
        assert_eq!(deck.copies_of("a"), 3);
        assert_eq!(deck.copies_of("missing"), 0);
        assert_eq!(deck.total_cards(), 4);
    }
}
