use serde::{Deserialize, Serialize};

use crate::models::DeckSection;

/// Size and copy limits applied when building decks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckRules {
    /// Hard maximum of the main deck.
    pub main_max: usize,
    /// Soft minimum of the main deck, only reported as a warning.
    pub main_min: usize,
    /// Hard maximum of the extra deck.
    pub extra_max: usize,
    /// Hard maximum of the side deck.
    pub side_max: usize,
    /// Copies of one card id allowed across the whole deck.
    pub copy_limit: usize,
}

impl Default for DeckRules {
    fn default() -> Self {
        Self {
            main_max: 60,
            main_min: 40,
            extra_max: 15,
            side_max: 15,
            copy_limit: 3,
        }
    }
}

impl DeckRules {
    /// Maximum size of `section`.
    pub fn limit(&self, section: DeckSection) -> usize {
        match section {
            DeckSection::Main => self.main_max,
            DeckSection::Extra => self.extra_max,
            DeckSection::Side => self.side_max,
        }
    }
}
