//! Filtering, sorting and headline numbers for the collection view.

use std::{borrow::Borrow, cmp::Ordering, collections::HashSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{CardRecord, Rarity};

/// Active collection filters. Empty fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionFilter {
    /// Case-insensitive text matched against names and card text.
    pub query: String,
    /// Substring of the display type, so `Monster` matches `Synchro Monster`.
    pub main_type: Option<String>,
    /// Exact attribute.
    pub attribute: Option<String>,
    /// Tags that must all be present (race, subtype, spell or trap type).
    pub tags: Vec<String>,
    /// Exact level.
    pub level: Option<u32>,
    /// Exact rarity.
    pub rarity: Option<Rarity>,
    /// Inclusive upper bound on the ISO release date.
    pub released_before: Option<String>,
}

impl CollectionFilter {
    /// Text-only filter.
    pub fn with_query(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Parse filter-bar text. `type:`, `attr:`, `tag:`, `level:`, `rarity:`
    /// and `before:` words set the matching constraint; double quotes group
    /// a value with spaces, as in `rarity:"Ultra Rare"`. Every other word
    /// joins the text query.
    pub fn parse(input: &str) -> Self {
        let mut filter = Self::default();
        let mut words = Vec::new();
        for word in filter_words(input) {
            let Some((prefix, value)) = word.split_once(':') else {
                words.push(word);
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                words.push(word);
                continue;
            }
            match prefix.to_ascii_lowercase().as_str() {
                "type" => filter.main_type = Some(value.to_string()),
                "attr" | "attribute" => filter.attribute = Some(value.to_ascii_uppercase()),
                "tag" => filter.tags.push(value.to_string()),
                "rarity" => filter.rarity = Some(Rarity::parse(value)),
                "before" => filter.released_before = Some(value.to_string()),
                "level" | "lv" => match value.parse() {
                    Ok(level) => filter.level = Some(level),
                    Err(_) => words.push(word),
                },
                _ => words.push(word),
            }
        }
        filter.query = words.join(" ");
        filter
    }

    /// Whether no constraint is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether `card` passes every active constraint.
    pub fn matches(&self, card: &CardRecord) -> bool {
        let query = self.query.trim().to_lowercase();
        if !query.is_empty() {
            let found = [
                Some(card.name.as_str()),
                card.name_pt.as_deref(),
                card.description.as_deref(),
                card.description_pt.as_deref(),
            ]
            .into_iter()
            .flatten()
            .any(|text| text.to_lowercase().contains(&query));
            if !found {
                return false;
            }
        }

        if let Some(main_type) = &self.main_type {
            if !card.display_type.to_lowercase().contains(&main_type.to_lowercase()) {
                return false;
            }
        }
        if let Some(attribute) = &self.attribute {
            let same = card
                .attribute
                .as_deref()
                .is_some_and(|own| own.eq_ignore_ascii_case(attribute));
            if !same {
                return false;
            }
        }
        let has_tags = self
            .tags
            .iter()
            .all(|tag| card.type_tags.iter().any(|own| own.eq_ignore_ascii_case(tag)));
        if !has_tags {
            return false;
        }
        if self.level.is_some() && card.level != self.level {
            return false;
        }
        if self.rarity.as_ref().is_some_and(|rarity| *rarity != card.rarity) {
            return false;
        }
        if let Some(bound) = &self.released_before {
            match &card.release_date {
                Some(date) if date.as_str() <= bound.as_str() => {}
                _ => return false,
            }
        }
        true
    }

    /// Cards passing the filter, in collection order.
    pub fn apply<'a>(&self, cards: &'a [CardRecord]) -> Vec<&'a CardRecord> {
        cards.iter().filter(|card| self.matches(card)).collect()
    }
}

/// Split on whitespace outside double quotes; the quotes are dropped.
fn filter_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for ch in input.chars() {
        match ch {
            '"' => quoted = !quoted,
            ch if ch.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            ch => current.push(ch),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Field the collection is sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortKey {
    /// Card name.
    Name,
    /// Rarity order. Unlisted rarities stay last in both directions.
    Rarity,
    /// Collection code.
    Collection,
    /// Date added.
    Date,
}

impl SortKey {
    fn as_str(&self) -> &'static str {
        match self {
            SortKey::Name => "name",
            SortKey::Rarity => "rarity",
            SortKey::Collection => "collection",
            SortKey::Date => "date",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    /// Smallest first.
    Asc,
    /// Largest first.
    Desc,
}

/// A `key-direction` pair such as `date-desc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SortOrder {
    /// Field compared.
    pub key: SortKey,
    /// Direction applied to the comparison.
    pub direction: SortDirection,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self {
            key: SortKey::Date,
            direction: SortDirection::Desc,
        }
    }
}

/// Unrecognised sort order string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown sort order {0:?}; expected name|rarity|collection|date followed by -asc or -desc")]
pub struct ParseSortOrderError(String);

impl FromStr for SortOrder {
    type Err = ParseSortOrderError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalised = input.trim().to_ascii_lowercase();
        let (key, direction) = normalised
            .split_once('-')
            .ok_or_else(|| ParseSortOrderError(input.to_string()))?;
        let key = match key {
            "name" => SortKey::Name,
            "rarity" => SortKey::Rarity,
            "collection" => SortKey::Collection,
            "date" => SortKey::Date,
            _ => return Err(ParseSortOrderError(input.to_string())),
        };
        let direction = match direction {
            "asc" => SortDirection::Asc,
            "desc" => SortDirection::Desc,
            _ => return Err(ParseSortOrderError(input.to_string())),
        };
        Ok(Self { key, direction })
    }
}

impl TryFrom<String> for SortOrder {
    type Error = ParseSortOrderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SortOrder> for String {
    fn from(order: SortOrder) -> Self {
        order.to_string()
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match self.direction {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        };
        write!(f, "{}-{direction}", self.key.as_str())
    }
}

impl SortOrder {
    /// Every supported order, for cycling through in a UI.
    pub const ALL: [SortOrder; 8] = [
        SortOrder::new(SortKey::Date, SortDirection::Desc),
        SortOrder::new(SortKey::Date, SortDirection::Asc),
        SortOrder::new(SortKey::Name, SortDirection::Asc),
        SortOrder::new(SortKey::Name, SortDirection::Desc),
        SortOrder::new(SortKey::Rarity, SortDirection::Desc),
        SortOrder::new(SortKey::Rarity, SortDirection::Asc),
        SortOrder::new(SortKey::Collection, SortDirection::Asc),
        SortOrder::new(SortKey::Collection, SortDirection::Desc),
    ];

    /// Order by `key` in `direction`.
    pub const fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    /// The order after this one in [`SortOrder::ALL`].
    pub fn next(&self) -> Self {
        let index = Self::ALL.iter().position(|order| order == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }

    /// Compare two cards under this order.
    pub fn compare(&self, a: &CardRecord, b: &CardRecord) -> Ordering {
        if self.key == SortKey::Rarity {
            let unlisted = a.rarity.is_other().cmp(&b.rarity.is_other());
            if unlisted != Ordering::Equal {
                return unlisted;
            }
        }
        let ordering = match self.key {
            SortKey::Name => a
                .name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name)),
            SortKey::Rarity => a.rarity.rank().cmp(&b.rarity.rank()),
            SortKey::Collection => a.collection_code.cmp(&b.collection_code),
            SortKey::Date => a.date_added.cmp(&b.date_added),
        };
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }

    /// Stable sort in place.
    pub fn sort<C: Borrow<CardRecord>>(&self, cards: &mut [C]) {
        cards.sort_by(|a, b| self.compare(a.borrow(), b.borrow()));
    }
}

/// Filter then sort, borrowing from the collection.
pub fn visible_cards<'a>(
    cards: &'a [CardRecord],
    filter: &CollectionFilter,
    order: SortOrder,
) -> Vec<&'a CardRecord> {
    let mut visible = filter.apply(cards);
    order.sort(&mut visible);
    visible
}

/// Header numbers of the collection view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStats {
    /// Sum of quantities.
    pub total_copies: u64,
    /// Distinct card names.
    pub unique_names: usize,
    /// Distinct prints (records).
    pub prints: usize,
}

impl CollectionStats {
    /// Compute the numbers for `cards`.
    pub fn compute(cards: &[CardRecord]) -> Self {
        let names: HashSet<&str> = cards.iter().map(|card| card.name.as_str()).collect();
        Self {
            total_copies: cards.iter().map(|card| u64::from(card.quantity)).sum(),
            unique_names: names.len(),
            prints: cards.len(),
        }
    }
}

/// Sorted distinct tags present in the collection, for filter pickers.
pub fn distinct_tags(cards: &[CardRecord]) -> Vec<String> {
    let mut tags: Vec<String> = cards
        .iter()
        .flat_map(|card| card.type_tags.iter().cloned())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    tags.sort();
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::tests::card;

    fn sample() -> Vec<CardRecord> {
        let mut a = card("a", 2);
        a.name = "Stardust Dragon".to_string();
        a.display_type = "Synchro Monster".to_string();
        a.type_tags = vec!["Dragon".into(), "Synchro".into(), "Effect".into()];
        a.attribute = Some("WIND".to_string());
        a.level = Some(8);
        a.rarity = Rarity::GhostRare;
        a.release_date = Some("2008-05-17".to_string());
        a.date_added = 300;

        let mut b = card("b", 1);
        b.name = "Pot of Greed".to_string();
        b.name_pt = Some("Pote da Ganância".to_string());
        b.display_type = "Spell Card".to_string();
        b.type_tags = vec!["Normal".into()];
        b.attribute = None;
        b.level = None;
        b.rarity = Rarity::Common;
        b.collection_code = "LOB-119".to_string();
        b.date_added = 100;

        let mut c = card("c", 3);
        c.name = "Stardust Dragon".to_string();
        c.display_type = "Synchro Monster".to_string();
        c.type_tags = vec!["Dragon".into(), "Synchro".into(), "Effect".into()];
        c.rarity = Rarity::parse("Starlight Rare");
        c.release_date = Some("2021-03-01".to_string());
        c.date_added = 200;

        vec![a, b, c]
    }

    fn ids(cards: &[&CardRecord]) -> Vec<String> {
        cards.iter().map(|card| card.id.clone()).collect()
    }

    #[test]
    fn query_searches_localised_text() {
        let cards = sample();
        let hits = CollectionFilter::with_query("ganância").apply(&cards);
        assert_eq!(ids(&hits), vec!["b"]);
        let hits = CollectionFilter::with_query("STARDUST").apply(&cards);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn structured_filters_combine() {
        let cards = sample();
        let filter = CollectionFilter {
            main_type: Some("Monster".to_string()),
            tags: vec!["Dragon".to_string()],
            rarity: Some(Rarity::GhostRare),
            ..CollectionFilter::default()
        };
        assert_eq!(ids(&filter.apply(&cards)), vec!["a"]);

        let by_level = CollectionFilter {
            level: Some(8),
            ..CollectionFilter::default()
        };
        assert_eq!(ids(&by_level.apply(&cards)), vec!["a"]);
    }

    #[test]
    fn filter_text_sets_structured_fields() {
        let filter = CollectionFilter::parse(
            r#"type:monster attr:wind tag:Dragon level:8 rarity:"Ghost Rare" stardust"#,
        );
        assert_eq!(filter.main_type.as_deref(), Some("monster"));
        assert_eq!(filter.attribute.as_deref(), Some("WIND"));
        assert_eq!(filter.tags, vec!["Dragon"]);
        assert_eq!(filter.level, Some(8));
        assert_eq!(filter.rarity, Some(Rarity::GhostRare));
        assert_eq!(filter.query, "stardust");
        assert_eq!(ids(&filter.apply(&sample())), vec!["a"]);

        let loose = CollectionFilter::parse("level:high before: pot of greed");
        assert_eq!(loose.level, None);
        assert_eq!(loose.released_before, None);
        assert_eq!(loose.query, "level:high before: pot of greed");
        assert_eq!(CollectionFilter::parse("  "), CollectionFilter::default());
    }

    #[test]
    fn release_bound_excludes_undated_cards() {
        let cards = sample();
        let filter = CollectionFilter {
            released_before: Some("2010-01-01".to_string()),
            ..CollectionFilter::default()
        };
        assert_eq!(ids(&filter.apply(&cards)), vec!["a"]);
    }

    #[test]
    fn sort_orders() {
        let cards = sample();
        let all = CollectionFilter::default();
        assert!(all.is_empty());

        let by_date: SortOrder = "date-desc".parse().unwrap();
        assert_eq!(ids(&visible_cards(&cards, &all, by_date)), vec!["a", "c", "b"]);

        let by_rarity: SortOrder = "rarity-asc".parse().unwrap();
        assert_eq!(ids(&visible_cards(&cards, &all, by_rarity)), vec!["b", "a", "c"]);

        let by_rarity: SortOrder = "rarity-desc".parse().unwrap();
        assert_eq!(ids(&visible_cards(&cards, &all, by_rarity)), vec!["a", "b", "c"]);

        let by_name: SortOrder = "name-asc".parse().unwrap();
        assert_eq!(ids(&visible_cards(&cards, &all, by_name)), vec!["b", "a", "c"]);
    }

    #[test]
    fn sort_order_parsing() {
        assert_eq!(SortOrder::default().to_string(), "date-desc");
        assert!("height-asc".parse::<SortOrder>().is_err());
        assert!("name".parse::<SortOrder>().is_err());
        let order: SortOrder = serde_json::from_str("\"collection-desc\"").unwrap();
        assert_eq!(order.key, SortKey::Collection);
        assert_eq!(SortOrder::ALL[7].next(), SortOrder::ALL[0]);
    }

    #[test]
    fn stats_count_copies_names_and_prints() {
        let stats = CollectionStats::compute(&sample());
        assert_eq!(
            stats,
            CollectionStats {
                total_copies: 6,
                unique_names: 2,
                prints: 3
            }
        );
        assert_eq!(distinct_tags(&sample()), vec!["Dragon", "Effect", "Normal", "Synchro"]);
    }
}
