//! Print identity and collection merging.

use tracing::{debug, info};

use crate::models::{now_millis, ArtworkInfo, CardRecord, Deck, Rarity};

/// Composite key of an owned print: `collectionCode-rarity-artworkId`.
pub fn resolve_identity(collection_code: &str, rarity: &Rarity, artwork_id: u64) -> String {
    format!("{collection_code}-{}-{artwork_id}", rarity.as_str())
}

/// Everything needed to add copies of one print to the collection.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingCard {
    /// Intrinsic card code.
    pub card_code: String,
    /// English name.
    pub name: String,
    /// Localised name.
    pub name_pt: Option<String>,
    /// Canonical display type.
    pub display_type: String,
    /// Canonical tags.
    pub type_tags: Vec<String>,
    /// Attribute (`LIGHT`, `DARK`, ...).
    pub attribute: Option<String>,
    /// Level, rank or link rating.
    pub level: Option<u32>,
    /// Attack.
    pub atk: Option<i32>,
    /// Defense.
    pub def: Option<i32>,
    /// English card text.
    pub description: Option<String>,
    /// Localised card text.
    pub description_pt: Option<String>,
    /// Selected artwork.
    pub artwork: ArtworkInfo,
    /// Set code of the print.
    pub collection_code: String,
    /// Set name, when known.
    pub collection_name: Option<String>,
    /// Set release date, when known.
    pub release_date: Option<String>,
    /// Print rarity.
    pub rarity: Rarity,
    /// Copies being added.
    pub quantity: u32,
}

impl IncomingCard {
    /// Identity the incoming print will be stored under.
    pub fn id(&self) -> String {
        resolve_identity(&self.collection_code, &self.rarity, self.artwork.id)
    }

    fn into_record(self, now: i64) -> CardRecord {
        CardRecord {
            id: self.id(),
            card_code: self.card_code,
            name: self.name,
            name_pt: self.name_pt,
            display_type: self.display_type,
            type_tags: self.type_tags,
            attribute: self.attribute,
            level: self.level,
            atk: self.atk,
            def: self.def,
            description: self.description,
            description_pt: self.description_pt,
            image_url: self.artwork.image_url,
            collection_code: self.collection_code,
            collection_name: self.collection_name,
            release_date: self.release_date,
            rarity: self.rarity,
            quantity: self.quantity,
            date_added: now,
        }
    }
}

/// Add `incoming` to the collection, merging into an existing print when the
/// identity already exists.
pub fn upsert_card(collection: &[CardRecord], incoming: IncomingCard) -> Vec<CardRecord> {
    upsert_card_at(collection, incoming, now_millis())
}

/// [`upsert_card`] with an explicit clock.
pub fn upsert_card_at(collection: &[CardRecord], incoming: IncomingCard, now: i64) -> Vec<CardRecord> {
    let mut updated = collection.to_vec();
    if incoming.quantity == 0 {
        debug!(card = %incoming.name, "ignoring upsert of zero copies");
        return updated;
    }

    let id = incoming.id();
    match updated.iter_mut().find(|card| card.id == id) {
        Some(existing) => {
            existing.quantity = existing.quantity.saturating_add(incoming.quantity);
            if existing.collection_name.is_none() {
                existing.collection_name = incoming.collection_name;
            }
            if existing.release_date.is_none() {
                existing.release_date = incoming.release_date;
            }
            debug!(%id, quantity = existing.quantity, "merged into existing print");
        }
        None => {
            info!(%id, quantity = incoming.quantity, "added new print");
            updated.push(incoming.into_record(now));
        }
    }
    updated
}

/// Result of switching a print to another artwork.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtworkChange {
    /// Collection after the change.
    pub collection: Vec<CardRecord>,
    /// Decks with references to the old id rewritten.
    pub decks: Vec<Deck>,
    /// Identity the copies now live under.
    pub new_id: String,
}

/// Move a print to another artwork. The id is recomputed; if it collides with
/// an existing print the quantities are summed and the old record dropped.
/// Deck references follow the copies.
pub fn change_artwork(
    collection: &[CardRecord],
    decks: &[Deck],
    card_id: &str,
    new_artwork: &ArtworkInfo,
) -> ArtworkChange {
    let unchanged = || ArtworkChange {
        collection: collection.to_vec(),
        decks: decks.to_vec(),
        new_id: card_id.to_string(),
    };

    let Some(source) = collection.iter().find(|card| card.id == card_id) else {
        debug!(card_id, "artwork change for unknown card");
        return unchanged();
    };

    let new_id = resolve_identity(&source.collection_code, &source.rarity, new_artwork.id);
    if new_id == card_id {
        return unchanged();
    }

    let collides = collection.iter().any(|card| card.id == new_id);
    let mut updated = Vec::with_capacity(collection.len());
    for card in collection {
        if card.id == card_id {
            if collides {
                continue;
            }
            let mut renamed = card.clone();
            renamed.id = new_id.clone();
            renamed.image_url = new_artwork.image_url.clone();
            updated.push(renamed);
        } else if card.id == new_id {
            let mut target = card.clone();
            target.quantity = target.quantity.saturating_add(source.quantity);
            target.date_added = target.date_added.min(source.date_added);
            updated.push(target);
        } else {
            updated.push(card.clone());
        }
    }

    let decks = decks
        .iter()
        .map(|deck| rewrite_references(deck, card_id, &new_id))
        .collect();

    info!(from = card_id, to = %new_id, merged = collides, "changed artwork");
    ArtworkChange {
        collection: updated,
        decks,
        new_id,
    }
}

pub(crate) fn rewrite_references(deck: &Deck, from: &str, to: &str) -> Deck {
    let mut deck = deck.clone();
    for slot in deck
        .main_deck
        .iter_mut()
        .chain(deck.extra_deck.iter_mut())
        .chain(deck.side_deck.iter_mut())
    {
        if slot == from {
            *slot = to.to_string();
        }
    }
    deck
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn card(id: &str, quantity: u32) -> CardRecord {
        CardRecord {
            id: id.to_string(),
            card_code: "00000001".to_string(),
            name: format!("Card {id}"),
            name_pt: None,
            display_type: "Monster".to_string(),
            type_tags: vec!["Warrior".to_string(), "Effect".to_string()],
            attribute: Some("EARTH".to_string()),
            level: Some(4),
            atk: Some(1800),
            def: Some(1200),
            description: Some("text".to_string()),
            description_pt: None,
            image_url: String::new(),
            collection_code: "SET-001".to_string(),
            collection_name: None,
            release_date: None,
            rarity: Rarity::Common,
            quantity,
            date_added: 1_000,
        }
    }

    fn incoming(code: &str, artwork: u64, quantity: u32) -> IncomingCard {
        IncomingCard {
            card_code: "46986414".to_string(),
            name: "Dark Magician".to_string(),
            name_pt: None,
            display_type: "Normal Monster".to_string(),
            type_tags: vec![
                "Spellcaster".to_string(),
                "Normal".to_string(),
                "Non-Effect".to_string(),
            ],
            attribute: Some("DARK".to_string()),
            level: Some(7),
            atk: Some(2500),
            def: Some(2100),
            description: None,
            description_pt: None,
            artwork: ArtworkInfo::new(artwork, format!("https://img/{artwork}.jpg")),
            collection_code: code.to_string(),
            collection_name: None,
            release_date: None,
            rarity: Rarity::UltraRare,
            quantity,
        }
    }

    #[test]
    fn identity_format() {
        assert_eq!(
            resolve_identity("LOB-005", &Rarity::UltraRare, 46986414),
            "LOB-005-Ultra Rare-46986414"
        );
    }

    #[test]
    fn repeated_scans_accumulate() {
        let once = upsert_card_at(&[], incoming("LOB-005", 46986414, 1), 10);
        let twice = upsert_card_at(&once, incoming("LOB-005", 46986414, 2), 20);
        assert_eq!(twice.len(), 1);
        assert_eq!(twice[0].quantity, 3);
        assert_eq!(twice[0].date_added, 10);
    }

    #[test]
    fn upsert_backfills_only_missing_set_details() {
        let mut first = incoming("LOB-005", 46986414, 1);
        first.release_date = Some("2002-03-08".to_string());
        let collection = upsert_card_at(&[], first, 10);

        let mut second = incoming("LOB-005", 46986414, 1);
        second.collection_name = Some("Legend of Blue Eyes".to_string());
        second.release_date = Some("1999-01-01".to_string());
        let merged = upsert_card_at(&collection, second, 20);

        assert_eq!(merged[0].collection_name.as_deref(), Some("Legend of Blue Eyes"));
        assert_eq!(merged[0].release_date.as_deref(), Some("2002-03-08"));
    }

    #[test]
    fn unlisted_rarities_are_separate_prints() {
        let mut platinum = incoming("RA01-EN001", 46986414, 1);
        platinum.rarity = Rarity::parse("Platinum Secret Rare");
        let mut prismatic = incoming("RA01-EN001", 46986414, 1);
        prismatic.rarity = Rarity::parse("Prismatic Ultimate Rare");

        let collection = upsert_card_at(&upsert_card_at(&[], platinum, 5), prismatic, 5);
        assert_eq!(collection.len(), 2);
        assert_eq!(collection[0].id, "RA01-EN001-Platinum Secret Rare-46986414");
        assert_eq!(collection[1].id, "RA01-EN001-Prismatic Ultimate Rare-46986414");
        assert!(collection.iter().all(|card| card.quantity == 1));
    }

    #[test]
    fn upsert_commutes_across_distinct_prints() {
        let a = incoming("LOB-005", 46986414, 1);
        let b = incoming("SDY-006", 46986414, 2);

        let ab = upsert_card_at(&upsert_card_at(&[], a.clone(), 5), b.clone(), 5);
        let ba = upsert_card_at(&upsert_card_at(&[], b, 5), a, 5);

        let mut ab_ids: Vec<_> = ab.iter().map(|c| (c.id.clone(), c.quantity)).collect();
        let mut ba_ids: Vec<_> = ba.iter().map(|c| (c.id.clone(), c.quantity)).collect();
        ab_ids.sort();
        ba_ids.sort();
        assert_eq!(ab_ids, ba_ids);
    }

    #[test]
    fn artwork_collision_merges_and_rewrites_decks() {
        let mut source = card("SET-001-Common-1", 1);
        source.date_added = 500;
        let target = card("SET-001-Common-2", 2);
        let mut deck = Deck::new("d", "Deck", 0);
        deck.main_deck = vec!["SET-001-Common-1".to_string()];

        let change = change_artwork(
            &[source, target],
            &[deck],
            "SET-001-Common-1",
            &ArtworkInfo::new(2, "https://img/2.jpg"),
        );

        assert_eq!(change.new_id, "SET-001-Common-2");
        assert_eq!(change.collection.len(), 1);
        assert_eq!(change.collection[0].quantity, 3);
        assert_eq!(change.collection[0].date_added, 500);
        assert_eq!(change.decks[0].main_deck, vec!["SET-001-Common-2".to_string()]);
    }

    #[test]
    fn artwork_change_renames_in_place() {
        let collection = vec![card("SET-001-Common-1", 1), card("OTHER", 1)];
        let change = change_artwork(
            &collection,
            &[],
            "SET-001-Common-1",
            &ArtworkInfo::new(7, "https://img/7.jpg"),
        );
        assert_eq!(change.collection[0].id, "SET-001-Common-7");
        assert_eq!(change.collection[0].image_url, "https://img/7.jpg");
        assert_eq!(change.collection[1].id, "OTHER");
    }

    #[test]
    fn same_artwork_is_a_no_op() {
        let collection = vec![card("SET-001-Common-1", 1)];
        let change = change_artwork(
            &collection,
            &[],
            "SET-001-Common-1",
            &ArtworkInfo::new(1, "https://img/other.jpg"),
        );
        assert_eq!(change.collection, collection);
        assert_eq!(change.new_id, "SET-001-Common-1");
    }
}
