#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use super::Rarity;
use crate::classify;

/// Tag carried by monsters with an effect.
pub const EFFECT_TAG: &str = "Effect";
/// Tag carried by vanilla/non-effect monsters.
pub const NON_EFFECT_TAG: &str = "Non-Effect";

/// A single owned print of a card.
///
/// `id` is the composite identity (`collectionCode-rarity-artworkId`) and the
/// only key used for merging and deck allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRecord {
    pub id: String,
    pub card_code: String,
    pub name: String,
    #[serde(rename = "name_pt", default)]
    pub name_pt: Option<String>,
    /// Canonical display type, e.g. `Synchro Monster`.
    #[serde(rename = "type", alias = "displayType")]
    pub display_type: String,
    #[serde(default)]
    pub type_tags: Vec<String>,
    #[serde(default)]
    pub attribute: Option<String>,
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub atk: Option<i32>,
    #[serde(default)]
    pub def: Option<i32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "description_pt", default)]
    pub description_pt: Option<String>,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub collection_code: String,
    #[serde(default)]
    pub collection_name: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub rarity: Rarity,
    pub quantity: u32,
    /// Epoch milliseconds.
    pub date_added: i64,
}

impl CardRecord {
    /// Whether the canonical tags contain `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.type_tags.iter().any(|existing| existing == tag)
    }

    /// Fusion, Synchro, Xyz and Link monsters live in the extra deck.
    pub fn is_extra_deck(&self) -> bool {
        classify::is_extra_deck(&self.type_tags)
    }

    /// Monsters always carry exactly one of `Effect` / `Non-Effect`.
    pub fn is_monster(&self) -> bool {
        self.has_tag(EFFECT_TAG) || self.has_tag(NON_EFFECT_TAG)
    }
}

/// One artwork variant of a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtworkInfo {
    pub id: u64,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_image_url: Option<String>,
}

impl ArtworkInfo {
    pub fn new(id: u64, image_url: impl Into<String>) -> Self {
        Self {
            id,
            image_url: image_url.into(),
            small_image_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_with_persisted_field_names() -> anyhow::Result<()> {
        let card = CardRecord {
            id: "LOB-001-Ultra Rare-89631139".to_string(),
            card_code: "89631139".to_string(),
            name: "Blue-Eyes White Dragon".to_string(),
            name_pt: Some("Dragão Branco de Olhos Azuis".to_string()),
            display_type: "Normal Monster".to_string(),
            type_tags: vec![
                "Dragon".to_string(),
                "Normal".to_string(),
                "Non-Effect".to_string(),
            ],
            attribute: Some("LIGHT".to_string()),
            level: Some(8),
            atk: Some(3000),
            def: Some(2500),
            description: Some("This legendary dragon...".to_string()),
            description_pt: None,
            image_url: "https://images.example/89631139.jpg".to_string(),
            collection_code: "LOB-001".to_string(),
            collection_name: Some("Legend of Blue Eyes White Dragon".to_string()),
            release_date: Some("2002-03-08".to_string()),
            rarity: Rarity::UltraRare,
            quantity: 2,
            date_added: 1_700_000_000_000,
        };

        let value = serde_json::to_value(&card)?;
        assert_eq!(value["type"], json!("Normal Monster"));
        assert_eq!(value["name_pt"], json!("Dragão Branco de Olhos Azuis"));
        assert_eq!(value["description_pt"], json!(null));
        assert_eq!(value["typeTags"][2], json!("Non-Effect"));
        assert_eq!(value["rarity"], json!("Ultra Rare"));
        assert_eq!(value["dateAdded"], json!(1_700_000_000_000i64));

        let back: CardRecord = serde_json::from_value(value)?;
        assert_eq!(back, card);
        assert!(back.is_monster());
        assert!(!back.is_extra_deck());
        Ok(())
    }
}
