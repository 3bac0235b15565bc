//! Normalisation of card database lookups into collection drafts.
//!
//! Fetching happens outside the core; this module only consumes the decoded
//! response (YGOPRODeck `cardinfo` shape).

use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    classify::{classify_type, TypeInput},
    error::LookupError,
    identity::IncomingCard,
    migrate::{pad_card_code, UNKNOWN_COLLECTION_CODE},
    models::{ArtworkInfo, Rarity},
    prefs::ArtworkPreferences,
};

static CARD_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+$").expect("failed to compile card code regex"));

/// Set name used when no print information exists.
pub const UNKNOWN_SET_NAME: &str = "Unknown Set";

/// Body of a `cardinfo` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LookupResponse {
    /// Matching cards.
    #[serde(default)]
    pub data: Vec<CardLookup>,
    /// Error message reported by the database.
    #[serde(default)]
    pub error: Option<String>,
}

/// One card as returned by the card database.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CardLookup {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type", default)]
    pub card_type: String,
    #[serde(rename = "frameType", default)]
    pub frame_type: Option<String>,
    #[serde(default)]
    pub typeline: Vec<String>,
    #[serde(default)]
    pub race: Option<String>,
    #[serde(default)]
    pub attribute: Option<String>,
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub atk: Option<i32>,
    #[serde(default)]
    pub def: Option<i32>,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub card_images: Vec<LookupImage>,
    #[serde(default)]
    pub card_sets: Vec<LookupSet>,
}

/// Artwork entry of a lookup.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LookupImage {
    pub id: u64,
    pub image_url: String,
    #[serde(default)]
    pub image_url_small: Option<String>,
}

/// Print entry of a lookup.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LookupSet {
    pub set_name: String,
    pub set_code: String,
    #[serde(default)]
    pub set_rarity: String,
    #[serde(default)]
    pub set_rarity_code: Option<String>,
}

impl From<&LookupImage> for ArtworkInfo {
    fn from(image: &LookupImage) -> Self {
        ArtworkInfo {
            id: image.id,
            image_url: image.image_url.clone(),
            small_image_url: image.image_url_small.clone(),
        }
    }
}

/// A print the card appeared in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetInfo {
    /// Set code, e.g. `LOB-EN001`.
    pub code: String,
    /// Set name.
    pub name: String,
    /// Rarity of this print.
    pub rarity: Rarity,
}

/// Card details ready for review before adding to the collection.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub struct CardDraft {
    pub card_code: String,
    pub name: String,
    pub name_pt: Option<String>,
    pub display_type: String,
    pub type_tags: Vec<String>,
    pub attribute: Option<String>,
    pub level: Option<u32>,
    pub atk: Option<i32>,
    pub def: Option<i32>,
    pub description: Option<String>,
    pub description_pt: Option<String>,
    pub collection_code: String,
    pub collection_name: Option<String>,
    pub release_date: Option<String>,
    pub rarity: Rarity,
}

/// Outcome of normalising a lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCard {
    /// Normalised card details for the chosen print.
    pub draft: CardDraft,
    /// Every known artwork, primary card first.
    pub artworks: Vec<ArtworkInfo>,
    /// Whether the scanned set code matched a listed print.
    pub print_was_found: bool,
    /// Every print listed for the card.
    pub sets: Vec<SetInfo>,
}

impl ResolvedCard {
    /// Fold in artworks of alternate versions sharing the card's exact name.
    pub fn with_variants(mut self, variants: &[CardLookup]) -> Self {
        let extra: Vec<ArtworkInfo> = variants
            .iter()
            .filter(|variant| variant.name == self.draft.name)
            .flat_map(|variant| variant.card_images.iter().map(ArtworkInfo::from))
            .collect();
        self.artworks = merge_artworks(&self.artworks, &extra);
        self
    }

    /// Listed print with this set code, compared case-insensitively.
    pub fn set_for(&self, collection_code: &str) -> Option<&SetInfo> {
        self.sets
            .iter()
            .find(|set| set.code.eq_ignore_ascii_case(collection_code.trim()))
    }
}

/// Card codes are plain digit strings; anything else is a misread.
pub fn validate_card_code(code: &str) -> Result<String, LookupError> {
    let trimmed = code.trim();
    if CARD_CODE_RE.is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(LookupError::InvalidCardCode(code.to_string()))
    }
}

/// Parse a raw `cardinfo` body. Database-reported errors become `Ok(Err(..))`.
pub fn parse_response(body: &str) -> anyhow::Result<Result<Vec<CardLookup>, String>> {
    let response: LookupResponse =
        serde_json::from_str(body).context("failed to parse card lookup response")?;
    if let Some(error) = response.error {
        return Ok(Err(error));
    }
    if response.data.is_empty() {
        return Ok(Err("no card matched".to_string()));
    }
    Ok(Ok(response.data))
}

/// Normalise `lookup` (plus an optional localised lookup) for the print the
/// user scanned. Not finding that print is a valid outcome.
pub fn resolve_lookup(
    lookup: &CardLookup,
    localized: Option<&CardLookup>,
    scanned_collection_code: Option<&str>,
) -> Result<ResolvedCard, LookupError> {
    if lookup.card_images.is_empty() {
        return Err(LookupError::NoArtwork(lookup.name.clone()));
    }

    let scanned = scanned_collection_code
        .map(str::trim)
        .filter(|code| !code.is_empty());
    let sets: Vec<SetInfo> = lookup
        .card_sets
        .iter()
        .map(|set| SetInfo {
            code: set.set_code.clone(),
            name: set.set_name.clone(),
            rarity: Rarity::parse(&set.set_rarity),
        })
        .collect();

    let matched =
        scanned.and_then(|code| sets.iter().find(|set| set.code.eq_ignore_ascii_case(code)));
    let print_was_found = matched.is_some();
    let print = match matched.or_else(|| sets.first()) {
        Some(set) => set.clone(),
        None => SetInfo {
            code: scanned.unwrap_or(UNKNOWN_COLLECTION_CODE).to_string(),
            name: UNKNOWN_SET_NAME.to_string(),
            rarity: Rarity::Common,
        },
    };
    let collection_code = match (print_was_found, scanned) {
        (false, Some(code)) => code.to_string(),
        _ => print.code.clone(),
    };
    if !print_was_found {
        debug!(card = %lookup.name, code = %collection_code, "scanned print not listed");
    }

    let classification = classify_type(&TypeInput {
        raw_type: &lookup.card_type,
        race: lookup.race.as_deref(),
        frame_type: lookup.frame_type.as_deref(),
        typeline: &lookup.typeline,
        ..TypeInput::default()
    });

    if let Some(local) = localized.filter(|local| local.id != lookup.id) {
        warn!(expected = lookup.id, got = local.id, "localised lookup is for another card");
    }

    let draft = CardDraft {
        card_code: pad_card_code(&lookup.id.to_string()),
        name: lookup.name.clone(),
        name_pt: localized.map(|local| local.name.clone()).filter(|name| !name.is_empty()),
        display_type: classification.display_type,
        type_tags: classification.type_tags,
        attribute: lookup.attribute.clone(),
        level: lookup.level,
        atk: lookup.atk,
        def: lookup.def,
        description: lookup.desc.clone(),
        description_pt: localized.and_then(|local| local.desc.clone()),
        collection_name: (collection_code == print.code && print.name != UNKNOWN_SET_NAME)
            .then(|| print.name.clone()),
        collection_code,
        release_date: None,
        rarity: print.rarity.clone(),
    };

    Ok(ResolvedCard {
        draft,
        artworks: lookup.card_images.iter().map(ArtworkInfo::from).collect(),
        print_was_found,
        sets,
    })
}

/// Primary artworks followed by unseen variant artworks, deduplicated by id.
pub fn merge_artworks(primary: &[ArtworkInfo], variants: &[ArtworkInfo]) -> Vec<ArtworkInfo> {
    let mut merged: Vec<ArtworkInfo> = Vec::with_capacity(primary.len() + variants.len());
    for artwork in primary.iter().chain(variants) {
        if !merged.iter().any(|existing| existing.id == artwork.id) {
            merged.push(artwork.clone());
        }
    }
    merged
}

/// The artwork to preselect for a print.
pub fn default_artwork<'a>(
    artworks: &'a [ArtworkInfo],
    prefs: &ArtworkPreferences,
    collection_code: &str,
) -> Option<&'a ArtworkInfo> {
    prefs.pick(artworks, collection_code)
}

impl IncomingCard {
    /// Build the upsert input for `quantity` copies of a reviewed draft.
    /// Missing set names are filled from the listed prints.
    pub fn from_resolved(resolved: &ResolvedCard, artwork: &ArtworkInfo, quantity: u32) -> Self {
        let draft = &resolved.draft;
        let collection_name = draft.collection_name.clone().or_else(|| {
            resolved
                .set_for(&draft.collection_code)
                .map(|set| set.name.clone())
        });
        IncomingCard {
            card_code: draft.card_code.clone(),
            name: draft.name.clone(),
            name_pt: draft.name_pt.clone(),
            display_type: draft.display_type.clone(),
            type_tags: draft.type_tags.clone(),
            attribute: draft.attribute.clone(),
            level: draft.level,
            atk: draft.atk,
            def: draft.def,
            description: draft.description.clone(),
            description_pt: draft.description_pt.clone(),
            artwork: artwork.clone(),
            collection_code: draft.collection_code.clone(),
            collection_name,
            release_date: draft.release_date.clone(),
            rarity: draft.rarity.clone(),
            quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    fn stardust() -> Result<CardLookup> {
        Ok(serde_json::from_value(json!({
            "id": 44508094,
            "name": "Stardust Dragon",
            "type": "Synchro Monster",
            "frameType": "synchro",
            "typeline": ["Dragon", "Synchro", "Effect"],
            "race": "Dragon",
            "attribute": "WIND",
            "level": 8,
            "atk": 2500,
            "def": 2000,
            "desc": "When a card or effect is activated...",
            "card_images": [
                {"id": 44508094, "image_url": "https://img/44508094.jpg", "image_url_small": "https://img/s/44508094.jpg"}
            ],
            "card_sets": [
                {"set_name": "The Duelist Genesis", "set_code": "TDGS-EN040", "set_rarity": "Ultra Rare"},
                {"set_name": "Legendary Collection 5D's", "set_code": "LC5D-EN031", "set_rarity": "Secret Rare"}
            ]
        }))?)
    }

    #[test]
    fn card_code_must_be_numeric() {
        assert_eq!(validate_card_code(" 44508094 "), Ok("44508094".to_string()));
        assert!(matches!(
            validate_card_code("4450B094"),
            Err(LookupError::InvalidCardCode(_))
        ));
        assert!(validate_card_code("").is_err());
    }

    #[test]
    fn scanned_print_is_matched_case_insensitively() -> Result<()> {
        let resolved = resolve_lookup(&stardust()?, None, Some("lc5d-en031"))?;
        assert!(resolved.print_was_found);
        assert_eq!(resolved.draft.collection_code, "LC5D-EN031");
        assert_eq!(resolved.draft.rarity, Rarity::SecretRare);
        assert_eq!(resolved.draft.display_type, "Synchro Monster");
        assert!(resolved.draft.type_tags.contains(&"Effect".to_string()));
        assert_eq!(resolved.sets.len(), 2);
        Ok(())
    }

    #[test]
    fn unknown_print_keeps_scanned_code() -> Result<()> {
        let resolved = resolve_lookup(&stardust()?, None, Some("XXXX-EN999"))?;
        assert!(!resolved.print_was_found);
        assert_eq!(resolved.draft.collection_code, "XXXX-EN999");
        assert_eq!(resolved.draft.rarity, Rarity::UltraRare);
        Ok(())
    }

    #[test]
    fn card_without_sets_gets_placeholder_print() -> Result<()> {
        let mut lookup = stardust()?;
        lookup.card_sets.clear();
        let resolved = resolve_lookup(&lookup, None, None)?;
        assert!(!resolved.print_was_found);
        assert_eq!(resolved.draft.collection_code, UNKNOWN_COLLECTION_CODE);
        assert_eq!(resolved.draft.rarity, Rarity::Common);
        assert_eq!(resolved.draft.collection_name, None);
        Ok(())
    }

    #[test]
    fn missing_artwork_is_an_error() -> Result<()> {
        let mut lookup = stardust()?;
        lookup.card_images.clear();
        assert_eq!(
            resolve_lookup(&lookup, None, None),
            Err(LookupError::NoArtwork("Stardust Dragon".to_string()))
        );
        Ok(())
    }

    #[test]
    fn localised_fields_are_attached() -> Result<()> {
        let primary = stardust()?;
        let mut local = primary.clone();
        local.name = "Dragão da Poeira Estelar".to_string();
        local.desc = Some("Quando um card...".to_string());
        let resolved = resolve_lookup(&primary, Some(&local), None)?;
        assert_eq!(resolved.draft.name_pt.as_deref(), Some("Dragão da Poeira Estelar"));
        assert_eq!(resolved.draft.description_pt.as_deref(), Some("Quando um card..."));
        Ok(())
    }

    #[test]
    fn variants_add_unseen_artworks_only() -> Result<()> {
        let primary = stardust()?;
        let mut variant = primary.clone();
        variant.card_images = vec![
            LookupImage {
                id: 44508094,
                image_url: "https://img/dup.jpg".to_string(),
                image_url_small: None,
            },
            LookupImage {
                id: 44508095,
                image_url: "https://img/44508095.jpg".to_string(),
                image_url_small: None,
            },
        ];
        let mut stranger = primary.clone();
        stranger.name = "Stardust Dragon/Assault Mode".to_string();
        stranger.card_images[0].id = 61257789;

        let resolved = resolve_lookup(&primary, None, None)?.with_variants(&[variant, stranger]);
        let ids: Vec<u64> = resolved.artworks.iter().map(|art| art.id).collect();
        assert_eq!(ids, vec![44508094, 44508095]);
        assert_eq!(resolved.artworks[0].image_url, "https://img/44508094.jpg");
        Ok(())
    }

    #[test]
    fn incoming_card_carries_print_identity() -> Result<()> {
        let resolved = resolve_lookup(&stardust()?, None, Some("TDGS-EN040"))?;
        let artwork = default_artwork(&resolved.artworks, &ArtworkPreferences::default(), "TDGS-EN040")
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no artwork"))?;
        let incoming = IncomingCard::from_resolved(&resolved, &artwork, 2);
        assert_eq!(incoming.id(), "TDGS-EN040-Ultra Rare-44508094");
        assert_eq!(incoming.collection_name.as_deref(), Some("The Duelist Genesis"));
        assert_eq!(incoming.quantity, 2);
        Ok(())
    }

    #[test]
    fn database_errors_are_inner_results() -> Result<()> {
        let outcome = parse_response(r#"{"error": "No card matching your query was found"}"#)?;
        assert!(outcome.is_err());
        let outcome = parse_response(r#"{"data": [{"id": 1, "name": "X", "type": "Spell Card"}]}"#)?;
        assert_eq!(outcome.map(|cards| cards.len()), Ok(1));
        assert!(parse_response("not json").is_err());
        Ok(())
    }
}
