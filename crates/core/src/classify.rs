//! Canonical card type classification.
//!
//! This is the only place that inspects raw type strings. Everything
//! downstream asks questions of `typeTags`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{EFFECT_TAG, NON_EFFECT_TAG};

/// Mechanical subtypes picked out of the raw type string.
pub const MECHANICAL_KEYWORDS: [&str; 13] = [
    "Synchro", "Tuner", "Fusion", "Xyz", "Link", "Ritual", "Pendulum", "Toon", "Spirit", "Gemini",
    "Union", "Normal", "Flip",
];

/// Subtypes that only exist on effect monsters.
const EFFECT_IMPLYING: [&str; 5] = ["Toon", "Spirit", "Gemini", "Union", "Flip"];

/// Tags that route a card to the extra deck.
const EXTRA_DECK_TAGS: [&str; 4] = ["Fusion", "Synchro", "Xyz", "Link"];

const MONSTER_ONLY_TAGS: [&str; 11] = [
    "Synchro", "Fusion", "Xyz", "Link", "Pendulum", "Tuner", "Toon", "Spirit", "Gemini", "Union",
    "Flip",
];

const GENERIC_TYPES: [&str; 3] = ["Monster", "Effect Monster", "Normal Monster"];

/// Dominant-tag order used to rebuild a generic display type.
const DISPLAY_PRIORITY: [(&[&str], &str); 12] = [
    (&["Link"], "Link Monster"),
    (&["Pendulum", "Normal"], "Pendulum Normal Monster"),
    (&["Pendulum"], "Pendulum Monster"),
    (&["Xyz"], "Xyz Monster"),
    (&["Synchro"], "Synchro Monster"),
    (&["Fusion"], "Fusion Monster"),
    (&["Ritual"], "Ritual Monster"),
    (&["Toon"], "Toon Monster"),
    (&["Gemini"], "Gemini Monster"),
    (&["Spirit"], "Spirit Monster"),
    (&["Union"], "Union Monster"),
    (&["Normal"], "Normal Monster"),
];

static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("failed to compile whitespace regex"));

/// Everything the classifier may look at. All fields but `raw_type` are optional.
#[derive(Debug, Clone, Default)]
pub struct TypeInput<'a> {
    /// Raw type line, e.g. `Synchro Tuner Effect Monster`.
    pub raw_type: &'a str,
    /// Tags already attached to the record.
    pub existing_tags: &'a [String],
    /// Legacy race field (`Dragon`, `Continuous`, `Warrior / Link`).
    pub race: Option<&'a str>,
    /// Legacy subtype field. Older saves stored the lowercase frame type here.
    pub sub_type: Option<&'a str>,
    /// Authoritative frame type from the card database (`normal`, `effect_pendulum`).
    pub frame_type: Option<&'a str>,
    /// Typeline entries from the card database (`["Dragon", "Tuner", "Effect"]`).
    pub typeline: &'a [String],
}

/// Canonical display type plus tag set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    /// Terse display type, never containing `Tuner` or `Effect`.
    pub display_type: String,
    /// De-duplicated tags.
    pub type_tags: Vec<String>,
}

#[derive(Debug, Default)]
struct FrameSignal {
    normal: bool,
    effect: bool,
    monster: bool,
    spell_or_trap: bool,
    keywords: Vec<&'static str>,
}

/// Frame types are lowercase underscore-joined words (`xyz_pendulum`).
fn parse_frame(frame: &str) -> Option<FrameSignal> {
    let frame = frame.trim();
    if frame.is_empty() || frame.chars().any(|ch| ch.is_ascii_uppercase()) {
        return None;
    }

    let mut signal = FrameSignal {
        monster: true,
        ..FrameSignal::default()
    };
    for part in frame.split('_') {
        match part {
            "normal" => signal.normal = true,
            "effect" => signal.effect = true,
            "ritual" => signal.keywords.push("Ritual"),
            "fusion" => signal.keywords.push("Fusion"),
            "synchro" => signal.keywords.push("Synchro"),
            "xyz" => signal.keywords.push("Xyz"),
            "link" => signal.keywords.push("Link"),
            "pendulum" => signal.keywords.push("Pendulum"),
            "spell" | "trap" => {
                signal.spell_or_trap = true;
                signal.monster = false;
            }
            "token" | "skill" => signal.monster = false,
            _ => return None,
        }
    }
    Some(signal)
}

fn has_tag(tags: &[String], tag: &str) -> bool {
    tags.iter().any(|existing| existing == tag)
}

fn push_unique(tags: &mut Vec<String>, tag: &str) {
    if !tag.is_empty() && !has_tag(tags, tag) {
        tags.push(tag.to_string());
    }
}

fn remove_tag(tags: &mut Vec<String>, tag: &str) -> bool {
    let before = tags.len();
    tags.retain(|existing| existing != tag);
    before != tags.len()
}

/// Whether canonical tags route a card to the extra deck.
pub fn is_extra_deck(tags: &[String]) -> bool {
    EXTRA_DECK_TAGS.iter().any(|tag| has_tag(tags, tag))
}

/// Normalise a raw card type into `{ displayType, typeTags }`.
pub fn classify_type(input: &TypeInput<'_>) -> Classification {
    let raw = input.raw_type.trim();

    let mut tags: Vec<String> = Vec::new();
    for tag in input.existing_tags {
        push_unique(&mut tags, tag.trim());
    }

    let mut frame = input.frame_type.and_then(parse_frame);
    if tags.is_empty() {
        if let Some(race) = input.race {
            let primary = race.split('/').next().unwrap_or_default().trim();
            push_unique(&mut tags, primary);
        }
        if let Some(sub_type) = input.sub_type {
            match parse_frame(sub_type) {
                Some(legacy_frame) => {
                    if frame.is_none() {
                        frame = Some(legacy_frame);
                    }
                }
                None => push_unique(&mut tags, sub_type.trim()),
            }
        }
    }
    let frame_known = frame.is_some();
    let frame = frame.unwrap_or_default();

    for keyword in MECHANICAL_KEYWORDS {
        if raw.contains(keyword) {
            push_unique(&mut tags, keyword);
        }
    }
    if raw.contains("XYZ") {
        push_unique(&mut tags, "Xyz");
    }
    for keyword in &frame.keywords {
        push_unique(&mut tags, keyword);
    }

    let spell_or_trap = raw.contains("Spell") || raw.contains("Trap") || frame.spell_or_trap;
    let is_monster = !spell_or_trap
        && (raw.contains("Monster")
            || (frame_known && frame.monster)
            || has_tag(&tags, EFFECT_TAG)
            || has_tag(&tags, NON_EFFECT_TAG)
            || MONSTER_ONLY_TAGS.iter().any(|tag| has_tag(&tags, tag)));

    if is_monster {
        resolve_effect(raw, input.typeline, &frame, &mut tags);
    } else if remove_tag(&mut tags, EFFECT_TAG) | remove_tag(&mut tags, NON_EFFECT_TAG) {
        debug!(raw_type = raw, "dropped effect classification from non-monster");
    }

    let mut display_type = raw.to_string();
    if is_monster {
        let generic = GENERIC_TYPES.contains(&raw);
        let ambiguous = raw.is_empty()
            || !(raw.contains("Monster") || raw.contains("Spell") || raw.contains("Trap"));
        if generic || ambiguous {
            let dominant = DISPLAY_PRIORITY
                .iter()
                .find(|(required, _)| required.iter().all(|tag| has_tag(&tags, tag)))
                .map(|(_, label)| *label);
            display_type = match dominant {
                Some(label) => label.to_string(),
                None if ambiguous => "Monster".to_string(),
                None => raw.to_string(),
            };
        }
    }

    Classification {
        display_type: clean_display_type(&display_type),
        type_tags: tags,
    }
}

fn resolve_effect(raw: &str, typeline: &[String], frame: &FrameSignal, tags: &mut Vec<String>) {
    let normal_signal = frame.normal || raw.contains("Normal");
    if normal_signal {
        if remove_tag(tags, EFFECT_TAG) {
            warn!(raw_type = raw, "normal frame overrides conflicting Effect tag");
        }
        push_unique(tags, NON_EFFECT_TAG);
        push_unique(tags, "Normal");
        return;
    }

    let effect_signal = frame.effect
        || raw.contains("Effect")
        || typeline
            .iter()
            .any(|entry| entry.trim().eq_ignore_ascii_case("effect"))
        || EFFECT_IMPLYING.iter().any(|tag| has_tag(tags, tag));

    if effect_signal {
        if remove_tag(tags, NON_EFFECT_TAG) {
            warn!(raw_type = raw, "effect signal overrides stale Non-Effect tag");
        }
        push_unique(tags, EFFECT_TAG);
    } else if has_tag(tags, NON_EFFECT_TAG) {
        remove_tag(tags, EFFECT_TAG);
    } else if !has_tag(tags, EFFECT_TAG) {
        push_unique(tags, NON_EFFECT_TAG);
    }
}

fn clean_display_type(display_type: &str) -> String {
    let stripped = display_type.replace("Tuner", "").replace("Effect", "");
    WHITESPACE_RE.replace_all(&stripped, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn reclassify(first: &Classification) -> Classification {
        classify_type(&TypeInput {
            raw_type: &first.display_type,
            existing_tags: &first.type_tags,
            ..TypeInput::default()
        })
    }

    fn effect_count(classification: &Classification) -> usize {
        classification
            .type_tags
            .iter()
            .filter(|tag| tag.as_str() == EFFECT_TAG || tag.as_str() == NON_EFFECT_TAG)
            .count()
    }

    #[test]
    fn synchro_tuner_effect_dragon() {
        let result = classify_type(&TypeInput {
            raw_type: "Synchro Tuner Effect Monster",
            race: Some("Dragon"),
            ..TypeInput::default()
        });
        assert_eq!(result.display_type, "Synchro Monster");
        for expected in ["Dragon", "Synchro", "Tuner", "Effect"] {
            assert!(result.type_tags.iter().any(|tag| tag == expected), "missing {expected}");
        }
        assert!(!result.type_tags.iter().any(|tag| tag == NON_EFFECT_TAG));
    }

    #[test]
    fn normal_monster_drops_stray_effect() {
        let existing = tags(&["Effect"]);
        let result = classify_type(&TypeInput {
            raw_type: "Normal Monster",
            existing_tags: &existing,
            ..TypeInput::default()
        });
        assert_eq!(result.display_type, "Normal Monster");
        let mut sorted = result.type_tags.clone();
        sorted.sort();
        assert_eq!(sorted, tags(&["Non-Effect", "Normal"]));
    }

    #[test]
    fn normal_frame_beats_effect_typeline() {
        let typeline = tags(&["Spellcaster", "Effect"]);
        let result = classify_type(&TypeInput {
            raw_type: "Monster",
            race: Some("Spellcaster"),
            frame_type: Some("normal"),
            typeline: &typeline,
            ..TypeInput::default()
        });
        assert!(result.type_tags.contains(&NON_EFFECT_TAG.to_string()));
        assert!(!result.type_tags.contains(&EFFECT_TAG.to_string()));
        assert_eq!(result.display_type, "Normal Monster");
    }

    #[test]
    fn effect_implying_subtypes_mark_effect() {
        let result = classify_type(&TypeInput {
            raw_type: "Gemini Monster",
            race: Some("Warrior"),
            ..TypeInput::default()
        });
        assert!(result.type_tags.contains(&EFFECT_TAG.to_string()));
        assert_eq!(result.display_type, "Gemini Monster");
    }

    #[test]
    fn generic_effect_monster_collapses_to_monster() {
        let result = classify_type(&TypeInput {
            raw_type: "Effect Monster",
            race: Some("Fiend"),
            ..TypeInput::default()
        });
        assert_eq!(result.display_type, "Monster");
        assert_eq!(result.type_tags, tags(&["Fiend", "Effect"]));
    }

    #[test]
    fn frame_contributes_mechanical_keywords() {
        let result = classify_type(&TypeInput {
            raw_type: "Monster",
            frame_type: Some("synchro_pendulum"),
            typeline: &tags(&["Dragon", "Synchro", "Pendulum", "Effect"]),
            ..TypeInput::default()
        });
        assert!(result.type_tags.contains(&"Synchro".to_string()));
        assert!(result.type_tags.contains(&"Pendulum".to_string()));
        assert!(result.type_tags.contains(&EFFECT_TAG.to_string()));
        assert_eq!(result.display_type, "Pendulum Monster");
    }

    #[test]
    fn legacy_lowercase_subtype_is_a_frame_signal() {
        let result = classify_type(&TypeInput {
            raw_type: "Monster",
            race: Some("Dragon"),
            sub_type: Some("normal"),
            ..TypeInput::default()
        });
        assert!(!result.type_tags.contains(&"normal".to_string()));
        assert!(result.type_tags.contains(&NON_EFFECT_TAG.to_string()));
        assert_eq!(result.display_type, "Normal Monster");
    }

    #[test]
    fn legacy_uppercase_xyz_maps_to_tag() {
        let result = classify_type(&TypeInput {
            raw_type: "XYZ Monster",
            race: Some("Machine"),
            ..TypeInput::default()
        });
        assert!(result.type_tags.contains(&"Xyz".to_string()));
        assert!(is_extra_deck(&result.type_tags));
    }

    #[test]
    fn race_keeps_primary_segment() {
        let result = classify_type(&TypeInput {
            raw_type: "Link Monster",
            race: Some("Cyberse / Link"),
            typeline: &tags(&["Cyberse", "Link", "Effect"]),
            ..TypeInput::default()
        });
        assert_eq!(result.type_tags[0], "Cyberse");
        assert_eq!(result.display_type, "Link Monster");
    }

    #[test]
    fn spells_and_traps_carry_no_effect_tag() {
        let result = classify_type(&TypeInput {
            raw_type: "Spell Card",
            race: Some("Continuous"),
            ..TypeInput::default()
        });
        assert_eq!(result.display_type, "Spell Card");
        assert_eq!(result.type_tags, tags(&["Continuous"]));

        let stale = tags(&["Counter", "Effect"]);
        let trap = classify_type(&TypeInput {
            raw_type: "Trap Card",
            existing_tags: &stale,
            ..TypeInput::default()
        });
        assert_eq!(trap.type_tags, tags(&["Counter"]));
    }

    #[test]
    fn classification_is_a_fixed_point() {
        let cases: Vec<TypeInput<'static>> = vec![
            TypeInput {
                raw_type: "Synchro Tuner Effect Monster",
                race: Some("Dragon"),
                ..TypeInput::default()
            },
            TypeInput {
                raw_type: "Normal Tuner Monster",
                race: Some("Spellcaster"),
                ..TypeInput::default()
            },
            TypeInput {
                raw_type: "Pendulum Normal Monster",
                race: Some("Dragon"),
                ..TypeInput::default()
            },
            TypeInput {
                raw_type: "Pendulum Effect Monster",
                race: Some("Dragon"),
                ..TypeInput::default()
            },
            TypeInput {
                raw_type: "Flip Effect Monster",
                race: Some("Insect"),
                ..TypeInput::default()
            },
            TypeInput {
                raw_type: "Fusion Monster",
                race: Some("Dragon"),
                ..TypeInput::default()
            },
            TypeInput {
                raw_type: "Effect Monster",
                race: Some("Zombie"),
                ..TypeInput::default()
            },
            TypeInput {
                raw_type: "",
                race: Some("Warrior"),
                sub_type: Some("Union"),
                ..TypeInput::default()
            },
            TypeInput {
                raw_type: "Spell Card",
                race: Some("Quick-Play"),
                ..TypeInput::default()
            },
        ];

        for case in &cases {
            let first = classify_type(case);
            let second = reclassify(&first);
            assert_eq!(first, second, "not a fixed point for {:?}", case.raw_type);
            if !case.raw_type.contains("Spell") {
                assert_eq!(effect_count(&first), 1, "exclusivity for {:?}", case.raw_type);
            }
            assert!(!first.display_type.contains("Tuner"));
            assert!(!first.display_type.contains("Effect"));
        }
    }
}
