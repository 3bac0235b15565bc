use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Print rarity. Unlisted upstream values are kept verbatim in
/// [`Rarity::Other`] so distinct prints never share an identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rarity {
    /// Common.
    #[default]
    Common,
    /// Rare.
    Rare,
    /// Super Rare.
    SuperRare,
    /// Ultra Rare.
    UltraRare,
    /// Secret Rare.
    SecretRare,
    /// Ultimate Rare.
    UltimateRare,
    /// Ghost Rare.
    GhostRare,
    /// Gold Rare.
    GoldRare,
    /// Prismatic Secret Rare.
    PrismaticSecretRare,
    /// Collector's Rare.
    CollectorsRare,
    /// Quarter Century Secret Rare.
    QuarterCenturySecretRare,
    /// Starfoil Rare.
    StarfoilRare,
    /// Mosaic Rare.
    MosaicRare,
    /// Shatterfoil Rare.
    ShatterfoilRare,
    /// Short Print.
    ShortPrint,
    /// Parallel Rare.
    ParallelRare,
    /// Any label not listed above, as it was received.
    Other(String),
}

const OTHER_LABEL: &str = "Other";

impl Rarity {
    /// Every listed rarity in display/sort order. [`Rarity::Other`] sorts after all of them.
    pub const ALL: [Rarity; 16] = [
        Rarity::Common,
        Rarity::Rare,
        Rarity::SuperRare,
        Rarity::UltraRare,
        Rarity::SecretRare,
        Rarity::UltimateRare,
        Rarity::GhostRare,
        Rarity::GoldRare,
        Rarity::PrismaticSecretRare,
        Rarity::CollectorsRare,
        Rarity::QuarterCenturySecretRare,
        Rarity::StarfoilRare,
        Rarity::MosaicRare,
        Rarity::ShatterfoilRare,
        Rarity::ShortPrint,
        Rarity::ParallelRare,
    ];

    /// Human readable label, also the persisted form and the identity-key segment.
    pub fn as_str(&self) -> &str {
        match self {
            Rarity::Common => "Common",
            Rarity::Rare => "Rare",
            Rarity::SuperRare => "Super Rare",
            Rarity::UltraRare => "Ultra Rare",
            Rarity::SecretRare => "Secret Rare",
            Rarity::UltimateRare => "Ultimate Rare",
            Rarity::GhostRare => "Ghost Rare",
            Rarity::GoldRare => "Gold Rare",
            Rarity::PrismaticSecretRare => "Prismatic Secret Rare",
            Rarity::CollectorsRare => "Collector's Rare",
            Rarity::QuarterCenturySecretRare => "Quarter Century Secret Rare",
            Rarity::StarfoilRare => "Starfoil Rare",
            Rarity::MosaicRare => "Mosaic Rare",
            Rarity::ShatterfoilRare => "Shatterfoil Rare",
            Rarity::ShortPrint => "Short Print",
            Rarity::ParallelRare => "Parallel Rare",
            Rarity::Other(label) => label.as_str(),
        }
    }

    /// Case-insensitive parse. Unlisted labels keep their trimmed text;
    /// a blank label becomes `Other`.
    pub fn parse(input: &str) -> Self {
        let needle = input.trim();
        if let Some(known) = Self::ALL
            .iter()
            .find(|rarity| rarity.as_str().eq_ignore_ascii_case(needle))
        {
            return known.clone();
        }
        if needle.is_empty() {
            Rarity::Other(OTHER_LABEL.to_string())
        } else {
            Rarity::Other(needle.to_string())
        }
    }

    /// Whether this is an unlisted rarity.
    pub fn is_other(&self) -> bool {
        matches!(self, Rarity::Other(_))
    }

    /// Position in the sort order; every unlisted rarity shares the last rank.
    pub fn rank(&self) -> usize {
        Self::ALL
            .iter()
            .position(|rarity| rarity == self)
            .unwrap_or(Self::ALL.len())
    }

    /// Styling slug, e.g. `rarity-ultra-rare` or `rarity-collectors-rare`.
    pub fn slug(&self) -> String {
        let cleaned: String = self
            .as_str()
            .to_lowercase()
            .chars()
            .filter(|ch| !matches!(ch, '\'' | '.'))
            .map(|ch| if ch == ' ' { '-' } else { ch })
            .collect();
        format!("rarity-{cleaned}")
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Rarity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Rarity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Rarity::parse(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive_with_fallback() {
        assert_eq!(Rarity::parse("ultra rare"), Rarity::UltraRare);
        assert_eq!(Rarity::parse(" Collector's Rare "), Rarity::CollectorsRare);
        assert_eq!(Rarity::parse("Premium Gold Rare"), Rarity::Other("Premium Gold Rare".into()));
        assert_eq!(Rarity::parse("  "), Rarity::Other("Other".into()));
    }

    #[test]
    fn unlisted_labels_stay_distinct() -> serde_json::Result<()> {
        let platinum = Rarity::parse("Platinum Secret Rare");
        let prismatic = Rarity::parse("Prismatic Ultimate Rare");
        assert_ne!(platinum, prismatic);
        assert_eq!(platinum.as_str(), "Platinum Secret Rare");

        let stored = serde_json::to_string(&platinum)?;
        assert_eq!(stored, "\"Platinum Secret Rare\"");
        assert_eq!(serde_json::from_str::<Rarity>(&stored)?, platinum);
        Ok(())
    }

    #[test]
    fn slug_strips_punctuation() {
        assert_eq!(Rarity::UltraRare.slug(), "rarity-ultra-rare");
        assert_eq!(Rarity::CollectorsRare.slug(), "rarity-collectors-rare");
    }

    #[test]
    fn rank_follows_declaration_order() {
        assert!(Rarity::Common.rank() < Rarity::SecretRare.rank());
        assert!(Rarity::ParallelRare.rank() < Rarity::parse("Starlight Rare").rank());
        assert_eq!(Rarity::parse("Starlight Rare").rank(), Rarity::ALL.len());
    }
}
