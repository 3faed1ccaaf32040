use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::slug::ItemSlug;

/// The damage categories recognized by the identify-text grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageType {
    Slash,
    Pierce,
    Bash,
    Acid,
    Energy,
    Holy,
    Poison,
    Fire,
    Cold,
    Lightning,
    Negative,
    Mental,
    Disease,
    Drowning,
    Sound,
    Air,
    Earth,
}

impl DamageType {
    /// All damage categories in catalog order.
    pub const ALL: [Self; 17] = [
        Self::Slash,
        Self::Pierce,
        Self::Bash,
        Self::Acid,
        Self::Energy,
        Self::Holy,
        Self::Poison,
        Self::Fire,
        Self::Cold,
        Self::Lightning,
        Self::Negative,
        Self::Mental,
        Self::Disease,
        Self::Drowning,
        Self::Sound,
        Self::Air,
        Self::Earth,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Slash => "slash",
            Self::Pierce => "pierce",
            Self::Bash => "bash",
            Self::Acid => "acid",
            Self::Energy => "energy",
            Self::Holy => "holy",
            Self::Poison => "poison",
            Self::Fire => "fire",
            Self::Cold => "cold",
            Self::Lightning => "lightning",
            Self::Negative => "negative",
            Self::Mental => "mental",
            Self::Disease => "disease",
            Self::Drowning => "drowning",
            Self::Sound => "sound",
            Self::Air => "air",
            Self::Earth => "earth",
        }
    }
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown damage category string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDamageType {
    pub raw: String,
}

impl fmt::Display for UnknownDamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown damage category '{}'", self.raw)
    }
}

impl std::error::Error for UnknownDamageType {}

impl FromStr for DamageType {
    type Err = UnknownDamageType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|dt| dt.as_str() == normalized)
            .ok_or_else(|| UnknownDamageType { raw: s.to_string() })
    }
}

/// Named "when worn" stat modifiers with a dedicated field per stat.
///
/// Armor-class and damage-roll modifiers are aggregate fields on
/// [`CanonicalItem`] instead, mirroring how the identify text groups them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatMods {
    pub strength: Option<i64>,
    pub dexterity: Option<i64>,
    pub constitution: Option<i64>,
    pub mana: Option<i64>,
    pub health: Option<i64>,
    pub hit_roll: Option<i64>,
}

impl StatMods {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.strength.is_none()
            && self.dexterity.is_none()
            && self.constitution.is_none()
            && self.mana.is_none()
            && self.health.is_none()
            && self.hit_roll.is_none()
    }

    /// Named (label, value) pairs for every present modifier, in a fixed
    /// order. Used to render search text and human output.
    #[must_use]
    pub fn entries(&self) -> Vec<(&'static str, i64)> {
        [
            ("strength", self.strength),
            ("dexterity", self.dexterity),
            ("constitution", self.constitution),
            ("mana", self.mana),
            ("health", self.health),
            ("hit roll", self.hit_roll),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.map(|v| (label, v)))
        .collect()
    }
}

/// Categories that default to hidden at creation time. Consumables are
/// staged for moderator review before they show up in listings.
pub const CONSUMABLE_CATEGORIES: [&str; 5] = [
    "potion",
    "magical wand",
    "magical staff",
    "pill",
    "magical scroll",
];

/// Whether a freshly created item of this category starts hidden.
#[must_use]
pub fn default_hidden(category: &str) -> bool {
    let lowered = category.to_ascii_lowercase();
    CONSUMABLE_CATEGORIES.iter().any(|c| lowered.contains(c))
}

/// The deduplicated, merged view of one item across every submission that
/// resolves to the same slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalItem {
    pub slug: ItemSlug,
    pub name: String,
    pub level: i64,
    pub category: String,
    pub slot: Option<String>,
    pub damage_type: Option<DamageType>,
    pub avg_damage: Option<i64>,
    /// Rounded mean of the four armor-class resistances.
    pub ac_apply: Option<i64>,
    /// "Modifies armor class by N" aggregate from the when-worn block.
    pub ac_bonus: Option<i64>,
    /// "Modifies damage roll by N" aggregate from the when-worn block.
    pub damroll_bonus: Option<i64>,
    pub stat_mods: StatMods,
    /// Distinct origin locations ever observed, in first-sighting order.
    /// Append-only: merges never remove members.
    pub locations: Vec<String>,
    pub hidden: bool,
    /// When set, the item is withheld from listings until this instant.
    pub visible_after_us: Option<i64>,
    /// Set once at creation, never overwritten by later merges.
    pub first_poster: Option<String>,
    pub search_text: String,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

impl CanonicalItem {
    /// Record an origin location, preserving set semantics and first-sighting
    /// order. Returns `true` if the location was new.
    pub fn observe_location(&mut self, location: &str) -> bool {
        if self.locations.iter().any(|l| l == location) {
            return false;
        }
        self.locations.push(location.to_string());
        true
    }
}
