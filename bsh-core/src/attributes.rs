//! Attributes and their derivation.
//!
//! A character sheet stores base scores and flat modifiers (origin,
//! background, equipment). The derived value is what every check rolls
//! under.

use crate::config::RulesConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The six attributes of the ruleset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Attribute {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Willpower,
    Charisma,
}

impl Attribute {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Attribute::Strength => "STR",
            Attribute::Dexterity => "DEX",
            Attribute::Constitution => "CON",
            Attribute::Intelligence => "INT",
            Attribute::Willpower => "WIL",
            Attribute::Charisma => "CHA",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Attribute::Strength => "Strength",
            Attribute::Dexterity => "Dexterity",
            Attribute::Constitution => "Constitution",
            Attribute::Intelligence => "Intelligence",
            Attribute::Willpower => "Willpower",
            Attribute::Charisma => "Charisma",
        }
    }

    pub fn all() -> [Attribute; 6] {
        [
            Attribute::Strength,
            Attribute::Dexterity,
            Attribute::Constitution,
            Attribute::Intelligence,
            Attribute::Willpower,
            Attribute::Charisma,
        ]
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

/// Where a flat attribute modifier comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModifierSource {
    Origin,
    Background,
    Equipment,
    Other,
}

/// A flat bonus or penalty to one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeModifier {
    pub attribute: Attribute,
    pub value: i32,
    pub source: ModifierSource,
    pub label: String,
}

/// Raw character-sheet statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterStats {
    /// Base scores as written on the sheet. Absent entries were never rolled.
    #[serde(default)]
    pub base: BTreeMap<Attribute, i32>,
    #[serde(default)]
    pub modifiers: Vec<AttributeModifier>,
}

impl CharacterStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a base score.
    pub fn with_base(mut self, attribute: Attribute, value: i32) -> Self {
        self.base.insert(attribute, value);
        self
    }

    /// Set all six base scores in sheet order (STR, DEX, CON, INT, WIL, CHA).
    pub fn with_scores(mut self, scores: [i32; 6]) -> Self {
        for (attribute, value) in Attribute::all().into_iter().zip(scores) {
            self.base.insert(attribute, value);
        }
        self
    }

    /// Add a flat modifier.
    pub fn with_modifier(
        mut self,
        attribute: Attribute,
        value: i32,
        source: ModifierSource,
        label: impl Into<String>,
    ) -> Self {
        self.modifiers.push(AttributeModifier {
            attribute,
            value,
            source,
            label: label.into(),
        });
        self
    }
}

/// Result of attribute derivation.
///
/// A missing entry is the "not a number" case: callers substitute the
/// configured default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedAttributes {
    #[serde(default)]
    pub values: BTreeMap<Attribute, i32>,
}

impl DerivedAttributes {
    pub fn get(&self, attribute: Attribute) -> Option<i32> {
        self.values.get(&attribute).copied()
    }

    /// The value, or the configured default when it could not be derived.
    pub fn get_or_default(&self, attribute: Attribute, config: &RulesConfig) -> i32 {
        self.get(attribute).unwrap_or(config.default_attribute)
    }

    pub fn willpower(&self) -> Option<i32> {
        self.get(Attribute::Willpower)
    }
}

/// Attribute derivation rules, injected by the host.
///
/// Implementations must be pure: the same stats and config always derive
/// the same attributes.
pub trait AttributeDerivation: Send + Sync {
    fn derive(&self, stats: &CharacterStats, config: &RulesConfig) -> DerivedAttributes;
}

/// Base score plus every modifier, clamped to the configured range.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardDerivation;

impl AttributeDerivation for StandardDerivation {
    fn derive(&self, stats: &CharacterStats, config: &RulesConfig) -> DerivedAttributes {
        derive_attributes(stats, config)
    }
}

/// Derive every attribute that has a base score.
pub fn derive_attributes(stats: &CharacterStats, config: &RulesConfig) -> DerivedAttributes {
    let values = stats
        .base
        .iter()
        .map(|(&attribute, &base)| {
            let bonus: i32 = stats
                .modifiers
                .iter()
                .filter(|m| m.attribute == attribute)
                .map(|m| m.value)
                .sum();
            (attribute, config.clamp(base.saturating_add(bonus)))
        })
        .collect();

    DerivedAttributes { values }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_applies_modifiers() {
        let stats = CharacterStats::new()
            .with_scores([12, 9, 14, 8, 11, 10])
            .with_modifier(Attribute::Willpower, 2, ModifierSource::Origin, "Sorcerer-born")
            .with_modifier(Attribute::Willpower, -1, ModifierSource::Equipment, "Cursed ring")
            .with_modifier(Attribute::Strength, 1, ModifierSource::Background, "Mercenary");

        let derived = derive_attributes(&stats, &RulesConfig::default());
        assert_eq!(derived.willpower(), Some(12));
        assert_eq!(derived.get(Attribute::Strength), Some(13));
        assert_eq!(derived.get(Attribute::Charisma), Some(10));
    }

    #[test]
    fn test_derive_clamps_to_range() {
        let stats = CharacterStats::new()
            .with_base(Attribute::Willpower, 17)
            .with_base(Attribute::Dexterity, 4)
            .with_modifier(Attribute::Willpower, 3, ModifierSource::Other, "Demon pact")
            .with_modifier(Attribute::Dexterity, -3, ModifierSource::Other, "Wounded leg");

        let derived = derive_attributes(&stats, &RulesConfig::default());
        assert_eq!(derived.willpower(), Some(18));
        assert_eq!(derived.get(Attribute::Dexterity), Some(3));
    }

    #[test]
    fn test_missing_base_is_not_derived() {
        let stats = CharacterStats::new()
            .with_base(Attribute::Strength, 10)
            .with_modifier(Attribute::Willpower, 2, ModifierSource::Origin, "Orphan");

        let config = RulesConfig::default();
        let derived = StandardDerivation.derive(&stats, &config);
        assert_eq!(derived.willpower(), None);
        assert_eq!(derived.get_or_default(Attribute::Willpower, &config), 10);
    }

    #[test]
    fn test_attribute_display() {
        assert_eq!(Attribute::Willpower.to_string(), "WIL");
        assert_eq!(Attribute::all().len(), 6);
    }
}
