//! Rules and resolver configuration.
//!
//! The ruleset table the host keeps globally is passed around explicitly as a
//! [`RulesConfig`]; nothing in this crate reads ambient configuration.

use crate::attributes::Attribute;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::fs;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Ruleset constants consulted by attribute derivation and checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Lowest value a derived attribute can take.
    pub attribute_floor: i32,

    /// Highest value a derived attribute can take.
    pub attribute_ceiling: i32,

    /// Substituted whenever an attribute is missing or not a number.
    pub default_attribute: i32,

    /// Attribute player characters roll under for initiative.
    pub initiative_attribute: Attribute,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            attribute_floor: 3,
            attribute_ceiling: 18,
            default_attribute: 10,
            initiative_attribute: Attribute::Willpower,
        }
    }
}

impl RulesConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the attribute bounds.
    pub fn with_attribute_range(mut self, floor: i32, ceiling: i32) -> Self {
        self.attribute_floor = floor;
        self.attribute_ceiling = ceiling;
        self
    }

    /// Set the fallback attribute value.
    pub fn with_default_attribute(mut self, value: i32) -> Self {
        self.default_attribute = value;
        self
    }

    /// Set the attribute initiative is rolled under.
    pub fn with_initiative_attribute(mut self, attribute: Attribute) -> Self {
        self.initiative_attribute = attribute;
        self
    }

    /// Clamp a value into the attribute range.
    pub fn clamp(&self, value: i32) -> i32 {
        value.clamp(self.attribute_floor, self.attribute_ceiling)
    }

    /// Check the bounds are usable with a d20 roll-under check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.attribute_floor < 1 {
            return Err(ConfigError::Invalid(format!(
                "attribute floor must be at least 1, got {}",
                self.attribute_floor
            )));
        }
        if self.attribute_ceiling > 20 {
            return Err(ConfigError::Invalid(format!(
                "attribute ceiling must be at most 20, got {}",
                self.attribute_ceiling
            )));
        }
        if self.attribute_floor > self.attribute_ceiling {
            return Err(ConfigError::Invalid(format!(
                "attribute floor {} is above ceiling {}",
                self.attribute_floor, self.attribute_ceiling
            )));
        }
        if !(self.attribute_floor..=self.attribute_ceiling).contains(&self.default_attribute) {
            return Err(ConfigError::Invalid(format!(
                "default attribute {} is outside {}..={}",
                self.default_attribute, self.attribute_floor, self.attribute_ceiling
            )));
        }
        Ok(())
    }

    /// Load and validate a JSON rules file. Missing keys take their defaults.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }
}

/// Options for an [`InitiativeResolver`](crate::initiative::InitiativeResolver).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub rules: RulesConfig,

    /// Draw every player character's die at once instead of one after the
    /// other. The ranks produced are the same either way.
    pub concurrent_draws: bool,
}

impl ResolverConfig {
    pub fn new(rules: RulesConfig) -> Self {
        Self {
            rules,
            concurrent_draws: false,
        }
    }

    /// Roll all player characters concurrently.
    pub fn with_concurrent_draws(mut self, enabled: bool) -> Self {
        self.concurrent_draws = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RulesConfig::default();
        assert_eq!(config.default_attribute, 10);
        assert_eq!(config.initiative_attribute, Attribute::Willpower);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_bounds() {
        assert!(RulesConfig::new().with_attribute_range(0, 18).validate().is_err());
        assert!(RulesConfig::new().with_attribute_range(3, 21).validate().is_err());
        assert!(RulesConfig::new().with_attribute_range(12, 8).validate().is_err());
        assert!(RulesConfig::new().with_default_attribute(19).validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RulesConfig =
            serde_json::from_str(r#"{ "default_attribute": 12 }"#).unwrap();
        assert_eq!(config.default_attribute, 12);
        assert_eq!(config.attribute_floor, 3);
        assert_eq!(config.attribute_ceiling, 18);
    }

    #[tokio::test]
    async fn test_load_json_validates() {
        let path = std::env::temp_dir().join(format!("bsh-rules-{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, r#"{ "attribute_floor": 15, "attribute_ceiling": 4 }"#)
            .await
            .unwrap();

        let result = RulesConfig::load_json(&path).await;
        let _ = tokio::fs::remove_file(&path).await;
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
