//! Encounter save files.
//!
//! Stands in for the host's document database when the rules run outside
//! it: an encounter and the entities it references are written as one JSON
//! document.

use crate::encounter::{Encounter, Entity};
use crate::store::{InMemoryStore, StoreState};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::fs;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Nothing to save: the store has no encounter")]
    NoEncounter,

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current save file version.
const SAVE_VERSION: u32 = 1;

/// An encounter with every entity its combatants point at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedEncounter {
    /// Save format version for compatibility checking.
    pub version: u32,

    /// RFC 3339 timestamp of the save.
    pub saved_at: String,

    pub encounter: Encounter,

    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl SavedEncounter {
    pub fn new(encounter: Encounter, entities: Vec<Entity>) -> Self {
        Self {
            version: SAVE_VERSION,
            saved_at: chrono::Utc::now().to_rfc3339(),
            encounter,
            entities,
        }
    }

    /// Capture the current contents of a store.
    pub async fn capture(store: &InMemoryStore) -> Result<Self, PersistError> {
        let StoreState {
            encounter,
            entities,
        } = store.snapshot().await;
        let encounter = encounter.ok_or(PersistError::NoEncounter)?;

        let mut entities: Vec<Entity> = entities.into_values().collect();
        entities.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(Self::new(encounter, entities))
    }

    /// Turn the save back into a live store.
    pub fn into_store(self) -> InMemoryStore {
        InMemoryStore::from_parts(self.encounter, self.entities)
    }

    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        let saved: Self = serde_json::from_str(&content)?;

        if saved.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: saved.version,
            });
        }

        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::CharacterStats;
    use crate::encounter::EntitySheet;
    use std::path::PathBuf;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("bsh-encounter-{}.json", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_save_and_load_keeps_initiative() {
        let store = InMemoryStore::new(Encounter::new("Bridge of Sighs"));
        let id = store
            .enlist(Entity::player_character(
                "Aric",
                CharacterStats::new().with_scores([10, 12, 11, 9, 14, 8]),
            ))
            .await;
        store
            .with_encounter(|e| {
                let c = e.combatant_mut(id).unwrap();
                c.rank = Some(2993);
            })
            .await;

        let path = temp_path();
        SavedEncounter::capture(&store)
            .await
            .unwrap()
            .save_json(&path)
            .await
            .unwrap();
        let loaded = SavedEncounter::load_json(&path).await;
        let _ = fs::remove_file(&path).await;
        let loaded = loaded.unwrap();

        assert_eq!(loaded.encounter.name, "Bridge of Sighs");
        assert_eq!(loaded.encounter.combatant(id).unwrap().rank, Some(2993));
        assert!(matches!(
            loaded.entities[0].sheet,
            EntitySheet::PlayerCharacter { .. }
        ));
    }

    #[tokio::test]
    async fn test_version_mismatch() {
        let mut saved = SavedEncounter::new(Encounter::new("Old"), Vec::new());
        saved.version = 0;

        let path = temp_path();
        saved.save_json(&path).await.unwrap();
        let result = SavedEncounter::load_json(&path).await;
        let _ = fs::remove_file(&path).await;

        assert!(matches!(
            result,
            Err(PersistError::VersionMismatch {
                expected: 1,
                found: 0
            })
        ));
    }

    #[tokio::test]
    async fn test_empty_store_cannot_be_captured() {
        let store = InMemoryStore::default();
        assert!(matches!(
            SavedEncounter::capture(&store).await,
            Err(PersistError::NoEncounter)
        ));
    }
}
