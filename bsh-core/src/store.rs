//! The combatant/entity store seam.
//!
//! The host owns combatant and actor documents. The rules code only sees
//! them through [`CombatantStore`]: look a combatant up by id, follow it to
//! its controlling entity, and write initiative back in one batch.

use crate::encounter::{Combatant, CombatantId, Encounter, Entity, EntityId, InitiativeUpdate};
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors from store mutations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Combatant not found: {0}")]
    UnknownCombatant(CombatantId),

    #[error("Batch update rejected: {0}")]
    Rejected(String),
}

/// Access to host-owned combatant and entity records.
#[async_trait]
pub trait CombatantStore: Send + Sync {
    async fn find_combatant(&self, id: CombatantId) -> Option<Combatant>;

    async fn find_controlling_entity(&self, combatant: &Combatant) -> Option<Entity>;

    /// Apply every update as one operation, or none of them.
    async fn batch_update(&self, updates: &[InitiativeUpdate]) -> Result<(), StoreError>;
}

/// Everything an [`InMemoryStore`] holds.
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    pub encounter: Option<Encounter>,
    pub entities: HashMap<EntityId, Entity>,
}

/// A store kept in process memory, used by the CLI and by tests.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    pub fn new(encounter: Encounter) -> Self {
        Self::from_parts(encounter, Vec::new())
    }

    pub fn from_parts(encounter: Encounter, entities: impl IntoIterator<Item = Entity>) -> Self {
        Self {
            state: RwLock::new(StoreState {
                encounter: Some(encounter),
                entities: entities.into_iter().map(|e| (e.id, e)).collect(),
            }),
        }
    }

    /// Remove an entity, leaving any combatant it controlled dangling.
    pub async fn remove_entity(&self, id: EntityId) -> Option<Entity> {
        self.state.write().await.entities.remove(&id)
    }

    /// Add `entity` and a combatant controlled by it.
    pub async fn enlist(&self, entity: Entity) -> CombatantId {
        let combatant = Combatant::for_entity(&entity);
        let mut state = self.state.write().await;
        state.entities.insert(entity.id, entity);
        state
            .encounter
            .get_or_insert_with(|| Encounter::new("Encounter"))
            .add_combatant(combatant)
    }

    pub async fn add_combatant(&self, combatant: Combatant) -> CombatantId {
        self.state
            .write()
            .await
            .encounter
            .get_or_insert_with(|| Encounter::new("Encounter"))
            .add_combatant(combatant)
    }

    pub async fn encounter(&self) -> Option<Encounter> {
        self.state.read().await.encounter.clone()
    }

    pub async fn snapshot(&self) -> StoreState {
        self.state.read().await.clone()
    }

    /// Run `f` against the encounter under the write lock.
    pub async fn with_encounter<R>(&self, f: impl FnOnce(&mut Encounter) -> R) -> Option<R> {
        self.state.write().await.encounter.as_mut().map(f)
    }
}

#[async_trait]
impl CombatantStore for InMemoryStore {
    async fn find_combatant(&self, id: CombatantId) -> Option<Combatant> {
        let state = self.state.read().await;
        state.encounter.as_ref()?.combatant(id).cloned()
    }

    async fn find_controlling_entity(&self, combatant: &Combatant) -> Option<Entity> {
        let entity_id = combatant.entity_id?;
        self.state.read().await.entities.get(&entity_id).cloned()
    }

    async fn batch_update(&self, updates: &[InitiativeUpdate]) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let encounter = state
            .encounter
            .as_mut()
            .ok_or_else(|| StoreError::Rejected("no active encounter".to_string()))?;

        // Validate the whole batch before touching anything.
        if let Some(missing) = updates
            .iter()
            .find(|u| encounter.combatant(u.combatant_id).is_none())
        {
            return Err(StoreError::UnknownCombatant(missing.combatant_id));
        }

        for update in updates {
            encounter.apply(update);
        }
        Ok(())
    }
}
