//! Testing utilities.
//!
//! This module provides tools for deterministic tests:
//! - `ScriptedRoller` returns fixed die faces instead of random ones
//! - `RecordingStore` records every batch and can reject them
//! - `EncounterFixture` for building scripted encounters
//! - Assertion helpers for verifying combatant state

use crate::attributes::{Attribute, CharacterStats, StandardDerivation};
use crate::config::ResolverConfig;
use crate::dice::{DiceError, DiceRoller, DieType};
use crate::encounter::{Combatant, CombatantId, Critical, Encounter, Entity, InitiativeUpdate};
use crate::initiative::InitiativeResolver;
use crate::store::{CombatantStore, InMemoryStore, StoreError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A randomness engine that plays back scripted faces.
///
/// Fails once the script runs out, or on every draw if built with
/// [`ScriptedRoller::failing`].
pub struct ScriptedRoller {
    faces: Mutex<VecDeque<u32>>,
    draws: Mutex<Vec<DieType>>,
}

impl ScriptedRoller {
    pub fn new(faces: impl IntoIterator<Item = u32>) -> Self {
        Self {
            faces: Mutex::new(faces.into_iter().collect()),
            draws: Mutex::new(Vec::new()),
        }
    }

    /// An engine whose every draw fails.
    pub fn failing() -> Self {
        Self::new(Vec::new())
    }

    /// Dice drawn so far.
    pub async fn draws(&self) -> Vec<DieType> {
        self.draws.lock().await.clone()
    }

    /// Faces not yet drawn.
    pub async fn remaining(&self) -> usize {
        self.faces.lock().await.len()
    }
}

#[async_trait]
impl DiceRoller for ScriptedRoller {
    async fn draw(&self, die: DieType) -> Result<u32, DiceError> {
        let face = self
            .faces
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| DiceError::Engine(format!("no scripted face left for {die}")))?;
        self.draws.lock().await.push(die);
        Ok(face)
    }
}

/// A store wrapper that records batches and can refuse them.
pub struct RecordingStore {
    inner: InMemoryStore,
    batches: Mutex<Vec<Vec<InitiativeUpdate>>>,
    reject: bool,
}

impl RecordingStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            batches: Mutex::new(Vec::new()),
            reject: false,
        }
    }

    /// A store that rejects every batch.
    pub fn rejecting(inner: InMemoryStore) -> Self {
        Self {
            reject: true,
            ..Self::new(inner)
        }
    }

    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }

    /// Every batch submitted, accepted or not.
    pub async fn batches(&self) -> Vec<Vec<InitiativeUpdate>> {
        self.batches.lock().await.clone()
    }
}

#[async_trait]
impl CombatantStore for RecordingStore {
    async fn find_combatant(&self, id: CombatantId) -> Option<Combatant> {
        self.inner.find_combatant(id).await
    }

    async fn find_controlling_entity(&self, combatant: &Combatant) -> Option<Entity> {
        self.inner.find_controlling_entity(combatant).await
    }

    async fn batch_update(&self, updates: &[InitiativeUpdate]) -> Result<(), StoreError> {
        self.batches.lock().await.push(updates.to_vec());
        if self.reject {
            return Err(StoreError::Rejected("store is read-only".to_string()));
        }
        self.inner.batch_update(updates).await
    }
}

/// Builder for scripted encounters.
pub struct EncounterFixture {
    pub store: Arc<RecordingStore>,
}

impl EncounterFixture {
    pub fn new() -> Self {
        Self::with_store(RecordingStore::new(InMemoryStore::new(Encounter::new(
            "Test Encounter",
        ))))
    }

    /// A fixture whose store rejects every batch.
    pub fn rejecting() -> Self {
        Self::with_store(RecordingStore::rejecting(InMemoryStore::new(
            Encounter::new("Test Encounter"),
        )))
    }

    fn with_store(store: RecordingStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Add a player character with the given base Willpower.
    pub async fn pc(&self, name: &str, willpower: i32) -> CombatantId {
        let stats = CharacterStats::new().with_base(Attribute::Willpower, willpower);
        self.enlist(Entity::player_character(name, stats)).await
    }

    pub async fn npc(&self, name: &str, willpower: Option<i32>) -> CombatantId {
        self.enlist(Entity::non_player(name, willpower)).await
    }

    pub async fn enlist(&self, entity: Entity) -> CombatantId {
        self.store.inner().enlist(entity).await
    }

    /// Add a combatant with no controlling entity.
    pub async fn orphan(&self, name: &str) -> CombatantId {
        self.store
            .inner()
            .add_combatant(Combatant::new(name, None))
            .await
    }

    pub async fn combatant(&self, id: CombatantId) -> Option<Combatant> {
        self.store.find_combatant(id).await
    }

    pub async fn encounter(&self) -> Option<Encounter> {
        self.store.inner().encounter().await
    }

    /// A resolver over this fixture's store using the standard derivation.
    pub fn resolver(&self, roller: ScriptedRoller) -> InitiativeResolver {
        self.resolver_with(roller, ResolverConfig::default())
    }

    pub fn resolver_with(&self, roller: ScriptedRoller, config: ResolverConfig) -> InitiativeResolver {
        InitiativeResolver::new(
            self.store.clone(),
            Arc::new(roller),
            Arc::new(StandardDerivation),
        )
        .with_config(config)
    }
}

impl Default for EncounterFixture {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert a combatant holds the given rank and critical flag.
#[track_caller]
pub fn assert_ranked(combatant: &Combatant, rank: i32, critical: Option<Critical>) {
    assert_eq!(
        (combatant.rank, combatant.critical),
        (Some(rank), critical),
        "Expected {} to have rank {rank} and critical {critical:?}",
        combatant.name
    );
}

/// Assert a combatant has never been ranked.
#[track_caller]
pub fn assert_unranked(combatant: &Combatant) {
    assert!(
        combatant.rank.is_none() && combatant.critical.is_none(),
        "Expected {} to have no initiative, got {:?}/{:?}",
        combatant.name,
        combatant.rank,
        combatant.critical
    );
}
