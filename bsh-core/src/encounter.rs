//! Encounter state: entities, combatants and the turn order.

use crate::attributes::{CharacterStats, DerivedAttributes};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for combatants within an encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CombatantId(pub Uuid);

impl CombatantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CombatantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for the entity (actor) controlling a combatant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Entities
// ============================================================================

/// Kind of entity controlling a combatant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    PlayerCharacter,
    NonPlayerEntity,
}

/// Per-kind sheet data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntitySheet {
    PlayerCharacter {
        stats: CharacterStats,
        /// Derivation result cached by the host, if it computed one.
        #[serde(default)]
        derived: Option<DerivedAttributes>,
    },
    NonPlayerEntity {
        /// Raw stored willpower. Read but not used for ranking.
        #[serde(default)]
        willpower: Option<i32>,
    },
}

/// An actor that can control combatants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub sheet: EntitySheet,
}

impl Entity {
    pub fn player_character(name: impl Into<String>, stats: CharacterStats) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            sheet: EntitySheet::PlayerCharacter {
                stats,
                derived: None,
            },
        }
    }

    pub fn non_player(name: impl Into<String>, willpower: Option<i32>) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            sheet: EntitySheet::NonPlayerEntity { willpower },
        }
    }

    /// Attach a cached derivation result (player characters only).
    pub fn with_derived(mut self, attributes: DerivedAttributes) -> Self {
        if let EntitySheet::PlayerCharacter { derived, .. } = &mut self.sheet {
            *derived = Some(attributes);
        }
        self
    }

    pub fn entity_type(&self) -> EntityType {
        match self.sheet {
            EntitySheet::PlayerCharacter { .. } => EntityType::PlayerCharacter,
            EntitySheet::NonPlayerEntity { .. } => EntityType::NonPlayerEntity,
        }
    }
}

// ============================================================================
// Combatants
// ============================================================================

/// Critical outcome of the roll behind a combatant's rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Critical {
    Success,
    Failure,
}

/// A participant in the turn order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combatant {
    pub id: CombatantId,
    pub name: String,
    /// Controlling entity; `None` or a dangling id means it cannot be resolved.
    pub entity_id: Option<EntityId>,
    /// Turn-order key, higher acts sooner. Only the initiative resolver writes it.
    #[serde(default)]
    pub rank: Option<i32>,
    /// Cleared on every re-roll. Only the initiative resolver writes it.
    #[serde(default)]
    pub critical: Option<Critical>,
    #[serde(default)]
    pub defeated: bool,
}

impl Combatant {
    pub fn new(name: impl Into<String>, entity_id: Option<EntityId>) -> Self {
        Self {
            id: CombatantId::new(),
            name: name.into(),
            entity_id,
            rank: None,
            critical: None,
            defeated: false,
        }
    }

    /// A combatant controlled by `entity`, named after it.
    pub fn for_entity(entity: &Entity) -> Self {
        Self::new(entity.name.clone(), Some(entity.id))
    }
}

/// New rank and critical flag for one combatant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeUpdate {
    pub combatant_id: CombatantId,
    pub rank: i32,
    pub critical: Option<Critical>,
}

// ============================================================================
// Encounter
// ============================================================================

/// Combat encounter tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encounter {
    pub name: String,
    pub round: u32,
    /// Index into [`Encounter::turn_order`].
    pub turn_index: usize,
    /// Combatants in the order they joined.
    pub combatants: Vec<Combatant>,
}

impl Encounter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            round: 1,
            turn_index: 0,
            combatants: Vec::new(),
        }
    }

    pub fn add_combatant(&mut self, combatant: Combatant) -> CombatantId {
        let id = combatant.id;
        self.combatants.push(combatant);
        id
    }

    pub fn combatant(&self, id: CombatantId) -> Option<&Combatant> {
        self.combatants.iter().find(|c| c.id == id)
    }

    pub fn combatant_mut(&mut self, id: CombatantId) -> Option<&mut Combatant> {
        self.combatants.iter_mut().find(|c| c.id == id)
    }

    pub fn combatant_ids(&self) -> Vec<CombatantId> {
        self.combatants.iter().map(|c| c.id).collect()
    }

    /// Combatants sorted by rank, highest first. Unranked combatants go last;
    /// equal ranks keep joining order.
    pub fn turn_order(&self) -> Vec<&Combatant> {
        let mut order: Vec<&Combatant> = self.combatants.iter().collect();
        order.sort_by_key(|c| Reverse(c.rank));
        order
    }

    pub fn current_combatant(&self) -> Option<&Combatant> {
        self.turn_order().get(self.turn_index).copied()
    }

    pub fn next_turn(&mut self) {
        self.turn_index += 1;
        if self.turn_index >= self.combatants.len() {
            self.turn_index = 0;
            self.round += 1;
        }
    }

    /// Overwrite a combatant's rank and critical flag. Returns false if the
    /// combatant is not in this encounter.
    pub fn apply(&mut self, update: &InitiativeUpdate) -> bool {
        match self.combatant_mut(update.combatant_id) {
            Some(combatant) => {
                combatant.rank = Some(update.rank);
                combatant.critical = update.critical;
                true
            }
            None => false,
        }
    }

    /// Forget every rank and critical flag and restart from the top.
    pub fn clear_initiative(&mut self) {
        for combatant in &mut self.combatants {
            combatant.rank = None;
            combatant.critical = None;
        }
        self.turn_index = 0;
    }

    pub fn all_ranked(&self) -> bool {
        self.combatants.iter().all(|c| c.rank.is_some())
    }
}
