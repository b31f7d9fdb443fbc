//! Initiative ranking.
//!
//! Player characters roll a d20 under Willpower; non-player entities do not
//! roll. Every combatant lands in one of three buckets and gets an integer
//! rank, higher acting sooner:
//!
//! | bucket | who                          | rank           |
//! |--------|------------------------------|----------------|
//! | fast   | PCs that succeeded (or nat 1)| `3000 - raw`   |
//! | middle | every non-player entity      | `2000`         |
//! | slow   | PCs that failed (or nat 20)  | `1000 - raw`   |
//!
//! Inside a PC bucket the lower die acts first, and the die can always be
//! recovered from the rank. The resolver writes all ranks back in a single
//! batch; nothing is written unless every draw succeeded.

use crate::attributes::{Attribute, AttributeDerivation};
use crate::config::ResolverConfig;
use crate::dice::{draw_checked, DiceError, DiceRoller, DieType};
use crate::encounter::{
    Combatant, CombatantId, Critical, Entity, EntitySheet, EntityType, InitiativeUpdate,
};
use crate::rules::CheckOutcome;
use crate::store::{CombatantStore, StoreError};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Width of one bucket in rank space.
pub const BUCKET_SPAN: i32 = 1000;

/// Rank every non-player entity receives.
pub const NON_PLAYER_RANK: i32 = Bucket::Middle.tier() * BUCKET_SPAN;

/// Errors from a resolution attempt. Either variant means nothing was written.
#[derive(Debug, Error)]
pub enum InitiativeError {
    #[error("Initiative roll failed: {0}")]
    Dice(#[from] DiceError),

    #[error("Could not save initiative: {0}")]
    Store(#[from] StoreError),
}

/// Priority tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Bucket {
    Slow,
    Middle,
    Fast,
}

impl Bucket {
    pub const fn tier(self) -> i32 {
        match self {
            Bucket::Slow => 1,
            Bucket::Middle => 2,
            Bucket::Fast => 3,
        }
    }

    /// Rank for a d20 face. Out-of-range faces give a meaningless rank but
    /// never overflow.
    pub fn rank(self, raw: u32) -> i32 {
        let raw = i32::try_from(raw).unwrap_or(i32::MAX);
        self.tier() * BUCKET_SPAN - raw
    }
}

/// Bucket, rank and critical flag for a player character's raw die.
pub fn rank_player_character(raw: u32, willpower: i32) -> (Bucket, i32, Option<Critical>) {
    let outcome = CheckOutcome::classify(raw, willpower);
    let bucket = if outcome.is_success() {
        Bucket::Fast
    } else {
        Bucket::Slow
    };
    (bucket, bucket.rank(raw), critical_of(outcome))
}

fn critical_of(outcome: CheckOutcome) -> Option<Critical> {
    match outcome {
        CheckOutcome::CriticalSuccess => Some(Critical::Success),
        CheckOutcome::CriticalFailure => Some(Critical::Failure),
        CheckOutcome::Success | CheckOutcome::Failure => None,
    }
}

/// One combatant's initiative result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeRoll {
    pub combatant_id: CombatantId,
    pub name: String,
    pub entity_type: EntityType,
    /// Attribute the check rolls under.
    pub attribute: Attribute,
    /// Willpower used for the check. Inert for non-player entities.
    pub willpower: i32,
    /// The d20 face, or 0 when no die was rolled.
    pub raw: u32,
    pub bucket: Bucket,
    /// `None` for combatants that did not roll.
    pub outcome: Option<CheckOutcome>,
    pub rank: i32,
    pub critical: Option<Critical>,
}

impl InitiativeRoll {
    pub fn update(&self) -> InitiativeUpdate {
        InitiativeUpdate {
            combatant_id: self.combatant_id,
            rank: self.rank,
            critical: self.critical,
        }
    }
}

/// A combatant whose controlling entity resolved.
struct Participant {
    combatant: Combatant,
    entity: Entity,
}

/// Computes and stores initiative for a set of combatants.
///
/// Holds no combatant state between calls.
pub struct InitiativeResolver {
    store: Arc<dyn CombatantStore>,
    roller: Arc<dyn DiceRoller>,
    derivation: Arc<dyn AttributeDerivation>,
    config: ResolverConfig,
}

impl InitiativeResolver {
    pub fn new(
        store: Arc<dyn CombatantStore>,
        roller: Arc<dyn DiceRoller>,
        derivation: Arc<dyn AttributeDerivation>,
    ) -> Self {
        Self {
            store,
            roller,
            derivation,
            config: ResolverConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Roll initiative for `ids` and write every rank back in one batch.
    ///
    /// Ids that do not resolve to a combatant with a controlling entity are
    /// skipped. A repeated id is rolled once per occurrence and the last
    /// roll wins in the store.
    pub async fn resolve_initiative(
        &self,
        ids: &[CombatantId],
    ) -> Result<Vec<InitiativeRoll>, InitiativeError> {
        let result = self.resolve_and_commit(ids).await;
        if let Err(err) = &result {
            tracing::error!(combatants = ids.len(), error = %err, "initiative resolution failed");
        }
        result
    }

    async fn resolve_and_commit(
        &self,
        ids: &[CombatantId],
    ) -> Result<Vec<InitiativeRoll>, InitiativeError> {
        let mut participants = Vec::with_capacity(ids.len());
        for &id in ids {
            if let Some(participant) = self.participant(id).await {
                participants.push(participant);
            }
        }

        let rolls = if self.config.concurrent_draws {
            try_join_all(participants.iter().map(|p| self.roll(p))).await?
        } else {
            let mut rolls = Vec::with_capacity(participants.len());
            for participant in &participants {
                rolls.push(self.roll(participant).await?);
            }
            rolls
        };

        if rolls.is_empty() {
            tracing::debug!("no resolvable combatants, nothing to write");
            return Ok(rolls);
        }

        let updates: Vec<InitiativeUpdate> = rolls.iter().map(InitiativeRoll::update).collect();
        self.store.batch_update(&updates).await?;
        tracing::info!(updated = updates.len(), "initiative committed");

        Ok(rolls)
    }

    async fn participant(&self, id: CombatantId) -> Option<Participant> {
        let Some(combatant) = self.store.find_combatant(id).await else {
            tracing::warn!(combatant = %id, "combatant not found, skipping");
            return None;
        };
        let Some(entity) = self.store.find_controlling_entity(&combatant).await else {
            tracing::warn!(
                combatant = %id,
                name = %combatant.name,
                "controlling entity not found, skipping"
            );
            return None;
        };
        Some(Participant { combatant, entity })
    }

    async fn roll(&self, participant: &Participant) -> Result<InitiativeRoll, DiceError> {
        let Participant { combatant, entity } = participant;
        let willpower = self.willpower(entity);

        let roll = match entity.entity_type() {
            EntityType::NonPlayerEntity => InitiativeRoll {
                combatant_id: combatant.id,
                name: combatant.name.clone(),
                entity_type: EntityType::NonPlayerEntity,
                attribute: self.config.rules.initiative_attribute,
                willpower,
                raw: 0,
                bucket: Bucket::Middle,
                outcome: None,
                rank: NON_PLAYER_RANK,
                critical: None,
            },
            EntityType::PlayerCharacter => {
                let raw = draw_checked(self.roller.as_ref(), DieType::D20).await?;
                let (bucket, rank, critical) = rank_player_character(raw, willpower);
                InitiativeRoll {
                    combatant_id: combatant.id,
                    name: combatant.name.clone(),
                    entity_type: EntityType::PlayerCharacter,
                    attribute: self.config.rules.initiative_attribute,
                    willpower,
                    raw,
                    bucket,
                    outcome: Some(CheckOutcome::classify(raw, willpower)),
                    rank,
                    critical,
                }
            }
        };

        tracing::debug!(
            combatant = %roll.combatant_id,
            name = %roll.name,
            raw = roll.raw,
            willpower = roll.willpower,
            rank = roll.rank,
            bucket = ?roll.bucket,
            "initiative classified"
        );
        Ok(roll)
    }

    /// Willpower for the check, falling back to the configured default.
    fn willpower(&self, entity: &Entity) -> i32 {
        let rules = &self.config.rules;
        let attribute = rules.initiative_attribute;

        let value = match &entity.sheet {
            EntitySheet::PlayerCharacter { stats, derived } => match derived {
                Some(cached) => cached.get(attribute),
                None => self.derivation.derive(stats, rules).get(attribute),
            },
            EntitySheet::NonPlayerEntity { willpower } => *willpower,
        };

        value.unwrap_or_else(|| {
            tracing::warn!(
                entity = %entity.id,
                name = %entity.name,
                default = rules.default_attribute,
                "{} missing, using default",
                attribute.name()
            );
            rules.default_attribute
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_willpower_and_face() {
        for willpower in 3..=18 {
            for raw in 1..=20u32 {
                let (bucket, rank, critical) = rank_player_character(raw, willpower);
                match raw {
                    1 => {
                        assert_eq!(rank, 2999);
                        assert_eq!(bucket, Bucket::Fast);
                        assert_eq!(critical, Some(Critical::Success));
                    }
                    20 => {
                        assert_eq!(rank, 980);
                        assert_eq!(bucket, Bucket::Slow);
                        assert_eq!(critical, Some(Critical::Failure));
                    }
                    r if (r as i32) < willpower => {
                        assert_eq!(rank, 3000 - r as i32);
                        assert_eq!(bucket, Bucket::Fast);
                        assert_eq!(critical, None);
                    }
                    r => {
                        assert_eq!(rank, 1000 - r as i32);
                        assert_eq!(bucket, Bucket::Slow);
                        assert_eq!(critical, None);
                    }
                }
            }
        }
    }

    #[test]
    fn test_buckets_are_disjoint() {
        let fast_floor = Bucket::Fast.rank(20);
        let slow_ceiling = Bucket::Slow.rank(1);
        assert!(fast_floor > NON_PLAYER_RANK);
        assert!(slow_ceiling < NON_PLAYER_RANK);
        assert_eq!(NON_PLAYER_RANK, 2000);
    }

    #[test]
    fn test_critical_outranks_ordinary_success() {
        let (_, crit, _) = rank_player_character(1, 10);
        let (_, ordinary, _) = rank_player_character(8, 10);
        assert_eq!(crit, 2999);
        assert_eq!(ordinary, 2992);
        assert!(crit > ordinary);
    }

    #[test]
    fn test_face_too_large_for_i32_does_not_wrap() {
        assert!(Bucket::Fast.rank(u32::MAX) < Bucket::Slow.rank(20));
        let (bucket, rank, critical) = rank_player_character(u32::MAX, 10);
        assert_eq!(bucket, Bucket::Slow);
        assert_eq!(rank, 1000 - i32::MAX);
        assert_eq!(critical, None);
    }

    #[test]
    fn test_raw_recoverable_from_rank() {
        for willpower in 3..=18 {
            for raw in 1..=20u32 {
                let (bucket, rank, _) = rank_player_character(raw, willpower);
                assert_eq!((bucket.tier() * BUCKET_SPAN - rank) as u32, raw);
            }
        }
    }
}
