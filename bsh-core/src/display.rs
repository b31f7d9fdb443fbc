//! What players get to see of the turn order.
//!
//! Ranks are never shown. A player character shows whether their
//! initiative check succeeded; a non-player entity shows nothing.

use crate::encounter::{Critical, Encounter, Entity, EntityId, EntityType};
use crate::initiative::{InitiativeRoll, NON_PLAYER_RANK};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Label shown next to a player character in the turn order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitiativeStatus {
    Success,
    Failure,
}

impl fmt::Display for InitiativeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitiativeStatus::Success => f.write_str("Success"),
            InitiativeStatus::Failure => f.write_str("Failure"),
        }
    }
}

/// Status label for a ranked combatant.
pub fn initiative_status(entity_type: EntityType, rank: i32) -> Option<InitiativeStatus> {
    match entity_type {
        EntityType::NonPlayerEntity => None,
        EntityType::PlayerCharacter if rank > NON_PLAYER_RANK => Some(InitiativeStatus::Success),
        EntityType::PlayerCharacter => Some(InitiativeStatus::Failure),
    }
}

/// One rendered row of the turn order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnOrderLine {
    /// 1-based place in the order.
    pub position: usize,
    pub name: String,
    pub status: Option<InitiativeStatus>,
    pub critical: Option<Critical>,
    /// Whether it is this combatant's turn.
    pub active: bool,
    pub defeated: bool,
}

impl fmt::Display for TurnOrderLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.active { '>' } else { ' ' };
        write!(f, "{marker} {:>2}. {}", self.position, self.name)?;
        if let Some(status) = self.status {
            write!(f, "  {status}")?;
        }
        match self.critical {
            Some(Critical::Success) => f.write_str(" (critical!)")?,
            Some(Critical::Failure) => f.write_str(" (fumble!)")?,
            None => {}
        }
        if self.defeated {
            f.write_str(" [defeated]")?;
        }
        Ok(())
    }
}

/// Render the encounter's turn order.
///
/// Combatants that were never ranked, or whose entity is unknown, get no
/// status.
pub fn turn_order_lines(
    encounter: &Encounter,
    entities: &HashMap<EntityId, Entity>,
) -> Vec<TurnOrderLine> {
    let active = encounter.current_combatant().map(|c| c.id);

    encounter
        .turn_order()
        .into_iter()
        .enumerate()
        .map(|(i, combatant)| {
            let entity_type = combatant
                .entity_id
                .and_then(|id| entities.get(&id))
                .map(Entity::entity_type);
            let status = match (entity_type, combatant.rank) {
                (Some(kind), Some(rank)) => initiative_status(kind, rank),
                _ => None,
            };

            TurnOrderLine {
                position: i + 1,
                name: combatant.name.clone(),
                status,
                critical: combatant.critical,
                active: active == Some(combatant.id),
                defeated: combatant.defeated,
            }
        })
        .collect()
}

impl fmt::Display for InitiativeRoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome {
            Some(outcome) => write!(
                f,
                "{} rolls initiative: {} under {} {}, {}",
                self.name, self.raw, self.attribute, self.willpower, outcome
            ),
            None => write!(f, "{} takes its place in the turn order", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::CharacterStats;
    use crate::encounter::Combatant;

    #[test]
    fn test_status_threshold() {
        assert_eq!(
            initiative_status(EntityType::PlayerCharacter, 2995),
            Some(InitiativeStatus::Success)
        );
        assert_eq!(
            initiative_status(EntityType::PlayerCharacter, 995),
            Some(InitiativeStatus::Failure)
        );
        assert_eq!(
            initiative_status(EntityType::PlayerCharacter, 2000),
            Some(InitiativeStatus::Failure)
        );
        assert_eq!(initiative_status(EntityType::NonPlayerEntity, 2000), None);
        assert_eq!(initiative_status(EntityType::NonPlayerEntity, 2999), None);
    }

    #[test]
    fn test_turn_order_lines() {
        let hero = Entity::player_character("Aric", CharacterStats::new());
        let ghoul = Entity::non_player("Ghoul", None);
        let laggard = Entity::player_character("Bren", CharacterStats::new());

        let mut encounter = Encounter::new("Crypt");
        for (entity, rank, critical) in [
            (&laggard, 985, Some(Critical::Failure)),
            (&ghoul, 2000, None),
            (&hero, 2999, Some(Critical::Success)),
        ] {
            let mut combatant = Combatant::for_entity(entity);
            combatant.rank = Some(rank);
            combatant.critical = critical;
            encounter.add_combatant(combatant);
        }
        encounter.add_combatant(Combatant::new("Stray", None));

        let entities: HashMap<EntityId, Entity> = [hero, ghoul, laggard]
            .into_iter()
            .map(|e| (e.id, e))
            .collect();

        let lines = turn_order_lines(&encounter, &entities);
        let rendered: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        assert_eq!(
            rendered,
            [
                ">  1. Aric  Success (critical!)",
                "   2. Ghoul",
                "   3. Bren  Failure (fumble!)",
                "   4. Stray",
            ]
        );
    }
}
