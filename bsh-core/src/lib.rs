//! Black Sword Hack rules engine.
//!
//! This crate provides:
//! - Dice formulas and roll-under attribute checks
//! - Attribute derivation from character sheets
//! - Initiative ranking for combat encounters
//! - Turn-order display labels and encounter save files
//!
//! The host application owns combatant records, the dice engine and the
//! attribute rules; each is injected through a trait.
//!
//! # Quick Start
//!
//! ```ignore
//! use bsh_core::{Encounter, Entity, InMemoryStore, InitiativeResolver, RngRoller, StandardDerivation};
//! use bsh_core::attributes::CharacterStats;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(InMemoryStore::new(Encounter::new("Ambush")));
//!     store.enlist(Entity::player_character("Aric", CharacterStats::new().with_scores([10, 12, 11, 9, 14, 8]))).await;
//!     store.enlist(Entity::non_player("Ghoul", None)).await;
//!
//!     let resolver = InitiativeResolver::new(store.clone(), Arc::new(RngRoller::default()), Arc::new(StandardDerivation));
//!     let ids = store.encounter().await.map(|e| e.combatant_ids()).unwrap_or_default();
//!     for roll in resolver.resolve_initiative(&ids).await? {
//!         println!("{roll}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod attributes;
pub mod config;
pub mod dice;
pub mod display;
pub mod encounter;
pub mod initiative;
pub mod persist;
pub mod rules;
pub mod store;
pub mod testing;

// Primary public API
pub use attributes::{AttributeDerivation, StandardDerivation};
pub use config::{ResolverConfig, RulesConfig};
pub use dice::{DiceRoller, RngRoller};
pub use display::{initiative_status, turn_order_lines, InitiativeStatus};
pub use encounter::{Combatant, CombatantId, Critical, Encounter, Entity, EntityId, EntityType};
pub use initiative::{InitiativeError, InitiativeResolver, InitiativeRoll};
pub use persist::SavedEncounter;
pub use store::{CombatantStore, InMemoryStore};
