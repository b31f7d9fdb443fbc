//! Black Sword Hack command-line front end.
//!
//! Works on encounter save files:
//!
//! ```bash
//! cargo run -p bsh -- sample ambush.json
//! cargo run -p bsh -- roll ambush.json --seed 42
//! cargo run -p bsh -- show ambush.json
//! cargo run -p bsh -- check wil 12 --advantage
//! cargo run -p bsh -- dice 3d6+1
//! ```

use anyhow::Context;
use bsh_core::attributes::{Attribute, CharacterStats, ModifierSource};
use bsh_core::dice::{Advantage, DiceExpression};
use bsh_core::rules::AttributeCheck;
use bsh_core::{
    turn_order_lines, DiceRoller, Encounter, Entity, InMemoryStore, InitiativeResolver,
    ResolverConfig, RngRoller, RulesConfig, SavedEncounter, StandardDerivation,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bsh")]
#[command(about = "Black Sword Hack rules: initiative and attribute checks")]
struct Args {
    /// Rules configuration file (JSON)
    #[arg(short, long, global = true)]
    rules: Option<PathBuf>,

    /// Random seed (uses entropy if not specified)
    #[arg(short, long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Roll initiative for every combatant and save the encounter
    Roll {
        /// Encounter save file
        encounter: PathBuf,

        /// Write the result here instead of over the input
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Roll all player characters at once
        #[arg(long)]
        concurrent: bool,
    },

    /// Print the current turn order
    Show {
        /// Encounter save file
        encounter: PathBuf,
    },

    /// Roll a single attribute check
    Check {
        attribute: AttributeArg,

        /// Value to roll under
        target: i32,

        #[arg(long, conflicts_with = "disadvantage")]
        advantage: bool,

        #[arg(long)]
        disadvantage: bool,
    },

    /// Roll a dice formula such as `2d20kl1` or `3d6+1`
    Dice {
        notation: String,
    },

    /// Write a small example encounter
    Sample {
        /// Where to write it
        path: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum AttributeArg {
    Str,
    Dex,
    Con,
    Int,
    Wil,
    Cha,
}

impl From<AttributeArg> for Attribute {
    fn from(arg: AttributeArg) -> Self {
        match arg {
            AttributeArg::Str => Attribute::Strength,
            AttributeArg::Dex => Attribute::Dexterity,
            AttributeArg::Con => Attribute::Constitution,
            AttributeArg::Int => Attribute::Intelligence,
            AttributeArg::Wil => Attribute::Willpower,
            AttributeArg::Cha => Attribute::Charisma,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bsh=info,bsh_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let rules = match &args.rules {
        Some(path) => RulesConfig::load_json(path)
            .await
            .with_context(|| format!("loading rules from {}", path.display()))?,
        None => RulesConfig::default(),
    };
    let roller = Arc::new(match args.seed {
        Some(seed) => RngRoller::seeded(seed),
        None => RngRoller::from_entropy(),
    });

    match args.command {
        Command::Roll {
            encounter,
            out,
            concurrent,
        } => {
            let out = out.unwrap_or_else(|| encounter.clone());
            let config = ResolverConfig::new(rules).with_concurrent_draws(concurrent);
            roll_initiative(&encounter, &out, config, roller).await
        }
        Command::Show { encounter } => show(&encounter).await,
        Command::Check {
            attribute,
            target,
            advantage,
            disadvantage,
        } => {
            let advantage = match (advantage, disadvantage) {
                (true, _) => Advantage::Advantage,
                (_, true) => Advantage::Disadvantage,
                _ => Advantage::Normal,
            };
            check(attribute.into(), target, advantage, roller.as_ref()).await
        }
        Command::Dice { notation } => dice(&notation, roller.as_ref()).await,
        Command::Sample { path } => sample(&path).await,
    }
}

async fn load(path: &Path) -> anyhow::Result<InMemoryStore> {
    let saved = SavedEncounter::load_json(path)
        .await
        .with_context(|| format!("loading encounter from {}", path.display()))?;
    tracing::info!(
        encounter = %saved.encounter.name,
        combatants = saved.encounter.combatants.len(),
        "encounter loaded"
    );
    Ok(saved.into_store())
}

async fn print_turn_order(store: &InMemoryStore) {
    let state = store.snapshot().await;
    let Some(encounter) = state.encounter else {
        return;
    };
    println!("== {} (round {}) ==", encounter.name, encounter.round);
    for line in turn_order_lines(&encounter, &state.entities) {
        println!("{line}");
    }
}

async fn roll_initiative(
    input: &Path,
    out: &Path,
    config: ResolverConfig,
    roller: Arc<RngRoller>,
) -> anyhow::Result<()> {
    let store = Arc::new(load(input).await?);
    store.with_encounter(|e| e.turn_index = 0).await;
    let ids = store
        .encounter()
        .await
        .map(|e| e.combatant_ids())
        .unwrap_or_default();

    let resolver = InitiativeResolver::new(store.clone(), roller, Arc::new(StandardDerivation))
        .with_config(config);
    let rolls = resolver.resolve_initiative(&ids).await?;

    for roll in &rolls {
        println!("{roll}");
    }
    println!();
    print_turn_order(&store).await;

    SavedEncounter::capture(&store)
        .await?
        .save_json(out)
        .await
        .with_context(|| format!("saving encounter to {}", out.display()))?;
    tracing::info!(path = %out.display(), "encounter saved");
    Ok(())
}

async fn show(path: &Path) -> anyhow::Result<()> {
    let store = load(path).await?;
    print_turn_order(&store).await;
    Ok(())
}

async fn check(
    attribute: Attribute,
    target: i32,
    advantage: Advantage,
    roller: &dyn DiceRoller,
) -> anyhow::Result<()> {
    let result = AttributeCheck::new(attribute, target)
        .with_advantage(advantage)
        .roll(roller)
        .await?;
    println!("{result}");
    Ok(())
}

async fn dice(notation: &str, roller: &dyn DiceRoller) -> anyhow::Result<()> {
    let expr = DiceExpression::parse(notation)
        .with_context(|| format!("parsing dice formula {notation:?}"))?;
    let result = expr.roll_with(roller).await?;
    println!("{expr}: {result}");
    Ok(())
}

async fn sample(path: &Path) -> anyhow::Result<()> {
    let aric = Entity::player_character(
        "Aric of the Black Sword",
        CharacterStats::new()
            .with_scores([13, 11, 12, 9, 10, 8])
            .with_modifier(Attribute::Willpower, 2, ModifierSource::Origin, "Sorcerer-born"),
    );
    let ysolde = Entity::player_character(
        "Ysolde",
        CharacterStats::new().with_scores([9, 15, 10, 14, 8, 12]),
    );
    let ghoul = Entity::non_player("Tomb Ghoul", Some(6));
    let wraith = Entity::non_player("Bound Wraith", None);

    let store = InMemoryStore::new(Encounter::new("The Drowned Crypt"));
    for entity in [aric, ysolde, ghoul, wraith] {
        store.enlist(entity).await;
    }

    SavedEncounter::capture(&store)
        .await?
        .save_json(path)
        .await
        .with_context(|| format!("writing sample to {}", path.display()))?;
    println!("Wrote sample encounter to {}", path.display());
    Ok(())
}
