//! Dice formulas and the randomness engine seam.
//!
//! Supports standard notation (`XdY`, `XdYklN`, `XdYkhN`, `+/-Z`) and the
//! roll-under checks Black Sword Hack uses: advantage keeps the lowest of two
//! d20s, disadvantage keeps the highest.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};

/// Most dice one expression may roll.
pub const MAX_DICE: u32 = 100;

/// Error type for dice parsing and rolling.
#[derive(Debug, Error)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(u32),
    #[error("No dice specified")]
    NoDice,
    #[error("Too many dice: {count} (at most {max})", max = MAX_DICE)]
    TooManyDice { count: u32 },
    #[error("Modifier out of range in {0}")]
    ModifierOverflow(String),
    #[error("Cannot keep {keep} dice when only rolling {count} (in {notation})")]
    InvalidKeepCount {
        keep: u32,
        count: u32,
        notation: String,
    },
    #[error("Randomness engine returned {value} for a {die}")]
    OutOfRange { die: DieType, value: u32 },
    #[error("Randomness engine failed: {0}")]
    Engine(String),
}

/// Advantage state for a roll-under check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Advantage {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

impl Advantage {
    /// Combine two advantage states (advantage + disadvantage = normal).
    pub fn combine(self, other: Advantage) -> Advantage {
        match (self, other) {
            (Advantage::Normal, x) | (x, Advantage::Normal) => x,
            (Advantage::Advantage, Advantage::Disadvantage)
            | (Advantage::Disadvantage, Advantage::Advantage) => Advantage::Normal,
            (Advantage::Advantage, Advantage::Advantage) => Advantage::Advantage,
            (Advantage::Disadvantage, Advantage::Disadvantage) => Advantage::Disadvantage,
        }
    }
}

/// Die sizes used by the ruleset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DieType {
    D4,
    D6,
    D8,
    D10,
    D12,
    D20,
    D100,
}

impl DieType {
    pub fn sides(&self) -> u32 {
        match self {
            DieType::D4 => 4,
            DieType::D6 => 6,
            DieType::D8 => 8,
            DieType::D10 => 10,
            DieType::D12 => 12,
            DieType::D20 => 20,
            DieType::D100 => 100,
        }
    }

    pub fn from_sides(sides: u32) -> Option<DieType> {
        match sides {
            4 => Some(DieType::D4),
            6 => Some(DieType::D6),
            8 => Some(DieType::D8),
            10 => Some(DieType::D10),
            12 => Some(DieType::D12),
            20 => Some(DieType::D20),
            100 => Some(DieType::D100),
            _ => None,
        }
    }

    /// Whether `value` is a face of this die.
    pub fn contains(&self, value: u32) -> bool {
        (1..=self.sides()).contains(&value)
    }
}

impl fmt::Display for DieType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.sides())
    }
}

/// Which dice of a pool count toward the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Keep {
    All,
    Highest(u32),
    Lowest(u32),
}

/// A single die pool of a dice expression (`2d20kl1`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DicePool {
    pub count: u32,
    pub die_type: DieType,
    pub keep: Keep,
}

/// A complete dice expression (e.g., `2d20kl1`, `1d6+1`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    pub pools: Vec<DicePool>,
    pub modifier: i32,
    pub original: String,
}

impl DiceExpression {
    /// Parse a dice notation string.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let notation: String = notation
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if notation.is_empty() {
            return Err(DiceError::NoDice);
        }

        let mut pools = Vec::new();
        let mut modifier: i32 = 0;
        let mut term = String::new();
        let mut sign: i32 = 1;

        for ch in notation.chars() {
            if ch == '+' || ch == '-' {
                if !term.is_empty() {
                    Self::parse_term(&term, sign, &mut pools, &mut modifier)?;
                    term.clear();
                }
                sign = if ch == '+' { 1 } else { -1 };
            } else {
                term.push(ch);
            }
        }

        if !term.is_empty() {
            Self::parse_term(&term, sign, &mut pools, &mut modifier)?;
        }

        if pools.is_empty() && modifier == 0 {
            return Err(DiceError::NoDice);
        }

        let count = pools
            .iter()
            .fold(0u32, |total, pool| total.saturating_add(pool.count));
        if count > MAX_DICE {
            return Err(DiceError::TooManyDice { count });
        }

        Ok(DiceExpression {
            pools,
            modifier,
            original: notation,
        })
    }

    fn parse_term(
        term: &str,
        sign: i32,
        pools: &mut Vec<DicePool>,
        modifier: &mut i32,
    ) -> Result<(), DiceError> {
        let invalid = || DiceError::InvalidNotation(term.to_string());

        let Some((count_str, rest)) = term.split_once('d') else {
            let value: i32 = term.parse().map_err(|_| invalid())?;
            let current = *modifier;
            *modifier = value
                .checked_mul(sign)
                .and_then(|v| current.checked_add(v))
                .ok_or_else(|| DiceError::ModifierOverflow(term.to_string()))?;
            return Ok(());
        };

        // Subtracted dice pools have no meaning for the ruleset.
        if sign < 0 {
            return Err(invalid());
        }

        let count: u32 = if count_str.is_empty() {
            1
        } else {
            count_str.parse().map_err(|_| invalid())?
        };

        let (sides_str, keep) = if let Some((sides, n)) = rest.split_once("kh") {
            (sides, Keep::Highest(n.parse().map_err(|_| invalid())?))
        } else if let Some((sides, n)) = rest.split_once("kl") {
            (sides, Keep::Lowest(n.parse().map_err(|_| invalid())?))
        } else {
            (rest, Keep::All)
        };

        let sides: u32 = sides_str.parse().map_err(|_| invalid())?;
        let die_type = DieType::from_sides(sides).ok_or(DiceError::InvalidDieSize(sides))?;

        if count == 0 {
            return Err(invalid());
        }
        if count > MAX_DICE {
            return Err(DiceError::TooManyDice { count });
        }
        if let Keep::Highest(keep) | Keep::Lowest(keep) = keep {
            if keep == 0 || keep > count {
                return Err(DiceError::InvalidKeepCount {
                    keep,
                    count,
                    notation: term.to_string(),
                });
            }
        }

        pools.push(DicePool {
            count,
            die_type,
            keep,
        });
        Ok(())
    }

    /// Formula for a roll-under check on a d20.
    pub fn check(advantage: Advantage) -> Self {
        let (count, keep) = match advantage {
            Advantage::Normal => (1, Keep::All),
            // Lower is better when rolling under an attribute.
            Advantage::Advantage => (2, Keep::Lowest(1)),
            Advantage::Disadvantage => (2, Keep::Highest(1)),
        };
        DiceExpression {
            pools: vec![DicePool {
                count,
                die_type: DieType::D20,
                keep,
            }],
            modifier: 0,
            original: check_formula(advantage).to_string(),
        }
    }

    /// Roll every die through the randomness engine.
    pub async fn roll_with(&self, roller: &dyn DiceRoller) -> Result<RollResult, DiceError> {
        let mut faces = Vec::with_capacity(self.pools.len());
        for pool in &self.pools {
            let mut rolls = Vec::with_capacity(pool.count.min(MAX_DICE) as usize);
            for _ in 0..pool.count {
                rolls.push(draw_checked(roller, pool.die_type).await?);
            }
            faces.push(rolls);
        }
        Ok(self.tally(faces))
    }

    fn tally(&self, faces: Vec<Vec<u32>>) -> RollResult {
        let pool_results: Vec<PoolResult> = self
            .pools
            .iter()
            .zip(faces)
            .map(|(pool, rolls)| {
                let mut kept = rolls.clone();
                match pool.keep {
                    Keep::All => {}
                    Keep::Highest(n) => {
                        kept.sort_unstable_by(|a, b| b.cmp(a));
                        kept.truncate(n as usize);
                    }
                    Keep::Lowest(n) => {
                        kept.sort_unstable();
                        kept.truncate(n as usize);
                    }
                }
                let subtotal = kept.iter().map(|&face| u64::from(face)).sum();
                PoolResult {
                    die_type: pool.die_type,
                    rolls,
                    kept,
                    subtotal,
                }
            })
            .collect();

        let dice_total: u64 = pool_results.iter().map(|p| p.subtotal).sum();

        RollResult {
            expression: self.clone(),
            pool_results,
            modifier: self.modifier,
            total: i64::try_from(dice_total)
                .unwrap_or(i64::MAX)
                .saturating_add(i64::from(self.modifier)),
        }
    }
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceExpression::parse(s)
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

/// Notation for a d20 roll-under check.
pub fn check_formula(advantage: Advantage) -> &'static str {
    match advantage {
        Advantage::Normal => "1d20",
        Advantage::Advantage => "2d20kl1",
        Advantage::Disadvantage => "2d20kh1",
    }
}

/// Result of rolling a single pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolResult {
    pub die_type: DieType,
    pub rolls: Vec<u32>,
    pub kept: Vec<u32>,
    pub subtotal: u64,
}

/// Complete result of a dice roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollResult {
    pub expression: DiceExpression,
    pub pool_results: Vec<PoolResult>,
    pub modifier: i32,
    pub total: i64,
}

impl RollResult {
    /// The kept face of a lone d20 pool, if the expression has one.
    pub fn natural_d20(&self) -> Option<u32> {
        match self.pool_results.as_slice() {
            [pool] if pool.die_type == DieType::D20 && pool.kept.len() == 1 => {
                pool.kept.first().copied()
            }
            _ => None,
        }
    }

    /// Format the individual dice for display; dropped dice are parenthesised.
    pub fn dice_display(&self) -> String {
        let pools: Vec<String> = self
            .pool_results
            .iter()
            .map(|p| {
                let mut unclaimed = p.kept.clone();
                let shown: Vec<String> = p
                    .rolls
                    .iter()
                    .map(|roll| match unclaimed.iter().position(|k| k == roll) {
                        Some(i) => {
                            unclaimed.swap_remove(i);
                            roll.to_string()
                        }
                        None => format!("({roll})"),
                    })
                    .collect();
                format!("[{}]", shown.join(", "))
            })
            .collect();

        let dice = pools.join(" + ");
        match self.modifier {
            0 => dice,
            m if m > 0 => format!("{dice} + {m}"),
            m => format!("{dice} - {}", m.abs()),
        }
    }
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.dice_display(), self.total)
    }
}

/// A die face reported to visualisation listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DieDrawn {
    pub die: DieType,
    pub value: u32,
}

/// The randomness engine: one independent uniform draw per call.
#[async_trait]
pub trait DiceRoller: Send + Sync {
    /// Draw a value uniformly from `1..=die.sides()`.
    async fn draw(&self, die: DieType) -> Result<u32, DiceError>;
}

/// Draw through `roller` and reject faces the die does not have.
pub async fn draw_checked(roller: &dyn DiceRoller, die: DieType) -> Result<u32, DiceError> {
    let value = roller.draw(die).await?;
    if !die.contains(value) {
        return Err(DiceError::OutOfRange { die, value });
    }
    Ok(value)
}

/// Default engine backed by `rand`.
///
/// Every draw is also published to subscribers (dice animation and the
/// like); publishing never blocks and never changes the drawn value.
pub struct RngRoller {
    rng: Mutex<StdRng>,
    observers: broadcast::Sender<DieDrawn>,
}

impl RngRoller {
    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Reproducible engine for replays and tests.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        let (observers, _) = broadcast::channel(64);
        Self {
            rng: Mutex::new(rng),
            observers,
        }
    }

    /// Listen to every die this engine draws.
    pub fn subscribe(&self) -> broadcast::Receiver<DieDrawn> {
        self.observers.subscribe()
    }
}

impl Default for RngRoller {
    fn default() -> Self {
        Self::from_entropy()
    }
}

#[async_trait]
impl DiceRoller for RngRoller {
    async fn draw(&self, die: DieType) -> Result<u32, DiceError> {
        let value = self.rng.lock().await.gen_range(1..=die.sides());
        // No subscribers is fine.
        let _ = self.observers.send(DieDrawn { die, value });
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRoller;

    #[test]
    fn test_parse_simple() {
        let expr = DiceExpression::parse("1d20").unwrap();
        assert_eq!(expr.pools.len(), 1);
        assert_eq!(expr.pools[0].count, 1);
        assert_eq!(expr.pools[0].die_type, DieType::D20);
        assert_eq!(expr.pools[0].keep, Keep::All);
        assert_eq!(expr.modifier, 0);
    }

    #[test]
    fn test_parse_with_modifier() {
        assert_eq!(DiceExpression::parse("1d6+1").unwrap().modifier, 1);
        assert_eq!(DiceExpression::parse("d8 - 2").unwrap().modifier, -2);
    }

    #[test]
    fn test_parse_keep() {
        let expr = DiceExpression::parse("2d20kl1").unwrap();
        assert_eq!(expr.pools[0].count, 2);
        assert_eq!(expr.pools[0].keep, Keep::Lowest(1));

        let expr = DiceExpression::parse("4d6kh3").unwrap();
        assert_eq!(expr.pools[0].keep, Keep::Highest(3));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(DiceExpression::parse(""), Err(DiceError::NoDice)));
        assert!(matches!(
            DiceExpression::parse("1d7"),
            Err(DiceError::InvalidDieSize(7))
        ));
        assert!(matches!(
            DiceExpression::parse("2d20kl3"),
            Err(DiceError::InvalidKeepCount { keep: 3, count: 2, .. })
        ));
        assert!(matches!(
            DiceExpression::parse("1d20-1d4"),
            Err(DiceError::InvalidNotation(_))
        ));
        assert!(DiceExpression::parse("xd6").is_err());
    }

    #[test]
    fn test_check_formula_matches_parse() {
        for advantage in [
            Advantage::Normal,
            Advantage::Advantage,
            Advantage::Disadvantage,
        ] {
            let built = DiceExpression::check(advantage);
            let parsed = DiceExpression::parse(check_formula(advantage)).unwrap();
            assert_eq!(built, parsed);
        }
    }

    #[tokio::test]
    async fn test_roll_range() {
        let roller = RngRoller::seeded(11);
        let expr = DiceExpression::parse("1d20").unwrap();
        for _ in 0..100 {
            let result = expr.roll_with(&roller).await.unwrap();
            assert!((1..=20).contains(&result.total));
        }
    }

    #[test]
    fn test_modifier_overflow_is_an_error() {
        assert!(matches!(
            DiceExpression::parse("1+2147483647"),
            Err(DiceError::ModifierOverflow(_))
        ));
        assert!(matches!(
            DiceExpression::parse("1d4-2147483647-2"),
            Err(DiceError::ModifierOverflow(_))
        ));
        assert_eq!(
            DiceExpression::parse("2147483647").unwrap().modifier,
            i32::MAX
        );
    }

    #[test]
    fn test_dice_count_is_capped() {
        assert!(matches!(
            DiceExpression::parse("4000000000d20"),
            Err(DiceError::TooManyDice { count: 4000000000 })
        ));
        assert!(matches!(
            DiceExpression::parse("60d6+60d6"),
            Err(DiceError::TooManyDice { count: 120 })
        ));
        assert!(DiceExpression::parse("100d6").is_ok());
    }

    #[tokio::test]
    async fn test_total_does_not_overflow_with_large_modifier() {
        let roller = ScriptedRoller::new([4]);
        let result = DiceExpression::parse("1d4+2147483647")
            .unwrap()
            .roll_with(&roller)
            .await
            .unwrap();
        assert_eq!(result.total, i64::from(i32::MAX) + 4);
    }

    #[tokio::test]
    async fn test_advantage_keeps_lowest() {
        let roller = ScriptedRoller::new([17, 4]);
        let result = DiceExpression::check(Advantage::Advantage)
            .roll_with(&roller)
            .await
            .unwrap();
        assert_eq!(result.total, 4);
        assert_eq!(result.natural_d20(), Some(4));
        assert_eq!(result.dice_display(), "[(17), 4]");
    }

    #[tokio::test]
    async fn test_disadvantage_keeps_highest() {
        let roller = ScriptedRoller::new([17, 4]);
        let result = DiceExpression::check(Advantage::Disadvantage)
            .roll_with(&roller)
            .await
            .unwrap();
        assert_eq!(result.total, 17);
        assert_eq!(result.to_string(), "[17, (4)] = 17");
    }

    #[tokio::test]
    async fn test_engine_out_of_range_rejected() {
        let roller = ScriptedRoller::new([21]);
        let err = draw_checked(&roller, DieType::D20).await.unwrap_err();
        assert!(matches!(err, DiceError::OutOfRange { value: 21, .. }));
    }

    #[tokio::test]
    async fn test_seeded_roller_is_reproducible_and_observable() {
        let a = RngRoller::seeded(7);
        let b = RngRoller::seeded(7);
        let mut seen = a.subscribe();

        for _ in 0..10 {
            let x = a.draw(DieType::D20).await.unwrap();
            let y = b.draw(DieType::D20).await.unwrap();
            assert_eq!(x, y);
            assert_eq!(seen.recv().await.unwrap(), DieDrawn { die: DieType::D20, value: x });
        }
    }

    #[test]
    fn test_advantage_combine() {
        assert_eq!(
            Advantage::Normal.combine(Advantage::Advantage),
            Advantage::Advantage
        );
        assert_eq!(
            Advantage::Advantage.combine(Advantage::Disadvantage),
            Advantage::Normal
        );
        assert_eq!(
            Advantage::Disadvantage.combine(Advantage::Disadvantage),
            Advantage::Disadvantage
        );
    }
}
