//! Roll-under attribute checks.
//!
//! Black Sword Hack resolves every check by rolling a d20 under an
//! attribute. A natural 1 always succeeds critically and a natural 20
//! always fails critically, whatever the attribute.

use crate::attributes::{Attribute, DerivedAttributes};
use crate::config::RulesConfig;
use crate::dice::{Advantage, DiceError, DiceExpression, DiceRoller, RollResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Natural d20 face that is always a critical success.
pub const CRITICAL_SUCCESS_FACE: u32 = 1;

/// Natural d20 face that is always a critical failure.
pub const CRITICAL_FAILURE_FACE: u32 = 20;

/// Outcome of a roll-under check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckOutcome {
    CriticalSuccess,
    Success,
    Failure,
    CriticalFailure,
}

impl CheckOutcome {
    /// Classify a natural d20 face against a target attribute.
    ///
    /// The face must be strictly below the target to succeed.
    pub fn classify(natural: u32, target: i32) -> Self {
        match natural {
            CRITICAL_SUCCESS_FACE => CheckOutcome::CriticalSuccess,
            CRITICAL_FAILURE_FACE => CheckOutcome::CriticalFailure,
            n if i64::from(n) < i64::from(target) => CheckOutcome::Success,
            _ => CheckOutcome::Failure,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CheckOutcome::CriticalSuccess | CheckOutcome::Success)
    }

    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            CheckOutcome::CriticalSuccess | CheckOutcome::CriticalFailure
        )
    }
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CheckOutcome::CriticalSuccess => "Critical Success",
            CheckOutcome::Success => "Success",
            CheckOutcome::Failure => "Failure",
            CheckOutcome::CriticalFailure => "Critical Failure",
        };
        f.write_str(text)
    }
}

/// A pending check against one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeCheck {
    pub attribute: Attribute,
    pub target: i32,
    pub advantage: Advantage,
}

impl AttributeCheck {
    pub fn new(attribute: Attribute, target: i32) -> Self {
        Self {
            attribute,
            target,
            advantage: Advantage::Normal,
        }
    }

    /// Check against a derived attribute, falling back to the configured
    /// default when it is missing.
    pub fn against(attribute: Attribute, derived: &DerivedAttributes, config: &RulesConfig) -> Self {
        Self::new(attribute, derived.get_or_default(attribute, config))
    }

    pub fn with_advantage(mut self, advantage: Advantage) -> Self {
        self.advantage = self.advantage.combine(advantage);
        self
    }

    pub fn formula(&self) -> DiceExpression {
        DiceExpression::check(self.advantage)
    }

    /// Roll the check through the randomness engine.
    pub async fn roll(&self, roller: &dyn DiceRoller) -> Result<CheckResult, DiceError> {
        let formula = self.formula();
        let roll = formula.roll_with(roller).await?;
        let natural = roll
            .natural_d20()
            .ok_or_else(|| DiceError::InvalidNotation(formula.to_string()))?;

        Ok(CheckResult {
            check: self.clone(),
            outcome: CheckOutcome::classify(natural, self.target),
            natural,
            roll,
        })
    }
}

/// A rolled check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub check: AttributeCheck,
    pub roll: RollResult,
    pub natural: u32,
    pub outcome: CheckOutcome,
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} check ({} under {}): {}, {}",
            self.check.attribute, self.roll.expression, self.check.target, self.roll, self.outcome
        )
    }
}
