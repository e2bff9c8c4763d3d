//! Rule-variant configuration with documented knobs
//!
//! Every alternate rule algorithm in the engine is selected here. The
//! boolean flags mirror how game rule sets are published; the engine never
//! branches on them per call. Instead `aa_casualty_method` and
//! `rocket_payout_mode` resolve the flag combinations once per battle setup
//! into a tagged variant.

use serde::{Deserialize, Serialize};

use crate::core::error::Result;

/// How anti-aircraft casualties are selected, resolved once per battle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AaCasualtyMethod {
    /// Delegate to the player callback with a default proposal
    PlayerChoice,
    /// Spread losses evenly across fixed-size groups
    LowLuck,
    /// Map each die outcome 1:1 onto a hit-point slot
    IndividuallyFired,
    /// Draw slots without replacement from one batched random call
    UniformRandom,
}

/// How rocket dice convert into damage, resolved once per firing phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RocketPayoutMode {
    /// Plain pip sum of the rolled dice
    PipSum,
    /// Low-luck adjustment: guaranteed third of the dice range per die,
    /// remainder folded into a flat bonus
    LowLuckAdjusted,
    /// Bonus and max-dice taken from the best rocket type present
    TypeOverride,
}

/// Configuration for one game's combat rules
///
/// Defaults correspond to the classic rule set: six-sided dice, pure random
/// AA, single-hit units.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    /// Number of faces on the dice. Strengths are "hit on value below N"
    /// against this range, so changing it rescales every combat value.
    pub dice_sides: u32,

    /// Variance-reduction rule: guaranteed hits from total power, one die
    /// for the remainder. Affects both general combat and AA fire.
    pub low_luck: bool,

    /// Apply the low-luck rule to AA fire only, leaving general combat
    /// fully random.
    pub low_luck_aa_only: bool,

    /// The defending player picks which air units AA fire destroys.
    pub choose_aa_casualties: bool,

    /// AA casualties are drawn uniformly at random from the target pool.
    pub random_aa_casualties: bool,

    /// Each AA die is tied to one specific target slot, in firing order.
    /// Only honored when the roll count matches the slot count.
    pub roll_aa_individually: bool,

    /// Units with more than one hit point absorb damage before dying.
    /// When disabled every hit kills outright.
    pub allow_multiple_hits_per_unit: bool,

    /// Amphibious-origin units are preferred as casualties over identical
    /// non-amphibious ones, so the remainder may still retreat.
    pub partial_amphibious_retreat: bool,

    /// Edit mode: the player callback may return any legal subset, and is
    /// always consulted even for forced selections.
    pub edit_mode: bool,

    /// How many times an invalid player selection is re-prompted before the
    /// engine gives up with an error.
    pub max_selection_retries: u32,

    /// Every territory holding rockets fires independently. When disabled
    /// all launch sites pool their targets and fire once.
    pub all_rockets_attack: bool,

    /// Rocket strikes damage a targeted unit instead of deducting
    /// production from the territory.
    pub damage_rockets_to_units: bool,

    /// Cap the running per-turn rocket deduction at the target territory's
    /// production value.
    pub limit_rocket_damage_per_turn: bool,

    /// Maximum dice any single territory strike may roll.
    pub territory_rocket_dice_cap: u32,

    /// Rocket payout uses the bonus / max-dice override of the best rocket
    /// type present instead of the plain pip sum.
    pub rocket_type_payouts: bool,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            dice_sides: 6,
            low_luck: false,
            low_luck_aa_only: false,
            choose_aa_casualties: false,
            random_aa_casualties: true,
            roll_aa_individually: false,
            allow_multiple_hits_per_unit: false,
            partial_amphibious_retreat: false,
            edit_mode: false,
            max_selection_retries: 3,
            all_rockets_attack: false,
            damage_rockets_to_units: false,
            limit_rocket_damage_per_turn: false,
            territory_rocket_dice_cap: 1,
            rocket_type_payouts: false,
        }
    }
}

impl RuleSet {
    /// Parse a rule set from TOML. Missing keys take their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        let rules: RuleSet = toml::from_str(content)?;
        Ok(rules)
    }

    /// Does the low-luck rule apply to AA fire?
    pub fn low_luck_for_aa(&self) -> bool {
        self.low_luck || self.low_luck_aa_only
    }

    /// Resolve the AA casualty strategy for this rule set.
    ///
    /// Precedence follows the published rules: player choice trumps
    /// everything, low luck trumps the dice-mapped variants, and uniform
    /// random is the final fallback.
    pub fn aa_casualty_method(&self) -> AaCasualtyMethod {
        if self.choose_aa_casualties {
            AaCasualtyMethod::PlayerChoice
        } else if self.low_luck_for_aa() && !self.random_aa_casualties {
            AaCasualtyMethod::LowLuck
        } else if self.roll_aa_individually && !self.random_aa_casualties {
            AaCasualtyMethod::IndividuallyFired
        } else {
            AaCasualtyMethod::UniformRandom
        }
    }

    /// Resolve the rocket payout mode for this rule set.
    pub fn rocket_payout_mode(&self) -> RocketPayoutMode {
        if self.rocket_type_payouts {
            RocketPayoutMode::TypeOverride
        } else if self.low_luck {
            RocketPayoutMode::LowLuckAdjusted
        } else {
            RocketPayoutMode::PipSum
        }
    }
}
