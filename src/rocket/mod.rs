//! Rocket and bombardment damage resolution
//!
//! Each firing group walks a small state machine: a target is selected
//! (territory, and optionally a concrete unit under damage-to-units rules),
//! the volley commits, the dice roll in one batch, and the payout is
//! clamped against whatever the target can actually absorb. Results are
//! returned, never applied — the caller owns the game state.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::config::{RocketPayoutMode, RuleSet};
use crate::core::error::{EngineError, Result};
use crate::core::types::{ProductionUnits, TerritoryId, UnitId};
use crate::dice::{DicePurpose, DiceRoll, Die, RandomSource};
use crate::history::{CombatEvent, HistorySink};
use crate::unit::Unit;

/// A territory holding rocket-capable units and the targets they can reach
#[derive(Debug, Clone)]
pub struct LaunchSite {
    pub territory: TerritoryId,
    pub launchers: Vec<Unit>,
    pub candidate_targets: Vec<RocketTarget>,
}

/// One territory a rocket volley may strike
#[derive(Debug, Clone)]
pub struct RocketTarget {
    pub territory: TerritoryId,
    /// Territory production value, the per-turn deduction cap
    pub production_value: ProductionUnits,
    /// The owning player's current resource balance
    pub pu_balance: ProductionUnits,
    /// Units that can absorb material damage, under damage-to-units rules
    pub damageable_units: Vec<Unit>,
}

/// Targeting progress for one firing group
#[derive(Debug, Clone)]
enum TargetingState {
    SelectingTarget,
    Committed {
        target: RocketTarget,
        unit_target: Option<UnitId>,
    },
}

/// How a strike's payout landed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RocketImpact {
    /// Material damage to one unit, capped at its remaining capacity
    UnitDamage {
        unit: UnitId,
        damage: u32,
        destroyed: bool,
    },
    /// Resource deduction, capped at balance and any active production cap
    ProductionLoss { amount: ProductionUnits },
}

/// Outcome of one committed volley
#[derive(Debug, Clone)]
pub struct RocketStrike {
    pub target: TerritoryId,
    pub roll: DiceRoll,
    pub raw_damage: u32,
    pub impact: RocketImpact,
}

/// Target-selection callback for rocket fire
///
/// Returning `None` declines to fire that volley; rockets are never
/// mandatory.
pub trait RocketTargetDecider {
    fn select_target(&mut self, candidates: &[RocketTarget]) -> Option<usize>;

    /// Pick which damageable unit in the chosen territory takes the hit
    fn select_unit_target(&mut self, units: &[Unit]) -> Option<usize> {
        if units.is_empty() {
            None
        } else {
            Some(0)
        }
    }
}

/// Decider that always fires at the first candidate
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstTargetDecider;

impl RocketTargetDecider for FirstTargetDecider {
    fn select_target(&mut self, candidates: &[RocketTarget]) -> Option<usize> {
        if candidates.is_empty() {
            None
        } else {
            Some(0)
        }
    }
}

/// Payout parameters taken from the best rocket type in a stack
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct TypeOverrideParams {
    bonus: i32,
    max_dice: Option<u32>,
}

pub struct RocketDamageResolver<'a> {
    rules: &'a RuleSet,
    payout: RocketPayoutMode,
    /// Deductions already applied this turn, per territory
    turn_deductions: AHashMap<TerritoryId, ProductionUnits>,
}

impl<'a> RocketDamageResolver<'a> {
    pub fn new(rules: &'a RuleSet) -> Self {
        Self {
            rules,
            payout: rules.rocket_payout_mode(),
            turn_deductions: AHashMap::new(),
        }
    }

    pub fn payout_mode(&self) -> RocketPayoutMode {
        self.payout
    }

    /// Forget this turn's deduction ledger
    pub fn begin_turn(&mut self) {
        self.turn_deductions.clear();
    }

    /// Resolve rocket fire for every launch site
    ///
    /// Under `all_rockets_attack` each site fires independently; otherwise
    /// all sites pool their candidate targets and the decider is asked once
    /// for a single combined volley.
    pub fn fire(
        &mut self,
        sites: &[LaunchSite],
        decider: &mut dyn RocketTargetDecider,
        source: &mut dyn RandomSource,
        history: &mut dyn HistorySink,
    ) -> Result<Vec<RocketStrike>> {
        let mut strikes = Vec::new();

        if self.rules.all_rockets_attack {
            for site in sites {
                let dice = launcher_dice(site)?;
                let params = best_override_type(&site.launchers);
                let state = self.select_target(&site.candidate_targets, decider, history);
                if let TargetingState::Committed {
                    target,
                    unit_target,
                } = state
                {
                    strikes.push(self.strike(&target, unit_target, dice, params, source, history));
                }
            }
        } else {
            // single-attack variant: pool every reachable target, one ask
            let mut pooled: Vec<RocketTarget> = Vec::new();
            let mut all_launchers: Vec<&Unit> = Vec::new();
            let mut total_dice = 0;
            for site in sites {
                total_dice += launcher_dice(site)?;
                all_launchers.extend(site.launchers.iter());
                for target in &site.candidate_targets {
                    if !pooled.iter().any(|t| t.territory == target.territory) {
                        pooled.push(target.clone());
                    }
                }
            }
            if total_dice > 0 {
                let params = best_override_type(all_launchers.iter().copied());
                let state = self.select_target(&pooled, decider, history);
                if let TargetingState::Committed {
                    target,
                    unit_target,
                } = state
                {
                    strikes.push(self.strike(
                        &target,
                        unit_target,
                        total_dice,
                        params,
                        source,
                        history,
                    ));
                }
            }
        }

        Ok(strikes)
    }

    /// SelectingTarget -> Committed, or stay uncommitted when the decider
    /// declines
    fn select_target(
        &self,
        candidates: &[RocketTarget],
        decider: &mut dyn RocketTargetDecider,
        history: &mut dyn HistorySink,
    ) -> TargetingState {
        if candidates.is_empty() {
            return TargetingState::SelectingTarget;
        }
        let Some(idx) = decider.select_target(candidates) else {
            debug!("rocket volley declined");
            return TargetingState::SelectingTarget;
        };
        let target = match candidates.get(idx) {
            Some(t) => t.clone(),
            None => {
                warn!(idx, "rocket target index out of range, volley declined");
                return TargetingState::SelectingTarget;
            }
        };

        let unit_target = if self.rules.damage_rockets_to_units {
            decider
                .select_unit_target(&target.damageable_units)
                .and_then(|i| target.damageable_units.get(i))
                .map(|u| u.id)
        } else {
            None
        };

        history.record(CombatEvent::RocketTargeted {
            territory: target.territory.clone(),
            unit: unit_target,
        });
        TargetingState::Committed {
            target,
            unit_target,
        }
    }

    fn strike(
        &mut self,
        target: &RocketTarget,
        unit_target: Option<UnitId>,
        launcher_dice: u32,
        params: TypeOverrideParams,
        source: &mut dyn RandomSource,
        history: &mut dyn HistorySink,
    ) -> RocketStrike {
        let (roll, raw_damage) = self.payout(launcher_dice, params, source);
        history.record(CombatEvent::DiceRolled {
            purpose: DicePurpose::Rockets,
            roll: roll.clone(),
        });

        let impact = self.apply(target, unit_target, raw_damage);
        let applied = match &impact {
            RocketImpact::UnitDamage { damage, .. } => *damage,
            RocketImpact::ProductionLoss { amount } => *amount,
        };
        history.record(CombatEvent::RocketPayout {
            territory: target.territory.clone(),
            raw_damage,
            applied_damage: applied,
        });

        RocketStrike {
            target: target.territory.clone(),
            roll,
            raw_damage,
            impact,
        }
    }

    /// Roll the volley's dice in one batch and convert them into damage
    fn payout(
        &self,
        launcher_dice: u32,
        params: TypeOverrideParams,
        source: &mut dyn RandomSource,
    ) -> (DiceRoll, u32) {
        let sides = self.rules.dice_sides;
        let mut n = launcher_dice.min(self.rules.territory_rocket_dice_cap);
        if self.payout == RocketPayoutMode::TypeOverride {
            if let Some(max_dice) = params.max_dice {
                n = launcher_dice.min(max_dice);
            }
        }
        if n == 0 {
            return (DiceRoll::empty(), 0);
        }

        match self.payout {
            RocketPayoutMode::PipSum => {
                let values = source.draw(sides, n as usize, DicePurpose::Rockets);
                let damage = values.iter().map(|v| v + 1).sum();
                (pip_roll(values), damage)
            }
            RocketPayoutMode::LowLuckAdjusted => {
                // a d6 becomes 2 + 1d2: same mean, a third of the spread;
                // any range remainder lands in the flat part
                let range = (sides / 3).max(1);
                let flat = sides / 3 + sides % 3;
                let values = source.draw(range, n as usize, DicePurpose::Rockets);
                let damage = values.iter().map(|v| v + 1 + flat).sum();
                (pip_roll(values), damage)
            }
            RocketPayoutMode::TypeOverride => {
                let values = source.draw(sides, n as usize, DicePurpose::Rockets);
                let damage: i64 = values
                    .iter()
                    .map(|&v| (i64::from(v) + 1 + i64::from(params.bonus)).max(0))
                    .sum();
                (pip_roll(values), damage as u32)
            }
        }
    }

    /// Clamp the payout against what the target can absorb
    fn apply(
        &mut self,
        target: &RocketTarget,
        unit_target: Option<UnitId>,
        raw_damage: u32,
    ) -> RocketImpact {
        if let Some(unit_id) = unit_target {
            if let Some(unit) = target.damageable_units.iter().find(|u| u.id == unit_id) {
                let capacity = unit.remaining_material_capacity();
                let damage = raw_damage.min(capacity);
                let destroyed =
                    unit.unit_type.dies_at_max_damage && damage == capacity && capacity > 0;
                return RocketImpact::UnitDamage {
                    unit: unit_id,
                    damage,
                    destroyed,
                };
            }
            warn!(?unit_id, "rocket unit target vanished, deducting production instead");
        }

        let mut amount = raw_damage.min(target.pu_balance);
        if self.rules.limit_rocket_damage_per_turn {
            let already = self
                .turn_deductions
                .get(&target.territory)
                .copied()
                .unwrap_or(0);
            let cap_left = target.production_value.saturating_sub(already);
            amount = amount.min(cap_left);
        }
        *self
            .turn_deductions
            .entry(target.territory.clone())
            .or_insert(0) += amount;
        RocketImpact::ProductionLoss { amount }
    }
}

/// Total rocket dice a site's launchers contribute
///
/// A site with no rocket-capable launcher signals a broken caller model.
fn launcher_dice(site: &LaunchSite) -> Result<u32> {
    let dice: u32 = site
        .launchers
        .iter()
        .filter(|u| u.unit_type.is_rocket)
        .map(|u| u.unit_type.rocket_dice)
        .sum();
    if dice == 0 {
        return Err(EngineError::CorruptGameState(format!(
            "launch site {} has no rocket-capable unit",
            site.territory
        )));
    }
    Ok(dice)
}

/// Override parameters from the best rocket type in the stack
///
/// The published rule takes the type with the highest bonus plus average
/// roll; every type rolls the same dice here, so the bonus decides.
fn best_override_type<'u>(launchers: impl IntoIterator<Item = &'u Unit>) -> TypeOverrideParams {
    launchers
        .into_iter()
        .filter(|u| u.unit_type.is_rocket)
        .map(|u| TypeOverrideParams {
            bonus: u.unit_type.rocket_bonus,
            max_dice: u.unit_type.rocket_max_dice,
        })
        .max_by_key(|p| p.bonus)
        .unwrap_or_default()
}

fn pip_roll(values: Vec<u32>) -> DiceRoll {
    DiceRoll::new(
        values
            .into_iter()
            .map(|value| Die { value, hit: true })
            .collect(),
    )
}
