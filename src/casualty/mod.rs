//! Casualty selection: shared types, the player callback seam, and
//! validation
//!
//! A selection is an ordered `killed` list plus a `damaged` multiset (one
//! entry per partial-damage increment). Hit accounting is exact: every
//! entry, killed or damaged, absorbs exactly one hit, so a selection's size
//! always equals the hits it resolves.

pub mod aa;
pub mod standard;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::error::{EngineError, Result};
use crate::core::types::{PlayerId, TerritoryId, UnitId};
use crate::unit::Unit;

pub use aa::AaCasualtySelector;
pub use standard::StandardCasualtySelector;

/// Hit-point slots a unit exposes under the given multi-hit setting
///
/// With the rule off every unit is a single slot and dies to one hit.
pub fn hit_slots(unit: &Unit, allow_multiple_hits: bool) -> u32 {
    if allow_multiple_hits {
        unit.remaining_hit_points().max(1)
    } else {
        1
    }
}

/// Damage increments a unit may absorb before the killing hit
pub fn damage_budget(unit: &Unit, allow_multiple_hits: bool) -> u32 {
    hit_slots(unit, allow_multiple_hits) - 1
}

/// Which units die and which absorb damage for one batch of hits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasualtySelection {
    pub killed: Vec<UnitId>,
    /// One entry per damage increment; a unit may appear several times
    pub damaged: Vec<UnitId>,
    /// True when the engine produced this without consulting a player
    pub auto_selected: bool,
}

impl CasualtySelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total hits this selection absorbs
    pub fn hit_count(&self) -> u32 {
        (self.killed.len() + self.damaged.len()) as u32
    }

    /// Damage increments already assigned to `unit` in this selection
    pub fn damage_assigned(&self, unit: UnitId) -> u32 {
        self.damaged.iter().filter(|&&id| id == unit).count() as u32
    }

    pub fn is_killed(&self, unit: UnitId) -> bool {
        self.killed.contains(&unit)
    }

    /// Apply one hit to `unit`: damage while it has spare budget, kill once
    /// the budget is exhausted
    ///
    /// Returns false when the unit is already dead in this selection and
    /// cannot absorb anything more.
    pub fn add_hit(&mut self, unit: &Unit, allow_multiple_hits: bool) -> bool {
        if self.is_killed(unit.id) {
            return false;
        }
        if self.damage_assigned(unit.id) < damage_budget(unit, allow_multiple_hits) {
            self.damaged.push(unit.id);
        } else {
            self.killed.push(unit.id);
        }
        true
    }
}

/// Everything a decider gets to see alongside the candidate pool
#[derive(Debug, Clone)]
pub struct SelectionContext {
    pub player: PlayerId,
    pub battle_site: TerritoryId,
    pub defending: bool,
    pub edit_mode: bool,
    /// Units riding on a candidate (cargo on transports, air on carriers);
    /// display-only, they die with their carrier
    pub dependents: AHashMap<UnitId, Vec<UnitId>>,
}

impl SelectionContext {
    pub fn new(player: PlayerId, battle_site: TerritoryId, defending: bool) -> Self {
        Self {
            player,
            battle_site,
            defending,
            edit_mode: false,
            dependents: AHashMap::new(),
        }
    }
}

/// The player/AI callback seam
///
/// May block on a UI prompt or a network round trip; there is no
/// mid-resolution cancellation. A cancelled prompt must come back as the
/// default proposal, never as an error.
pub trait CasualtyDecider {
    fn select_casualties(
        &mut self,
        ctx: &SelectionContext,
        candidates: &[Unit],
        default_proposal: &CasualtySelection,
        hits: u32,
    ) -> CasualtySelection;
}

/// Decider that always accepts the default proposal
///
/// Used for AI players and headless runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDecider;

impl CasualtyDecider for DefaultDecider {
    fn select_casualties(
        &mut self,
        _ctx: &SelectionContext,
        _candidates: &[Unit],
        default_proposal: &CasualtySelection,
        _hits: u32,
    ) -> CasualtySelection {
        let mut selection = default_proposal.clone();
        selection.auto_selected = true;
        selection
    }
}

/// Check a selection against the candidate pool and the hit count
///
/// Violations are recoverable (`InvalidSelection`): the caller reports them
/// and re-prompts. Edit mode relaxes only the exact-size rule; membership
/// and damage budgets always hold.
pub fn validate_selection(
    selection: &CasualtySelection,
    candidates: &[Unit],
    hits: u32,
    edit_mode: bool,
    allow_multiple_hits: bool,
) -> Result<()> {
    let by_id: AHashMap<UnitId, &Unit> = candidates.iter().map(|u| (u.id, u)).collect();

    if !edit_mode && selection.hit_count() != hits {
        return Err(EngineError::InvalidSelection(format!(
            "selected {} casualties for {} hits",
            selection.hit_count(),
            hits
        )));
    }

    let mut seen_kills: Vec<UnitId> = Vec::with_capacity(selection.killed.len());
    for id in &selection.killed {
        if seen_kills.contains(id) {
            return Err(EngineError::InvalidSelection(format!(
                "unit {id:?} killed twice"
            )));
        }
        seen_kills.push(*id);
        let Some(unit) = by_id.get(id) else {
            return Err(EngineError::InvalidSelection(format!(
                "killed unit {id:?} is not a candidate"
            )));
        };
        // a kill is one hit, so the rest of the budget must be spent first
        if selection.damage_assigned(*id) != damage_budget(unit, allow_multiple_hits) {
            return Err(EngineError::InvalidSelection(format!(
                "unit {id:?} killed with unspent damage budget"
            )));
        }
    }

    for id in &selection.damaged {
        let Some(unit) = by_id.get(id) else {
            return Err(EngineError::InvalidSelection(format!(
                "damaged unit {id:?} is not a candidate"
            )));
        };
        if selection.damage_assigned(*id) > damage_budget(unit, allow_multiple_hits) {
            return Err(EngineError::InvalidSelection(format!(
                "unit {id:?} damaged past its budget"
            )));
        }
    }

    Ok(())
}
