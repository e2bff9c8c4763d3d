//! Units and unit-type templates
//!
//! A `UnitType` is the shared template (strengths, hit points, cost, AA and
//! rocket capabilities); a `Unit` is one concrete piece on the board with
//! its own identity and damage state. Casualty selection always works on
//! unit identity.

pub mod support;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::types::{PlayerId, ProductionUnits, UnitId};

/// Template values for one kind of unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitType {
    pub name: String,

    /// Combat hit points. Units with more than one absorb damage before
    /// dying when the multi-hit rule is on.
    pub hit_points: u32,

    /// Hit on a die value strictly below this when attacking
    pub attack: u32,
    /// Hit on a die value strictly below this when defending
    pub defense: u32,
    pub attack_rolls: u32,
    pub defense_rolls: u32,

    /// Base production cost, used for casualty ordering and TUV
    pub cost: ProductionUnits,

    /// Anti-aircraft capability
    pub is_aa: bool,
    pub aa_attack: u32,
    /// Cap on AA dice this type rolls; `None` means one per valid target
    pub max_aa_rolls: Option<u32>,

    /// Can absorb material (bombardment) damage, like an industrial complex
    pub can_be_damaged: bool,
    /// Material damage capacity when `can_be_damaged`
    pub max_damage: u32,
    /// Destroyed outright once material damage reaches `max_damage`
    pub dies_at_max_damage: bool,

    /// Rocket launcher capability
    pub is_rocket: bool,
    pub rocket_dice: u32,
    /// Flat payout bonus under type-override rocket rules
    pub rocket_bonus: i32,
    /// Dice cap under type-override rocket rules; `None` means no override
    pub rocket_max_dice: Option<u32>,
}

impl UnitType {
    /// A plain one-hit combat unit with symmetric rolls
    pub fn new(name: impl Into<String>, attack: u32, defense: u32, cost: ProductionUnits) -> Self {
        Self {
            name: name.into(),
            hit_points: 1,
            attack,
            defense,
            attack_rolls: 1,
            defense_rolls: 1,
            cost,
            is_aa: false,
            aa_attack: 0,
            max_aa_rolls: None,
            can_be_damaged: false,
            max_damage: 0,
            dies_at_max_damage: false,
            is_rocket: false,
            rocket_dice: 0,
            rocket_bonus: 0,
            rocket_max_dice: None,
        }
    }

    /// Combat strength for the given side of a battle
    pub fn strength(&self, defending: bool) -> u32 {
        if defending {
            self.defense
        } else {
            self.attack
        }
    }

    /// Roll count for the given side of a battle
    pub fn rolls(&self, defending: bool) -> u32 {
        if defending {
            self.defense_rolls
        } else {
            self.attack_rolls
        }
    }
}

/// One concrete unit on the board
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub unit_type: Arc<UnitType>,
    pub owner: PlayerId,

    /// Combat damage already absorbed (0 = fresh)
    pub hits_taken: u32,
    /// Material damage already absorbed (bombardment, rockets)
    pub material_damage: u32,
    /// Landed from a transport this turn; relevant to partial retreat
    pub was_amphibious: bool,
}

impl Unit {
    pub fn new(unit_type: Arc<UnitType>, owner: PlayerId) -> Self {
        Self {
            id: UnitId::new(),
            unit_type,
            owner,
            hits_taken: 0,
            material_damage: 0,
            was_amphibious: false,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.unit_type.name
    }

    /// Hit points this unit can still lose before dying
    pub fn remaining_hit_points(&self) -> u32 {
        self.unit_type.hit_points.saturating_sub(self.hits_taken)
    }

    /// Damage increments this unit can absorb while staying alive
    ///
    /// One less than the remaining hit points: the last hit always kills.
    pub fn damage_capacity(&self) -> u32 {
        self.remaining_hit_points().saturating_sub(1)
    }

    pub fn is_damaged(&self) -> bool {
        self.hits_taken > 0
    }

    /// Material damage this unit can still absorb
    pub fn remaining_material_capacity(&self) -> u32 {
        if !self.unit_type.can_be_damaged {
            return 0;
        }
        self.unit_type.max_damage.saturating_sub(self.material_damage)
    }
}

/// Total remaining hit points across a pool
pub fn total_hit_points(units: &[Unit]) -> u32 {
    units.iter().map(|u| u.remaining_hit_points()).sum()
}
