//! Production-cost valuation (TUV)
//!
//! Casualty ordering and AI tie-breaks need a per-unit-type value. The
//! oracle derives it from each player's production frontier, rounding
//! multi-unit rules up per unit, and memoizes the derived tables. The memo
//! is owned by one game session and recomputable at any time — nothing here
//! is authoritative state.

use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::types::{PlayerId, ProductionUnits};
use crate::unit::{Unit, UnitType};

/// One purchase rule: `quantity` units of a type for `cost`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionRule {
    pub unit_type: String,
    pub quantity: u32,
    pub cost: ProductionUnits,
}

impl ProductionRule {
    pub fn new(unit_type: impl Into<String>, quantity: u32, cost: ProductionUnits) -> Self {
        Self {
            unit_type: unit_type.into(),
            quantity: quantity.max(1),
            cost,
        }
    }

    /// Cost per single unit, rounded up
    pub fn cost_per_unit(&self) -> ProductionUnits {
        self.cost.div_ceil(self.quantity)
    }
}

/// What one player can produce
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionFrontier {
    pub rules: Vec<ProductionRule>,
}

impl ProductionFrontier {
    pub fn new(rules: Vec<ProductionRule>) -> Self {
        Self { rules }
    }
}

/// Per-unit-type value table derived from production rules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostTable {
    costs: AHashMap<String, ProductionUnits>,
}

impl CostTable {
    /// Value of a unit type: table entry, or the template's base cost when
    /// no production rule covers it anywhere
    pub fn cost_of(&self, unit_type: &UnitType) -> ProductionUnits {
        self.costs
            .get(&unit_type.name)
            .copied()
            .unwrap_or(unit_type.cost)
    }

    /// Raw table lookup by type name
    pub fn get(&self, type_name: &str) -> Option<ProductionUnits> {
        self.costs.get(type_name).copied()
    }

    /// Total unit value of a collection
    pub fn tuv_of(&self, units: &[Unit]) -> ProductionUnits {
        units.iter().map(|u| self.cost_of(&u.unit_type)).sum()
    }
}

/// Session-scoped cost oracle
///
/// Owns both the registered frontiers and the derived memo. Callers create
/// one per game session and `clear` it on teardown; there is no process-wide
/// cache to invalidate.
#[derive(Debug, Default)]
pub struct CostOracle {
    frontiers: AHashMap<PlayerId, ProductionFrontier>,
    per_player: AHashMap<PlayerId, Arc<CostTable>>,
    averaged: Option<Arc<CostTable>>,
}

impl CostOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a player's production frontier
    pub fn register_frontier(&mut self, player: PlayerId, frontier: ProductionFrontier) {
        self.frontiers.insert(player, frontier);
        // derived tables are stale now
        self.per_player.clear();
        self.averaged = None;
    }

    /// The all-player merged table: for each unit type, the rounded-up
    /// average of every player's rounded-up per-unit cost
    pub fn averaged_costs(&mut self) -> Arc<CostTable> {
        if let Some(table) = &self.averaged {
            return Arc::clone(table);
        }

        let mut sums: AHashMap<String, (u64, u64)> = AHashMap::new();
        for frontier in self.frontiers.values() {
            for rule in &frontier.rules {
                let entry = sums.entry(rule.unit_type.clone()).or_insert((0, 0));
                entry.0 += u64::from(rule.cost_per_unit());
                entry.1 += 1;
            }
        }

        let costs = sums
            .into_iter()
            .map(|(name, (sum, count))| (name, sum.div_ceil(count) as ProductionUnits))
            .collect();

        let table = Arc::new(CostTable { costs });
        self.averaged = Some(Arc::clone(&table));
        table
    }

    /// Cost table for one player
    ///
    /// A player with no frontier gets the merged average table outright; a
    /// player with a partial frontier has missing types back-filled from it.
    pub fn costs_for(&mut self, player: PlayerId) -> Arc<CostTable> {
        if let Some(table) = self.per_player.get(&player) {
            return Arc::clone(table);
        }

        let averaged = self.averaged_costs();
        let table = match self.frontiers.get(&player) {
            None => Arc::clone(&averaged),
            Some(frontier) => {
                let mut costs: AHashMap<String, ProductionUnits> = averaged.costs.clone();
                for rule in &frontier.rules {
                    costs.insert(rule.unit_type.clone(), rule.cost_per_unit());
                }
                Arc::new(CostTable { costs })
            }
        };

        self.per_player.insert(player, Arc::clone(&table));
        table
    }

    /// Drop every derived table and registered frontier (session teardown)
    pub fn clear(&mut self) {
        self.frontiers.clear();
        self.per_player.clear();
        self.averaged = None;
    }
}
