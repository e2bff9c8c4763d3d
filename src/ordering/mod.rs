//! Casualty ordering engine
//!
//! Produces a deterministic total order over casualty candidates, worst
//! first. A static sort is not enough: support attachments make effective
//! power context-dependent, so the engine repeatedly finds the single
//! globally-weakest unit including support given and received, removes it,
//! unwinds its support edges, and searches again — an explicit O(n²) peel.
//!
//! Orders are memoized by a structured key over the battle context and the
//! unit-type multiset, since identical stacks recur constantly within one
//! game session. The memo is owned by the engine instance and dies with it.

use ahash::AHashMap;
use tracing::debug;

use crate::core::config::RuleSet;
use crate::core::types::{PlayerId, TerritoryId, UnitId};
use crate::unit::support::SupportArena;
use crate::unit::Unit;
use crate::value::CostTable;

/// Battle context the ordering depends on
#[derive(Debug, Clone)]
pub struct OrderingContext<'a> {
    pub player: PlayerId,
    pub battle_site: TerritoryId,
    pub defending: bool,
    pub amphibious: bool,
    pub costs: &'a CostTable,
    pub rules: &'a RuleSet,
    /// Per-type strength deltas from the battle territory (marsh, fortress)
    pub territory_effects: AHashMap<String, i32>,
}

impl<'a> OrderingContext<'a> {
    pub fn new(
        player: PlayerId,
        battle_site: TerritoryId,
        defending: bool,
        costs: &'a CostTable,
        rules: &'a RuleSet,
    ) -> Self {
        Self {
            player,
            battle_site,
            defending,
            amphibious: false,
            costs,
            rules,
            territory_effects: AHashMap::new(),
        }
    }
}

/// Worst-first loss plan for a candidate pool
///
/// `damage_slots` holds one entry per absorbable damage increment and is
/// consumed before `kill_order` when multiple hits per unit are allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LossPlan {
    pub damage_slots: Vec<UnitId>,
    pub kill_order: Vec<UnitId>,
}

/// Memo key: everything the computed order depends on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct OrderingKey {
    player: PlayerId,
    battle_site: TerritoryId,
    defending: bool,
    amphibious: bool,
    /// Sorted (type name, count) multiset of the candidate pool
    type_counts: Vec<(String, u32)>,
    /// Sorted (type name, count) multiset of the amphibious-origin subset
    amphibious_counts: Vec<(String, u32)>,
}

/// Memoized order entry: replayable against any concrete pool with the
/// same type multisets
#[derive(Debug, Clone, PartialEq, Eq)]
struct OrderToken {
    type_name: String,
    amphibious: bool,
}

#[derive(Debug, Clone)]
struct Candidate {
    id: UnitId,
    type_name: String,
    cost: u32,
    strength: u32,
    rolls: u32,
    hit_points: u32,
}

#[derive(Debug, Default)]
pub struct CasualtyOrderingEngine {
    memo: AHashMap<OrderingKey, Vec<OrderToken>>,
}

impl CasualtyOrderingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every memoized order (session teardown)
    pub fn clear(&mut self) {
        self.memo.clear();
    }

    /// Full loss plan: damage increments first, then the kill order
    ///
    /// When multiple hits per unit are enabled, each candidate is pre-peeled
    /// into (hit points − 1 − hits taken) damage slots, taken in kill order,
    /// before any kill applies.
    pub fn loss_plan(
        &mut self,
        units: &[Unit],
        support: &SupportArena,
        ctx: &OrderingContext,
    ) -> LossPlan {
        let kill_order = self.order_for_casualties(units, support, ctx);

        let mut damage_slots = Vec::new();
        if ctx.rules.allow_multiple_hits_per_unit {
            let by_id: AHashMap<UnitId, &Unit> = units.iter().map(|u| (u.id, u)).collect();
            for id in &kill_order {
                if let Some(unit) = by_id.get(id) {
                    for _ in 0..unit.damage_capacity() {
                        damage_slots.push(*id);
                    }
                }
            }
        }

        LossPlan {
            damage_slots,
            kill_order,
        }
    }

    /// Deterministic worst-first kill order over the candidates
    pub fn order_for_casualties(
        &mut self,
        units: &[Unit],
        support: &SupportArena,
        ctx: &OrderingContext,
    ) -> Vec<UnitId> {
        if units.is_empty() {
            return Vec::new();
        }

        let key = self.build_key(units, ctx);
        if let Some(tokens) = self.memo.get(&key) {
            if let Some(order) = replay_tokens(tokens, units) {
                debug!(site = %ctx.battle_site, units = units.len(), "ordering memo hit");
                return order;
            }
        }
        debug!(site = %ctx.battle_site, units = units.len(), "ordering memo miss");

        let order = self.compute_order(units, support, ctx);

        let by_id: AHashMap<UnitId, &Unit> = units.iter().map(|u| (u.id, u)).collect();
        let tokens = order
            .iter()
            .filter_map(|id| by_id.get(id))
            .map(|u| OrderToken {
                type_name: u.type_name().to_string(),
                amphibious: u.was_amphibious,
            })
            .collect();
        self.memo.insert(key, tokens);

        order
    }

    fn build_key(&self, units: &[Unit], ctx: &OrderingContext) -> OrderingKey {
        OrderingKey {
            player: ctx.player,
            battle_site: ctx.battle_site.clone(),
            defending: ctx.defending,
            amphibious: ctx.amphibious,
            type_counts: count_types(units.iter()),
            amphibious_counts: count_types(units.iter().filter(|u| u.was_amphibious)),
        }
    }

    fn compute_order(
        &self,
        units: &[Unit],
        support: &SupportArena,
        ctx: &OrderingContext,
    ) -> Vec<UnitId> {
        let mut candidates: Vec<Candidate> = units
            .iter()
            .map(|u| {
                let base = u.unit_type.strength(ctx.defending) as i32;
                let territory = ctx
                    .territory_effects
                    .get(u.type_name())
                    .copied()
                    .unwrap_or(0);
                Candidate {
                    id: u.id,
                    type_name: u.type_name().to_string(),
                    cost: ctx.costs.cost_of(&u.unit_type),
                    strength: (base + territory).clamp(0, ctx.rules.dice_sides as i32) as u32,
                    rolls: u.unit_type.rolls(ctx.defending),
                    hit_points: u.remaining_hit_points(),
                }
            })
            .collect();

        // Static pre-sort: value ascending, with a power-blind secondary
        // comparator so the peel below is stable across identical powers.
        candidates.sort_by(|a, b| {
            a.cost
                .cmp(&b.cost)
                .then(a.rolls.cmp(&b.rolls))
                .then(a.hit_points.cmp(&b.hit_points))
                .then(a.type_name.cmp(&b.type_name))
        });

        // The peel: support shifts effective power as units drop out, so a
        // single static sort cannot be correct. Each round scans every
        // remaining candidate with its live support bonuses, takes the
        // weakest, and unwinds the edges it touched.
        let mut arena = support.clone();
        let mut order = Vec::with_capacity(candidates.len());
        while !candidates.is_empty() {
            let mut weakest_idx = 0;
            let mut weakest_power = u64::MAX;
            for (idx, candidate) in candidates.iter().enumerate() {
                let power = effective_power(candidate, &arena, ctx.rules.dice_sides);
                if power < weakest_power {
                    weakest_power = power;
                    weakest_idx = idx;
                }
            }

            let fallen = candidates.remove(weakest_idx);
            debug!(unit = ?fallen.id, power = weakest_power, "peeled weakest candidate");
            arena.remove_unit(fallen.id);
            order.push(fallen.id);
        }

        order
    }
}

/// Effective power including live support: clamped strength times rolls
fn effective_power(candidate: &Candidate, arena: &SupportArena, sides: u32) -> u64 {
    let (power_bonus, roll_bonus) = arena.bonuses_into(candidate.id);
    let strength = (candidate.strength as i32 + power_bonus).clamp(0, sides as i32) as u64;
    let rolls = (candidate.rolls as i32 + roll_bonus).max(0) as u64;
    strength * rolls
}

/// Map a memoized token order back onto concrete units
///
/// Returns `None` when the pool does not match the tokens, which sends the
/// caller down the recompute path.
fn replay_tokens(tokens: &[OrderToken], units: &[Unit]) -> Option<Vec<UnitId>> {
    if tokens.len() != units.len() {
        return None;
    }

    let mut used = vec![false; units.len()];
    let mut order = Vec::with_capacity(tokens.len());
    for token in tokens {
        let idx = units.iter().enumerate().position(|(i, u)| {
            !used[i] && u.type_name() == token.type_name && u.was_amphibious == token.amphibious
        })?;
        used[idx] = true;
        order.push(units[idx].id);
    }
    Some(order)
}

fn count_types<'a>(units: impl Iterator<Item = &'a Unit>) -> Vec<(String, u32)> {
    let mut counts: AHashMap<String, u32> = AHashMap::new();
    for unit in units {
        *counts.entry(unit.type_name().to_string()).or_insert(0) += 1;
    }
    let mut counts: Vec<_> = counts.into_iter().collect();
    counts.sort();
    counts
}
