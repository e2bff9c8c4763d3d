//! Support relationships between units
//!
//! A support edge lets one unit raise (or lower) another's combat power or
//! roll count while both are present: artillery boosting infantry, a
//! destroyer screening a carrier. Edges are asymmetric, carry a consumable
//! use counter, and live in an arena owned by one resolution call — the
//! ordering engine mutates them while peeling casualties.

use serde::{Deserialize, Serialize};

use crate::core::types::UnitId;

/// One directed support relationship
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportEdge {
    pub giver: UnitId,
    pub receiver: UnitId,
    pub power_bonus: i32,
    pub roll_bonus: i32,
    /// Remaining consumable uses; an edge with zero uses is inert
    pub uses: u32,
}

impl SupportEdge {
    pub fn new(giver: UnitId, receiver: UnitId, power_bonus: i32, roll_bonus: i32) -> Self {
        Self {
            giver,
            receiver,
            power_bonus,
            roll_bonus,
            uses: 1,
        }
    }

    pub fn with_uses(mut self, uses: u32) -> Self {
        self.uses = uses;
        self
    }

    pub fn is_active(&self) -> bool {
        self.uses > 0
    }
}

/// Arena of support edges for one resolution call
///
/// Plain adjacency list over unit identity. Removing a unit unwinds every
/// edge it touches and reports which receivers were affected so the caller
/// can recompute only those.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupportArena {
    edges: Vec<SupportEdge>,
}

impl SupportArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, edge: SupportEdge) {
        self.edges.push(edge);
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Active edges pointing at `receiver`
    pub fn edges_into(&self, receiver: UnitId) -> impl Iterator<Item = &SupportEdge> {
        self.edges
            .iter()
            .filter(move |e| e.receiver == receiver && e.is_active())
    }

    /// Active edges given out by `giver`
    pub fn edges_from(&self, giver: UnitId) -> impl Iterator<Item = &SupportEdge> {
        self.edges
            .iter()
            .filter(move |e| e.giver == giver && e.is_active())
    }

    /// Summed (power, roll) bonuses flowing into `receiver`
    pub fn bonuses_into(&self, receiver: UnitId) -> (i32, i32) {
        self.edges_into(receiver)
            .fold((0, 0), |(p, r), e| (p + e.power_bonus, r + e.roll_bonus))
    }

    /// Consume one use from each active edge `giver` provides
    pub fn consume_from(&mut self, giver: UnitId) {
        for edge in &mut self.edges {
            if edge.giver == giver && edge.uses > 0 {
                edge.uses -= 1;
            }
        }
    }

    /// Remove every edge touching `unit`, returning the receivers whose
    /// power must be recomputed
    ///
    /// This is the unwind step of the ordering peel: when a unit is chosen
    /// as a casualty, the support it gave (and received) must stop counting
    /// before the next-weakest search.
    pub fn remove_unit(&mut self, unit: UnitId) -> Vec<UnitId> {
        let mut affected = Vec::new();
        self.edges.retain(|e| {
            let touches = e.giver == unit || e.receiver == unit;
            if touches && e.giver == unit && e.receiver != unit && e.is_active() {
                affected.push(e.receiver);
            }
            !touches
        });
        affected.sort_unstable_by_key(|id| id.0);
        affected.dedup();
        affected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bonuses_sum_over_active_edges() {
        let giver_a = UnitId::new();
        let giver_b = UnitId::new();
        let receiver = UnitId::new();

        let mut arena = SupportArena::new();
        arena.add(SupportEdge::new(giver_a, receiver, 1, 0));
        arena.add(SupportEdge::new(giver_b, receiver, 2, 1));

        assert_eq!(arena.bonuses_into(receiver), (3, 1));
    }

    #[test]
    fn test_spent_edges_are_inert() {
        let giver = UnitId::new();
        let receiver = UnitId::new();

        let mut arena = SupportArena::new();
        arena.add(SupportEdge::new(giver, receiver, 2, 0).with_uses(1));
        arena.consume_from(giver);

        assert_eq!(arena.bonuses_into(receiver), (0, 0));
        assert_eq!(arena.edges_into(receiver).count(), 0);
    }

    #[test]
    fn test_remove_unit_reports_affected_receivers() {
        let giver = UnitId::new();
        let receiver_a = UnitId::new();
        let receiver_b = UnitId::new();

        let mut arena = SupportArena::new();
        arena.add(SupportEdge::new(giver, receiver_a, 1, 0));
        arena.add(SupportEdge::new(giver, receiver_b, 1, 0));
        arena.add(SupportEdge::new(receiver_a, giver, 1, 0));

        let mut affected = arena.remove_unit(giver);
        affected.sort_by_key(|id| id.0);

        assert_eq!(affected.len(), 2);
        assert!(affected.contains(&receiver_a));
        assert!(affected.contains(&receiver_b));
        assert!(arena.is_empty());
    }

    #[test]
    fn test_remove_unit_ignores_spent_edges() {
        let giver = UnitId::new();
        let receiver = UnitId::new();

        let mut arena = SupportArena::new();
        arena.add(SupportEdge::new(giver, receiver, 1, 0).with_uses(0));

        let affected = arena.remove_unit(giver);
        assert!(affected.is_empty());
    }
}
