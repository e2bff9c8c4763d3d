//! General combat casualty resolution
//!
//! Builds a default proposal from the ordering engine, lets the player
//! override it where a real choice exists, enforces the hit-accounting
//! invariants, and substitutes amphibious-origin units when the partial
//! retreat rule is on.

use ahash::AHashMap;
use tracing::{debug, warn};

use crate::casualty::{
    hit_slots, validate_selection, CasualtyDecider, CasualtySelection, SelectionContext,
};
use crate::core::config::RuleSet;
use crate::core::error::{EngineError, Result};
use crate::core::types::UnitId;
use crate::history::{CombatEvent, HistorySink};
use crate::ordering::{CasualtyOrderingEngine, OrderingContext};
use crate::unit::support::SupportArena;
use crate::unit::Unit;

pub struct StandardCasualtySelector<'a> {
    rules: &'a RuleSet,
}

impl<'a> StandardCasualtySelector<'a> {
    pub fn new(rules: &'a RuleSet) -> Self {
        Self { rules }
    }

    /// Resolve `hits` against the candidate pool
    pub fn select_casualties(
        &self,
        candidates: &[Unit],
        hits: u32,
        support: &SupportArena,
        ordering: &mut CasualtyOrderingEngine,
        ordering_ctx: &OrderingContext,
        decider: &mut dyn CasualtyDecider,
        ctx: &SelectionContext,
        history: &mut dyn HistorySink,
    ) -> Result<CasualtySelection> {
        let multi = self.rules.allow_multiple_hits_per_unit;

        if hits == 0 || candidates.is_empty() {
            let mut selection = CasualtySelection::new();
            selection.auto_selected = true;
            return Ok(selection);
        }

        let total_slots: u32 = candidates.iter().map(|u| hit_slots(u, multi)).sum();

        // all-or-nothing: everything dies, no choice to offer
        if !ctx.edit_mode && hits >= total_slots {
            let mut selection = CasualtySelection::new();
            for unit in candidates {
                for _ in 0..hit_slots(unit, multi) {
                    selection.add_hit(unit, multi);
                }
            }
            selection.auto_selected = true;
            self.finish(selection, candidates, ctx, history)
        } else if !ctx.edit_mode && is_homogeneous_one_hit(candidates) {
            // identical one-hit units: any subset is as good as any other
            let mut selection = CasualtySelection::new();
            for unit in candidates.iter().take(hits as usize) {
                selection.add_hit(unit, multi);
            }
            selection.auto_selected = true;
            self.finish(selection, candidates, ctx, history)
        } else {
            let proposal = self.default_proposal(candidates, hits, support, ordering, ordering_ctx);
            let selection = self.prompt(candidates, hits, proposal, decider, ctx, history)?;
            self.finish(selection, candidates, ctx, history)
        }
    }

    /// Default proposal: damage increments first, then kills in peel order
    fn default_proposal(
        &self,
        candidates: &[Unit],
        hits: u32,
        support: &SupportArena,
        ordering: &mut CasualtyOrderingEngine,
        ordering_ctx: &OrderingContext,
    ) -> CasualtySelection {
        let multi = self.rules.allow_multiple_hits_per_unit;
        let plan = ordering.loss_plan(candidates, support, ordering_ctx);
        let by_id: AHashMap<UnitId, &Unit> = candidates.iter().map(|u| (u.id, u)).collect();

        let mut proposal = CasualtySelection::new();
        for id in plan.damage_slots.iter().chain(plan.kill_order.iter()) {
            if proposal.hit_count() >= hits {
                break;
            }
            if let Some(unit) = by_id.get(id) {
                proposal.add_hit(unit, multi);
            }
        }
        proposal.auto_selected = true;
        proposal
    }

    fn prompt(
        &self,
        candidates: &[Unit],
        hits: u32,
        proposal: CasualtySelection,
        decider: &mut dyn CasualtyDecider,
        ctx: &SelectionContext,
        history: &mut dyn HistorySink,
    ) -> Result<CasualtySelection> {
        let multi = self.rules.allow_multiple_hits_per_unit;
        let mut attempt = 0;
        loop {
            let selection = decider.select_casualties(ctx, candidates, &proposal, hits);
            match validate_selection(&selection, candidates, hits, ctx.edit_mode, multi) {
                Ok(()) => return Ok(selection),
                Err(err) => {
                    attempt += 1;
                    warn!(%err, attempt, "rejected casualty selection");
                    history.record(CombatEvent::SelectionRejected {
                        player: ctx.player,
                        attempt,
                        reason: err.to_string(),
                    });
                    if attempt >= self.rules.max_selection_retries {
                        return Err(EngineError::SelectionRetriesExhausted { attempts: attempt });
                    }
                }
            }
        }
    }

    /// Amphibious substitution, final validation, history
    fn finish(
        &self,
        mut selection: CasualtySelection,
        candidates: &[Unit],
        ctx: &SelectionContext,
        history: &mut dyn HistorySink,
    ) -> Result<CasualtySelection> {
        if self.rules.partial_amphibious_retreat {
            substitute_amphibious(&mut selection, candidates);
        }

        // the substitution preserves legality, but a corrupted pool does
        // not get to slip through here
        let multi = self.rules.allow_multiple_hits_per_unit;
        validate_selection(&selection, candidates, selection.hit_count(), true, multi)
            .map_err(|err| EngineError::CorruptGameState(err.to_string()))?;

        history.record(CombatEvent::CasualtiesSelected {
            player: ctx.player,
            killed: selection.killed.clone(),
            damaged: selection.damaged.clone(),
            auto_selected: selection.auto_selected,
        });
        Ok(selection)
    }
}

fn is_homogeneous_one_hit(candidates: &[Unit]) -> bool {
    let first = &candidates[0];
    candidates.iter().all(|u| {
        u.remaining_hit_points() == 1
            && u.type_name() == first.type_name()
            && u.hits_taken == first.hits_taken
    })
}

/// Prefer killing amphibious-origin units over otherwise-identical
/// non-amphibious ones, so the survivors may still retreat
fn substitute_amphibious(selection: &mut CasualtySelection, candidates: &[Unit]) {
    let by_id: AHashMap<UnitId, &Unit> = candidates.iter().map(|u| (u.id, u)).collect();

    let killed_ids: Vec<UnitId> = selection.killed.clone();
    for victim_id in killed_ids {
        let Some(victim) = by_id.get(&victim_id) else {
            continue;
        };
        if victim.was_amphibious {
            continue;
        }

        let replacement = candidates.iter().find(|c| {
            c.was_amphibious
                && c.id != victim_id
                && c.type_name() == victim.type_name()
                && c.hits_taken == victim.hits_taken
                && !selection.is_killed(c.id)
                && selection.damage_assigned(c.id) == 0
        });

        if let Some(replacement) = replacement {
            debug!(victim = ?victim_id, replacement = ?replacement.id,
                "substituting amphibious casualty");
            let rid = replacement.id;
            // swap every occurrence so damage budgets stay consistent
            for id in selection
                .killed
                .iter_mut()
                .chain(selection.damaged.iter_mut())
            {
                if *id == victim_id {
                    *id = rid;
                }
            }
        }
    }
}
