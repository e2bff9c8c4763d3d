//! Anti-aircraft casualty selection
//!
//! AA fire has its own casualty rules, selected by rule variant. The
//! strategy is resolved once per battle setup into [`AaCasualtyMethod`];
//! configuration contradictions degrade gracefully to uniform random
//! instead of failing the battle.
//!
//! All strategies work on the hit-point slot list: one slot per remaining
//! hit point when multiple hits per unit are allowed, otherwise one slot
//! per unit. Hitting two slots of the same unit damages it, then kills it.

use tracing::warn;

use crate::casualty::{validate_selection, CasualtyDecider, CasualtySelection, SelectionContext};
use crate::core::config::{AaCasualtyMethod, RuleSet};
use crate::core::error::{EngineError, Result};
use crate::dice::{roll_low_luck, roll_to_hit, DicePurpose, DiceRoll, FiringGroup, RandomSource};
use crate::history::{CombatEvent, HistorySink};
use crate::unit::Unit;

/// Roll AA fire for a stack of guns against `target_slots` hit-point slots
///
/// Each gun covers every slot unless its type caps the roll count; the
/// stack as a whole never rolls more dice than there are slots. Returns the
/// roll plus the firing attack values the casualty strategies need.
pub fn roll_aa_fire(
    aa_units: &[Unit],
    target_slots: usize,
    rules: &RuleSet,
    source: &mut dyn RandomSource,
) -> Result<(DiceRoll, Vec<u32>)> {
    let guns: Vec<&Unit> = aa_units.iter().filter(|u| u.unit_type.is_aa).collect();
    if guns.is_empty() {
        let name = aa_units
            .first()
            .map(|u| u.type_name().to_string())
            .unwrap_or_else(|| "<empty stack>".to_string());
        return Err(EngineError::MissingAaAttachment(name));
    }

    let mut groups = Vec::new();
    let mut attacks = Vec::new();
    let mut budget = target_slots as u32;
    for gun in guns {
        if budget == 0 {
            break;
        }
        let allowance = gun
            .unit_type
            .max_aa_rolls
            .map(|cap| cap.min(budget))
            .unwrap_or(budget);
        groups.push(FiringGroup::new(gun.unit_type.aa_attack, allowance));
        attacks.push(gun.unit_type.aa_attack);
        budget -= allowance;
    }

    let roll = if rules.low_luck_for_aa() {
        roll_low_luck(&groups, rules.dice_sides, source, DicePurpose::AaFire)
    } else {
        roll_to_hit(&groups, rules.dice_sides, source, DicePurpose::AaFire)
    };
    Ok((roll, attacks))
}

pub struct AaCasualtySelector<'a> {
    rules: &'a RuleSet,
    method: AaCasualtyMethod,
}

impl<'a> AaCasualtySelector<'a> {
    /// Resolve the strategy for this battle from the rule set
    pub fn new(rules: &'a RuleSet) -> Self {
        Self {
            rules,
            method: rules.aa_casualty_method(),
        }
    }

    pub fn method(&self) -> AaCasualtyMethod {
        self.method
    }

    /// Pick exactly `roll.hits` casualties from `targets`
    ///
    /// `firing_attacks` lists the AA attack value of every firing type;
    /// low-luck grouping needs them to size its buckets.
    pub fn select(
        &self,
        targets: &[Unit],
        roll: &DiceRoll,
        firing_attacks: &[u32],
        decider: &mut dyn CasualtyDecider,
        ctx: &SelectionContext,
        source: &mut dyn RandomSource,
        history: &mut dyn HistorySink,
    ) -> Result<CasualtySelection> {
        let hits = roll.hits;
        if hits == 0 {
            let mut selection = CasualtySelection::new();
            selection.auto_selected = true;
            return Ok(selection);
        }

        let slots = self.slot_list(targets);

        // more hits than slots: the whole pool dies, nothing to choose
        if hits as usize >= slots.len() {
            let multi = self.rules.allow_multiple_hits_per_unit;
            let mut selection = CasualtySelection::new();
            for &slot in &slots {
                selection.add_hit(&targets[slot], multi);
            }
            selection.auto_selected = true;
            return Ok(selection);
        }

        match self.method {
            AaCasualtyMethod::PlayerChoice => {
                self.player_choice(targets, &slots, hits, decider, ctx, history)
            }
            AaCasualtyMethod::LowLuck => Ok(self.low_luck(
                targets,
                &slots,
                hits,
                firing_attacks,
                source,
                history,
            )),
            AaCasualtyMethod::IndividuallyFired => {
                Ok(self.individually_fired(targets, &slots, roll, source, history))
            }
            AaCasualtyMethod::UniformRandom => Ok(uniform_random(
                targets,
                &slots,
                hits,
                self.rules.allow_multiple_hits_per_unit,
                source,
            )),
        }
    }

    /// One slot per remaining hit point under the multi-hit rule, one per
    /// unit otherwise. Slot order follows pool order.
    fn slot_list(&self, targets: &[Unit]) -> Vec<usize> {
        let mut slots = Vec::new();
        for (idx, unit) in targets.iter().enumerate() {
            let per_unit = if self.rules.allow_multiple_hits_per_unit {
                unit.remaining_hit_points()
            } else {
                1
            };
            for _ in 0..per_unit {
                slots.push(idx);
            }
        }
        slots
    }

    fn player_choice(
        &self,
        targets: &[Unit],
        slots: &[usize],
        hits: u32,
        decider: &mut dyn CasualtyDecider,
        ctx: &SelectionContext,
        history: &mut dyn HistorySink,
    ) -> Result<CasualtySelection> {
        let multi = self.rules.allow_multiple_hits_per_unit;

        // default proposal: consume slots in pool order
        let mut proposal = CasualtySelection::new();
        for &slot in slots.iter().take(hits as usize) {
            proposal.add_hit(&targets[slot], multi);
        }
        proposal.auto_selected = true;

        let mut attempt = 0;
        loop {
            let selection = decider.select_casualties(ctx, targets, &proposal, hits);
            match validate_selection(&selection, targets, hits, ctx.edit_mode, multi) {
                Ok(()) => {
                    history.record(CombatEvent::CasualtiesSelected {
                        player: ctx.player,
                        killed: selection.killed.clone(),
                        damaged: selection.damaged.clone(),
                        auto_selected: selection.auto_selected,
                    });
                    return Ok(selection);
                }
                Err(err) => {
                    attempt += 1;
                    warn!(%err, attempt, "rejected AA casualty selection");
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

    /// Spread losses evenly: one casualty per fixed-size group
    ///
    /// Applies only when every firing type shares one attack value, the
    /// dice range divides by it, the slot pool divides into whole groups,
    /// and the hit count equals the group count. Anything else falls back
    /// to uniform random.
    fn low_luck(
        &self,
        targets: &[Unit],
        slots: &[usize],
        hits: u32,
        firing_attacks: &[u32],
        source: &mut dyn RandomSource,
        history: &mut dyn HistorySink,
    ) -> CasualtySelection {
        let multi = self.rules.allow_multiple_hits_per_unit;
        let fallback = |reason: &str, source: &mut dyn RandomSource, history: &mut dyn HistorySink| {
            warn!(%reason, "low-luck AA grouping not applicable, using uniform random");
            history.record(CombatEvent::AaMethodDegraded {
                requested: "low_luck".to_string(),
                reason: reason.to_string(),
            });
            uniform_random(targets, slots, hits, multi, source)
        };

        let Some(&attack) = firing_attacks.first() else {
            return fallback("no firing AA types", source, history);
        };
        if firing_attacks.iter().any(|&a| a != attack) {
            return fallback("heterogeneous AA attack values", source, history);
        }
        if attack == 0 || self.rules.dice_sides % attack != 0 {
            return fallback("attack does not divide the dice range", source, history);
        }

        let group_size = (self.rules.dice_sides / attack) as usize;
        if group_size == 0 || slots.len() % group_size != 0 {
            return fallback("slot pool does not divide into groups", source, history);
        }
        if slots.len() / group_size != hits as usize {
            return fallback("hit count does not match group count", source, history);
        }

        // one batched draw: a random offset within each group
        let offsets = source.draw(group_size as u32, hits as usize, DicePurpose::AaCasualties);
        let mut selection = CasualtySelection::new();
        for (group, offset) in slots.chunks_exact(group_size).zip(offsets) {
            selection.add_hit(&targets[group[offset as usize]], multi);
        }
        selection
    }

    /// Map die outcome i onto slot i; the dice were already rolled in slot
    /// order by the AA fire step
    fn individually_fired(
        &self,
        targets: &[Unit],
        slots: &[usize],
        roll: &DiceRoll,
        source: &mut dyn RandomSource,
        history: &mut dyn HistorySink,
    ) -> CasualtySelection {
        if roll.dice.len() != slots.len() {
            let reason = format!(
                "{} AA dice against {} hit-point slots",
                roll.dice.len(),
                slots.len()
            );
            warn!(%reason, "individually-fired AA mismatch, using uniform random");
            history.record(CombatEvent::AaMethodDegraded {
                requested: "individually_fired".to_string(),
                reason,
            });
            return uniform_random(
                targets,
                slots,
                roll.hits,
                self.rules.allow_multiple_hits_per_unit,
                source,
            );
        }

        let multi = self.rules.allow_multiple_hits_per_unit;
        let mut selection = CasualtySelection::new();
        for (die, &slot) in roll.dice.iter().zip(slots) {
            if die.hit {
                selection.add_hit(&targets[slot], multi);
            }
        }
        selection
    }
}

/// Draw `hits` slots without replacement from one batched random call
///
/// Consumption is positional: `pos += element; remove(pos % remaining)`.
/// The accumulator deliberately carries across removals, so the draw stays
/// a single batch regardless of pool size.
fn uniform_random(
    targets: &[Unit],
    slots: &[usize],
    hits: u32,
    allow_multiple_hits: bool,
    source: &mut dyn RandomSource,
) -> CasualtySelection {
    let draws = source.draw(slots.len() as u32, hits as usize, DicePurpose::AaCasualties);

    let mut remaining: Vec<usize> = slots.to_vec();
    let mut selection = CasualtySelection::new();
    let mut pos: usize = 0;
    for element in draws {
        pos += element as usize;
        let slot = remaining.remove(pos % remaining.len());
        selection.add_hit(&targets[slot], allow_multiple_hits);
    }
    selection
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::casualty::DefaultDecider;
    use crate::core::types::{PlayerId, TerritoryId};
    use crate::dice::{Die, ScriptedSource};
    use crate::history::MemoryHistory;
    use crate::unit::test_types::{battleship, fighter};

    fn pool(n: usize) -> Vec<Unit> {
        let owner = PlayerId::new();
        (0..n).map(|_| Unit::new(fighter(), owner)).collect()
    }

    fn ctx() -> SelectionContext {
        SelectionContext::new(PlayerId::new(), TerritoryId::new("Coastal Strip"), true)
    }

    fn roll_with_hits(hits: u32, dice: usize) -> DiceRoll {
        let dice = (0..dice)
            .map(|i| Die {
                value: 0,
                hit: (i as u32) < hits,
            })
            .collect();
        DiceRoll::new(dice)
    }

    #[test]
    fn test_uniform_random_consumes_positionally() {
        let targets = pool(3);
        let slots = vec![0, 1, 2];

        // pos=0 removes slot 0; pos=1 removes index 1 of [1, 2] -> slot 2
        let mut source = ScriptedSource::new([0, 1]);
        let selection = uniform_random(&targets, &slots, 2, false, &mut source);
        assert_eq!(selection.killed, vec![targets[0].id, targets[2].id]);

        // pos stays 0 twice: slots 0 then 1
        let mut source = ScriptedSource::new([0, 0]);
        let selection = uniform_random(&targets, &slots, 2, false, &mut source);
        assert_eq!(selection.killed, vec![targets[0].id, targets[1].id]);
    }

    #[test]
    fn test_random_method_batches_one_draw() {
        let rules = RuleSet::default();
        let selector = AaCasualtySelector::new(&rules);
        let targets = pool(4);

        // a scripted source panics if drawn from twice with leftover values
        let mut source = ScriptedSource::new([2, 0]);
        let selection = selector
            .select(
                &targets,
                &roll_with_hits(2, 4),
                &[1],
                &mut DefaultDecider,
                &ctx(),
                &mut source,
                &mut MemoryHistory::new(),
            )
            .unwrap();

        assert_eq!(selection.hit_count(), 2);
        assert_eq!(source.remaining(), 0);
    }

    #[test]
    fn test_low_luck_one_casualty_per_group() {
        // attack 2 on d6: group size 3; 6 slots -> two groups, 2 hits
        let rules = RuleSet {
            low_luck: true,
            random_aa_casualties: false,
            ..RuleSet::default()
        };
        let selector = AaCasualtySelector::new(&rules);
        assert_eq!(selector.method(), AaCasualtyMethod::LowLuck);

        let targets = pool(6);
        let mut source = ScriptedSource::new([1, 2]);
        let selection = selector
            .select(
                &targets,
                &roll_with_hits(2, 2),
                &[2],
                &mut DefaultDecider,
                &ctx(),
                &mut source,
                &mut MemoryHistory::new(),
            )
            .unwrap();

        assert_eq!(selection.hit_count(), 2);
        // one from the first group of three, one from the second
        assert_eq!(selection.killed[0], targets[1].id);
        assert_eq!(selection.killed[1], targets[5].id);
    }

    #[test]
    fn test_low_luck_heterogeneous_attacks_fall_back() {
        let rules = RuleSet {
            low_luck: true,
            random_aa_casualties: false,
            ..RuleSet::default()
        };
        let selector = AaCasualtySelector::new(&rules);
        let targets = pool(6);
        let mut history = MemoryHistory::new();

        let mut source = ScriptedSource::new([0, 0]);
        let selection = selector
            .select(
                &targets,
                &roll_with_hits(2, 2),
                &[2, 3],
                &mut DefaultDecider,
                &ctx(),
                &mut source,
                &mut history,
            )
            .unwrap();

        assert_eq!(selection.hit_count(), 2);
        assert!(history
            .events()
            .iter()
            .any(|e| matches!(e, CombatEvent::AaMethodDegraded { .. })));
    }

    #[test]
    fn test_individually_fired_maps_dice_to_slots() {
        let rules = RuleSet {
            roll_aa_individually: true,
            random_aa_casualties: false,
            ..RuleSet::default()
        };
        let selector = AaCasualtySelector::new(&rules);
        let targets = pool(4);

        let roll = DiceRoll::new(vec![
            Die { value: 5, hit: false },
            Die { value: 0, hit: true },
            Die { value: 4, hit: false },
            Die { value: 0, hit: true },
        ]);

        let mut source = ScriptedSource::new([]);
        let selection = selector
            .select(
                &targets,
                &roll,
                &[1],
                &mut DefaultDecider,
                &ctx(),
                &mut source,
                &mut MemoryHistory::new(),
            )
            .unwrap();

        // hits landed on dice 1 and 3, so exactly those units die
        assert_eq!(selection.killed, vec![targets[1].id, targets[3].id]);
    }

    #[test]
    fn test_individually_fired_mismatch_degrades() {
        let rules = RuleSet {
            roll_aa_individually: true,
            random_aa_casualties: false,
            ..RuleSet::default()
        };
        let selector = AaCasualtySelector::new(&rules);
        let targets = pool(4);
        let mut history = MemoryHistory::new();

        // three dice against four slots: fall back to uniform random
        let mut source = ScriptedSource::new([0]);
        let selection = selector
            .select(
                &targets,
                &roll_with_hits(1, 3),
                &[1],
                &mut DefaultDecider,
                &ctx(),
                &mut source,
                &mut history,
            )
            .unwrap();

        assert_eq!(selection.hit_count(), 1);
        assert!(history
            .events()
            .iter()
            .any(|e| matches!(e, CombatEvent::AaMethodDegraded { .. })));
    }

    #[test]
    fn test_player_choice_uses_decider() {
        let rules = RuleSet {
            choose_aa_casualties: true,
            ..RuleSet::default()
        };
        let selector = AaCasualtySelector::new(&rules);
        let targets = pool(3);

        struct PickLast;
        impl CasualtyDecider for PickLast {
            fn select_casualties(
                &mut self,
                _ctx: &SelectionContext,
                candidates: &[Unit],
                _default_proposal: &CasualtySelection,
                hits: u32,
            ) -> CasualtySelection {
                let mut selection = CasualtySelection::new();
                for unit in candidates.iter().rev().take(hits as usize) {
                    selection.add_hit(unit, false);
                }
                selection
            }
        }

        let mut source = ScriptedSource::new([]);
        let selection = selector
            .select(
                &targets,
                &roll_with_hits(1, 3),
                &[1],
                &mut PickLast,
                &ctx(),
                &mut source,
                &mut MemoryHistory::new(),
            )
            .unwrap();

        assert_eq!(selection.killed, vec![targets[2].id]);
    }

    #[test]
    fn test_player_choice_bounded_retry() {
        let rules = RuleSet {
            choose_aa_casualties: true,
            max_selection_retries: 2,
            ..RuleSet::default()
        };
        let selector = AaCasualtySelector::new(&rules);
        let targets = pool(3);

        struct AlwaysWrong;
        impl CasualtyDecider for AlwaysWrong {
            fn select_casualties(
                &mut self,
                _ctx: &SelectionContext,
                _candidates: &[Unit],
                _default_proposal: &CasualtySelection,
                _hits: u32,
            ) -> CasualtySelection {
                CasualtySelection::new() // always zero casualties
            }
        }

        let mut history = MemoryHistory::new();
        let mut source = ScriptedSource::new([]);
        let result = selector.select(
            &targets,
            &roll_with_hits(1, 3),
            &[1],
            &mut AlwaysWrong,
            &ctx(),
            &mut source,
            &mut history,
        );

        assert!(matches!(
            result,
            Err(EngineError::SelectionRetriesExhausted { attempts: 2 })
        ));
        assert_eq!(
            history
                .events()
                .iter()
                .filter(|e| matches!(e, CombatEvent::SelectionRejected { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn test_overwhelming_hits_kill_everything() {
        let rules = RuleSet::default();
        let selector = AaCasualtySelector::new(&rules);
        let targets = pool(2);

        let mut source = ScriptedSource::new([]);
        let selection = selector
            .select(
                &targets,
                &roll_with_hits(3, 3),
                &[1],
                &mut DefaultDecider,
                &ctx(),
                &mut source,
                &mut MemoryHistory::new(),
            )
            .unwrap();

        assert_eq!(selection.killed.len(), 2);
        assert!(selection.auto_selected);
    }

    #[test]
    fn test_multi_hit_slots_damage_before_kill() {
        let rules = RuleSet {
            allow_multiple_hits_per_unit: true,
            ..RuleSet::default()
        };
        let selector = AaCasualtySelector::new(&rules);

        let owner = PlayerId::new();
        let targets = vec![Unit::new(battleship(), owner), Unit::new(fighter(), owner)];
        // slots: [ship, ship, fighter]; draws 0,0 hit both ship slots
        let mut source = ScriptedSource::new([0, 0]);
        let selection = selector
            .select(
                &targets,
                &roll_with_hits(2, 2),
                &[1],
                &mut DefaultDecider,
                &ctx(),
                &mut source,
                &mut MemoryHistory::new(),
            )
            .unwrap();

        assert_eq!(selection.damaged, vec![targets[0].id]);
        assert_eq!(selection.killed, vec![targets[0].id]);
        assert_eq!(selection.hit_count(), 2);
    }

    #[test]
    fn test_roll_aa_fire_one_die_per_slot() {
        let rules = RuleSet::default();
        let owner = PlayerId::new();
        let guns = vec![Unit::new(crate::unit::test_types::aa_gun(), owner)];

        let mut source = ScriptedSource::new([0, 5, 3]);
        let (roll, attacks) = roll_aa_fire(&guns, 3, &rules, &mut source).unwrap();

        assert_eq!(roll.dice.len(), 3);
        assert_eq!(roll.hits, 1); // only the 0 beats attack 1
        assert_eq!(attacks, vec![1]);
    }

    #[test]
    fn test_roll_aa_fire_respects_type_roll_cap() {
        let rules = RuleSet::default();
        let owner = PlayerId::new();
        let mut capped = (*crate::unit::test_types::aa_gun()).clone();
        capped.max_aa_rolls = Some(2);
        let guns = vec![Unit::new(std::sync::Arc::new(capped), owner)];

        let mut source = ScriptedSource::new([0, 0]);
        let (roll, _) = roll_aa_fire(&guns, 5, &rules, &mut source).unwrap();
        assert_eq!(roll.dice.len(), 2);
    }

    #[test]
    fn test_roll_aa_fire_without_gun_is_fatal() {
        let rules = RuleSet::default();
        let guns = pool(1); // fighters, not AA
        let mut source = ScriptedSource::new([]);
        assert!(matches!(
            roll_aa_fire(&guns, 3, &rules, &mut source),
            Err(EngineError::MissingAaAttachment(_))
        ));
    }

    #[test]
    fn test_roll_aa_fire_low_luck_guarantees_hits() {
        let rules = RuleSet {
            low_luck_aa_only: true,
            ..RuleSet::default()
        };
        let owner = PlayerId::new();
        let mut strong = (*crate::unit::test_types::aa_gun()).clone();
        strong.aa_attack = 2;
        let guns = vec![Unit::new(std::sync::Arc::new(strong), owner)];

        // 6 slots at attack 2 on d6: power 12, two certain hits, no draw
        let mut source = ScriptedSource::new([]);
        let (roll, _) = roll_aa_fire(&guns, 6, &rules, &mut source).unwrap();
        assert_eq!(roll.hits, 2);
        assert_eq!(source.remaining(), 0);
    }
}
