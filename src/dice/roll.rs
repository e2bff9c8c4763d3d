//! Dice-to-hit apportionment
//!
//! Converts firing groups (strength + roll count) into hit counts, either
//! fully random or under the low-luck variance-reduction rule. Results keep
//! the ordered per-die outcomes because some casualty strategies map dice
//! onto targets positionally.

use serde::{Deserialize, Serialize};

use crate::dice::{DicePurpose, RandomSource};

/// A single die outcome with its hit/miss classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Die {
    /// Raw value in `[0, sides)`
    pub value: u32,
    pub hit: bool,
}

/// Outcome of one batched roll: hit count plus the ordered die sequence
///
/// Created fresh per call, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRoll {
    pub dice: Vec<Die>,
    pub hits: u32,
}

impl DiceRoll {
    pub fn new(dice: Vec<Die>) -> Self {
        let hits = dice.iter().filter(|d| d.hit).count() as u32;
        Self { dice, hits }
    }

    /// A roll with no dice and no hits
    pub fn empty() -> Self {
        Self {
            dice: Vec::new(),
            hits: 0,
        }
    }
}

/// One group of identical shooters: how hard they hit and how often
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiringGroup {
    /// Hit on a die value strictly below this, against the configured sides
    pub strength: u32,
    /// Number of dice this group rolls
    pub rolls: u32,
}

impl FiringGroup {
    pub fn new(strength: u32, rolls: u32) -> Self {
        Self { strength, rolls }
    }

    fn power(&self, sides: u32) -> u32 {
        self.strength.min(sides) * self.rolls
    }
}

/// Roll every group's dice in one batched draw and classify hits
///
/// Die `i` of a group hits when `value < strength`. The output sequence
/// preserves group order, so positional strategies can map die `i` back to
/// shooter `i`.
pub fn roll_to_hit(
    groups: &[FiringGroup],
    sides: u32,
    source: &mut dyn RandomSource,
    purpose: DicePurpose,
) -> DiceRoll {
    let total_rolls: u32 = groups.iter().map(|g| g.rolls).sum();
    if total_rolls == 0 {
        return DiceRoll::empty();
    }

    let values = source.draw(sides, total_rolls as usize, purpose);
    let mut dice = Vec::with_capacity(values.len());
    let mut cursor = values.into_iter();
    for group in groups {
        for _ in 0..group.rolls {
            // draw returned exactly total_rolls values
            let value = cursor.next().expect("random source returned short batch");
            dice.push(Die {
                value,
                hit: value < group.strength.min(sides),
            });
        }
    }
    DiceRoll::new(dice)
}

/// Low-luck apportionment: guaranteed hits from total power, one die for
/// the remainder
///
/// Total power `P` over `S`-sided dice yields `P / S` certain hits; the
/// remainder `P % S` is resolved by a single extra die (hit when
/// `value < remainder`). A zero remainder draws nothing at all.
pub fn roll_low_luck(
    groups: &[FiringGroup],
    sides: u32,
    source: &mut dyn RandomSource,
    purpose: DicePurpose,
) -> DiceRoll {
    let power: u32 = groups.iter().map(|g| g.power(sides)).sum();
    let guaranteed = power / sides;
    let remainder = power % sides;

    let mut dice: Vec<Die> = (0..guaranteed)
        .map(|_| Die {
            value: 0,
            hit: true,
        })
        .collect();

    if remainder > 0 {
        let value = source.draw(sides, 1, purpose)[0];
        dice.push(Die {
            value,
            hit: value < remainder,
        });
    }

    DiceRoll::new(dice)
}
