//! Turn engine.
//!
//! Resolves one roll for the active player: held footsteps are rolled again,
//! the rest of the roll is drawn fresh from the cup, and every die lands in
//! the discard pile or back in the player's hand.

use super::dice::{DiceCup, DieColor, Face, RandomSource, RolledDie};
use serde::{Deserialize, Serialize};

/// Per-turn counters for one player.
///
/// `brains` and `shotguns` accumulate across rolls; `footsteps` is the number
/// of dice currently held, replaced after every roll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnStats {
    pub brains: u32,
    pub shotguns: u32,
    pub footsteps: u32,
}

impl TurnStats {
    pub fn is_eliminated(&self, hazards_to_eliminate: u32) -> bool {
        self.shotguns >= hazards_to_eliminate
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Face counts for a single roll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollTally {
    pub brains: u32,
    pub shotguns: u32,
    pub footsteps: u32,
}

impl RollTally {
    fn record(&mut self, face: Face) {
        match face {
            Face::Brain => self.brains += 1,
            Face::Shotgun => self.shotguns += 1,
            Face::Footsteps => self.footsteps += 1,
        }
    }
}

/// Everything one roll produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollResult {
    /// Rerolled footsteps first, then freshly drawn dice
    pub dice: Vec<RolledDie>,
    pub tally: RollTally,
}

/// Dice the active player is holding between rolls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hand {
    held: Vec<DieColor>,
}

impl Hand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn held(&self) -> &[DieColor] {
        &self.held
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// Roll `dice_per_roll` dice and fold the outcome into `stats`.
    ///
    /// Random draws are consumed in a fixed order: cup indices for the fresh
    /// dice first, then one face per die in the order of [`RollResult::dice`].
    pub fn roll(
        &mut self,
        cup: &mut DiceCup,
        stats: &mut TurnStats,
        dice_per_roll: usize,
        rng: &mut dyn RandomSource,
    ) -> RollResult {
        let mut to_roll = std::mem::take(&mut self.held);
        let needed = dice_per_roll.saturating_sub(to_roll.len());
        to_roll.extend(cup.draw(needed, rng));

        let mut tally = RollTally::default();
        let mut dice = Vec::with_capacity(to_roll.len());

        for color in to_roll {
            let face = color.roll(rng);
            tally.record(face);

            if face.is_resolved() {
                cup.discard(color);
            } else {
                self.held.push(color);
            }

            dice.push(RolledDie { color, face });
        }

        stats.brains += tally.brains;
        stats.shotguns += tally.shotguns;
        stats.footsteps = self.held.len() as u32;

        RollResult { dice, tally }
    }

    /// Put held dice back in the cup. They were never resolved.
    pub fn release(&mut self, cup: &mut DiceCup) {
        if !self.held.is_empty() {
            log::debug!("Returning {} held dice to the cup", self.held.len());
        }
        cup.return_to_cup(self.held.drain(..));
    }
}
