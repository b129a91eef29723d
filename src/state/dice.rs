//! Dice cup and die definitions.
//!
//! A session owns exactly [`TOTAL_DICE`] dice for its whole lifetime. A die
//! is always in one of three places: the cup, the discard pile, or held by
//! the active player after rolling footsteps. When the cup runs short the
//! discard pile is poured back in first, so a roll always gets its dice.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Number of dice in a full cup.
pub const TOTAL_DICE: usize = 13;

/// Faces on every die.
pub const FACES: usize = 6;

/// Die colors. Each color has its own face distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DieColor {
    Green,
    Yellow,
    Red,
}

impl DieColor {
    pub const ALL: [DieColor; 3] = [DieColor::Green, DieColor::Yellow, DieColor::Red];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
        }
    }

    /// How many dice of this color a full cup holds.
    pub fn count(&self) -> usize {
        match self {
            Self::Green => 6,
            Self::Yellow => 4,
            Self::Red => 3,
        }
    }

    /// Face partition as `(brains, shotguns, footsteps)`. Always sums to [`FACES`].
    pub fn faces(&self) -> (usize, usize, usize) {
        match self {
            Self::Green => (3, 1, 2),
            Self::Yellow => (2, 2, 2),
            Self::Red => (1, 3, 2),
        }
    }

    /// Map a face index in `0..FACES` to its outcome.
    pub fn face(&self, index: usize) -> Face {
        let (brains, shotguns, _) = self.faces();
        if index < brains {
            Face::Brain
        } else if index < brains + shotguns {
            Face::Shotgun
        } else {
            Face::Footsteps
        }
    }

    /// Roll this die once.
    pub fn roll(&self, rng: &mut dyn RandomSource) -> Face {
        self.face(rng.below(FACES))
    }
}

impl fmt::Display for DieColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single die.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Face {
    /// Scores toward the turn total
    Brain,
    /// Counts toward elimination
    Shotgun,
    /// Must be kept and rolled again
    Footsteps,
}

impl Face {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Brain => "brain",
            Self::Shotgun => "shotgun",
            Self::Footsteps => "footsteps",
        }
    }

    /// Brains and shotguns leave play for the rest of the round.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Brain | Self::Shotgun)
    }
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for RolledDie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.color, self.face)
    }
}

/// A die after rolling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolledDie {
    pub color: DieColor,
    pub face: Face,
}

/// Source of uniform random indices for drawing and rolling.
///
/// Sessions hold one of these so tests can replay exact sequences.
pub trait RandomSource: Send + fmt::Debug {
    /// Uniform index in `0..upper`. Callers never pass zero.
    fn below(&mut self, upper: usize) -> usize;
}

/// [`RandomSource`] backed by a seedable [`StdRng`].
pub struct SeededSource {
    rng: StdRng,
}

impl SeededSource {
    /// Seed from the operating system.
    pub fn from_os() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic source for reproducible sessions.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl fmt::Debug for SeededSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeededSource").finish_non_exhaustive()
    }
}

impl RandomSource for SeededSource {
    fn below(&mut self, upper: usize) -> usize {
        self.rng.random_range(0..upper)
    }
}

/// [`RandomSource`] that replays a fixed script.
///
/// Each value is reduced modulo `upper`; once the script runs out every call
/// returns 0.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    script: VecDeque<usize>,
}

impl ScriptedSource {
    pub fn new(script: impl IntoIterator<Item = usize>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }

    /// Append more values to the end of the script.
    pub fn extend(&mut self, values: impl IntoIterator<Item = usize>) {
        self.script.extend(values);
    }

    /// Values not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl RandomSource for ScriptedSource {
    fn below(&mut self, upper: usize) -> usize {
        self.script.pop_front().map_or(0, |v| v % upper)
    }
}

/// The per-session pool of dice not currently in a player's hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiceCup {
    /// Dice available to draw
    cup: Vec<DieColor>,

    /// Dice resolved to brain or shotgun since the last reshuffle
    discard: Vec<DieColor>,
}

impl Default for DiceCup {
    fn default() -> Self {
        Self::new()
    }
}

impl DiceCup {
    /// A full cup: six green, four yellow, three red.
    pub fn new() -> Self {
        let cup = DieColor::ALL
            .iter()
            .flat_map(|color| std::iter::repeat(*color).take(color.count()))
            .collect();
        Self {
            cup,
            discard: Vec::new(),
        }
    }

    /// Dice left in the cup.
    pub fn cup(&self) -> &[DieColor] {
        &self.cup
    }

    /// Dice in the discard pile.
    pub fn discarded(&self) -> &[DieColor] {
        &self.discard
    }

    /// Count of dice available to draw.
    pub fn available(&self) -> usize {
        self.cup.len()
    }

    /// Dice in the cup plus the discard pile.
    pub fn total(&self) -> usize {
        self.cup.len() + self.discard.len()
    }

    /// Draw `n` dice uniformly without replacement.
    ///
    /// If the cup holds fewer than `n`, the discard pile is poured back in
    /// first. Returns fewer than `n` only when cup and discard together hold
    /// fewer than `n` dice. A lobby never gets there: at most
    /// `dice_per_roll` dice are held, and a roll draws only what the held
    /// footsteps leave open.
    pub fn draw(&mut self, n: usize, rng: &mut dyn RandomSource) -> Vec<DieColor> {
        if self.cup.len() < n {
            self.reshuffle();
        }

        if self.cup.len() < n {
            log::warn!(
                "Dice cup short: requested {}, only {} available",
                n,
                self.cup.len()
            );
        }

        let take = n.min(self.cup.len());
        let mut drawn = Vec::with_capacity(take);
        for _ in 0..take {
            let index = rng.below(self.cup.len());
            drawn.push(self.cup.remove(index));
        }
        drawn
    }

    /// Move every discarded die back into the cup.
    pub fn reshuffle(&mut self) {
        log::debug!(
            "Reshuffling {} discarded dice back into the cup",
            self.discard.len()
        );
        self.cup.append(&mut self.discard);
    }

    /// Put a resolved die on the discard pile.
    pub fn discard(&mut self, color: DieColor) {
        self.discard.push(color);
    }

    /// Return dice that were drawn but never resolved.
    pub fn return_to_cup(&mut self, dice: impl IntoIterator<Item = DieColor>) {
        self.cup.extend(dice);
    }

    /// Restore a full cup with an empty discard pile.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Count dice of a color across cup and discard.
    pub fn count_color(&self, color: DieColor) -> usize {
        self.cup
            .iter()
            .chain(self.discard.iter())
            .filter(|c| **c == color)
            .count()
    }
}
