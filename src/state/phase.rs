//! Lobby phase state machine.
//!
//! # State Diagram
//!
//! ```text
//! ┌──────────┐  start   ┌──────────┐   win    ┌──────────┐
//! │ Waiting  │─────────▶│ Playing  │─────────▶│   Over   │
//! └──────────┘          └──────────┘          └────┬─────┘
//!      ▲  ▲                │    ▲                  │
//!      │  │   abandon      │    │ reset (enough)   │
//!      │  └────────────────┘    └──────────────────┤
//!      │                                           │
//!      └───────────────────────────────────────────┘
//!                    reset (short-handed)
//! ```
//!
//! `Playing` also accepts `Restart` before the first roll of a fresh match.

use serde::Serialize;
use std::fmt;

/// Where a lobby is in its game cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Gathering players; joiners get a seat
    #[default]
    Waiting,
    /// Match in progress; joiners spectate
    Playing,
    /// A player reached the win threshold
    Over,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Playing => "playing",
            Self::Over => "over",
        }
    }

    /// Rolls and turn endings are only accepted while playing.
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }

    /// New arrivals get a seat only before a match starts.
    pub fn seats_joiners(&self) -> bool {
        matches!(self, Self::Waiting)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase transition events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    Start,
    Restart,
    Win,
    Reset { enough_players: bool },
    Abandon,
}

/// Error when a phase transition is invalid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid transition from {from} via {event:?}: {reason}")]
pub struct InvalidTransition {
    pub from: Phase,
    pub event: PhaseEvent,
    pub reason: &'static str,
}

/// Validates lobby phase changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseMachine {
    phase: Phase,
}

impl PhaseMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Apply an event in place, returning error if invalid.
    pub fn apply_mut(&mut self, event: PhaseEvent) -> Result<Phase, InvalidTransition> {
        self.phase = self.transition(event)?;
        Ok(self.phase)
    }

    fn transition(&self, event: PhaseEvent) -> Result<Phase, InvalidTransition> {
        use Phase::*;
        use PhaseEvent::*;

        let invalid = |reason: &'static str| InvalidTransition {
            from: self.phase,
            event,
            reason,
        };

        match (self.phase, event) {
            (Waiting, Start) => Ok(Playing),
            (Playing, Start) => Err(invalid("Game already in progress")),
            (Over, Start) => Err(invalid("Game is being reset")),

            (Playing, Restart) => Ok(Playing),
            (_, Restart) => Err(invalid("No match to restart")),

            (Playing, Win) => Ok(Over),
            (_, Win) => Err(invalid("No match in progress")),

            (Over, Reset { enough_players }) => Ok(if enough_players { Playing } else { Waiting }),
            (_, Reset { .. }) => Err(invalid("Only a finished game can be reset")),

            (Playing, Abandon) => Ok(Waiting),
            (_, Abandon) => Err(invalid("No match in progress")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_cycle() {
        let mut machine = PhaseMachine::new();
        assert_eq!(machine.phase(), Phase::Waiting);

        machine.apply_mut(PhaseEvent::Start).unwrap();
        assert!(machine.phase().is_playing());

        machine.apply_mut(PhaseEvent::Win).unwrap();
        assert_eq!(machine.phase(), Phase::Over);

        let reset = PhaseEvent::Reset {
            enough_players: true,
        };
        machine.apply_mut(reset).unwrap();
        assert_eq!(machine.phase(), Phase::Playing);
    }

    #[test]
    fn test_short_handed_reset_waits() {
        let mut machine = PhaseMachine::new();
        machine.apply_mut(PhaseEvent::Start).unwrap();
        machine.apply_mut(PhaseEvent::Win).unwrap();
        let reset = PhaseEvent::Reset {
            enough_players: false,
        };
        machine.apply_mut(reset).unwrap();
        assert_eq!(machine.phase(), Phase::Waiting);
        assert!(machine.phase().seats_joiners());
    }

    #[test]
    fn test_invalid_transitions() {
        let mut machine = PhaseMachine::new();
        assert!(machine.apply_mut(PhaseEvent::Win).is_err());
        assert!(machine.apply_mut(PhaseEvent::Restart).is_err());
        assert!(machine.apply_mut(PhaseEvent::Abandon).is_err());

        machine.apply_mut(PhaseEvent::Start).unwrap();
        let err = machine.apply_mut(PhaseEvent::Start).unwrap_err();
        assert_eq!(err.reason, "Game already in progress");
        // Failed transitions leave the phase alone
        assert_eq!(machine.phase(), Phase::Playing);
    }

    #[test]
    fn test_display() {
        let err = InvalidTransition {
            from: Phase::Waiting,
            event: PhaseEvent::Win,
            reason: "No match in progress",
        };
        assert_eq!(
            err.to_string(),
            "Invalid transition from waiting via Win: No match in progress"
        );
    }
}
