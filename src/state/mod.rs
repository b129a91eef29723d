//! Game state for Brain Dice.
//!
//! This module provides the core state types and managers:
//!
//! - `dice` - The dice cup, die colors and faces, the random source seam
//! - `turn` - Roll resolution and per-turn counters
//! - `player` - Players, spectators, display names
//! - `phase` - Lobby phase state machine (waiting, playing, over)
//! - `event` - Outbound events and their audiences
//! - `lobby` - One game session end to end
//! - `registry` - All live lobbies, by code and by player
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        SessionRegistry                            │
//! │                                                                   │
//! │   code → Lobby                 player_id → code                   │
//! │                                                                   │
//! │  ┌─────────────────────────────────────────────────────────────┐ │
//! │  │                          Lobby                               │ │
//! │  │                                                              │ │
//! │  │  PhaseMachine   Waiting ──▶ Playing ──▶ Over ──▶ Playing     │ │
//! │  │                                                              │ │
//! │  │  players + ledgers    spectators    turn_order / index       │ │
//! │  │                                                              │ │
//! │  │  DiceCup (cup, discard) ◀──▶ Hand (held footsteps)           │ │
//! │  │                                                              │ │
//! │  │  every operation ──▶ Outbox [(Audience, Event), ...]         │ │
//! │  └─────────────────────────────────────────────────────────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use braindice_state::state::{
//!     dice::ScriptedSource,
//!     lobby::Lobby,
//! };
//!
//! let rng = Box::new(ScriptedSource::new([]));
//! let mut lobby = Lobby::new("ABCDE".into(), GameConfig::default(), rng);
//! lobby.join(1, "Alice")?;
//! lobby.join(2, "Bob")?;
//! let events = lobby.start_game(1)?;
//! ```

pub mod dice;
pub mod event;
pub mod lobby;
pub mod phase;
pub mod player;
pub mod registry;
pub mod turn;

// Re-export commonly used types
pub use dice::{
    DiceCup, DieColor, Face, RandomSource, RolledDie, ScriptedSource, SeededSource, FACES,
    TOTAL_DICE,
};
pub use event::{Audience, Dispatch, Event, Outbox};
pub use lobby::{JoinRole, Lobby, LobbyError, LobbySnapshot};
pub use phase::{InvalidTransition, Phase, PhaseEvent, PhaseMachine};
pub use player::{Player, PlayerId, PlayerSummary, Spectator};
pub use registry::{Departure, RegistryError, SessionRegistry};
pub use turn::{Hand, RollResult, RollTally, TurnStats};
