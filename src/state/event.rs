//! Outbound events.
//!
//! Lobby operations never talk to connections directly. They return an
//! [`Outbox`] of events tagged with their audience, in the order the
//! mutations happened; the server delivers them.

use super::dice::RolledDie;
use super::player::{PlayerId, PlayerSummary};
use super::turn::{RollTally, TurnStats};
use serde::Serialize;

/// Events sent from the engine to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// To the creator only
    SessionCreated { code: String, host_id: PlayerId },

    PlayerJoined {
        code: String,
        host_id: Option<PlayerId>,
        current_player_id: Option<PlayerId>,
        players: Vec<PlayerSummary>,
    },

    /// To the spectator only
    SpectatorJoined {
        code: String,
        current_player_id: Option<PlayerId>,
        players: Vec<PlayerSummary>,
    },

    SpectatorCountUpdate { count: usize },

    GameStarted {
        host_id: Option<PlayerId>,
        turn_order: Vec<PlayerSummary>,
    },

    RollResult {
        player_id: PlayerId,
        dice: Vec<RolledDie>,
        tally: RollTally,
        stats: TurnStats,
        banked: u32,
    },

    TurnStarted {
        code: String,
        current_player_id: PlayerId,
        name: String,
        players: Vec<PlayerSummary>,
        message: Option<String>,
    },

    TurnEnded { previous_player_id: PlayerId },

    ScoreUpdate { players: Vec<PlayerSummary> },

    /// To the eliminated player only
    PlayerEliminated {
        dice: Vec<RolledDie>,
        tally: RollTally,
        message: String,
    },

    GameOver {
        winner: String,
        winner_id: PlayerId,
        host_id: Option<PlayerId>,
        players: Vec<PlayerSummary>,
    },

    GameReset {
        code: String,
        host_id: Option<PlayerId>,
        current_player_id: Option<PlayerId>,
        message: String,
    },

    PlayerLeft {
        player_id: PlayerId,
        host_id: Option<PlayerId>,
        players: Vec<PlayerSummary>,
    },

    /// To the offending sender only
    ValidationError { message: String },

    /// To the sender only
    LobbyNotFound { code: String },
}

impl Event {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionCreated { .. } => "session_created",
            Self::PlayerJoined { .. } => "player_joined",
            Self::SpectatorJoined { .. } => "spectator_joined",
            Self::SpectatorCountUpdate { .. } => "spectator_count_update",
            Self::GameStarted { .. } => "game_started",
            Self::RollResult { .. } => "roll_result",
            Self::TurnStarted { .. } => "turn_started",
            Self::TurnEnded { .. } => "turn_ended",
            Self::ScoreUpdate { .. } => "score_update",
            Self::PlayerEliminated { .. } => "player_eliminated",
            Self::GameOver { .. } => "game_over",
            Self::GameReset { .. } => "game_reset",
            Self::PlayerLeft { .. } => "player_left",
            Self::ValidationError { .. } => "validation_error",
            Self::LobbyNotFound { .. } => "lobby_not_found",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            log::error!("Failed to serialize {} event: {}", self.name(), e);
            serde_json::Value::Null
        })
    }
}

/// Who receives an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Every player and spectator in the lobby
    Room,
    /// A single connection
    Only(PlayerId),
}

/// An event and its audience.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub audience: Audience,
    pub event: Event,
}

/// Ordered events produced by one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outbox {
    dispatches: Vec<Dispatch>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event for the whole room.
    pub fn room(&mut self, event: Event) {
        self.dispatches.push(Dispatch {
            audience: Audience::Room,
            event,
        });
    }

    /// Queue an event for one connection.
    pub fn to(&mut self, player_id: PlayerId, event: Event) {
        self.dispatches.push(Dispatch {
            audience: Audience::Only(player_id),
            event,
        });
    }

    pub fn append(&mut self, other: Outbox) {
        self.dispatches.extend(other.dispatches);
    }

    pub fn is_empty(&self) -> bool {
        self.dispatches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dispatches.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dispatch> {
        self.dispatches.iter()
    }

    /// Events in order, ignoring audience.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.dispatches.iter().map(|d| &d.event)
    }

    /// Wire names in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.events().map(Event::name).collect()
    }
}

impl IntoIterator for Outbox {
    type Item = Dispatch;
    type IntoIter = std::vec::IntoIter<Dispatch>;

    fn into_iter(self) -> Self::IntoIter {
        self.dispatches.into_iter()
    }
}
