//! Players, spectators, and display names.
//!
//! Every ledger a player needs (banked brains, per-turn counters) lives on
//! the [`Player`] itself, so joining a lobby initializes all of it at once.

use super::turn::TurnStats;
use serde::Serialize;

/// Opaque per-connection identifier, assigned when the connection opens.
pub type PlayerId = u64;

/// Fallback when a name sanitizes to nothing.
pub const DEFAULT_NAME: &str = "Player";

/// A seated player.
#[derive(Debug, Clone)]
pub struct Player {
    /// Connection ID
    pub id: PlayerId,

    /// Sanitized, lobby-unique display name
    pub name: String,

    /// Brains banked across turns
    pub banked: u32,

    /// Counters for the turn in progress
    pub turn: TurnStats,

    /// When player joined the lobby
    pub joined_at: chrono::DateTime<chrono::Utc>,
}

impl Player {
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            banked: 0,
            turn: TurnStats::default(),
            joined_at: chrono::Utc::now(),
        }
    }

    /// Zero banked score and turn counters for a fresh match.
    pub fn reset_ledger(&mut self) {
        self.banked = 0;
        self.turn.clear();
    }

    pub fn summary(&self) -> PlayerSummary {
        PlayerSummary {
            id: self.id,
            name: self.name.clone(),
            brains: self.banked,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "name": self.name,
            "brains": self.banked,
            "turn": self.turn
        })
    }
}

/// A watcher waiting for the next match.
#[derive(Debug, Clone)]
pub struct Spectator {
    pub id: PlayerId,
    pub name: String,
    pub joined_at: chrono::DateTime<chrono::Utc>,
}

impl Spectator {
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            joined_at: chrono::Utc::now(),
        }
    }

    /// Take a seat with a zeroed ledger.
    pub fn into_player(self) -> Player {
        Player {
            joined_at: self.joined_at,
            ..Player::new(self.id, self.name)
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "name": self.name
        })
    }
}

/// Roster entry sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerSummary {
    pub id: PlayerId,
    pub name: String,
    pub brains: u32,
}

/// Clean a requested display name.
///
/// Keeps letters, digits, spaces, `-` and `_`, collapses runs of whitespace,
/// and truncates to `max_len` characters.
pub fn sanitize_name(raw: &str, max_len: usize) -> String {
    let filtered: String = raw
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();

    let collapsed = filtered.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = collapsed.chars().take(max_len).collect();
    let trimmed = truncated.trim_end();

    if trimmed.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Make `name` unique by appending " 2", " 3", ... up to `max_suffix`.
///
/// `taken` reports whether a candidate is already used (callers compare
/// case-insensitively). Returns `None` when every suffix is taken.
pub fn dedupe_name(name: &str, max_suffix: u32, taken: impl Fn(&str) -> bool) -> Option<String> {
    if !taken(name) {
        return Some(name.to_string());
    }

    (2..=max_suffix)
        .map(|n| format!("{} {}", name, n))
        .find(|candidate| !taken(candidate))
}
