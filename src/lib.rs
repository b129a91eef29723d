//! Brain Dice State Library
//!
//! This crate provides the authoritative session engine for Brain Dice, a
//! push-your-luck dice game for two or more players.
//!
//! # Overview
//!
//! - **Dice Cup** - Thirteen colored dice drawn without replacement, with
//!   the discard pile poured back in when the cup runs short.
//!
//! - **Turn Engine** - Rolls three dice at a time. Footsteps are held and
//!   rolled again; three shotguns end the turn with nothing banked.
//!
//! - **Lobbies** - Membership, spectators, host hand-off, turn rotation,
//!   banking, win detection, and reset into the next match.
//!
//! - **Server** - A tokio task that owns every lobby and connection and
//!   handles one request at a time.
//!
//! # Design Principles
//!
//! 1. **State machines validate transitions** - Invalid phase changes are
//!    rejected with clear errors.
//!
//! 2. **Operations return their events** - Lobbies never touch connections;
//!    each call yields an ordered [`Outbox`].
//!
//! 3. **No transport** - Delivery stops at a channel per connection.
//!
//! 4. **Deterministic when asked** - All randomness flows through
//!    [`RandomSource`], so a seed or script replays a game exactly.
//!
//! # Example
//!
//! ```rust
//! use braindice_state::{GameConfig, JoinRole, Phase, SessionRegistry};
//!
//! let mut registry = SessionRegistry::with_seed(GameConfig::default(), 42);
//!
//! let (code, _events) = registry.create_session(1, "Alice").unwrap();
//! let (role, _events) = registry.join(&code, 2, "Bob").unwrap();
//! assert_eq!(role, JoinRole::Player);
//!
//! registry.start(&code, 1).unwrap();
//!
//! let lobby = registry.get(&code).unwrap();
//! assert_eq!(lobby.phase(), Phase::Playing);
//! assert_eq!(lobby.current_player_id(), Some(1));
//! ```

pub mod config;
pub mod server;
pub mod state;

pub use config::{ConfigError, GameConfig};
pub use server::{GameServer, ServerError, ServerHandle};

// Re-export everything from state module at crate root
pub use state::*;
