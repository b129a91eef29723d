//! Lobby registry.
//!
//! Owns every live lobby, keyed by its uppercase code, plus an index from
//! player ID to the lobby that player is in. All access to a lobby goes
//! through here.

use super::dice::SeededSource;
use super::event::{Event, Outbox};
use super::lobby::{JoinRole, Lobby, LobbyError};
use super::player::PlayerId;
use crate::config::GameConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// Characters used in generated lobby codes.
pub const CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Registry errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Lobby {0} not found")]
    NotFound(String),
    #[error("Already in lobby {0}")]
    AlreadyInSession(String),
    #[error("No free lobby code after {0} attempts")]
    CodeSpaceExhausted(usize),
    #[error(transparent)]
    Lobby(#[from] LobbyError),
}

impl RegistryError {
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::Lobby(e) if e.is_silent())
    }
}

/// What a departure produced.
#[derive(Debug, Clone)]
pub struct Departure {
    pub code: String,
    pub outbox: Outbox,
    /// Members still owed room events (everyone left behind)
    pub room: Vec<PlayerId>,
    /// Lobby was emptied and dropped
    pub removed: bool,
}

/// Session registry - tracks all active lobbies.
#[derive(Debug)]
pub struct SessionRegistry {
    /// Lobbies by uppercase code
    lobbies: HashMap<String, Lobby>,

    /// Player ID to lobby code mapping
    player_index: HashMap<PlayerId, String>,

    config: GameConfig,

    /// Drives code generation and seeds each lobby's dice
    rng: StdRng,
}

impl SessionRegistry {
    pub fn new(config: GameConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Fully deterministic registry: codes and every lobby's dice.
    pub fn with_seed(config: GameConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: GameConfig, rng: StdRng) -> Self {
        Self {
            lobbies: HashMap::new(),
            player_index: HashMap::new(),
            config,
            rng,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Count lobbies.
    pub fn count(&self) -> usize {
        self.lobbies.len()
    }

    pub fn codes(&self) -> impl Iterator<Item = &String> {
        self.lobbies.keys()
    }

    /// Get lobby by code (case-insensitive).
    pub fn get(&self, code: &str) -> Option<&Lobby> {
        self.lobbies.get(&code.to_uppercase())
    }

    /// Get mutable lobby by code (case-insensitive).
    pub fn get_mut(&mut self, code: &str) -> Option<&mut Lobby> {
        self.lobbies.get_mut(&code.to_uppercase())
    }

    /// Code of the lobby a player or spectator is in.
    pub fn code_for(&self, player_id: PlayerId) -> Option<&str> {
        self.player_index.get(&player_id).map(String::as_str)
    }

    /// Get lobby for a player.
    pub fn get_for_player(&self, player_id: PlayerId) -> Option<&Lobby> {
        self.player_index
            .get(&player_id)
            .and_then(|code| self.lobbies.get(code))
    }

    /// Room members of a lobby; empty if it does not exist.
    pub fn room(&self, code: &str) -> Vec<PlayerId> {
        self.get(code)
            .map(|lobby| lobby.member_ids().collect())
            .unwrap_or_default()
    }

    /// Open a new lobby with `host_id` as its only player and host.
    ///
    /// # Errors
    ///
    /// Returns error if the host is already in a lobby or no unused code
    /// could be found.
    pub fn create_session(
        &mut self,
        host_id: PlayerId,
        host_name: &str,
    ) -> Result<(String, Outbox), RegistryError> {
        if let Some(code) = self.player_index.get(&host_id) {
            return Err(RegistryError::AlreadyInSession(code.clone()));
        }

        let code = self.generate_code()?;
        let seed: u64 = self.rng.random();
        let mut lobby = Lobby::new(
            code.clone(),
            self.config.clone(),
            Box::new(SeededSource::seeded(seed)),
        );
        let (_, joined) = lobby.join(host_id, host_name)?;

        let mut outbox = Outbox::new();
        outbox.to(
            host_id,
            Event::SessionCreated {
                code: code.clone(),
                host_id,
            },
        );
        outbox.append(joined);

        self.lobbies.insert(code.clone(), lobby);
        self.player_index.insert(host_id, code.clone());

        log::info!("Lobby {} created by {}", code, host_id);
        Ok((code, outbox))
    }

    /// Join an existing lobby as player or spectator.
    pub fn join(
        &mut self,
        code: &str,
        player_id: PlayerId,
        name: &str,
    ) -> Result<(JoinRole, Outbox), RegistryError> {
        if let Some(current) = self.player_index.get(&player_id) {
            return Err(RegistryError::AlreadyInSession(current.clone()));
        }

        let lobby = self.lobby_mut(code)?;
        let joined = lobby.join(player_id, name)?;
        let code = lobby.code().to_string();

        self.player_index.insert(player_id, code);
        Ok(joined)
    }

    pub fn start(&mut self, code: &str, player_id: PlayerId) -> Result<Outbox, RegistryError> {
        Ok(self.lobby_mut(code)?.start_game(player_id)?)
    }

    pub fn roll(&mut self, code: &str, player_id: PlayerId) -> Result<Outbox, RegistryError> {
        Ok(self.lobby_mut(code)?.roll(player_id)?)
    }

    pub fn end_turn(
        &mut self,
        code: &str,
        player_id: PlayerId,
        save_brains: bool,
    ) -> Result<Outbox, RegistryError> {
        Ok(self.lobby_mut(code)?.end_turn(player_id, save_brains)?)
    }

    /// Remove a player or spectator from their lobby, dropping the lobby
    /// once no players remain.
    pub fn leave(&mut self, player_id: PlayerId) -> Option<Departure> {
        let code = self.player_index.remove(&player_id)?;
        let Some(lobby) = self.lobbies.get_mut(&code) else {
            log::warn!("Player {} indexed to missing lobby {}", player_id, code);
            return None;
        };

        let outbox = lobby.leave(player_id);
        let room: Vec<PlayerId> = lobby.member_ids().collect();
        let removed = lobby.is_empty();
        if removed {
            self.remove(&code);
        }

        Some(Departure {
            code,
            outbox,
            room,
            removed,
        })
    }

    /// Remove a lobby entirely.
    pub fn remove(&mut self, code: &str) -> Option<Lobby> {
        let lobby = self.lobbies.remove(&code.to_uppercase())?;

        // Clean up indexes
        for member in lobby.member_ids() {
            self.player_index.remove(&member);
        }

        log::info!("Lobby {} removed", lobby.code());
        Some(lobby)
    }

    fn lobby_mut(&mut self, code: &str) -> Result<&mut Lobby, RegistryError> {
        let key = code.to_uppercase();
        self.lobbies
            .get_mut(&key)
            .ok_or(RegistryError::NotFound(key))
    }

    fn generate_code(&mut self) -> Result<String, RegistryError> {
        let attempts = self.config.max_code_attempts;
        for _ in 0..attempts {
            let code: String = (0..self.config.code_length)
                .map(|_| CODE_ALPHABET[self.rng.random_range(0..CODE_ALPHABET.len())] as char)
                .collect();
            if !self.lobbies.contains_key(&code) {
                return Ok(code);
            }
            log::debug!("Lobby code collision on {}", code);
        }

        log::error!(
            "Could not allocate a lobby code after {} attempts ({} lobbies live)",
            attempts,
            self.lobbies.len()
        );
        Err(RegistryError::CodeSpaceExhausted(attempts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::phase::Phase;
    use pretty_assertions::assert_eq;

    fn registry() -> SessionRegistry {
        SessionRegistry::with_seed(GameConfig::default(), 7)
    }

    #[test]
    fn test_create_session() {
        let mut registry = registry();
        let (code, outbox) = registry.create_session(1, "Alice").unwrap();

        assert_eq!(code.len(), 5);
        assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        assert_eq!(outbox.names(), vec!["session_created", "player_joined"]);

        let lobby = registry.get(&code).unwrap();
        assert_eq!(lobby.phase(), Phase::Waiting);
        assert!(lobby.is_host(1));
        assert_eq!(registry.code_for(1), Some(code.as_str()));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut registry = registry();
        let (code, _) = registry.create_session(1, "Alice").unwrap();
        let lower = code.to_lowercase();

        assert!(registry.get(&lower).is_some());
        let (role, _) = registry.join(&lower, 2, "Bob").unwrap();
        assert_eq!(role, JoinRole::Player);
        assert_eq!(registry.code_for(2), Some(code.as_str()));
    }

    #[test]
    fn test_join_missing_lobby() {
        let mut registry = registry();
        assert_eq!(
            registry.join("zzzzz", 1, "Alice").unwrap_err(),
            RegistryError::NotFound("ZZZZZ".to_string())
        );
        assert_eq!(registry.code_for(1), None);
    }

    #[test]
    fn test_one_lobby_per_player() {
        let mut registry = registry();
        let (code, _) = registry.create_session(1, "Alice").unwrap();
        assert_eq!(
            registry.create_session(1, "Alice").unwrap_err(),
            RegistryError::AlreadyInSession(code.clone())
        );
        assert_eq!(
            registry.join(&code, 1, "Alice").unwrap_err(),
            RegistryError::AlreadyInSession(code)
        );
    }

    #[test]
    fn test_lobby_errors_pass_through() {
        let mut registry = registry();
        let (code, _) = registry.create_session(1, "Alice").unwrap();

        let err = registry.start(&code, 1).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Lobby(LobbyError::NotEnoughPlayers { .. })
        ));
        assert!(!err.is_silent());

        let err = registry.roll(&code, 1).unwrap_err();
        assert!(err.is_silent());
    }

    #[test]
    fn test_leave_hands_off_host() {
        let mut registry = registry();
        let (code, _) = registry.create_session(1, "Alice").unwrap();
        registry.join(&code, 2, "Bob").unwrap();

        let departure = registry.leave(1).unwrap();
        assert!(!departure.removed);
        assert_eq!(departure.room, vec![2]);
        assert_eq!(registry.get(&code).unwrap().host_id(), Some(2));
        assert_eq!(registry.code_for(1), None);
    }

    #[test]
    fn test_lookup_by_player() {
        let mut registry = registry();
        let (first, _) = registry.create_session(1, "Alice").unwrap();
        let (second, _) = registry.create_session(2, "Bob").unwrap();
        registry.join(&first, 3, "Carol").unwrap();

        let mut codes: Vec<&String> = registry.codes().collect();
        codes.sort();
        let mut expected = vec![&first, &second];
        expected.sort();
        assert_eq!(codes, expected);

        let lobby = registry.get_for_player(3).unwrap();
        assert_eq!(lobby.code(), first);
        assert!(lobby.has_player(3));
        assert_eq!(registry.get_for_player(2).unwrap().code(), second);
        assert!(registry.get_for_player(4).is_none());

        registry.leave(3).unwrap();
        assert!(registry.get_for_player(3).is_none());
    }

    #[test]
    fn test_last_player_out_removes_lobby() {
        let mut registry = registry();
        let (code, _) = registry.create_session(1, "Alice").unwrap();
        registry.join(&code, 2, "Bob").unwrap();
        registry.start(&code, 1).unwrap();
        registry.join(&code, 3, "Watcher").unwrap();

        registry.leave(1).unwrap();
        let departure = registry.leave(2).unwrap();

        // The spectator was seated when the match was abandoned
        assert!(!departure.removed);
        assert_eq!(departure.room, vec![3]);

        let departure = registry.leave(3).unwrap();
        assert!(departure.removed);
        assert!(departure.room.is_empty());
        assert!(registry.get(&code).is_none());
        assert_eq!(registry.count(), 0);
        assert!(registry.leave(3).is_none());
    }

    #[test]
    fn test_remove_clears_index() {
        let mut registry = registry();
        let (code, _) = registry.create_session(1, "Alice").unwrap();
        registry.join(&code, 2, "Bob").unwrap();

        let lobby = registry.remove(&code).unwrap();
        assert_eq!(lobby.player_count(), 2);
        assert_eq!(registry.code_for(1), None);
        assert_eq!(registry.code_for(2), None);
    }

    #[test]
    fn test_seeded_registries_agree() {
        let mut a = registry();
        let mut b = registry();
        let codes_a: Vec<String> = (0..5)
            .map(|id| a.create_session(id, "P").unwrap().0)
            .collect();
        let codes_b: Vec<String> = (0..5)
            .map(|id| b.create_session(id, "P").unwrap().0)
            .collect();
        assert_eq!(codes_a, codes_b);
    }

    #[test]
    fn test_code_space_exhausted() {
        let config = GameConfig {
            code_length: 1,
            max_code_attempts: 2000,
            ..GameConfig::default()
        };
        let mut registry = SessionRegistry::with_seed(config, 3);

        for id in 0..CODE_ALPHABET.len() as u64 {
            registry.create_session(id, "P").unwrap();
        }
        assert_eq!(
            registry.create_session(999, "P").unwrap_err(),
            RegistryError::CodeSpaceExhausted(2000)
        );
        assert_eq!(registry.code_for(999), None);
    }
}
