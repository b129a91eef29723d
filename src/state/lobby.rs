//! Lobby (game session) state.
//!
//! A lobby owns one game end to end: roster, spectators, turn order, dice
//! cup, and every player's ledger. Each operation runs to completion and
//! returns the events it produced, in order, as an [`Outbox`].

use super::dice::{DiceCup, DieColor, RandomSource, TOTAL_DICE};
use super::event::{Event, Outbox};
use super::phase::{InvalidTransition, Phase, PhaseEvent, PhaseMachine};
use super::player::{dedupe_name, sanitize_name, Player, PlayerId, PlayerSummary, Spectator};
use super::turn::{Hand, TurnStats};
use crate::config::GameConfig;
use serde::Serialize;

/// How a joiner entered the lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinRole {
    Player,
    Spectator,
}

/// Lobby errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    #[error("Lobby is full")]
    Full,
    #[error("Already a member of this lobby")]
    AlreadyMember,
    #[error("Not a member of this lobby")]
    NotMember,
    #[error("Only the host can start the game")]
    NotHost,
    #[error("It's not your turn")]
    NotYourTurn,
    #[error("No game in progress")]
    NotPlaying,
    #[error("Not enough players to start the game (need {required}, have {present})")]
    NotEnoughPlayers { required: usize, present: usize },
    #[error("Name already taken")]
    NameRejected,
    #[error(transparent)]
    Phase(#[from] InvalidTransition),
}

impl LobbyError {
    /// Stale or out-of-turn requests are dropped without telling anyone.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::NotYourTurn | Self::NotPlaying)
    }
}

/// Read-only view of a lobby for observers and diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LobbySnapshot {
    pub code: String,
    pub phase: Phase,
    pub host_id: Option<PlayerId>,
    pub current_player_id: Option<PlayerId>,
    pub players: Vec<PlayerSummary>,
    pub spectators: Vec<String>,
    pub turn_order: Vec<PlayerId>,
    pub current_turn: Option<TurnStats>,
    pub held: Vec<DieColor>,
    pub cup_remaining: usize,
    pub discarded: usize,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Lobby state.
#[derive(Debug)]
pub struct Lobby {
    /// Shareable code, always uppercase
    code: String,

    /// Seated players in roster order
    players: Vec<Player>,

    /// Watchers, seated at the next reset
    spectators: Vec<Spectator>,

    /// Rotation fixed at game start
    turn_order: Vec<PlayerId>,

    /// Index into `turn_order`, valid while playing
    current_index: usize,

    /// Current host player ID
    host_id: Option<PlayerId>,

    phase: PhaseMachine,

    cup: DiceCup,

    /// Footsteps held by the active player
    hand: Hand,

    /// Set at start/reset, cleared by the first roll or turn end
    fresh_match: bool,

    config: GameConfig,

    rng: Box<dyn RandomSource>,

    /// When lobby was created
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Lobby {
    /// Create an empty lobby. The first player to join becomes host.
    pub fn new(code: String, config: GameConfig, rng: Box<dyn RandomSource>) -> Self {
        Self {
            code: code.to_uppercase(),
            players: Vec::new(),
            spectators: Vec::new(),
            turn_order: Vec::new(),
            current_index: 0,
            host_id: None,
            phase: PhaseMachine::new(),
            cup: DiceCup::new(),
            hand: Hand::new(),
            fresh_match: false,
            config,
            rng,
            created_at: chrono::Utc::now(),
        }
    }

    /// Swap the random source, e.g. to replay a scripted sequence.
    pub fn set_random_source(&mut self, rng: Box<dyn RandomSource>) {
        self.rng = rng;
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn phase(&self) -> Phase {
        self.phase.phase()
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn host_id(&self) -> Option<PlayerId> {
        self.host_id
    }

    pub fn is_host(&self, player_id: PlayerId) -> bool {
        self.host_id == Some(player_id)
    }

    /// Players in roster order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn spectators(&self) -> &[Spectator] {
        &self.spectators
    }

    pub fn turn_order(&self) -> &[PlayerId] {
        &self.turn_order
    }

    pub fn get_player(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn has_player(&self, player_id: PlayerId) -> bool {
        self.get_player(player_id).is_some()
    }

    pub fn has_spectator(&self, player_id: PlayerId) -> bool {
        self.spectators.iter().any(|s| s.id == player_id)
    }

    pub fn is_member(&self, player_id: PlayerId) -> bool {
        self.has_player(player_id) || self.has_spectator(player_id)
    }

    /// Everyone who receives room events: players, then spectators.
    pub fn member_ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.players
            .iter()
            .map(|p| p.id)
            .chain(self.spectators.iter().map(|s| s.id))
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn spectator_count(&self) -> usize {
        self.spectators.len()
    }

    /// A lobby with no players is scheduled for removal.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Whose turn it is. `None` unless a match is in progress.
    pub fn current_player_id(&self) -> Option<PlayerId> {
        if !self.phase().is_playing() {
            return None;
        }
        self.turn_order.get(self.current_index).copied()
    }

    pub fn current_player(&self) -> Option<&Player> {
        self.current_player_id()
            .and_then(|id| self.get_player(id))
    }

    pub fn cup(&self) -> &DiceCup {
        &self.cup
    }

    pub fn hand(&self) -> &Hand {
        &self.hand
    }

    /// Dice across cup, discard, and the active player's hand.
    pub fn dice_in_play(&self) -> usize {
        self.cup.total() + self.hand.len()
    }

    /// Every die is in the cup, the discard pile, or the active hand.
    pub fn dice_conserved(&self) -> bool {
        self.dice_in_play() == TOTAL_DICE
    }

    /// Roster with banked brains, in roster order.
    pub fn summaries(&self) -> Vec<PlayerSummary> {
        self.players.iter().map(Player::summary).collect()
    }

    /// Add a player (before a match) or spectator (during one).
    pub fn join(
        &mut self,
        player_id: PlayerId,
        requested_name: &str,
    ) -> Result<(JoinRole, Outbox), LobbyError> {
        if self.is_member(player_id) {
            return Err(LobbyError::AlreadyMember);
        }

        let seats = self.phase().seats_joiners();
        if seats && self.players.len() >= self.config.max_players {
            return Err(LobbyError::Full);
        }

        let cleaned = sanitize_name(requested_name, self.config.max_name_len);
        let name = dedupe_name(&cleaned, self.config.max_name_suffix, |candidate| {
            self.name_taken(candidate)
        })
        .ok_or(LobbyError::NameRejected)?;

        let mut outbox = Outbox::new();

        if seats {
            self.players.push(Player::new(player_id, name.clone()));
            self.turn_order.push(player_id);

            // First player becomes host
            if self.host_id.is_none() {
                self.host_id = Some(player_id);
            }

            log::info!(
                "Player {} ({}) joined lobby {}",
                player_id,
                name,
                self.code
            );

            outbox.room(Event::PlayerJoined {
                code: self.code.clone(),
                host_id: self.host_id,
                current_player_id: self.current_player_id(),
                players: self.summaries(),
            });
            Ok((JoinRole::Player, outbox))
        } else {
            self.spectators.push(Spectator::new(player_id, name.clone()));

            log::info!(
                "Spectator {} ({}) joined lobby {}",
                player_id,
                name,
                self.code
            );

            outbox.to(
                player_id,
                Event::SpectatorJoined {
                    code: self.code.clone(),
                    current_player_id: self.current_player_id(),
                    players: self.summaries(),
                },
            );
            outbox.room(Event::SpectatorCountUpdate {
                count: self.spectators.len(),
            });
            Ok((JoinRole::Spectator, outbox))
        }
    }

    /// Remove a player or spectator.
    ///
    /// The leaver's unfinished turn is forfeited and the turn passes on. The
    /// host role moves to the first remaining player.
    pub fn leave(&mut self, player_id: PlayerId) -> Outbox {
        let mut outbox = Outbox::new();

        if let Some(pos) = self.spectators.iter().position(|s| s.id == player_id) {
            let spectator = self.spectators.remove(pos);
            log::info!(
                "Spectator {} ({}) left lobby {}",
                player_id,
                spectator.name,
                self.code
            );
            outbox.room(Event::SpectatorCountUpdate {
                count: self.spectators.len(),
            });
            return outbox;
        }

        let Some(pos) = self.players.iter().position(|p| p.id == player_id) else {
            log::debug!("Leave from non-member {} in lobby {}", player_id, self.code);
            return outbox;
        };

        let playing = self.phase().is_playing();
        let was_current = self.current_player_id() == Some(player_id);
        if was_current {
            self.hand.release(&mut self.cup);
        }

        let leaver = self.players.remove(pos);
        if let Some(slot) = self.turn_order.iter().position(|id| *id == player_id) {
            self.turn_order.remove(slot);
            if playing && slot < self.current_index {
                self.current_index -= 1;
            }
        }

        if self.host_id == Some(player_id) {
            self.host_id = self.players.first().map(|p| p.id);
            if let Some(host) = self.host_id {
                log::info!("Host of lobby {} passed to {}", self.code, host);
            }
        }

        log::info!(
            "Player {} ({}) left lobby {}",
            player_id,
            leaver.name,
            self.code
        );

        outbox.room(Event::PlayerLeft {
            player_id,
            host_id: self.host_id,
            players: self.summaries(),
        });

        if self.players.is_empty() || !playing {
            if self.turn_order.is_empty() {
                self.current_index = 0;
            }
            return outbox;
        }

        if self.turn_order.len() < self.config.min_players_to_start {
            outbox.append(self.abandon_match());
            return outbox;
        }

        if was_current {
            self.current_index %= self.turn_order.len();
            let message = format!("{} left the game.", leaver.name);
            if let Some(event) = self.turn_started(Some(message)) {
                outbox.room(event);
            }
        }

        outbox
    }

    /// Start a match. Host only; needs enough players.
    ///
    /// Also accepted right after a reset, before anyone has rolled, which
    /// restarts the fresh match.
    pub fn start_game(&mut self, requested_by: PlayerId) -> Result<Outbox, LobbyError> {
        if !self.has_player(requested_by) {
            return Err(LobbyError::NotMember);
        }
        if !self.is_host(requested_by) {
            return Err(LobbyError::NotHost);
        }

        let event = if self.phase().is_playing() && self.fresh_match {
            PhaseEvent::Restart
        } else {
            PhaseEvent::Start
        };

        if self.players.len() < self.config.min_players_to_start {
            return Err(LobbyError::NotEnoughPlayers {
                required: self.config.min_players_to_start,
                present: self.players.len(),
            });
        }

        self.phase.apply_mut(event)?;

        self.hand.release(&mut self.cup);
        self.cup.reset();
        for player in &mut self.players {
            player.reset_ledger();
        }
        self.turn_order = self.players.iter().map(|p| p.id).collect();
        self.current_index = 0;
        self.fresh_match = true;

        log::info!(
            "Game started in lobby {} with {} players",
            self.code,
            self.turn_order.len()
        );

        let mut outbox = Outbox::new();
        outbox.room(Event::GameStarted {
            host_id: self.host_id,
            turn_order: self.summaries(),
        });
        if let Some(event) = self.turn_started(None) {
            outbox.room(event);
        }
        Ok(outbox)
    }

    /// Roll for the active player.
    ///
    /// Three shotguns end the turn with nothing banked; reaching the win
    /// threshold ends it with banking, which finishes the game.
    pub fn roll(&mut self, player_id: PlayerId) -> Result<Outbox, LobbyError> {
        let idx = self.ensure_turn(player_id)?;
        self.fresh_match = false;

        let result = self.hand.roll(
            &mut self.cup,
            &mut self.players[idx].turn,
            self.config.dice_per_roll,
            self.rng.as_mut(),
        );

        let player = &self.players[idx];
        let stats = player.turn;
        let banked = player.banked;

        let rolled: Vec<String> = result.dice.iter().map(|d| d.to_string()).collect();
        log::debug!(
            "Lobby {}: player {} rolled [{}] -> {:?}",
            self.code,
            player_id,
            rolled.join(", "),
            stats
        );

        let mut outbox = Outbox::new();
        outbox.room(Event::RollResult {
            player_id,
            dice: result.dice.clone(),
            tally: result.tally,
            stats,
            banked,
        });

        if stats.is_eliminated(self.config.hazards_to_eliminate) {
            outbox.to(
                player_id,
                Event::PlayerEliminated {
                    dice: result.dice,
                    tally: result.tally,
                    message: format!(
                        "You got {} shotguns! You lose this round!",
                        stats.shotguns
                    ),
                },
            );
            outbox.append(self.finish_turn(idx, false));
        } else if banked + stats.brains >= self.config.win_threshold {
            outbox.append(self.finish_turn(idx, true));
        }

        Ok(outbox)
    }

    /// End the active player's turn, banking brains when `save_brains` is set.
    pub fn end_turn(
        &mut self,
        player_id: PlayerId,
        save_brains: bool,
    ) -> Result<Outbox, LobbyError> {
        let idx = self.ensure_turn(player_id)?;
        self.fresh_match = false;
        Ok(self.finish_turn(idx, save_brains))
    }

    /// Seat spectators, zero every ledger, and begin a fresh match.
    ///
    /// Only valid once a game is over. Falls back to waiting when the merged
    /// roster is too small to play.
    pub fn reset_for_new_game(&mut self) -> Result<Outbox, LobbyError> {
        let enough_players = self.players.len() + self.spectators.len()
            >= self.config.min_players_to_start;
        self.phase.apply_mut(PhaseEvent::Reset { enough_players })?;

        let promoted = self.spectators.len();
        self.seat_spectators();
        self.hand.release(&mut self.cup);
        self.cup.reset();
        for player in &mut self.players {
            player.reset_ledger();
        }
        self.turn_order = self.players.iter().map(|p| p.id).collect();
        self.current_index = 0;
        self.fresh_match = true;

        log::info!(
            "Lobby {} reset for a new game ({} players, {} promoted)",
            self.code,
            self.players.len(),
            promoted
        );

        let message = match self.current_player() {
            Some(first) => format!("New game! {} goes first.", first.name),
            None => "Game over! Waiting for more players...".to_string(),
        };

        let mut outbox = Outbox::new();
        outbox.room(Event::GameReset {
            code: self.code.clone(),
            host_id: self.host_id,
            current_player_id: self.current_player_id(),
            message,
        });
        if promoted > 0 {
            outbox.room(Event::SpectatorCountUpdate { count: 0 });
        }
        if let Some(event) = self.turn_started(None) {
            outbox.room(event);
        }
        Ok(outbox)
    }

    /// Serializable view of the whole lobby.
    pub fn snapshot(&self) -> LobbySnapshot {
        LobbySnapshot {
            code: self.code.clone(),
            phase: self.phase(),
            host_id: self.host_id,
            current_player_id: self.current_player_id(),
            players: self.summaries(),
            spectators: self.spectators.iter().map(|s| s.name.clone()).collect(),
            turn_order: self.turn_order.clone(),
            current_turn: self.current_player().map(|p| p.turn),
            held: self.hand.held().to_vec(),
            cup_remaining: self.cup.available(),
            discarded: self.cup.discarded().len(),
            created_at: self.created_at,
        }
    }

    /// Convert to JSON for sending to clients.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot()).unwrap_or_else(|e| {
            log::error!("Failed to serialize lobby {}: {}", self.code, e);
            serde_json::Value::Null
        })
    }

    fn name_taken(&self, candidate: &str) -> bool {
        self.players
            .iter()
            .map(|p| p.name.as_str())
            .chain(self.spectators.iter().map(|s| s.name.as_str()))
            .any(|name| name.eq_ignore_ascii_case(candidate))
    }

    /// Check that `player_id` may act now; returns their roster index.
    fn ensure_turn(&self, player_id: PlayerId) -> Result<usize, LobbyError> {
        if !self.phase().is_playing() {
            return Err(LobbyError::NotPlaying);
        }
        if self.current_player_id() != Some(player_id) {
            return Err(LobbyError::NotYourTurn);
        }
        self.players
            .iter()
            .position(|p| p.id == player_id)
            .ok_or(LobbyError::NotMember)
    }

    fn finish_turn(&mut self, idx: usize, save_brains: bool) -> Outbox {
        let mut outbox = Outbox::new();
        self.hand.release(&mut self.cup);

        let player = &mut self.players[idx];
        let player_id = player.id;
        let name = player.name.clone();
        let brains = player.turn.brains;
        player.turn.clear();

        let message = if save_brains {
            player.banked += brains;
            let banked = player.banked;
            log::debug!(
                "Lobby {}: player {} banked {} (total {})",
                self.code,
                player_id,
                brains,
                banked
            );

            if banked >= self.config.win_threshold {
                return self.declare_winner(idx);
            }

            outbox.room(Event::ScoreUpdate {
                players: self.summaries(),
            });
            format!("{} saved {} brains!", name, brains)
        } else {
            log::debug!(
                "Lobby {}: player {} lost {} brains",
                self.code,
                player_id,
                brains
            );
            format!("{} lost all brains!", name)
        };

        outbox.room(Event::TurnEnded {
            previous_player_id: player_id,
        });

        self.advance_turn();
        if let Some(event) = self.turn_started(Some(message)) {
            outbox.room(event);
        }
        outbox
    }

    fn declare_winner(&mut self, idx: usize) -> Outbox {
        let mut outbox = Outbox::new();
        if let Err(e) = self.phase.apply_mut(PhaseEvent::Win) {
            log::error!("Lobby {}: {}", self.code, e);
            return outbox;
        }

        let winner = &self.players[idx];
        log::info!(
            "Game over in lobby {}: {} wins with {} brains",
            self.code,
            winner.name,
            winner.banked
        );

        outbox.room(Event::GameOver {
            winner: winner.name.clone(),
            winner_id: winner.id,
            host_id: self.host_id,
            players: self.summaries(),
        });

        match self.reset_for_new_game() {
            Ok(reset) => outbox.append(reset),
            Err(e) => log::error!("Lobby {}: reset failed: {}", self.code, e),
        }
        outbox
    }

    /// Give up on a match that lost too many players.
    fn abandon_match(&mut self) -> Outbox {
        let mut outbox = Outbox::new();
        if let Err(e) = self.phase.apply_mut(PhaseEvent::Abandon) {
            log::error!("Lobby {}: {}", self.code, e);
            return outbox;
        }

        let promoted = self.spectators.len();
        self.seat_spectators();
        self.hand.release(&mut self.cup);
        for player in &mut self.players {
            player.turn.clear();
        }
        self.turn_order = self.players.iter().map(|p| p.id).collect();
        self.current_index = 0;
        self.fresh_match = false;

        log::info!("Lobby {}: match abandoned, back to waiting", self.code);

        outbox.room(Event::GameReset {
            code: self.code.clone(),
            host_id: self.host_id,
            current_player_id: None,
            message: "Not enough players to continue. Waiting for more players...".to_string(),
        });
        if promoted > 0 {
            outbox.room(Event::SpectatorCountUpdate { count: 0 });
        }
        outbox
    }

    fn seat_spectators(&mut self) {
        for spectator in self.spectators.drain(..) {
            self.players.push(spectator.into_player());
        }
    }

    fn advance_turn(&mut self) {
        if self.turn_order.is_empty() {
            self.current_index = 0;
            return;
        }
        self.current_index = (self.current_index + 1) % self.turn_order.len();
    }

    fn turn_started(&self, message: Option<String>) -> Option<Event> {
        let Some(current) = self.current_player() else {
            log::error!("Lobby {}: no current player to start a turn", self.code);
            return None;
        };
        Some(Event::TurnStarted {
            code: self.code.clone(),
            current_player_id: current.id,
            name: current.name.clone(),
            players: self.summaries(),
            message,
        })
    }
}
