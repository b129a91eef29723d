//! Game server actor with async message handling.
//!
//! A single task owns the [`SessionRegistry`] and every connection. Requests
//! arrive on one inbox and are handled to completion, outbound events
//! included, before the next is read, so no two mutations of a lobby ever
//! interleave.

pub mod connection;

use crate::config::GameConfig;
use crate::state::event::{Event, Outbox};
use crate::state::lobby::{JoinRole, LobbySnapshot};
use crate::state::player::PlayerId;
use crate::state::registry::{RegistryError, SessionRegistry};
use connection::{ConnectionManager, Delivery, Envelope, DEFAULT_OUTBOX_CAPACITY};
use tokio::sync::{mpsc, oneshot};

/// Capacity of the server inbox.
pub const INBOX_CAPACITY: usize = 256;

/// Errors seen by [`ServerHandle`] callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServerError {
    #[error("Game server is closed")]
    Closed,
    #[error(transparent)]
    Rejected(#[from] RegistryError),
}

/// Messages that can be sent to the [`GameServer`].
#[derive(Debug)]
pub enum Command {
    /// Open a connection and hand back its ID and event stream
    Connect {
        response: oneshot::Sender<(PlayerId, mpsc::Receiver<Envelope>)>,
    },

    Create {
        player_id: PlayerId,
        name: String,
        response: oneshot::Sender<Result<String, RegistryError>>,
    },

    Join {
        player_id: PlayerId,
        code: String,
        name: String,
        response: oneshot::Sender<Result<JoinRole, RegistryError>>,
    },

    Start {
        player_id: PlayerId,
        code: String,
        response: oneshot::Sender<Result<(), RegistryError>>,
    },

    Roll {
        player_id: PlayerId,
        code: String,
        response: oneshot::Sender<Result<(), RegistryError>>,
    },

    EndTurn {
        player_id: PlayerId,
        code: String,
        save_brains: bool,
        response: oneshot::Sender<Result<(), RegistryError>>,
    },

    /// Connection went away
    Disconnect { player_id: PlayerId },

    /// Read-only view of a lobby
    Snapshot {
        code: String,
        response: oneshot::Sender<Result<LobbySnapshot, RegistryError>>,
    },
}

/// Handle for sending commands to the server.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    sender: mpsc::Sender<Command>,
}

impl ServerHandle {
    /// Send a raw command.
    pub async fn send(&self, command: Command) -> Result<(), ServerError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| ServerError::Closed)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, RegistryError>>) -> Command,
    ) -> Result<T, ServerError> {
        let (response, reply) = oneshot::channel();
        self.send(build(response)).await?;
        let result = reply.await.map_err(|_| ServerError::Closed)?;
        Ok(result?)
    }

    /// Open a connection. Events for it arrive on the returned receiver.
    pub async fn connect(&self) -> Result<(PlayerId, mpsc::Receiver<Envelope>), ServerError> {
        let (response, reply) = oneshot::channel();
        self.send(Command::Connect { response }).await?;
        reply.await.map_err(|_| ServerError::Closed)
    }

    /// Create a lobby; returns its code.
    pub async fn create(&self, player_id: PlayerId, name: &str) -> Result<String, ServerError> {
        let name = name.to_string();
        self.request(|response| Command::Create {
            player_id,
            name,
            response,
        })
        .await
    }

    pub async fn join(
        &self,
        player_id: PlayerId,
        code: &str,
        name: &str,
    ) -> Result<JoinRole, ServerError> {
        let (code, name) = (code.to_string(), name.to_string());
        self.request(|response| Command::Join {
            player_id,
            code,
            name,
            response,
        })
        .await
    }

    pub async fn start(&self, player_id: PlayerId, code: &str) -> Result<(), ServerError> {
        let code = code.to_string();
        self.request(|response| Command::Start {
            player_id,
            code,
            response,
        })
        .await
    }

    pub async fn roll(&self, player_id: PlayerId, code: &str) -> Result<(), ServerError> {
        let code = code.to_string();
        self.request(|response| Command::Roll {
            player_id,
            code,
            response,
        })
        .await
    }

    pub async fn end_turn(
        &self,
        player_id: PlayerId,
        code: &str,
        save_brains: bool,
    ) -> Result<(), ServerError> {
        let code = code.to_string();
        self.request(|response| Command::EndTurn {
            player_id,
            code,
            save_brains,
            response,
        })
        .await
    }

    pub async fn disconnect(&self, player_id: PlayerId) -> Result<(), ServerError> {
        self.send(Command::Disconnect { player_id }).await
    }

    pub async fn snapshot(&self, code: &str) -> Result<LobbySnapshot, ServerError> {
        let code = code.to_string();
        self.request(|response| Command::Snapshot { code, response })
            .await
    }
}

/// Game server owning every lobby and connection.
pub struct GameServer {
    registry: SessionRegistry,

    connections: ConnectionManager,

    /// Message inbox
    inbox: mpsc::Receiver<Command>,

    /// Capacity of each new connection's channel
    outbox_capacity: usize,
}

impl GameServer {
    /// Create a server and the handle for talking to it.
    pub fn new(config: GameConfig) -> (Self, ServerHandle) {
        Self::with_registry(SessionRegistry::new(config))
    }

    /// Create a server around an existing registry, e.g. a seeded one.
    pub fn with_registry(registry: SessionRegistry) -> (Self, ServerHandle) {
        let (sender, inbox) = mpsc::channel(INBOX_CAPACITY);
        let server = Self {
            registry,
            connections: ConnectionManager::new(),
            inbox,
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
        };
        (server, ServerHandle { sender })
    }

    /// Set the channel capacity used for connections opened from now on.
    pub fn with_outbox_capacity(mut self, capacity: usize) -> Self {
        self.outbox_capacity = capacity;
        self
    }

    /// Spawn the server on the current tokio runtime.
    pub fn spawn(config: GameConfig) -> ServerHandle {
        let (server, handle) = Self::new(config);
        tokio::spawn(server.run());
        handle
    }

    /// Run the server event loop until every handle is dropped.
    pub async fn run(mut self) {
        log::info!("Game server starting");

        while let Some(command) = self.inbox.recv().await {
            self.handle_command(command);
        }

        log::info!(
            "Game server stopped ({} lobbies, {} connections)",
            self.registry.count(),
            self.connections.count()
        );
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { response } => {
                let (player_id, events) = self.connections.open(self.outbox_capacity);
                log::debug!("Connection {} opened", player_id);
                if response.send((player_id, events)).is_err() {
                    self.connections.remove(player_id);
                }
            }

            Command::Create {
                player_id,
                name,
                response,
            } => {
                self.connections.touch(player_id);
                let result = self.registry.create_session(player_id, &name);
                let reply = self.settle(
                    player_id,
                    result.map(|(code, outbox)| (code.clone(), outbox, code)),
                );
                let _ = response.send(reply);
            }

            Command::Join {
                player_id,
                code,
                name,
                response,
            } => {
                self.connections.touch(player_id);
                let result = self.registry.join(&code, player_id, &name);
                let reply = self.settle(
                    player_id,
                    result.map(|(role, outbox)| (code.clone(), outbox, role)),
                );
                let _ = response.send(reply);
            }

            Command::Start {
                player_id,
                code,
                response,
            } => {
                self.connections.touch(player_id);
                let result = self.registry.start(&code, player_id);
                let reply = self.settle(
                    player_id,
                    result.map(|outbox| (code.clone(), outbox, ())),
                );
                let _ = response.send(reply);
            }

            Command::Roll {
                player_id,
                code,
                response,
            } => {
                self.connections.touch(player_id);
                let result = self.registry.roll(&code, player_id);
                let reply = self.settle(
                    player_id,
                    result.map(|outbox| (code.clone(), outbox, ())),
                );
                let _ = response.send(reply);
            }

            Command::EndTurn {
                player_id,
                code,
                save_brains,
                response,
            } => {
                self.connections.touch(player_id);
                let result = self.registry.end_turn(&code, player_id, save_brains);
                let reply = self.settle(
                    player_id,
                    result.map(|outbox| (code.clone(), outbox, ())),
                );
                let _ = response.send(reply);
            }

            Command::Disconnect { player_id } => {
                self.drop_connections(vec![player_id]);
            }

            Command::Snapshot { code, response } => {
                let snapshot = self
                    .registry
                    .get(&code)
                    .map(|lobby| lobby.snapshot())
                    .ok_or_else(|| RegistryError::NotFound(code.to_uppercase()));
                let _ = response.send(snapshot);
            }
        }
    }

    /// Deliver a successful operation's events, or tell the sender why it
    /// was refused.
    fn settle<T>(
        &mut self,
        player_id: PlayerId,
        result: Result<(String, Outbox, T), RegistryError>,
    ) -> Result<T, RegistryError> {
        match result {
            Ok((code, outbox, value)) => {
                self.deliver(&code, outbox);
                Ok(value)
            }
            Err(e) => {
                self.reject(player_id, &e);
                Err(e)
            }
        }
    }

    fn deliver(&mut self, code: &str, outbox: Outbox) {
        let room = self.registry.room(code);
        let closed = self.connections.dispatch(outbox, &room);
        self.drop_connections(closed);
    }

    fn reject(&mut self, player_id: PlayerId, error: &RegistryError) {
        if error.is_silent() {
            log::warn!("Ignoring request from {}: {}", player_id, error);
            return;
        }

        log::warn!("Rejected request from {}: {}", player_id, error);
        let event = match error {
            RegistryError::NotFound(code) => Event::LobbyNotFound { code: code.clone() },
            other => Event::ValidationError {
                message: other.to_string(),
            },
        };

        if self.connections.deliver(player_id, event) == Delivery::Closed {
            self.drop_connections(vec![player_id]);
        }
    }

    /// Forget connections and take their owners out of their lobbies.
    /// Departures can surface more closed connections; those are handled too.
    fn drop_connections(&mut self, mut pending: Vec<PlayerId>) {
        while let Some(player_id) = pending.pop() {
            if self.connections.remove(player_id).is_some() {
                log::info!("Connection {} closed", player_id);
            }

            if let Some(departure) = self.registry.leave(player_id) {
                if departure.removed {
                    log::debug!("Lobby {} emptied by {}", departure.code, player_id);
                }
                let closed = self.connections.dispatch(departure.outbox, &departure.room);
                pending.extend(closed);
            }
        }
    }
}
