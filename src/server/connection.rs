//! Connection state management.
//!
//! Tracks open client channels and their metadata. Every event is stamped
//! with a per-connection sequence number before it is handed to the channel.

use crate::state::event::{Audience, Dispatch, Event, Outbox};
use crate::state::player::PlayerId;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Default capacity of each connection's outbound channel.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 64;

/// An event as delivered to one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope {
    /// Increases by one per event sent to this connection. A gap means an
    /// event was dropped.
    pub seq: u64,

    #[serde(flatten)]
    pub event: Event,
}

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent(u64),
    /// Channel full; this event is lost but the connection stays
    Dropped,
    /// Receiver gone or never existed
    Closed,
}

/// Connection state for a single client.
#[derive(Debug)]
pub struct Connection {
    /// Assigned at open, doubles as the player ID
    pub player_id: PlayerId,

    sender: mpsc::Sender<Envelope>,

    /// Sequence number of the last event sent
    pub send_seq: u64,

    /// Events lost to a full channel
    pub dropped: u64,

    /// When this connection was established
    pub connected_at: Instant,

    /// Last activity timestamp
    pub last_activity: Instant,
}

impl Connection {
    pub fn new(player_id: PlayerId, sender: mpsc::Sender<Envelope>) -> Self {
        let now = Instant::now();
        Self {
            player_id,
            sender,
            send_seq: 0,
            dropped: 0,
            connected_at: now,
            last_activity: now,
        }
    }

    /// Record activity (any request received).
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Get time since last activity.
    pub fn idle_time(&self) -> Duration {
        self.last_activity.elapsed()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Stamp the next sequence number and hand the event to the channel
    /// without waiting.
    pub fn send(&mut self, event: Event) -> Delivery {
        self.send_seq += 1;
        let seq = self.send_seq;

        match self.sender.try_send(Envelope { seq, event }) {
            Ok(()) => Delivery::Sent(seq),
            Err(TrySendError::Full(envelope)) => {
                self.dropped += 1;
                log::warn!(
                    "Connection {} channel full, dropping {} (seq {})",
                    self.player_id,
                    envelope.event.name(),
                    seq
                );
                Delivery::Dropped
            }
            Err(TrySendError::Closed(_)) => {
                log::debug!("Connection {} receiver closed", self.player_id);
                Delivery::Closed
            }
        }
    }
}

/// Connection manager - tracks all open connections.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    /// Connections by player ID
    connections: HashMap<PlayerId, Connection>,

    /// Last ID handed out
    last_id: PlayerId,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a connection under a fresh ID.
    pub fn open(&mut self, capacity: usize) -> (PlayerId, mpsc::Receiver<Envelope>) {
        self.last_id += 1;
        let player_id = self.last_id;
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        self.connections
            .insert(player_id, Connection::new(player_id, sender));
        (player_id, receiver)
    }

    /// Get a connection by player ID.
    pub fn get(&self, player_id: PlayerId) -> Option<&Connection> {
        self.connections.get(&player_id)
    }

    /// Remove a connection.
    pub fn remove(&mut self, player_id: PlayerId) -> Option<Connection> {
        self.connections.remove(&player_id)
    }

    pub fn touch(&mut self, player_id: PlayerId) {
        if let Some(conn) = self.connections.get_mut(&player_id) {
            conn.touch();
        }
    }

    /// Count open connections.
    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// Deliver one event to one connection.
    pub fn deliver(&mut self, player_id: PlayerId, event: Event) -> Delivery {
        match self.connections.get_mut(&player_id) {
            Some(conn) => conn.send(event),
            None => {
                log::debug!("No connection {} for {}", player_id, event.name());
                Delivery::Closed
            }
        }
    }

    /// Deliver an outbox in order, room events to every ID in `room`.
    ///
    /// Returns the connections found closed, each listed once.
    pub fn dispatch(&mut self, outbox: Outbox, room: &[PlayerId]) -> Vec<PlayerId> {
        let mut closed = Vec::new();

        for Dispatch { audience, event } in outbox {
            match audience {
                Audience::Room => {
                    for &player_id in room {
                        if closed.contains(&player_id) {
                            continue;
                        }
                        if self.deliver(player_id, event.clone()) == Delivery::Closed {
                            closed.push(player_id);
                        }
                    }
                }
                Audience::Only(player_id) => {
                    if closed.contains(&player_id) {
                        continue;
                    }
                    if self.deliver(player_id, event) == Delivery::Closed {
                        closed.push(player_id);
                    }
                }
            }
        }

        closed
    }
}
