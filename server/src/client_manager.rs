//! Connection registry for the relay
//!
//! This module tracks every live connection independently of room contents:
//! - Player id assignment on connect and teardown on disconnect
//! - The outbound channel owned by each connection
//! - Which room, if any, a connection is currently bound to
//! - Fan-out of events to a set of room members
//!
//! Rooms only ever store player ids; anything that needs a name, a ship or a
//! channel goes through the `ClientManager`.

use crate::utils::{base36_token, get_timestamp};
use log::{debug, info};
use rand::Rng;
use shared::{PlayerId, PlayerSummary, RoomCode, ServerMessage, DEFAULT_SHIP};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Outbound half of a connection; drained by that connection's writer task.
pub type Outbound = mpsc::UnboundedSender<ServerMessage>;

const ID_SUFFIX_LEN: usize = 9;

/// A connected player
#[derive(Debug)]
pub struct Client {
    pub id: PlayerId,
    /// Set when the player creates or joins a room
    pub name: Option<String>,
    pub selected_ship: String,
    /// Room this connection is seated in
    pub room: Option<RoomCode>,
    sender: Outbound,
}

impl Client {
    pub fn new(id: PlayerId, sender: Outbound) -> Self {
        Self {
            id,
            name: None,
            selected_ship: DEFAULT_SHIP.to_string(),
            room: None,
            sender,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    /// False once the connection's writer has gone away.
    pub fn is_writable(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Queues a message without waiting. Returns false if the connection is gone.
    pub fn send(&self, message: ServerMessage) -> bool {
        self.is_writable() && self.sender.send(message).is_ok()
    }

    pub fn summary(&self) -> PlayerSummary {
        PlayerSummary {
            id: self.id.clone(),
            name: self.display_name().to_string(),
            selected_ship: self.selected_ship.clone(),
        }
    }
}

/// Owns every live connection, keyed by player id.
#[derive(Debug, Default)]
pub struct ClientManager {
    clients: HashMap<PlayerId, Client>,
}

impl ClientManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection and sends it the `connected` event
    ///
    /// Ids are a millisecond timestamp plus a random base-36 suffix; a
    /// collision with a live id is re-rolled.
    pub fn register<R: Rng + ?Sized>(&mut self, sender: Outbound, rng: &mut R) -> PlayerId {
        let mut player_id = format!("{}{}", get_timestamp(), base36_token(rng, ID_SUFFIX_LEN));
        while self.clients.contains_key(&player_id) {
            player_id = format!("{}{}", get_timestamp(), base36_token(rng, ID_SUFFIX_LEN));
        }

        let client = Client::new(player_id.clone(), sender);
        client.send(ServerMessage::Connected {
            player_id: player_id.clone(),
        });
        info!("Player connected: {}", player_id);
        self.clients.insert(player_id.clone(), client);

        player_id
    }

    /// Removes a connection, handing back its state so the caller can clean
    /// up the room it was bound to.
    pub fn unregister(&mut self, player_id: &str) -> Option<Client> {
        let client = self.clients.remove(player_id)?;
        info!("Player disconnected: {}", player_id);
        Some(client)
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.clients.contains_key(player_id)
    }

    pub fn get(&self, player_id: &str) -> Option<&Client> {
        self.clients.get(player_id)
    }

    pub fn get_mut(&mut self, player_id: &str) -> Option<&mut Client> {
        self.clients.get_mut(player_id)
    }

    pub fn bind_room(&mut self, player_id: &str, room_code: &str) {
        if let Some(client) = self.clients.get_mut(player_id) {
            client.room = Some(room_code.to_owned());
        }
    }

    pub fn room_of(&self, player_id: &str) -> Option<&str> {
        self.clients.get(player_id)?.room.as_deref()
    }

    pub fn summary(&self, player_id: &str) -> Option<PlayerSummary> {
        self.clients.get(player_id).map(Client::summary)
    }

    pub fn send_to(&self, player_id: &str, message: ServerMessage) {
        match self.clients.get(player_id) {
            Some(client) => {
                if !client.send(message) {
                    debug!("Dropping event for closed connection {}", player_id);
                }
            }
            None => debug!("Dropping event for unknown player {}", player_id),
        }
    }

    /// Delivers `message` to every writable member, optionally skipping one.
    ///
    /// Closed or unknown recipients are skipped, never waited on.
    pub fn broadcast(&self, members: &[PlayerId], message: &ServerMessage, exclude: Option<&str>) {
        for member in members {
            if Some(member.as_str()) == exclude {
                continue;
            }
            if let Some(client) = self.clients.get(member) {
                if !client.send(message.clone()) {
                    debug!("Skipping broadcast to closed connection {}", member);
                }
            }
        }
    }

    /// Returns the number of live connections
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
