use std::collections::HashMap;

use axum::extract::ws::Message;
use tokio::sync::mpsc;

use scrim_core::net::messages::{PlayersMsg, ServerEvent};
use scrim_core::net::protocol::encode_server_event;
use scrim_core::player::{Player, PlayerId};
use scrim_core::room::{Phase, Room, generate_room_code};

/// Per-player sender for outbound WebSocket frames. Bounded to protect
/// the server from slow clients; text frames clone cheaply on fan-out.
pub type PlayerSender = mpsc::Sender<Message>;

/// Why a join was refused.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("room not found")]
    NotFound,
    #[error("room already started (phase {0:?})")]
    AlreadyStarted(Phase),
    #[error("room is full")]
    Full,
}

struct RoomEntry {
    room: Room,
    /// Explicit broadcast membership, maintained alongside the roster.
    subscribers: HashMap<PlayerId, PlayerSender>,
}

/// Owns every active room and its subscriber set. Shared behind an
/// `RwLock`; each gateway handler completes its mutations and
/// broadcasts under one guard, so scheduler ticks interleave only
/// between handlers.
pub struct RoomRegistry {
    rooms: HashMap<String, RoomEntry>,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
        }
    }

    /// Create a room with a fresh unique code and the host as its first
    /// member and subscriber. Returns the room code.
    pub fn create_room(&mut self, host: Player, sender: PlayerSender) -> String {
        let code = generate_unique_room_code(&self.rooms);
        let host_id = host.id;
        let mut room = Room::new(code.clone());
        room.add_player(host);
        room.recompute_teams();
        let mut subscribers = HashMap::new();
        subscribers.insert(host_id, sender);
        self.rooms.insert(code.clone(), RoomEntry { room, subscribers });
        code
    }

    /// Admit a player into an existing lobby. Assigns the balanced team
    /// slot, inserts the player, and subscribes the connection. Returns
    /// the completed player record.
    pub fn join_room(
        &mut self,
        code: &str,
        mut player: Player,
        sender: PlayerSender,
    ) -> Result<Player, JoinError> {
        let entry = self.rooms.get_mut(code).ok_or(JoinError::NotFound)?;

        if entry.room.state.phase != Phase::Lobby {
            return Err(JoinError::AlreadyStarted(entry.room.state.phase));
        }
        if entry.room.is_full() {
            return Err(JoinError::Full);
        }
        let team = entry.room.assign_team().ok_or(JoinError::Full)?;

        player.team = team;
        entry.room.add_player(player.clone());
        entry.room.recompute_teams();
        entry.subscribers.insert(player.id, sender);
        Ok(player)
    }

    pub fn room(&self, code: &str) -> Option<&Room> {
        self.rooms.get(code).map(|e| &e.room)
    }

    pub fn room_mut(&mut self, code: &str) -> Option<&mut Room> {
        self.rooms.get_mut(code).map(|e| &mut e.room)
    }

    /// Drop a player from the roster and the subscriber set, refreshing
    /// team counts. Returns true when the roster changed.
    pub fn remove_player(&mut self, code: &str, id: PlayerId) -> bool {
        let Some(entry) = self.rooms.get_mut(code) else {
            return false;
        };
        entry.subscribers.remove(&id);
        let removed = entry.room.remove_player(id);
        if removed {
            entry.room.recompute_teams();
        }
        removed
    }

    /// Remove the room iff it is present and has no players. Idempotent:
    /// an absent code is a no-op.
    pub fn remove_room_if_empty(&mut self, code: &str) {
        if let Some(entry) = self.rooms.get(code)
            && entry.room.is_empty()
        {
            self.rooms.remove(code);
            tracing::info!(room = code, "Removed empty room");
        }
    }

    /// Fan an event out to every subscriber of the room. Slow clients
    /// with a full buffer are skipped, not awaited.
    pub fn broadcast(&self, code: &str, event: &ServerEvent) {
        let Some(entry) = self.rooms.get(code) else {
            return;
        };
        let text = match encode_server_event(event) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(room = code, error = %e, "Failed to encode broadcast");
                return;
            },
        };
        let frame = Message::Text(text.into());
        for (&pid, sender) in &entry.subscribers {
            if let Err(e) = sender.try_send(frame.clone()) {
                tracing::debug!(
                    player_id = pid, room = code, error = %e,
                    "Skipping broadcast to slow client"
                );
            }
        }
    }

    /// Broadcast the current roster and state snapshot to the room.
    pub fn broadcast_roster(&self, code: &str) {
        if let Some(entry) = self.rooms.get(code) {
            let msg = ServerEvent::Players(PlayersMsg {
                roster: entry.room.players.clone(),
                state: entry.room.state.clone(),
            });
            self.broadcast(code, &msg);
        }
    }

    /// Broadcast the current state snapshot to the room.
    pub fn broadcast_state(&self, code: &str) {
        if let Some(entry) = self.rooms.get(code) {
            self.broadcast(code, &ServerEvent::State(entry.room.state.clone()));
        }
    }

    pub fn iter_rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values().map(|e| &e.room)
    }

    /// Returns (active room count, total player count).
    pub fn stats(&self) -> (usize, usize) {
        let players = self.rooms.values().map(|e| e.room.players.len()).sum();
        (self.rooms.len(), players)
    }
}

/// Generate a unique room code, retrying on collision with existing rooms.
fn generate_unique_room_code(existing: &HashMap<String, RoomEntry>) -> String {
    loop {
        let code = generate_room_code();
        if !existing.contains_key(&code) {
            return code;
        }
    }
}
