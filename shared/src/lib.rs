//! Wire types shared between the relay server and anything that talks to it.
//!
//! Every frame on the wire is a JSON envelope `{ "type": ..., "data": ... }`.
//! Inbound frames decode into [`ClientMessage`], outbound events are built as
//! [`ServerMessage`]; both are closed enums so a mis-shaped payload fails at
//! decode time instead of deep inside a handler.

use serde::{Deserialize, Serialize};

mod protocol;

pub use protocol::{ClientMessage, ProtocolError, ServerMessage};

/// Opaque connection id handed out by the server on connect.
pub type PlayerId = String;
/// Six character public room code.
pub type RoomCode = String;

pub const ROOM_CAPACITY: usize = 3;
pub const STARTING_GOLD: i64 = 500;
pub const DEFAULT_SHIP: &str = "ship1.glb";

/// Where an enemy appears when no usable path has been supplied.
pub const FALLBACK_SPAWN: (f32, f32) = (-50.0, 0.0);
/// Point every spawned enemy is initially heading towards.
pub const ENEMY_TARGET: (f32, f32, f32) = (50.0, 0.0, 0.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnemyKind {
    Basic,
    Fast,
    Tank,
    Boss,
}

impl EnemyKind {
    pub fn health(self) -> u32 {
        match self {
            EnemyKind::Basic => 30,
            EnemyKind::Fast => 18,
            EnemyKind::Tank => 75,
            EnemyKind::Boss => 150,
        }
    }

    pub fn speed(self) -> f32 {
        match self {
            EnemyKind::Basic => 0.05,
            EnemyKind::Fast => 0.08,
            EnemyKind::Tank => 0.03,
            EnemyKind::Boss => 0.02,
        }
    }
}

/// An enemy as announced in `enemy_spawn`.
///
/// The server only decides when enemies appear and disappear; movement is
/// simulated by the clients starting from these coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enemy {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EnemyKind,
    pub health: u32,
    pub max_health: u32,
    pub speed: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub target_x: f32,
    pub target_y: f32,
    pub target_z: f32,
}

impl Enemy {
    /// Creates a full-health enemy of `kind` at the given ground position.
    pub fn spawn(id: String, kind: EnemyKind, x: f32, y: f32) -> Self {
        let (target_x, target_y, target_z) = ENEMY_TARGET;
        Self {
            id,
            kind,
            health: kind.health(),
            max_health: kind.health(),
            speed: kind.speed(),
            x,
            y,
            z: 0.0,
            target_x,
            target_y,
            target_z,
        }
    }
}

/// A 3D path waypoint reported by a client.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

/// Roster entry carried by `game_start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    pub id: PlayerId,
    pub name: String,
    pub selected_ship: String,
}
