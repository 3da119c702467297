use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::{Enemy, PlayerId, PlayerSummary, RoomCode, Waypoint};

/// Reasons an inbound frame could not be turned into a [`ClientMessage`].
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame is not a JSON object")]
    NotAnObject,
    #[error("frame has no type tag")]
    MissingType,
    #[error("cannot decode `{kind}` frame: {source}")]
    Payload {
        kind: String,
        source: serde_json::Error,
    },
}

/// Gold amount as sent by clients, which may carry a fractional part.
#[derive(Deserialize)]
#[serde(untagged)]
enum GoldAmount {
    Whole(i64),
    Fractional(f64),
}

/// Reads a gold amount, rounding fractional values to the nearest coin.
fn whole_gold<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match GoldAmount::deserialize(deserializer)? {
        GoldAmount::Whole(amount) => Ok(amount),
        GoldAmount::Fractional(amount) if amount.is_finite() => Ok(amount.round() as i64),
        GoldAmount::Fractional(_) => Err(D::Error::custom("gold amount is not finite")),
    }
}

/// Messages sent by clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    CreateRoom {
        #[serde(default)]
        player_name: Option<String>,
    },
    JoinRoom {
        room_code: RoomCode,
        #[serde(default)]
        player_name: Option<String>,
    },
    Chat {
        message: String,
    },
    Ready {
        ready: bool,
    },
    StartGame {},
    Position {
        x: f32,
        y: f32,
        rotation: f32,
    },
    PlaceTower {
        x: f32,
        y: f32,
        #[serde(rename = "type")]
        tower_type: String,
    },
    ReadyRound {},
    SkipRound {},
    SelectUpgrade {
        upgrade_id: String,
    },
    AddBaseModule {
        module_type: String,
    },
    MissileSiloLaunch {},
    MissileSiloTarget {
        target_x: f32,
        target_z: f32,
    },
    PathData {
        path_points: Vec<Waypoint>,
    },
    PauseGame {
        paused: bool,
    },
    EnemyKilled {
        enemy_id: String,
        #[serde(deserialize_with = "whole_gold")]
        gold_reward: i64,
    },
    GoldSync {
        #[serde(deserialize_with = "whole_gold")]
        gold: i64,
    },
    PlaceBomb {
        x: f32,
        y: f32,
        z: f32,
    },
    DetonateBombs {},
    UseFreeze {},
    ShipSelected {
        ship_name: String,
    },
    #[serde(rename = "vote-submitted")]
    VoteSubmitted {
        #[serde(default)]
        player_id: Option<PlayerId>,
        upgrade_id: String,
    },
}

impl ClientMessage {
    /// Decodes one text frame.
    ///
    /// Clients are allowed to put the payload fields directly on the
    /// envelope instead of under `data`; a missing or null `data` falls back
    /// to reading the envelope itself.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let mut frame: Value = serde_json::from_str(text)?;
        let object = frame.as_object_mut().ok_or(ProtocolError::NotAnObject)?;
        let kind = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingType)?
            .to_owned();

        let payload = match object.remove("data") {
            Some(data) if !data.is_null() => data,
            _ => Value::Object(object.clone()),
        };

        serde_json::from_value(json!({ "type": kind, "data": payload }))
            .map_err(|source| ProtocolError::Payload { kind, source })
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// The wire tag of this message, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::CreateRoom { .. } => "create_room",
            ClientMessage::JoinRoom { .. } => "join_room",
            ClientMessage::Chat { .. } => "chat",
            ClientMessage::Ready { .. } => "ready",
            ClientMessage::StartGame {} => "start_game",
            ClientMessage::Position { .. } => "position",
            ClientMessage::PlaceTower { .. } => "place_tower",
            ClientMessage::ReadyRound {} => "ready_round",
            ClientMessage::SkipRound {} => "skip_round",
            ClientMessage::SelectUpgrade { .. } => "select_upgrade",
            ClientMessage::AddBaseModule { .. } => "add_base_module",
            ClientMessage::MissileSiloLaunch {} => "missile_silo_launch",
            ClientMessage::MissileSiloTarget { .. } => "missile_silo_target",
            ClientMessage::PathData { .. } => "path_data",
            ClientMessage::PauseGame { .. } => "pause_game",
            ClientMessage::EnemyKilled { .. } => "enemy_killed",
            ClientMessage::GoldSync { .. } => "gold_sync",
            ClientMessage::PlaceBomb { .. } => "place_bomb",
            ClientMessage::DetonateBombs {} => "detonate_bombs",
            ClientMessage::UseFreeze {} => "use_freeze",
            ClientMessage::ShipSelected { .. } => "ship_selected",
            ClientMessage::VoteSubmitted { .. } => "vote-submitted",
        }
    }
}

/// Events sent by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    Connected {
        player_id: PlayerId,
    },
    RoomCreated {
        room_code: RoomCode,
    },
    PlayerJoined {
        player_id: PlayerId,
        name: String,
        selected_ship: String,
    },
    PlayerLeft {
        player_id: PlayerId,
    },
    PlayerReady {
        player_id: PlayerId,
        ready: bool,
    },
    GameStart {
        players: Vec<PlayerSummary>,
        environment_seed: String,
    },
    Error {
        message: String,
    },
    Chat {
        player_id: PlayerId,
        player_name: String,
        message: String,
    },
    Position {
        player_id: PlayerId,
        x: f32,
        y: f32,
        rotation: f32,
        selected_ship: String,
    },
    GoldChanged {
        player_id: PlayerId,
        gold: i64,
    },
    TowerPlaced {
        player_id: PlayerId,
        x: f32,
        y: f32,
        #[serde(rename = "type")]
        tower_type: String,
    },
    WaveStart {
        round: u32,
    },
    EnemySpawn(Enemy),
    EnemyKilled {
        enemy_id: String,
        gold_reward: i64,
        player_id: PlayerId,
    },
    RoundEnd {
        round: u32,
        upgrades: Vec<String>,
    },
    #[serde(rename = "start-voting")]
    StartVoting {
        options: Vec<String>,
    },
    #[serde(rename = "vote-update")]
    VoteUpdate {
        player_id: PlayerId,
        upgrade_id: String,
    },
    #[serde(rename = "voting-complete")]
    VotingComplete {
        selected_upgrade: String,
    },
    UpgradeSelected {
        player_id: PlayerId,
        upgrade_id: String,
    },
    BaseModuleAdded {
        player_id: PlayerId,
        module_type: String,
    },
    MissileSiloLaunch {
        player_id: PlayerId,
    },
    MissileSiloTarget {
        player_id: PlayerId,
        target_x: f32,
        target_z: f32,
    },
    PauseGame {
        paused: bool,
        player_id: PlayerId,
    },
    BombPlaced {
        player_id: PlayerId,
        x: f32,
        y: f32,
        z: f32,
    },
    BombsDetonated {
        player_id: PlayerId,
    },
    FreezeUsed {
        player_id: PlayerId,
    },
    ShipSelected {
        player_id: PlayerId,
        ship_name: String,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
