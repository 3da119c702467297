//! Error types for the relay.
//!
//! `RoomError` covers everything a handler can reject. Its `Display` text is
//! what the client sees in an `error` event, so keep the wording stable.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("Room not found")]
    RoomNotFound,
    #[error("Room is full")]
    RoomFull,
    #[error("Game already in progress")]
    GameInProgress,
    #[error("All players must be ready to start")]
    NotAllReady,
    #[error("Insufficient gold to place tower")]
    InsufficientGold,
    #[error("Only the host can do that")]
    NotHost,
    #[error("Already in a room")]
    AlreadyInRoom,
    #[error("No free room codes, try again")]
    CodeSpaceExhausted,
    #[error("Not in a room")]
    NotInRoom,
    #[error("Game has not started")]
    GameNotStarted,
    #[error("No vote is open")]
    NoActiveVote,
    #[error("A wave is already in progress")]
    WaveInProgress,
}

impl RoomError {
    /// Whether the sender gets an `error` event. The rest are dropped quietly.
    pub fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            RoomError::NotInRoom
                | RoomError::GameNotStarted
                | RoomError::NoActiveVote
                | RoomError::WaveInProgress
        )
    }
}

/// Failures of the listener or the event loop itself.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("event channel closed")]
    ChannelClosed,
}
