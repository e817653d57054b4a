use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::master::{GameStateDto, PlayerOverview, PlayerScore};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream (`presenter`, `master` or `player`).
    pub stream: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// RFC 3339 timestamp of the connection.
    pub connected_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Broadcast to the master whenever the game state changes.
pub struct PhaseChangedEvent(pub Option<GameStateDto>);

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast to the master after grading or any draft edit.
pub struct DraftUpdatedEvent {
    pub draft: Vec<PlayerScore>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast to the master whenever a player joins, answers or scores.
pub struct PlayersUpdatedEvent {
    pub players: Vec<PlayerOverview>,
}
