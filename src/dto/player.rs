//! DTO definitions used by the player REST API.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use validator::Validate;

use crate::{dto::validation::validate_player_name, state::player::PlayerView};

/// Request to join the live game.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinRequest {
    /// Display name; surrounding whitespace is ignored.
    #[validate(custom(function = "validate_player_name"))]
    pub name: String,
}

/// Response to a successful join.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinResponse {
    /// Name the player was registered under.
    pub name: String,
    pub view: PlayerView,
}

/// Answer for the open question.
///
/// A choice key for multiple choice and true/false, free text for text and
/// image questions, the full list of items for ordering questions.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AnswerRequest {
    pub answer: Value,
}
