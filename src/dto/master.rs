//! DTO definitions used by the master console REST API and SSE stream.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::state::{
    game::GameState,
    master::MasterOutcome,
    moderation::ModerationDraft,
    quiz::QuestionType,
    state_machine::{GamePhase, Snapshot},
};

/// Score attached to a player name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PlayerScore {
    pub player: String,
    pub score: u32,
}

fn to_scores<'a>(entries: impl Iterator<Item = (&'a str, u32)>) -> Vec<PlayerScore> {
    entries
        .map(|(player, score)| PlayerScore {
            player: player.to_string(),
            score,
        })
        .collect()
}

impl From<&ModerationDraft> for Vec<PlayerScore> {
    fn from(draft: &ModerationDraft) -> Self {
        to_scores(draft.iter())
    }
}

/// Position of the game as exposed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct GameStateDto {
    pub phase: GamePhase,
    pub round_id: Option<String>,
    pub question_id: Option<String>,
}

impl From<&GameState> for GameStateDto {
    fn from(state: &GameState) -> Self {
        Self {
            phase: state.phase,
            round_id: state.current_round_id.clone(),
            question_id: state.current_question_id.clone(),
        }
    }
}

/// Result of a master command.
#[derive(Debug, Serialize, ToSchema)]
pub struct MasterCommandResponse {
    /// Game state after the command; absent when no game was ever started.
    pub state: Option<GameStateDto>,
    pub draft: Vec<PlayerScore>,
    /// Totals written when the command committed the draft.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committed: Option<Vec<PlayerScore>>,
    /// Draft discarded because the game was ended during moderation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forfeited: Option<Vec<PlayerScore>>,
}

impl From<MasterOutcome> for MasterCommandResponse {
    fn from(outcome: MasterOutcome) -> Self {
        Self {
            state: outcome.state.as_ref().map(GameStateDto::from),
            draft: (&outcome.draft).into(),
            committed: outcome
                .committed
                .as_ref()
                .map(|totals| to_scores(totals.iter().map(|(name, score)| (name.as_str(), *score)))),
            forfeited: outcome
                .forfeited
                .as_ref()
                .filter(|draft| !draft.is_empty())
                .map(Vec::from),
        }
    }
}

/// Edit one player's draft score: either a relative `delta` or an absolute `value`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DraftScoreRequest {
    pub delta: Option<i64>,
    pub value: Option<i64>,
}

/// Draft edit reduced to the operation to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftEdit {
    Adjust(i64),
    Set(i64),
}

impl DraftScoreRequest {
    /// The requested edit; `None` unless exactly one field is set.
    pub fn edit(&self) -> Option<DraftEdit> {
        match (self.delta, self.value) {
            (Some(delta), None) => Some(DraftEdit::Adjust(delta)),
            (None, Some(value)) => Some(DraftEdit::Set(value)),
            _ => None,
        }
    }
}

impl Validate for DraftScoreRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.edit().is_none() {
            let mut err = ValidationError::new("draft_edit");
            err.message = Some("exactly one of `delta` or `value` must be provided".into());
            errors.add("delta", err);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Draft score after an edit.
#[derive(Debug, Serialize, ToSchema)]
pub struct DraftScoreResponse {
    pub player: String,
    pub score: u32,
}

/// One row of the master console.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerOverview {
    pub name: String,
    /// Committed total.
    pub score: u32,
    /// Current submission formatted for display.
    pub answer: String,
    pub has_answered: bool,
    /// Draft score while moderating.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<u32>,
}

/// Question the master is looking at, including its answer key.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuestionOverview {
    pub round_id: String,
    pub question_id: String,
    pub text: String,
    pub question_type: QuestionType,
    pub points: u32,
    pub answer: String,
}

/// Everything the master console shows.
#[derive(Debug, Serialize, ToSchema)]
pub struct MasterOverview {
    pub state: Option<GameStateDto>,
    /// Phase of a transition currently being written, if any.
    pub pending: Option<GamePhase>,
    /// Number of transitions applied by this instance.
    pub version: usize,
    pub question: Option<QuestionOverview>,
    pub players: Vec<PlayerOverview>,
}

impl MasterOverview {
    /// Assemble the overview from the machine snapshot and store contents.
    pub fn new(
        snapshot: &Snapshot,
        state: Option<&GameState>,
        question: Option<QuestionOverview>,
        players: Vec<PlayerOverview>,
    ) -> Self {
        Self {
            state: state.map(GameStateDto::from),
            pending: snapshot.pending,
            version: snapshot.version,
            question,
            players,
        }
    }
}
