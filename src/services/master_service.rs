//! Master console operations: game commands, draft edits and the overview.

use indexmap::IndexMap;
use tracing::debug;

use crate::{
    dto::master::{
        DraftEdit, DraftScoreResponse, MasterCommandResponse, MasterOverview, PlayerOverview,
        QuestionOverview,
    },
    error::ServiceError,
    services::sse_events,
    state::{
        SharedState,
        game::{GameState, PlayerRecord},
        master::MasterOutcome,
        moderation::ModerationDraft,
        quiz::QuizContent,
        state_machine::GamePhase,
    },
};

/// Reset the game to the lobby and remove every player.
pub async fn start_game(state: &SharedState) -> Result<MasterCommandResponse, ServiceError> {
    let outcome = state.master().start().await?;
    state.players().clear();
    Ok(finish_command(state, outcome))
}

/// Move the game forward one step.
pub async fn advance(state: &SharedState) -> Result<MasterCommandResponse, ServiceError> {
    let outcome = state.master().advance().await?;
    Ok(finish_command(state, outcome))
}

/// Close the open question and grade every answer.
pub async fn reveal(state: &SharedState) -> Result<MasterCommandResponse, ServiceError> {
    let outcome = state.master().reveal().await?;
    Ok(finish_command(state, outcome))
}

/// Force the game to end.
pub async fn end_game(state: &SharedState) -> Result<MasterCommandResponse, ServiceError> {
    let outcome = state.master().end().await?;
    Ok(finish_command(state, outcome))
}

/// Apply a draft edit for `player`.
pub async fn edit_draft(
    state: &SharedState,
    player: &str,
    edit: DraftEdit,
) -> Result<DraftScoreResponse, ServiceError> {
    let score = match edit {
        DraftEdit::Adjust(delta) => state.master().adjust_draft_score(player, delta).await?,
        DraftEdit::Set(value) => state.master().set_draft_score(player, value).await?,
    };
    sse_events::broadcast_draft_updated(state, &state.master().draft().await);
    Ok(DraftScoreResponse {
        player: player.to_string(),
        score,
    })
}

/// Build the master console overview from the store.
pub async fn overview(state: &SharedState) -> Result<MasterOverview, ServiceError> {
    let master = state.master();
    let repo = master.repository();
    let game_state = repo.game_state().await?;
    let players = repo.players().await?;
    let quiz = match master.quiz().await {
        Ok(quiz) => Some(quiz),
        Err(err) => {
            debug!(error = %err, "overview without quiz content");
            None
        }
    };
    let draft = master.draft().await;

    let question = game_state
        .as_ref()
        .zip(quiz.as_deref())
        .and_then(|(game_state, quiz)| question_overview(game_state, quiz));
    let rows = player_rows(game_state.as_ref(), quiz.as_deref(), &players, &draft);
    Ok(MasterOverview::new(
        &master.snapshot().await,
        game_state.as_ref(),
        question,
        rows,
    ))
}

/// Rows of the player table for a given position.
pub fn player_rows(
    game_state: Option<&GameState>,
    quiz: Option<&QuizContent>,
    players: &IndexMap<String, PlayerRecord>,
    draft: &ModerationDraft,
) -> Vec<PlayerOverview> {
    let question = game_state
        .zip(quiz)
        .and_then(|(game_state, quiz)| quiz.current_question(game_state));
    let moderating = game_state.map(|s| s.phase) == Some(GamePhase::Moderating);

    players
        .iter()
        .map(|(name, record)| PlayerOverview {
            name: name.clone(),
            score: record.score,
            answer: match question {
                Some(question) => question.submission_display(&record.answer),
                None => record.answer.string_form().unwrap_or_default(),
            },
            has_answered: !record.answer.is_empty(),
            draft: if moderating { draft.get(name) } else { None },
        })
        .collect()
}

fn question_overview(game_state: &GameState, quiz: &QuizContent) -> Option<QuestionOverview> {
    let (round_id, question_id) = game_state.position()?;
    let question = quiz.question(round_id, question_id)?;
    Some(QuestionOverview {
        round_id: round_id.to_string(),
        question_id: question_id.to_string(),
        text: question.text.clone(),
        question_type: question.question_type(),
        points: question.points,
        answer: question.answer_display(),
    })
}

fn finish_command(state: &SharedState, outcome: MasterOutcome) -> MasterCommandResponse {
    sse_events::broadcast_draft_updated(state, &outcome.draft);
    outcome.into()
}
