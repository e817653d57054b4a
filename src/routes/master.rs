use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::master::{DraftScoreRequest, DraftScoreResponse, MasterCommandResponse, MasterOverview},
    error::AppError,
    services::master_service,
    state::SharedState,
};

/// Master console endpoints driving the game.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/master/start", post(start_game))
        .route("/master/advance", post(advance))
        .route("/master/reveal", post(reveal))
        .route("/master/end", post(end_game))
        .route("/master/draft/{player}", post(edit_draft))
        .route("/master/overview", get(overview))
}

/// Reset the game to the lobby, removing every player.
#[utoipa::path(
    post,
    path = "/master/start",
    tag = "master",
    responses(
        (status = 200, description = "Game reset", body = MasterCommandResponse),
        (status = 404, description = "No active quiz"),
        (status = 503, description = "Store unavailable")
    )
)]
pub async fn start_game(
    State(state): State<SharedState>,
) -> Result<Json<MasterCommandResponse>, AppError> {
    Ok(Json(master_service::start_game(&state).await?))
}

/// Open the next round or question, committing draft scores when moderating.
#[utoipa::path(
    post,
    path = "/master/advance",
    tag = "master",
    responses(
        (status = 200, description = "Game advanced", body = MasterCommandResponse),
        (status = 409, description = "Cannot advance from the current phase")
    )
)]
pub async fn advance(
    State(state): State<SharedState>,
) -> Result<Json<MasterCommandResponse>, AppError> {
    Ok(Json(master_service::advance(&state).await?))
}

/// Close the open question and grade the answers.
#[utoipa::path(
    post,
    path = "/master/reveal",
    tag = "master",
    responses(
        (status = 200, description = "Answers graded", body = MasterCommandResponse),
        (status = 409, description = "No question is open")
    )
)]
pub async fn reveal(
    State(state): State<SharedState>,
) -> Result<Json<MasterCommandResponse>, AppError> {
    Ok(Json(master_service::reveal(&state).await?))
}

/// End the game immediately.
#[utoipa::path(
    post,
    path = "/master/end",
    tag = "master",
    responses(
        (status = 200, description = "Game ended", body = MasterCommandResponse),
        (status = 409, description = "Game cannot be ended from the current phase")
    )
)]
pub async fn end_game(
    State(state): State<SharedState>,
) -> Result<Json<MasterCommandResponse>, AppError> {
    Ok(Json(master_service::end_game(&state).await?))
}

/// Adjust or overwrite one player's draft score.
#[utoipa::path(
    post,
    path = "/master/draft/{player}",
    tag = "master",
    params(("player" = String, Path, description = "Name of the player")),
    request_body = DraftScoreRequest,
    responses(
        (status = 200, description = "Draft updated", body = DraftScoreResponse),
        (status = 400, description = "Neither or both of delta and value were given"),
        (status = 404, description = "Unknown player"),
        (status = 409, description = "Not moderating")
    )
)]
pub async fn edit_draft(
    State(state): State<SharedState>,
    Path(player): Path<String>,
    Valid(Json(payload)): Valid<Json<DraftScoreRequest>>,
) -> Result<Json<DraftScoreResponse>, AppError> {
    let edit = payload
        .edit()
        .ok_or_else(|| AppError::BadRequest("exactly one of `delta` or `value` is required".into()))?;
    Ok(Json(master_service::edit_draft(&state, &player, edit).await?))
}

/// Current game position, question with its answer and the player table.
#[utoipa::path(
    get,
    path = "/master/overview",
    tag = "master",
    responses((status = 200, description = "Master overview", body = MasterOverview))
)]
pub async fn overview(State(state): State<SharedState>) -> Result<Json<MasterOverview>, AppError> {
    Ok(Json(master_service::overview(&state).await?))
}
