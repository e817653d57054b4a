use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::{get, post},
};
use axum_valid::Valid;
use futures::Stream;

use crate::{
    dto::player::{AnswerRequest, JoinRequest, JoinResponse},
    error::AppError,
    services::{player_service, sse_service},
    state::{SharedState, player::PlayerView},
};

/// Player endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/players", post(join))
        .route("/players/{name}/answer", post(submit_answer))
        .route("/players/{name}/view", get(view))
        .route("/sse/players/{name}", get(view_stream))
}

/// Join the live game, or re-attach to an existing player record.
#[utoipa::path(
    post,
    path = "/players",
    tag = "player",
    request_body = JoinRequest,
    responses(
        (status = 200, description = "Player joined", body = JoinResponse),
        (status = 400, description = "Invalid player name")
    )
)]
pub async fn join(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<JoinRequest>>,
) -> Result<Json<JoinResponse>, AppError> {
    Ok(Json(player_service::join(&state, &payload.name).await?))
}

/// Submit the answer for the open question.
#[utoipa::path(
    post,
    path = "/players/{name}/answer",
    tag = "player",
    params(("name" = String, Path, description = "Name the player joined with")),
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Answer recorded", body = PlayerView),
        (status = 400, description = "Answer does not fit the question"),
        (status = 404, description = "Unknown player"),
        (status = 409, description = "No question open or already answered")
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<PlayerView>, AppError> {
    Ok(Json(
        player_service::submit_answer(&state, &name, payload.answer).await?,
    ))
}

/// What the player should currently see.
#[utoipa::path(
    get,
    path = "/players/{name}/view",
    tag = "player",
    params(("name" = String, Path, description = "Name the player joined with")),
    responses(
        (status = 200, description = "Current view", body = PlayerView),
        (status = 404, description = "Unknown player")
    )
)]
pub async fn view(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<Json<PlayerView>, AppError> {
    Ok(Json(player_service::view(&state, &name).await?))
}

/// Stream the player's view on every game state change.
#[utoipa::path(
    get,
    path = "/sse/players/{name}",
    tag = "sse",
    params(("name" = String, Path, description = "Name the player joined with")),
    responses(
        (status = 200, description = "Player view stream", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown player")
    )
)]
pub async fn view_stream(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let agent = player_service::agent(&state, &name).await?;
    tracing::info!(player = %name, "New player SSE connection");
    Ok(sse_service::player_view_stream(agent))
}
