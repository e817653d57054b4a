use axum::{Json, Router, extract::State, routing::get};

use crate::{
    error::AppError,
    services::{leaderboard::Leaderboard, presenter_service, slides::Slide},
    state::SharedState,
};

/// Read-only endpoints for the shared screen.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/presenter/slide", get(current_slide))
        .route("/leaderboard", get(leaderboard))
}

/// Slide currently on the shared screen.
#[utoipa::path(
    get,
    path = "/presenter/slide",
    tag = "presenter",
    responses((status = 200, description = "Current slide", body = Slide))
)]
pub async fn current_slide(State(state): State<SharedState>) -> Json<Slide> {
    Json(presenter_service::current_slide(&state))
}

/// Players ranked by committed score.
#[utoipa::path(
    get,
    path = "/leaderboard",
    tag = "presenter",
    responses(
        (status = 200, description = "Current standings", body = Leaderboard),
        (status = 503, description = "Store unavailable")
    )
)]
pub async fn leaderboard(State(state): State<SharedState>) -> Result<Json<Leaderboard>, AppError> {
    Ok(Json(presenter_service::leaderboard(&state).await?))
}
