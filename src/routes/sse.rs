use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{
    services::sse_service::{self, StreamKind},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sse/presenter",
    tag = "sse",
    responses((status = 200, description = "Presenter slide stream", content_type = "text/event-stream", body = String))
)]
/// Stream slide changes to the shared screen, starting with the current slide.
pub async fn presenter_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let (initial, receiver) = sse_service::subscribe_presenter(&state);
    info!("New presenter SSE connection");
    sse_service::to_sse_stream(initial, receiver, StreamKind::Presenter)
}

#[utoipa::path(
    get,
    path = "/sse/master",
    tag = "sse",
    responses((status = 200, description = "Master console stream", content_type = "text/event-stream", body = String))
)]
/// Stream game state, player and draft changes to the master console.
pub async fn master_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let (initial, receiver) = sse_service::subscribe_master(&state);
    info!("New master SSE connection");
    sse_service::to_sse_stream(initial, receiver, StreamKind::Master)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sse/presenter", get(presenter_stream))
        .route("/sse/master", get(master_stream))
}
