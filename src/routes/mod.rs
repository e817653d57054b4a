use axum::Router;

use crate::state::SharedState;

/// Swagger UI and the OpenAPI document.
pub mod docs;
/// Health probe.
pub mod health;
/// Master console commands.
pub mod master;
/// Player join, answers and views.
pub mod player;
/// Shared screen reads.
pub mod presenter;
/// Presenter and master event streams.
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(master::router())
        .merge(player::router())
        .merge(presenter::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
