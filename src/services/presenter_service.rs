use tracing::error;

use crate::{
    error::ServiceError,
    services::{
        leaderboard::{self, Leaderboard},
        sse_events,
        slides::Slide,
    },
    state::SharedState,
};

/// Slide currently shown on the shared screen.
pub fn current_slide(state: &SharedState) -> Slide {
    state.presenter().current()
}

/// Standings read straight from the store.
pub async fn leaderboard(state: &SharedState) -> Result<Leaderboard, ServiceError> {
    leaderboard::current(state.master().repository()).await
}

/// Run the presenter projection, broadcasting each new slide to the presenter stream.
pub async fn run_projection(state: SharedState) {
    let projection = state.presenter().clone();
    let feed = state.clone();
    if let Err(err) = projection
        .run(move |slide| sse_events::broadcast_slide(&feed, slide))
        .await
    {
        error!(error = %err, "presenter projection failed");
    }
}
