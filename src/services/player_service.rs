//! Player operations: join, answer and view.

use std::sync::Arc;

use serde_json::Value;

use crate::{
    dto::player::JoinResponse,
    error::ServiceError,
    state::{
        SharedState,
        player::{PlayerAgent, PlayerView},
    },
};

/// Join (or re-join) the game. An agent already running for this name is reused.
pub async fn join(state: &SharedState, raw_name: &str) -> Result<JoinResponse, ServiceError> {
    let name = raw_name.trim();
    let agent = match state.players().get(name).map(|entry| entry.value().clone()) {
        Some(agent) => agent,
        None => {
            let agent = Arc::new(PlayerAgent::join(state.store(), raw_name).await?);
            state
                .players()
                .entry(agent.name().to_string())
                .or_insert(agent)
                .value()
                .clone()
        }
    };
    let view = agent.current_view().await?;
    Ok(JoinResponse {
        name: agent.name().to_string(),
        view,
    })
}

/// Agent for a player that joined earlier. A player whose record exists in
/// the store but who joined through another instance is re-attached.
pub async fn agent(state: &SharedState, name: &str) -> Result<Arc<PlayerAgent>, ServiceError> {
    if let Some(agent) = state.players().get(name) {
        return Ok(agent.value().clone());
    }
    if state.master().repository().player(name).await?.is_none() {
        return Err(ServiceError::NotFound(format!("player `{name}` has not joined")));
    }
    let agent = Arc::new(PlayerAgent::join(state.store(), name).await?);
    Ok(state
        .players()
        .entry(agent.name().to_string())
        .or_insert(agent)
        .value()
        .clone())
}

/// Submit an answer on behalf of `name`.
pub async fn submit_answer(
    state: &SharedState,
    name: &str,
    answer: Value,
) -> Result<PlayerView, ServiceError> {
    let agent = agent(state, name).await?;
    agent.submit_answer(answer).await?;
    agent.current_view().await
}

/// Current view of `name`.
pub async fn view(state: &SharedState, name: &str) -> Result<PlayerView, ServiceError> {
    agent(state, name).await?.current_view().await
}
