use indexmap::IndexMap;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    dao::live_game::{decode_game_state, decode_players},
    dto::{
        master::GameStateDto,
        sse::{DraftUpdatedEvent, PhaseChangedEvent, PlayersUpdatedEvent, ServerEvent},
    },
    error::ServiceError,
    services::{master_service, slides::Slide},
    state::{SharedState, SseHub, game::GameState, moderation::ModerationDraft},
};

/// Game state changed (master stream).
pub const EVENT_PHASE_CHANGED: &str = "phase_changed";
/// Draft scores changed (master stream).
pub const EVENT_DRAFT_UPDATED: &str = "draft_updated";
/// Player roster, answers or totals changed (master stream).
pub const EVENT_PLAYERS_UPDATED: &str = "players_updated";
/// New presenter slide.
pub const EVENT_SLIDE: &str = "slide";
/// New player view.
pub const EVENT_VIEW: &str = "view";

/// Broadcast a new presenter slide.
pub fn broadcast_slide(state: &SharedState, slide: &Slide) {
    send_event(state.presenter_sse(), EVENT_SLIDE, slide);
}

/// Broadcast the draft scores to the master console.
pub fn broadcast_draft_updated(state: &SharedState, draft: &ModerationDraft) {
    let payload = DraftUpdatedEvent {
        draft: draft.into(),
    };
    send_event(state.master_sse(), EVENT_DRAFT_UPDATED, &payload);
}

/// Broadcast a game state change to the master console.
pub fn broadcast_phase_changed(state: &SharedState, game_state: Option<&GameState>) {
    let payload = PhaseChangedEvent(game_state.map(GameStateDto::from));
    send_event(state.master_sse(), EVENT_PHASE_CHANGED, &payload);
}

/// Mirror game state and player changes from the store onto the master stream
/// until the store subscriptions close.
pub async fn run_master_feed(state: SharedState) -> Result<(), ServiceError> {
    let repo = state.master().repository().clone();
    let mut states = repo.subscribe_game_state().await?;
    let mut players = repo.subscribe_players().await?;
    let mut game_state: Option<GameState> = None;
    let mut roster = IndexMap::new();

    info!("master feed started");
    loop {
        tokio::select! {
            snapshot = states.recv() => {
                let Some(snapshot) = snapshot else { break };
                game_state = decode_game_state(&snapshot);
                broadcast_phase_changed(&state, game_state.as_ref());
            }
            snapshot = players.recv() => {
                let Some(snapshot) = snapshot else { break };
                roster = decode_players(&snapshot);
            }
        }

        let quiz = state.master().quiz().await.ok();
        let draft = state.master().draft().await;
        let payload = PlayersUpdatedEvent {
            players: master_service::player_rows(
                game_state.as_ref(),
                quiz.as_deref(),
                &roster,
                &draft,
            ),
        };
        send_event(state.master_sse(), EVENT_PLAYERS_UPDATED, &payload);
    }

    info!("master feed stopped");
    Ok(())
}

fn send_event(hub: &SseHub, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => hub.broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize SSE payload"),
    }
}
