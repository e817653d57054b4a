use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Trivia Live Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::presenter_stream,
        crate::routes::sse::master_stream,
        crate::routes::master::start_game,
        crate::routes::master::advance,
        crate::routes::master::reveal,
        crate::routes::master::end_game,
        crate::routes::master::edit_draft,
        crate::routes::master::overview,
        crate::routes::player::join,
        crate::routes::player::submit_answer,
        crate::routes::player::view,
        crate::routes::player::view_stream,
        crate::routes::presenter::current_slide,
        crate::routes::presenter::leaderboard,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::PhaseChangedEvent,
            crate::dto::sse::DraftUpdatedEvent,
            crate::dto::sse::PlayersUpdatedEvent,
            crate::dto::master::MasterCommandResponse,
            crate::dto::master::DraftScoreRequest,
            crate::dto::master::DraftScoreResponse,
            crate::dto::master::MasterOverview,
            crate::dto::player::JoinRequest,
            crate::dto::player::JoinResponse,
            crate::dto::player::AnswerRequest,
            crate::state::player::PlayerView,
            crate::state::state_machine::GamePhase,
            crate::services::slides::Slide,
            crate::services::leaderboard::Leaderboard,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "master", description = "Game master commands and moderation"),
        (name = "player", description = "Joining, answering and player views"),
        (name = "presenter", description = "Shared screen slides and standings"),
    )
)]
pub struct ApiDoc;
