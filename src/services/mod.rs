/// OpenAPI documentation generation.
pub mod documentation;
/// Answer grading.
pub mod grading;
/// Health check service.
pub mod health_service;
/// Player standings.
pub mod leaderboard;
/// Master console commands and overview.
pub mod master_service;
/// Player join, answer and view operations.
pub mod player_service;
/// Presenter slide and leaderboard access.
pub mod presenter_service;
/// Slide derivation for the shared screen.
pub mod slides;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
