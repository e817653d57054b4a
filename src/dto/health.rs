use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Number of clients connected to the presenter and master streams.
    pub sse_clients: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(sse_clients: usize) -> Self {
        Self {
            status: "ok".to_string(),
            sse_clients,
        }
    }

    /// Create a health response indicating the store is unreachable.
    pub fn degraded(sse_clients: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            sse_clients,
        }
    }
}
