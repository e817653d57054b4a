use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the shared store and report how many SSE clients are attached.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let clients = state.presenter_sse().receiver_count() + state.master_sse().receiver_count();
    match state.store().health_check().await {
        Ok(()) => HealthResponse::ok(clients),
        Err(err) => {
            warn!(error = %err, "store health check failed");
            HealthResponse::degraded(clients)
        }
    }
}
