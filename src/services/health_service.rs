use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the store and summarize sync progress.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let Some(store) = state.store().await else {
        return HealthResponse::degraded();
    };

    let reachable = match store.health_check().await {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "store health probe failed");
            false
        }
    };

    if state.is_degraded() {
        return HealthResponse::degraded();
    }
    HealthResponse::from_snapshot(&state.sync().current(), reachable)
}
