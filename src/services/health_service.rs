use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Ping the storage backend and report whether the service runs degraded.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let Some(store) = state.game_store().await else {
        warn!("no storage backend installed (degraded mode)");
        return HealthResponse::new(true, "none");
    };

    if let Err(err) = store.health_check().await {
        warn!(backend = store.backend(), error = %err, "storage health check failed");
        return HealthResponse::new(true, store.backend());
    }

    HealthResponse::new(state.is_degraded(), store.backend())
}
