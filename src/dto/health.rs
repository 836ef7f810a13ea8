use serde::Serialize;
use utoipa::ToSchema;

/// Overall service condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Ok,
    /// No usable storage backend; game operations answer 503.
    Degraded,
}

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    /// Storage backend selected at startup.
    pub backend: String,
}

impl HealthResponse {
    pub fn new(degraded: bool, backend: impl Into<String>) -> Self {
        Self {
            status: if degraded {
                HealthStatus::Degraded
            } else {
                HealthStatus::Ok
            },
            backend: backend.into(),
        }
    }
}
