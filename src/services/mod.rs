/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Finished-game history and per-player statistics.
pub mod history;
/// Room creation, joining, readiness, start and leave.
pub mod matchmaking;
/// Pause, resume and abandoned-game cleanup.
pub mod presence;
/// Server-Sent Events streams of session updates.
pub mod sse_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
/// Move validation and turn hand-off.
pub mod turn_coordinator;
