use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug)]
/// Named payload written to an SSE stream.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Serialise `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// First event sent to a client subscribing to a session stream.
pub struct Handshake {
    pub session_id: Uuid,
    /// Whether the backend is currently running without a working store.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Sent when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}
