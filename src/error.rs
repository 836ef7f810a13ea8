use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::{
    dao::storage::StorageError,
    engine::RuleViolation,
    state::lifecycle::{InvalidTransition, SessionStatus},
};

/// Errors that can occur in service layer operations.
///
/// Every message is meant to be shown to the player as is.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Session or room code does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The room exists but its game already started or finished.
    #[error("the game has already started")]
    AlreadyStarted,
    /// Both seats are taken.
    #[error("the room is full")]
    Full,
    /// The joining player already sits at this table.
    #[error("you already joined this game")]
    AlreadyJoined,
    /// Acting player does not hold the turn.
    #[error("it is not your turn")]
    NotYourTurn,
    /// Turn-taking operation while the session is not `playing`.
    #[error("{}", not_playing_message(*status))]
    GameNotPlaying { status: SessionStatus },
    /// The rules reject the move.
    #[error("invalid move: {0}")]
    InvalidMove(RuleViolation),
    /// Caller is not allowed to perform the operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// A required game resource ran out, such as the draw pile.
    #[error("unavailable: {0}")]
    Unavailable(String),
    /// Storage backend failed; surfaced unchanged after retries.
    #[error("storage error: {0}")]
    Storage(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

fn not_playing_message(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Waiting => "the game has not started yet",
        SessionStatus::Paused => "the game is paused",
        SessionStatus::Finished => "the game is already over",
        SessionStatus::Playing => "the game is in progress",
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Storage(err)
    }
}

impl From<RuleViolation> for ServiceError {
    fn from(err: RuleViolation) -> Self {
        match err {
            RuleViolation::DrawPileEmpty => ServiceError::Unavailable(err.to_string()),
            other => ServiceError::InvalidMove(other),
        }
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Well-formed request rejected by the game rules.
    #[error("rejected: {0}")]
    Rejected(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::AlreadyStarted
            | ServiceError::Full
            | ServiceError::AlreadyJoined
            | ServiceError::NotYourTurn
            | ServiceError::GameNotPlaying { .. }
            | ServiceError::Unavailable(_) => AppError::Conflict(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::InvalidMove(_) => AppError::Rejected(message),
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Storage(StorageError::Corrupted { .. }) => AppError::Internal(message),
            ServiceError::Storage(source) => AppError::ServiceUnavailable(source.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paused_sessions_get_a_dedicated_message() {
        let paused = ServiceError::GameNotPlaying {
            status: SessionStatus::Paused,
        };
        assert_eq!(paused.to_string(), "the game is paused");

        let waiting = ServiceError::GameNotPlaying {
            status: SessionStatus::Waiting,
        };
        assert_eq!(waiting.to_string(), "the game has not started yet");
    }

    #[test]
    fn empty_pile_is_reported_as_unavailable() {
        assert!(matches!(
            ServiceError::from(RuleViolation::DrawPileEmpty),
            ServiceError::Unavailable(_)
        ));
        assert!(matches!(
            ServiceError::from(RuleViolation::CellOccupied(3)),
            ServiceError::InvalidMove(RuleViolation::CellOccupied(3))
        ));
    }

    #[test]
    fn matchmaking_errors_map_to_conflict() {
        let response = AppError::from(ServiceError::Full).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = AppError::from(ServiceError::Unauthorized("host only".into())).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
