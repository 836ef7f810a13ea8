use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Lifecycle status of a game session.
///
/// The only forward path is `Waiting -> Playing -> (Paused <-> Playing) -> Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Room is open and waiting for a second player / readiness.
    Waiting,
    /// Players are taking turns.
    Playing,
    /// Gameplay is suspended, either manually or because a player dropped.
    Paused,
    /// Terminal state; the session is read-only from here on.
    Finished,
}

impl SessionStatus {
    /// Statuses that still occupy their room code.
    pub const ACTIVE: [SessionStatus; 3] = [
        SessionStatus::Waiting,
        SessionStatus::Playing,
        SessionStatus::Paused,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Finished)
    }

    /// Stable wire name, as stored in documents.
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Waiting => "waiting",
            SessionStatus::Playing => "playing",
            SessionStatus::Paused => "paused",
            SessionStatus::Finished => "finished",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events that move a session along its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Host starts the game once both players are ready.
    Start,
    /// A player pauses, or a disconnect is detected.
    Pause,
    /// Gameplay resumes after a pause.
    Resume,
    /// Game ends: win, draw, forfeit or administrative finalisation.
    Finish,
}

/// Error returned when an event cannot be applied from the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while {from}")]
pub struct InvalidTransition {
    /// Status the session was in when the event was received.
    pub from: SessionStatus,
    /// The rejected event.
    pub event: SessionEvent,
}

/// Compute the status reached by applying `event` from `from`.
pub fn next_status(
    from: SessionStatus,
    event: SessionEvent,
) -> Result<SessionStatus, InvalidTransition> {
    let next = match (from, event) {
        (SessionStatus::Waiting, SessionEvent::Start) => SessionStatus::Playing,
        (SessionStatus::Playing, SessionEvent::Pause) => SessionStatus::Paused,
        (SessionStatus::Paused, SessionEvent::Resume) => SessionStatus::Playing,
        (SessionStatus::Playing | SessionStatus::Paused, SessionEvent::Finish) => {
            SessionStatus::Finished
        }
        (from, event) => return Err(InvalidTransition { from, event }),
    };

    Ok(next)
}
