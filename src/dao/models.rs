use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::state::{
    lifecycle::SessionStatus,
    session::{
        Board, GameKind, GameSession, MoveRecord, PauseInfo, PauseReason, Player, WinReason,
    },
};

/// Session document persisted by the storage layer.
///
/// Pause metadata is flattened so backends can filter on `status` and `paused_at` directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEntity {
    /// Primary key of the session.
    pub id: Uuid,
    /// Incremented on every committed write; used for optimistic concurrency.
    pub revision: u64,
    pub room_code: String,
    pub kind: GameKind,
    pub host_id: String,
    pub players: Vec<Player>,
    #[serde(default)]
    pub departed: Option<Player>,
    pub status: SessionStatus,
    pub board: Board,
    pub current_player_id: Option<String>,
    pub winner_id: Option<String>,
    pub win_reason: Option<WinReason>,
    /// Append-only placement log.
    pub moves: Vec<MoveRecord>,
    pub created_at: SystemTime,
    pub started_at: Option<SystemTime>,
    pub completed_at: Option<SystemTime>,
    pub updated_at: SystemTime,
    pub paused_at: Option<SystemTime>,
    pub paused_by: Option<String>,
    pub pause_reason: Option<PauseReason>,
    pub resume_player_id: Option<String>,
}

impl From<GameSession> for GameEntity {
    fn from(value: GameSession) -> Self {
        let (paused_at, paused_by, pause_reason, resume_player_id) = match value.pause {
            Some(pause) => (
                Some(pause.paused_at),
                Some(pause.paused_by),
                Some(pause.reason),
                pause.resume_player_id,
            ),
            None => (None, None, None, None),
        };

        Self {
            id: value.id,
            revision: value.revision,
            room_code: value.room_code,
            kind: value.kind,
            host_id: value.host_id,
            players: value.players,
            departed: value.departed,
            status: value.status,
            board: value.board,
            current_player_id: value.current_player_id,
            winner_id: value.winner_id,
            win_reason: value.win_reason,
            moves: value.moves,
            created_at: value.created_at,
            started_at: value.started_at,
            completed_at: value.completed_at,
            updated_at: value.updated_at,
            paused_at,
            paused_by,
            pause_reason,
            resume_player_id,
        }
    }
}

impl From<GameEntity> for GameSession {
    fn from(value: GameEntity) -> Self {
        let pause = match (value.paused_at, value.paused_by, value.pause_reason) {
            (Some(paused_at), Some(paused_by), Some(reason)) => Some(PauseInfo {
                paused_at,
                paused_by,
                reason,
                resume_player_id: value.resume_player_id,
            }),
            _ => None,
        };

        Self {
            id: value.id,
            revision: value.revision,
            room_code: value.room_code,
            kind: value.kind,
            host_id: value.host_id,
            players: value.players,
            departed: value.departed,
            status: value.status,
            board: value.board,
            current_player_id: value.current_player_id,
            winner_id: value.winner_id,
            win_reason: value.win_reason,
            moves: value.moves,
            created_at: value.created_at,
            started_at: value.started_at,
            completed_at: value.completed_at,
            updated_at: value.updated_at,
            pause,
        }
    }
}

/// Immutable record of one finished session, keyed by the session id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntryEntity {
    pub session_id: Uuid,
    pub kind: GameKind,
    /// Ids of everyone who played, including a player who forfeited by leaving.
    pub participants: Vec<String>,
    pub winner_id: Option<String>,
    pub loser_id: Option<String>,
    pub is_draw: bool,
    pub move_count: u32,
    /// `None` when the session never recorded a start time.
    pub duration_secs: Option<u64>,
    pub reason: WinReason,
    pub forfeited: bool,
    pub completed_at: SystemTime,
}

/// Running aggregates of one player for one game kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerStatsEntity {
    pub player_id: String,
    pub kind: GameKind,
    pub games_played: u32,
    pub games_won: u32,
    pub games_lost: u32,
    pub games_drawn: u32,
    /// Placements made across all recorded games.
    pub moves_made: u32,
    /// Dominoes tiles taken from the draw pile.
    pub tiles_drawn: u32,
    pub fastest_win_secs: Option<u64>,
    pub average_duration_secs: f64,
    pub current_win_streak: u32,
    pub best_win_streak: u32,
    pub last_played_at: Option<SystemTime>,
}

impl PlayerStatsEntity {
    /// Zeroed aggregates for a player without any recorded game.
    pub fn empty(player_id: impl Into<String>, kind: GameKind) -> Self {
        Self {
            player_id: player_id.into(),
            kind,
            games_played: 0,
            games_won: 0,
            games_lost: 0,
            games_drawn: 0,
            moves_made: 0,
            tiles_drawn: 0,
            fastest_win_secs: None,
            average_duration_secs: 0.0,
            current_win_streak: 0,
            best_win_streak: 0,
            last_played_at: None,
        }
    }

    /// Document key shared by the backends.
    pub fn key(&self) -> String {
        stats_key(&self.player_id, self.kind)
    }
}

/// Composite key of a stats document.
pub fn stats_key(player_id: &str, kind: GameKind) -> String {
    format!("{player_id}:{kind}")
}
