use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{HistoryEntryEntity, PlayerStatsEntity},
    dto::format_system_time,
    state::session::{GameKind, WinReason},
};

/// One finished game in a player's history.
#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryEntryView {
    pub session_id: Uuid,
    pub kind: GameKind,
    pub participants: Vec<String>,
    pub winner_id: Option<String>,
    pub loser_id: Option<String>,
    pub is_draw: bool,
    pub move_count: u32,
    pub duration_secs: Option<u64>,
    pub reason: WinReason,
    pub forfeited: bool,
    pub completed_at: String,
}

impl From<HistoryEntryEntity> for HistoryEntryView {
    fn from(value: HistoryEntryEntity) -> Self {
        Self {
            session_id: value.session_id,
            kind: value.kind,
            participants: value.participants,
            winner_id: value.winner_id,
            loser_id: value.loser_id,
            is_draw: value.is_draw,
            move_count: value.move_count,
            duration_secs: value.duration_secs,
            reason: value.reason,
            forfeited: value.forfeited,
            completed_at: format_system_time(value.completed_at),
        }
    }
}

/// Aggregated results of a player for one game kind.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerStatsView {
    pub player_id: String,
    pub kind: GameKind,
    pub games_played: u32,
    pub games_won: u32,
    pub games_lost: u32,
    pub games_drawn: u32,
    /// Share of played games that were won, between 0 and 1.
    pub win_rate: f64,
    pub moves_made: u32,
    pub tiles_drawn: u32,
    pub fastest_win_secs: Option<u64>,
    pub average_duration_secs: f64,
    pub current_win_streak: u32,
    pub best_win_streak: u32,
    pub last_played_at: Option<String>,
}

impl From<PlayerStatsEntity> for PlayerStatsView {
    fn from(value: PlayerStatsEntity) -> Self {
        let win_rate = if value.games_played == 0 {
            0.0
        } else {
            f64::from(value.games_won) / f64::from(value.games_played)
        };

        Self {
            player_id: value.player_id,
            kind: value.kind,
            games_played: value.games_played,
            games_won: value.games_won,
            games_lost: value.games_lost,
            games_drawn: value.games_drawn,
            win_rate,
            moves_made: value.moves_made,
            tiles_drawn: value.tiles_drawn,
            fastest_win_secs: value.fastest_win_secs,
            average_duration_secs: value.average_duration_secs,
            current_win_streak: value.current_win_streak,
            best_win_streak: value.best_win_streak,
            last_played_at: value.last_played_at.map(format_system_time),
        }
    }
}
