use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::MongoDaoError;
use crate::{
    dao::models::{GameEntity, HistoryEntryEntity, PlayerStatsEntity},
    state::{
        lifecycle::SessionStatus,
        session::{Board, GameKind, MoveRecord, PauseReason, Player, WinReason},
    },
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGameDocument {
    #[serde(rename = "_id")]
    id: String,
    revision: i64,
    room_code: String,
    kind: GameKind,
    host_id: String,
    players: Vec<Player>,
    #[serde(default)]
    departed: Option<Player>,
    status: SessionStatus,
    board: Board,
    current_player_id: Option<String>,
    winner_id: Option<String>,
    win_reason: Option<WinReason>,
    moves: Vec<MoveRecord>,
    created_at: DateTime,
    started_at: Option<DateTime>,
    completed_at: Option<DateTime>,
    updated_at: DateTime,
    paused_at: Option<DateTime>,
    paused_by: Option<String>,
    pause_reason: Option<PauseReason>,
    resume_player_id: Option<String>,
}

impl From<GameEntity> for MongoGameDocument {
    fn from(value: GameEntity) -> Self {
        Self {
            id: value.id.to_string(),
            revision: to_bson_int(value.revision),
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
            created_at: DateTime::from_system_time(value.created_at),
            started_at: value.started_at.map(DateTime::from_system_time),
            completed_at: value.completed_at.map(DateTime::from_system_time),
            updated_at: DateTime::from_system_time(value.updated_at),
            paused_at: value.paused_at.map(DateTime::from_system_time),
            paused_by: value.paused_by,
            pause_reason: value.pause_reason,
            resume_player_id: value.resume_player_id,
        }
    }
}

impl TryFrom<MongoGameDocument> for GameEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoGameDocument) -> Result<Self, Self::Error> {
        let id = parse_id(&value.id)?;
        let revision = u64::try_from(value.revision).map_err(|_| MongoDaoError::Malformed {
            id: value.id.clone(),
            message: format!("negative revision {}", value.revision),
        })?;

        Ok(Self {
            id,
            revision,
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
            created_at: value.created_at.to_system_time(),
            started_at: value.started_at.map(DateTime::to_system_time),
            completed_at: value.completed_at.map(DateTime::to_system_time),
            updated_at: value.updated_at.to_system_time(),
            paused_at: value.paused_at.map(DateTime::to_system_time),
            paused_by: value.paused_by,
            pause_reason: value.pause_reason,
            resume_player_id: value.resume_player_id,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoHistoryDocument {
    #[serde(rename = "_id")]
    session_id: String,
    kind: GameKind,
    participants: Vec<String>,
    winner_id: Option<String>,
    loser_id: Option<String>,
    is_draw: bool,
    move_count: u32,
    duration_secs: Option<i64>,
    reason: WinReason,
    forfeited: bool,
    completed_at: DateTime,
}

impl From<HistoryEntryEntity> for MongoHistoryDocument {
    fn from(value: HistoryEntryEntity) -> Self {
        Self {
            session_id: value.session_id.to_string(),
            kind: value.kind,
            participants: value.participants,
            winner_id: value.winner_id,
            loser_id: value.loser_id,
            is_draw: value.is_draw,
            move_count: value.move_count,
            duration_secs: value.duration_secs.map(to_bson_int),
            reason: value.reason,
            forfeited: value.forfeited,
            completed_at: DateTime::from_system_time(value.completed_at),
        }
    }
}

impl TryFrom<MongoHistoryDocument> for HistoryEntryEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoHistoryDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            session_id: parse_id(&value.session_id)?,
            kind: value.kind,
            participants: value.participants,
            winner_id: value.winner_id,
            loser_id: value.loser_id,
            is_draw: value.is_draw,
            move_count: value.move_count,
            duration_secs: value.duration_secs.and_then(|secs| u64::try_from(secs).ok()),
            reason: value.reason,
            forfeited: value.forfeited,
            completed_at: value.completed_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoStatsDocument {
    #[serde(rename = "_id")]
    key: String,
    player_id: String,
    kind: GameKind,
    games_played: u32,
    games_won: u32,
    games_lost: u32,
    games_drawn: u32,
    moves_made: u32,
    tiles_drawn: u32,
    fastest_win_secs: Option<i64>,
    average_duration_secs: f64,
    current_win_streak: u32,
    best_win_streak: u32,
    last_played_at: Option<DateTime>,
}

impl From<PlayerStatsEntity> for MongoStatsDocument {
    fn from(value: PlayerStatsEntity) -> Self {
        Self {
            key: value.key(),
            player_id: value.player_id,
            kind: value.kind,
            games_played: value.games_played,
            games_won: value.games_won,
            games_lost: value.games_lost,
            games_drawn: value.games_drawn,
            moves_made: value.moves_made,
            tiles_drawn: value.tiles_drawn,
            fastest_win_secs: value.fastest_win_secs.map(to_bson_int),
            average_duration_secs: value.average_duration_secs,
            current_win_streak: value.current_win_streak,
            best_win_streak: value.best_win_streak,
            last_played_at: value.last_played_at.map(DateTime::from_system_time),
        }
    }
}

impl From<MongoStatsDocument> for PlayerStatsEntity {
    fn from(value: MongoStatsDocument) -> Self {
        Self {
            player_id: value.player_id,
            kind: value.kind,
            games_played: value.games_played,
            games_won: value.games_won,
            games_lost: value.games_lost,
            games_drawn: value.games_drawn,
            moves_made: value.moves_made,
            tiles_drawn: value.tiles_drawn,
            fastest_win_secs: value
                .fastest_win_secs
                .and_then(|secs| u64::try_from(secs).ok()),
            average_duration_secs: value.average_duration_secs,
            current_win_streak: value.current_win_streak,
            best_win_streak: value.best_win_streak,
            last_played_at: value.last_played_at.map(DateTime::to_system_time),
        }
    }
}

/// BSON has no unsigned 64-bit integer; values past `i64::MAX` saturate.
fn to_bson_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn parse_id(raw: &str) -> Result<Uuid, MongoDaoError> {
    Uuid::parse_str(raw).map_err(|err| MongoDaoError::Malformed {
        id: raw.to_owned(),
        message: err.to_string(),
    })
}

pub fn doc_id(id: impl ToString) -> Document {
    doc! {"_id": id.to_string()}
}

/// Filter matching `id` only while its stored revision equals `revision`.
pub fn doc_id_at_revision(id: Uuid, revision: u64) -> Document {
    doc! {"_id": id.to_string(), "revision": to_bson_int(revision)}
}
