use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::dao::{
    game_store::couchdb::error::CouchDaoError,
    models::{GameEntity, HistoryEntryEntity, PlayerStatsEntity},
};

pub const GAME_PREFIX: &str = "game::";
pub const HISTORY_PREFIX: &str = "history::";
pub const STATS_PREFIX: &str = "stats::";

pub const GAME_TYPE: &str = "game";
pub const HISTORY_TYPE: &str = "history";

/// Body of a Mango `_find` response.
#[derive(Debug, Deserialize)]
pub struct FindResponse {
    pub docs: Vec<Value>,
    #[serde(default)]
    pub warning: Option<String>,
}

/// Body of a successful document write.
#[derive(Debug, Deserialize)]
pub struct WriteResponse {
    pub rev: String,
}

/// Session document. `paused_at_ms` duplicates the pause timestamp as a plain number so
/// Mango selectors can range over it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchGameDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub paused_at_ms: Option<u64>,
    #[serde(flatten)]
    pub game: GameEntity,
}

impl From<(GameEntity, Option<String>)> for CouchGameDocument {
    fn from((game, rev): (GameEntity, Option<String>)) -> Self {
        Self {
            id: game_doc_id(game.id),
            rev,
            doc_type: GAME_TYPE.to_owned(),
            paused_at_ms: game.paused_at.map(epoch_millis),
            game,
        }
    }
}

impl TryFrom<CouchGameDocument> for GameEntity {
    type Error = CouchDaoError;

    fn try_from(doc: CouchGameDocument) -> Result<Self, Self::Error> {
        let id = extract_uuid(&doc.id)?;
        if id != doc.game.id {
            return Err(CouchDaoError::InvalidDocId {
                doc_id: doc.id,
                kind: "identifier does not match the session body",
            });
        }
        Ok(doc.game)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchHistoryDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub completed_at_ms: u64,
    #[serde(flatten)]
    pub entry: HistoryEntryEntity,
}

impl From<HistoryEntryEntity> for CouchHistoryDocument {
    fn from(entry: HistoryEntryEntity) -> Self {
        Self {
            id: history_doc_id(entry.session_id),
            rev: None,
            doc_type: HISTORY_TYPE.to_owned(),
            completed_at_ms: epoch_millis(entry.completed_at),
            entry,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchStatsDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub stats: PlayerStatsEntity,
}

impl From<(PlayerStatsEntity, Option<String>)> for CouchStatsDocument {
    fn from((stats, rev): (PlayerStatsEntity, Option<String>)) -> Self {
        Self {
            id: stats_doc_id(&stats.key()),
            rev,
            stats,
        }
    }
}

pub fn game_doc_id(id: Uuid) -> String {
    format!("{GAME_PREFIX}{id}")
}

pub fn history_doc_id(id: Uuid) -> String {
    format!("{HISTORY_PREFIX}{id}")
}

pub fn stats_doc_id(key: &str) -> String {
    format!("{STATS_PREFIX}{key}")
}

pub fn extract_uuid(doc_id: &str) -> Result<Uuid, CouchDaoError> {
    let (_, id) = doc_id
        .split_once("::")
        .ok_or_else(|| CouchDaoError::InvalidDocId {
            doc_id: doc_id.to_string(),
            kind: "missing separator",
        })?;

    Uuid::parse_str(id).map_err(|_| CouchDaoError::InvalidDocId {
        doc_id: doc_id.to_string(),
        kind: "invalid UUID",
    })
}

/// Milliseconds since the Unix epoch; earlier instants clamp to zero.
pub fn epoch_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
