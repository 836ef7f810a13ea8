#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::time::SystemTime;

use crate::dao::models::{GameEntity, HistoryEntryEntity, PlayerStatsEntity};
use crate::dao::storage::StorageResult;
use crate::state::{lifecycle::SessionStatus, session::GameKind};
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the document store holding sessions, history entries and player stats.
pub trait GameStore: Send + Sync {
    /// Short backend name reported by the health endpoint.
    fn backend(&self) -> &'static str;
    /// Create a new session document. Fails with a conflict when the id already exists.
    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Overwrite a session only if its stored revision still equals `expected_revision`.
    ///
    /// A mismatch, or a document that disappeared, yields [`StorageError::Conflict`].
    ///
    /// [`StorageError::Conflict`]: crate::dao::storage::StorageError::Conflict
    fn replace_game(
        &self,
        game: GameEntity,
        expected_revision: u64,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Remove a session still at `expected_revision`; `false` when it no longer exists.
    ///
    /// A session that moved past `expected_revision` is kept and yields a conflict.
    fn delete_game(
        &self,
        id: Uuid,
        expected_revision: u64,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Sessions using `room_code` whose status is one of `statuses`.
    fn find_games_by_room_code(
        &self,
        room_code: String,
        statuses: Vec<SessionStatus>,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>>;
    /// Paused sessions whose pause started strictly before `cutoff`.
    fn list_paused_before(
        &self,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>>;
    /// Insert-if-absent keyed by session id; `false` when the entry already existed.
    fn insert_history(&self, entry: HistoryEntryEntity) -> BoxFuture<'static, StorageResult<bool>>;
    /// History entries involving `player_id`, most recent first.
    fn list_history(
        &self,
        player_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<HistoryEntryEntity>>>;
    fn find_stats(
        &self,
        player_id: String,
        kind: GameKind,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerStatsEntity>>>;
    fn save_stats(&self, stats: PlayerStatsEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
