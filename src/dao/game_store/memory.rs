//! Process-local store backed by concurrent maps. Used when no database is configured and by tests.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    time::SystemTime,
};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::{
    dao::{
        game_store::GameStore,
        models::{GameEntity, HistoryEntryEntity, PlayerStatsEntity, stats_key},
        storage::{StorageError, StorageResult},
    },
    state::{lifecycle::SessionStatus, session::GameKind},
};

#[derive(Clone, Default)]
pub struct MemoryGameStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    games: DashMap<Uuid, GameEntity>,
    history: DashMap<Uuid, HistoryEntryEntity>,
    stats: DashMap<String, PlayerStatsEntity>,
    faults: Faults,
}

/// Failures injected on purpose to exercise retry and best-effort paths.
#[derive(Default)]
struct Faults {
    game_writes: AtomicU32,
    history_writes: AtomicBool,
    offline: AtomicBool,
}

impl MemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` session writes fail as if the store were unreachable.
    pub fn fail_next_game_writes(&self, count: u32) {
        self.inner.faults.game_writes.store(count, Ordering::SeqCst);
    }

    /// Toggle failures of history inserts.
    pub fn fail_history_writes(&self, failing: bool) {
        self.inner
            .faults
            .history_writes
            .store(failing, Ordering::SeqCst);
    }

    /// Toggle the result of health checks.
    pub fn set_offline(&self, offline: bool) {
        self.inner.faults.offline.store(offline, Ordering::SeqCst);
    }

    pub fn history_len(&self) -> usize {
        self.inner.history.len()
    }

    pub fn game_count(&self) -> usize {
        self.inner.games.len()
    }
}

impl MemoryInner {
    fn take_game_write_fault(&self) -> StorageResult<()> {
        let injected = self
            .faults
            .game_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if injected {
            return Err(simulated_outage("session write"));
        }
        Ok(())
    }

    fn insert_game(&self, game: GameEntity) -> StorageResult<()> {
        self.take_game_write_fault()?;
        match self.games.entry(game.id) {
            Entry::Occupied(_) => Err(StorageError::conflict(
                game.id.to_string(),
                "session already exists",
            )),
            Entry::Vacant(slot) => {
                slot.insert(game);
                Ok(())
            }
        }
    }

    fn replace_game(&self, game: GameEntity, expected_revision: u64) -> StorageResult<()> {
        self.take_game_write_fault()?;
        let Some(mut stored) = self.games.get_mut(&game.id) else {
            return Err(StorageError::conflict(
                game.id.to_string(),
                "session no longer exists",
            ));
        };
        if stored.revision != expected_revision {
            return Err(StorageError::conflict(
                game.id.to_string(),
                format!(
                    "expected revision {expected_revision}, found {}",
                    stored.revision
                ),
            ));
        }
        *stored = game;
        Ok(())
    }

    fn delete_game(&self, id: Uuid, expected_revision: u64) -> StorageResult<bool> {
        self.take_game_write_fault()?;
        if self
            .games
            .remove_if(&id, |_, game| game.revision == expected_revision)
            .is_some()
        {
            return Ok(true);
        }
        match self.games.get(&id) {
            Some(game) => Err(StorageError::conflict(
                id.to_string(),
                format!(
                    "expected revision {expected_revision}, found {}",
                    game.revision
                ),
            )),
            None => Ok(false),
        }
    }

    fn find_games_by_room_code(
        &self,
        room_code: &str,
        statuses: &[SessionStatus],
    ) -> Vec<GameEntity> {
        self.games
            .iter()
            .filter(|game| game.room_code == room_code && statuses.contains(&game.status))
            .map(|game| game.value().clone())
            .collect()
    }

    fn list_paused_before(&self, cutoff: SystemTime) -> Vec<GameEntity> {
        self.games
            .iter()
            .filter(|game| {
                game.status == SessionStatus::Paused
                    && game.paused_at.is_some_and(|paused_at| paused_at < cutoff)
            })
            .map(|game| game.value().clone())
            .collect()
    }

    fn insert_history(&self, entry: HistoryEntryEntity) -> StorageResult<bool> {
        if self.faults.history_writes.load(Ordering::SeqCst) {
            return Err(simulated_outage("history insert"));
        }
        match self.history.entry(entry.session_id) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(true)
            }
        }
    }

    fn list_history(&self, player_id: &str) -> Vec<HistoryEntryEntity> {
        let mut entries: Vec<HistoryEntryEntity> = self
            .history
            .iter()
            .filter(|entry| entry.participants.iter().any(|id| id == player_id))
            .map(|entry| entry.value().clone())
            .collect();
        entries.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        entries
    }

    fn health_check(&self) -> StorageResult<()> {
        if self.faults.offline.load(Ordering::SeqCst) {
            return Err(simulated_outage("health check"));
        }
        Ok(())
    }
}

fn simulated_outage(operation: &str) -> StorageError {
    StorageError::unavailable(
        format!("in-memory {operation} failed"),
        io::Error::new(io::ErrorKind::ConnectionReset, "injected failure"),
    )
}

impl GameStore for MemoryGameStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.insert_game(game) })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.games.get(&id).map(|game| game.value().clone())) })
    }

    fn replace_game(
        &self,
        game: GameEntity,
        expected_revision: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.replace_game(game, expected_revision) })
    }

    fn delete_game(
        &self,
        id: Uuid,
        expected_revision: u64,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.inner.delete_game(id, expected_revision) })
    }

    fn find_games_by_room_code(
        &self,
        room_code: String,
        statuses: Vec<SessionStatus>,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.find_games_by_room_code(&room_code, &statuses)) })
    }

    fn list_paused_before(
        &self,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.list_paused_before(cutoff)) })
    }

    fn insert_history(&self, entry: HistoryEntryEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.inner.insert_history(entry) })
    }

    fn list_history(
        &self,
        player_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<HistoryEntryEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.list_history(&player_id)) })
    }

    fn find_stats(
        &self,
        player_id: String,
        kind: GameKind,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerStatsEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let key = stats_key(&player_id, kind);
            Ok(store.inner.stats.get(&key).map(|stats| stats.value().clone()))
        })
    }

    fn save_stats(&self, stats: PlayerStatsEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.stats.insert(stats.key(), stats);
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.health_check() })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.health_check() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::tictactoe::{Symbol, TicTacToeBoard},
        state::session::{Board, GameSession, Player, PlayerGameState, Profile},
    };

    fn entity() -> GameEntity {
        let host = Player {
            id: "host".into(),
            profile: Profile {
                display_name: "Host".into(),
                avatar_url: None,
            },
            state: PlayerGameState::TicTacToe { symbol: Symbol::X },
            is_ready: false,
        };
        GameSession::new(
            "ABCDEF".into(),
            GameKind::TicTacToe,
            host,
            Board::TicTacToe(TicTacToeBoard::new(3, 3).unwrap()),
            SystemTime::now(),
        )
        .into()
    }

    #[tokio::test]
    async fn stale_revisions_are_rejected() {
        let store = MemoryGameStore::new();
        let game = entity();
        store.insert_game(game.clone()).await.unwrap();

        let mut next = game.clone();
        next.revision = 1;
        store.replace_game(next.clone(), 0).await.unwrap();

        let err = store.replace_game(next, 0).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));
        assert_eq!(store.find_game(game.id).await.unwrap().unwrap().revision, 1);
    }

    #[tokio::test]
    async fn room_code_lookup_filters_on_status() {
        let store = MemoryGameStore::new();
        let game = entity();
        store.insert_game(game.clone()).await.unwrap();

        let waiting = store
            .find_games_by_room_code("ABCDEF".into(), vec![SessionStatus::Waiting])
            .await
            .unwrap();
        assert_eq!(waiting.len(), 1);

        let finished = store
            .find_games_by_room_code("ABCDEF".into(), vec![SessionStatus::Finished])
            .await
            .unwrap();
        assert!(finished.is_empty());
    }

    #[tokio::test]
    async fn injected_faults_are_consumed() {
        let store = MemoryGameStore::new();
        store.fail_next_game_writes(1);
        assert!(store.insert_game(entity()).await.is_err());
        assert!(store.insert_game(entity()).await.is_ok());
        assert_eq!(store.game_count(), 1);
    }

    #[tokio::test]
    async fn deletes_are_guarded_by_revision() {
        let store = MemoryGameStore::new();
        let game = entity();
        store.insert_game(game.clone()).await.unwrap();
        let mut joined = game.clone();
        joined.revision = 1;
        store.replace_game(joined, 0).await.unwrap();

        let err = store.delete_game(game.id, 0).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));
        assert_eq!(store.game_count(), 1);

        assert!(store.delete_game(game.id, 1).await.unwrap());
        assert!(!store.delete_game(game.id, 1).await.unwrap());
    }
}
