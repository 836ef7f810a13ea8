use std::{sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{DateTime, doc},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult, is_duplicate_key},
    models::{
        MongoGameDocument, MongoHistoryDocument, MongoStatsDocument, doc_id, doc_id_at_revision,
    },
};
use crate::{
    dao::{
        game_store::GameStore,
        models::{GameEntity, HistoryEntryEntity, PlayerStatsEntity, stats_key},
        storage::StorageResult,
    },
    state::{lifecycle::SessionStatus, session::GameKind},
};

const GAME_COLLECTION_NAME: &str = "games";
const HISTORY_COLLECTION_NAME: &str = "game_history";
const STATS_COLLECTION_NAME: &str = "player_stats";

#[derive(Clone)]
pub struct MongoGameStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    // Kept alive alongside the database handle; dropping it closes the pool.
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoGameStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;
        let indexes: [(&'static str, &'static str, _); 3] = [
            (
                GAME_COLLECTION_NAME,
                "room_code_status_idx",
                doc! {"room_code": 1, "status": 1},
            ),
            (
                GAME_COLLECTION_NAME,
                "paused_sweep_idx",
                doc! {"status": 1, "paused_at": 1},
            ),
            (
                HISTORY_COLLECTION_NAME,
                "history_participant_idx",
                doc! {"participants": 1, "completed_at": -1},
            ),
        ];

        for (collection, name, keys) in indexes {
            let index = IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().name(Some(name.to_owned())).build())
                .build();
            database
                .collection::<mongodb::bson::Document>(collection)
                .create_index(index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index: name,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn games(&self) -> Collection<MongoGameDocument> {
        self.database()
            .await
            .collection::<MongoGameDocument>(GAME_COLLECTION_NAME)
    }

    async fn history(&self) -> Collection<MongoHistoryDocument> {
        self.database()
            .await
            .collection::<MongoHistoryDocument>(HISTORY_COLLECTION_NAME)
    }

    async fn stats(&self) -> Collection<MongoStatsDocument> {
        self.database()
            .await
            .collection::<MongoStatsDocument>(STATS_COLLECTION_NAME)
    }

    async fn insert_game(&self, game: GameEntity) -> MongoResult<()> {
        let id = game.id.to_string();
        let document: MongoGameDocument = game.into();
        match self.games().await.insert_one(&document).await {
            Ok(_) => Ok(()),
            Err(source) if is_duplicate_key(&source) => Err(MongoDaoError::DuplicateId { id }),
            Err(source) => Err(MongoDaoError::Write {
                collection: GAME_COLLECTION_NAME,
                id,
                source,
            }),
        }
    }

    async fn find_game(&self, id: Uuid) -> MongoResult<Option<GameEntity>> {
        let document = self
            .games()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: GAME_COLLECTION_NAME,
                source,
            })?;

        document.map(GameEntity::try_from).transpose()
    }

    async fn replace_game(&self, game: GameEntity, expected_revision: u64) -> MongoResult<()> {
        let id = game.id;
        let document: MongoGameDocument = game.into();
        let result = self
            .games()
            .await
            .replace_one(doc_id_at_revision(id, expected_revision), &document)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: GAME_COLLECTION_NAME,
                id: id.to_string(),
                source,
            })?;

        if result.matched_count == 0 {
            debug!(session_id = %id, expected_revision, "revision check failed");
            return Err(MongoDaoError::RevisionMismatch { id: id.to_string() });
        }
        Ok(())
    }

    async fn delete_game(&self, id: Uuid, expected_revision: u64) -> MongoResult<bool> {
        let result = self
            .games()
            .await
            .delete_one(doc_id_at_revision(id, expected_revision))
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: GAME_COLLECTION_NAME,
                id: id.to_string(),
                source,
            })?;

        if result.deleted_count > 0 {
            return Ok(true);
        }
        if self.find_game(id).await?.is_some() {
            debug!(session_id = %id, expected_revision, "revision check failed on delete");
            return Err(MongoDaoError::RevisionMismatch { id: id.to_string() });
        }
        Ok(false)
    }

    async fn query_games(&self, filter: mongodb::bson::Document) -> MongoResult<Vec<GameEntity>> {
        let documents: Vec<MongoGameDocument> = self
            .games()
            .await
            .find(filter)
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: GAME_COLLECTION_NAME,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: GAME_COLLECTION_NAME,
                source,
            })?;

        documents.into_iter().map(GameEntity::try_from).collect()
    }

    async fn find_games_by_room_code(
        &self,
        room_code: String,
        statuses: Vec<SessionStatus>,
    ) -> MongoResult<Vec<GameEntity>> {
        let statuses: Vec<&str> = statuses.into_iter().map(SessionStatus::as_str).collect();
        self.query_games(doc! {"room_code": room_code, "status": {"$in": statuses}})
            .await
    }

    async fn list_paused_before(&self, cutoff: SystemTime) -> MongoResult<Vec<GameEntity>> {
        self.query_games(doc! {
            "status": SessionStatus::Paused.as_str(),
            "paused_at": {"$lt": DateTime::from_system_time(cutoff)},
        })
        .await
    }

    async fn insert_history(&self, entry: HistoryEntryEntity) -> MongoResult<bool> {
        let id = entry.session_id.to_string();
        let document: MongoHistoryDocument = entry.into();
        match self.history().await.insert_one(&document).await {
            Ok(_) => Ok(true),
            Err(source) if is_duplicate_key(&source) => Ok(false),
            Err(source) => Err(MongoDaoError::Write {
                collection: HISTORY_COLLECTION_NAME,
                id,
                source,
            }),
        }
    }

    async fn list_history(&self, player_id: String) -> MongoResult<Vec<HistoryEntryEntity>> {
        let documents: Vec<MongoHistoryDocument> = self
            .history()
            .await
            .find(doc! {"participants": player_id})
            .sort(doc! {"completed_at": -1})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: HISTORY_COLLECTION_NAME,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: HISTORY_COLLECTION_NAME,
                source,
            })?;

        documents
            .into_iter()
            .map(HistoryEntryEntity::try_from)
            .collect()
    }

    async fn find_stats(
        &self,
        player_id: String,
        kind: GameKind,
    ) -> MongoResult<Option<PlayerStatsEntity>> {
        let document = self
            .stats()
            .await
            .find_one(doc_id(stats_key(&player_id, kind)))
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: STATS_COLLECTION_NAME,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn save_stats(&self, stats: PlayerStatsEntity) -> MongoResult<()> {
        let key = stats.key();
        let document: MongoStatsDocument = stats.into();
        self.stats()
            .await
            .replace_one(doc_id(&key), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: STATS_COLLECTION_NAME,
                id: key,
                source,
            })?;
        Ok(())
    }
}

impl GameStore for MongoGameStore {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_game(game).await.map_err(Into::into) })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_game(id).await.map_err(Into::into) })
    }

    fn replace_game(
        &self,
        game: GameEntity,
        expected_revision: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .replace_game(game, expected_revision)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_game(
        &self,
        id: Uuid,
        expected_revision: u64,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .delete_game(id, expected_revision)
                .await
                .map_err(Into::into)
        })
    }

    fn find_games_by_room_code(
        &self,
        room_code: String,
        statuses: Vec<SessionStatus>,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_games_by_room_code(room_code, statuses)
                .await
                .map_err(Into::into)
        })
    }

    fn list_paused_before(
        &self,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_paused_before(cutoff).await.map_err(Into::into) })
    }

    fn insert_history(&self, entry: HistoryEntryEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.insert_history(entry).await.map_err(Into::into) })
    }

    fn list_history(
        &self,
        player_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<HistoryEntryEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_history(player_id).await.map_err(Into::into) })
    }

    fn find_stats(
        &self,
        player_id: String,
        kind: GameKind,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerStatsEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_stats(player_id, kind).await.map_err(Into::into) })
    }

    fn save_stats(&self, stats: PlayerStatsEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_stats(stats).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
