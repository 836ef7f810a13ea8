use std::{sync::Arc, time::SystemTime};

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, from_value, json};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::{
        game_store::GameStore,
        models::{GameEntity, HistoryEntryEntity, PlayerStatsEntity, stats_key},
        storage::StorageResult,
    },
    state::{lifecycle::SessionStatus, session::GameKind},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        CouchGameDocument, CouchHistoryDocument, CouchStatsDocument, FindResponse, GAME_TYPE,
        HISTORY_TYPE, WriteResponse, epoch_millis, game_doc_id, history_doc_id, stats_doc_id,
    },
};

const FIND: &str = "_find";
const INDEX: &str = "_index";
/// Upper bound on documents returned by a single Mango query.
const FIND_LIMIT: usize = 1_000;

#[derive(Clone)]
pub struct CouchGameStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchGameStore {
    /// Connect to CouchDB, creating the database and its Mango indexes when missing.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        store.ensure_indexes().await?;
        Ok(store)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Some((user, pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        self.authorized(self.client.request(method, url))
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    async fn send(&self, builder: reqwest::RequestBuilder, path: &str) -> CouchResult<reqwest::Response> {
        builder
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: path.to_string(),
                source,
            })
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let url = self.database_url();
        let response = self
            .send(self.authorized(self.client.get(&url)), &url)
            .await?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .send(self.authorized(self.client.put(&url)), &url)
                    .await?;
                // 412 means another instance created it first.
                if create.status().is_success() || create.status() == StatusCode::PRECONDITION_FAILED
                {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database: self.database.to_string(),
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database: self.database.to_string(),
                status: other,
            }),
        }
    }

    async fn ensure_indexes(&self) -> CouchResult<()> {
        let indexes = [
            ("room-code-status", json!(["type", "room_code", "status"])),
            ("paused-sweep", json!(["type", "status", "paused_at_ms"])),
            ("history-completed", json!(["type", "completed_at_ms"])),
        ];

        for (name, fields) in indexes {
            let body = json!({ "index": { "fields": fields }, "name": name, "type": "json" });
            let response = self
                .send(self.request(Method::POST, INDEX).json(&body), INDEX)
                .await?;
            if !response.status().is_success() {
                return Err(CouchDaoError::RequestStatus {
                    path: INDEX.to_string(),
                    status: response.status(),
                });
            }
        }
        Ok(())
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self.send(self.request(Method::GET, doc_id), doc_id).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let value = response.json::<Value>().await.map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })?;
                from_value(value)
                    .map(Some)
                    .map_err(|source| CouchDaoError::DeserializeValue {
                        path: doc_id.to_string(),
                        source,
                    })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    /// PUT `document`; `Ok(None)` when CouchDB reports a revision conflict.
    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<Option<String>>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .send(self.request(Method::PUT, doc_id).json(document), doc_id)
            .await?;

        match response.status() {
            StatusCode::CONFLICT => Ok(None),
            status if status.is_success() => {
                let written = response.json::<WriteResponse>().await.map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })?;
                Ok(Some(written.rev))
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn find_documents<T>(&self, selector: Value) -> CouchResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let body = json!({ "selector": selector, "limit": FIND_LIMIT });
        let response = self
            .send(self.request(Method::POST, FIND).json(&body), FIND)
            .await?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: FIND.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<FindResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: FIND.to_string(),
                source,
            }
        })?;
        if let Some(warning) = payload.warning {
            debug!(%warning, "CouchDB query warning");
        }

        payload
            .docs
            .into_iter()
            .map(|doc| {
                from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: FIND.to_string(),
                    source,
                })
            })
            .collect()
    }

    async fn find_games(&self, selector: Value) -> CouchResult<Vec<GameEntity>> {
        self.find_documents::<CouchGameDocument>(selector)
            .await?
            .into_iter()
            .map(GameEntity::try_from)
            .collect()
    }

    async fn insert_game(&self, game: GameEntity) -> CouchResult<()> {
        let doc_id = game_doc_id(game.id);
        let document = CouchGameDocument::from((game, None));
        match self.put_document(&doc_id, &document).await? {
            Some(_) => Ok(()),
            None => Err(CouchDaoError::Conflict { path: doc_id }),
        }
    }

    async fn find_game(&self, id: Uuid) -> CouchResult<Option<GameEntity>> {
        self.get_document::<CouchGameDocument>(&game_doc_id(id))
            .await?
            .map(GameEntity::try_from)
            .transpose()
    }

    async fn replace_game(&self, game: GameEntity, expected_revision: u64) -> CouchResult<()> {
        let doc_id = game_doc_id(game.id);
        let Some(existing) = self.get_document::<CouchGameDocument>(&doc_id).await? else {
            return Err(CouchDaoError::Conflict { path: doc_id });
        };
        if existing.game.revision != expected_revision {
            return Err(CouchDaoError::Conflict { path: doc_id });
        }

        let document = CouchGameDocument::from((game, existing.rev));
        match self.put_document(&doc_id, &document).await? {
            Some(_) => Ok(()),
            None => Err(CouchDaoError::Conflict { path: doc_id }),
        }
    }

    async fn delete_game(&self, id: Uuid, expected_revision: u64) -> CouchResult<bool> {
        let doc_id = game_doc_id(id);
        let Some(existing) = self.get_document::<CouchGameDocument>(&doc_id).await? else {
            return Ok(false);
        };
        if existing.game.revision != expected_revision {
            return Err(CouchDaoError::Conflict { path: doc_id });
        }
        let Some(rev) = existing.rev else {
            return Ok(false);
        };

        let response = self
            .send(
                self.request(Method::DELETE, &doc_id).query(&[("rev", rev)]),
                &doc_id,
            )
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            StatusCode::CONFLICT => Err(CouchDaoError::Conflict { path: doc_id }),
            status if status.is_success() => Ok(true),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id,
                status: other,
            }),
        }
    }

    async fn insert_history(&self, entry: HistoryEntryEntity) -> CouchResult<bool> {
        let doc_id = history_doc_id(entry.session_id);
        let document = CouchHistoryDocument::from(entry);
        Ok(self.put_document(&doc_id, &document).await?.is_some())
    }

    async fn list_history(&self, player_id: String) -> CouchResult<Vec<HistoryEntryEntity>> {
        let mut documents = self
            .find_documents::<CouchHistoryDocument>(json!({
                "type": HISTORY_TYPE,
                "participants": { "$elemMatch": { "$eq": player_id } },
            }))
            .await?;
        documents.sort_by(|a, b| b.completed_at_ms.cmp(&a.completed_at_ms));
        Ok(documents.into_iter().map(|doc| doc.entry).collect())
    }

    async fn find_stats(
        &self,
        player_id: String,
        kind: GameKind,
    ) -> CouchResult<Option<PlayerStatsEntity>> {
        let doc_id = stats_doc_id(&stats_key(&player_id, kind));
        Ok(self
            .get_document::<CouchStatsDocument>(&doc_id)
            .await?
            .map(|doc| doc.stats))
    }

    async fn save_stats(&self, stats: PlayerStatsEntity) -> CouchResult<()> {
        let doc_id = stats_doc_id(&stats.key());
        let rev = self
            .get_document::<CouchStatsDocument>(&doc_id)
            .await?
            .and_then(|existing| existing.rev);
        let document = CouchStatsDocument::from((stats, rev));
        match self.put_document(&doc_id, &document).await? {
            Some(_) => Ok(()),
            None => {
                warn!(doc_id = %doc_id, "stats document changed while saving");
                Err(CouchDaoError::Conflict { path: doc_id })
            }
        }
    }

    async fn ping(&self) -> CouchResult<()> {
        let url = self.database_url();
        let response = self
            .send(self.authorized(self.client.get(&url)), &url)
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: url,
                status: response.status(),
            })
        }
    }
}

impl GameStore for CouchGameStore {
    fn backend(&self) -> &'static str {
        "couchdb"
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
            let statuses: Vec<&str> = statuses.into_iter().map(SessionStatus::as_str).collect();
            store
                .find_games(json!({
                    "type": GAME_TYPE,
                    "room_code": room_code,
                    "status": { "$in": statuses },
                }))
                .await
                .map_err(Into::into)
        })
    }

    fn list_paused_before(
        &self,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_games(json!({
                    "type": GAME_TYPE,
                    "status": SessionStatus::Paused.as_str(),
                    "paused_at_ms": { "$lt": epoch_millis(cutoff) },
                }))
                .await
                .map_err(Into::into)
        })
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
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
