//! DuoPlay backend entrypoint wiring REST, SSE and the document store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use duoplay_back::{
    config::AppConfig,
    dao::{
        game_store::{GameStore, memory::MemoryGameStore},
        storage::StorageError,
    },
    routes,
    services::{presence, storage_supervisor},
    state::{AppState, SharedState},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config);

    spawn_storage_supervisor(app_state.clone());
    tokio::spawn(presence::run_pause_sweeper(app_state.clone()));

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Start the supervisor for the backend named by `STORE_BACKEND`.
///
/// Accepted values are `memory`, `mongodb` and `couchdb`. The default is MongoDB when
/// compiled in, the in-memory store otherwise.
fn spawn_storage_supervisor(state: SharedState) {
    let default_backend = if cfg!(feature = "mongo-store") {
        "mongodb"
    } else {
        "memory"
    };
    let backend = env::var("STORE_BACKEND").unwrap_or_else(|_| default_backend.into());
    info!(backend, "selecting storage backend");

    match backend.as_str() {
        #[cfg(feature = "mongo-store")]
        "mongodb" | "mongo" => {
            use duoplay_back::dao::game_store::mongodb::{MongoConfig, MongoGameStore};

            tokio::spawn(storage_supervisor::run(state, || async {
                let config = MongoConfig::from_env().await?;
                let store = MongoGameStore::connect(config).await?;
                Ok::<_, StorageError>(Arc::new(store) as Arc<dyn GameStore>)
            }));
        }
        #[cfg(feature = "couch-store")]
        "couchdb" | "couch" => {
            use duoplay_back::dao::game_store::couchdb::{CouchConfig, CouchGameStore};

            tokio::spawn(storage_supervisor::run(state, || async {
                let store = CouchGameStore::connect(CouchConfig::from_env()).await?;
                Ok::<_, StorageError>(Arc::new(store) as Arc<dyn GameStore>)
            }));
        }
        other => {
            if other != "memory" {
                warn!(backend = other, "unknown or disabled storage backend; using memory");
            }
            let store = MemoryGameStore::new();
            tokio::spawn(storage_supervisor::run(state, move || {
                let store = store.clone();
                async move { Ok::<_, StorageError>(Arc::new(store) as Arc<dyn GameStore>) }
            }));
        }
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
