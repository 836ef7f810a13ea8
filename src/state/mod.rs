pub mod hub;
pub mod lifecycle;
pub mod session;
pub mod transitions;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{config::AppConfig, dao::game_store::GameStore, error::ServiceError};

pub use self::hub::{SessionHubs, SessionUpdate};

pub type SharedState = Arc<AppState>;

/// Central application state: storage handle, degraded flag, session hubs and configuration.
pub struct AppState {
    game_store: RwLock<Option<Arc<dyn GameStore>>>,
    degraded: watch::Sender<bool>,
    hubs: SessionHubs,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            game_store: RwLock::new(None),
            degraded: degraded_tx,
            hubs: SessionHubs::new(config.hub_capacity),
            config,
        })
    }

    /// State with `store` already installed, as used by tests and single-process setups.
    pub async fn with_store(config: AppConfig, store: Arc<dyn GameStore>) -> SharedState {
        let state = Self::new(config);
        state.set_game_store(store).await;
        state
    }

    /// Obtain a handle to the current game store, if one is installed.
    pub async fn game_store(&self) -> Option<Arc<dyn GameStore>> {
        let guard = self.game_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current game store, or [`ServiceError::Degraded`] while none is usable.
    pub async fn require_game_store(&self) -> Result<Arc<dyn GameStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.game_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new game store implementation and leave degraded mode.
    pub async fn set_game_store(&self, store: Arc<dyn GameStore>) {
        {
            let mut guard = self.game_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Broadcast hubs used for per-session subscriptions.
    pub fn hubs(&self) -> &SessionHubs {
        &self.hubs
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::game_store::memory::MemoryGameStore;

    #[tokio::test]
    async fn starts_degraded_until_a_store_is_installed() {
        let state = AppState::new(AppConfig::default());
        assert!(state.is_degraded());
        assert!(matches!(
            state.require_game_store().await,
            Err(ServiceError::Degraded)
        ));

        let mut watcher = state.degraded_watcher();
        state.set_game_store(Arc::new(MemoryGameStore::new())).await;
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());
        assert!(state.require_game_store().await.is_ok());

        state.update_degraded(true);
        assert!(state.require_game_store().await.is_err());
    }
}
