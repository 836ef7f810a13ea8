use std::{future::Future, sync::Arc, time::SystemTime};

use tokio::time::sleep;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::{
        game_store::GameStore,
        storage::{StorageError, StorageResult},
    },
    error::ServiceError,
    services::history::record_completion,
    state::{SharedState, lifecycle::SessionStatus, session::GameSession},
};

/// Read a session, apply `mutate` to it and write it back guarded by its revision.
///
/// Transient storage failures restart the whole read-modify-write, up to the configured
/// number of attempts; the last error is returned unchanged. Errors raised by `mutate` are
/// returned immediately and nothing is written. A mutation that leaves the session
/// untouched is not written either.
///
/// Once committed, the session is published to its subscribers, and the history/stats
/// recorder runs when this write moved the session into `finished`.
pub async fn run_session_transaction<F, T>(
    state: &SharedState,
    session_id: Uuid,
    mut mutate: F,
) -> Result<(T, GameSession), ServiceError>
where
    F: FnMut(&mut GameSession) -> Result<T, ServiceError>,
{
    let store = state.require_game_store().await?;
    let config = state.config();
    let mut attempt = 1;

    loop {
        match attempt_once(&store, session_id, &mut mutate).await {
            Ok(Committed::Written {
                value,
                session,
                previous,
            }) => {
                debug!(
                    session_id = %session_id,
                    revision = session.revision,
                    status = %session.status,
                    "session updated"
                );
                state.hubs().publish(&session);
                if session.status == SessionStatus::Finished && previous != SessionStatus::Finished
                {
                    record_completion(store.as_ref(), &session).await;
                }
                return Ok((value, session));
            }
            Ok(Committed::Unchanged { value, session }) => return Ok((value, session)),
            Err(ServiceError::Storage(err))
                if err.is_transient() && attempt < config.transaction_attempts =>
            {
                warn!(
                    session_id = %session_id,
                    attempt,
                    error = %err,
                    "session write failed; retrying"
                );
                sleep(config.retry_backoff * attempt).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

enum Committed<T> {
    Written {
        value: T,
        session: GameSession,
        previous: SessionStatus,
    },
    Unchanged {
        value: T,
        session: GameSession,
    },
}

async fn attempt_once<F, T>(
    store: &Arc<dyn GameStore>,
    session_id: Uuid,
    mutate: &mut F,
) -> Result<Committed<T>, ServiceError>
where
    F: FnMut(&mut GameSession) -> Result<T, ServiceError>,
{
    let session: GameSession = store
        .find_game(session_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game {session_id}")))?
        .into();

    let previous = session.status;
    let expected_revision = session.revision;
    let mut next = session.clone();
    let value = mutate(&mut next)?;

    if next == session {
        return Ok(Committed::Unchanged { value, session });
    }

    next.revision = expected_revision + 1;
    next.updated_at = SystemTime::now().max(session.updated_at);
    store
        .replace_game(next.clone().into(), expected_revision)
        .await?;

    Ok(Committed::Written {
        value,
        session: next,
        previous,
    })
}

/// Run a single storage call, retrying outages with the transaction backoff.
///
/// Conflicts are returned at once: repeating the same call cannot resolve them.
pub async fn retry_storage<F, Fut, T>(
    state: &SharedState,
    operation: &'static str,
    mut call: F,
) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StorageResult<T>>,
{
    let config = state.config();
    let mut attempt = 1;

    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err @ StorageError::Unavailable { .. })
                if attempt < config.transaction_attempts =>
            {
                warn!(operation, attempt, error = %err, "storage call failed; retrying");
                sleep(config.retry_backoff * attempt).await;
                attempt += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }
}
