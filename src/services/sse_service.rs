use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc, watch,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        game::GameView,
        sse::{Handshake, ServerEvent, SystemStatus},
    },
    error::ServiceError,
    services::{matchmaking, presence},
    state::{
        SessionUpdate, SharedState,
        lifecycle::SessionStatus,
        session::{GameSession, PauseReason},
    },
};

/// Live subscription to one session, opened on behalf of `viewer`.
pub struct SessionSubscription {
    session_id: Uuid,
    viewer: Option<String>,
    initial: Vec<ServerEvent>,
    updates: broadcast::Receiver<SessionUpdate>,
    degraded: watch::Receiver<bool>,
}

/// Subscribe to updates of `session_id`. The handshake and a snapshot of the session are
/// queued first so the client never has to poll.
pub async fn subscribe_session(
    state: &SharedState,
    session_id: Uuid,
    viewer: Option<String>,
) -> Result<SessionSubscription, ServiceError> {
    let updates = state.hubs().subscribe(session_id);
    let session = match matchmaking::get_game(state, session_id).await {
        Ok(session) => session,
        Err(err) => {
            drop(updates);
            state.hubs().release(session_id);
            return Err(err);
        }
    };

    let mut initial = Vec::with_capacity(2);
    let handshake = Handshake {
        session_id,
        degraded: state.is_degraded(),
    };
    if let Ok(event) = ServerEvent::json(Some("handshake".to_string()), &handshake) {
        initial.push(event);
    }
    if let Some(event) = session_event(&session, viewer.as_deref()) {
        initial.push(event);
    }

    Ok(SessionSubscription {
        session_id,
        viewer,
        initial,
        updates,
        degraded: state.degraded_watcher(),
    })
}

/// Render `session` for `viewer` as a `session` event.
fn session_event(session: &GameSession, viewer: Option<&str>) -> Option<ServerEvent> {
    let view = GameView::for_viewer(session, viewer);
    match ServerEvent::json(Some("session".to_string()), &view) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(session_id = %session.id, error = %err, "failed to serialise session update");
            None
        }
    }
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

/// Pause a running game whose seated player just lost their stream.
async fn pause_on_disconnect(state: &SharedState, session_id: Uuid, player_id: &str) {
    let session = match matchmaking::get_game(state, session_id).await {
        Ok(session) => session,
        Err(err) => {
            debug!(session_id = %session_id, error = %err, "no session to pause after disconnect");
            return;
        }
    };
    if session.status != SessionStatus::Playing || !session.is_participant(player_id) {
        return;
    }

    if let Err(err) =
        presence::pause_game(state, session_id, player_id, PauseReason::PlayerDisconnected).await
    {
        warn!(
            session_id = %session_id,
            player_id,
            error = %err,
            "failed to pause game after disconnect"
        );
    }
}

/// Turn a subscription into an SSE response, forwarding updates until the client goes away.
///
/// When a seated player's stream ends while their game is running, the game is paused on
/// their behalf.
pub fn to_sse_stream(
    state: SharedState,
    subscription: SessionSubscription,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let SessionSubscription {
        session_id,
        viewer,
        initial,
        mut updates,
        mut degraded,
    } = subscription;

    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        let mut connected = true;
        for payload in initial {
            if tx.send(Ok(to_event(payload))).await.is_err() {
                connected = false;
                break;
            }
        }

        while connected {
            let payload = tokio::select! {
                _ = tx.closed() => break,
                changed = degraded.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let status = SystemStatus { degraded: *degraded.borrow_and_update() };
                    ServerEvent::json(Some("system_status".to_string()), &status).ok()
                }
                recv_result = updates.recv() => match recv_result {
                    Ok(session) => session_event(&session, viewer.as_deref()),
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(skipped)) => {
                        // Later updates carry the full session, so dropping some is harmless.
                        debug!(session_id = %session_id, skipped, "session stream lagged");
                        continue;
                    }
                },
            };

            let Some(payload) = payload else { continue };
            if tx.send(Ok(to_event(payload))).await.is_err() {
                break;
            }
        }

        info!(session_id = %session_id, viewer = ?viewer, "session SSE stream disconnected");
        drop(updates);
        state.hubs().release(session_id);

        if let Some(player_id) = viewer {
            pause_on_disconnect(&state, session_id, &player_id).await;
        }
    });

    Sse::new(ReceiverStream::new(rx)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
