use std::time::SystemTime;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::ServiceError,
    services::matchmaking::not_a_participant,
    state::{
        SharedState,
        lifecycle::{SessionEvent, SessionStatus},
        session::{GameSession, PauseInfo, PauseReason, WinReason},
        transitions::run_session_transaction,
    },
};

/// Suspend a running game. The turn holder is parked until the game resumes.
pub async fn pause_game(
    state: &SharedState,
    session_id: Uuid,
    player_id: &str,
    reason: PauseReason,
) -> Result<GameSession, ServiceError> {
    let (_, session) = run_session_transaction(state, session_id, |session| {
        if !session.is_participant(player_id) {
            return Err(not_a_participant(player_id));
        }
        if session.status != SessionStatus::Playing {
            return Err(ServiceError::GameNotPlaying {
                status: session.status,
            });
        }

        session.apply_event(SessionEvent::Pause)?;
        session.pause = Some(PauseInfo {
            paused_at: SystemTime::now(),
            paused_by: player_id.to_owned(),
            reason,
            resume_player_id: session.current_player_id.take(),
        });
        Ok(())
    })
    .await?;

    info!(session_id = %session_id, player_id, ?reason, "game paused");
    Ok(session)
}

/// Resume a paused game.
///
/// A pause caused by a disconnect can only be lifted by the player who dropped; manual
/// pauses can be lifted by either player.
pub async fn resume_game(
    state: &SharedState,
    session_id: Uuid,
    player_id: &str,
) -> Result<GameSession, ServiceError> {
    let (_, session) = run_session_transaction(state, session_id, |session| {
        if !session.is_participant(player_id) {
            return Err(not_a_participant(player_id));
        }
        let Some(pause) = session.pause.clone().filter(|_| session.status == SessionStatus::Paused)
        else {
            return Err(ServiceError::InvalidState("the game is not paused".into()));
        };
        if pause.reason == PauseReason::PlayerDisconnected && pause.paused_by != player_id {
            return Err(ServiceError::Unauthorized(
                "only the disconnected player can resume this game".into(),
            ));
        }

        session.apply_event(SessionEvent::Resume)?;
        session.current_player_id = pause.resume_player_id;
        session.pause = None;
        Ok(())
    })
    .await?;

    info!(session_id = %session_id, player_id, "game resumed");
    Ok(session)
}

/// Whether the session is paused and still within the pause ceiling.
pub async fn can_resume_game(state: &SharedState, session_id: Uuid) -> Result<bool, ServiceError> {
    let store = state.require_game_store().await?;
    let Some(session) = store.find_game(session_id).await? else {
        return Err(ServiceError::NotFound(format!("game {session_id}")));
    };
    let session: GameSession = session.into();

    Ok(within_ceiling(&session, state, SystemTime::now()))
}

fn within_ceiling(session: &GameSession, state: &SharedState, now: SystemTime) -> bool {
    let Some(pause) = session.pause.as_ref() else {
        return false;
    };
    if session.status != SessionStatus::Paused {
        return false;
    }
    match now.duration_since(pause.paused_at) {
        Ok(elapsed) => elapsed < state.config().pause_ceiling,
        Err(_) => true,
    }
}

/// Finalize every session paused for longer than the ceiling, without a winner.
///
/// Returns the number of sessions finalized by this sweep.
pub async fn cleanup_old_paused_games(state: &SharedState) -> Result<usize, ServiceError> {
    let store = state.require_game_store().await?;
    let now = SystemTime::now();
    let cutoff = now
        .checked_sub(state.config().pause_ceiling)
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let stale = store.list_paused_before(cutoff).await?;

    let mut finalized = 0;
    for entity in stale {
        let session_id = entity.id;
        let result = run_session_transaction(state, session_id, |session| {
            let expired = session.status == SessionStatus::Paused
                && session
                    .pause
                    .as_ref()
                    .is_some_and(|pause| pause.paused_at < cutoff);
            if expired {
                session.finish(None, WinReason::Abandoned, now)?;
            }
            Ok(expired)
        })
        .await;

        match result {
            Ok((true, _)) => finalized += 1,
            Ok((false, _)) => debug!(session_id = %session_id, "session resumed before sweep"),
            Err(err) => {
                warn!(session_id = %session_id, error = %err, "failed to finalize paused game")
            }
        }
    }

    if finalized > 0 {
        info!(finalized, "finalized abandoned paused games");
    }
    Ok(finalized)
}

/// Periodically run [`cleanup_old_paused_games`]. Sweeps are skipped while degraded.
pub async fn run_pause_sweeper(state: SharedState) {
    let mut ticker = interval(state.config().pause_sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if state.is_degraded() {
            continue;
        }
        if let Err(err) = cleanup_old_paused_games(&state).await {
            warn!(error = %err, "paused game sweep failed");
        }
    }
}
