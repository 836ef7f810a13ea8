use std::time::SystemTime;

use tracing::{info, warn};

use crate::{
    dao::{
        game_store::GameStore,
        models::{HistoryEntryEntity, PlayerStatsEntity},
        storage::StorageResult,
    },
    error::ServiceError,
    state::{
        SharedState,
        session::{GameKind, GameSession},
    },
};

/// What happened when a finished session was handed to the recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// History entry written and every participant's stats updated.
    Recorded,
    /// The session already had a history entry; stats were left alone.
    AlreadyRecorded,
    /// A write failed. The session stays finished.
    Failed,
}

/// Write the history entry of a finished session and fold it into both players' stats.
///
/// Best effort: failures are logged and reported, never propagated.
pub async fn record_completion(store: &dyn GameStore, session: &GameSession) -> RecordOutcome {
    let Some(entry) = history_entry(session) else {
        warn!(session_id = %session.id, "session has no result; nothing to record");
        return RecordOutcome::Failed;
    };

    match write_completion(store, session, entry).await {
        Ok(true) => {
            info!(session_id = %session.id, kind = %session.kind, "game recorded");
            RecordOutcome::Recorded
        }
        Ok(false) => {
            info!(session_id = %session.id, "game already recorded; stats untouched");
            RecordOutcome::AlreadyRecorded
        }
        Err(err) => {
            warn!(
                session_id = %session.id,
                error = %err,
                "failed to record finished game"
            );
            RecordOutcome::Failed
        }
    }
}

async fn write_completion(
    store: &dyn GameStore,
    session: &GameSession,
    entry: HistoryEntryEntity,
) -> StorageResult<bool> {
    if !store.insert_history(entry.clone()).await? {
        return Ok(false);
    }

    for player in session.participants() {
        let previous = store
            .find_stats(player.id.clone(), session.kind)
            .await?
            .unwrap_or_else(|| PlayerStatsEntity::empty(player.id.clone(), session.kind));
        let tiles_drawn = player.dominoes().map_or(0, |state| state.tiles_drawn);
        let updated = apply_result(
            previous,
            &entry,
            session.moves_by(&player.id) as u32,
            tiles_drawn,
        );
        store.save_stats(updated).await?;
    }

    Ok(true)
}

/// Immutable summary of a finished session.
pub fn history_entry(session: &GameSession) -> Option<HistoryEntryEntity> {
    let reason = session.win_reason?;
    let participants: Vec<String> = session.participants().map(|p| p.id.clone()).collect();
    let loser_id = session.winner_id.as_ref().and_then(|winner| {
        participants
            .iter()
            .find(|id| *id != winner)
            .cloned()
    });

    Some(HistoryEntryEntity {
        session_id: session.id,
        kind: session.kind,
        participants,
        winner_id: session.winner_id.clone(),
        loser_id,
        is_draw: session.winner_id.is_none() && !reason.is_forfeit(),
        move_count: session.moves.len() as u32,
        duration_secs: session.duration().map(|duration| duration.as_secs()),
        reason,
        forfeited: reason.is_forfeit(),
        completed_at: session.completed_at.unwrap_or(session.updated_at),
    })
}

/// Fold one finished game into a player's aggregates.
pub fn apply_result(
    mut stats: PlayerStatsEntity,
    entry: &HistoryEntryEntity,
    moves_made: u32,
    tiles_drawn: u32,
) -> PlayerStatsEntity {
    let won = entry.winner_id.as_deref() == Some(stats.player_id.as_str());
    let lost = entry.winner_id.is_some() && !won;
    let previous_games = stats.games_played;

    stats.games_played += 1;
    stats.moves_made += moves_made;
    stats.tiles_drawn += tiles_drawn;

    if let Some(duration) = entry.duration_secs {
        stats.average_duration_secs = (stats.average_duration_secs * f64::from(previous_games)
            + duration as f64)
            / f64::from(stats.games_played);
    }

    if won {
        stats.games_won += 1;
        stats.current_win_streak += 1;
        stats.best_win_streak = stats.best_win_streak.max(stats.current_win_streak);
        if let Some(duration) = entry.duration_secs {
            if stats.fastest_win_secs.is_none_or(|fastest| duration < fastest) {
                stats.fastest_win_secs = Some(duration);
            }
        }
    } else if lost {
        stats.games_lost += 1;
        stats.current_win_streak = 0;
    } else if entry.is_draw {
        stats.games_drawn += 1;
    }

    stats.last_played_at = Some(
        stats
            .last_played_at
            .map_or(entry.completed_at, |last| last.max(entry.completed_at)),
    );
    stats
}

/// Finished games of `player_id`, most recent first.
pub async fn list_history(
    state: &SharedState,
    player_id: String,
) -> Result<Vec<HistoryEntryEntity>, ServiceError> {
    let store = state.require_game_store().await?;
    Ok(store.list_history(player_id).await?)
}

/// Aggregates of `player_id` for `kind`; zeroed when nothing was recorded yet.
pub async fn get_player_stats(
    state: &SharedState,
    player_id: String,
    kind: GameKind,
) -> Result<PlayerStatsEntity, ServiceError> {
    let store = state.require_game_store().await?;
    let stats = store.find_stats(player_id.clone(), kind).await?;
    Ok(stats.unwrap_or_else(|| PlayerStatsEntity::empty(player_id, kind)))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;

    use super::*;
    use crate::state::session::WinReason;

    fn entry(winner: Option<&str>, reason: WinReason, duration_secs: Option<u64>) -> HistoryEntryEntity {
        HistoryEntryEntity {
            session_id: Uuid::new_v4(),
            kind: GameKind::TicTacToe,
            participants: vec!["ana".into(), "ben".into()],
            winner_id: winner.map(str::to_owned),
            loser_id: None,
            is_draw: winner.is_none() && !reason.is_forfeit(),
            move_count: 5,
            duration_secs,
            reason,
            forfeited: reason.is_forfeit(),
            completed_at: SystemTime::UNIX_EPOCH + Duration::from_secs(1_000),
        }
    }

    #[test]
    fn wins_extend_the_streak_and_losses_reset_it() {
        let mut stats = PlayerStatsEntity::empty("ana", GameKind::TicTacToe);
        stats = apply_result(stats, &entry(Some("ana"), WinReason::Line, Some(40)), 3, 0);
        stats = apply_result(stats, &entry(Some("ana"), WinReason::Line, Some(20)), 3, 0);
        assert_eq!(stats.current_win_streak, 2);
        assert_eq!(stats.best_win_streak, 2);
        assert_eq!(stats.fastest_win_secs, Some(20));

        stats = apply_result(stats, &entry(Some("ben"), WinReason::Line, Some(60)), 2, 0);
        assert_eq!(stats.current_win_streak, 0);
        assert_eq!(stats.best_win_streak, 2);
        assert_eq!(stats.games_played, 3);
        assert_eq!(stats.games_won, 2);
        assert_eq!(stats.games_lost, 1);
        assert_eq!(stats.moves_made, 8);
        assert!((stats.average_duration_secs - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn untracked_durations_never_set_the_fastest_win() {
        let stats = PlayerStatsEntity::empty("ana", GameKind::TicTacToe);
        let stats = apply_result(stats, &entry(Some("ana"), WinReason::Line, None), 3, 0);
        assert_eq!(stats.fastest_win_secs, None);
        assert_eq!(stats.games_won, 1);
    }

    #[test]
    fn draws_and_abandons_are_neither_wins_nor_losses() {
        let stats = PlayerStatsEntity::empty("ana", GameKind::TicTacToe);
        let stats = apply_result(stats, &entry(None, WinReason::Draw, Some(30)), 5, 0);
        assert_eq!(stats.games_drawn, 1);

        let stats = apply_result(stats, &entry(None, WinReason::Abandoned, None), 0, 0);
        assert_eq!(stats.games_played, 2);
        assert_eq!(stats.games_drawn, 1);
        assert_eq!(stats.games_lost, 0);
    }
}
