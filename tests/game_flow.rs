use std::{sync::Arc, time::Duration};

use duoplay_back::{
    config::AppConfig,
    dao::{
        game_store::{GameStore, memory::MemoryGameStore},
        storage::StorageError,
    },
    engine::dominoes::{HAND_SIZE, full_set},
    error::ServiceError,
    services::{
        history::{self, RecordOutcome},
        matchmaking::{self, GameSetup, LeaveOutcome, PlayerIdentity},
        turn_coordinator,
    },
    state::{
        AppState, SharedState,
        lifecycle::SessionStatus,
        session::{GameKind, GameSession, Profile, WinReason},
    },
};
use uuid::Uuid;

fn identity(id: &str) -> PlayerIdentity {
    PlayerIdentity {
        id: id.into(),
        profile: Profile {
            display_name: id.to_uppercase(),
            avatar_url: None,
        },
    }
}

fn fast_retries() -> AppConfig {
    AppConfig {
        retry_backoff: Duration::from_millis(1),
        ..AppConfig::default()
    }
}

async fn started(setup: GameSetup) -> (SharedState, MemoryGameStore, GameSession) {
    let store = MemoryGameStore::new();
    let state = AppState::with_store(fast_retries(), Arc::new(store.clone())).await;

    let created = matchmaking::create_game(&state, identity("ana"), setup)
        .await
        .unwrap();
    matchmaking::join_game_by_code(&state, &created.room_code.to_lowercase(), identity("ben"))
        .await
        .unwrap();
    for player in ["ana", "ben"] {
        matchmaking::set_player_ready(&state, created.id, player, true)
            .await
            .unwrap();
    }
    let session = matchmaking::start_game(&state, created.id, "ana")
        .await
        .unwrap();
    (state, store, session)
}

fn classic() -> GameSetup {
    GameSetup::TicTacToe {
        size: 3,
        win_condition: 3,
    }
}

/// Ana (X) takes the top row while Ben fills the middle one.
async fn play_top_row_win(state: &SharedState, id: Uuid) -> GameSession {
    let mut last = None;
    for (player, position) in [("ana", 0), ("ben", 3), ("ana", 1), ("ben", 4), ("ana", 2)] {
        last = Some(
            turn_coordinator::play_mark(state, id, player, position)
                .await
                .unwrap(),
        );
    }
    last.unwrap()
}

#[tokio::test]
async fn finished_games_land_in_history_and_stats() {
    let (state, store, session) = started(classic()).await;
    let finished = play_top_row_win(&state, session.id).await;

    assert_eq!(finished.status, SessionStatus::Finished);
    assert_eq!(finished.winner_id.as_deref(), Some("ana"));
    assert_eq!(finished.win_reason, Some(WinReason::Line));
    assert_eq!(finished.current_player_id, None);
    assert!(finished.completed_at.is_some());
    assert_eq!(store.history_len(), 1);

    let ana_history = history::list_history(&state, "ana".into()).await.unwrap();
    assert_eq!(ana_history.len(), 1);
    assert_eq!(ana_history[0].loser_id.as_deref(), Some("ben"));
    assert_eq!(ana_history[0].move_count, 5);
    assert!(!ana_history[0].is_draw);

    let ana = history::get_player_stats(&state, "ana".into(), GameKind::TicTacToe)
        .await
        .unwrap();
    assert_eq!((ana.games_played, ana.games_won, ana.games_lost), (1, 1, 0));
    assert_eq!(ana.current_win_streak, 1);
    assert_eq!(ana.moves_made, 3);

    let ben = history::get_player_stats(&state, "ben".into(), GameKind::TicTacToe)
        .await
        .unwrap();
    assert_eq!((ben.games_played, ben.games_won, ben.games_lost), (1, 0, 1));
    assert_eq!(ben.current_win_streak, 0);

    let untouched = history::get_player_stats(&state, "ana".into(), GameKind::Dominoes)
        .await
        .unwrap();
    assert_eq!(untouched.games_played, 0);

    assert!(matches!(
        turn_coordinator::play_mark(&state, session.id, "ben", 8).await,
        Err(ServiceError::GameNotPlaying {
            status: SessionStatus::Finished
        })
    ));
}

#[tokio::test]
async fn transient_write_failures_are_retried() {
    let (state, store, session) = started(classic()).await;

    store.fail_next_game_writes(2);
    let after = turn_coordinator::play_mark(&state, session.id, "ana", 4)
        .await
        .unwrap();
    assert_eq!(after.moves.len(), 1);
    assert_eq!(after.revision, session.revision + 1);

    store.fail_next_game_writes(10);
    let err = turn_coordinator::play_mark(&state, session.id, "ben", 0)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Storage(StorageError::Unavailable { .. })
    ));
    store.fail_next_game_writes(0);

    let stored = matchmaking::get_game(&state, session.id).await.unwrap();
    assert_eq!(stored.moves.len(), 1);
    assert_eq!(stored.current_player_id.as_deref(), Some("ben"));
}

#[tokio::test]
async fn recording_failures_leave_the_game_finished() {
    let (state, store, session) = started(classic()).await;
    store.fail_history_writes(true);

    let finished = play_top_row_win(&state, session.id).await;
    assert_eq!(finished.status, SessionStatus::Finished);
    assert_eq!(store.history_len(), 0);

    store.fail_history_writes(false);
    assert_eq!(
        history::record_completion(&store, &finished).await,
        RecordOutcome::Recorded
    );
    assert_eq!(
        history::record_completion(&store, &finished).await,
        RecordOutcome::AlreadyRecorded
    );

    let ana = store
        .find_stats("ana".into(), GameKind::TicTacToe)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ana.games_played, 1);
    assert_eq!(store.history_len(), 1);
}

#[tokio::test]
async fn dominoes_open_with_the_highest_double() {
    let (_, _, session) = started(GameSetup::Dominoes).await;
    assert_eq!(session.status, SessionStatus::Playing);

    let hands = session.dominoes_hands();
    let total: usize = hands.iter().map(|hand| hand.len()).sum::<usize>()
        + match &session.board {
            duoplay_back::state::session::Board::Dominoes(table) => {
                table.draw_pile.len() + table.placements.len()
            }
            _ => unreachable!("dominoes session"),
        };
    assert_eq!(total, full_set().len());

    match session.moves.first() {
        Some(opening) => {
            assert_eq!(hands.iter().map(|h| h.len()).sum::<usize>(), 2 * HAND_SIZE - 1);
            assert_ne!(session.current_player_id.as_deref(), Some(opening.player_id.as_str()));
        }
        None => assert_eq!(session.current_player_id.as_deref(), Some("ana")),
    }
}

#[tokio::test]
async fn leaving_mid_game_forfeits() {
    let (state, store, session) = started(classic()).await;

    let LeaveOutcome::Left(after) = matchmaking::leave_game(&state, session.id, "ben")
        .await
        .unwrap()
    else {
        panic!("the session should survive a single departure");
    };
    assert_eq!(after.status, SessionStatus::Finished);
    assert_eq!(after.winner_id.as_deref(), Some("ana"));
    assert_eq!(after.win_reason, Some(WinReason::OpponentLeft));
    assert_eq!(store.history_len(), 1);

    let entries = history::list_history(&state, "ana".into()).await.unwrap();
    assert!(entries[0].forfeited);
    assert_eq!(entries[0].participants, ["ana", "ben"]);
    assert_eq!(entries[0].loser_id.as_deref(), Some("ben"));

    let ben_history = history::list_history(&state, "ben".into()).await.unwrap();
    assert_eq!(ben_history.len(), 1);

    let ben = history::get_player_stats(&state, "ben".into(), GameKind::TicTacToe)
        .await
        .unwrap();
    assert_eq!((ben.games_played, ben.games_lost), (1, 1));
    assert_eq!(ben.current_win_streak, 0);
    let ana = history::get_player_stats(&state, "ana".into(), GameKind::TicTacToe)
        .await
        .unwrap();
    assert_eq!((ana.games_played, ana.games_won), (1, 1));
}

#[tokio::test]
async fn the_last_player_out_deletes_the_room() {
    let store = MemoryGameStore::new();
    let state = AppState::with_store(fast_retries(), Arc::new(store.clone())).await;
    let created = matchmaking::create_game(&state, identity("ana"), classic())
        .await
        .unwrap();
    matchmaking::join_game_by_code(&state, &created.room_code, identity("ben"))
        .await
        .unwrap();

    let LeaveOutcome::Left(waiting) = matchmaking::leave_game(&state, created.id, "ana")
        .await
        .unwrap()
    else {
        panic!("ben is still seated");
    };
    assert_eq!(waiting.host_id, "ben");
    assert_eq!(waiting.status, SessionStatus::Waiting);

    assert!(matches!(
        matchmaking::leave_game(&state, created.id, "ben").await,
        Ok(LeaveOutcome::Deleted)
    ));
    assert_eq!(store.game_count(), 0);
    assert!(matches!(
        matchmaking::get_game(&state, created.id).await,
        Err(ServiceError::NotFound(_))
    ));
}

#[tokio::test]
async fn degraded_backends_refuse_work() {
    let state = AppState::new(fast_retries());
    assert!(matches!(
        matchmaking::create_game(&state, identity("ana"), classic()).await,
        Err(ServiceError::Degraded)
    ));
}
