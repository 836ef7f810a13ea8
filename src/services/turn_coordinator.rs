use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    engine::{
        dominoes::{self, DominoesPlayer, DominoesResult, DominoesTable, Side, Tile},
        tictactoe::{self, MarkOutcome},
    },
    error::ServiceError,
    services::matchmaking::not_a_participant,
    state::{
        SharedState,
        lifecycle::SessionStatus,
        session::{Board, GameKind, GameSession, MoveRecord, MovePayload, WinReason},
        transitions::run_session_transaction,
    },
};

/// Place the acting player's symbol on a tic-tac-toe board.
pub async fn play_mark(
    state: &SharedState,
    session_id: Uuid,
    player_id: &str,
    position: usize,
) -> Result<GameSession, ServiceError> {
    let (_, session) = run_session_transaction(state, session_id, |session| {
        ensure_turn(session, GameKind::TicTacToe, player_id)?;
        let symbol = session
            .player(player_id)
            .and_then(|player| player.symbol())
            .ok_or_else(|| ServiceError::InvalidState("player has no symbol".into()))?;
        let Board::TicTacToe(board) = &mut session.board else {
            return Err(mismatched_board(GameKind::TicTacToe));
        };

        let outcome = tictactoe::play_move(board, symbol, position)?;
        let now = SystemTime::now();
        session.moves.push(MoveRecord {
            player_id: player_id.to_owned(),
            payload: MovePayload::Mark { position, symbol },
            timestamp: now,
        });

        match outcome {
            MarkOutcome::Continue => session.advance_turn(player_id),
            MarkOutcome::Win { symbol, .. } => {
                let winner = session
                    .player_with_symbol(symbol)
                    .map(|player| player.id.clone());
                session.finish(winner, WinReason::Line, now)?;
            }
            MarkOutcome::Draw => session.finish(None, WinReason::Draw, now)?,
        }
        Ok(())
    })
    .await?;

    log_if_finished(&session);
    Ok(session)
}

/// Lay a tile from the acting player's hand against one end of the chain.
pub async fn place_tile(
    state: &SharedState,
    session_id: Uuid,
    player_id: &str,
    tile: Tile,
    side: Side,
) -> Result<GameSession, ServiceError> {
    let (_, session) = run_session_transaction(state, session_id, |session| {
        ensure_turn(session, GameKind::Dominoes, player_id)?;
        let mover = seat_of(session, player_id)?;
        let (table, player) = dominoes_seat(session, mover)?;
        dominoes::place_tile(table, player, tile, side)?;

        let now = SystemTime::now();
        session.moves.push(MoveRecord {
            player_id: player_id.to_owned(),
            payload: MovePayload::Tile { tile, side },
            timestamp: now,
        });

        let result = match &session.board {
            Board::Dominoes(table) => dominoes::evaluate(table, &session.dominoes_hands(), mover),
            Board::TicTacToe(_) => return Err(mismatched_board(GameKind::Dominoes)),
        };
        match result {
            Some(result) => finish_dominoes(session, result, now)?,
            None => session.advance_turn(player_id),
        }
        Ok(())
    })
    .await?;

    log_if_finished(&session);
    Ok(session)
}

/// Take a tile from the draw pile. The turn stays with the player.
pub async fn draw_tile(
    state: &SharedState,
    session_id: Uuid,
    player_id: &str,
) -> Result<(Tile, GameSession), ServiceError> {
    run_session_transaction(state, session_id, |session| {
        ensure_turn(session, GameKind::Dominoes, player_id)?;
        let seat = seat_of(session, player_id)?;
        let (table, player) = dominoes_seat(session, seat)?;
        Ok(dominoes::draw_tile(table, player)?)
    })
    .await
}

/// Give up the turn when no tile can be laid. Ends the game once it is blocked.
pub async fn pass_turn(
    state: &SharedState,
    session_id: Uuid,
    player_id: &str,
) -> Result<GameSession, ServiceError> {
    let (_, session) = run_session_transaction(state, session_id, |session| {
        ensure_turn(session, GameKind::Dominoes, player_id)?;
        let seat = seat_of(session, player_id)?;
        let (table, player) = dominoes_seat(session, seat)?;
        dominoes::pass_turn(table, player)?;

        let blocked = match &session.board {
            Board::Dominoes(table) => dominoes::is_game_blocked(table, &session.dominoes_hands()),
            Board::TicTacToe(_) => false,
        };
        if blocked {
            let winner = dominoes::winner_by_score(&session.dominoes_hands());
            finish_dominoes(session, DominoesResult::Blocked { winner }, SystemTime::now())?;
        } else {
            session.advance_turn(player_id);
        }
        Ok(())
    })
    .await?;

    log_if_finished(&session);
    Ok(session)
}

/// Checks shared by every turn-taking operation, in the order errors are reported.
fn ensure_turn(session: &GameSession, kind: GameKind, player_id: &str) -> Result<(), ServiceError> {
    if session.kind != kind {
        return Err(ServiceError::InvalidInput(format!(
            "this move is not available in a {} game",
            session.kind
        )));
    }
    if !session.is_participant(player_id) {
        return Err(not_a_participant(player_id));
    }
    if session.status != SessionStatus::Playing {
        return Err(ServiceError::GameNotPlaying {
            status: session.status,
        });
    }
    if session.current_player_id.as_deref() != Some(player_id) {
        return Err(ServiceError::NotYourTurn);
    }
    Ok(())
}

fn seat_of(session: &GameSession, player_id: &str) -> Result<usize, ServiceError> {
    session
        .player_index(player_id)
        .ok_or_else(|| not_a_participant(player_id))
}

fn dominoes_seat(
    session: &mut GameSession,
    seat: usize,
) -> Result<(&mut DominoesTable, &mut DominoesPlayer), ServiceError> {
    let GameSession { board, players, .. } = session;
    match (board, players.get_mut(seat).and_then(|p| p.dominoes_mut())) {
        (Board::Dominoes(table), Some(player)) => Ok((table, player)),
        _ => Err(mismatched_board(GameKind::Dominoes)),
    }
}

fn finish_dominoes(
    session: &mut GameSession,
    result: DominoesResult,
    now: SystemTime,
) -> Result<(), ServiceError> {
    for player in &mut session.players {
        if let Some(state) = player.dominoes_mut() {
            state.score = state.pip_total();
        }
    }

    let seat_id = |seat: usize| session.players.get(seat).map(|p| p.id.clone());
    let (winner, reason) = match result {
        DominoesResult::EmptiedHand { winner } => (seat_id(winner), WinReason::EmptiedHand),
        DominoesResult::Blocked {
            winner: Some(winner),
        } => (seat_id(winner), WinReason::LowestScore),
        DominoesResult::Blocked { winner: None } => (None, WinReason::BlockedTie),
    };
    session.finish(winner, reason, now)?;
    Ok(())
}

fn mismatched_board(kind: GameKind) -> ServiceError {
    ServiceError::InvalidState(format!("session does not hold a {kind} board"))
}

fn log_if_finished(session: &GameSession) {
    if session.status == SessionStatus::Finished {
        info!(
            session_id = %session.id,
            winner = ?session.winner_id,
            reason = ?session.win_reason,
            moves = session.moves.len(),
            "game finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::game_store::{GameStore, memory::MemoryGameStore},
        engine::dominoes::PlacedTile,
        services::{
            history,
            matchmaking::{
                GameSetup, PlayerIdentity, create_game, join_game_by_code, set_player_ready,
                start_game,
            },
        },
        state::{
            AppState,
            session::{Player, PlayerGameState, Profile},
        },
    };

    fn identity(id: &str) -> PlayerIdentity {
        PlayerIdentity {
            id: id.into(),
            profile: Profile {
                display_name: id.to_uppercase(),
                avatar_url: None,
            },
        }
    }

    async fn started(setup: GameSetup) -> (SharedState, MemoryGameStore, GameSession) {
        let store = MemoryGameStore::new();
        let state = AppState::with_store(AppConfig::default(), Arc::new(store.clone())).await;
        let created = create_game(&state, identity("ana"), setup).await.unwrap();
        join_game_by_code(&state, &created.room_code, identity("ben"))
            .await
            .unwrap();
        set_player_ready(&state, created.id, "ana", true).await.unwrap();
        set_player_ready(&state, created.id, "ben", true).await.unwrap();
        let session = start_game(&state, created.id, "ana").await.unwrap();
        (state, store, session)
    }

    fn dominoes_player(id: &str, hand: &[Tile]) -> Player {
        Player {
            id: id.into(),
            profile: Profile {
                display_name: id.to_uppercase(),
                avatar_url: None,
            },
            state: PlayerGameState::Dominoes(DominoesPlayer::with_hand(hand.to_vec())),
            is_ready: true,
        }
    }

    /// Ana to move on a chain of a single [6|6] with an empty pile.
    async fn endgame(ana: &[Tile], ben: &[Tile]) -> (SharedState, MemoryGameStore, Uuid) {
        let table = DominoesTable {
            placements: vec![PlacedTile {
                tile: Tile::new(6, 6),
                side: Side::Left,
                is_double: true,
            }],
            left_end: Some(6),
            right_end: Some(6),
            draw_pile: Vec::new(),
        };
        let now = SystemTime::now();
        let mut session = GameSession::new(
            "DOMINO".into(),
            GameKind::Dominoes,
            dominoes_player("ana", ana),
            Board::Dominoes(table),
            now,
        );
        session.players.push(dominoes_player("ben", ben));
        session.status = SessionStatus::Playing;
        session.started_at = Some(now);
        session.current_player_id = Some("ana".into());

        let store = MemoryGameStore::new();
        store.insert_game(session.clone().into()).await.unwrap();
        let state = AppState::with_store(AppConfig::default(), Arc::new(store.clone())).await;
        (state, store, session.id)
    }

    fn score(session: &GameSession, player_id: &str) -> u32 {
        session.player(player_id).unwrap().dominoes().unwrap().score
    }

    const CLASSIC: GameSetup = GameSetup::TicTacToe {
        size: 3,
        win_condition: 3,
    };

    #[tokio::test]
    async fn turns_alternate_after_each_mark() {
        let (state, _, session) = started(CLASSIC).await;
        let moves = [("ana", 4), ("ben", 0), ("ana", 8)];
        for (index, (player, position)) in moves.into_iter().enumerate() {
            let after = play_mark(&state, session.id, player, position).await.unwrap();
            assert_eq!(after.moves.len(), index + 1);
            assert_eq!(after.moves[index].player_id, player);
            let expected_next = if player == "ana" { "ben" } else { "ana" };
            assert_eq!(after.current_player_id.as_deref(), Some(expected_next));
        }
    }

    #[tokio::test]
    async fn out_of_turn_moves_change_nothing() {
        let (state, store, session) = started(CLASSIC).await;
        let before = store.find_game(session.id).await.unwrap().unwrap();

        let err = play_mark(&state, session.id, "ben", 0).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotYourTurn));
        assert_eq!(store.find_game(session.id).await.unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn illegal_marks_are_rejected() {
        let (state, _, session) = started(CLASSIC).await;
        play_mark(&state, session.id, "ana", 4).await.unwrap();
        assert!(matches!(
            play_mark(&state, session.id, "ben", 4).await,
            Err(ServiceError::InvalidMove(_))
        ));
        assert!(matches!(
            play_mark(&state, session.id, "cleo", 1).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            draw_tile(&state, session.id, "ben").await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn left_column_finishes_the_game() {
        let (state, store, session) = started(CLASSIC).await;
        for (player, position) in [("ana", 0), ("ben", 1), ("ana", 3), ("ben", 4)] {
            play_mark(&state, session.id, player, position).await.unwrap();
        }
        let finished = play_mark(&state, session.id, "ana", 6).await.unwrap();

        assert_eq!(finished.status, SessionStatus::Finished);
        assert_eq!(finished.winner_id.as_deref(), Some("ana"));
        assert_eq!(finished.win_reason, Some(WinReason::Line));
        assert_eq!(finished.current_player_id, None);
        let Board::TicTacToe(board) = &finished.board else {
            panic!("tic-tac-toe board expected");
        };
        assert_eq!(board.winning_line, Some(vec![0, 3, 6]));
        assert_eq!(store.history_len(), 1);

        assert!(matches!(
            play_mark(&state, session.id, "ben", 8).await,
            Err(ServiceError::GameNotPlaying {
                status: SessionStatus::Finished
            })
        ));
    }

    #[tokio::test]
    async fn dominoes_opening_hands_the_turn_over() {
        let (_, _, session) = started(GameSetup::Dominoes).await;
        let Board::Dominoes(table) = &session.board else {
            panic!("dominoes board expected");
        };

        assert_eq!(table.draw_pile.len(), 14);
        match session.moves.first() {
            Some(opening) => {
                let MovePayload::Tile { tile, .. } = opening.payload else {
                    panic!("tile placement expected");
                };
                assert!(tile.is_double());
                assert_eq!(table.placements.len(), 1);
                assert_ne!(session.current_player_id.as_ref(), Some(&opening.player_id));
                let opener = session.player(&opening.player_id).unwrap();
                assert_eq!(opener.dominoes().unwrap().tiles_count(), 6);
            }
            None => {
                assert!(table.placements.is_empty());
                assert_eq!(session.current_player_id.as_deref(), Some("ana"));
            }
        }
    }

    #[tokio::test]
    async fn dominoes_turn_requires_a_legal_action() {
        let (state, _, session) = started(GameSetup::Dominoes).await;
        let current = session.current_player_id.clone().unwrap();
        let other = session.opponent_of(&current).unwrap().id.clone();

        assert!(matches!(
            pass_turn(&state, session.id, &other).await,
            Err(ServiceError::NotYourTurn)
        ));

        let Board::Dominoes(table) = &session.board else {
            panic!("dominoes board expected");
        };
        let hand = &session.player(&current).unwrap().dominoes().unwrap().hand;
        let playable = hand.iter().copied().find_map(|tile| {
            let options = dominoes::can_place_tile(tile, table.left_end, table.right_end);
            [Side::Left, Side::Right]
                .into_iter()
                .find(|side| options.allows(*side))
                .map(|side| (tile, side))
        });

        match playable {
            Some((tile, side)) => {
                assert!(matches!(
                    draw_tile(&state, session.id, &current).await,
                    Err(ServiceError::InvalidMove(_))
                ));
                let after = place_tile(&state, session.id, &current, tile, side)
                    .await
                    .unwrap();
                assert_eq!(after.moves.len(), session.moves.len() + 1);
                assert_eq!(after.current_player_id.as_deref(), Some(other.as_str()));
            }
            None => {
                assert!(matches!(
                    pass_turn(&state, session.id, &current).await,
                    Err(ServiceError::InvalidMove(_))
                ));
                let (drawn, after) = draw_tile(&state, session.id, &current).await.unwrap();
                let hand = &after.player(&current).unwrap().dominoes().unwrap().hand;
                assert!(hand.contains(&drawn));
                assert_eq!(after.current_player_id.as_deref(), Some(current.as_str()));
            }
        }
    }

    #[tokio::test]
    async fn laying_the_last_tile_wins() {
        let (state, store, id) = endgame(&[Tile::new(6, 3)], &[Tile::new(2, 2)]).await;

        let finished = place_tile(&state, id, "ana", Tile::new(3, 6), Side::Right)
            .await
            .unwrap();
        assert_eq!(finished.status, SessionStatus::Finished);
        assert_eq!(finished.winner_id.as_deref(), Some("ana"));
        assert_eq!(finished.win_reason, Some(WinReason::EmptiedHand));
        assert_eq!((score(&finished, "ana"), score(&finished, "ben")), (0, 4));
        assert_eq!(store.history_len(), 1);

        let entries = history::list_history(&state, "ben".into()).await.unwrap();
        assert_eq!(entries[0].reason, WinReason::EmptiedHand);
        assert_eq!(entries[0].loser_id.as_deref(), Some("ben"));
    }

    #[tokio::test]
    async fn a_blocked_chain_goes_to_the_lighter_hand() {
        let (state, store, id) = endgame(
            &[Tile::new(6, 1), Tile::new(2, 2)],
            &[Tile::new(4, 5)],
        )
        .await;

        let finished = place_tile(&state, id, "ana", Tile::new(6, 1), Side::Right)
            .await
            .unwrap();
        assert_eq!(finished.status, SessionStatus::Finished);
        assert_eq!(finished.winner_id.as_deref(), Some("ana"));
        assert_eq!(finished.win_reason, Some(WinReason::LowestScore));
        assert_eq!((score(&finished, "ana"), score(&finished, "ben")), (4, 9));

        let entries = history::list_history(&state, "ana".into()).await.unwrap();
        assert_eq!(entries[0].winner_id.as_deref(), Some("ana"));
        assert!(!entries[0].is_draw);
        assert_eq!(store.history_len(), 1);
    }

    #[tokio::test]
    async fn passing_into_a_block_with_equal_hands_is_a_draw() {
        let (state, store, id) = endgame(&[Tile::new(1, 2)], &[Tile::new(0, 3)]).await;

        let finished = pass_turn(&state, id, "ana").await.unwrap();
        assert_eq!(finished.status, SessionStatus::Finished);
        assert_eq!(finished.winner_id, None);
        assert_eq!(finished.win_reason, Some(WinReason::BlockedTie));
        assert_eq!((score(&finished, "ana"), score(&finished, "ben")), (3, 3));
        assert_eq!(finished.current_player_id, None);

        let entries = history::list_history(&state, "ben".into()).await.unwrap();
        assert!(entries[0].is_draw);
        assert_eq!(entries[0].loser_id, None);
        assert_eq!(store.history_len(), 1);
    }

    #[tokio::test]
    async fn passing_with_a_playable_opponent_hands_over_the_turn() {
        let (state, _, id) = endgame(&[Tile::new(1, 2)], &[Tile::new(6, 0)]).await;

        let after = pass_turn(&state, id, "ana").await.unwrap();
        assert_eq!(after.status, SessionStatus::Playing);
        assert_eq!(after.current_player_id.as_deref(), Some("ben"));
    }
}
