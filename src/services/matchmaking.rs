use std::time::SystemTime;

use rand::{Rng, seq::SliceRandom};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::storage::StorageError,
    engine::{
        dominoes::{self, DominoesPlayer, DominoesTable, HAND_SIZE, Side},
        tictactoe::{Symbol, TicTacToeBoard},
    },
    error::ServiceError,
    state::{
        SharedState,
        lifecycle::{SessionEvent, SessionStatus},
        session::{
            Board, GameKind, GameSession, MAX_PLAYERS, MoveRecord, MovePayload, Player,
            PlayerGameState, Profile, WinReason,
        },
        transitions::{retry_storage, run_session_transaction},
    },
};

/// Symbols a room code is drawn from; `I`, `O`, `0` and `1` are left out.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const ROOM_CODE_LENGTH: usize = 6;

/// Identity of a player as supplied by the identity provider.
#[derive(Debug, Clone)]
pub struct PlayerIdentity {
    pub id: String,
    pub profile: Profile,
}

/// Game-specific parameters chosen by the host.
#[derive(Debug, Clone, Copy)]
pub enum GameSetup {
    TicTacToe { size: usize, win_condition: usize },
    Dominoes,
}

impl GameSetup {
    pub fn kind(&self) -> GameKind {
        match self {
            GameSetup::TicTacToe { .. } => GameKind::TicTacToe,
            GameSetup::Dominoes => GameKind::Dominoes,
        }
    }
}

/// Result of a player leaving a session.
#[derive(Debug, Clone)]
pub enum LeaveOutcome {
    /// Nobody is left; the session document was removed.
    Deleted,
    /// The session lives on with the remaining player.
    Left(GameSession),
}

/// Random code over [`ROOM_CODE_ALPHABET`].
pub fn generate_room_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..ROOM_CODE_LENGTH)
        .map(|_| char::from(ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())]))
        .collect()
}

/// Canonical form of a user-typed room code.
pub fn normalize_room_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Open a new room hosted by `host` and return the waiting session.
pub async fn create_game(
    state: &SharedState,
    host: PlayerIdentity,
    setup: GameSetup,
) -> Result<GameSession, ServiceError> {
    validate_identity(&host)?;
    let store = state.require_game_store().await?;
    let room_code = allocate_room_code(state).await?;

    let (board, host_state) = match setup {
        GameSetup::TicTacToe {
            size,
            win_condition,
        } => {
            let board = TicTacToeBoard::new(size, win_condition)
                .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
            (
                Board::TicTacToe(board),
                PlayerGameState::TicTacToe { symbol: Symbol::X },
            )
        }
        GameSetup::Dominoes => {
            let mut pile = dominoes::shuffled_set(&mut rand::rng());
            let hand = dominoes::deal(&mut pile, HAND_SIZE);
            let table = DominoesTable {
                draw_pile: pile,
                ..DominoesTable::default()
            };
            (
                Board::Dominoes(table),
                PlayerGameState::Dominoes(DominoesPlayer::with_hand(hand)),
            )
        }
    };

    let host_player = Player {
        id: host.id,
        profile: host.profile,
        state: host_state,
        is_ready: false,
    };
    let session = GameSession::new(room_code, setup.kind(), host_player, board, SystemTime::now());

    retry_storage(state, "insert_game", || {
        store.insert_game(session.clone().into())
    })
    .await?;

    info!(
        session_id = %session.id,
        room_code = %session.room_code,
        kind = %session.kind,
        "game created"
    );
    Ok(session)
}

/// Pick a room code not used by any non-terminal session.
///
/// After the configured number of collisions an unchecked code is accepted.
async fn allocate_room_code(state: &SharedState) -> Result<String, ServiceError> {
    let store = state.require_game_store().await?;
    let attempts = state.config().room_code_attempts;

    for _ in 0..attempts {
        let code = generate_room_code(&mut rand::rng());
        let taken = store
            .find_games_by_room_code(code.clone(), SessionStatus::ACTIVE.to_vec())
            .await?;
        if taken.is_empty() {
            return Ok(code);
        }
    }

    let code = generate_room_code(&mut rand::rng());
    warn!(attempts, room_code = %code, "no free room code found; using an unchecked one");
    Ok(code)
}

/// Seat `player` in the waiting room identified by `room_code`.
pub async fn join_game_by_code(
    state: &SharedState,
    room_code: &str,
    player: PlayerIdentity,
) -> Result<GameSession, ServiceError> {
    validate_identity(&player)?;
    let store = state.require_game_store().await?;
    let code = normalize_room_code(room_code);

    let mut candidates = store
        .find_games_by_room_code(
            code.clone(),
            vec![
                SessionStatus::Waiting,
                SessionStatus::Playing,
                SessionStatus::Paused,
                SessionStatus::Finished,
            ],
        )
        .await?;
    if candidates.is_empty() {
        return Err(ServiceError::NotFound(format!("no game with code {code}")));
    }
    candidates.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let Some(waiting) = candidates
        .iter()
        .find(|game| game.status == SessionStatus::Waiting)
    else {
        return Err(ServiceError::AlreadyStarted);
    };

    let (_, session) = run_session_transaction(state, waiting.id, |session| {
        if session.status != SessionStatus::Waiting {
            return Err(ServiceError::AlreadyStarted);
        }
        if session.is_participant(&player.id) {
            return Err(ServiceError::AlreadyJoined);
        }
        if session.players.len() >= MAX_PLAYERS {
            return Err(ServiceError::Full);
        }

        let player_state = match &mut session.board {
            Board::TicTacToe(_) => {
                let taken = session.players.iter().find_map(Player::symbol);
                PlayerGameState::TicTacToe {
                    symbol: taken.map_or(Symbol::X, Symbol::opponent),
                }
            }
            Board::Dominoes(table) => PlayerGameState::Dominoes(DominoesPlayer::with_hand(
                dominoes::deal(&mut table.draw_pile, HAND_SIZE),
            )),
        };
        session.players.push(Player {
            id: player.id.clone(),
            profile: player.profile.clone(),
            state: player_state,
            is_ready: false,
        });
        Ok(())
    })
    .await?;

    info!(session_id = %session.id, player_id = %player.id, "player joined");
    Ok(session)
}

/// Set the readiness flag of `player_id`. Setting the current value again changes nothing.
pub async fn set_player_ready(
    state: &SharedState,
    session_id: Uuid,
    player_id: &str,
    is_ready: bool,
) -> Result<GameSession, ServiceError> {
    let (_, session) = run_session_transaction(state, session_id, |session| {
        if session.status != SessionStatus::Waiting {
            return Err(ServiceError::AlreadyStarted);
        }
        let player = session
            .player_mut(player_id)
            .ok_or_else(|| not_a_participant(player_id))?;
        player.is_ready = is_ready;
        Ok(())
    })
    .await?;

    Ok(session)
}

/// Start the game: host only, two ready players, `waiting` only.
///
/// Dominoes opens with the highest double, laid automatically, and the turn goes to the
/// other player. Tic-tac-toe opens with `X`.
pub async fn start_game(
    state: &SharedState,
    session_id: Uuid,
    host_id: &str,
) -> Result<GameSession, ServiceError> {
    let (_, session) = run_session_transaction(state, session_id, |session| {
        if session.host_id != host_id {
            return Err(ServiceError::Unauthorized(
                "only the host can start the game".into(),
            ));
        }
        if session.status != SessionStatus::Waiting {
            return Err(ServiceError::AlreadyStarted);
        }
        if session.players.len() != MAX_PLAYERS {
            return Err(ServiceError::InvalidState(
                "two players are needed to start".into(),
            ));
        }
        if !session.players.iter().all(|player| player.is_ready) {
            return Err(ServiceError::InvalidState(
                "every player must be ready".into(),
            ));
        }

        let now = SystemTime::now();
        session.apply_event(SessionEvent::Start)?;
        session.started_at = Some(now);
        open_game(session, now)
    })
    .await?;

    info!(
        session_id = %session.id,
        opener = ?session.current_player_id,
        "game started"
    );
    Ok(session)
}

fn open_game(session: &mut GameSession, now: SystemTime) -> Result<(), ServiceError> {
    if let Board::TicTacToe(_) = session.board {
        session.current_player_id = session
            .player_with_symbol(Symbol::X)
            .map(|player| player.id.clone());
        return Ok(());
    }

    let opening = dominoes::determine_starting_player(&session.dominoes_hands());
    let Some((opener_index, tile)) = opening else {
        let host_id = session.host_id.clone();
        if let Some(host) = session.player_mut(&host_id).and_then(Player::dominoes_mut) {
            dominoes::begin_turn(host);
        }
        session.current_player_id = Some(host_id);
        return Ok(());
    };

    let opener_id = session.players[opener_index].id.clone();
    let GameSession { board, players, .. } = &mut *session;
    let (Board::Dominoes(table), Some(opener)) = (
        board,
        players[opener_index].dominoes_mut(),
    ) else {
        return Err(ServiceError::InvalidState(
            "dominoes session without a dominoes table".into(),
        ));
    };
    dominoes::place_tile(table, opener, tile, Side::Left)?;

    session.moves.push(MoveRecord {
        player_id: opener_id.clone(),
        payload: MovePayload::Tile {
            tile,
            side: Side::Left,
        },
        timestamp: now,
    });
    session.advance_turn(&opener_id);
    Ok(())
}

/// Remove `player_id` from the session.
///
/// The last player leaving deletes the session. Leaving a running game hands the win to
/// the opponent. In a waiting room the remaining player becomes host and a dominoes
/// hand goes back to the pile. Finished sessions are left untouched.
pub async fn leave_game(
    state: &SharedState,
    session_id: Uuid,
    player_id: &str,
) -> Result<LeaveOutcome, ServiceError> {
    let attempts = state.config().transaction_attempts;
    let mut attempt = 1;

    loop {
        let (last_player, session) = run_session_transaction(state, session_id, |session| {
            if !session.is_participant(player_id) {
                return Err(not_a_participant(player_id));
            }
            if session.status.is_terminal() {
                return Ok(false);
            }
            if session.players.len() == 1 {
                return Ok(true);
            }

            let Some(index) = session.player_index(player_id) else {
                return Err(not_a_participant(player_id));
            };
            let leaver = session.players.remove(index);
            let remaining_id = session.players[0].id.clone();

            match session.status {
                SessionStatus::Playing | SessionStatus::Paused => {
                    session.finish(
                        Some(remaining_id),
                        WinReason::OpponentLeft,
                        SystemTime::now(),
                    )?;
                    session.departed = Some(leaver);
                }
                _ => {
                    if session.host_id == leaver.id {
                        session.host_id = remaining_id;
                    }
                    if let (Board::Dominoes(table), PlayerGameState::Dominoes(hand)) =
                        (&mut session.board, leaver.state)
                    {
                        table.draw_pile.extend(hand.hand);
                        table.draw_pile.shuffle(&mut rand::rng());
                    }
                }
            }
            Ok(false)
        })
        .await?;

        if !last_player {
            info!(session_id = %session_id, player_id, status = %session.status, "player left");
            return Ok(LeaveOutcome::Left(session));
        }

        // Someone may have joined since the read; the revision keeps their seat.
        let store = state.require_game_store().await?;
        let revision = session.revision;
        match retry_storage(state, "delete_game", || store.delete_game(session_id, revision)).await
        {
            Ok(_) => break,
            Err(ServiceError::Storage(err @ StorageError::Conflict { .. }))
                if attempt < attempts =>
            {
                warn!(
                    session_id = %session_id,
                    attempt,
                    error = %err,
                    "room changed before deletion; re-reading"
                );
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }

    state.hubs().remove(session_id);
    info!(session_id = %session_id, "last player left; game deleted");
    Ok(LeaveOutcome::Deleted)
}

/// Current state of a session.
pub async fn get_game(state: &SharedState, session_id: Uuid) -> Result<GameSession, ServiceError> {
    let store = state.require_game_store().await?;
    store
        .find_game(session_id)
        .await?
        .map(Into::into)
        .ok_or_else(|| ServiceError::NotFound(format!("game {session_id}")))
}

fn validate_identity(identity: &PlayerIdentity) -> Result<(), ServiceError> {
    if identity.id.trim().is_empty() {
        return Err(ServiceError::InvalidInput("player id must not be empty".into()));
    }
    if identity.profile.display_name.trim().is_empty() {
        return Err(ServiceError::InvalidInput(
            "display name must not be empty".into(),
        ));
    }
    Ok(())
}

pub(crate) fn not_a_participant(player_id: &str) -> ServiceError {
    ServiceError::NotFound(format!("player {player_id} is not part of this game"))
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc};

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::game_store::{GameStore, memory::MemoryGameStore},
        engine::dominoes::Tile,
        state::AppState,
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

    async fn state() -> (SharedState, MemoryGameStore) {
        let store = MemoryGameStore::new();
        let state = AppState::with_store(AppConfig::default(), Arc::new(store.clone())).await;
        (state, store)
    }

    const CLASSIC: GameSetup = GameSetup::TicTacToe {
        size: 3,
        win_condition: 3,
    };

    #[test]
    fn room_codes_avoid_ambiguous_symbols() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let code = generate_room_code(&mut rng);
            assert_eq!(code.len(), ROOM_CODE_LENGTH);
            assert!(code.chars().all(|c| !"IO01".contains(c)));
            assert!(code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b)));
        }
        assert_eq!(ROOM_CODE_ALPHABET.len(), 32);
    }

    #[tokio::test]
    async fn joining_assigns_the_free_symbol() {
        let (state, _) = state().await;
        let created = create_game(&state, identity("ana"), CLASSIC).await.unwrap();
        let joined = join_game_by_code(&state, &created.room_code.to_lowercase(), identity("ben"))
            .await
            .unwrap();

        assert_eq!(joined.players.len(), 2);
        assert_eq!(joined.player("ben").unwrap().symbol(), Some(Symbol::O));
        assert_eq!(joined.status, SessionStatus::Waiting);
    }

    #[tokio::test]
    async fn join_errors_follow_their_precedence() {
        let (state, _) = state().await;
        assert!(matches!(
            join_game_by_code(&state, "ZZZZZZ", identity("ben")).await,
            Err(ServiceError::NotFound(_))
        ));

        let created = create_game(&state, identity("ana"), CLASSIC).await.unwrap();
        assert!(matches!(
            join_game_by_code(&state, &created.room_code, identity("ana")).await,
            Err(ServiceError::AlreadyJoined)
        ));
        join_game_by_code(&state, &created.room_code, identity("ben"))
            .await
            .unwrap();
        assert!(matches!(
            join_game_by_code(&state, &created.room_code, identity("cleo")).await,
            Err(ServiceError::Full)
        ));
        assert!(matches!(
            join_game_by_code(&state, &created.room_code, identity("ben")).await,
            Err(ServiceError::AlreadyJoined)
        ));
    }

    #[tokio::test]
    async fn started_rooms_cannot_be_joined() {
        let (state, _) = state().await;
        let created = create_game(&state, identity("ana"), CLASSIC).await.unwrap();
        join_game_by_code(&state, &created.room_code, identity("ben"))
            .await
            .unwrap();
        set_player_ready(&state, created.id, "ana", true).await.unwrap();
        set_player_ready(&state, created.id, "ben", true).await.unwrap();
        start_game(&state, created.id, "ana").await.unwrap();

        assert!(matches!(
            join_game_by_code(&state, &created.room_code, identity("cleo")).await,
            Err(ServiceError::AlreadyStarted)
        ));

        leave_game(&state, created.id, "ben").await.unwrap();
        let finished = get_game(&state, created.id).await.unwrap();
        assert_eq!(finished.status, SessionStatus::Finished);
        assert!(matches!(
            join_game_by_code(&state, &created.room_code, identity("cleo")).await,
            Err(ServiceError::AlreadyStarted)
        ));
    }

    #[tokio::test]
    async fn ready_is_idempotent() {
        let (state, _) = state().await;
        let created = create_game(&state, identity("ana"), CLASSIC).await.unwrap();
        let once = set_player_ready(&state, created.id, "ana", true).await.unwrap();
        let twice = set_player_ready(&state, created.id, "ana", true).await.unwrap();
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn only_the_host_starts_a_ready_room() {
        let (state, _) = state().await;
        let created = create_game(&state, identity("ana"), CLASSIC).await.unwrap();
        join_game_by_code(&state, &created.room_code, identity("ben"))
            .await
            .unwrap();

        assert!(matches!(
            start_game(&state, created.id, "ana").await,
            Err(ServiceError::InvalidState(_))
        ));
        set_player_ready(&state, created.id, "ana", true).await.unwrap();
        set_player_ready(&state, created.id, "ben", true).await.unwrap();
        assert!(matches!(
            start_game(&state, created.id, "ben").await,
            Err(ServiceError::Unauthorized(_))
        ));

        let started = start_game(&state, created.id, "ana").await.unwrap();
        assert_eq!(started.status, SessionStatus::Playing);
        assert_eq!(started.current_player_id.as_deref(), Some("ana"));
        assert!(started.started_at.is_some());
    }

    #[tokio::test]
    async fn dominoes_rooms_deal_seven_tiles_each() {
        let (state, _) = state().await;
        let created = create_game(&state, identity("ana"), GameSetup::Dominoes)
            .await
            .unwrap();
        let Board::Dominoes(table) = &created.board else {
            panic!("dominoes board expected");
        };
        assert_eq!(table.draw_pile.len(), 21);

        let joined = join_game_by_code(&state, &created.room_code, identity("ben"))
            .await
            .unwrap();
        let Board::Dominoes(table) = &joined.board else {
            panic!("dominoes board expected");
        };
        assert_eq!(table.draw_pile.len(), 14);
        assert!(
            joined
                .players
                .iter()
                .all(|player| player.dominoes().unwrap().tiles_count() == HAND_SIZE)
        );
    }

    #[tokio::test]
    async fn leaving_a_waiting_room_promotes_the_guest_and_returns_tiles() {
        let (state, _) = state().await;
        let created = create_game(&state, identity("ana"), GameSetup::Dominoes)
            .await
            .unwrap();
        join_game_by_code(&state, &created.room_code, identity("ben"))
            .await
            .unwrap();

        let LeaveOutcome::Left(session) = leave_game(&state, created.id, "ana").await.unwrap()
        else {
            panic!("session should survive");
        };
        assert_eq!(session.host_id, "ben");
        let Board::Dominoes(table) = &session.board else {
            panic!("dominoes board expected");
        };
        assert_eq!(table.draw_pile.len(), 21);
    }

    #[tokio::test]
    async fn a_returned_hand_is_not_dealt_back_as_is() {
        let (state, _) = state().await;
        let created = create_game(&state, identity("ana"), GameSetup::Dominoes)
            .await
            .unwrap();
        let joined = join_game_by_code(&state, &created.room_code, identity("ben"))
            .await
            .unwrap();
        let mut ben_hand = joined.player("ben").unwrap().dominoes().unwrap().hand.clone();

        let LeaveOutcome::Left(after) = leave_game(&state, created.id, "ben").await.unwrap()
        else {
            panic!("ana is still seated");
        };
        let Board::Dominoes(table) = &after.board else {
            panic!("dominoes board expected");
        };
        let ana_hand = &after.player("ana").unwrap().dominoes().unwrap().hand;
        let seen: HashSet<Tile> = table.draw_pile.iter().chain(ana_hand).copied().collect();
        assert_eq!(table.draw_pile.len(), 21);
        assert_eq!(seen, dominoes::full_set().into_iter().collect());

        let rejoined = join_game_by_code(&state, &created.room_code, identity("cleo"))
            .await
            .unwrap();
        let mut cleo_hand = rejoined.player("cleo").unwrap().dominoes().unwrap().hand.clone();
        let order = |tile: &Tile| (tile.left, tile.right);
        ben_hand.sort_by_key(order);
        cleo_hand.sort_by_key(order);
        assert_ne!(cleo_hand, ben_hand);
    }

    #[tokio::test]
    async fn last_player_leaving_deletes_the_game() {
        let (state, store) = state().await;
        let created = create_game(&state, identity("ana"), CLASSIC).await.unwrap();
        join_game_by_code(&state, &created.room_code, identity("ben"))
            .await
            .unwrap();

        leave_game(&state, created.id, "ben").await.unwrap();
        assert!(matches!(
            leave_game(&state, created.id, "ana").await.unwrap(),
            LeaveOutcome::Deleted
        ));
        assert!(store.find_game(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_rejects_blank_profiles_and_bad_boards() {
        let (state, _) = state().await;
        assert!(matches!(
            create_game(&state, identity(" "), CLASSIC).await,
            Err(ServiceError::InvalidInput(_))
        ));
        let bad = GameSetup::TicTacToe {
            size: 3,
            win_condition: 5,
        };
        assert!(matches!(
            create_game(&state, identity("ana"), bad).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }
}
