use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{format_system_time, validation::validate_room_code},
    engine::{
        dominoes::{PlacedTile, Side, Tile},
        tictactoe::Symbol,
    },
    services::matchmaking::{GameSetup, PlayerIdentity},
    state::{
        lifecycle::SessionStatus,
        session::{
            Board, GameKind, GameSession, MoveRecord, MovePayload, PauseInfo, PauseReason,
            Player, PlayerGameState, Profile, WinReason,
        },
    },
};

/// Display profile supplied by the client's identity provider.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ProfileInput {
    #[validate(length(min = 1, max = 40))]
    pub display_name: String,
    #[serde(default)]
    #[validate(url)]
    pub avatar_url: Option<String>,
}

/// Player taking part in a room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PlayerInput {
    #[validate(length(min = 1, max = 128))]
    pub player_id: String,
    #[validate(nested)]
    pub profile: ProfileInput,
}

impl From<PlayerInput> for PlayerIdentity {
    fn from(value: PlayerInput) -> Self {
        Self {
            id: value.player_id,
            profile: Profile {
                display_name: value.profile.display_name.trim().to_owned(),
                avatar_url: value.profile.avatar_url,
            },
        }
    }
}

/// Game to host and its parameters.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameSetupInput {
    /// n-in-a-row; defaults to the classic 3x3 board.
    TicTacToe {
        #[serde(default = "default_board_size")]
        board_size: usize,
        #[serde(default = "default_board_size")]
        win_condition: usize,
    },
    Dominoes,
}

fn default_board_size() -> usize {
    3
}

impl From<GameSetupInput> for GameSetup {
    fn from(value: GameSetupInput) -> Self {
        match value {
            GameSetupInput::TicTacToe {
                board_size,
                win_condition,
            } => GameSetup::TicTacToe {
                size: board_size,
                win_condition,
            },
            GameSetupInput::Dominoes => GameSetup::Dominoes,
        }
    }
}

/// Payload used to open a new room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateGameRequest {
    #[validate(nested)]
    pub host: PlayerInput,
    pub game: GameSetupInput,
}

/// Payload used to join a waiting room by its code.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinGameRequest {
    #[validate(custom(function = "validate_room_code"))]
    pub room_code: String,
    #[validate(nested)]
    pub player: PlayerInput,
}

/// Request carrying only the acting player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PlayerActionRequest {
    #[validate(length(min = 1))]
    pub player_id: String,
}

/// Readiness toggle.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ReadyRequest {
    #[validate(length(min = 1))]
    pub player_id: String,
    pub is_ready: bool,
}

/// Tic-tac-toe placement; `position` is a row-major cell index.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct MarkRequest {
    #[validate(length(min = 1))]
    pub player_id: String,
    pub position: usize,
}

/// Dominoes placement against one end of the chain.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct TileMoveRequest {
    #[validate(length(min = 1))]
    pub player_id: String,
    pub tile: Tile,
    pub side: Side,
}

/// Pause request; disconnect pauses can only be lifted by the same player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PauseRequest {
    #[validate(length(min = 1))]
    pub player_id: String,
    pub reason: PauseReason,
}

/// Identifies who is looking at a session, so their own hand can be included.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ViewerQuery {
    pub player_id: Option<String>,
}

/// Session as seen by one viewer.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameView {
    pub id: Uuid,
    pub room_code: String,
    pub kind: GameKind,
    pub status: SessionStatus,
    pub host_id: String,
    pub players: Vec<PlayerView>,
    pub board: BoardView,
    pub current_player_id: Option<String>,
    pub winner_id: Option<String>,
    pub win_reason: Option<WinReason>,
    pub moves: Vec<MoveView>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub updated_at: String,
    pub pause: Option<PauseView>,
}

impl GameView {
    /// Project `session` for `viewer`; only the viewer's own dominoes hand is revealed.
    pub fn for_viewer(session: &GameSession, viewer: Option<&str>) -> Self {
        Self {
            id: session.id,
            room_code: session.room_code.clone(),
            kind: session.kind,
            status: session.status,
            host_id: session.host_id.clone(),
            players: session
                .players
                .iter()
                .map(|player| PlayerView::new(player, viewer == Some(player.id.as_str())))
                .collect(),
            board: (&session.board).into(),
            current_player_id: session.current_player_id.clone(),
            winner_id: session.winner_id.clone(),
            win_reason: session.win_reason,
            moves: session.moves.iter().map(Into::into).collect(),
            created_at: format_system_time(session.created_at),
            started_at: session.started_at.map(format_system_time),
            completed_at: session.completed_at.map(format_system_time),
            updated_at: format_system_time(session.updated_at),
            pause: session.pause.as_ref().map(Into::into),
        }
    }
}

/// Public projection of a participant.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerView {
    pub id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub is_ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<Symbol>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dominoes: Option<DominoesPlayerView>,
}

impl PlayerView {
    fn new(player: &Player, reveal_hand: bool) -> Self {
        let (symbol, dominoes) = match &player.state {
            PlayerGameState::TicTacToe { symbol } => (Some(*symbol), None),
            PlayerGameState::Dominoes(state) => (
                None,
                Some(DominoesPlayerView {
                    tiles_count: state.tiles_count(),
                    hand: reveal_hand.then(|| state.hand.clone()),
                    has_drawn: state.has_drawn,
                    has_passed: state.has_passed,
                    score: state.score,
                }),
            ),
        };

        Self {
            id: player.id.clone(),
            display_name: player.profile.display_name.clone(),
            avatar_url: player.profile.avatar_url.clone(),
            is_ready: player.is_ready,
            symbol,
            dominoes,
        }
    }
}

/// Dominoes state of a participant. `hand` is only present for the viewer.
#[derive(Debug, Serialize, ToSchema)]
pub struct DominoesPlayerView {
    pub tiles_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hand: Option<Vec<Tile>>,
    pub has_drawn: bool,
    pub has_passed: bool,
    pub score: u32,
}

/// Shared board state.
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "game", rename_all = "snake_case")]
pub enum BoardView {
    TicTacToe {
        size: usize,
        win_condition: usize,
        cells: Vec<Option<Symbol>>,
        winning_line: Option<Vec<usize>>,
    },
    Dominoes {
        placements: Vec<PlacedTileView>,
        left_end: Option<u8>,
        right_end: Option<u8>,
        draw_pile_count: usize,
    },
}

impl From<&Board> for BoardView {
    fn from(value: &Board) -> Self {
        match value {
            Board::TicTacToe(board) => BoardView::TicTacToe {
                size: board.size,
                win_condition: board.win_condition,
                cells: board.cells.clone(),
                winning_line: board.winning_line.clone(),
            },
            Board::Dominoes(table) => BoardView::Dominoes {
                placements: table.placements.iter().map(Into::into).collect(),
                left_end: table.left_end,
                right_end: table.right_end,
                draw_pile_count: table.draw_pile.len(),
            },
        }
    }
}

/// Tile on the table, oriented left to right along the chain.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlacedTileView {
    pub tile: Tile,
    pub side: Side,
    pub is_double: bool,
}

impl From<&PlacedTile> for PlacedTileView {
    fn from(value: &PlacedTile) -> Self {
        Self {
            tile: value.tile,
            side: value.side,
            is_double: value.is_double,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MoveView {
    pub player_id: String,
    pub payload: MovePayload,
    pub timestamp: String,
}

impl From<&MoveRecord> for MoveView {
    fn from(value: &MoveRecord) -> Self {
        Self {
            player_id: value.player_id.clone(),
            payload: value.payload,
            timestamp: format_system_time(value.timestamp),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PauseView {
    pub paused_at: String,
    pub paused_by: String,
    pub reason: PauseReason,
    /// Player allowed to resume; `None` when either player may.
    pub resumable_by: Option<String>,
}

impl From<&PauseInfo> for PauseView {
    fn from(value: &PauseInfo) -> Self {
        Self {
            paused_at: format_system_time(value.paused_at),
            paused_by: value.paused_by.clone(),
            reason: value.reason,
            resumable_by: (value.reason == PauseReason::PlayerDisconnected)
                .then(|| value.paused_by.clone()),
        }
    }
}

/// Result of a draw: the tile taken and the updated session.
#[derive(Debug, Serialize, ToSchema)]
pub struct DrawResponse {
    pub tile: Tile,
    pub game: GameView,
}

/// Result of leaving a room.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaveResponse {
    /// The room was removed because nobody is left.
    pub deleted: bool,
    pub game: Option<GameView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResumeCheckResponse {
    pub can_resume: bool,
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::engine::dominoes::{DominoesPlayer, DominoesTable};

    fn dominoes_player(id: &str, hand: Vec<Tile>) -> Player {
        Player {
            id: id.into(),
            profile: Profile {
                display_name: id.into(),
                avatar_url: None,
            },
            state: PlayerGameState::Dominoes(DominoesPlayer::with_hand(hand)),
            is_ready: true,
        }
    }

    #[test]
    fn only_the_viewer_sees_their_hand() {
        let mut session = GameSession::new(
            "ABCDEF".into(),
            GameKind::Dominoes,
            dominoes_player("ana", vec![Tile::new(6, 6)]),
            Board::Dominoes(DominoesTable::default()),
            SystemTime::now(),
        );
        session
            .players
            .push(dominoes_player("ben", vec![Tile::new(1, 2), Tile::new(0, 0)]));

        let view = GameView::for_viewer(&session, Some("ana"));
        let ana = view.players[0].dominoes.as_ref().unwrap();
        let ben = view.players[1].dominoes.as_ref().unwrap();
        assert_eq!(ana.hand, Some(vec![Tile::new(6, 6)]));
        assert_eq!(ben.hand, None);
        assert_eq!(ben.tiles_count, 2);

        let anonymous = GameView::for_viewer(&session, None);
        assert!(anonymous.players.iter().all(|p| p.dominoes.as_ref().unwrap().hand.is_none()));
    }

    #[test]
    fn setup_defaults_to_the_classic_board() {
        let input: GameSetupInput = serde_json::from_str(r#"{ "kind": "tic_tac_toe" }"#).unwrap();
        assert!(matches!(
            GameSetup::from(input),
            GameSetup::TicTacToe {
                size: 3,
                win_condition: 3
            }
        ));
    }
}
