use std::{
    fmt,
    time::{Duration, SystemTime},
};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    engine::{
        dominoes::{self, DominoesPlayer, DominoesTable, Side, Tile},
        tictactoe::{Symbol, TicTacToeBoard},
    },
    state::lifecycle::{InvalidTransition, SessionEvent, SessionStatus, next_status},
};

/// Game played in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    TicTacToe,
    Dominoes,
}

impl GameKind {
    pub fn as_str(self) -> &'static str {
        match self {
            GameKind::TicTacToe => "tic_tac_toe",
            GameKind::Dominoes => "dominoes",
        }
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a session reached `finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WinReason {
    /// A run of marks completed the winning line.
    Line,
    /// Board filled up without a winner.
    Draw,
    /// A dominoes player laid their last tile.
    EmptiedHand,
    /// Dominoes game blocked; the lower pip total won.
    LowestScore,
    /// Dominoes game blocked with equal pip totals.
    BlockedTie,
    /// The other player left mid-game.
    OpponentLeft,
    /// Paused for too long and finalised by the sweep.
    Abandoned,
}

impl WinReason {
    /// Whether the session ended without being played out.
    pub fn is_forfeit(self) -> bool {
        matches!(self, WinReason::OpponentLeft | WinReason::Abandoned)
    }
}

/// Why a session is paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    /// A player lost connectivity; only that player can resume.
    PlayerDisconnected,
    /// A player paused on purpose; either player can resume.
    Manual,
}

/// Display profile supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Game-specific state owned by one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "game", rename_all = "snake_case")]
pub enum PlayerGameState {
    TicTacToe { symbol: Symbol },
    Dominoes(DominoesPlayer),
}

/// Participant of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub profile: Profile,
    pub state: PlayerGameState,
    pub is_ready: bool,
}

impl Player {
    pub fn symbol(&self) -> Option<Symbol> {
        match self.state {
            PlayerGameState::TicTacToe { symbol } => Some(symbol),
            PlayerGameState::Dominoes(_) => None,
        }
    }

    pub fn dominoes(&self) -> Option<&DominoesPlayer> {
        match &self.state {
            PlayerGameState::Dominoes(state) => Some(state),
            PlayerGameState::TicTacToe { .. } => None,
        }
    }

    pub fn dominoes_mut(&mut self) -> Option<&mut DominoesPlayer> {
        match &mut self.state {
            PlayerGameState::Dominoes(state) => Some(state),
            PlayerGameState::TicTacToe { .. } => None,
        }
    }
}

/// Game-specific shared state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "game", rename_all = "snake_case")]
pub enum Board {
    TicTacToe(TicTacToeBoard),
    Dominoes(DominoesTable),
}

/// Placement recorded in the move list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MovePayload {
    Mark { position: usize, symbol: Symbol },
    Tile { tile: Tile, side: Side },
}

/// Entry of the append-only move list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub player_id: String,
    pub payload: MovePayload,
    pub timestamp: SystemTime,
}

/// Populated only while the session is paused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PauseInfo {
    pub paused_at: SystemTime,
    pub paused_by: String,
    pub reason: PauseReason,
    /// Turn holder parked while paused and restored on resume.
    pub resume_player_id: Option<String>,
}

/// Aggregated state of one match, mirrored from its store document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSession {
    pub id: Uuid,
    /// Store-level write counter; bumped on every committed mutation.
    pub revision: u64,
    pub room_code: String,
    pub kind: GameKind,
    pub host_id: String,
    pub players: Vec<Player>,
    /// Player who forfeited by leaving a running game; kept for the result.
    pub departed: Option<Player>,
    pub status: SessionStatus,
    pub board: Board,
    /// Only set while `status == Playing`.
    pub current_player_id: Option<String>,
    pub winner_id: Option<String>,
    pub win_reason: Option<WinReason>,
    pub moves: Vec<MoveRecord>,
    pub created_at: SystemTime,
    pub started_at: Option<SystemTime>,
    pub completed_at: Option<SystemTime>,
    pub updated_at: SystemTime,
    pub pause: Option<PauseInfo>,
}

/// Maximum number of participants.
pub const MAX_PLAYERS: usize = 2;

impl GameSession {
    /// Fresh `waiting` session hosted by `host`.
    pub fn new(room_code: String, kind: GameKind, host: Player, board: Board, now: SystemTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            revision: 0,
            room_code,
            kind,
            host_id: host.id.clone(),
            players: vec![host],
            departed: None,
            status: SessionStatus::Waiting,
            board,
            current_player_id: None,
            winner_id: None,
            win_reason: None,
            moves: Vec::new(),
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
            pause: None,
        }
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|player| player.id == id)
    }

    pub fn player_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|player| player.id == id)
    }

    pub fn player_index(&self, id: &str) -> Option<usize> {
        self.players.iter().position(|player| player.id == id)
    }

    pub fn is_participant(&self, id: &str) -> bool {
        self.player(id).is_some()
    }

    /// The other participant, if present.
    pub fn opponent_of(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|player| player.id != id)
    }

    /// Seated players followed by the one who forfeited, if any.
    pub fn participants(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().chain(self.departed.as_ref())
    }

    /// Id of the player holding `symbol`.
    pub fn player_with_symbol(&self, symbol: Symbol) -> Option<&Player> {
        self.players
            .iter()
            .find(|player| player.symbol() == Some(symbol))
    }

    /// Move the session along its lifecycle.
    pub fn apply_event(&mut self, event: SessionEvent) -> Result<SessionStatus, InvalidTransition> {
        self.status = next_status(self.status, event)?;
        Ok(self.status)
    }

    /// Hand the turn to the opponent of `from`, resetting their per-turn dominoes flags.
    pub fn advance_turn(&mut self, from: &str) {
        let next = self.opponent_of(from).map(|player| player.id.clone());
        if let Some(next_id) = &next {
            if let Some(state) = self.player_mut(next_id).and_then(Player::dominoes_mut) {
                dominoes::begin_turn(state);
            }
        }
        self.current_player_id = next;
    }

    /// Transition to `finished`, recording the result exactly once.
    pub fn finish(
        &mut self,
        winner_id: Option<String>,
        reason: WinReason,
        now: SystemTime,
    ) -> Result<(), InvalidTransition> {
        self.apply_event(SessionEvent::Finish)?;
        self.winner_id = winner_id;
        self.win_reason = Some(reason);
        self.current_player_id = None;
        self.pause = None;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Wall-clock time between start and completion.
    pub fn duration(&self) -> Option<Duration> {
        let started = self.started_at?;
        let completed = self.completed_at?;
        completed.duration_since(started).ok()
    }

    /// Placements made by `player_id`.
    pub fn moves_by(&self, player_id: &str) -> usize {
        self.moves
            .iter()
            .filter(|record| record.player_id == player_id)
            .count()
    }

    /// Hands of all players in seat order, for dominoes rule checks.
    pub fn dominoes_hands(&self) -> Vec<&[Tile]> {
        self.players
            .iter()
            .filter_map(Player::dominoes)
            .map(|state| state.hand.as_slice())
            .collect()
    }
}
