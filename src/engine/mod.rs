//! Pure rules for the supported two-player games. Nothing in here touches storage or time;
//! callers hand in the current board and receive either a rejection or the next state.

pub mod dominoes;
pub mod tictactoe;

use thiserror::Error;

use self::dominoes::{Side, Tile};

/// Reasons a proposed move is rejected by the rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleViolation {
    /// Target cell is outside the board.
    #[error("position {position} is outside the {size}x{size} board")]
    OutOfBounds {
        /// Requested cell index.
        position: usize,
        /// Board edge length.
        size: usize,
    },
    /// Target cell already holds a symbol.
    #[error("cell {0} is already occupied")]
    CellOccupied(usize),
    /// The game on this board is already decided.
    #[error("the board is already decided")]
    BoardDecided,
    /// The tile is not part of the acting player's hand.
    #[error("tile {0} is not in your hand")]
    TileNotInHand(Tile),
    /// Neither pip of the tile matches the requested open end.
    #[error("tile {tile} does not match the {side} end")]
    TileDoesNotMatch {
        /// Tile that was offered.
        tile: Tile,
        /// Side it was offered on.
        side: Side,
    },
    /// Drawing is only allowed when no tile in hand can be played.
    #[error("you have a playable tile, so you cannot draw")]
    DrawNotNeeded,
    /// A player draws at most once per turn.
    #[error("you already drew a tile this turn")]
    AlreadyDrew,
    /// The draw pile has run out.
    #[error("the draw pile is empty")]
    DrawPileEmpty,
    /// Passing requires drawing first while the pile still has tiles.
    #[error("you must draw from the pile before passing")]
    MustDrawBeforePassing,
    /// Passing while holding a playable tile.
    #[error("you have a playable tile, so you cannot pass")]
    PlayableTileAvailable,
}
