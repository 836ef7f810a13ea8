//! N-in-a-row on a square board (classic tic-tac-toe is 3x3 with a win condition of 3).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::RuleViolation;

/// Smallest supported board edge and run length.
pub const MIN_BOARD_SIZE: usize = 3;
/// Largest supported board edge.
pub const MAX_BOARD_SIZE: usize = 15;

/// Mark placed by a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Symbol {
    X,
    O,
}

impl Symbol {
    /// The symbol held by the other player.
    pub fn opponent(self) -> Self {
        match self {
            Symbol::X => Symbol::O,
            Symbol::O => Symbol::X,
        }
    }
}

/// Shared board state of an n-in-a-row game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicTacToeBoard {
    /// Edge length of the square board.
    pub size: usize,
    /// Number of consecutive marks required to win.
    pub win_condition: usize,
    /// Row-major cells.
    pub cells: Vec<Option<Symbol>>,
    /// Cells of the winning run once the game is decided by a line.
    pub winning_line: Option<Vec<usize>>,
}

/// Rejected board configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "board size must be between 3 and 15 and the win condition between 3 and the board size (got size {size}, win condition {win_condition})"
)]
pub struct InvalidBoardConfig {
    pub size: usize,
    pub win_condition: usize,
}

/// Result of a legal placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkOutcome {
    /// Game goes on with the other player.
    Continue,
    /// `symbol` completed `line`.
    Win { symbol: Symbol, line: Vec<usize> },
    /// Board is full without a winning run.
    Draw,
}

impl TicTacToeBoard {
    /// Empty board after validating its dimensions.
    pub fn new(size: usize, win_condition: usize) -> Result<Self, InvalidBoardConfig> {
        let valid = (MIN_BOARD_SIZE..=MAX_BOARD_SIZE).contains(&size)
            && (MIN_BOARD_SIZE..=size).contains(&win_condition);
        if !valid {
            return Err(InvalidBoardConfig {
                size,
                win_condition,
            });
        }

        Ok(Self {
            size,
            win_condition,
            cells: vec![None; size * size],
            winning_line: None,
        })
    }

    /// Whether every cell holds a mark.
    pub fn is_full(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    /// Number of marks placed so far.
    pub fn filled(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }
}

/// Place `symbol` at `position` and report whether that decided the game.
///
/// The board is left untouched when the move is rejected.
pub fn play_move(
    board: &mut TicTacToeBoard,
    symbol: Symbol,
    position: usize,
) -> Result<MarkOutcome, RuleViolation> {
    if board.winning_line.is_some() {
        return Err(RuleViolation::BoardDecided);
    }
    let Some(cell) = board.cells.get_mut(position) else {
        return Err(RuleViolation::OutOfBounds {
            position,
            size: board.size,
        });
    };
    if cell.is_some() {
        return Err(RuleViolation::CellOccupied(position));
    }
    *cell = Some(symbol);

    if let Some((winner, line)) = check_winner(&board.cells, board.size, board.win_condition) {
        board.winning_line = Some(line.clone());
        return Ok(MarkOutcome::Win {
            symbol: winner,
            line,
        });
    }

    if board.is_full() {
        Ok(MarkOutcome::Draw)
    } else {
        Ok(MarkOutcome::Continue)
    }
}

/// Scan for the first run of `win_condition` equal marks.
///
/// Search order is rows (row-major origins), columns (column-major origins), the
/// down-right diagonal and finally the down-left diagonal.
pub fn check_winner(
    cells: &[Option<Symbol>],
    size: usize,
    win_condition: usize,
) -> Option<(Symbol, Vec<usize>)> {
    if win_condition == 0 || win_condition > size || cells.len() != size * size {
        return None;
    }
    let last_origin = size - win_condition;

    let rows = (0..size).flat_map(|row| (0..=last_origin).map(move |col| (row, col, 0, 1)));
    let columns = (0..size).flat_map(|col| (0..=last_origin).map(move |row| (row, col, 1, 0)));
    let down_right =
        (0..=last_origin).flat_map(|row| (0..=last_origin).map(move |col| (row, col, 1, 1)));
    let down_left = (0..=last_origin)
        .flat_map(|row| (win_condition - 1..size).map(move |col| (row, col, 1, -1)));

    rows.chain(columns)
        .chain(down_right)
        .chain(down_left)
        .find_map(|(row, col, d_row, d_col)| {
            let line: Vec<usize> = (0..win_condition)
                .map(|step| {
                    let r = row + step * d_row;
                    let c = (col as isize + step as isize * d_col) as usize;
                    r * size + c
                })
                .collect();
            let first = cells[line[0]]?;
            line.iter()
                .all(|&index| cells[index] == Some(first))
                .then_some((first, line))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_from(size: usize, win: usize, layout: &str) -> TicTacToeBoard {
        let mut board = TicTacToeBoard::new(size, win).unwrap();
        board.cells = layout
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| match c {
                'X' => Some(Symbol::X),
                'O' => Some(Symbol::O),
                _ => None,
            })
            .collect();
        board
    }

    fn transpose(board: &TicTacToeBoard) -> Vec<Option<Symbol>> {
        let n = board.size;
        (0..n * n)
            .map(|index| board.cells[(index % n) * n + index / n])
            .collect()
    }

    #[test]
    fn left_column_wins_for_x() {
        let mut board = TicTacToeBoard::new(3, 3).unwrap();
        let moves = [(0, Symbol::X), (1, Symbol::O), (3, Symbol::X), (4, Symbol::O)];
        for (position, symbol) in moves {
            assert_eq!(
                play_move(&mut board, symbol, position),
                Ok(MarkOutcome::Continue)
            );
        }

        let outcome = play_move(&mut board, Symbol::X, 6).unwrap();
        assert_eq!(
            outcome,
            MarkOutcome::Win {
                symbol: Symbol::X,
                line: vec![0, 3, 6]
            }
        );
        assert_eq!(board.winning_line, Some(vec![0, 3, 6]));
    }

    #[test]
    fn occupied_cell_is_rejected_without_mutation() {
        let mut board = TicTacToeBoard::new(3, 3).unwrap();
        play_move(&mut board, Symbol::X, 4).unwrap();
        let before = board.clone();

        assert_eq!(
            play_move(&mut board, Symbol::O, 4),
            Err(RuleViolation::CellOccupied(4))
        );
        assert_eq!(board, before);
    }

    #[test]
    fn out_of_range_cell_is_rejected() {
        let mut board = TicTacToeBoard::new(3, 3).unwrap();
        assert_eq!(
            play_move(&mut board, Symbol::X, 9),
            Err(RuleViolation::OutOfBounds {
                position: 9,
                size: 3
            })
        );
    }

    #[test]
    fn full_board_without_line_is_a_draw() {
        let mut board = board_from(3, 3, "XOX XOO OX.");
        assert_eq!(play_move(&mut board, Symbol::X, 8), Ok(MarkOutcome::Draw));
        assert!(board.winning_line.is_none());
    }

    #[test]
    fn short_runs_never_win() {
        let board = board_from(4, 4, "XXX. OOO. .... ....");
        assert_eq!(check_winner(&board.cells, 4, 4), None);
    }

    #[test]
    fn longer_boards_find_runs_away_from_the_corner() {
        let board = board_from(5, 4, "..... .XXXX ..... OOO.. .....");
        assert_eq!(
            check_winner(&board.cells, 5, 4),
            Some((Symbol::X, vec![6, 7, 8, 9]))
        );
    }

    #[test]
    fn rows_take_precedence_over_columns() {
        let board = board_from(3, 3, "XXX X.. X..");
        assert_eq!(
            check_winner(&board.cells, 3, 3),
            Some((Symbol::X, vec![0, 1, 2]))
        );
    }

    #[test]
    fn both_diagonals_are_detected() {
        let down_right = board_from(3, 3, "O.. .O. ..O");
        assert_eq!(
            check_winner(&down_right.cells, 3, 3),
            Some((Symbol::O, vec![0, 4, 8]))
        );

        let down_left = board_from(3, 3, "..X .X. X..");
        assert_eq!(
            check_winner(&down_left.cells, 3, 3),
            Some((Symbol::X, vec![2, 4, 6]))
        );
    }

    #[test]
    fn transposed_board_finds_the_same_run() {
        let layouts = ["XXX. O... O... ....", ".... .OOO .... X.X.", "X... .X.. ..X. ...."];
        for layout in layouts {
            let board = board_from(4, 3, layout);
            let (symbol, line) = check_winner(&board.cells, 4, 3).unwrap();
            let (t_symbol, t_line) = check_winner(&transpose(&board), 4, 3).unwrap();

            let mut expected: Vec<usize> = line.iter().map(|i| (i % 4) * 4 + i / 4).collect();
            expected.sort_unstable();
            let mut actual = t_line.clone();
            actual.sort_unstable();

            assert_eq!(symbol, t_symbol);
            assert_eq!(expected, actual, "layout {layout}");
        }
    }

    #[test]
    fn invalid_dimensions_are_rejected() {
        assert!(TicTacToeBoard::new(2, 2).is_err());
        assert!(TicTacToeBoard::new(3, 4).is_err());
        assert!(TicTacToeBoard::new(16, 5).is_err());
        assert!(TicTacToeBoard::new(5, 4).is_ok());
    }

    #[test]
    fn decided_board_rejects_further_moves() {
        let mut board = board_from(3, 3, "XX. OO. ...");
        play_move(&mut board, Symbol::X, 2).unwrap();
        assert_eq!(
            play_move(&mut board, Symbol::O, 5),
            Err(RuleViolation::BoardDecided)
        );
    }
}
