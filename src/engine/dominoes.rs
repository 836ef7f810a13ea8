//! Double-six dominoes for two players: a single open chain, a shared draw pile and the
//! highest double opening the game.

use std::fmt;

use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::RuleViolation;

/// Highest pip value of the set.
pub const HIGHEST_PIP: u8 = 6;
/// Tiles dealt to each player.
pub const HAND_SIZE: usize = 7;

/// A domino tile. Orientation matters only once it lies on the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Tile {
    pub left: u8,
    pub right: u8,
}

impl Tile {
    pub const fn new(left: u8, right: u8) -> Self {
        Self { left, right }
    }

    /// Both halves carry the same value.
    pub fn is_double(&self) -> bool {
        self.left == self.right
    }

    /// Sum of both halves.
    pub fn pips(&self) -> u32 {
        u32::from(self.left) + u32::from(self.right)
    }

    /// Orientation-insensitive identity.
    pub fn same_as(&self, other: &Tile) -> bool {
        (self.left == other.left && self.right == other.right)
            || (self.left == other.right && self.right == other.left)
    }

    /// The value left exposed when the half showing `value` is joined to the chain.
    pub fn other_end(&self, value: u8) -> Option<u8> {
        if self.left == value {
            Some(self.right)
        } else if self.right == value {
            Some(self.left)
        } else {
            None
        }
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}|{}]", self.left, self.right)
    }
}

/// End of the chain a tile is laid against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

/// Tile on the table, oriented so it reads left to right along the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedTile {
    pub tile: Tile,
    pub side: Side,
    /// Doubles are drawn across the chain; adjacency rules are unchanged.
    pub is_double: bool,
}

/// Shared table: the chain in left-to-right order, its open ends and the draw pile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DominoesTable {
    pub placements: Vec<PlacedTile>,
    pub left_end: Option<u8>,
    pub right_end: Option<u8>,
    pub draw_pile: Vec<Tile>,
}

/// Per-player dominoes state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DominoesPlayer {
    pub hand: Vec<Tile>,
    pub has_drawn: bool,
    pub has_passed: bool,
    /// Pips left in hand once the game is over.
    pub score: u32,
    /// Tiles taken from the pile over the whole game.
    pub tiles_drawn: u32,
}

impl DominoesPlayer {
    pub fn with_hand(hand: Vec<Tile>) -> Self {
        Self {
            hand,
            ..Self::default()
        }
    }

    pub fn tiles_count(&self) -> usize {
        self.hand.len()
    }

    pub fn pip_total(&self) -> u32 {
        pip_total(&self.hand)
    }
}

/// Which ends of the chain accept a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementOptions {
    pub left: bool,
    pub right: bool,
}

impl PlacementOptions {
    pub fn any(&self) -> bool {
        self.left || self.right
    }

    pub fn allows(&self, side: Side) -> bool {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }
}

/// How a dominoes game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DominoesResult {
    /// Player at `winner` laid their last tile.
    EmptiedHand { winner: usize },
    /// Nobody can move and the pile is empty; lowest pip total wins, `None` on a tie.
    Blocked { winner: Option<usize> },
}

/// The 28 tiles of a double-six set.
pub fn full_set() -> Vec<Tile> {
    (0..=HIGHEST_PIP)
        .flat_map(|left| (left..=HIGHEST_PIP).map(move |right| Tile::new(left, right)))
        .collect()
}

/// A full set in random order.
pub fn shuffled_set<R: Rng + ?Sized>(rng: &mut R) -> Vec<Tile> {
    let mut tiles = full_set();
    tiles.shuffle(rng);
    tiles
}

/// Take up to `count` tiles off the top of the pile.
pub fn deal(pile: &mut Vec<Tile>, count: usize) -> Vec<Tile> {
    let at = pile.len().saturating_sub(count);
    pile.split_off(at)
}

/// Check a tile against the open ends. On an empty table every tile fits on both sides.
pub fn can_place_tile(tile: Tile, left_end: Option<u8>, right_end: Option<u8>) -> PlacementOptions {
    if left_end.is_none() && right_end.is_none() {
        return PlacementOptions {
            left: true,
            right: true,
        };
    }

    PlacementOptions {
        left: left_end.is_some_and(|end| tile.other_end(end).is_some()),
        right: right_end.is_some_and(|end| tile.other_end(end).is_some()),
    }
}

/// Whether any tile in `hand` can be laid on `table`.
pub fn has_legal_move(hand: &[Tile], table: &DominoesTable) -> bool {
    hand.iter()
        .any(|tile| can_place_tile(*tile, table.left_end, table.right_end).any())
}

/// Lay `tile` from the player's hand against `side`.
///
/// Nothing changes when the tile is not held or does not match.
pub fn place_tile(
    table: &mut DominoesTable,
    player: &mut DominoesPlayer,
    tile: Tile,
    side: Side,
) -> Result<PlacedTile, RuleViolation> {
    let index = player
        .hand
        .iter()
        .position(|held| held.same_as(&tile))
        .ok_or(RuleViolation::TileNotInHand(tile))?;

    let placed = lay(table, player.hand[index], side)?;
    player.hand.remove(index);
    Ok(placed)
}

/// Put a tile on the table without consulting any hand.
pub(crate) fn lay(
    table: &mut DominoesTable,
    tile: Tile,
    side: Side,
) -> Result<PlacedTile, RuleViolation> {
    let (Some(left_end), Some(right_end)) = (table.left_end, table.right_end) else {
        let placed = PlacedTile {
            tile,
            side,
            is_double: tile.is_double(),
        };
        table.left_end = Some(tile.left);
        table.right_end = Some(tile.right);
        table.placements.push(placed);
        return Ok(placed);
    };

    let mismatch = RuleViolation::TileDoesNotMatch { tile, side };
    let placed = match side {
        Side::Left => {
            let outer = tile.other_end(left_end).ok_or(mismatch)?;
            let placed = PlacedTile {
                tile: Tile::new(outer, left_end),
                side,
                is_double: tile.is_double(),
            };
            table.left_end = Some(outer);
            table.placements.insert(0, placed);
            placed
        }
        Side::Right => {
            let outer = tile.other_end(right_end).ok_or(mismatch)?;
            let placed = PlacedTile {
                tile: Tile::new(right_end, outer),
                side,
                is_double: tile.is_double(),
            };
            table.right_end = Some(outer);
            table.placements.push(placed);
            placed
        }
    };

    Ok(placed)
}

/// Take one tile from the pile. Only allowed once per turn and only without a playable tile.
pub fn draw_tile(
    table: &mut DominoesTable,
    player: &mut DominoesPlayer,
) -> Result<Tile, RuleViolation> {
    if has_legal_move(&player.hand, table) {
        return Err(RuleViolation::DrawNotNeeded);
    }
    if player.has_drawn {
        return Err(RuleViolation::AlreadyDrew);
    }
    let tile = table.draw_pile.pop().ok_or(RuleViolation::DrawPileEmpty)?;

    player.hand.push(tile);
    player.has_drawn = true;
    player.tiles_drawn += 1;
    Ok(tile)
}

/// Give up the turn. Requires no playable tile, and a prior draw while the pile has tiles.
pub fn pass_turn(table: &DominoesTable, player: &mut DominoesPlayer) -> Result<(), RuleViolation> {
    if has_legal_move(&player.hand, table) {
        return Err(RuleViolation::PlayableTileAvailable);
    }
    if !player.has_drawn && !table.draw_pile.is_empty() {
        return Err(RuleViolation::MustDrawBeforePassing);
    }

    player.has_passed = true;
    Ok(())
}

/// Reset the per-turn flags when the turn comes back to `player`.
pub fn begin_turn(player: &mut DominoesPlayer) {
    player.has_drawn = false;
    player.has_passed = false;
}

pub fn pip_total(hand: &[Tile]) -> u32 {
    hand.iter().map(Tile::pips).sum()
}

/// True iff the pile is empty and no hand holds a playable tile.
pub fn is_game_blocked(table: &DominoesTable, hands: &[&[Tile]]) -> bool {
    table.draw_pile.is_empty() && hands.iter().all(|hand| !has_legal_move(hand, table))
}

/// Index of the hand with the lowest pip total, `None` when the lowest total is shared.
pub fn winner_by_score(hands: &[&[Tile]]) -> Option<usize> {
    let totals: Vec<u32> = hands.iter().map(|hand| pip_total(hand)).collect();
    let lowest = *totals.iter().min()?;
    let mut holders = totals.iter().enumerate().filter(|(_, total)| **total == lowest);
    let (winner, _) = holders.next()?;
    holders.next().is_none().then_some(winner)
}

/// Decide whether the game ended after `mover` acted.
pub fn evaluate(table: &DominoesTable, hands: &[&[Tile]], mover: usize) -> Option<DominoesResult> {
    if hands.get(mover).is_some_and(|hand| hand.is_empty()) {
        return Some(DominoesResult::EmptiedHand { winner: mover });
    }
    if is_game_blocked(table, hands) {
        return Some(DominoesResult::Blocked {
            winner: winner_by_score(hands),
        });
    }
    None
}

/// Holder of the globally highest double together with that tile.
///
/// `None` when no hand holds a double; the host then opens with a free choice.
pub fn determine_starting_player(hands: &[&[Tile]]) -> Option<(usize, Tile)> {
    hands
        .iter()
        .enumerate()
        .filter_map(|(index, hand)| {
            hand.iter()
                .filter(|tile| tile.is_double())
                .max_by_key(|tile| tile.left)
                .map(|tile| (index, *tile))
        })
        .max_by_key(|(_, tile)| tile.left)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn table_with_ends(left: u8, right: u8, pile: Vec<Tile>) -> DominoesTable {
        let mut table = DominoesTable {
            draw_pile: pile,
            ..DominoesTable::default()
        };
        lay(&mut table, Tile::new(left, right), Side::Right).unwrap();
        table
    }

    #[test]
    fn full_set_has_28_distinct_tiles() {
        let set = full_set();
        assert_eq!(set.len(), 28);
        let unique: HashSet<_> = set.iter().map(|t| (t.left, t.right)).collect();
        assert_eq!(unique.len(), 28);
        assert_eq!(set.iter().filter(|t| t.is_double()).count(), 7);
    }

    #[test]
    fn dealing_two_hands_leaves_fourteen_in_the_pile() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut pile = shuffled_set(&mut rng);
        let first = deal(&mut pile, HAND_SIZE);
        let second = deal(&mut pile, HAND_SIZE);

        assert_eq!(first.len(), 7);
        assert_eq!(second.len(), 7);
        assert_eq!(pile.len(), 14);
    }

    #[test]
    fn tile_matching_neither_end_fits_nowhere() {
        let options = can_place_tile(Tile::new(2, 3), Some(5), Some(6));
        assert!(!options.left);
        assert!(!options.right);

        let options = can_place_tile(Tile::new(2, 6), Some(5), Some(6));
        assert!(!options.left);
        assert!(options.right);
    }

    #[test]
    fn first_tile_is_unconstrained() {
        let options = can_place_tile(Tile::new(1, 4), None, None);
        assert!(options.left && options.right);
    }

    #[test]
    fn placing_updates_the_open_ends() {
        let mut table = table_with_ends(3, 5, Vec::new());
        let mut player = DominoesPlayer::with_hand(vec![Tile::new(1, 3), Tile::new(5, 5)]);

        let placed = place_tile(&mut table, &mut player, Tile::new(3, 1), Side::Left).unwrap();
        assert_eq!(placed.tile, Tile::new(1, 3));
        assert_eq!(table.left_end, Some(1));

        let placed = place_tile(&mut table, &mut player, Tile::new(5, 5), Side::Right).unwrap();
        assert!(placed.is_double);
        assert_eq!(table.right_end, Some(5));

        let chain: Vec<Tile> = table.placements.iter().map(|p| p.tile).collect();
        assert_eq!(
            chain,
            vec![Tile::new(1, 3), Tile::new(3, 5), Tile::new(5, 5)]
        );
        assert!(player.hand.is_empty());
    }

    #[test]
    fn mismatched_or_missing_tiles_leave_everything_untouched() {
        let mut table = table_with_ends(3, 5, Vec::new());
        let mut player = DominoesPlayer::with_hand(vec![Tile::new(2, 4)]);
        let before = (table.clone(), player.clone());

        assert_eq!(
            place_tile(&mut table, &mut player, Tile::new(2, 4), Side::Left),
            Err(RuleViolation::TileDoesNotMatch {
                tile: Tile::new(2, 4),
                side: Side::Left
            })
        );
        assert_eq!(
            place_tile(&mut table, &mut player, Tile::new(3, 3), Side::Left),
            Err(RuleViolation::TileNotInHand(Tile::new(3, 3)))
        );
        assert_eq!((table, player), before);
    }

    #[test]
    fn drawing_is_only_for_players_without_a_move() {
        let mut table = table_with_ends(3, 5, vec![Tile::new(0, 0), Tile::new(1, 1)]);
        let mut stuck = DominoesPlayer::with_hand(vec![Tile::new(2, 4)]);
        let mut able = DominoesPlayer::with_hand(vec![Tile::new(5, 6)]);

        assert_eq!(
            draw_tile(&mut table, &mut able),
            Err(RuleViolation::DrawNotNeeded)
        );

        assert_eq!(draw_tile(&mut table, &mut stuck), Ok(Tile::new(1, 1)));
        assert_eq!(stuck.tiles_drawn, 1);
        assert_eq!(
            draw_tile(&mut table, &mut stuck),
            Err(RuleViolation::AlreadyDrew)
        );

        begin_turn(&mut stuck);
        table.draw_pile.clear();
        assert_eq!(
            draw_tile(&mut table, &mut stuck),
            Err(RuleViolation::DrawPileEmpty)
        );
    }

    #[test]
    fn passing_requires_a_draw_while_the_pile_lasts() {
        let mut table = table_with_ends(3, 5, vec![Tile::new(0, 0)]);
        let mut player = DominoesPlayer::with_hand(vec![Tile::new(2, 4)]);

        assert_eq!(
            pass_turn(&table, &mut player),
            Err(RuleViolation::MustDrawBeforePassing)
        );
        draw_tile(&mut table, &mut player).unwrap();
        assert_eq!(pass_turn(&table, &mut player), Ok(()));
        assert!(player.has_passed);

        let mut holder = DominoesPlayer::with_hand(vec![Tile::new(3, 4)]);
        assert_eq!(
            pass_turn(&table, &mut holder),
            Err(RuleViolation::PlayableTileAvailable)
        );
    }

    #[test]
    fn pass_is_immediate_once_the_pile_is_empty() {
        let table = table_with_ends(3, 5, Vec::new());
        let mut player = DominoesPlayer::with_hand(vec![Tile::new(2, 4)]);
        assert_eq!(pass_turn(&table, &mut player), Ok(()));
    }

    #[test]
    fn blocked_only_with_empty_pile_and_no_moves() {
        let stuck_a = [Tile::new(2, 4)];
        let stuck_b = [Tile::new(0, 1)];
        let able = [Tile::new(5, 1)];

        let table = table_with_ends(3, 5, Vec::new());
        assert!(is_game_blocked(&table, &[&stuck_a, &stuck_b]));
        assert!(!is_game_blocked(&table, &[&stuck_a, &able]));

        let with_pile = table_with_ends(3, 5, vec![Tile::new(6, 6)]);
        assert!(!is_game_blocked(&with_pile, &[&stuck_a, &stuck_b]));
    }

    #[test]
    fn lowest_pip_total_wins_and_ties_have_no_winner() {
        let light = [Tile::new(0, 1)];
        let heavy = [Tile::new(4, 6)];
        assert_eq!(winner_by_score(&[&heavy, &light]), Some(1));

        let even = [Tile::new(1, 0)];
        assert_eq!(winner_by_score(&[&light, &even]), None);
    }

    #[test]
    fn evaluate_reports_emptied_hands_before_blocks() {
        let table = table_with_ends(3, 5, Vec::new());
        let empty: [Tile; 0] = [];
        let stuck = [Tile::new(2, 4)];

        assert_eq!(
            evaluate(&table, &[&empty, &stuck], 0),
            Some(DominoesResult::EmptiedHand { winner: 0 })
        );
        assert_eq!(
            evaluate(&table, &[&[Tile::new(0, 1)], &stuck], 1),
            Some(DominoesResult::Blocked { winner: Some(0) })
        );
        assert_eq!(evaluate(&table, &[&[Tile::new(5, 1)], &stuck], 1), None);
    }

    #[test]
    fn highest_double_opens() {
        let first = [Tile::new(1, 1), Tile::new(2, 5)];
        let second = [Tile::new(4, 4), Tile::new(0, 0)];
        assert_eq!(
            determine_starting_player(&[&first, &second]),
            Some((1, Tile::new(4, 4)))
        );

        let no_doubles = [Tile::new(1, 2)];
        assert_eq!(determine_starting_player(&[&no_doubles, &no_doubles]), None);
    }
}
