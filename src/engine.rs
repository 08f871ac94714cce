use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side length of the square grid.
pub const GRID_SIZE: usize = 4;
/// Number of cells on the grid.
pub const TOTAL_CELLS: usize = GRID_SIZE * GRID_SIZE;
/// Tile value that wins the game unless another goal is configured.
pub const DEFAULT_GOAL: u32 = 2048;
/// Probability that a spawned tile is a 2 (otherwise it is a 4).
pub const TILE_PROBABILITY_2: f64 = 0.9;
/// Probability that a spawned tile is a 4.
pub const TILE_PROBABILITY_4: f64 = 1.0 - TILE_PROBABILITY_2;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("no empty cell left for a random tile")]
    BoardFull,
    #[error("a tile cannot hold the value zero")]
    ZeroTile,
    #[error("cell ({row}, {column}) is outside the 4x4 grid")]
    CellOutOfBounds { row: usize, column: usize },
}

/// A direction to move/merge tiles, plus the "no move" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Up,
    Down,
    Left,
    Right,
    NoAction,
}

impl Action {
    /// The four directional actions.
    pub const DIRECTIONS: [Action; 4] = [Action::Up, Action::Down, Action::Left, Action::Right];

    /// Order in which search engines expand the actions of an inner max node.
    ///
    /// Root candidates are always shuffled; inner nodes only take a maximum,
    /// so this order affects nothing but traversal.
    pub const SEARCH_ORDER: [Action; 4] = [Action::Left, Action::Up, Action::Right, Action::Down];

    #[inline]
    pub fn is_direction(self) -> bool { self != Action::NoAction }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Up => "UP",
            Action::Down => "DOWN",
            Action::Left => "LEFT",
            Action::Right => "RIGHT",
            Action::NoAction => "NONE",
        };
        f.write_str(name)
    }
}

/// A position on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    row: u8,
    column: u8,
}

impl Cell {
    /// Construct a cell, rejecting coordinates outside the grid.
    pub fn new(row: usize, column: usize) -> Result<Self, EngineError> {
        if row < GRID_SIZE && column < GRID_SIZE {
            Ok(Cell::at(row, column))
        } else {
            Err(EngineError::CellOutOfBounds { row, column })
        }
    }

    #[inline]
    const fn at(row: usize, column: usize) -> Self { Cell { row: row as u8, column: column as u8 } }

    #[inline]
    pub(crate) const fn from_index(idx: usize) -> Self { Cell::at(idx / GRID_SIZE, idx % GRID_SIZE) }

    #[inline]
    pub fn row(self) -> usize { self.row as usize }

    #[inline]
    pub fn column(self) -> usize { self.column as usize }

    /// Row-major index in `0..16`.
    #[inline]
    pub fn index(self) -> usize { self.row() * GRID_SIZE + self.column() }
}

/// An occupied cell: a position and its (nonzero) value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tile {
    cell: Cell,
    value: u32,
}

impl Tile {
    pub fn new(cell: Cell, value: u32) -> Result<Self, EngineError> {
        if value == 0 {
            return Err(EngineError::ZeroTile);
        }
        Ok(Tile { cell, value })
    }

    /// A tile whose value is known to be a spawn value.
    pub(crate) const fn placed(cell: Cell, value: u32) -> Self { Tile { cell, value } }

    #[inline]
    pub fn cell(self) -> Cell { self.cell }

    #[inline]
    pub fn value(self) -> u32 { self.value }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}) : {}", self.cell.row(), self.cell.column(), self.value)
    }
}

/// A 4x4 2048 position with its win condition.
///
/// Cells hold plain tile values (0 = empty) in row-major order, so a state
/// is `Copy` and every search branch owns an independent board. Equality and
/// hashing cover the goal and all cells; the cached statistics are pure
/// functions of the cells and never disagree between equal states.
///
/// ```
/// use ai_2048_player::engine::{Action, GameState};
/// let mut state = GameState::from_rows([[0, 2, 0, 2], [0; 4], [0; 4], [0; 4]], 2048);
/// assert!(state.apply_action(Action::Left));
/// assert_eq!(state.row(0), [4, 0, 0, 0]);
/// assert_eq!(state.filled_cells(), 1);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GameState {
    cells: [u32; TOTAL_CELLS],
    goal: u32,
    highest: u32,
    filled: u8,
}

impl Default for GameState {
    fn default() -> Self { GameState::new(DEFAULT_GOAL) }
}

impl GameState {
    /// An empty board that is won once a tile reaches `goal`.
    pub fn new(goal: u32) -> Self { GameState { cells: [0; TOTAL_CELLS], goal, highest: 0, filled: 0 } }

    /// Build a state from explicit rows (top to bottom).
    pub fn from_rows(rows: [[u32; GRID_SIZE]; GRID_SIZE], goal: u32) -> Self {
        let mut state = GameState::new(goal);
        for (r, row) in rows.iter().enumerate() {
            state.cells[r * GRID_SIZE..(r + 1) * GRID_SIZE].copy_from_slice(row);
        }
        state.recompute_statistics();
        state
    }

    /// An empty board with two random tiles, the usual opening position.
    ///
    /// ```
    /// use ai_2048_player::engine::GameState;
    /// use rand::{rngs::StdRng, SeedableRng};
    /// let mut rng = StdRng::seed_from_u64(42);
    /// let state = GameState::random_initial_state(&mut rng, 2048);
    /// assert_eq!(state.filled_cells(), 2);
    /// ```
    pub fn random_initial_state<R: Rng + ?Sized>(rng: &mut R, goal: u32) -> Self {
        let mut state = GameState::new(goal);
        for _ in 0..2 {
            // An empty board always has room for the opening tiles.
            let _ = state.add_random_tile(rng);
        }
        state
    }

    #[inline]
    pub fn goal(&self) -> u32 { self.goal }

    /// Highest tile value on the board (0 when empty).
    #[inline]
    pub fn highest(&self) -> u32 { self.highest }

    #[inline]
    pub fn filled_cells(&self) -> usize { self.filled as usize }

    #[inline]
    pub fn empty_count(&self) -> usize { TOTAL_CELLS - self.filled_cells() }

    #[inline]
    pub fn is_full(&self) -> bool { self.empty_count() == 0 }

    #[inline]
    pub fn is_win(&self) -> bool { self.highest >= self.goal }

    /// Not won, no empty cell, and no legal move.
    pub fn is_loss(&self) -> bool { !self.is_win() && self.is_full() && self.legal_actions().next().is_none() }

    #[inline]
    pub fn get(&self, cell: Cell) -> u32 { self.cells[cell.index()] }

    /// Values of row `r`, left to right.
    pub fn row(&self, r: usize) -> [u32; GRID_SIZE] {
        let mut out = [0; GRID_SIZE];
        out.copy_from_slice(&self.cells[r * GRID_SIZE..(r + 1) * GRID_SIZE]);
        out
    }

    /// Sum of all tile values.
    pub fn sum(&self) -> u64 { self.cells.iter().map(|&v| v as u64).sum() }

    /// Occupied cells in row-major order.
    pub fn tiles(&self) -> impl Iterator<Item = Tile> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|&(_, &value)| value != 0)
            .map(|(idx, &value)| Tile { cell: Cell::from_index(idx), value })
    }

    /// Empty cells in row-major order.
    pub fn empty_cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|&(_, &value)| value == 0)
            .map(|(idx, _)| Cell::from_index(idx))
    }

    /// Directional actions that would change the board, in `Action::DIRECTIONS` order.
    pub fn legal_actions(&self) -> impl Iterator<Item = Action> + '_ {
        Action::DIRECTIONS.into_iter().filter(|&a| self.is_action_legal(a))
    }

    /// True iff `action` would move or merge at least one tile.
    ///
    /// `NoAction` is never legal and nothing is legal once the game is won.
    pub fn is_action_legal(&self, action: Action) -> bool {
        if self.is_win() {
            return false;
        }
        (0..GRID_SIZE).any(|line| match line_indices(action, line) {
            Some(idx) => line_can_move(idx.map(|i| self.cells[i])),
            None => false,
        })
    }

    /// Slide and merge every line toward `action`'s edge.
    ///
    /// Returns false, leaving the state untouched, when the action is not
    /// legal (including `NoAction` and any move on a won board).
    pub fn apply_action(&mut self, action: Action) -> bool {
        if !self.is_action_legal(action) {
            return false;
        }
        for line in 0..GRID_SIZE {
            if let Some(idx) = line_indices(action, line) {
                let condensed = condense(idx.map(|i| self.cells[i]));
                for (i, value) in idx.into_iter().zip(condensed) {
                    self.cells[i] = value;
                }
            }
        }
        self.recompute_statistics();
        true
    }

    /// Place `tile` if its cell is empty. Returns whether it was placed.
    pub fn add_tile(&mut self, tile: Tile) -> bool {
        let slot = &mut self.cells[tile.cell.index()];
        if *slot != 0 {
            return false;
        }
        *slot = tile.value;
        self.filled += 1;
        self.highest = self.highest.max(tile.value);
        true
    }

    /// Place a 2 (90%) or 4 (10%) in an empty cell chosen uniformly at random.
    ///
    /// Fails with [`EngineError::BoardFull`] when there is no empty cell; callers
    /// are expected to check [`GameState::is_full`] first.
    ///
    /// ```
    /// use ai_2048_player::engine::{EngineError, GameState};
    /// use rand::{rngs::StdRng, SeedableRng};
    /// let mut rng = StdRng::seed_from_u64(7);
    /// let mut state = GameState::default();
    /// for _ in 0..16 {
    ///     state.add_random_tile(&mut rng).unwrap();
    /// }
    /// assert_eq!(state.add_random_tile(&mut rng), Err(EngineError::BoardFull));
    /// ```
    pub fn add_random_tile<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Tile, EngineError> {
        let empty = self.empty_count();
        if empty == 0 {
            return Err(EngineError::BoardFull);
        }
        let cell = self.empty_cells().nth(rng.gen_range(0..empty)).ok_or(EngineError::BoardFull)?;
        let value = if rng.gen_bool(TILE_PROBABILITY_2) { 2 } else { 4 };
        let tile = Tile { cell, value };
        self.add_tile(tile);
        Ok(tile)
    }

    /// Clear `cell`, returning its previous value (0 if it was empty).
    pub fn remove_tile(&mut self, cell: Cell) -> u32 {
        let value = std::mem::take(&mut self.cells[cell.index()]);
        if value != 0 {
            self.filled -= 1;
            if value == self.highest {
                self.recompute_statistics();
            }
        }
        value
    }

    fn recompute_statistics(&mut self) {
        let (filled, highest) = self
            .cells
            .iter()
            .filter(|&&v| v != 0)
            .fold((0u8, 0u32), |(n, hi), &v| (n + 1, hi.max(v)));
        self.filled = filled;
        self.highest = highest;
    }
}

impl fmt::Debug for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameState").field("cells", &self.cells).field("goal", &self.goal).finish()
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        for r in 0..GRID_SIZE {
            let row: Vec<String> = self.row(r).iter().map(|&v| format_val(v)).collect();
            writeln!(f, "{}", row.join("|"))?;
            if r + 1 < GRID_SIZE {
                writeln!(f, "-------------------------------")?;
            }
        }
        Ok(())
    }
}

/// Slide and merge one line toward index 0.
///
/// Equal neighbours (ignoring gaps) merge into one tile of double value,
/// scanning from index 0; a freshly merged tile does not merge again in the
/// same pass. The result is zero-padded to the original length.
///
/// ```
/// use ai_2048_player::engine::condense;
/// assert_eq!(condense([2, 2, 2, 0]), [4, 2, 0, 0]);
/// assert_eq!(condense([0, 2, 0, 2]), [4, 0, 0, 0]);
/// ```
pub fn condense(line: [u32; GRID_SIZE]) -> [u32; GRID_SIZE] {
    let mut out = [0; GRID_SIZE];
    let mut len = 0;
    let mut can_merge = false;
    for value in line.into_iter().filter(|&v| v != 0) {
        if can_merge && out[len - 1] == value {
            out[len - 1] = value.saturating_mul(2);
            can_merge = false;
        } else {
            out[len] = value;
            len += 1;
            can_merge = true;
        }
    }
    out
}

/// Cell indices of line `line` for `action`, ordered from the edge tiles move toward.
fn line_indices(action: Action, line: usize) -> Option<[usize; GRID_SIZE]> {
    let mut out = [0; GRID_SIZE];
    for (k, slot) in out.iter_mut().enumerate() {
        *slot = match action {
            Action::Left => line * GRID_SIZE + k,
            Action::Right => line * GRID_SIZE + (GRID_SIZE - 1 - k),
            Action::Up => k * GRID_SIZE + line,
            Action::Down => (GRID_SIZE - 1 - k) * GRID_SIZE + line,
            Action::NoAction => return None,
        };
    }
    Some(out)
}

// Scans from the trailing edge: a gap after a tile means the tile can slide.
fn line_can_move(line: [u32; GRID_SIZE]) -> bool {
    let mut previous = 0;
    let mut seen_tile = false;
    for &value in line.iter().rev() {
        if (value != 0 && value == previous) || (value == 0 && seen_tile) {
            return true;
        }
        previous = value;
        seen_tile |= value != 0;
    }
    false
}

fn format_val(val: u32) -> String {
    match val {
        0 => String::from("       "),
        x => format!("{:^7}", x),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn tile(row: usize, column: usize, value: u32) -> Tile {
        Tile::new(Cell::new(row, column).unwrap(), value).unwrap()
    }

    fn with_tiles(tiles: &[Tile]) -> GameState {
        let mut state = GameState::default();
        for &t in tiles {
            assert!(state.add_tile(t));
        }
        state
    }

    fn blocked_board() -> GameState {
        GameState::from_rows([[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]], DEFAULT_GOAL)
    }

    #[test]
    fn it_condense() {
        assert_eq!(condense([0, 0, 0, 0]), [0, 0, 0, 0]);
        assert_eq!(condense([2, 4, 2, 4]), [2, 4, 2, 4]);
        assert_eq!(condense([2, 2, 4, 4]), [4, 8, 0, 0]);
        assert_eq!(condense([2, 0, 0, 2]), [4, 0, 0, 0]);
        assert_eq!(condense([0, 2, 0, 2]), [4, 0, 0, 0]);
        assert_eq!(condense([2, 2, 2, 0]), [4, 2, 0, 0]);
        assert_eq!(condense([4, 4, 8, 0]), [8, 8, 0, 0]);
        assert_eq!(condense([2, 2, 2, 2]), [4, 4, 0, 0]);
    }

    #[test]
    fn no_action_is_never_legal() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = GameState::random_initial_state(&mut rng, DEFAULT_GOAL);
        let copy = state;
        assert!(!state.is_action_legal(Action::NoAction));
        assert!(!state.apply_action(Action::NoAction));
        assert_eq!(state, copy);
    }

    #[test]
    fn nothing_is_legal_on_a_won_board() {
        let state = GameState::new(0);
        assert!(state.is_win());
        assert_eq!(state.legal_actions().count(), 0);

        let state = GameState::from_rows([[8, 8, 0, 0], [0; 4], [0; 4], [0; 4]], 8);
        assert!(state.is_win());
        assert!(!state.is_action_legal(Action::Left));
    }

    #[test]
    fn nothing_is_legal_on_an_empty_board() {
        let state = GameState::default();
        assert!(!state.is_action_legal(Action::Down));
        assert!(!state.is_loss());
    }

    #[test]
    fn legality_without_movement() {
        let state = with_tiles(&[tile(0, 0, 2), tile(0, 3, 2)]);
        assert!(!state.is_action_legal(Action::Up));

        let state = with_tiles(&[tile(1, 2, 2), tile(1, 3, 4)]);
        assert!(!state.is_action_legal(Action::Right));
    }

    #[test]
    fn legality_with_movement_or_merge() {
        let state = with_tiles(&[tile(2, 2, 2)]);
        assert!(state.is_action_legal(Action::Down));

        let state = with_tiles(&[tile(0, 2, 4), tile(0, 0, 4)]);
        assert!(state.is_action_legal(Action::Left));
    }

    #[test]
    fn blocked_board_is_a_loss() {
        let state = blocked_board();
        for a in Action::DIRECTIONS {
            assert!(!state.is_action_legal(a), "{a} should be illegal");
        }
        assert!(state.is_full());
        assert!(state.is_loss());
        assert!(!state.is_win());
    }

    #[test]
    fn move_up() {
        let mut state = with_tiles(&[tile(0, 1, 2), tile(0, 3, 2), tile(1, 1, 2)]);
        let expected = with_tiles(&[tile(0, 1, 4), tile(0, 3, 2)]);
        assert!(state.apply_action(Action::Up));
        assert_eq!(state, expected);
    }

    #[test]
    fn move_down() {
        let mut state = with_tiles(&[tile(0, 2, 4), tile(3, 0, 4), tile(3, 2, 2)]);
        let expected = with_tiles(&[tile(2, 2, 4), tile(3, 0, 4), tile(3, 2, 2)]);
        assert!(state.apply_action(Action::Down));
        assert_eq!(state, expected);
    }

    #[test]
    fn move_right() {
        let mut state = with_tiles(&[tile(1, 1, 4), tile(1, 3, 4), tile(2, 2, 2)]);
        let expected = with_tiles(&[tile(1, 3, 8), tile(2, 3, 2)]);
        assert!(state.apply_action(Action::Right));
        assert_eq!(state, expected);
    }

    #[test]
    fn move_left() {
        let mut state = with_tiles(&[tile(0, 0, 2), tile(0, 1, 4), tile(0, 2, 4), tile(2, 3, 2)]);
        let expected = with_tiles(&[tile(0, 0, 2), tile(0, 1, 8), tile(2, 0, 2)]);
        assert!(state.apply_action(Action::Left));
        assert_eq!(state, expected);
    }

    #[test]
    fn move_right_merges_from_the_right_edge() {
        let mut state = GameState::from_rows([[2, 2, 2, 0], [0; 4], [0; 4], [0; 4]], DEFAULT_GOAL);
        assert!(state.apply_action(Action::Right));
        assert_eq!(state.row(0), [0, 0, 2, 4]);
    }

    #[test]
    fn illegal_action_leaves_state_untouched() {
        let mut state = with_tiles(&[tile(1, 2, 2), tile(1, 3, 4)]);
        let copy = state;
        assert!(!state.apply_action(Action::Right));
        assert_eq!(state, copy);
    }

    #[test]
    fn legality_matches_board_change() {
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..200 {
            let mut state = GameState::new(1 << 20);
            let fill = rng.gen_range(1..=16);
            for _ in 0..fill {
                let _ = state.add_random_tile(&mut rng);
            }
            for a in Action::DIRECTIONS {
                let mut moved = state;
                let mut changed = false;
                for line in 0..GRID_SIZE {
                    let idx = line_indices(a, line).unwrap();
                    let before = idx.map(|i| moved.cells[i]);
                    changed |= condense(before) != before;
                }
                assert_eq!(state.is_action_legal(a), changed);
                assert_eq!(moved.apply_action(a), changed);
            }
        }
    }

    #[test]
    fn moves_conserve_value() {
        let mut rng = StdRng::seed_from_u64(2024);
        let mut state = GameState::random_initial_state(&mut rng, 1 << 20);
        for _ in 0..300 {
            let legal: Vec<Action> = state.legal_actions().collect();
            if legal.is_empty() {
                break;
            }
            let action = legal[rng.gen_range(0..legal.len())];
            let (count, sum) = (state.filled_cells(), state.sum());
            assert!(state.apply_action(action));
            assert_eq!(state.sum(), sum);
            assert!(state.filled_cells() <= count);
            assert_eq!(state.filled_cells(), state.tiles().count());
            state.add_random_tile(&mut rng).unwrap();
        }
    }

    #[test]
    fn random_tiles_fill_the_board() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut state = GameState::default();
        for _ in 0..16 {
            let placed = state.add_random_tile(&mut rng).unwrap();
            assert!(placed.value() == 2 || placed.value() == 4);
            assert_eq!(state.get(placed.cell()), placed.value());
        }
        assert!(state.is_full());
        assert_eq!(state.empty_count(), 0);
        assert_eq!(state.add_random_tile(&mut rng), Err(EngineError::BoardFull));
    }

    #[test]
    fn add_tile_rejects_occupied_cells() {
        let mut state = with_tiles(&[tile(0, 0, 2)]);
        assert!(!state.add_tile(tile(0, 0, 4)));
        assert_eq!(state.get(Cell::new(0, 0).unwrap()), 2);
        assert_eq!(state.filled_cells(), 1);
    }

    #[test]
    fn remove_tile_recomputes_highest() {
        let mut state = with_tiles(&[tile(0, 0, 2), tile(1, 1, 64), tile(2, 2, 8)]);
        assert_eq!(state.highest(), 64);
        assert_eq!(state.remove_tile(Cell::new(1, 1).unwrap()), 64);
        assert_eq!(state.highest(), 8);
        assert_eq!(state.filled_cells(), 2);
        assert_eq!(state.remove_tile(Cell::new(1, 1).unwrap()), 0);
        assert_eq!(state.filled_cells(), 2);
    }

    #[test]
    fn equality_is_structural() {
        let a = with_tiles(&[tile(0, 0, 2), tile(3, 3, 4)]);
        let mut b = with_tiles(&[tile(3, 3, 4)]);
        assert_ne!(a, b);
        b.add_tile(tile(0, 0, 2));
        assert_eq!(a, b);

        let mut other_goal = GameState::new(4096);
        other_goal.add_tile(tile(0, 0, 2));
        other_goal.add_tile(tile(3, 3, 4));
        assert_ne!(a, other_goal);
    }

    #[test]
    fn constructors_validate_input() {
        assert_eq!(Cell::new(4, 0), Err(EngineError::CellOutOfBounds { row: 4, column: 0 }));
        assert_eq!(Tile::new(Cell::new(0, 0).unwrap(), 0), Err(EngineError::ZeroTile));
        assert_eq!(Cell::new(2, 3).unwrap().index(), 11);
    }
}
