use serde::{Deserialize, Serialize};

use crate::engine::{Cell, GameState, GRID_SIZE};

/// Multiplier applied when the highest tile sits in a corner.
pub const CORNER_BONUS: f64 = 1.5;
/// Further multiplier when that corner tile touches a tile of half its value.
pub const ADJACENT_HALF_BONUS: f64 = 1.25;

const CORNERS: [(usize, usize); 4] = [(0, 0), (0, GRID_SIZE - 1), (GRID_SIZE - 1, 0), (GRID_SIZE - 1, GRID_SIZE - 1)];

/// Scores states where the search is cut off.
///
/// Losses score 0 and wins score the plain sum of squared tile values.
/// Other states score that sum divided by the squared tile count, which
/// rewards large tiles packed onto few cells.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Evaluator {
    #[default]
    SquaredDensity,
    /// `SquaredDensity` with positional bonuses for a cornered highest tile.
    CornerBonus { corner: f64, adjacent_half: f64 },
}

impl Evaluator {
    /// Corner-bonus evaluator with the default multipliers.
    pub fn corner_bonus() -> Self { Evaluator::CornerBonus { corner: CORNER_BONUS, adjacent_half: ADJACENT_HALF_BONUS } }

    pub fn evaluate(&self, state: &GameState) -> f64 {
        if state.is_loss() {
            return 0.0;
        }
        let sum_sq: f64 = state.tiles().map(|t| (t.value() as f64).powi(2)).sum();
        if state.is_win() {
            return sum_sq;
        }
        let filled = state.filled_cells() as f64;
        if filled == 0.0 {
            return 0.0;
        }
        let mut score = sum_sq / (filled * filled);
        if let Evaluator::CornerBonus { corner, adjacent_half } = *self {
            if let Some(cell) = cornered_highest(state) {
                score *= corner;
                if touches_half(state, cell) {
                    score *= adjacent_half;
                }
            }
        }
        score
    }
}

fn cornered_highest(state: &GameState) -> Option<Cell> {
    CORNERS
        .iter()
        .filter_map(|&(r, c)| Cell::new(r, c).ok())
        .find(|&cell| state.get(cell) == state.highest())
}

fn touches_half(state: &GameState, cell: Cell) -> bool {
    let half = state.get(cell) / 2;
    if half == 0 {
        return false;
    }
    let (r, c) = (cell.row() as isize, cell.column() as isize);
    [(r - 1, c), (r + 1, c), (r, c - 1), (r, c + 1)]
        .into_iter()
        .filter(|&(nr, nc)| nr >= 0 && nc >= 0)
        .filter_map(|(nr, nc)| Cell::new(nr as usize, nc as usize).ok())
        .any(|n| state.get(n) == half)
}
