//! Expectimax search policy (single-threaded and parallel) for 2048.
//!
//! This module provides two policy implementations:
//! - [`Expectimax`]: single-threaded expectimax.
//! - [`ExpectimaxParallel`]: fork-join expectimax that fans max-node children
//!   out over a bounded, shared pool of worker slots ([`WorkerBudget`]).
//!
//! Both variants share the same public surface, configuration and values:
//! for a fixed depth limit with caching disabled they return identical
//! estimates. Randomness is limited to shuffling root candidates so that
//! equal values are broken fairly.
//!
//! Quick start
//! ```
//! use ai_2048_player::engine::GameState;
//! use ai_2048_player::expectimax::{Expectimax, ExpectimaxParallel};
//! use ai_2048_player::limits::SearchLimit;
//! use ai_2048_player::player::GamePlayer;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(123);
//! let state = GameState::random_initial_state(&mut rng, 2048);
//!
//! let mut ex = Expectimax::new().with_seed(1);
//! let best = ex.policy_with_limit(&state, SearchLimit::fixed_depth(2));
//! assert!(best.action.is_direction());
//!
//! let mut ex_par = ExpectimaxParallel::new().with_seed(1);
//! let branches = ex_par.branch_evals(&state, SearchLimit::fixed_depth(2));
//! assert_eq!(branches.len(), state.legal_actions().count());
//! ```

use serde::{Deserialize, Serialize};

use crate::engine::{GameState, TILE_PROBABILITY_2, TILE_PROBABILITY_4};
use crate::limits::{FillTiers, SearchLimit};

mod budget;
mod heuristic;
mod search_par;
mod search_seq;

pub use budget::{SlotGuard, WorkerBudget};
pub use heuristic::{Evaluator, ADJACENT_HALF_BONUS, CORNER_BONUS};
pub use search_par::ExpectimaxParallel;
pub use search_seq::Expectimax;

/// Win reward is this multiple of the squared goal value.
pub const WIN_REWARD_SCALE: f64 = 100.0;

/// Configurable knobs shared by both expectimax variants.
///
/// - `evaluator`: scoring used when the budget cuts the search off.
/// - `win_reward_scale`: a won state is worth `win_reward_scale * goal^2`.
/// - `cache_enabled`: memoize chance-node values within one search.
/// - `depth_tiers`: ply budgets used by [`crate::player::GamePlayer::policy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectimaxConfig {
    pub evaluator: Evaluator,
    pub win_reward_scale: f64,
    pub cache_enabled: bool,
    pub depth_tiers: FillTiers<u32>,
}

impl Default for ExpectimaxConfig {
    fn default() -> Self {
        Self {
            evaluator: Evaluator::default(),
            win_reward_scale: WIN_REWARD_SCALE,
            cache_enabled: true,
            depth_tiers: FillTiers::default_depth(),
        }
    }
}

impl ExpectimaxConfig {
    pub fn with_evaluator(mut self, evaluator: Evaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn with_depth_tiers(mut self, tiers: FillTiers<u32>) -> Self {
        self.depth_tiers = tiers;
        self
    }

    pub fn with_win_reward_scale(mut self, scale: f64) -> Self {
        self.win_reward_scale = scale;
        self
    }

    /// Terminal reward for reaching `state`'s goal.
    pub fn win_reward(&self, state: &GameState) -> f64 {
        let goal = state.goal() as f64;
        self.win_reward_scale * goal * goal
    }
}

/// Basic search stats for a single evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub nodes: u64,
    pub peak_nodes: u64,
}

impl SearchStats {
    fn record(&mut self, nodes: u64) {
        self.nodes = nodes;
        self.peak_nodes = self.peak_nodes.max(nodes);
    }
}

/// Value of a max node that the search does not expand any further.
fn leaf_value(cfg: &ExpectimaxConfig, state: &GameState, limit: &SearchLimit) -> Option<f64> {
    if limit.done() {
        Some(cfg.evaluator.evaluate(state))
    } else if state.is_win() {
        Some(cfg.win_reward(state))
    } else if state.is_loss() {
        Some(0.0)
    } else {
        None
    }
}

/// Tile values a placement may produce, with their weight per empty cell.
fn spawn_weights(empty_cells: usize) -> [(u32, f64); 2] {
    let per_cell = 1.0 / empty_cells as f64;
    [(2, TILE_PROBABILITY_2 * per_cell), (4, TILE_PROBABILITY_4 * per_cell)]
}

fn max_of(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    values.into_iter().fold(None, |best, v| Some(best.map_or(v, |b: f64| b.max(v))))
}
