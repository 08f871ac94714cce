//! Monte Carlo tree search policy for 2048.
//!
//! Each sample walks from the root, choosing moves with UCB1 and drawing
//! tile placements at random, until it reaches a position it has not seen
//! before. A random playout from there is scored and the score is added to
//! every node on the walk. Root actions are reported with their mean score.
//!
//! ```
//! use ai_2048_player::engine::GameState;
//! use ai_2048_player::limits::SearchLimit;
//! use ai_2048_player::mcts::MonteCarlo;
//! use ai_2048_player::player::GamePlayer;
//!
//! let state = GameState::from_rows([[2, 2, 0, 0], [0; 4], [0; 4], [0, 0, 0, 4]], 2048);
//! let mut mc = MonteCarlo::new().with_seed(11);
//! let values = mc.policies_with_limit(&state, SearchLimit::fixed_depth(200));
//! assert_eq!(values.len(), state.legal_actions().count());
//! assert_eq!(mc.last_samples(), 200);
//! ```

use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{GameState, TOTAL_CELLS};
use crate::limits::{FillTiers, SearchLimit};
use crate::player::{ActionValue, GamePlayer};

mod node;
mod tree;

pub use node::{Node, NodeId, NodeKind};
pub use tree::SearchTree;

/// UCB1 exploration constant.
pub const EXPLORATION_RATE: f64 = 2.0;

/// Knobs for [`MonteCarlo`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MctsConfig {
    /// UCB1 exploration constant.
    pub exploration: f64,
    /// Hard cap on samples per search, whatever the limit says.
    pub max_samples: u64,
    /// Deadline budgets used by [`GamePlayer::policy`].
    pub time_tiers_ms: FillTiers<u64>,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self { exploration: EXPLORATION_RATE, max_samples: 1_000_000, time_tiers_ms: FillTiers::default_time_ms() }
    }
}

impl MctsConfig {
    /// Small, fast settings for tests.
    pub fn for_testing() -> Self { Self { max_samples: 500, ..Self::default() } }

    pub fn with_exploration(mut self, c: f64) -> Self {
        self.exploration = c;
        self
    }

    pub fn with_max_samples(mut self, n: u64) -> Self {
        self.max_samples = n;
        self
    }

    pub fn with_time_tiers(mut self, tiers_ms: FillTiers<u64>) -> Self {
        self.time_tiers_ms = tiers_ms;
        self
    }
}

/// Scores a finished position in `[0, 1]`: the mean of goal progress and
/// the empty-cell fraction.
pub fn progress_score(state: &GameState) -> f64 {
    let progress = if state.goal() == 0 { 1.0 } else { (state.highest() as f64 / state.goal() as f64).min(1.0) };
    let space = state.empty_count() as f64 / TOTAL_CELLS as f64;
    (progress + space) / 2.0
}

/// Plays random legal moves, each followed by a random tile, until none is legal.
fn rollout<R: Rng + ?Sized>(mut state: GameState, rng: &mut R) -> f64 {
    loop {
        let actions: Vec<_> = state.legal_actions().collect();
        let Some(&action) = actions.choose(rng) else {
            break;
        };
        state.apply_action(action);
        if state.add_random_tile(rng).is_err() {
            break;
        }
    }
    progress_score(&state)
}

/// Monte Carlo tree search player.
pub struct MonteCarlo {
    cfg: MctsConfig,
    rng: StdRng,
    samples: u64,
}

impl MonteCarlo {
    pub fn new() -> Self { Self::with_config(MctsConfig::default()) }

    pub fn with_config(cfg: MctsConfig) -> Self { Self { cfg, rng: StdRng::from_entropy(), samples: 0 } }

    /// Reseed sampling, rollouts and the report shuffle.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    #[inline]
    pub fn config(&self) -> &MctsConfig { &self.cfg }

    /// Samples drawn by the last search.
    #[inline]
    pub fn last_samples(&self) -> u64 { self.samples }

    /// Sample until `limit` is done or the sample cap is hit, then report
    /// every legal root action with its mean value in shuffled order.
    pub fn search(&mut self, state: &GameState, mut limit: SearchLimit) -> Vec<ActionValue> {
        let started = Instant::now();
        let mut tree = SearchTree::new(*state);
        let root = tree.root();
        self.samples = 0;
        if tree.expand(root) == 0 {
            return Vec::new();
        }

        while !limit.done() && self.samples < self.cfg.max_samples {
            self.sample(&mut tree);
            self.samples += 1;
            limit.advance();
        }

        let mut out: Vec<ActionValue> =
            tree.root_values().into_iter().map(|(action, value)| ActionValue::new(action, value)).collect();
        out.shuffle(&mut self.rng);
        debug!(
            samples = self.samples,
            nodes = tree.len(),
            candidates = out.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "monte carlo search"
        );
        out
    }

    fn sample(&mut self, tree: &mut SearchTree) {
        let root = tree.root();
        let mut path = vec![root];
        let mut id = root;
        let value = loop {
            let node = tree.get(id);
            let state = node.state;
            if node.is_decision() {
                if id != root && node.visits == 0 {
                    break rollout(state, &mut self.rng);
                }
                if tree.expand(id) == 0 {
                    break progress_score(&state);
                }
                match tree.select_child(id, self.cfg.exploration, &mut self.rng) {
                    Some(child) => id = child,
                    None => break progress_score(&state),
                }
            } else {
                let mut next = state;
                match next.add_random_tile(&mut self.rng) {
                    Ok(tile) => id = tree.placement_child(id, tile, next),
                    Err(err) => {
                        debug!(%err, "chance node without an empty cell");
                        break progress_score(&state);
                    }
                }
            }
            path.push(id);
        };
        tree.backpropagate(&path, value);
    }
}

impl Default for MonteCarlo {
    fn default() -> Self { Self::new() }
}

impl GamePlayer for MonteCarlo {
    fn default_limit(&self, state: &GameState) -> SearchLimit { SearchLimit::timed_with(state, &self.cfg.time_tiers_ms) }

    fn policies_with_limit(&mut self, state: &GameState, limit: SearchLimit) -> Vec<ActionValue> {
        self.search(state, limit)
    }
}
