use std::collections::HashMap;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::engine::{Action, Cell, GameState, Tile};
use crate::limits::SearchLimit;
use crate::player::{ActionValue, GamePlayer};

use super::{leaf_value, max_of, spawn_weights, ExpectimaxConfig, SearchStats};

/// Single-threaded expectimax search.
pub struct Expectimax {
    cfg: ExpectimaxConfig,
    stats: SearchStats,
    rng: StdRng,
}

impl Expectimax {
    pub fn new() -> Self { Self::with_config(ExpectimaxConfig::default()) }

    pub fn with_config(cfg: ExpectimaxConfig) -> Self {
        Self { cfg, stats: SearchStats::default(), rng: StdRng::from_entropy() }
    }

    /// Reseed the tie-breaking shuffle.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    #[inline]
    pub fn config(&self) -> &ExpectimaxConfig { &self.cfg }

    /// Expected value of every legal action of `state`, in shuffled order.
    ///
    /// Example
    /// ```
    /// use ai_2048_player::engine::GameState;
    /// use ai_2048_player::expectimax::Expectimax;
    /// use ai_2048_player::limits::SearchLimit;
    /// let state = GameState::from_rows([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]], 2048);
    /// let mut ex = Expectimax::new().with_seed(9);
    /// let branches = ex.branch_evals(&state, SearchLimit::fixed_depth(2));
    /// assert_eq!(branches.len(), 3);
    /// ```
    pub fn branch_evals(&mut self, state: &GameState, mut limit: SearchLimit) -> Vec<ActionValue> {
        let started = Instant::now();
        let mut actions: Vec<Action> = state.legal_actions().collect();
        actions.shuffle(&mut self.rng);

        let mut search = SeqSearch::new(&self.cfg);
        let out: Vec<ActionValue> = actions
            .into_iter()
            .filter_map(|action| search.action_value(state, action, &mut limit).map(|v| ActionValue::new(action, v)))
            .collect();
        let nodes = search.nodes;

        self.stats.record(nodes);
        debug!(nodes, candidates = out.len(), elapsed_us = started.elapsed().as_micros() as u64, "expectimax search");
        out
    }

    /// Value of `state` as a max node: its best branch, or its terminal or
    /// heuristic value when it is not expanded.
    pub fn state_value(&mut self, state: &GameState, mut limit: SearchLimit) -> f64 {
        let mut search = SeqSearch::new(&self.cfg);
        let value = search.max_value_here(state, &mut limit);
        let nodes = search.nodes;
        self.stats.record(nodes);
        value
    }

    /// Statistics collected from the last call to [`Self::branch_evals`] or
    /// [`Self::state_value`].
    #[inline]
    pub fn last_stats(&self) -> SearchStats { self.stats }

    /// Reset accumulated stats to zero.
    #[inline]
    pub fn reset_stats(&mut self) { self.stats = SearchStats::default(); }
}

impl Default for Expectimax {
    fn default() -> Self { Self::new() }
}

impl GamePlayer for Expectimax {
    fn default_limit(&self, state: &GameState) -> SearchLimit {
        SearchLimit::adaptive_depth_with(state, &self.cfg.depth_tiers)
    }

    fn policies_with_limit(&mut self, state: &GameState, limit: SearchLimit) -> Vec<ActionValue> {
        self.branch_evals(state, limit)
    }
}

struct SeqSearch<'a> {
    cfg: &'a ExpectimaxConfig,
    table: HashMap<(GameState, u32), f64>,
    nodes: u64,
}

impl<'a> SeqSearch<'a> {
    fn new(cfg: &'a ExpectimaxConfig) -> Self { Self { cfg, table: HashMap::new(), nodes: 0 } }

    /// Value of playing `action` from `state`; `None` if it is illegal.
    fn action_value(&mut self, state: &GameState, action: Action, limit: &mut SearchLimit) -> Option<f64> {
        let mut next = *state;
        if !next.apply_action(action) {
            return None;
        }
        limit.advance();
        let value = self.expected_value(next, limit);
        limit.retreat();
        Some(value)
    }

    /// Probability-weighted value over every tile placement.
    fn expected_value(&mut self, mut state: GameState, limit: &mut SearchLimit) -> f64 {
        self.nodes += 1;
        let remaining = limit.remaining_plies().filter(|_| self.cfg.cache_enabled);
        if let Some(remaining) = remaining {
            if let Some(&value) = self.table.get(&(state, remaining)) {
                return value;
            }
        }

        let empty: Vec<Cell> = state.empty_cells().collect();
        if empty.is_empty() {
            return self.cfg.evaluator.evaluate(&state);
        }
        let mut value = 0.0;
        for &cell in &empty {
            for (tile_value, weight) in spawn_weights(empty.len()) {
                state.add_tile(Tile::placed(cell, tile_value));
                limit.advance();
                value += weight * self.max_value_here(&state, limit);
                limit.retreat();
                state.remove_tile(cell);
            }
        }

        if let Some(remaining) = remaining {
            self.table.insert((state, remaining), value);
        }
        value
    }

    fn max_value_here(&mut self, state: &GameState, limit: &mut SearchLimit) -> f64 {
        self.nodes += 1;
        if let Some(value) = leaf_value(self.cfg, state, limit) {
            return value;
        }
        let mut values = Vec::with_capacity(Action::SEARCH_ORDER.len());
        for action in Action::SEARCH_ORDER {
            if let Some(value) = self.action_value(state, action, limit) {
                values.push(value);
            }
        }
        max_of(values).unwrap_or_else(|| self.cfg.evaluator.evaluate(state))
    }
}
