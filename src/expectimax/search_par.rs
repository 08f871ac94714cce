use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use ahash::RandomState as AHasher;
use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::engine::{Action, Cell, GameState, Tile};
use crate::limits::SearchLimit;
use crate::player::{ActionValue, GamePlayer};

use super::{leaf_value, max_of, spawn_weights, ExpectimaxConfig, SearchStats, WorkerBudget};

/// Parallel expectimax using rayon and a shared `DashMap` transposition table.
///
/// Every max node with several legal moves asks the [`WorkerBudget`] for up
/// to one slot per extra move. Moves that got a slot run as rayon tasks, each
/// with its own copy of the state and limit; the rest run on the current
/// thread. With an empty budget the search is exactly the sequential one.
pub struct ExpectimaxParallel {
    cfg: ExpectimaxConfig,
    budget: Arc<WorkerBudget>,
    stats: SearchStats,
    rng: StdRng,
}

impl ExpectimaxParallel {
    pub fn new() -> Self { Self::with_config(ExpectimaxConfig::default()) }

    pub fn with_config(cfg: ExpectimaxConfig) -> Self {
        Self { cfg, budget: WorkerBudget::global(), stats: SearchStats::default(), rng: StdRng::from_entropy() }
    }

    /// Draw worker slots from `budget` instead of the process-wide one.
    pub fn with_budget(mut self, budget: Arc<WorkerBudget>) -> Self {
        self.budget = budget;
        self
    }

    /// Reseed the tie-breaking shuffle.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    #[inline]
    pub fn config(&self) -> &ExpectimaxConfig { &self.cfg }

    #[inline]
    pub fn budget(&self) -> &Arc<WorkerBudget> { &self.budget }

    /// Expected value of every legal action of `state`, in shuffled order.
    ///
    /// Root candidates are fanned out like any other max node.
    pub fn branch_evals(&mut self, state: &GameState, mut limit: SearchLimit) -> Vec<ActionValue> {
        let started = Instant::now();
        let mut actions: Vec<Action> = state.legal_actions().collect();
        actions.shuffle(&mut self.rng);

        let search = ParSearch::new(&self.cfg, &self.budget);
        let values = search.evaluate_candidates(state, &actions, &mut limit);
        let out: Vec<ActionValue> = actions
            .into_iter()
            .zip(values)
            .filter_map(|(action, value)| value.map(|v| ActionValue::new(action, v)))
            .collect();
        let nodes = search.nodes.load(Ordering::Relaxed);

        self.stats.record(nodes);
        debug!(
            nodes,
            candidates = out.len(),
            cached = search.table.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "parallel expectimax search"
        );
        out
    }

    /// Value of `state` as a max node.
    pub fn state_value(&mut self, state: &GameState, mut limit: SearchLimit) -> f64 {
        let search = ParSearch::new(&self.cfg, &self.budget);
        let value = search.max_value_here(state, &mut limit);
        let nodes = search.nodes.load(Ordering::Relaxed);
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

impl Default for ExpectimaxParallel {
    fn default() -> Self { Self::new() }
}

impl GamePlayer for ExpectimaxParallel {
    fn default_limit(&self, state: &GameState) -> SearchLimit {
        SearchLimit::adaptive_depth_with(state, &self.cfg.depth_tiers)
    }

    fn policies_with_limit(&mut self, state: &GameState, limit: SearchLimit) -> Vec<ActionValue> {
        self.branch_evals(state, limit)
    }
}

struct ParSearch<'a> {
    cfg: &'a ExpectimaxConfig,
    budget: &'a WorkerBudget,
    table: DashMap<(GameState, u32), f64, AHasher>,
    nodes: AtomicU64,
}

impl<'a> ParSearch<'a> {
    fn new(cfg: &'a ExpectimaxConfig, budget: &'a WorkerBudget) -> Self {
        Self { cfg, budget, table: DashMap::with_hasher(AHasher::new()), nodes: AtomicU64::new(0) }
    }

    /// Values of `candidates` played from `state`, in candidate order.
    ///
    /// The first `k` candidates run as rayon tasks, where `k` is the number of
    /// slots granted; the caller's thread evaluates the rest with `limit`.
    fn evaluate_candidates(&self, state: &GameState, candidates: &[Action], limit: &mut SearchLimit) -> Vec<Option<f64>> {
        let slots = self.budget.reserve(candidates.len().saturating_sub(1));
        if slots.is_empty() {
            return candidates.iter().map(|&action| self.action_value(state, action, limit)).collect();
        }

        let mut values = vec![None; candidates.len()];
        let (forked, local) = candidates.split_at(slots.len());
        let (forked_out, local_out) = values.split_at_mut(slots.len());
        let jobs: Vec<_> = slots.into_iter().zip(forked).zip(forked_out.iter_mut()).collect();
        rayon::scope(|s| {
            for ((slot, &action), out) in jobs {
                let branch_state = *state;
                let mut branch_limit = limit.clone();
                s.spawn(move |_| {
                    let _slot = slot;
                    *out = self.action_value(&branch_state, action, &mut branch_limit);
                });
            }
            for (&action, out) in local.iter().zip(local_out.iter_mut()) {
                *out = self.action_value(state, action, limit);
            }
        });
        values
    }

    fn action_value(&self, state: &GameState, action: Action, limit: &mut SearchLimit) -> Option<f64> {
        let mut next = *state;
        if !next.apply_action(action) {
            return None;
        }
        limit.advance();
        let value = self.expected_value(next, limit);
        limit.retreat();
        Some(value)
    }

    fn expected_value(&self, mut state: GameState, limit: &mut SearchLimit) -> f64 {
        self.nodes.fetch_add(1, Ordering::Relaxed);
        let remaining = limit.remaining_plies().filter(|_| self.cfg.cache_enabled);
        if let Some(remaining) = remaining {
            // Copy the value out so no shard lock is held while recursing.
            let hit = self.table.get(&(state, remaining)).map(|entry| *entry);
            if let Some(value) = hit {
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

    fn max_value_here(&self, state: &GameState, limit: &mut SearchLimit) -> f64 {
        self.nodes.fetch_add(1, Ordering::Relaxed);
        if let Some(value) = leaf_value(self.cfg, state, limit) {
            return value;
        }
        let candidates: Vec<Action> =
            Action::SEARCH_ORDER.into_iter().filter(|&action| state.is_action_legal(action)).collect();
        max_of(self.evaluate_candidates(state, &candidates, limit).into_iter().flatten())
            .unwrap_or_else(|| self.cfg.evaluator.evaluate(state))
    }
}
