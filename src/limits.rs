//! Search budgets shared by the expectimax and Monte Carlo engines.
//!
//! A [`SearchLimit`] is polled with [`SearchLimit::done`] at every cutoff
//! test. Depth limits also count plies: engines call
//! [`SearchLimit::advance`] before descending and [`SearchLimit::retreat`]
//! after returning, and every concurrently explored branch works on its own
//! clone, so siblings never observe each other's depth.
//!
//! ```
//! use ai_2048_player::limits::SearchLimit;
//! let mut limit = SearchLimit::fixed_depth(2);
//! limit.advance();
//! assert!(!limit.done());
//! limit.advance();
//! assert!(limit.done());
//! limit.retreat();
//! assert!(!limit.done());
//! ```

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::engine::GameState;

/// Maps the number of filled cells to a budget.
///
/// The first tier whose bound is at least the filled-cell count wins;
/// boards fuller than every bound get `otherwise`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillTiers<T> {
    /// `(max_filled, budget)` pairs in ascending `max_filled` order.
    pub tiers: Vec<(usize, T)>,
    pub otherwise: T,
}

impl<T: Copy> FillTiers<T> {
    pub fn new(tiers: Vec<(usize, T)>, otherwise: T) -> Self { Self { tiers, otherwise } }

    pub fn pick(&self, filled: usize) -> T {
        self.tiers
            .iter()
            .find(|(max_filled, _)| filled <= *max_filled)
            .map_or(self.otherwise, |&(_, budget)| budget)
    }
}

impl FillTiers<u32> {
    /// Default ply budgets for [`SearchLimit::adaptive_depth`].
    ///
    /// A move plus the tile placement that follows it costs two plies.
    /// Fuller boards deliberately get deeper searches than sparse ones.
    pub fn default_depth() -> Self { FillTiers::new(vec![(3, 4), (12, 6)], 8) }
}

impl FillTiers<u64> {
    /// Default millisecond budgets for [`SearchLimit::timed`].
    pub fn default_time_ms() -> Self { FillTiers::new(vec![(6, 100), (9, 200), (12, 400)], 800) }
}

/// A search budget: unlimited, a ply counter, or a wall-clock deadline.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchLimit {
    /// Never exhausted; the search runs to terminal states.
    Unlimited,
    /// Exhausted once `depth` reaches `max_depth`.
    Depth { depth: u32, max_depth: u32 },
    /// Exhausted once `budget` has elapsed since `start`.
    Deadline { start: Instant, budget: Duration },
}

impl SearchLimit {
    pub fn unlimited() -> Self { SearchLimit::Unlimited }

    /// A ply counter starting at zero. `max_depth == 0` is exhausted immediately.
    pub fn fixed_depth(max_depth: u32) -> Self { SearchLimit::Depth { depth: 0, max_depth } }

    /// A ply budget chosen from how many cells of `state` are filled.
    pub fn adaptive_depth(state: &GameState) -> Self { Self::adaptive_depth_with(state, &FillTiers::default_depth()) }

    pub fn adaptive_depth_with(state: &GameState, tiers: &FillTiers<u32>) -> Self {
        Self::fixed_depth(tiers.pick(state.filled_cells()))
    }

    /// A deadline `budget` from now.
    pub fn deadline(budget: Duration) -> Self { SearchLimit::Deadline { start: Instant::now(), budget } }

    /// A deadline whose length is chosen from how many cells of `state` are filled.
    pub fn timed(state: &GameState) -> Self { Self::timed_with(state, &FillTiers::default_time_ms()) }

    pub fn timed_with(state: &GameState, tiers_ms: &FillTiers<u64>) -> Self {
        Self::deadline(Duration::from_millis(tiers_ms.pick(state.filled_cells())))
    }

    /// True once the budget is exhausted.
    #[inline]
    pub fn done(&self) -> bool {
        match self {
            SearchLimit::Unlimited => false,
            SearchLimit::Depth { depth, max_depth } => depth >= max_depth,
            SearchLimit::Deadline { start, budget } => start.elapsed() >= *budget,
        }
    }

    /// Enter the next ply. A no-op for non-depth limits.
    #[inline]
    pub fn advance(&mut self) {
        if let SearchLimit::Depth { depth, .. } = self {
            *depth += 1;
        }
    }

    /// Return to the caller's ply. A no-op for non-depth limits.
    #[inline]
    pub fn retreat(&mut self) {
        if let SearchLimit::Depth { depth, .. } = self {
            *depth = depth.saturating_sub(1);
        }
    }

    /// Current ply (always 0 for non-depth limits).
    pub fn depth(&self) -> u32 {
        match self {
            SearchLimit::Depth { depth, .. } => *depth,
            _ => 0,
        }
    }

    /// Plies left before the cutoff, if that is a fixed quantity.
    ///
    /// Unlimited searches report `u32::MAX`; deadlines report `None` because
    /// what a subtree reaches depends on timing, so their results must not be
    /// reused.
    pub fn remaining_plies(&self) -> Option<u32> {
        match self {
            SearchLimit::Unlimited => Some(u32::MAX),
            SearchLimit::Depth { depth, max_depth } => Some(max_depth.saturating_sub(*depth)),
            SearchLimit::Deadline { .. } => None,
        }
    }
}
