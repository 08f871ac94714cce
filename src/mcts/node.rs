//! Search-tree nodes.
//!
//! Decision nodes are positions where the player moves; chance nodes are the
//! positions right after a move, waiting for a tile to be placed. Both carry
//! the visit statistics used by UCB1 selection.

use crate::engine::{Action, GameState, Tile};

/// Index into the node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize { self.0 as usize }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    /// One chance child per legal action; empty until expanded.
    Decision { children: Vec<(Action, NodeId)> },
    /// One decision child per placement drawn so far.
    Chance { children: Vec<(Tile, NodeId)> },
}

#[derive(Debug, Clone)]
pub struct Node {
    pub state: GameState,
    pub visits: u32,
    pub value_sum: f64,
    pub kind: NodeKind,
}

impl Node {
    pub fn decision(state: GameState) -> Self {
        Self { state, visits: 0, value_sum: 0.0, kind: NodeKind::Decision { children: Vec::new() } }
    }

    pub fn chance(state: GameState) -> Self {
        Self { state, visits: 0, value_sum: 0.0, kind: NodeKind::Chance { children: Vec::new() } }
    }

    /// Average backed-up value, 0 if never visited.
    #[inline]
    pub fn mean_value(&self) -> f64 {
        if self.visits == 0 {
            0.0
        } else {
            self.value_sum / self.visits as f64
        }
    }

    /// UCB1 score given the natural log of the parent's visit count.
    ///
    /// Only meaningful for visited nodes; unvisited children are chosen
    /// before any score is compared.
    #[inline]
    pub fn ucb_score(&self, ln_parent_visits: f64, exploration: f64) -> f64 {
        self.mean_value() + exploration * (ln_parent_visits / self.visits as f64).sqrt()
    }

    #[inline]
    pub fn is_decision(&self) -> bool { matches!(self.kind, NodeKind::Decision { .. }) }
}
