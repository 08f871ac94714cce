//! Arena-allocated search tree.
//!
//! Nodes live in one `Vec` and refer to each other by [`NodeId`]. The tree
//! belongs to a single search and is dropped once its values are reported.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::engine::{Action, GameState, Tile};

use super::node::{Node, NodeId, NodeKind};

#[derive(Debug)]
pub struct SearchTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl SearchTree {
    /// A tree holding a single, unexpanded decision node for `root_state`.
    pub fn new(root_state: GameState) -> Self { Self { nodes: vec![Node::decision(root_state)], root: NodeId(0) } }

    #[inline]
    pub fn root(&self) -> NodeId { self.root }

    #[inline]
    pub fn get(&self, id: NodeId) -> &Node { &self.nodes[id.index()] }

    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut Node { &mut self.nodes[id.index()] }

    #[inline]
    pub fn len(&self) -> usize { self.nodes.len() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    fn allocate(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Give a decision node one chance child per legal action.
    ///
    /// Returns the number of children; a decision node that is already
    /// expanded is left alone.
    pub fn expand(&mut self, id: NodeId) -> usize {
        let state = self.get(id).state;
        if let NodeKind::Decision { children } = &self.get(id).kind {
            if !children.is_empty() {
                return children.len();
            }
        }
        let mut created = Vec::new();
        for action in state.legal_actions() {
            let mut next = state;
            next.apply_action(action);
            created.push((action, self.allocate(Node::chance(next))));
        }
        let count = created.len();
        if let NodeKind::Decision { children } = &mut self.get_mut(id).kind {
            *children = created;
        }
        count
    }

    /// The decision child of a chance node for `tile`, created on first use.
    pub fn placement_child(&mut self, id: NodeId, tile: Tile, state: GameState) -> NodeId {
        if let NodeKind::Chance { children } = &self.get(id).kind {
            if let Some(&(_, child)) = children.iter().find(|(t, _)| *t == tile) {
                return child;
            }
        }
        let child = self.allocate(Node::decision(state));
        if let NodeKind::Chance { children } = &mut self.get_mut(id).kind {
            children.push((tile, child));
        }
        child
    }

    /// Pick a child of a decision node: a random unvisited one if any,
    /// else the UCB1 maximum. `None` if the node has no children.
    pub fn select_child<R: Rng + ?Sized>(&self, id: NodeId, exploration: f64, rng: &mut R) -> Option<NodeId> {
        let node = self.get(id);
        let NodeKind::Decision { children } = &node.kind else {
            return None;
        };
        let unvisited: Vec<NodeId> =
            children.iter().map(|&(_, child)| child).filter(|&child| self.get(child).visits == 0).collect();
        if let Some(&child) = unvisited.choose(rng) {
            return Some(child);
        }
        let ln_parent = (node.visits as f64).ln();
        children
            .iter()
            .map(|&(_, child)| (child, self.get(child).ucb_score(ln_parent, exploration)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(child, _)| child)
    }

    /// Add `value` and one visit to every node on `path`.
    pub fn backpropagate(&mut self, path: &[NodeId], value: f64) {
        for &id in path {
            let node = self.get_mut(id);
            node.visits += 1;
            node.value_sum += value;
        }
    }

    /// Each root action with its mean value (0 if unvisited), in expansion order.
    pub fn root_values(&self) -> Vec<(Action, f64)> {
        match &self.get(self.root).kind {
            NodeKind::Decision { children } => {
                children.iter().map(|&(action, child)| (action, self.get(child).mean_value())).collect()
            }
            NodeKind::Chance { .. } => Vec::new(),
        }
    }
}
