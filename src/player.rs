//! The policy surface every engine exposes to callers.
//!
//! Engines implement [`GamePlayer::policies_with_limit`]; everything else is
//! derived from it. Candidate lists come back shuffled, so taking the first
//! maximum ([`best`]) breaks ties uniformly at random.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::engine::{Action, GameState};
use crate::limits::SearchLimit;

/// Value reported alongside `Action::NoAction`.
pub const NO_VALUE: f64 = f64::NEG_INFINITY;

/// An action and its estimated value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionValue {
    pub action: Action,
    pub value: f64,
}

impl ActionValue {
    /// The result of a policy query on a state with no legal action.
    pub const NONE: ActionValue = ActionValue { action: Action::NoAction, value: NO_VALUE };

    pub fn new(action: Action, value: f64) -> Self { Self { action, value } }
}

/// First entry with the strictly highest value, or [`ActionValue::NONE`].
pub fn best(candidates: &[ActionValue]) -> ActionValue {
    candidates.iter().fold(ActionValue::NONE, |best, &av| if av.value > best.value { av } else { best })
}

/// A policy for choosing moves.
pub trait GamePlayer {
    /// Budget used when the caller does not supply one.
    fn default_limit(&self, state: &GameState) -> SearchLimit;

    /// Every legal action of `state` with its estimated value, in random
    /// order. Empty when no action is legal.
    fn policies_with_limit(&mut self, state: &GameState, limit: SearchLimit) -> Vec<ActionValue>;

    fn policies(&mut self, state: &GameState) -> Vec<ActionValue> {
        let limit = self.default_limit(state);
        self.policies_with_limit(state, limit)
    }

    fn policy_with_limit(&mut self, state: &GameState, limit: SearchLimit) -> ActionValue {
        best(&self.policies_with_limit(state, limit))
    }

    /// The action to take, or `Action::NoAction` if none is legal.
    fn policy(&mut self, state: &GameState) -> Action {
        let limit = self.default_limit(state);
        self.policy_with_limit(state, limit).action
    }
}

/// Picks a uniformly random legal action. Useful as a baseline.
pub struct RandomPlayer {
    rng: StdRng,
}

impl RandomPlayer {
    pub fn new() -> Self { Self { rng: StdRng::from_entropy() } }

    pub fn with_seed(seed: u64) -> Self { Self { rng: StdRng::seed_from_u64(seed) } }
}

impl Default for RandomPlayer {
    fn default() -> Self { Self::new() }
}

impl GamePlayer for RandomPlayer {
    fn default_limit(&self, _state: &GameState) -> SearchLimit { SearchLimit::unlimited() }

    fn policies_with_limit(&mut self, state: &GameState, _limit: SearchLimit) -> Vec<ActionValue> {
        let mut out: Vec<ActionValue> = state.legal_actions().map(|a| ActionValue::new(a, 0.0)).collect();
        out.shuffle(&mut self.rng);
        out
    }
}
