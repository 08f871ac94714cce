//! ai-2048-player: a 2048 game model with search-based move policies
//!
//! This crate provides:
//! - A value-semantic `GameState` with move, legality and tile-placement operations (`engine`)
//! - Search budgets by ply count or wall-clock deadline (`limits`)
//! - The `GamePlayer` policy surface and a random baseline (`player`)
//! - Expectimax with single-threaded and parallel variants (`expectimax`)
//! - Monte Carlo tree search (`mcts`)
//!
//! Quick start:
//! ```
//! use ai_2048_player::engine::GameState;
//! use ai_2048_player::expectimax::Expectimax;
//! use ai_2048_player::limits::SearchLimit;
//! use ai_2048_player::player::GamePlayer;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! // Deterministic game with a seeded RNG
//! let mut rng = StdRng::seed_from_u64(42);
//! let mut state = GameState::random_initial_state(&mut rng, 2048);
//! let mut player = Expectimax::new().with_seed(42);
//! for _ in 0..3 {
//!     let choice = player.policy_with_limit(&state, SearchLimit::fixed_depth(2));
//!     assert!(state.apply_action(choice.action));
//!     state.add_random_tile(&mut rng).unwrap();
//! }
//! assert!(state.filled_cells() <= 5);
//! ```
//!
pub mod engine;
pub mod expectimax;
pub mod limits;
pub mod mcts;
pub mod player;
