use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use ai_2048_player::engine::{Action, GameState, Tile};
use ai_2048_player::expectimax::{Expectimax, ExpectimaxConfig, ExpectimaxParallel, WorkerBudget, WIN_REWARD_SCALE};
use ai_2048_player::limits::SearchLimit;
use ai_2048_player::mcts::{MctsConfig, MonteCarlo};
use ai_2048_player::player::{best, ActionValue, GamePlayer, RandomPlayer};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn win_reward(goal: u32) -> f64 { WIN_REWARD_SCALE * (goal as f64).powi(2) }

fn assert_close(a: f64, b: f64) {
    assert!((a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0), "{a} != {b}");
}

/// Random reachable positions of varying density.
fn playout_states(seed: u64, count: usize) -> Vec<GameState> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut player = RandomPlayer::with_seed(seed);
    let mut state = GameState::random_initial_state(&mut rng, 2048);
    let mut out = Vec::new();
    while out.len() < count {
        out.push(state);
        if !state.apply_action(player.policy(&state)) || state.add_random_tile(&mut rng).is_err() {
            state = GameState::random_initial_state(&mut rng, 2048);
        }
    }
    out
}

#[test]
fn only_winning_moves_are_worth_the_win_reward_unlimited() {
    // Full board; the only legal moves merge the 16s.
    let state = GameState::from_rows([[16, 16, 2, 4], [2, 4, 8, 2], [4, 8, 2, 4], [8, 2, 4, 8]], 32);
    let mut players: Vec<Box<dyn GamePlayer>> = vec![
        Box::new(Expectimax::new().with_seed(1)),
        Box::new(ExpectimaxParallel::new().with_budget(Arc::new(WorkerBudget::new(2))).with_seed(1)),
    ];
    for player in players.iter_mut() {
        let values = player.policies_with_limit(&state, SearchLimit::unlimited());
        assert_eq!(values.len(), 2);
        for av in values {
            assert!(matches!(av.action, Action::Left | Action::Right));
            assert_close(av.value, win_reward(32));
        }
    }
}

#[test]
fn expectimax_finds_the_forced_win() {
    let state = GameState::from_rows([[16, 16, 2, 0], [2, 4, 8, 2], [4, 8, 2, 4], [8, 2, 4, 8]], 32);
    let mut ex = Expectimax::new().with_seed(3);
    let choice = ex.policy_with_limit(&state, SearchLimit::fixed_depth(3));
    assert!(matches!(choice.action, Action::Left | Action::Right), "chose {}", choice.action);
    assert_close(choice.value, win_reward(32));

    let mut next = state;
    assert!(next.apply_action(choice.action));
    assert!(next.is_win());
    assert!(next.legal_actions().next().is_none());
}

#[test]
fn expectimax_finds_a_two_move_win_unlimited() {
    // No single move joins the 16s; either sideways move lines them up for the next.
    let state = GameState::from_rows([[8, 8, 16, 4], [16, 4, 2, 8], [4, 2, 4, 2], [2, 4, 2, 4]], 32);
    for action in state.legal_actions() {
        let mut next = state;
        assert!(next.apply_action(action));
        assert!(!next.is_win());
    }

    let mut players: Vec<Box<dyn GamePlayer>> = vec![
        Box::new(Expectimax::new().with_seed(8)),
        Box::new(ExpectimaxParallel::new().with_budget(Arc::new(WorkerBudget::new(2))).with_seed(8)),
    ];
    for player in players.iter_mut() {
        let values = player.policies_with_limit(&state, SearchLimit::unlimited());
        assert_eq!(values.len(), 2);
        for av in &values {
            assert!(matches!(av.action, Action::Left | Action::Right));
            assert_close(av.value, win_reward(32));
        }
        let choice = best(&values);
        let mut next = state;
        assert!(next.apply_action(choice.action));
        for cell in next.empty_cells().collect::<Vec<_>>() {
            for tile in [2, 4] {
                let mut placed = next;
                assert!(placed.add_tile(Tile::new(cell, tile).unwrap()));
                let wins = placed.legal_actions().any(|a| {
                    let mut after = placed;
                    after.apply_action(a) && after.is_win()
                });
                assert!(wins, "no win after {} and {tile} at {cell:?}", choice.action);
            }
        }
    }
}

#[test]
fn cache_keeps_deep_values_exact() {
    let states: Vec<GameState> =
        playout_states(31, 60).into_iter().filter(|s| s.filled_cells() >= 6).step_by(7).take(3).collect();
    assert_eq!(states.len(), 3);
    let cached = ExpectimaxConfig::default().with_cache(true);
    let plain = ExpectimaxConfig::default().with_cache(false);
    let budget = Arc::new(WorkerBudget::new(3));
    for state in states {
        let reference = Expectimax::with_config(plain.clone()).state_value(&state, SearchLimit::fixed_depth(6));
        let seq = Expectimax::with_config(cached.clone()).state_value(&state, SearchLimit::fixed_depth(6));
        let par = ExpectimaxParallel::with_config(cached.clone())
            .with_budget(Arc::clone(&budget))
            .state_value(&state, SearchLimit::fixed_depth(6));
        assert_close(seq, reference);
        assert_close(par, reference);
    }
}

#[test]
fn parallel_matches_sequential_for_fixed_depth() {
    let cfg = ExpectimaxConfig::default().with_cache(false);
    let mut seq = Expectimax::with_config(cfg.clone()).with_seed(5);
    let mut par = ExpectimaxParallel::with_config(cfg).with_budget(Arc::new(WorkerBudget::new(4))).with_seed(5);
    for state in playout_states(11, 12) {
        let mut a = seq.policies_with_limit(&state, SearchLimit::fixed_depth(4));
        let mut b = par.policies_with_limit(&state, SearchLimit::fixed_depth(4));
        a.sort_by_key(|av| av.action as u8);
        b.sort_by_key(|av| av.action as u8);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.action, y.action);
            assert_close(x.value, y.value);
        }
    }
}

#[test]
fn cached_parallel_search_agrees_with_sequential() {
    let state = playout_states(21, 6)[5];
    let mut seq = Expectimax::new().with_seed(2);
    let mut par = ExpectimaxParallel::new().with_budget(Arc::new(WorkerBudget::new(3))).with_seed(2);
    let a = seq.state_value(&state, SearchLimit::fixed_depth(4));
    let b = par.state_value(&state, SearchLimit::fixed_depth(4));
    assert_close(a, b);
}

#[test]
fn worker_budget_is_conserved_under_contention() {
    let budget = Arc::new(WorkerBudget::new(3));
    let handles: Vec<_> = (0..6u64)
        .map(|t| {
            let budget = Arc::clone(&budget);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(100 + t);
                let mut par = ExpectimaxParallel::new().with_budget(budget).with_seed(t);
                for state in playout_states(t, 8) {
                    let depth = rng.gen_range(1..=4);
                    let values = par.policies_with_limit(&state, SearchLimit::fixed_depth(depth));
                    assert_eq!(values.len(), state.legal_actions().count());
                    assert!(par.budget().available() <= par.budget().capacity());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(budget.available(), 3);
}

#[test]
fn single_legal_action_is_the_only_report() {
    // Only Up is legal: the top row is empty and nothing can merge.
    let state = GameState::from_rows([[0, 0, 0, 0], [2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4]], 2048);
    assert_eq!(state.legal_actions().collect::<Vec<_>>(), vec![Action::Up]);

    let mut mc = MonteCarlo::with_config(MctsConfig::for_testing()).with_seed(9);
    let values = mc.policies_with_limit(&state, SearchLimit::fixed_depth(50));
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].action, Action::Up);
    assert!(values[0].value > 0.0);

    let mut ex = Expectimax::new().with_seed(9);
    assert_eq!(ex.policy(&state), Action::Up);
}

#[test]
fn seeded_players_are_deterministic() {
    let state = playout_states(3, 10)[9];
    let runs = |seed: u64| -> Vec<Vec<ActionValue>> {
        vec![
            Expectimax::new().with_seed(seed).policies_with_limit(&state, SearchLimit::fixed_depth(4)),
            MonteCarlo::with_config(MctsConfig::for_testing())
                .with_seed(seed)
                .policies_with_limit(&state, SearchLimit::fixed_depth(300)),
            RandomPlayer::with_seed(seed).policies(&state),
        ]
    };
    assert_eq!(runs(77), runs(77));
}

#[test]
fn deadline_bounds_monte_carlo_search() {
    let state = playout_states(4, 5)[4];
    let mut mc = MonteCarlo::new().with_seed(4);
    let started = Instant::now();
    let choice = mc.policy_with_limit(&state, SearchLimit::deadline(Duration::from_millis(50)));
    assert!(choice.action.is_direction());
    assert!(mc.last_samples() > 0);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn default_limits_play_legal_moves() {
    let state = playout_states(6, 2)[1];
    let mut players: Vec<Box<dyn GamePlayer>> = vec![
        Box::new(Expectimax::new().with_seed(6)),
        Box::new(MonteCarlo::with_config(MctsConfig::for_testing()).with_seed(6)),
        Box::new(RandomPlayer::with_seed(6)),
    ];
    for player in players.iter_mut() {
        let action = player.policy(&state);
        assert!(state.is_action_legal(action), "{action} is not legal");
    }
}

#[test]
fn ties_are_broken_across_actions() {
    // Symmetric position: the mirrored moves have equal value.
    let state = GameState::from_rows([[0, 0, 0, 0], [0, 2, 2, 0], [0, 2, 2, 0], [0; 4]], 2048);
    let mut seen = std::collections::HashSet::new();
    for seed in 0..40 {
        let mut ex = Expectimax::new().with_seed(seed);
        let values = ex.policies_with_limit(&state, SearchLimit::fixed_depth(2));
        seen.insert(best(&values).action);
    }
    assert!(seen.len() > 1, "always chose {seen:?}");
}

#[test]
fn a_full_game_ends_in_win_or_loss() {
    let mut rng = StdRng::seed_from_u64(12);
    let mut state = GameState::random_initial_state(&mut rng, 64);
    let mut player = Expectimax::new().with_seed(12);
    for _ in 0..10_000 {
        let choice = player.policy_with_limit(&state, SearchLimit::fixed_depth(2));
        if !state.apply_action(choice.action) {
            break;
        }
        state.add_random_tile(&mut rng).unwrap();
    }
    assert!(state.is_win() || state.is_loss());
}
