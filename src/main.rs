use std::time::{Duration, Instant};

use ai_2048_player::engine::{GameState, DEFAULT_GOAL};
use ai_2048_player::expectimax::{Expectimax, ExpectimaxParallel};
use ai_2048_player::limits::SearchLimit;
use ai_2048_player::mcts::MonteCarlo;
use ai_2048_player::player::{GamePlayer, RandomPlayer};
use anyhow::Context;
use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PlayerKind {
    Expectimax,
    Parallel,
    Mcts,
    Random,
}

/// Play one game of 2048 with a search policy and print the boards.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Policy choosing the moves
    #[arg(long, value_enum, default_value_t = PlayerKind::Expectimax)]
    player: PlayerKind,

    /// Seed for tile placement and the policy's own randomness
    #[arg(long)]
    seed: Option<u64>,

    /// Tile value that wins the game
    #[arg(long, default_value_t = DEFAULT_GOAL)]
    goal: u32,

    /// Search this many plies per move instead of the adaptive default
    #[arg(long, conflicts_with = "time_ms")]
    depth: Option<u32>,

    /// Search this many milliseconds per move instead of the adaptive default
    #[arg(long)]
    time_ms: Option<u64>,

    /// Only print the final board
    #[arg(long)]
    quiet: bool,
}

fn build_player(kind: PlayerKind, seed: Option<u64>) -> Box<dyn GamePlayer> {
    match (kind, seed) {
        (PlayerKind::Expectimax, Some(s)) => Box::new(Expectimax::new().with_seed(s)),
        (PlayerKind::Expectimax, None) => Box::new(Expectimax::new()),
        (PlayerKind::Parallel, Some(s)) => Box::new(ExpectimaxParallel::new().with_seed(s)),
        (PlayerKind::Parallel, None) => Box::new(ExpectimaxParallel::new()),
        (PlayerKind::Mcts, Some(s)) => Box::new(MonteCarlo::new().with_seed(s)),
        (PlayerKind::Mcts, None) => Box::new(MonteCarlo::new()),
        (PlayerKind::Random, Some(s)) => Box::new(RandomPlayer::with_seed(s)),
        (PlayerKind::Random, None) => Box::new(RandomPlayer::new()),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("ai_2048_player=info".parse()?))
        .init();
    let args = Args::parse();

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut player = build_player(args.player, args.seed);
    let mut state = GameState::random_initial_state(&mut rng, args.goal);
    if !args.quiet {
        println!("{state}");
    }

    let start = Instant::now();
    let mut move_count = 0u64;
    loop {
        let limit = match (args.depth, args.time_ms) {
            (Some(depth), _) => SearchLimit::fixed_depth(depth),
            (None, Some(ms)) => SearchLimit::deadline(Duration::from_millis(ms)),
            (None, None) => player.default_limit(&state),
        };
        let choice = player.policy_with_limit(&state, limit);
        if !state.apply_action(choice.action) {
            break;
        }
        move_count += 1;
        state.add_random_tile(&mut rng).context("no room for a tile after a legal move")?;
        if !args.quiet {
            println!("{} ({:.4})\n{state}", choice.action, choice.value);
        }
    }

    println!("{state}");
    let outcome = if state.is_win() { "won" } else { "lost" };
    info!(moves = move_count, highest = state.highest(), sum = state.sum(), elapsed_ms = start.elapsed().as_millis() as u64, outcome, "game over");
    println!("Moves made: {}, highest tile: {}, tile sum: {}, {outcome}", move_count, state.highest(), state.sum());
    Ok(())
}
