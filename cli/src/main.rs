//! # 2048 Battle CLI
//!
//! Command-line interface for playing 2048 interactively or running
//! headless simulations with configurable policies. Every move is shown
//! through the animation events, the same way a peer renders an opponent.

use battle_2048_core::{
    diff_snapshots, Config, Direction, Game, Outcome, Result, ScoreRule, Snapshot, Store,
    TileLayer, GRID_LEN,
};
use clap::{Parser, ValueEnum};
use log::{error, info, LevelFilter};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "battle-2048")]
#[command(author, version, about = "Play 2048 battle in the terminal or run simulations")]
struct Args {
    /// Run in interactive mode (default if no other mode specified)
    #[arg(short, long)]
    interactive: bool,

    /// Number of episodes to run in headless mode
    #[arg(short, long)]
    episodes: Option<u32>,

    /// Random seed for deterministic runs
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Start from the grid shared by every player using this key
    #[arg(short, long)]
    key: Option<String>,

    /// Save file to resume from and write to after every move (interactive only)
    #[arg(long, conflicts_with_all = ["episodes", "key"])]
    save: Option<PathBuf>,

    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tile value that wins the game (overrides the config file)
    #[arg(long)]
    win_threshold: Option<u32>,

    /// How a move's merges are scored (overrides the config file)
    #[arg(long, value_enum)]
    score_rule: Option<ScoreRuleArg>,

    /// Maximum steps per episode (0 = unlimited)
    #[arg(short, long, default_value = "10000")]
    max_steps: u32,

    /// Policy for headless mode
    #[arg(short, long, value_enum, default_value = "random")]
    policy: Policy,

    /// Show board after each move in headless mode
    #[arg(long)]
    verbose: bool,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long)]
    debug: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Policy {
    /// Random valid moves
    Random,
    /// Cycle through directions: Left, Down, Right, Up
    Cycle,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScoreRuleArg {
    /// Value of the last merge in the move
    LastMerge,
    /// Sum of every merge in the move
    Sum,
}

impl From<ScoreRuleArg> for ScoreRule {
    fn from(arg: ScoreRuleArg) -> Self {
        match arg {
            ScoreRuleArg::LastMerge => ScoreRule::LastMerge,
            ScoreRuleArg::Sum => ScoreRule::Sum,
        }
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    let result = match args.episodes {
        Some(episodes) => run_headless(&args, episodes),
        None => run_interactive(&args),
    };
    if let Err(e) = result {
        disable_raw_mode();
        error!("{}", e);
        std::process::exit(1);
    }
}

fn init_logging(debug: bool) {
    let mut builder = colog::default_builder();
    builder.filter_level(if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    });
    builder.parse_default_env();
    builder.init();
}

/// Build the game config from the config file, then the command-line
/// overrides.
fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_json(&fs::read(path)?)?,
        None => Config::default(),
    };
    if let Some(threshold) = args.win_threshold {
        config.win_threshold = threshold;
    }
    if let Some(rule) = args.score_rule {
        config.score_rule = rule.into();
    }
    Ok(config)
}

/// A fresh game, started from `--key` if given. Never touches a save file.
fn fresh_game(args: &Args, seed: u64, config: Config) -> Game {
    let mut game = Game::with_config(seed, config);
    if let Some(key) = &args.key {
        game.reset_with_key(key);
    }
    game
}

/// The interactive game: resumed from `--save` if given, fresh otherwise.
fn new_game(args: &Args, config: Config) -> Result<Game> {
    match &args.save {
        Some(path) => Game::with_config(args.seed, config).with_store(Store::new(path)),
        None => Ok(fresh_game(args, args.seed, config)),
    }
}

fn restart(game: &mut Game, key: Option<&str>) {
    match key {
        Some(key) => game.reset_with_key(key),
        None => game.reset(),
    }
}

/// Run interactive mode where user plays with keyboard.
fn run_interactive(args: &Args) -> Result<()> {
    let mut game = new_game(args, load_config(args)?)?;
    let mut layer = TileLayer::from_grid(game.grid());

    // Set terminal to raw mode for single-key input
    enable_raw_mode();

    let mut stdin = io::stdin();

    redraw(&game, &layer)?;

    loop {
        match next_action(&mut stdin)? {
            InputAction::Move(dir) => {
                if game.outcome() == Outcome::Lose {
                    continue;
                }
                let report = game.execute_move(dir);
                layer.sync(&report.animations, game.grid());
                redraw(&game, &layer)?;

                if report.points > 0 {
                    println!("  +{} points!", report.points);
                }

                match report.outcome {
                    Outcome::Lose => {
                        println!("\n  *** GAME OVER ***");
                        println!("  Final Score: {}", game.score());
                        println!("  Max Tile: {}", game.grid().highest_tile());
                        println!("\n  Press R to restart or Q to quit");
                    }
                    Outcome::Win => println!("\n  *** YOU WIN! *** Keep going or press R"),
                    Outcome::None => {}
                }
            }
            InputAction::Restart => {
                restart(&mut game, args.key.as_deref());
                layer.reload(game.grid());
                redraw(&game, &layer)?;
            }
            InputAction::Quit => {
                disable_raw_mode();
                if game.store().is_some() {
                    game.save()?;
                }
                println!("\nGoodbye!");
                return Ok(());
            }
            InputAction::None => {}
        }
    }
}

/// Run headless simulation mode.
fn run_headless(args: &Args, episodes: u32) -> Result<()> {
    let config = load_config(args)?;
    let mut total_score: u64 = 0;
    let mut max_tile_overall: u32 = 0;
    let mut scores: Vec<u32> = Vec::with_capacity(episodes as usize);
    let mut max_tiles: Vec<u32> = Vec::with_capacity(episodes as usize);
    let mut reloads = Reloads::default();

    // Use a separate RNG for move selection
    let mut policy_rng = SmallRng::seed_from_u64(args.seed.wrapping_add(1000));

    for episode in 0..episodes {
        let episode_seed = args.seed.wrapping_add(episode as u64);
        let mut game = fresh_game(args, episode_seed, config.clone());
        let mut layer = TileLayer::from_grid(game.grid());

        // The opponent only ever sees serialized snapshots.
        let mut last_sent = Snapshot::from_bytes(&game.serialise()?)?;
        let mut opponent = TileLayer::from_grid(&last_sent.grid);

        let mut steps = 0;
        let mut cycle = 0;

        while game.outcome() != Outcome::Lose && (args.max_steps == 0 || steps < args.max_steps) {
            let dir = match args.policy {
                Policy::Random => select_random_move(&game, &mut policy_rng),
                Policy::Cycle => select_cycle_move(&game, &mut cycle),
            };
            let Some(dir) = dir else {
                break; // No valid moves
            };

            let report = game.execute_move(dir);
            steps += 1;
            if !layer.sync(&report.animations, game.grid()) {
                reloads.local += 1;
            }

            let received = Snapshot::from_bytes(&game.serialise()?)?;
            match diff_snapshots(&last_sent.grid, &received.grid) {
                Some(events) if opponent.sync(&events, &received.grid) => {}
                _ => {
                    opponent.reload(&received.grid);
                    reloads.opponent += 1;
                }
            }
            last_sent = received;

            if args.verbose {
                println!("Episode {} Step {}: {:?}", episode + 1, steps, dir);
                print_board(&layer, &game)?;
            }
        }

        let score = game.score();
        let max_tile = game.grid().highest_tile();

        scores.push(score);
        max_tiles.push(max_tile);
        total_score += score as u64;
        max_tile_overall = max_tile_overall.max(max_tile);
        info!("episode {} finished after {} steps", episode + 1, steps);

        if args.verbose {
            println!(
                "Episode {}: Score={}, MaxTile={}, Steps={}",
                episode + 1,
                score,
                max_tile,
                steps
            );
        }
    }

    print_stats(args, episodes, total_score, scores, &max_tiles, max_tile_overall, &reloads);
    Ok(())
}

/// Replays that did not converge and had to reload from the grid.
#[derive(Debug, Default)]
struct Reloads {
    local: u32,
    opponent: u32,
}

fn print_stats(
    args: &Args,
    episodes: u32,
    total_score: u64,
    mut scores: Vec<u32>,
    max_tiles: &[u32],
    max_tile_overall: u32,
    reloads: &Reloads,
) {
    if episodes == 0 {
        println!("=== Simulation Results ===");
        println!("episodes=0");
        return;
    }

    // Compute statistics
    let avg_score = total_score as f64 / episodes as f64;
    scores.sort();
    let mid = scores.len() / 2;
    let median_score = if scores.len() % 2 == 0 {
        (scores[mid - 1] as f64 + scores[mid] as f64) / 2.0
    } else {
        scores[mid] as f64
    };

    // Count tile distribution
    let mut tile_counts = std::collections::BTreeMap::new();
    for tile in max_tiles {
        *tile_counts.entry(*tile).or_insert(0u32) += 1;
    }

    // Output results in parseable format
    println!("=== Simulation Results ===");
    println!("episodes={}", episodes);
    println!("policy={:?}", args.policy);
    println!("seed={}", args.seed);
    println!("max_steps={}", args.max_steps);
    println!("avg_score={:.2}", avg_score);
    println!("median_score={:.2}", median_score);
    println!("min_score={}", scores.first().unwrap_or(&0));
    println!("max_score={}", scores.last().unwrap_or(&0));
    println!("max_tile_overall={}", max_tile_overall);
    println!("local_reloads={}", reloads.local);
    println!("opponent_reloads={}", reloads.opponent);

    let distribution: Vec<String> = tile_counts
        .iter()
        .map(|(tile, count)| format!("{}:{}", tile, count))
        .collect();
    println!("tile_distribution={}", distribution.join(","));
}

/// Select a random valid move.
fn select_random_move(game: &Game, rng: &mut SmallRng) -> Option<Direction> {
    let legal = game.legal_moves();
    let valid: Vec<Direction> = Direction::all()
        .into_iter()
        .zip(legal)
        .filter(|&(_, ok)| ok)
        .map(|(dir, _)| dir)
        .collect();

    if valid.is_empty() {
        None
    } else {
        Some(valid[rng.gen_range(0..valid.len())])
    }
}

/// Select moves in a cycle: Left, Down, Right, Up.
fn select_cycle_move(game: &Game, cycle: &mut usize) -> Option<Direction> {
    let order = [
        Direction::Left,
        Direction::Down,
        Direction::Right,
        Direction::Up,
    ];
    let legal = game.legal_moves();

    // Try moves in cycle order, starting from current position
    for _ in 0..4 {
        let dir = order[*cycle % 4];
        *cycle += 1;
        if legal[dir as usize] {
            return Some(dir);
        }
    }

    None
}

enum InputAction {
    Move(Direction),
    Restart,
    Quit,
    None,
}

/// Read one keypress. End of input counts as quitting.
fn next_action(input: &mut impl Read) -> io::Result<InputAction> {
    let mut buffer = [0u8; 3];
    loop {
        match input.read(&mut buffer) {
            Ok(0) => return Ok(InputAction::Quit),
            Ok(n) => return Ok(parse_input(&buffer[..n])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
}

fn parse_input(bytes: &[u8]) -> InputAction {
    match bytes {
        // Arrow keys (escape sequences)
        [27, 91, 65] => InputAction::Move(Direction::Up),
        [27, 91, 66] => InputAction::Move(Direction::Down),
        [27, 91, 67] => InputAction::Move(Direction::Right),
        [27, 91, 68] => InputAction::Move(Direction::Left),

        // WASD keys
        [b'w'] | [b'W'] => InputAction::Move(Direction::Up),
        [b's'] | [b'S'] => InputAction::Move(Direction::Down),
        [b'a'] | [b'A'] => InputAction::Move(Direction::Left),
        [b'd'] | [b'D'] => InputAction::Move(Direction::Right),

        // Control keys
        [b'q'] | [b'Q'] | [3] | [27] => InputAction::Quit, // q, Q, Ctrl+C, Esc
        [b'r'] | [b'R'] => InputAction::Restart,

        _ => InputAction::None,
    }
}

fn redraw(game: &Game, layer: &TileLayer) -> io::Result<()> {
    println!("\x1b[2J\x1b[H"); // Clear screen
    println!("=== 2048 BATTLE ===");
    println!("Controls: WASD or Arrow Keys | Q to quit | R to restart\n");
    print_board(layer, game)
}

/// Print the rendered layer, which should always agree with the game grid.
fn print_board(layer: &TileLayer, game: &Game) -> io::Result<()> {
    let mut out = io::stdout().lock();
    let border = "+------".repeat(GRID_LEN) + "+";
    writeln!(out, "Score: {}  Best: {}", game.score(), game.high_score())?;
    writeln!(out, "{}", border)?;
    for row in layer.values() {
        write!(out, "|")?;
        for value in row {
            if value == 0 {
                write!(out, "      |")?;
            } else {
                write!(out, "{:^6}|", value)?;
            }
        }
        writeln!(out)?;
        writeln!(out, "{}", border)?;
    }
    out.flush()
}

// Platform-specific terminal raw mode handling
#[cfg(unix)]
fn enable_raw_mode() {
    use std::os::unix::io::AsRawFd;
    unsafe {
        let fd = io::stdin().as_raw_fd();
        let mut termios: libc::termios = std::mem::zeroed();
        libc::tcgetattr(fd, &mut termios);
        termios.c_lflag &= !(libc::ICANON | libc::ECHO);
        termios.c_cc[libc::VMIN] = 1;
        termios.c_cc[libc::VTIME] = 0;
        libc::tcsetattr(fd, libc::TCSANOW, &termios);
    }
}

#[cfg(unix)]
fn disable_raw_mode() {
    use std::os::unix::io::AsRawFd;
    unsafe {
        let fd = io::stdin().as_raw_fd();
        let mut termios: libc::termios = std::mem::zeroed();
        libc::tcgetattr(fd, &mut termios);
        termios.c_lflag |= libc::ICANON | libc::ECHO;
        libc::tcsetattr(fd, libc::TCSANOW, &termios);
    }
}

#[cfg(not(unix))]
fn enable_raw_mode() {
    // Without raw mode each key needs Enter
}

#[cfg(not(unix))]
fn disable_raw_mode() {}
