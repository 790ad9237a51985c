//! The game backend: a grid plus score, configuration and persistence.

use log::{debug, info, warn};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::animation::{diff, Animation};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::grid::Grid;
use crate::store::Store;
use crate::{Direction, Outcome};

/// Everything a front-end needs after a move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveReport {
    /// Whether the grid changed (and a new tile was spawned).
    pub moved: bool,
    /// Points earned by this move.
    pub points: u32,
    /// Per-tile events, moves and combines first, spawns last.
    pub animations: Vec<Animation>,
    pub outcome: Outcome,
}

/// Serialized game state, used for the save file and for sending a grid to
/// a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub grid: Grid,
    #[serde(rename = "currentScore")]
    pub score: u32,
    #[serde(default)]
    pub high_score: u32,
    #[serde(default)]
    pub outcome: Outcome,
}

impl Snapshot {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode and validate a snapshot.
    ///
    /// Combined flags are kept: they are what lets [`crate::diff_snapshots`]
    /// animate the move that produced this grid.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_slice(bytes)?;
        snapshot.grid.validate()?;
        Ok(snapshot)
    }
}

/// A single-player 2048 game.
///
/// Randomness comes from a seeded [`SmallRng`], so two games created with
/// the same seed and fed the same moves produce the same grids.
#[derive(Debug, Clone)]
pub struct Game {
    grid: Grid,
    score: u32,
    high_score: u32,
    config: Config,
    rng: SmallRng,
    store: Option<Store>,
}

impl Game {
    /// Create a new game with the default config.
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, Config::default())
    }

    pub fn with_config(seed: u64, config: Config) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let grid = Grid::new(&mut rng);
        Game {
            grid,
            score: 0,
            high_score: 0,
            config,
            rng,
            store: None,
        }
    }

    /// Attach a save file. Its contents replace the current state if it
    /// exists; otherwise it is created from the current state.
    pub fn with_store(mut self, store: Store) -> Result<Self> {
        self.store = Some(store);
        match self.load() {
            Ok(()) => {}
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                if let Some(store) = &self.store {
                    info!("no save file at {}, creating one", store.path().display());
                }
                self.save()?;
            }
            Err(e) => return Err(e),
        }
        Ok(self)
    }

    /// Make a move, score it, and work out its animations.
    ///
    /// The save file, if any, is rewritten after every move. A failed save
    /// is logged and does not undo the move.
    pub fn execute_move(&mut self, dir: Direction) -> MoveReport {
        let before = self.grid.clone();
        let result = self.grid.apply_move(dir, &mut self.rng);

        let points = self.config.score_rule.tally(&result.merges);
        self.score += points;
        self.high_score = self.high_score.max(self.score);

        let animations = diff(&before, &self.grid, dir);
        let outcome = self.outcome();
        if self.store.is_some() {
            if let Err(e) = self.save() {
                warn!("failed to save after move: {}", e);
            }
        }

        MoveReport {
            moved: result.moved,
            points,
            animations,
            outcome,
        }
    }

    /// Start over with two random tiles. The high score is kept.
    pub fn reset(&mut self) {
        self.grid.reset(&mut self.rng);
        self.score = 0;
    }

    /// Start over with tile positions derived from `key`, so that two peers
    /// using the same key start from the same grid.
    pub fn reset_with_key(&mut self, key: &str) {
        self.grid.pseudo_random_reset(key);
        self.score = 0;
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn high_score(&self) -> u32 {
        self.high_score
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> Option<&Store> {
        self.store.as_ref()
    }

    pub fn outcome(&self) -> Outcome {
        self.grid.outcome(self.config.win_threshold)
    }

    /// Which moves would change the grid, indexed like [`Direction::all`].
    pub fn legal_moves(&self) -> [bool; 4] {
        Direction::all().map(|dir| self.grid.can_move(dir))
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            grid: self.grid.clone(),
            score: self.score,
            high_score: self.high_score,
            outcome: self.outcome(),
        }
    }

    /// Serialize the current state to JSON.
    pub fn serialise(&self) -> Result<Vec<u8>> {
        self.snapshot().to_bytes()
    }

    /// Replace the current state with `snapshot`.
    ///
    /// Combined flags are cleared; a stale flag would block a legitimate
    /// merge on the next move.
    pub fn restore(&mut self, snapshot: Snapshot) {
        self.grid = snapshot.grid;
        self.grid.clear_combined_flags();
        self.score = snapshot.score;
        self.high_score = snapshot.high_score.max(snapshot.score);
        debug!("restored game with score {}", self.score);
    }

    pub fn deserialise(&mut self, bytes: &[u8]) -> Result<()> {
        self.restore(Snapshot::from_bytes(bytes)?);
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let store = self.store.as_ref().ok_or(Error::NoStore)?;
        store.save_bytes(&self.serialise()?)?;
        debug!("saved game to {}", store.path().display());
        Ok(())
    }

    /// Load the state from the save file.
    pub fn load(&mut self) -> Result<()> {
        let store = self.store.as_ref().ok_or(Error::NoStore)?;
        let bytes = store.read_bytes()?;
        info!("loading save from {}", store.path().display());
        self.deserialise(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{diff_snapshots, TileLayer};
    use crate::config::ScoreRule;
    use crate::grid::Pos;
    use crate::tile::Tile;

    fn game_with(values: [[u32; 4]; 4], config: Config) -> Game {
        let mut game = Game::with_config(0, config);
        game.restore(Snapshot {
            grid: Grid::from_values(values),
            score: 0,
            high_score: 0,
            outcome: Outcome::None,
        });
        game
    }

    /// Make the first move in `Direction::all()` order that changes the grid.
    fn first_real_move(game: &mut Game) -> MoveReport {
        for dir in Direction::all() {
            let report = game.execute_move(dir);
            if report.moved {
                return report;
            }
        }
        panic!("no legal move");
    }

    // -------------------------------------------------------------------------
    // Moves and scoring
    // -------------------------------------------------------------------------

    #[test]
    fn test_new_game() {
        let game = Game::new(42);
        assert_eq!(game.grid().num_tiles(), 2);
        assert_eq!(game.score(), 0);
        assert_eq!(game.high_score(), 0);
        assert_eq!(game.outcome(), Outcome::None);
        assert!(game.store().is_none());
    }

    #[test]
    fn test_same_seed_same_game() {
        let mut a = Game::new(12345);
        let mut b = Game::new(12345);
        assert_eq!(a.grid().values(), b.grid().values());
        for dir in Direction::all().into_iter().cycle().take(30) {
            let ra = a.execute_move(dir);
            let rb = b.execute_move(dir);
            assert_eq!(ra.moved, rb.moved);
            assert_eq!(a.grid().values(), b.grid().values());
            assert_eq!(a.score(), b.score());
        }
    }

    #[test]
    fn test_score_last_merge() {
        let mut game = game_with([[2, 2, 0, 0], [8, 8, 0, 0], [0; 4], [0; 4]], Config::default());
        let report = game.execute_move(Direction::Left);
        assert!(report.moved);
        assert_eq!(report.points, 16);
        assert_eq!(game.score(), 16);
        assert_eq!(game.high_score(), 16);
    }

    #[test]
    fn test_score_sum_rule() {
        let config = Config {
            score_rule: ScoreRule::Sum,
            ..Config::default()
        };
        let mut game = game_with([[2, 2, 0, 0], [8, 8, 0, 0], [0; 4], [0; 4]], config);
        let report = game.execute_move(Direction::Left);
        assert_eq!(report.points, 20);
        assert_eq!(game.score(), 20);
    }

    #[test]
    fn test_noop_move_reports_nothing() {
        let mut game = game_with([[2, 4, 0, 0], [0; 4], [0; 4], [0; 4]], Config::default());
        let report = game.execute_move(Direction::Left);
        assert!(!report.moved);
        assert_eq!(report.points, 0);
        assert!(report.animations.is_empty());
    }

    #[test]
    fn test_report_animations_replay() {
        let mut game = Game::new(3);
        let mut layer = TileLayer::from_grid(game.grid());
        for dir in Direction::all().into_iter().cycle().take(60) {
            let report = game.execute_move(dir);
            assert!(layer.sync(&report.animations, game.grid()));
        }
    }

    #[test]
    fn test_legal_moves() {
        let game = game_with([[0, 0, 0, 2], [0; 4], [0; 4], [0, 0, 0, 4]], Config::default());
        // [Up, Down, Left, Right]
        assert_eq!(game.legal_moves(), [true, true, true, false]);
    }

    #[test]
    fn test_win_threshold_from_config() {
        let config = Config {
            win_threshold: 16,
            ..Config::default()
        };
        let mut game = game_with([[8, 8, 0, 0], [0; 4], [0; 4], [0; 4]], config);
        let report = game.execute_move(Direction::Left);
        assert_eq!(report.outcome, Outcome::Win);
        assert_eq!(game.outcome(), Outcome::Win);
    }

    #[test]
    fn test_loss_reported() {
        let mut game = game_with(
            [
                [0, 8, 16, 32],
                [32, 64, 128, 64],
                [64, 128, 256, 512],
                [128, 256, 512, 1024],
            ],
            Config::default(),
        );
        assert_eq!(game.outcome(), Outcome::None);

        // the spawn fills the last cell next to 32 and 64, so 2 or 4 locks it
        let report = game.execute_move(Direction::Left);
        assert!(report.moved);
        assert_eq!(report.outcome, Outcome::Lose);
        assert!(game.grid().tile(Pos::new(3, 0)).value <= 4);
    }

    // -------------------------------------------------------------------------
    // Reset
    // -------------------------------------------------------------------------

    #[test]
    fn test_reset_keeps_high_score() {
        let mut game = game_with([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]], Config::default());
        game.execute_move(Direction::Left);
        assert_eq!(game.score(), 4);

        game.reset();
        assert_eq!(game.score(), 0);
        assert_eq!(game.high_score(), 4);
        assert_eq!(game.grid().num_tiles(), 2);
        assert_eq!(game.grid().last_move(), None);
    }

    #[test]
    fn test_reset_with_key_matches_peer() {
        let mut a = Game::new(1);
        let mut b = Game::new(2);
        a.reset_with_key("lobby-7");
        b.reset_with_key("lobby-7");
        assert_eq!(a.grid().values(), b.grid().values());
        assert_eq!(a.score(), 0);
    }

    // -------------------------------------------------------------------------
    // Snapshots and persistence
    // -------------------------------------------------------------------------

    #[test]
    fn test_snapshot_json_layout() {
        let game = Game::new(9);
        let json: serde_json::Value = serde_json::from_slice(&game.serialise().unwrap()).unwrap();
        assert!(json.get("grid").is_some());
        assert_eq!(json["currentScore"], 0);
        assert_eq!(json["highScore"], 0);
        assert_eq!(json["outcome"], "none");
    }

    #[test]
    fn test_snapshot_keeps_combined_restore_clears() {
        let mut grid = Grid::from_values([[0; 4]; 4]);
        let mut tiles = *grid.tiles();
        tiles[0][0] = Tile::merged(4);
        grid = Grid::from_tiles(tiles);
        let snapshot = Snapshot {
            grid,
            score: 4,
            high_score: 4,
            outcome: Outcome::None,
        };

        let decoded = Snapshot::from_bytes(&snapshot.to_bytes().unwrap()).unwrap();
        assert!(decoded.grid.tile(Pos::new(0, 0)).combined);

        let mut game = Game::new(0);
        game.restore(decoded);
        assert!(!game.grid().tile(Pos::new(0, 0)).combined);
        assert_eq!(game.score(), 4);
    }

    #[test]
    fn test_snapshot_rejects_corrupt_grid() {
        let snapshot = Snapshot {
            grid: Grid::from_values([[6, 0, 0, 0], [0; 4], [0; 4], [0; 4]]),
            score: 0,
            high_score: 0,
            outcome: Outcome::None,
        };
        let bytes = snapshot.to_bytes().unwrap();
        assert!(matches!(
            Snapshot::from_bytes(&bytes),
            Err(Error::InvalidValue { value: 6, .. })
        ));
        assert!(matches!(Snapshot::from_bytes(b"[]"), Err(Error::Json(_))));
    }

    #[test]
    fn test_peer_mirror_through_snapshots() {
        let mut game = Game::new(77);
        // ten moves leave at most twelve tiles, so a move is always possible
        for _ in 0..10 {
            let before = Snapshot::from_bytes(&game.serialise().unwrap()).unwrap();
            let report = first_real_move(&mut game);
            let after = Snapshot::from_bytes(&game.serialise().unwrap()).unwrap();

            let events = diff_snapshots(&before.grid, &after.grid).unwrap();
            assert_eq!(events, report.animations);

            let mut layer = TileLayer::from_grid(&before.grid);
            assert!(layer.sync(&events, &after.grid));
        }
    }

    #[test]
    fn test_save_without_store() {
        let mut game = Game::new(0);
        assert!(matches!(game.save(), Err(Error::NoStore)));
        assert!(matches!(game.load(), Err(Error::NoStore)));
    }

    #[test]
    fn test_with_store_creates_then_loads() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("save.json");

        let mut game = Game::new(5).with_store(Store::new(&path)).unwrap();
        assert!(path.exists());
        for dir in Direction::all().into_iter().cycle().take(12) {
            game.execute_move(dir);
        }

        let loaded = Game::new(6).with_store(Store::new(&path)).unwrap();
        assert_eq!(loaded.grid().values(), game.grid().values());
        assert_eq!(loaded.score(), game.score());
        assert_eq!(loaded.high_score(), game.high_score());
        assert!(loaded.grid().tiles().iter().flatten().all(|t| !t.combined));
    }

    #[test]
    fn test_failed_save_keeps_move() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("save.json");
        let mut game = Game::new(4).with_store(Store::new(&path)).unwrap();
        game.restore(Snapshot {
            grid: Grid::from_values([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]),
            score: 10,
            high_score: 10,
            outcome: Outcome::None,
        });

        // the save directory disappears under the game
        tmp.close().unwrap();
        let report = game.execute_move(Direction::Left);
        assert!(report.moved);
        assert_eq!(report.points, 4);
        assert!(!report.animations.is_empty());
        assert_eq!(game.score(), 14);
        assert!(game.save().is_err());
    }

    #[test]
    fn test_with_store_rejects_corrupt_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("save.json"));
        store.save_bytes(b"{\"grid\":").unwrap();
        assert!(matches!(
            Game::new(0).with_store(store),
            Err(Error::Json(_))
        ));
    }
}
