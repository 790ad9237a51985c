//! Grid state and the move engine.
//!
//! The grid is a square matrix of [`Tile`]s stored row-major, with `(0, 0)`
//! at the top left. Moves are applied one line at a time: the merge
//! primitive [`settle_row`] only works along a row, so vertical moves
//! transpose the matrix before and after each pass.

use std::collections::HashMap;
use std::fmt;

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tile::{Tile, TileId};
use crate::{Direction, Outcome};

/// Side length of the grid.
pub const GRID_LEN: usize = 4;

/// Tile value that wins the game under the default config.
pub const WIN_TILE: u32 = 2048;

/// A row or column of tiles.
pub type Line = [Tile; GRID_LEN];

/// The full tile matrix, indexed `[row][column]`.
pub type Tiles = [Line; GRID_LEN];

/// A cell coordinate: `x` is the column, `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub x: usize,
    pub y: usize,
}

impl Pos {
    /// A position at column `x`, row `y`.
    pub fn new(x: usize, y: usize) -> Self {
        Pos { x, y }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Outcome of a single settle pass over one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settle {
    /// Nothing could move; the row is unchanged.
    Stable,
    /// One tile slid into an empty neighbour.
    Slid,
    /// Two tiles merged, producing a tile of the given value.
    Merged(u32),
}

/// Result of applying a move to the grid.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MoveResult {
    /// Whether any tile slid or merged (and therefore a tile was spawned).
    pub moved: bool,
    /// Value of every merge, in the order the merges happened.
    pub merges: Vec<u32>,
}

impl MoveResult {
    /// Points awarded for the move: the value of the last merge.
    pub fn points(&self) -> u32 {
        self.merges.last().copied().unwrap_or(0)
    }
}

/// The game grid plus the direction of the last move made on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grid {
    tiles: Tiles,
    #[serde(default)]
    last_move: Option<Direction>,
}

impl Grid {
    /// A grid of empty tiles.
    pub fn empty() -> Self {
        Grid {
            tiles: fresh_tiles(),
            last_move: None,
        }
    }

    /// A start-of-game grid with two '2' tiles in random positions.
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut grid = Self::empty();
        grid.reset(rng);
        grid
    }

    /// Build a grid from raw values. Every cell gets a fresh identity.
    pub fn from_values(values: [[u32; GRID_LEN]; GRID_LEN]) -> Self {
        Grid {
            tiles: values.map(|row| row.map(Tile::new)),
            last_move: None,
        }
    }

    /// Build a grid from tiles, keeping their identities and flags.
    pub fn from_tiles(tiles: Tiles) -> Self {
        Grid {
            tiles,
            last_move: None,
        }
    }

    /// Reset to a start-of-game state, spawning two '2' tiles in random
    /// distinct positions.
    pub fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.tiles = fresh_tiles();
        self.last_move = None;

        let first = random_pos(rng);
        let mut second = random_pos(rng);
        while second == first {
            second = random_pos(rng);
        }
        self.tiles[first.y][first.x] = Tile::new(2);
        self.tiles[second.y][second.x] = Tile::new(2);
        debug!("grid reset with tiles at {} and {}", first, second);
    }

    /// Reset to a start-of-game state with tile positions derived from
    /// `seed`. Two grids reset with the same seed hold their tiles in the
    /// same cells.
    pub fn pseudo_random_reset(&mut self, seed: &str) {
        self.tiles = fresh_tiles();
        self.last_move = None;

        let hash = fnv1a_32(seed.as_bytes());
        // (row, column), two bits per axis
        let mut first = ((hash & 0b11) as usize, ((hash >> 2) & 0b11) as usize);
        let second = (((hash >> 4) & 0b11) as usize, ((hash >> 6) & 0b11) as usize);
        if first == second {
            first.0 = (first.0 + 1) & 0b11;
        }

        self.tiles[first.0][first.1] = Tile::new(2);
        self.tiles[second.0][second.1] = Tile::new(2);
        debug!("grid reset from seed {:?} (hash {:#010x})", seed, hash);
    }

    /// Clear the combined flag of every tile.
    ///
    /// Must be called after loading a persisted grid: a stale flag would
    /// block a legitimate merge on the first move after the load.
    pub fn clear_combined_flags(&mut self) {
        for tile in self.tiles.iter_mut().flatten() {
            tile.combined = false;
        }
    }

    /// All tiles, indexed `[row][column]`.
    pub fn tiles(&self) -> &Tiles {
        &self.tiles
    }

    /// The tile at `pos`.
    pub fn tile(&self, pos: Pos) -> &Tile {
        &self.tiles[pos.y][pos.x]
    }

    /// Row `y`, left to right.
    pub fn row(&self, y: usize) -> Line {
        self.tiles[y]
    }

    /// Column `x`, top to bottom.
    pub fn column(&self, x: usize) -> Line {
        std::array::from_fn(|y| self.tiles[y][x])
    }

    /// Tile values only, indexed `[row][column]`.
    pub fn values(&self) -> [[u32; GRID_LEN]; GRID_LEN] {
        self.tiles.map(|row| row.map(|tile| tile.value))
    }

    /// Direction of the last move applied, `None` after a reset.
    pub fn last_move(&self) -> Option<Direction> {
        self.last_move
    }

    /// Number of non-empty tiles.
    pub fn num_tiles(&self) -> usize {
        self.tiles.iter().flatten().filter(|t| !t.is_empty()).count()
    }

    /// Positions of every empty cell, in row-major order.
    pub fn empty_cells(&self) -> Vec<Pos> {
        let mut cells = Vec::new();
        for (y, row) in self.tiles.iter().enumerate() {
            for (x, tile) in row.iter().enumerate() {
                if tile.is_empty() {
                    cells.push(Pos::new(x, y));
                }
            }
        }
        cells
    }

    /// Largest tile value on the grid, 0 if empty.
    pub fn highest_tile(&self) -> u32 {
        self.tiles
            .iter()
            .flatten()
            .map(|t| t.value)
            .max()
            .unwrap_or(0)
    }

    /// True if the grid is gridlocked: no empty cell and no two
    /// neighbouring tiles of equal value.
    pub fn is_loss(&self) -> bool {
        if self.tiles.iter().flatten().any(Tile::is_empty) {
            return false;
        }
        !has_equal_neighbours(&self.tiles) && !has_equal_neighbours(&transpose(&self.tiles))
    }

    /// True if moving in `dir` would change the grid.
    pub fn can_move(&self, dir: Direction) -> bool {
        self.clone().slide(dir).moved
    }

    /// Current outcome, computed on demand.
    pub fn outcome(&self, win_threshold: u32) -> Outcome {
        if self.is_loss() {
            Outcome::Lose
        } else if self.highest_tile() >= win_threshold {
            Outcome::Win
        } else {
            Outcome::None
        }
    }

    /// Move every tile in `dir`, merging where possible, then spawn a new
    /// tile if anything moved.
    pub fn apply_move<R: Rng + ?Sized>(&mut self, dir: Direction, rng: &mut R) -> MoveResult {
        let result = self.slide(dir);
        if result.moved {
            self.spawn_tile(rng);
        }
        self.last_move = Some(dir);
        debug!(
            "moved {:?}: moved={} merges={:?}",
            dir, result.moved, result.merges
        );
        result
    }

    /// Check the invariants a grid from outside the engine must hold.
    pub fn validate(&self) -> Result<()> {
        let mut seen: HashMap<TileId, Pos> = HashMap::new();
        for (y, row) in self.tiles.iter().enumerate() {
            for (x, tile) in row.iter().enumerate() {
                let pos = Pos::new(x, y);
                if tile.is_empty() {
                    continue;
                }
                if tile.value < 2 || !tile.value.is_power_of_two() {
                    return Err(Error::InvalidValue {
                        pos,
                        value: tile.value,
                    });
                }
                if tile.combined && tile.value < 4 {
                    return Err(Error::InvalidCombined {
                        pos,
                        value: tile.value,
                    });
                }
                if let Some(&first) = seen.get(&tile.id) {
                    return Err(Error::DuplicateId {
                        id: tile.id,
                        first,
                        second: pos,
                    });
                }
                seen.insert(tile.id, pos);
            }
        }
        Ok(())
    }

    /// Slide and merge until the grid settles. Does not spawn.
    fn slide(&mut self, dir: Direction) -> MoveResult {
        self.clear_combined_flags();

        let mut result = MoveResult::default();
        loop {
            // settle_row only operates on rows
            if dir.is_vertical() {
                self.tiles = transpose(&self.tiles);
            }
            let mut moved_this_pass = false;
            for row in self.tiles.iter_mut() {
                match settle_row(row, dir) {
                    Settle::Stable => {}
                    Settle::Slid => moved_this_pass = true,
                    Settle::Merged(points) => {
                        moved_this_pass = true;
                        result.merges.push(points);
                    }
                }
            }
            if dir.is_vertical() {
                self.tiles = transpose(&self.tiles);
            }

            if !moved_this_pass {
                break;
            }
            result.moved = true;
        }
        result
    }

    /// Spawn a 2 (90%) or 4 (10%) in a uniformly random empty cell.
    fn spawn_tile<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let empty = self.empty_cells();
        // A move that changed the grid always leaves an empty cell.
        assert!(!empty.is_empty(), "no empty cell to spawn a tile into");

        let pos = empty[rng.gen_range(0..empty.len())];
        self.tiles[pos.y][pos.x] = Tile::new(new_tile_value(rng));
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let border = "+------".repeat(GRID_LEN) + "+";
        writeln!(f, "{}", border)?;
        for row in &self.tiles {
            write!(f, "|")?;
            for tile in row {
                if tile.is_empty() {
                    write!(f, "      |")?;
                } else {
                    write!(f, "{:^6}|", tile.value)?;
                }
            }
            writeln!(f)?;
            writeln!(f, "{}", border)?;
        }
        Ok(())
    }
}

/// Perform one step of a move along a single row.
///
/// Scans in the direction of travel and performs the first slide or merge
/// it finds, then returns. Call repeatedly until [`Settle::Stable`] to
/// complete the row. Tiles flagged `combined` never merge again, so a tile
/// takes part in at most one merge per move.
pub fn settle_row(row: &mut Line, dir: Direction) -> Settle {
    let reverse = dir.is_reversed();
    for i in scan_order(reverse) {
        let dest = if reverse {
            Some(i + 1).filter(|&d| d < GRID_LEN)
        } else {
            i.checked_sub(1)
        };
        let Some(dest) = dest else {
            continue;
        };

        let (src, dst) = (row[i], row[dest]);
        if src.is_empty() {
            continue;
        }

        if dst.value == src.value && !src.combined && !dst.combined {
            row[dest] = Tile::merged(dst.value + src.value);
            row[i] = Tile::empty();
            return Settle::Merged(row[dest].value);
        }
        if !dst.is_empty() {
            // blocked
            continue;
        }

        row[dest] = src;
        row[i] = Tile::empty();
        return Settle::Slid;
    }
    Settle::Stable
}

/// Swap rows and columns.
pub fn transpose(tiles: &Tiles) -> Tiles {
    let mut out = *tiles;
    for (y, row) in tiles.iter().enumerate() {
        for (x, tile) in row.iter().enumerate() {
            out[x][y] = *tile;
        }
    }
    out
}

/// 32-bit FNV-1a hash.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    bytes
        .iter()
        .fold(OFFSET_BASIS, |hash, &b| (hash ^ b as u32).wrapping_mul(PRIME))
}

fn scan_order(reverse: bool) -> impl Iterator<Item = usize> {
    (0..GRID_LEN).map(move |step| if reverse { GRID_LEN - 1 - step } else { step })
}

fn fresh_tiles() -> Tiles {
    std::array::from_fn(|_| std::array::from_fn(|_| Tile::empty()))
}

fn random_pos<R: Rng + ?Sized>(rng: &mut R) -> Pos {
    Pos::new(rng.gen_range(0..GRID_LEN), rng.gen_range(0..GRID_LEN))
}

fn new_tile_value<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    if rng.gen::<f32>() < 0.9 {
        2
    } else {
        4
    }
}

fn has_equal_neighbours(tiles: &Tiles) -> bool {
    tiles
        .iter()
        .any(|row| row.windows(2).any(|pair| pair[0].value == pair[1].value))
}
