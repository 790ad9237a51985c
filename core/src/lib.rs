//! # Battle 2048 Core Engine
//!
//! The grid simulation behind a two-player 2048: the move engine, stable
//! tile identities, and an animation-diff engine that reconstructs per-tile
//! events from two grid snapshots so a renderer can animate either its own
//! moves or a peer's mirrored grid.
//!
//! ## Example
//!
//! ```rust
//! use battle_2048_core::{Direction, Game};
//!
//! let mut game = Game::new(42); // seeded, reproducible
//! let report = game.execute_move(Direction::Left);
//! println!("Score: {}, Moved: {}", game.score(), report.moved);
//! assert!(report.animations.len() <= 16 * 3);
//! ```

use serde::{Deserialize, Serialize};

pub mod animation;
pub mod config;
pub mod error;
pub mod game;
pub mod grid;
pub mod store;
pub mod tile;

pub use animation::{diff, diff_snapshots, Animation, TileLayer};
pub use config::{Config, ScoreRule};
pub use error::{Error, Result};
pub use game::{Game, MoveReport, Snapshot};
pub use grid::{Grid, Pos, GRID_LEN, WIN_TILE};
pub use store::Store;
pub use tile::{Tile, TileId};

/// The four possible move directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Direction {
    Up = 0,
    Down = 1,
    Left = 2,
    Right = 3,
}

impl Direction {
    /// Convert a u8 to a Direction (0=Up, 1=Down, 2=Left, 3=Right).
    /// Returns None for invalid values.
    pub fn from_u8(value: u8) -> Option<Direction> {
        match value {
            0 => Some(Direction::Up),
            1 => Some(Direction::Down),
            2 => Some(Direction::Left),
            3 => Some(Direction::Right),
            _ => None,
        }
    }

    /// Get all four directions.
    pub fn all() -> [Direction; 4] {
        [
            Direction::Up,
            Direction::Down,
            Direction::Left,
            Direction::Right,
        ]
    }

    /// True for moves along a column.
    pub fn is_vertical(self) -> bool {
        matches!(self, Direction::Up | Direction::Down)
    }

    /// True for moves towards the high end of a line (Right, Down).
    pub fn is_reversed(self) -> bool {
        matches!(self, Direction::Right | Direction::Down)
    }
}

/// State of a game, derived from the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    #[default]
    None,
    Win,
    Lose,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_from_u8() {
        assert_eq!(Direction::from_u8(0), Some(Direction::Up));
        assert_eq!(Direction::from_u8(1), Some(Direction::Down));
        assert_eq!(Direction::from_u8(2), Some(Direction::Left));
        assert_eq!(Direction::from_u8(3), Some(Direction::Right));
        assert_eq!(Direction::from_u8(4), None);
        assert_eq!(Direction::from_u8(255), None);
    }

    #[test]
    fn test_direction_all() {
        let all = Direction::all();
        assert_eq!(all.len(), 4);
        for (i, dir) in all.into_iter().enumerate() {
            assert_eq!(dir as u8, i as u8);
        }
    }

    #[test]
    fn test_direction_axes() {
        assert!(Direction::Up.is_vertical());
        assert!(Direction::Down.is_vertical());
        assert!(!Direction::Left.is_vertical());
        assert!(Direction::Right.is_reversed());
        assert!(Direction::Down.is_reversed());
        assert!(!Direction::Up.is_reversed());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Direction::Left).unwrap(), r#""left""#);
        assert_eq!(serde_json::to_string(&Outcome::Lose).unwrap(), r#""lose""#);
        let dir: Direction = serde_json::from_str(r#""down""#).unwrap();
        assert_eq!(dir, Direction::Down);
    }
}
