use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identity of a tile across snapshots.
///
/// Assigned once when a tile comes into existence and carried along as it
/// slides. A merge result is a new tile and gets a new identity. Must not
/// collide with identities loaded from a save written by another process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileId(u64);

impl TileId {
    /// Generate a fresh identity.
    pub fn new() -> Self {
        TileId(rand::random())
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A single cell of the grid.
///
/// A `value` of 0 is an empty cell. `combined` marks a tile produced by a
/// merge during the current move and blocks it from merging again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub value: u32,
    #[serde(default)]
    pub combined: bool,
    pub id: TileId,
}

impl Tile {
    /// An empty cell with its own identity.
    pub fn empty() -> Self {
        Self::new(0)
    }

    /// A fresh, uncombined tile.
    pub fn new(value: u32) -> Self {
        Tile {
            value,
            combined: false,
            id: TileId::new(),
        }
    }

    /// The tile created by a merge.
    pub fn merged(value: u32) -> Self {
        Tile {
            value,
            combined: true,
            id: TileId::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value == 0
    }
}

impl Default for Tile {
    fn default() -> Self {
        Self::empty()
    }
}
