use thiserror::Error;

use crate::grid::Pos;
use crate::tile::TileId;

/// Errors produced while loading, saving or replaying game state.
#[derive(Debug, Error)]
pub enum Error {
    /// The save file could not be read or written.
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// A snapshot or config could not be (de)serialized.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A tile holds a value that is neither empty nor a power of two.
    #[error("tile at {pos} holds invalid value {value}")]
    InvalidValue { pos: Pos, value: u32 },
    /// A tile is flagged as a merge result but its value cannot be one.
    #[error("tile at {pos} is flagged combined but holds {value}")]
    InvalidCombined { pos: Pos, value: u32 },
    /// Two non-empty tiles carry the same identity.
    #[error("tiles at {first} and {second} share identity {id}")]
    DuplicateId { id: TileId, first: Pos, second: Pos },
    /// An animation references a cell the rendered layer has no tile in.
    #[error("no rendered tile at {0}")]
    MissingTile(Pos),
    /// An animation tried to place a tile on an occupied rendered cell.
    #[error("rendered cell {0} is already occupied")]
    OccupiedCell(Pos),
    /// Persistence was requested on a game without a store.
    #[error("game has no store attached")]
    NoStore,
}

pub type Result<T> = std::result::Result<T, Error>;
