use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File-backed persistence for serialized game state.
///
/// Owned by whoever owns the game; there is no global save location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Store { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the stored contents with `bytes`, creating the file if needed.
    pub fn save_bytes(&self, bytes: &[u8]) -> Result<()> {
        fs::write(&self.path, bytes)?;
        Ok(())
    }

    /// Read the stored contents. Fails with [`crate::Error::Io`] if nothing
    /// has been saved yet.
    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        Ok(fs::read(&self.path)?)
    }
}
