use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::grid::WIN_TILE;

/// How the points of a move are derived from its merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScoreRule {
    /// Value of the last merge in the move. Compatible with existing peers.
    #[default]
    LastMerge,
    /// Sum of every merge in the move.
    Sum,
}

impl ScoreRule {
    /// Points for a move whose merges produced `merges`, in order.
    pub fn tally(self, merges: &[u32]) -> u32 {
        match self {
            ScoreRule::LastMerge => merges.last().copied().unwrap_or(0),
            ScoreRule::Sum => merges.iter().sum(),
        }
    }
}

/// Game configuration. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Highest tile value that counts as a win.
    pub win_threshold: u32,
    pub score_rule: ScoreRule,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            win_threshold: WIN_TILE,
            score_rule: ScoreRule::default(),
        }
    }
}

impl Config {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
