//! # 2048 Battle WebAssembly Bindings
//!
//! This crate provides JavaScript-friendly bindings to the battle engine
//! using wasm-bindgen. It wraps the core engine and exposes a class-like API
//! plus the animation events a renderer needs for both its own grid and an
//! opponent's mirrored one.

use battle_2048_core::{diff_snapshots, Animation, Direction, Game, Outcome, Snapshot};
use serde::Serialize;
use wasm_bindgen::prelude::*;

/// Result of a step operation, serialized for JavaScript.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsStepResult {
    /// The updated board state (16 elements, row-major order).
    pub board: Vec<u32>,
    /// Current total score.
    pub score: u32,
    /// Points earned from this move.
    pub points: u32,
    /// Whether the board changed.
    pub moved: bool,
    pub outcome: Outcome,
    /// Tile events in playback order: moves and combines, then spawns.
    pub animations: Vec<Animation>,
}

/// WebAssembly wrapper for the 2048 battle game.
#[wasm_bindgen]
pub struct WasmGame {
    game: Game,
}

#[wasm_bindgen]
impl WasmGame {
    /// Create a new game with the given seed.
    ///
    /// The seed is a 64-bit integer used to initialize the deterministic RNG.
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u64) -> WasmGame {
        WasmGame {
            game: Game::new(seed),
        }
    }

    /// Start over with two random tiles.
    pub fn reset(&mut self) {
        self.game.reset();
    }

    /// Start over from the grid every player with `key` shares.
    #[wasm_bindgen(js_name = resetWithKey)]
    pub fn reset_with_key(&mut self, key: &str) {
        self.game.reset_with_key(key);
    }

    /// Execute a move in the given direction.
    ///
    /// Direction values:
    /// - 0 = Up
    /// - 1 = Down
    /// - 2 = Left
    /// - 3 = Right
    ///
    /// Returns an object with `board`, `score`, `points`, `moved`, `outcome`
    /// and `animations`. An invalid direction returns the current state
    /// with `moved = false`.
    pub fn step(&mut self, action: u8) -> Result<JsValue, JsError> {
        let Some(dir) = Direction::from_u8(action) else {
            return self.js_result(false, 0, Vec::new());
        };
        let report = self.game.execute_move(dir);
        self.js_result(report.moved, report.points, report.animations)
    }

    /// Get the current board state as a JavaScript Uint32Array.
    #[wasm_bindgen(js_name = getBoard)]
    pub fn get_board(&self) -> Vec<u32> {
        self.board()
    }

    /// Get the current score.
    #[wasm_bindgen(js_name = getScore)]
    pub fn get_score(&self) -> u32 {
        self.game.score()
    }

    #[wasm_bindgen(js_name = getHighScore)]
    pub fn get_high_score(&self) -> u32 {
        self.game.high_score()
    }

    /// "none", "win" or "lose".
    #[wasm_bindgen(js_name = getOutcome)]
    pub fn get_outcome(&self) -> Result<JsValue, JsError> {
        Ok(serde_wasm_bindgen::to_value(&self.game.outcome())?)
    }

    /// Serialized state, suitable for saving or sending to a peer.
    pub fn snapshot(&self) -> Result<Vec<u8>, JsError> {
        Ok(self.game.serialise()?)
    }

    /// Replace the current state with a serialized snapshot.
    #[wasm_bindgen(js_name = loadSnapshot)]
    pub fn load_snapshot(&mut self, bytes: &[u8]) -> Result<(), JsError> {
        Ok(self.game.deserialise(bytes)?)
    }

    fn board(&self) -> Vec<u32> {
        self.game.grid().values().into_iter().flatten().collect()
    }

    fn js_result(
        &self,
        moved: bool,
        points: u32,
        animations: Vec<Animation>,
    ) -> Result<JsValue, JsError> {
        let js_result = JsStepResult {
            board: self.board(),
            score: self.game.score(),
            points,
            moved,
            outcome: self.game.outcome(),
            animations,
        };
        Ok(serde_wasm_bindgen::to_value(&js_result)?)
    }
}

/// Animation events that take an opponent's grid from `before` to `after`,
/// both serialized snapshots.
///
/// Returns `undefined` when `after` records no move; the renderer should redraw
/// from `after` instead.
#[wasm_bindgen(js_name = diffSnapshots)]
pub fn diff_snapshot_bytes(before: &[u8], after: &[u8]) -> Result<JsValue, JsError> {
    let before = Snapshot::from_bytes(before)?;
    let after = Snapshot::from_bytes(after)?;
    Ok(serde_wasm_bindgen::to_value(&diff_snapshots(
        &before.grid,
        &after.grid,
    ))?)
}
