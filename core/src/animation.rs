//! Reconstruction of per-tile animations from two grid snapshots.
//!
//! The move engine only hands back the settled grid. [`diff`] works out how
//! each tile got there by following identities between the `before` and
//! `after` snapshots. A merge destroys two identities at once, so which
//! tiles fed which merge is recovered from positional rules in
//! [`LinePattern`].

use std::collections::{HashMap, HashSet};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::grid::{Grid, Line, Pos, GRID_LEN};
use crate::tile::TileId;
use crate::Direction;

/// A single tile-level event. `P` is the coordinate type: a 1-D index for
/// a line, a [`Pos`] for the whole grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Animation<P = Pos> {
    /// A tile slid without merging.
    Move { origin: P, dest: P },
    /// A tile appeared with no prior counterpart.
    Spawn { dest: P, value: u32 },
    /// A tile slid into a merge and was consumed by it.
    MoveIntoCombine { origin: P, dest: P },
    /// The tile created by a merge.
    NewFromCombine { dest: P, value: u32 },
}

impl<P> Animation<P> {
    /// Convert the coordinates of this event.
    pub fn map<Q>(self, f: impl Fn(P) -> Q) -> Animation<Q> {
        match self {
            Animation::Move { origin, dest } => Animation::Move {
                origin: f(origin),
                dest: f(dest),
            },
            Animation::Spawn { dest, value } => Animation::Spawn {
                dest: f(dest),
                value,
            },
            Animation::MoveIntoCombine { origin, dest } => Animation::MoveIntoCombine {
                origin: f(origin),
                dest: f(dest),
            },
            Animation::NewFromCombine { dest, value } => Animation::NewFromCombine {
                dest: f(dest),
                value,
            },
        }
    }

    pub fn is_spawn(&self) -> bool {
        matches!(self, Animation::Spawn { .. })
    }
}

/// Work out the animations that take `before` to `after`, where `after` is
/// the result of one move in `dir`.
///
/// Move and combine events come first; spawns follow once the board has
/// consolidated.
pub fn diff(before: &Grid, after: &Grid, dir: Direction) -> Vec<Animation> {
    let mut events = Vec::new();
    for axis in 0..GRID_LEN {
        if dir.is_vertical() {
            let line = diff_line(&before.column(axis), &after.column(axis), dir);
            events.extend(line.into_iter().map(|e| e.map(|y| Pos::new(axis, y))));
        } else {
            let line = diff_line(&before.row(axis), &after.row(axis), dir);
            events.extend(line.into_iter().map(|e| e.map(|x| Pos::new(x, axis))));
        }
    }

    let (mut ordered, spawns): (Vec<_>, Vec<_>) = events.into_iter().partition(|e| !e.is_spawn());
    ordered.extend(spawns);
    ordered
}

/// Diff two snapshots using the move recorded in `after`.
///
/// Returns `None` if `after` has no recorded move, e.g. a freshly reset
/// grid; the renderer should reload from `after` instead.
pub fn diff_snapshots(before: &Grid, after: &Grid) -> Option<Vec<Animation>> {
    after.last_move().map(|dir| diff(before, after, dir))
}

/// Diff a single row or column. Indices run along the line.
pub fn diff_line(before: &Line, after: &Line, dir: Direction) -> Vec<Animation<usize>> {
    let origins: HashMap<TileId, usize> = before
        .iter()
        .enumerate()
        .filter(|(_, tile)| !tile.is_empty())
        .map(|(i, tile)| (tile.id, i))
        .collect();

    let mut events = Vec::new();
    for (x, tile) in after.iter().enumerate() {
        if tile.is_empty() {
            continue;
        }
        if let Some(&origin) = origins.get(&tile.id) {
            if origin != x {
                events.push(Animation::Move { origin, dest: x });
            }
        }
        if tile.combined {
            events.push(Animation::NewFromCombine {
                dest: x,
                value: tile.value,
            });
            events.extend(
                merge_origins(before, after, x, dir)
                    .into_iter()
                    .map(|origin| Animation::MoveIntoCombine { origin, dest: x }),
            );
        }
    }

    for (x, tile) in after.iter().enumerate() {
        if !tile.is_empty() && !tile.combined && !origins.contains_key(&tile.id) {
            events.push(Animation::Spawn {
                dest: x,
                value: tile.value,
            });
        }
    }
    events
}

/// Old indices of the consumed tiles that can have fed the merge at `dest`.
fn merge_origins(before: &Line, after: &Line, dest: usize, dir: Direction) -> Vec<usize> {
    let survivors: HashSet<TileId> = after.iter().map(|tile| tile.id).collect();
    let pattern = LinePattern::of(before);
    before
        .iter()
        .enumerate()
        .filter(|(_, tile)| !tile.is_empty() && !survivors.contains(&tile.id))
        .map(|(origin, _)| origin)
        .filter(|&origin| pattern.allows(origin, dest, dir))
        .collect()
}

/// Shape of a line before the move, as far as merge attribution cares.
///
/// With four cells, two merges in one line only happen when the line is
/// two equal pairs. Those are the lines where a consumed tile could be
/// matched to either merge, so each gets its own exclusions. The rules are
/// specific to a line of four.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinePattern {
    Plain,
    /// `x x x x`
    FourOfAKind,
    /// `x x y y` with `x != y`
    TwoPairs,
}

impl LinePattern {
    fn of(line: &Line) -> Self {
        let v = line.map(|tile| tile.value);
        if v.iter().all(|&value| value != 0 && value == v[0]) {
            LinePattern::FourOfAKind
        } else if v[0] != 0 && v[0] == v[1] && v[2] != 0 && v[2] == v[3] {
            LinePattern::TwoPairs
        } else {
            LinePattern::Plain
        }
    }

    /// Whether a consumed tile at `origin` can have merged into `dest`.
    fn allows(self, origin: usize, dest: usize, dir: Direction) -> bool {
        // Rules are written for Left/Up; mirror the indices for Right/Down.
        let (o, d) = if dir.is_reversed() {
            (GRID_LEN - 1 - origin, GRID_LEN - 1 - dest)
        } else {
            (origin, dest)
        };
        // A tile cannot combine into its own cell or travel backwards.
        if o <= d {
            return false;
        }
        match self {
            LinePattern::Plain => true,
            LinePattern::FourOfAKind => o - d <= 2 && (o, d) != (2, 0),
            LinePattern::TwoPairs => !matches!((o, d), (2, 0) | (3, 0)),
        }
    }
}

/// Renderer-side model of which value is shown in each cell.
///
/// Replaying a move's animations against the previous layer converges on
/// the new grid. If it does not, the layer is reloaded from the
/// authoritative grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileLayer {
    cells: [[u32; GRID_LEN]; GRID_LEN],
}

impl TileLayer {
    pub fn from_grid(grid: &Grid) -> Self {
        TileLayer {
            cells: grid.values(),
        }
    }

    /// Displayed values, indexed `[row][column]`.
    pub fn values(&self) -> [[u32; GRID_LEN]; GRID_LEN] {
        self.cells
    }

    pub fn reload(&mut self, grid: &Grid) {
        self.cells = grid.values();
    }

    /// True if the layer shows exactly the tiles of `grid`.
    pub fn matches(&self, grid: &Grid) -> bool {
        self.cells == grid.values()
    }

    /// Replay `animations` in two phases: moves and combines, then spawns.
    ///
    /// On error the layer is left untouched.
    pub fn apply(&mut self, animations: &[Animation]) -> Result<()> {
        let mut next = self.cells;

        // Phase 1: lift every moving tile, then drop it at its destination.
        let mut drops = Vec::new();
        for animation in animations {
            match *animation {
                Animation::Move { origin, dest } => {
                    let value = self.value_at(origin)?;
                    next[origin.y][origin.x] = 0;
                    drops.push((dest, value));
                }
                Animation::MoveIntoCombine { origin, .. } => {
                    self.value_at(origin)?;
                    next[origin.y][origin.x] = 0;
                }
                Animation::NewFromCombine { dest, value } => drops.push((dest, value)),
                Animation::Spawn { .. } => {}
            }
        }
        for (dest, value) in drops {
            next[dest.y][dest.x] = value;
        }

        // Phase 2
        for animation in animations {
            if let Animation::Spawn { dest, value } = *animation {
                if next[dest.y][dest.x] != 0 {
                    return Err(Error::OccupiedCell(dest));
                }
                next[dest.y][dest.x] = value;
            }
        }

        self.cells = next;
        Ok(())
    }

    /// Apply `animations` and check the result against `grid`, reloading
    /// from `grid` if they disagree. Returns whether the replay converged.
    pub fn sync(&mut self, animations: &[Animation], grid: &Grid) -> bool {
        match self.apply(animations) {
            Ok(()) if self.matches(grid) => true,
            Ok(()) => {
                warn!("animation replay diverged from grid; reloading");
                self.reload(grid);
                false
            }
            Err(e) => {
                warn!("animation replay failed ({}); reloading", e);
                self.reload(grid);
                false
            }
        }
    }

    fn value_at(&self, pos: Pos) -> Result<u32> {
        match self.cells[pos.y][pos.x] {
            0 => Err(Error::MissingTile(pos)),
            value => Ok(value),
        }
    }
}
