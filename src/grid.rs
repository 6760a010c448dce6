//! Bordered playfield: a flat 2D array of cells with a permanently-empty rim.

use crate::tile::{Cell, TileKind};
use rand::Rng;

/// Inert padding on each side; neighbour lookups from the playable field
/// never need a bounds check.
pub const BORDER: usize = 2;

/// Continuous board-space position as fed by the presentation layer.
/// (0.0, 0.0) is the centre of the bottom-left playable cell; cell indices
/// come out of [`Grid::pick`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Square playfield of `side × side` cells, row-major, row 0 at the bottom.
/// Dimensions are fixed for the life of the process; cells are created once
/// and mutated in place.
#[derive(Debug, Clone)]
pub struct Grid {
    side: usize,
    interior: usize,
    cells: Vec<Cell>,
}

impl Grid {
    /// Builds a grid with `interior × interior` random tiles inside the
    /// 2-cell border. Border cells start and stay empty.
    pub fn new(interior: usize, kinds: u8, rng: &mut impl Rng) -> Self {
        let side = interior + 2 * BORDER;
        let mut grid = Self {
            side,
            interior,
            cells: vec![Cell::EMPTY; side * side],
        };
        for x in BORDER..BORDER + interior {
            for y in BORDER..BORDER + interior {
                let kind = TileKind::from_index(rng.gen_range(0..kinds));
                *grid.cell_mut(x, y) = Cell::tile(kind);
            }
        }
        grid
    }

    pub fn side(&self) -> usize {
        self.side
    }

    pub fn interior(&self) -> usize {
        self.interior
    }

    /// First playable index (inclusive). The last one is `hi() - 1`.
    pub fn lo(&self) -> usize {
        BORDER
    }

    /// One past the last playable index.
    pub fn hi(&self) -> usize {
        BORDER + self.interior
    }

    /// Topmost playable row; refill spawns land here.
    pub fn top_row(&self) -> usize {
        self.hi() - 1
    }

    #[inline]
    fn index(&self, x: usize, y: usize) -> usize {
        assert!(
            x < self.side && y < self.side,
            "cell ({x}, {y}) outside {0}x{0} grid",
            self.side
        );
        y * self.side + x
    }

    /// Cell at `(x, y)`. Panics on out-of-bounds access: that is a core
    /// invariant break, not a user-input problem.
    #[inline]
    pub fn cell(&self, x: usize, y: usize) -> &Cell {
        &self.cells[self.index(x, y)]
    }

    #[inline]
    pub fn cell_mut(&mut self, x: usize, y: usize) -> &mut Cell {
        let idx = self.index(x, y);
        &mut self.cells[idx]
    }

    /// True iff `(x, y)` is inside the playable field (not border padding).
    pub fn is_playable(&self, x: usize, y: usize) -> bool {
        (self.lo()..self.hi()).contains(&x) && (self.lo()..self.hi()).contains(&y)
    }

    /// All playable coordinates in row-major order (bottom row first).
    pub fn interior_coords(&self) -> impl Iterator<Item = (usize, usize)> + use<> {
        let (lo, hi) = (self.lo(), self.hi());
        (lo..hi).flat_map(move |y| (lo..hi).map(move |x| (x, y)))
    }

    /// Pointer pick: continuous position to cell index via
    /// `floor(p + BORDER + 0.5)`. Positions snapping outside
    /// `[BORDER-1, BORDER+interior]` are ignored (silent no-op, not an
    /// error): gestures that start or end off the field just do nothing.
    pub fn pick(&self, p: Point) -> Option<(usize, usize)> {
        let offset = BORDER as f32 + 0.5;
        let cx = (p.x + offset).floor();
        let cy = (p.y + offset).floor();
        let lo = (BORDER - 1) as f32;
        let hi = (BORDER + self.interior) as f32;
        if cx < lo || cx > hi || cy < lo || cy > hi {
            return None;
        }
        Some((cx as usize, cy as usize))
    }

    /// True if any playable cell strictly below `(x, y)` in its column is
    /// empty; such a tile is in (or about to be in) free fall.
    pub fn has_empty_below(&self, x: usize, y: usize) -> bool {
        (self.lo()..y).any(|yy| self.cell(x, yy).is_empty())
    }
}
