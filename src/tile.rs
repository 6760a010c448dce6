//! Tile identity: the kind registry and the per-cell lifecycle state.

/// Scale floor: once a shrinking tile dips below this it snaps to exactly
/// zero and the cell empties in the same step.
pub const SHRINK_SNAP: f32 = 0.035;

/// Token kinds (the eight board gems).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileKind {
    Heart,
    Star,
    Square,
    Cross,
    Triangle,
    Diamond,
    Orb,
    Flower,
}

impl TileKind {
    pub const ALL: [Self; 8] = [
        Self::Heart,
        Self::Star,
        Self::Square,
        Self::Cross,
        Self::Triangle,
        Self::Diamond,
        Self::Orb,
        Self::Flower,
    ];

    /// Kind for a spawn roll. `index` wraps so any `u8` is valid.
    pub fn from_index(index: u8) -> Self {
        Self::ALL[(index as usize) % Self::ALL.len()]
    }

    /// In-plane spinner (the star twinkles as it turns).
    pub fn spins(&self) -> bool {
        matches!(self, Self::Star)
    }

    /// Turns about the vertical axis; drawn as a narrow/wide flip.
    pub fn rotates(&self) -> bool {
        matches!(self, Self::Diamond)
    }

    /// Scale oscillates around rest. Visual only; never reaches zero.
    pub fn pulses(&self) -> bool {
        matches!(self, Self::Heart)
    }

    /// Board glyph at full scale.
    pub fn glyph(&self) -> &'static str {
        match self {
            Self::Heart => "♥",
            Self::Star => "★",
            Self::Square => "■",
            Self::Cross => "✚",
            Self::Triangle => "▲",
            Self::Diamond => "◆",
            Self::Orb => "●",
            Self::Flower => "❀",
        }
    }

    /// Colour index 0..8 for theme.tile_color().
    pub fn color_index(&self) -> u8 {
        match self {
            Self::Heart => 2,    // red
            Self::Star => 1,     // yellow
            Self::Square => 3,   // blue
            Self::Cross => 0,    // green
            Self::Triangle => 6, // orange
            Self::Diamond => 5,  // cyan
            Self::Orb => 7,      // white-ish
            Self::Flower => 4,   // magenta
        }
    }
}

/// Lifecycle of one grid slot. `Empty` is terminal until refill copies a
/// neighbouring tile's identity in or spawns a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellState {
    #[default]
    Empty,
    Stable,
    /// Some slot below in the column is empty; excluded from match seeding.
    Falling,
    /// Matched; scale animates to zero, then the cell empties.
    Shrinking,
}

/// One grid slot. Invariant: `kind == None ⟺ state == Empty ⟺ scale == 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    kind: Option<TileKind>,
    state: CellState,
    /// 1.0 for a whole tile, exactly 0.0 when empty.
    pub scale: f32,
    /// Feather-fall accumulation, in rows below the home row.
    pub fall_offset: f32,
    /// Spin angle, radians. Visual only.
    pub angle: f32,
    /// Pulse phase in [0, 1). Visual only.
    pub pulse: f32,
}

impl Cell {
    pub const EMPTY: Self = Self {
        kind: None,
        state: CellState::Empty,
        scale: 0.0,
        fall_offset: 0.0,
        angle: 0.0,
        pulse: 0.0,
    };

    /// Fresh tile with default animation state at its home slot.
    pub fn tile(kind: TileKind) -> Self {
        Self {
            kind: Some(kind),
            state: CellState::Stable,
            scale: 1.0,
            fall_offset: 0.0,
            angle: 0.0,
            pulse: 0.0,
        }
    }

    #[inline]
    pub fn kind(&self) -> Option<TileKind> {
        self.kind
    }

    #[allow(dead_code)]
    #[inline]
    pub fn state(&self) -> CellState {
        self.state
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.kind.is_none()
    }

    #[inline]
    pub fn is_falling(&self) -> bool {
        self.state == CellState::Falling
    }

    #[inline]
    pub fn is_shrinking(&self) -> bool {
        self.state == CellState::Shrinking
    }

    /// Empties the slot atomically (kind, state and scale together).
    pub fn clear(&mut self) {
        *self = Self::EMPTY;
    }

    /// Flags a matched tile for the cascade. Returns true when the mark is
    /// new; re-marking (a cell in both a row and a column run) is a no-op.
    pub fn mark_shrinking(&mut self) -> bool {
        if self.kind.is_none() || self.state == CellState::Shrinking {
            return false;
        }
        self.state = CellState::Shrinking;
        true
    }

    /// Recomputed every tick: only toggles between Stable and Falling.
    /// Empty and Shrinking cells keep their state.
    pub fn set_falling(&mut self, falling: bool) {
        self.state = match (self.state, falling) {
            (CellState::Stable, true) => CellState::Falling,
            (CellState::Falling, false) => CellState::Stable,
            (s, _) => s,
        };
    }

    /// One cascade step: lose `step` of scale; below the snap floor the tile
    /// vanishes and the cell empties. Returns true on the vanishing step.
    pub fn shrink_tick(&mut self, step: f32) -> bool {
        if self.state != CellState::Shrinking {
            return false;
        }
        self.scale -= step;
        if self.scale < SHRINK_SNAP {
            self.clear();
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shrink_reaches_exact_zero() {
        let mut cell = Cell::tile(TileKind::Star);
        cell.mark_shrinking();
        let mut steps = 0;
        while !cell.shrink_tick(0.03) {
            steps += 1;
            assert!(steps < 100, "shrink must terminate");
            assert!(cell.scale >= 0.0, "scale never goes negative");
        }
        assert_eq!(cell.scale, 0.0);
        assert_eq!(cell.kind(), None);
        assert_eq!(cell.state(), CellState::Empty);
    }

    #[test]
    fn test_mark_shrinking_idempotent() {
        let mut cell = Cell::tile(TileKind::Heart);
        assert!(cell.mark_shrinking());
        assert!(!cell.mark_shrinking());
        assert_eq!(cell.state(), CellState::Shrinking);
    }

    #[test]
    fn test_empty_cell_cannot_shrink_or_fall() {
        let mut cell = Cell::EMPTY;
        assert!(!cell.mark_shrinking());
        cell.set_falling(true);
        assert_eq!(cell.state(), CellState::Empty);
        assert!(!cell.shrink_tick(0.03));
    }

    #[test]
    fn test_falling_toggle_preserves_shrinking() {
        let mut cell = Cell::tile(TileKind::Orb);
        cell.set_falling(true);
        assert!(cell.is_falling());
        cell.set_falling(false);
        assert_eq!(cell.state(), CellState::Stable);
        cell.mark_shrinking();
        cell.set_falling(true);
        assert!(cell.is_shrinking());
    }

    #[test]
    fn test_kind_registry_tags() {
        assert!(TileKind::Star.spins());
        assert!(TileKind::Diamond.rotates());
        assert!(TileKind::Heart.pulses());
        let tagged = TileKind::ALL
            .iter()
            .filter(|k| k.spins() || k.rotates() || k.pulses())
            .count();
        assert_eq!(tagged, 3);
        assert_eq!(TileKind::from_index(9), TileKind::Star);
    }
}
