//! Key bindings and the pointer gesture resolver.

use crate::grid::{Grid, Point};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Held while clicking to detonate the under-pointer tile.
pub const BOMB_KEY: char = 'b';

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Pause,
    Quit,
    Confirm,
    Up,
    Down,
    None,
}

/// Map key event to an app action. The board itself is mouse-driven; keys
/// only drive menus, pause and the bomb modifier (tracked separately by
/// press/release, not as an action).
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent { code, modifiers, .. } = key;
    let no_mod = modifiers.is_empty() || modifiers == KeyModifiers::SHIFT;
    if !no_mod && modifiers != KeyModifiers::CONTROL {
        return Action::None;
    }
    match code {
        KeyCode::Char('q') | KeyCode::Esc if no_mod => Action::Quit,
        KeyCode::Char('p') if no_mod => Action::Pause,
        KeyCode::Enter | KeyCode::Char(' ') if no_mod => Action::Confirm,
        KeyCode::Up | KeyCode::Char('k') if no_mod => Action::Up,
        KeyCode::Down | KeyCode::Char('j') if no_mod => Action::Down,
        _ => Action::None,
    }
}

/// One tick's worth of normalized pointer/key input, in board space.
/// The presentation layer fills this once per tick; the core never sees raw
/// terminal events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickInput {
    pub pressed: Option<Point>,
    pub moved: Option<Point>,
    pub released: Option<Point>,
    pub bomb_held: bool,
}

/// A validated swap intent between two edge-adjacent cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapRequest {
    pub a: (usize, usize),
    pub b: (usize, usize),
}

/// Edge adjacency: exactly one step along exactly one axis.
pub fn is_legal_swap(a: (usize, usize), b: (usize, usize)) -> bool {
    let dx = a.0.abs_diff(b.0);
    let dy = a.1.abs_diff(b.1);
    (dx == 1 && dy == 0) || (dx == 0 && dy == 1)
}

/// Tracks a press across ticks and turns the matching release into a swap
/// request. Everything that doesn't form a legal adjacent gesture is
/// silently dropped.
#[derive(Debug, Default)]
pub struct GestureTracker {
    down: Option<(usize, usize)>,
}

impl GestureTracker {
    /// Pointer-down: remember the picked cell (if any).
    pub fn press(&mut self, grid: &Grid, p: Point) -> Option<(usize, usize)> {
        self.down = grid.pick(p);
        self.down
    }

    /// Pointer-up: resolve against the remembered press. The press is
    /// consumed either way; a non-adjacent or off-field release is a no-op.
    pub fn release(&mut self, grid: &Grid, p: Point) -> Option<SwapRequest> {
        let a = self.down.take()?;
        let b = grid.pick(p)?;
        is_legal_swap(a, b).then_some(SwapRequest { a, b })
    }

    pub fn cancel(&mut self) {
        self.down = None;
    }

    /// Cell of the live press, if one is held.
    #[allow(dead_code)]
    pub fn down(&self) -> Option<(usize, usize)> {
        self.down
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_legal_swap_is_manhattan_distance_one() {
        for ax in 0usize..6 {
            for ay in 0usize..6 {
                for bx in 0usize..6 {
                    for by in 0usize..6 {
                        let dist = ax.abs_diff(bx) + ay.abs_diff(by);
                        assert_eq!(
                            is_legal_swap((ax, ay), (bx, by)),
                            dist == 1,
                            "({ax},{ay}) vs ({bx},{by})"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_diagonal_and_distant_gestures_dropped() {
        let grid = Grid::new(10, 8, &mut StdRng::seed_from_u64(1));
        let mut g = GestureTracker::default();
        // Diagonal release: discarded, press consumed.
        g.press(&grid, Point::new(3.0, 3.0));
        assert!(g.release(&grid, Point::new(4.0, 4.0)).is_none());
        assert!(g.down().is_none());
        // Two cells away: discarded.
        g.press(&grid, Point::new(3.0, 3.0));
        assert!(g.release(&grid, Point::new(5.0, 3.0)).is_none());
    }

    #[test]
    fn test_adjacent_gesture_resolves() {
        let grid = Grid::new(10, 8, &mut StdRng::seed_from_u64(1));
        let mut g = GestureTracker::default();
        g.press(&grid, Point::new(3.0, 3.0));
        let req = g.release(&grid, Point::new(4.0, 3.0)).unwrap();
        assert_eq!(req.a, (5, 5));
        assert_eq!(req.b, (6, 5));
    }

    #[test]
    fn test_off_field_press_ignored() {
        let grid = Grid::new(10, 8, &mut StdRng::seed_from_u64(1));
        let mut g = GestureTracker::default();
        assert!(g.press(&grid, Point::new(-40.0, 0.0)).is_none());
        assert!(g.release(&grid, Point::new(0.0, 0.0)).is_none());
    }
}
