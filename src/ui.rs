//! Layout and drawing: menu, board, pause, quit menu, sidebar, score popups.

use crate::app::{MenuState, QuitOption, Screen};
use crate::game::GameState;
use crate::theme::Theme;
use crate::tile::TileKind;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use std::collections::HashSet;
use std::time::Instant;
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

/// Each board cell is two terminal columns wide and one row tall, which makes
/// the square playable field look roughly square on screen.
const CELL_WIDTH: u16 = 2;
const CELL_HEIGHT: u16 = 1;

const SIDEBAR_WIDTH: u16 = 24;

/// Duration of the match flash fade (TachyonFX) in ms.
const MATCH_FLASH_MS: u32 = 400;

/// Score popup lifetime in ticks; the label drifts upward as it ages.
pub const POPUP_TTL_TICKS: u32 = 90;

/// Floating "+N" label anchored to the cell where a run resolved.
#[derive(Debug, Clone)]
pub struct ScorePopup {
    pub cell: (usize, usize),
    pub amount: u32,
    pub age: u32,
}

/// Board size in terminal cells (border included) for a given playable width.
fn board_pixel_size(interior: u16) -> (u16, u16) {
    (interior * CELL_WIDTH + 2, interior * CELL_HEIGHT + 2)
}

/// Board inner rect (playable cells only, no border); matches draw_game layout.
/// The app uses this for mouse mapping, so it must agree with the draw pass.
pub fn board_rect(area: Rect, interior: u16) -> Rect {
    let (pw, ph) = board_pixel_size(interior);
    let total_w = pw + SIDEBAR_WIDTH;
    let x = area.x + area.width.saturating_sub(total_w) / 2;
    let y = area.y + area.height.saturating_sub(ph) / 2;
    Rect {
        x: x + 1,
        y: y + 1,
        width: (interior * CELL_WIDTH).min(area.width.saturating_sub(2)),
        height: (interior * CELL_HEIGHT).min(area.height.saturating_sub(2)),
    }
}

/// Terminal (column, row) → board-space point. x is fractional (two columns
/// per cell, nudged to the cell centre), y counts rows upward from the bottom
/// playable row. Positions outside the board map to points the grid rejects.
pub fn mouse_to_point(board: Rect, interior: u16, column: u16, row: u16) -> crate::grid::Point {
    let x = (f32::from(column) - f32::from(board.x)) / f32::from(CELL_WIDTH) - 0.25;
    let y = f32::from(interior) - 1.0 - (f32::from(row) - f32::from(board.y));
    crate::grid::Point::new(x, y)
}

/// Glyph for a cell by its shrink scale: a full tile shows its kind glyph,
/// a shrinking one degrades to a dot before vanishing.
fn cell_glyph(kind: TileKind, scale: f32, angle: f32) -> &'static str {
    if scale < 0.35 {
        return "·";
    }
    if scale < 0.7 {
        return "•";
    }
    // Spinning kinds alternate between filled and outline forms per half-turn.
    let outline_phase = (angle / std::f32::consts::PI) as u32 % 2 == 1;
    match kind {
        TileKind::Star if outline_phase => "☆",
        TileKind::Diamond if outline_phase => "◇",
        _ => kind.glyph(),
    }
}

/// Build set of buffer (x, y) positions that belong to flashing cells.
fn flash_buffer_positions(
    board: Rect,
    interior: u16,
    cells: &[(usize, usize)],
) -> HashSet<(u16, u16)> {
    let mut set = HashSet::new();
    for &(gx, gy) in cells {
        let ix = (gx - crate::grid::BORDER) as u16;
        let iy = (gy - crate::grid::BORDER) as u16;
        let x0 = board.x + ix * CELL_WIDTH;
        let y0 = board.y + (interior - 1 - iy) * CELL_HEIGHT;
        for bx in x0..(x0 + CELL_WIDTH).min(board.x + board.width) {
            for by in y0..(y0 + CELL_HEIGHT).min(board.y + board.height) {
                set.insert((bx, by));
            }
        }
    }
    set
}

/// Create or update the match flash effect and process it (TachyonFX: fade
/// matched cells back from white to bg).
fn apply_match_flash(
    frame: &mut Frame,
    theme: &Theme,
    area: Rect,
    interior: u16,
    flash_cells: &[(usize, usize)],
    match_flash: &mut Option<Effect>,
    flash_process_time: &mut Option<Instant>,
    now: Instant,
) {
    let board = board_rect(area, interior);
    let delta = flash_process_time
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
    let tfx_delta = TfxDuration::from_millis(delta_ms);
    *flash_process_time = Some(now);

    if match_flash.is_none() {
        let flash_set = flash_buffer_positions(board, interior, flash_cells);
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
            flash_set.contains(&(pos.x, pos.y))
        }));
        let bg = theme.bg;
        let effect = fx::fade_to(bg, bg, (MATCH_FLASH_MS, Interpolation::Linear))
            .with_filter(filter)
            .with_area(board);
        *match_flash = Some(effect);
    }

    if let Some(effect) = match_flash {
        frame.render_effect(effect, board, tfx_delta);
    }
}

/// Draw current screen, with optional pause overlay. When matched cells are
/// flashing and !no_animation, applies the TachyonFX fade and updates
/// `match_flash` / `flash_process_time`.
#[allow(clippy::too_many_arguments)]
pub fn draw(
    frame: &mut Frame,
    screen: Screen,
    state: &GameState,
    theme: &Theme,
    best: u32,
    paused: bool,
    popups: &[ScorePopup],
    area: Rect,
    match_flash: &mut Option<Effect>,
    flash_process_time: &mut Option<Instant>,
    flash_cells: &[(usize, usize)],
    menu_state: &MenuState,
    quit_selected: Option<QuitOption>,
    now: Instant,
    no_animation: bool,
) {
    match screen {
        Screen::Menu => draw_menu(frame, theme, menu_state, best, area, now),
        Screen::Playing => {
            draw_game(frame, state, theme, best, popups, area);
            if paused {
                draw_pause_overlay(frame, theme, area);
            }
            if !flash_cells.is_empty() && !no_animation {
                apply_match_flash(
                    frame,
                    theme,
                    area,
                    state.grid.interior() as u16,
                    flash_cells,
                    match_flash,
                    flash_process_time,
                    now,
                );
            }
        }
        Screen::QuitMenu => {
            draw_game(frame, state, theme, best, popups, area);
            if let Some(opt) = quit_selected {
                draw_quit_menu(frame, theme, opt);
            }
        }
    }
}

fn draw_menu(
    frame: &mut Frame,
    theme: &Theme,
    menu_state: &MenuState,
    best: u32,
    area: Rect,
    now: Instant,
) {
    let popup_w = 44u16;
    let popup_h = 16u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };

    let title = Line::from(vec![
        Span::styled(" Gem ", Style::default().fg(Color::Rgb(255, 120, 120)).bold()),
        Span::styled(" grid ", Style::default().fg(theme.main_fg).bold()),
    ]);

    let glyph_strip = Line::from(
        TileKind::ALL
            .iter()
            .flat_map(|kind| {
                [
                    Span::styled(
                        kind.glyph(),
                        Style::default().fg(theme.tile_color(kind.color_index())),
                    ),
                    Span::from(" "),
                ]
            })
            .collect::<Vec<_>>(),
    );

    let start_btn = Span::styled(
        " [ ENTER  START ] ",
        Style::default().fg(Color::Black).bg(theme.tiles[1]).bold(),
    );

    let lines = vec![
        Line::from(""),
        title,
        Line::from(""),
        glyph_strip,
        Line::from(""),
        Line::from(Span::styled(
            format!(" Best: {best} "),
            Style::default().fg(theme.main_fg),
        )),
        Line::from(""),
        Line::from(start_btn),
        Line::from(""),
        Line::from(vec![
            Span::styled(" DRAG ", Style::default().fg(theme.tiles[3])),
            Span::from("SWAP   "),
            Span::styled(" P ", Style::default().fg(theme.tiles[3])),
            Span::from("PAUSE   "),
            Span::styled(" B+CLICK ", Style::default().fg(theme.tiles[3])),
            Span::from("BOMB"),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            " [Q] QUIT ",
            Style::default().fg(Color::Rgb(255, 80, 80)),
        )),
    ];

    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
    );

    // Startup animation: slide in from bottom, ease-out cubic.
    let elapsed = now.duration_since(menu_state.animation_start).as_millis() as u32;
    let anim_duration = 500u32;
    let t = (elapsed as f32 / anim_duration as f32).min(1.0);
    let offset_t = 1.0 - (1.0 - t).powi(3);
    let anim_y_offset = ((1.0 - offset_t) * 10.0) as u16;
    let mut anim_popup = popup;
    anim_popup.y += anim_y_offset;

    p.render(anim_popup, frame.buffer_mut());
}

fn draw_pause_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    let popup_w = 28u16;
    let popup_h = 5u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " P — Resume    Q — Quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
    );
    p.render(popup, frame.buffer_mut());
}

/// Draw game: board + sidebar; use full area and center the board.
fn draw_game(
    frame: &mut Frame,
    state: &GameState,
    theme: &Theme,
    best: u32,
    popups: &[ScorePopup],
    area: Rect,
) {
    let interior = state.grid.interior() as u16;
    let (pw, ph) = board_pixel_size(interior);
    let total_w = pw + SIDEBAR_WIDTH;

    let horiz_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);

    let vert_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(ph),
            Constraint::Fill(1),
        ])
        .split(horiz_chunks[1]);

    let active_area = vert_chunks[1];

    let (board_area, sidebar_area) = {
        let inner = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(pw), Constraint::Length(SIDEBAR_WIDTH)])
            .split(active_area);
        (inner[0], inner[1])
    };

    draw_board(frame, state, theme, board_area, popups);
    draw_sidebar(frame, state, theme, sidebar_area, best);
}

fn draw_board(
    frame: &mut Frame,
    state: &GameState,
    theme: &Theme,
    area: Rect,
    popups: &[ScorePopup],
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(" gemgrid ", theme.title));
    let inner = block.inner(area);
    block.render(area, frame.buffer_mut());

    let interior = state.grid.interior() as u16;
    let board = Rect {
        x: inner.x,
        y: inner.y,
        width: (interior * CELL_WIDTH).min(inner.width),
        height: (interior * CELL_HEIGHT).min(inner.height),
    };
    let lo = state.grid.lo();
    let drag_source = state.drag().map(|(cell, _)| cell);

    let buf = frame.buffer_mut();

    // Background fill so empty cells and sub-cell gaps all carry the board bg.
    for by in board.y..board.y + board.height {
        for bx in board.x..board.x + board.width {
            buf[(bx, by)].set_symbol(" ").set_bg(theme.bg);
        }
    }

    for (gx, gy) in state.grid.interior_coords() {
        let cell = state.grid.cell(gx, gy);
        let Some(kind) = cell.kind() else { continue };

        let ix = (gx - lo) as u16;
        let iy = (gy - lo) as f32;
        // Falling tiles render below their logical row by their fall offset.
        let vy = f32::from(interior) - 1.0 - (iy - cell.fall_offset);
        let rx = board.x + ix * CELL_WIDTH;
        let ry = board.y + (vy.round().max(0.0) as u16).min(interior - 1);

        if rx >= board.x + board.width || ry >= board.y + board.height {
            continue;
        }

        let mut style = Style::default()
            .fg(theme.tile_color(kind.color_index()))
            .bg(theme.bg);
        if kind.pulses() && cell.pulse >= 0.5 {
            style = style.bold();
        }
        if drag_source == Some((gx, gy)) {
            style = style.bg(theme.div_line);
        }
        buf[(rx, ry)]
            .set_symbol(cell_glyph(kind, cell.scale, cell.angle))
            .set_style(style);
    }

    // The grabbed tile follows the pointer while a drag is live.
    if let Some(((gx, gy), p)) = state.drag() {
        if let Some(kind) = state.grid.cell(gx, gy).kind() {
            let col = board.x as f32 + (p.x + 0.25) * f32::from(CELL_WIDTH);
            let row = board.y as f32 + f32::from(interior) - 1.0 - p.y;
            let (rx, ry) = (col.round().max(0.0) as u16, row.round().max(0.0) as u16);
            if rx >= board.x
                && rx < board.x + board.width
                && ry >= board.y
                && ry < board.y + board.height
            {
                buf[(rx, ry)].set_symbol(kind.glyph()).set_style(
                    Style::default()
                        .fg(theme.tile_color(kind.color_index()))
                        .bg(theme.div_line)
                        .bold(),
                );
            }
        }
    }

    // Floating score popups drift up one row per third of their lifetime.
    for popup in popups {
        let ix = (popup.cell.0.saturating_sub(lo)) as u16;
        let iy = (popup.cell.1.saturating_sub(lo)) as u16;
        let rise = (popup.age * 3 / POPUP_TTL_TICKS) as u16;
        let ry = (board.y + (interior - 1).saturating_sub(iy)).saturating_sub(rise);
        let rx = board.x + ix * CELL_WIDTH;
        if rx < board.x + board.width && ry >= board.y && ry < board.y + board.height {
            let label = format!("+{}", popup.amount);
            let style = Style::default().fg(theme.title).bg(theme.bg).bold();
            buf.set_string(rx, ry, label, style);
        }
    }
}

fn draw_sidebar(frame: &mut Frame, state: &GameState, theme: &Theme, area: Rect, best: u32) {
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let border_style = Style::default().fg(theme.div_line).bg(theme.bg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Stats (border + score, best)
            Constraint::Length(1), // gap
            Constraint::Length(4), // Tiles (border + title + glyph strip)
            Constraint::Length(1), // gap
            Constraint::Length(7), // Controls
        ])
        .split(area);

    // --- Stats (own border): Score, Best ---
    let stats_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let stats_inner = stats_block.inner(chunks[0]);
    stats_block.render(chunks[0], frame.buffer_mut());
    let stats_lines = vec![
        Line::from(vec![
            Span::styled("Score: ", title_style),
            Span::styled(state.score().to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Best: ", title_style),
            Span::styled(best.to_string(), fg_style),
        ]),
    ];
    Paragraph::new(ratatui::text::Text::from(stats_lines)).render(stats_inner, frame.buffer_mut());

    // --- Tiles (own border): glyph legend in palette order ---
    let tiles_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let tiles_inner = tiles_block.inner(chunks[2]);
    tiles_block.render(chunks[2], frame.buffer_mut());
    let tiles_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(tiles_inner);
    Paragraph::new(Line::from(Span::styled("Tiles", title_style)))
        .render(tiles_layout[0], frame.buffer_mut());
    draw_tile_strip(frame, theme, tiles_layout[1]);

    // --- Controls (own border) ---
    let controls_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let controls_inner = controls_block.inner(chunks[4]);
    controls_block.render(chunks[4], frame.buffer_mut());
    let controls_lines = vec![
        Line::from(vec![
            Span::styled("drag ", title_style),
            Span::styled("swap tiles", fg_style),
        ]),
        Line::from(vec![
            Span::styled("b+click ", title_style),
            Span::styled("bomb", fg_style),
        ]),
        Line::from(vec![
            Span::styled("p ", title_style),
            Span::styled("pause", fg_style),
        ]),
        Line::from(vec![
            Span::styled("q ", title_style),
            Span::styled("quit", fg_style),
        ]),
    ];
    Paragraph::new(ratatui::text::Text::from(controls_lines))
        .render(controls_inner, frame.buffer_mut());
}

/// Draw a row of the eight tile glyphs in their palette colours.
fn draw_tile_strip(frame: &mut Frame, theme: &Theme, area: Rect) {
    let block_w = (area.width / 8).max(1);
    for (i, kind) in TileKind::ALL.iter().enumerate() {
        let r = Rect {
            x: area.x + (i as u16) * block_w,
            y: area.y,
            width: block_w,
            height: area.height.min(1),
        };
        let c = theme.tile_color(kind.color_index());
        let p = Paragraph::new(kind.glyph()).style(Style::default().fg(c).bg(theme.bg));
        p.render(r, frame.buffer_mut());
    }
}

pub fn draw_quit_menu(frame: &mut Frame, theme: &Theme, selected: QuitOption) {
    let area = frame.area();
    let qw = 24;
    let qh = 8;
    let quit_rect = Rect {
        x: area.x + area.width.saturating_sub(qw) / 2,
        y: area.y + area.height.saturating_sub(qh) / 2,
        width: qw,
        height: qh,
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.title))
        .title(" Quit? ");

    // Clear background
    for y in quit_rect.y..quit_rect.y + quit_rect.height {
        for x in quit_rect.x..quit_rect.x + quit_rect.width {
            frame.buffer_mut()[(x, y)].set_style(Style::default().bg(theme.bg));
        }
    }

    let inner = block.inner(quit_rect);
    block.render(quit_rect, frame.buffer_mut());

    let options = [
        (QuitOption::Resume, " Resume "),
        (QuitOption::MainMenu, " Main Menu "),
        (QuitOption::Exit, " Exit "),
    ];

    for (i, (opt, label)) in options.iter().enumerate() {
        let style = if *opt == selected {
            Style::default().fg(theme.bg).bg(theme.title).bold()
        } else {
            Style::default().fg(theme.title)
        };
        let rx = inner.x + (inner.width.saturating_sub(label.len() as u16)) / 2;
        let ry = inner.y + 1 + i as u16 * 2;
        frame.buffer_mut().set_string(rx, ry, label, style);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mouse_maps_to_cell_under_both_columns() {
        let board = Rect {
            x: 10,
            y: 5,
            width: 20,
            height: 10,
        };
        // Bottom-left cell occupies columns 10..12 of the last board row.
        for col in [10, 11] {
            let p = mouse_to_point(board, 10, col, 14);
            assert_eq!((p.x + 0.5).floor() as i32, 0);
            assert_eq!((p.y + 0.5).floor() as i32, 0);
        }
        // Top row maps to y = interior - 1.
        let p = mouse_to_point(board, 10, 10, 5);
        assert_eq!((p.y + 0.5).floor() as i32, 9);
    }

    #[test]
    fn test_glyph_degrades_with_scale() {
        assert_eq!(cell_glyph(TileKind::Heart, 1.0, 0.0), "♥");
        assert_eq!(cell_glyph(TileKind::Heart, 0.5, 0.0), "•");
        assert_eq!(cell_glyph(TileKind::Heart, 0.1, 0.0), "·");
    }

    #[test]
    fn test_spin_alternates_outline() {
        assert_eq!(cell_glyph(TileKind::Star, 1.0, 0.0), "★");
        assert_eq!(cell_glyph(TileKind::Star, 1.0, std::f32::consts::PI * 1.5), "☆");
        assert_eq!(cell_glyph(TileKind::Diamond, 1.0, std::f32::consts::PI * 1.5), "◇");
        // Non-spinning kinds keep their glyph at every angle.
        assert_eq!(cell_glyph(TileKind::Square, 1.0, std::f32::consts::PI * 1.5), "■");
    }
}
