//! Gemgrid — gem-swap match-3 puzzle game in the terminal.

mod app;
mod game;
mod grid;
mod highscores;
mod input;
mod theme;
mod tile;
mod ui;

use anyhow::Result;
use app::App;
use clap::{Parser, ValueEnum};

/// Options derived from CLI that affect core behaviour (board size, tile
/// variety, animation step sizes).
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Playable field side length in cells.
    pub interior: usize,
    /// Number of distinct tile kinds in play (2..=8).
    pub kinds: u8,
    /// Scale lost per tick by a matched tile.
    pub shrink_step: f32,
    /// Rows per tick a falling tile descends.
    pub fall_step: f32,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    let config = GameConfig {
        interior: usize::from(args.interior.clamp(4, 26)),
        kinds: args.kinds.clamp(2, 8),
        shrink_step: args.shrink_step,
        fall_step: args.fall_step,
    };
    let mut app = App::new(args, config, theme)?;
    app.run()?;
    Ok(())
}

/// Gem-swap match-3 puzzle game in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "gemgrid",
    version,
    about = "Gem-swap match-3 puzzle in the terminal. Drag tiles to line up three of a kind.",
    long_about = "Gemgrid is a terminal match-3 puzzle game.\n\n\
        Drag a tile onto an adjacent one with the mouse to swap them. Lining up three or more \
        of a kind clears the run and scores; the tiles above fall down and fresh tiles drop in \
        from the top. Only matches you set up yourself score; chains the refill causes are free.\n\n\
        CONTROLS:\n  Mouse drag   Swap adjacent tiles   B + click   Bomb (clear one tile)\n  P            Pause                 Q / Esc     Quit\n\n\
        Use --theme to load a btop-style theme (e.g. onedark.theme)."
)]
pub struct Args {
    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<std::path::PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Playable field side length in cells.
    #[arg(long, default_value = "10", value_name = "CELLS")]
    pub interior: u8,

    /// Number of distinct tile kinds in play (2..=8). Fewer kinds, more matches.
    #[arg(long, default_value = "8", value_name = "N")]
    pub kinds: u8,

    /// Scale a matched tile loses per tick while it shrinks away.
    #[arg(long, default_value = "0.03", value_name = "STEP")]
    pub shrink_step: f32,

    /// Rows per tick a falling tile descends.
    #[arg(long, default_value = "0.05", value_name = "STEP")]
    pub fall_step: f32,

    /// Game logic ticks per second.
    #[arg(long, default_value = "60.0", value_name = "RATE")]
    pub tick_rate: f64,

    /// Disable the match flash animation.
    #[arg(long)]
    pub no_animation: bool,

    /// Skip main menu and start the game immediately.
    #[arg(long)]
    pub no_menu: bool,

    /// Seed the board and refill sequence (reproducible games).
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}
