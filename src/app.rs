//! App: terminal init, main loop, event accumulation and tick dispatch.

use crate::game::GameState;
use crate::input::{Action, TickInput, key_to_action};
use crate::theme::Theme;
use crate::ui::{POPUP_TTL_TICKS, ScorePopup};
use crate::{Args, GameConfig};
use anyhow::Result;
use crossterm::event::{
    self, Event, KeyCode, KeyEventKind, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::DefaultTerminal;
use ratatui::layout::Rect;
use std::time::{Duration, Instant};
use tachyonfx::Effect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Menu,
    Playing,
    QuitMenu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitOption {
    Resume,
    MainMenu,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuState {
    pub animation_start: Instant,
}

impl Default for MenuState {
    fn default() -> Self {
        Self {
            animation_start: Instant::now(),
        }
    }
}

pub struct App {
    args: Args,
    config: GameConfig,
    theme: Theme,
    state: GameState,
    screen: Screen,
    paused: bool,
    last_tick: Instant,
    /// Pointer events accumulated since the last tick; drained into one
    /// [`TickInput`] per tick.
    pending: TickInput,
    /// Bomb key currently held (press/release tracked via keyboard
    /// enhancement flags).
    bomb_held: bool,
    /// Cells of the most recent match, kept until the flash effect finishes.
    flash_cells: Vec<(usize, usize)>,
    /// TachyonFX fade effect for the match flash (created when a run resolves).
    match_flash: Option<Effect>,
    /// Last time we processed the flash effect (for delta).
    flash_process_time: Option<Instant>,
    popups: Vec<ScorePopup>,
    menu_state: MenuState,
    quit_selected: QuitOption,
    best: u32,
}

impl App {
    pub fn new(args: Args, config: GameConfig, theme: Theme) -> Result<Self> {
        let state = new_game(&config, args.seed);
        let screen = if args.no_menu {
            Screen::Playing
        } else {
            Screen::Menu
        };
        let best = crate::highscores::load_high_score();
        Ok(Self {
            args,
            config,
            theme,
            state,
            screen,
            paused: false,
            last_tick: Instant::now(),
            pending: TickInput::default(),
            bomb_held: false,
            flash_cells: Vec::new(),
            match_flash: None,
            flash_process_time: None,
            popups: Vec::new(),
            menu_state: MenuState::default(),
            quit_selected: QuitOption::Resume,
            best,
        })
    }

    fn reset_game(&mut self) {
        self.state = new_game(&self.config, self.args.seed);
        self.screen = Screen::Playing;
        self.paused = false;
        self.last_tick = Instant::now();
        self.pending = TickInput::default();
        self.bomb_held = false;
        self.flash_cells.clear();
        self.match_flash = None;
        self.flash_process_time = None;
        self.popups.clear();
    }

    fn save_best(&self) {
        if let Err(err) = crate::highscores::save_high_score(self.best) {
            eprintln!("could not save high score: {err}");
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{
                DisableMouseCapture, EnableMouseCapture, KeyboardEnhancementFlags,
                PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
            },
            execute,
            terminal::{
                EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
            },
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

        // Release events for the bomb key need the enhanced keyboard protocol;
        // not every terminal supports it, so failure is tolerated.
        let _ = execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        );

        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
        execute!(std::io::stdout(), DisableMouseCapture, LeaveAlternateScreen)?;
        disable_raw_mode()?;

        self.save_best();
        result
    }

    /// Board-space point for a terminal mouse position, using the same
    /// centered layout the draw pass computes.
    fn mouse_point(&self, column: u16, row: u16) -> crate::grid::Point {
        let (cols, rows) = crossterm::terminal::size().unwrap_or((80, 24));
        let area = Rect::new(0, 0, cols, rows);
        let board = crate::ui::board_rect(area, self.state.grid.interior() as u16);
        crate::ui::mouse_to_point(board, self.state.grid.interior() as u16, column, row)
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if self.screen != Screen::Playing || self.paused {
            return;
        }
        let p = self.mouse_point(mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => self.pending.pressed = Some(p),
            MouseEventKind::Drag(MouseButton::Left) => self.pending.moved = Some(p),
            MouseEventKind::Up(MouseButton::Left) => self.pending.released = Some(p),
            _ => {}
        }
    }

    /// Runs one game tick: hands the accumulated input to the core, then
    /// turns the resulting match events into popups and a flash.
    fn game_tick(&mut self) {
        let mut input = std::mem::take(&mut self.pending);
        input.bomb_held = self.bomb_held;
        self.state.tick(&input);

        for popup in &mut self.popups {
            popup.age += 1;
        }
        self.popups.retain(|p| p.age < POPUP_TTL_TICKS);

        for ev in self.state.take_events() {
            if ev.points > 0 {
                let mid = ev.cells[ev.cells.len() / 2];
                self.popups.push(ScorePopup {
                    cell: mid,
                    amount: ev.points,
                    age: 0,
                });
            }
            // A fresh run restarts the flash over the union of recent runs.
            self.flash_cells.extend_from_slice(&ev.cells);
            self.match_flash = None;
            self.flash_process_time = None;
        }

        self.best = self.best.max(self.state.score());
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let tick_interval = Duration::from_secs_f64(1.0 / self.args.tick_rate.max(1.0));
        loop {
            let now = Instant::now();
            terminal.draw(|f| {
                crate::ui::draw(
                    f,
                    self.screen,
                    &self.state,
                    &self.theme,
                    self.best,
                    self.paused,
                    &self.popups,
                    f.area(),
                    &mut self.match_flash,
                    &mut self.flash_process_time,
                    &self.flash_cells,
                    &self.menu_state,
                    (self.screen == Screen::QuitMenu).then_some(self.quit_selected),
                    now,
                    self.args.no_animation,
                )
            })?;

            if !self.flash_cells.is_empty()
                && (self.args.no_animation
                    || self.match_flash.as_ref().is_some_and(|e| e.done()))
            {
                self.flash_cells.clear();
                self.match_flash = None;
                self.flash_process_time = None;
            }

            // Limit event polling to hit ~60 FPS rendering (16ms)
            let frame_duration = Duration::from_millis(16);
            let timeout = frame_duration.saturating_sub(now.elapsed());

            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    match event::read()? {
                        Event::Key(key) => {
                            if self.handle_key(key)? {
                                return Ok(());
                            }
                        }
                        Event::Mouse(mouse) => self.handle_mouse(mouse),
                        _ => {}
                    }
                }
            }

            if self.screen == Screen::Playing && !self.paused {
                while self.last_tick.elapsed() >= tick_interval {
                    self.last_tick += tick_interval;
                    self.game_tick();
                }
            } else {
                // Paused and menu screens hold the tick clock so resuming
                // does not replay the elapsed time as a burst of ticks.
                self.last_tick = Instant::now();
            }
        }
    }

    /// Returns Ok(true) when the app should exit.
    fn handle_key(&mut self, key: crossterm::event::KeyEvent) -> Result<bool> {
        // Bomb arming is stateful: held while the key is down.
        if key.code == KeyCode::Char(crate::input::BOMB_KEY) {
            match key.kind {
                KeyEventKind::Press => self.bomb_held = true,
                KeyEventKind::Release => self.bomb_held = false,
                KeyEventKind::Repeat => {}
            }
        }
        if key.kind != KeyEventKind::Press {
            return Ok(false);
        }
        let action = key_to_action(key);

        match self.screen {
            Screen::Menu => match action {
                Action::Quit => return Ok(true),
                Action::Confirm => self.reset_game(),
                _ => {}
            },
            Screen::Playing => {
                if self.paused {
                    match action {
                        Action::Pause | Action::Confirm => self.paused = false,
                        Action::Quit => {
                            self.screen = Screen::QuitMenu;
                            self.quit_selected = QuitOption::Resume;
                        }
                        _ => {}
                    }
                } else {
                    match action {
                        Action::Pause => self.paused = true,
                        Action::Quit => {
                            self.screen = Screen::QuitMenu;
                            self.quit_selected = QuitOption::Resume;
                        }
                        _ => {}
                    }
                }
            }
            Screen::QuitMenu => match action {
                Action::Down => {
                    self.quit_selected = match self.quit_selected {
                        QuitOption::Resume => QuitOption::MainMenu,
                        QuitOption::MainMenu => QuitOption::Exit,
                        QuitOption::Exit => QuitOption::Resume,
                    };
                }
                Action::Up => {
                    self.quit_selected = match self.quit_selected {
                        QuitOption::Resume => QuitOption::Exit,
                        QuitOption::MainMenu => QuitOption::Resume,
                        QuitOption::Exit => QuitOption::MainMenu,
                    };
                }
                Action::Confirm => match self.quit_selected {
                    QuitOption::Resume => self.screen = Screen::Playing,
                    QuitOption::MainMenu => {
                        self.save_best();
                        self.screen = Screen::Menu;
                        self.menu_state = MenuState::default();
                    }
                    QuitOption::Exit => return Ok(true),
                },
                Action::Pause | Action::Quit => self.screen = Screen::Playing,
                _ => {}
            },
        }
        Ok(false)
    }
}

fn new_game(config: &GameConfig, seed: Option<u64>) -> GameState {
    match seed {
        Some(seed) => GameState::with_seed(config, seed),
        None => GameState::new(config),
    }
}
