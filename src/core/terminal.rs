/// Terminal front end: draws the field with ratatui and turns crossterm key
/// events into paddle intents.
use std::io::stdout;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use ratatui::layout::Alignment;
use ratatui::style::Color;
use ratatui::symbols::Marker;
use ratatui::text::Line;
use ratatui::widgets::canvas::{Canvas, Rectangle};
use ratatui::widgets::{Block, Borders};
use ratatui::DefaultTerminal;

use crate::core::config::{BALL_SIZE, FIELD_HEIGHT, FIELD_WIDTH, PADDLE_HEIGHT, PADDLE_WIDTH};
use crate::core::game::{InputSource, Intent, Polled};
use crate::core::renderer::{FieldView, Renderer};

/// Without key-release reporting a key counts as held this long after its
/// last press or auto-repeat.
const HOLD_WINDOW: Duration = Duration::from_millis(200);

/// Owns the terminal for the lifetime of the game and restores it on drop.
pub struct TerminalContext {
    terminal: DefaultTerminal,
}

impl TerminalContext {
    pub fn new() -> Self {
        Self {
            terminal: ratatui::init(),
        }
    }
}

impl Default for TerminalContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TerminalContext {
    fn drop(&mut self) {
        ratatui::restore();
    }
}

impl Renderer for TerminalContext {
    fn render(&mut self, view: &FieldView<'_>) -> Result<()> {
        self.terminal.draw(|frame| {
            let title = format!(" NETPONG {} ", view.status);
            let canvas = Canvas::default()
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title(Line::from(title).alignment(Alignment::Center))
                        .title_bottom(
                            Line::from(" [↑/↓] Move  [Esc/Q] Quit ").alignment(Alignment::Center),
                        ),
                )
                .marker(Marker::Braille)
                .x_bounds([0.0, FIELD_WIDTH])
                .y_bounds([0.0, FIELD_HEIGHT])
                .paint(|ctx| {
                    // Canvas y grows upwards; the field's grows downwards.
                    let flip = |y: f64, h: f64| FIELD_HEIGHT - y - h;

                    for paddle in [view.left, view.right] {
                        ctx.draw(&Rectangle {
                            x: paddle.x(),
                            y: flip(paddle.y(), PADDLE_HEIGHT),
                            width: PADDLE_WIDTH,
                            height: PADDLE_HEIGHT,
                            color: Color::White,
                        });
                    }
                    ctx.draw(&Rectangle {
                        x: view.ball.x(),
                        y: flip(view.ball.y(), BALL_SIZE),
                        width: BALL_SIZE,
                        height: BALL_SIZE,
                        color: Color::Yellow,
                    });

                    let score_y = FIELD_HEIGHT - 50.0;
                    ctx.print(FIELD_WIDTH / 4.0 - 20.0, score_y, view.score.server.to_string());
                    let client = view.score.client.to_string();
                    ctx.print(FIELD_WIDTH / 4.0 * 3.0 - 20.0, score_y, client);
                });

            frame.render_widget(canvas, frame.area());
        })?;
        Ok(())
    }
}

/// Tracks one direction key.
#[derive(Debug, Default)]
struct KeyState {
    held: bool,
    until: Option<Instant>,
}

impl KeyState {
    fn press(&mut self, now: Instant) {
        self.held = true;
        self.until = Some(now + HOLD_WINDOW);
    }

    fn release(&mut self) {
        self.held = false;
        self.until = None;
    }

    fn active(&self, now: Instant, releases_reported: bool) -> bool {
        if releases_reported {
            self.held
        } else {
            self.until.is_some_and(|t| now < t)
        }
    }
}

/// Keyboard intent source. Up/Down move the local paddle; Esc, `q` or
/// Ctrl-C close the game.
pub struct KeyboardInput {
    releases_reported: bool,
    /// We pushed enhancement flags and must pop them again.
    pushed: bool,
    up: KeyState,
    down: KeyState,
}

impl KeyboardInput {
    /// Asks the terminal for key-release events where it supports them.
    pub fn new() -> Self {
        let supported = matches!(
            crossterm::terminal::supports_keyboard_enhancement(),
            Ok(true)
        );
        let releases_reported = supported
            && execute!(
                stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )
            .is_ok();
        tracing::debug!(releases_reported, "keyboard input ready");
        Self {
            releases_reported,
            pushed: releases_reported,
            up: KeyState::default(),
            down: KeyState::default(),
        }
    }

    /// Feed one key event; returns `true` if it asks to close.
    fn handle(&mut self, key: KeyEvent, now: Instant) -> bool {
        let state = match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return key.kind == KeyEventKind::Press,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return true,
            KeyCode::Up => &mut self.up,
            KeyCode::Down => &mut self.down,
            _ => return false,
        };
        match key.kind {
            KeyEventKind::Press | KeyEventKind::Repeat => state.press(now),
            KeyEventKind::Release => state.release(),
        }
        false
    }

    fn intent(&self, now: Instant) -> Intent {
        Intent {
            moving_up: self.up.active(now, self.releases_reported),
            moving_down: self.down.active(now, self.releases_reported),
        }
    }
}

impl Default for KeyboardInput {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for KeyboardInput {
    fn drop(&mut self) {
        if self.pushed {
            let _ = execute!(stdout(), PopKeyboardEnhancementFlags);
        }
    }
}

impl InputSource for KeyboardInput {
    fn poll(&mut self) -> Result<Polled> {
        let now = Instant::now();
        let mut close = false;
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                close |= self.handle(key, now);
            }
        }
        Ok(Polled {
            intent: self.intent(now),
            close,
        })
    }
}
