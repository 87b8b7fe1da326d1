/// Renderer seam: the engine hands a borrowed view of the field every tick
use anyhow::Result;

use crate::core::game::Role;
use crate::core::physics::{Ball, Paddle, Score};

/// Everything a renderer needs to draw one frame.
#[derive(Debug)]
pub struct FieldView<'a> {
    pub role: Role,
    pub ball: &'a Ball,
    pub left: &'a Paddle,
    pub right: &'a Paddle,
    pub score: Score,
    pub status: &'a str,
}

pub trait Renderer {
    fn render(&mut self, view: &FieldView<'_>) -> Result<()>;
}

/// Draws nothing. Used when running without a terminal.
#[derive(Debug, Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render(&mut self, _view: &FieldView<'_>) -> Result<()> {
        Ok(())
    }
}
