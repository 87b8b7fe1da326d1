pub mod core {
    pub mod config;
    pub mod engine;
    pub mod game;
    pub mod lobby;
    pub mod network;
    pub mod physics;
    pub mod protocol;
    pub mod renderer;
    pub mod session;
    pub mod terminal;
}

pub mod cli;

// Re-export for convenience
pub use crate::core::engine::{Engine, Termination};
pub use crate::core::game::{InputSource, Intent, Role};
pub use crate::core::renderer::{FieldView, Renderer};
