/// Core game interface: roles and the per-tick input seam
use anyhow::Result;

/// Which side of the session this process plays. Decided once by the lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Owns the ball physics and broadcasts its position. Controls the left paddle.
    Host,
    /// Mirrors the ball position it receives. Controls the right paddle.
    Mirror,
}

impl Role {
    pub fn is_host(self) -> bool {
        matches!(self, Role::Host)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Host => f.write_str("server"),
            Role::Mirror => f.write_str("client"),
        }
    }
}

/// Logical paddle input for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Intent {
    pub moving_up: bool,
    pub moving_down: bool,
}

impl Intent {
    pub const IDLE: Intent = Intent {
        moving_up: false,
        moving_down: false,
    };
    pub const UP: Intent = Intent {
        moving_up: true,
        moving_down: false,
    };
    pub const DOWN: Intent = Intent {
        moving_up: false,
        moving_down: true,
    };
}

/// What the input collaborator reports for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Polled {
    pub intent: Intent,
    /// The user closed the window (or pressed quit).
    pub close: bool,
}

/// Supplies the local paddle's intent once per tick. Must not block.
pub trait InputSource {
    fn poll(&mut self) -> Result<Polled>;
}
