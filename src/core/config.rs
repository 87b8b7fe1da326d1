/// Field geometry, tuning constants and peer settings shared by both sides
use std::path::Path;
use std::time::Duration;

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Field (logical units, identical on both peers)
pub const FIELD_WIDTH: f64 = 800.0;
pub const FIELD_HEIGHT: f64 = 600.0;

// Ball
pub const BALL_SIZE: f64 = 32.0;
pub const BALL_START_SPEED: f64 = 7.0;
pub const BALL_MAX_SPEED: f64 = 12.0;
pub const BALL_SPEED_INCREMENT: f64 = 0.3;
/// Upper bound (exclusive) of the integer vertical velocity drawn on reset.
pub const BALL_MAX_START_VY: u32 = 7;

// Paddle
pub const PADDLE_WIDTH: f64 = 32.0;
pub const PADDLE_HEIGHT: f64 = 128.0;
pub const PADDLE_MARGIN: f64 = 20.0;
pub const PADDLE_ACCELERATION: f64 = 1.0;
pub const PADDLE_DECELERATION: f64 = 0.6;
pub const PADDLE_MAX_SPEED: f64 = 10.0;

/// Maximum deflection at the paddle's extreme edge (60 degrees).
pub const BOUNCE_ANGLE: f64 = 5.0 * std::f64::consts::PI / 15.0;

pub const DEFAULT_PORT: u16 = 2000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_TICK_RATE_HZ: u32 = 60;
pub const DEFAULT_START_DELAY_MS: u64 = 2000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("not a valid IP address: {0:?} (example: 172.16.254.1 or localhost)")]
    InvalidHost(String),
    #[error("not a valid port: {0:?} (expected 0-65535)")]
    InvalidPort(String),
    #[error("tick rate must be at least 1 Hz")]
    ZeroTickRate,
}

/// Accepts `localhost` or four dot-separated groups of one to three digits.
pub fn validate_host(host: &str) -> Result<(), ConfigError> {
    if host == "localhost" {
        return Ok(());
    }

    let groups: Vec<&str> = host.split('.').collect();
    let well_formed = groups.len() == 4
        && groups
            .iter()
            .all(|g| (1..=3).contains(&g.len()) && g.bytes().all(|b| b.is_ascii_digit()));

    if well_formed {
        Ok(())
    } else {
        Err(ConfigError::InvalidHost(host.to_string()))
    }
}

pub fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    raw.trim()
        .parse::<u16>()
        .map_err(|_| ConfigError::InvalidPort(raw.to_string()))
}

/// A validated host/port pair. The only way into the networking layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, ConfigError> {
        let host = host.into();
        validate_host(&host)?;
        Ok(Self { host, port })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Runtime settings, loadable from a JSON file and overridden from the command line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub connect_timeout_ms: u64,
    pub tick_rate_hz: u32,
    pub start_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
            start_delay_ms: DEFAULT_START_DELAY_MS,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&raw)
            .with_context(|| format!("parsing settings in {}", path.display()))?;
        Ok(settings)
    }

    /// Checks whatever is present; a missing host or port is left for the prompt.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(host) = &self.host {
            validate_host(host)?;
        }
        if self.tick_rate_hz == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        Ok(())
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz.max(1)))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Number of ticks the host holds the ball after its peer attaches.
    pub fn start_delay_ticks(&self) -> u32 {
        let ticks = self.start_delay_ms as f64 / 1000.0 * f64::from(self.tick_rate_hz);
        ticks.round() as u32
    }
}
