use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context as _, Result};
use clap::Parser;
use dialoguer::{theme::ColorfulTheme, Input};
use tracing_subscriber::EnvFilter;

use crate::core::config::{parse_port, validate_host, Endpoint, Settings, DEFAULT_PORT};

#[derive(Parser, Debug)]
#[command(name = "netpong")]
#[command(about = "🏓 Two-player pong over a plain TCP connection")]
#[command(version)]
pub struct Cli {
    /// Opponent address: an IPv4 address or "localhost". Asked for when missing or invalid.
    #[arg(long)]
    pub host: Option<String>,

    /// Port to connect to, or to listen on when nobody answers (0-65535)
    #[arg(short, long)]
    pub port: Option<String>,

    /// JSON settings file; command-line flags take precedence
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// How long to wait for an opponent before hosting
    #[arg(long)]
    pub connect_timeout_ms: Option<u64>,

    /// Simulation ticks per second
    #[arg(long)]
    pub tick_rate: Option<u32>,

    /// Pause before the first serve once an opponent joins
    #[arg(long)]
    pub start_delay_ms: Option<u64>,

    /// Write logs here (filtered by RUST_LOG); the terminal belongs to the game
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Merge the settings file (if any) with command-line overrides. An invalid
    /// host or port is reported and dropped so [`resolve_endpoint`] asks again.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };

        if let Some(host) = &self.host {
            settings.host = Some(host.clone());
        }
        if let Some(raw) = &self.port {
            settings.port = match parse_port(raw) {
                Ok(port) => Some(port),
                Err(e) => {
                    eprintln!("❌ {e}");
                    None
                }
            };
        }
        if let Some(ms) = self.connect_timeout_ms {
            settings.connect_timeout_ms = ms;
        }
        if let Some(hz) = self.tick_rate {
            settings.tick_rate_hz = hz;
        }
        if let Some(ms) = self.start_delay_ms {
            settings.start_delay_ms = ms;
        }

        if let Some(host) = &settings.host {
            if let Err(e) = validate_host(host) {
                eprintln!("❌ {e}");
                settings.host = None;
            }
        }

        settings.validate()?;
        Ok(settings)
    }
}

/// Turn settings into a validated endpoint, prompting until host and port are acceptable.
pub fn resolve_endpoint(settings: &Settings) -> Result<Endpoint> {
    let theme = ColorfulTheme::default();

    let host = match &settings.host {
        Some(host) => host.clone(),
        None => Input::<String>::with_theme(&theme)
            .with_prompt("Enter IP-address (example: 172.16.254.1 or localhost)")
            .validate_with(|input: &String| validate_host(input))
            .interact_text()?,
    };

    let port = match settings.port {
        Some(port) => port,
        None => {
            let raw = Input::<String>::with_theme(&theme)
                .with_prompt("Enter port number (example: 2000)")
                .default(DEFAULT_PORT.to_string())
                .validate_with(|input: &String| parse_port(input).map(|_| ()))
                .interact_text()?;
            parse_port(&raw)?
        }
    };

    Ok(Endpoint::new(host, port)?)
}

/// Send logs to `log_file`. Without one nothing is installed: the game owns the terminal.
pub fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let Some(path) = log_file else {
        return Ok(());
    };
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
