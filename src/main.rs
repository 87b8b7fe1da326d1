use anyhow::{bail, Result};
use clap::Parser;
use netpong::cli::{self, Cli};
use netpong::core::terminal::{KeyboardInput, TerminalContext};
use netpong::{Engine, Termination};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli::init_tracing(cli.log_file.as_deref())?;

    // 1. Host and port, asking the user for anything missing or invalid
    let settings = cli.settings()?;
    let endpoint = cli::resolve_endpoint(&settings)?;

    // 2. Take over the terminal and play; dropping the engine gives it back
    let termination = {
        let renderer = TerminalContext::new();
        let input = KeyboardInput::new();
        let mut engine = Engine::new(endpoint, settings, input, renderer);
        engine.run().await?
    };

    match termination {
        Termination::Closed => Ok(()),
        Termination::ConnectionLost(reason) => {
            bail!("Connection was lost, program will terminate. ({reason})")
        }
    }
}
