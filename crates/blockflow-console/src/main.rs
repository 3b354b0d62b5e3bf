//! # Blockflow Console
//!
//! Terminal front end for a block/flow automation backend.

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod commands;
mod config;
mod engine;
mod render;
mod state;

use commands::{Command, HELP};
use config::ConsoleConfig;
use engine::{Engine, Step};
use state::AppState;

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "blockflow=info";

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // Logs go to stderr so they do not interleave with rendered output.
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Run the command loop until `quit` or end of input.
pub async fn run_console(config: ConsoleConfig) -> Result<()> {
    info!(api = %config.api_url, interval_ms = config.poll_interval_ms, "Blockflow console starting");

    let engine = Engine::new(AppState::from_config(&config)?);
    let mut selection = engine.state().poller.subscribe();
    let mut events = engine.state().store.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{HELP}");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let command = match Command::parse(&line) {
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(e) => {
                        println!("{}", render::error(&e));
                        continue;
                    }
                };
                match engine.handle(command).await {
                    Step::Print(output) => println!("{output}"),
                    Step::Quit => break,
                }
            }
            changed = selection.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = selection.borrow_and_update().clone();
                if let Some(output) = engine.on_selection(&current).await {
                    println!("{output}");
                }
            }
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(output) = engine.on_event(event).await {
                        println!("{output}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Store events lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    engine.state().poller.stop().await;
    info!("Blockflow console stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let config = ConsoleConfig::load()?;
    run_console(config).await
}
