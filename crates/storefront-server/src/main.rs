mod cli;
mod commands;
mod output;

use anyhow::{Result, anyhow};
use clap::Parser;

use cli::{Cli, Commands};
use output::print_error;
use storefront_server::{AppConfig, AppState};
use storefront_server::config::loader::load_config;

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist - it's optional
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    storefront_server::observability::init_tracing();

    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.format.unwrap_or_default();

    let cfg = load_config(cli.config.as_deref()).map_err(|e| anyhow!("Configuration error: {e}"))?;
    storefront_server::observability::apply_logging_level(&cfg.logging.level);
    storefront_server::metrics::init_metrics();

    match &cli.command {
        Commands::Config => commands::show_config(&cfg),
        Commands::Stats(args) => {
            with_state(&cfg, async |state| commands::stats(state, args, format).await).await
        }
        Commands::Catalog(args) => {
            with_state(&cfg, async |state| commands::catalog(state, args).await).await
        }
        Commands::Invalidate(args) => {
            with_state(&cfg, async |state| commands::invalidate(state, args).await).await
        }
        Commands::InvalidateAll => {
            with_state(&cfg, async |state| commands::invalidate_all(state).await).await
        }
        Commands::Clear(args) => {
            with_state(&cfg, async |state| commands::clear(state, args).await).await
        }
        Commands::Webhook(args) => {
            with_state(&cfg, async |state| commands::webhook(state, args, format).await).await
        }
        Commands::Ping => with_state(&cfg, async |state| commands::ping(state).await).await,
    }
}

/// Builds the data layer, runs `command` against it and shuts it down.
async fn with_state(cfg: &AppConfig, command: impl AsyncFnOnce(&AppState) -> Result<()>) -> Result<()> {
    let state = AppState::build(cfg).await?;
    let result = command(&state).await;
    state.shutdown();
    result
}
