//! warptray entry point.

mod app;
mod cli;
mod config;
mod instance;

use clap::Parser;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,warptray=debug";

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so one-shot commands keep stdout clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting warptray");

    let config = config::Config::load(args.config.as_deref())?;
    tracing::debug!(?config, "configuration loaded");

    let rt = tokio::runtime::Runtime::new()?;
    match args.command {
        Some(command) => rt.block_on(app::run_once(config, command))?,
        None => rt.block_on(app::run(config, args.show))?,
    }

    tracing::info!("warptray shut down cleanly");
    Ok(())
}
