#![warn(clippy::all, clippy::pedantic)]

use anyhow::{Context, Result};
use clap::Parser;
use slack_janitor::Config;
use slack_janitor::cli::Cli;
use std::sync::Arc;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Install default crypto provider for Rustls TLS.
    // Without it, rustls cannot pick a process-level CryptoProvider for the websocket.
    if let Err(e) = rustls::crypto::ring::default_provider().install_default() {
        eprintln!("Warning: Failed to install default crypto provider: {e:?}");
    }

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("load configuration from {}", cli.config.display()))?;

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level()?)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    tracing::info!(config = %config.config_path.display(), "Configuration loaded");
    slack_janitor::platform::daemon::run(Arc::new(config)).await
}
