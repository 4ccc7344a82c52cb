//! # lacquer-client
//!
//! Local runtime and command-line front end for Lacquer: an explicit
//! state store, the single dispatch queue that persists every change, the
//! operations behind each subcommand, and the optional remote mirror.

pub mod cli;
pub mod commands;
pub mod config;
pub mod runtime;
pub mod store;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::Cli;
use crate::config::ClientConfig;

/// Install the `tracing` subscriber. `RUST_LOG` overrides the default
/// filter; logs go to stderr so command output stays clean.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("lacquer_client=info,lacquer_sync=info,lacquer_store=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Entry point shared by the `lacquer` binary.
pub async fn run() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = ClientConfig::from_env();
    tracing::debug!(?config, "Loaded configuration");

    cli::execute(cli, config).await
}
