//! `cogscreen` entry point.

mod args;
mod commands;
mod logging;
mod participant;
mod settings;

use anyhow::Result;
use clap::Parser;

use crate::args::{Cli, Commands};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_json)?;

    let config = settings::load(cli.config.as_deref())?;
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Run(args) => commands::run::execute(args, config).await,
        Commands::Sequence(args) => commands::sequence::execute(&args, &config),
        Commands::Config => commands::config::execute(&config),
    }
}
