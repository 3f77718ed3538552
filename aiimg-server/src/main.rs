//! aiimg - command line front end for the generation engine.
//!
//! - `aiimg generate` runs admit → execute → save → deliver once
//! - `aiimg receive` serves the push protocol for remote delivery
//! - `aiimg cleanup` reclaims expired artifacts
//! - `aiimg config` inspects the effective configuration

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod config_commands;
mod logging;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(&cli.log_level, cli.log_dir.as_deref())?;

    let source = commands::ConfigSource::resolve(cli.config)?;

    match cli.command {
        Commands::Generate { group, session, sender, images, json, prompt } => {
            let args = commands::GenerateArgs { group, session, sender, images, prompt, json };
            commands::handle_generate(&source, args).await
        },
        Commands::Receive { bind, dir } => commands::handle_receive(&source, bind, dir).await,
        Commands::Cleanup => commands::handle_cleanup(&source).await,
        Commands::Config(cmd) => config_commands::handle_config_command(&source, cmd),
    }
}
