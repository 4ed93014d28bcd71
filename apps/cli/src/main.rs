//! Evana CLI: plan an event from a free-text description.
//!
//! Runs the seven-stage planning pipeline against an OpenAI-compatible model
//! and prints the aggregate result as JSON.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
