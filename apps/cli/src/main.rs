//! Clausier CLI: contract assembly from a clause library.
//!
//! Grafts clause documents into a template, section by section, and
//! optionally adds an AI-generated summary of the result.

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
