//! ## meshload-cli
//! **Command-line front end**
//!
//! `run` drives live traffic for one service and `serve` acts as one.
//! `check` validates a topology file and `graphviz` renders it to DOT.

use clap::Parser;

mod commands;
mod error;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    commands::run_command(cli).await?;
    Ok(())
}
