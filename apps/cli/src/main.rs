//! GraphQnA CLI: ask questions against hybrid retrieval engines.
//!
//! Classifies each question, routes it to the best-suited retrieval method
//! and falls back to the next one when the answer looks generic.

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
