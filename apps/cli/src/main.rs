//! Company enricher CLI.
//!
//! Fills missing company fields from a search-grounded LLM, normalizes them
//! with a structured-output model and appends the results to the warehouse,
//! one chunk at a time.

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
