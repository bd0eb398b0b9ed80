//! csvagent CLI: ask questions about ZIP archives of fiscal CSV files.
//!
//! Unpacks and merges the CSVs, has a language model write SQL for the
//! question, runs it on an embedded engine, and prints a written answer.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let env_file = commands::load_env_file();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    if let Some(path) = env_file {
        tracing::debug!(path = %path.display(), "loaded .env");
    }
    commands::run(cli).await
}
