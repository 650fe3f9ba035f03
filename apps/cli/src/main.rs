//! Songbook CLI: builds a song catalog from a lyrics data file.
//!
//! Extracts lyric blocks, derives titles, deduplicates, optionally enriches
//! each song through a hosted model, and writes `songs.json`.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
