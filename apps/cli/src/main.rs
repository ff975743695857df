//! recap CLI — meeting transcripts to action items and resources.
//!
//! Parses transcripts into per-speaker timelines, extracts owned action
//! items with due weeks, and recommends catalog resources for each.

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
