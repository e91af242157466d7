//! WikiScope CLI — rebuilds and queries the WikiProject scope index.
//!
//! Maps community quality-assessment categories to canonical project pages
//! and the discussion pages within each project's editorial scope.

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
