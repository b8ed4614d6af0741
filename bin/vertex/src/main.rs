//! Vertex Swarm topology tool.

mod cli;
mod logging;
mod topology;

use clap::Parser;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    logging::init_logging(&cli.logs)?;

    match cli.command {
        Commands::Topology(cmd) => topology::run(cmd).await,
    }
}
