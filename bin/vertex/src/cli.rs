//! Command line interface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use vertex_swarm_topology::TopologyArgs;

/// Vertex - Swarm overlay topology tool
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// Logging configuration (applies to all subcommands).
    #[command(flatten)]
    pub(crate) logs: LogArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub(crate) command: Commands,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Drive a topology over an in-memory network and print its snapshot.
    Topology(TopologyCommand),
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Args)]
#[command(next_help_heading = "Logging")]
pub(crate) struct LogArgs {
    /// Silence all output.
    #[arg(short, long, global = true)]
    pub(crate) quiet: bool,

    /// Verbose mode (-v, -vv, -vvv, etc.).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub(crate) verbosity: u8,

    /// Log filter directive (e.g., "vertex_swarm_topology=debug").
    #[arg(long = "log.filter", value_name = "DIRECTIVE", global = true)]
    pub(crate) filter: Option<String>,
}

/// Arguments for the `topology` command.
#[derive(Debug, Clone, Args)]
pub(crate) struct TopologyCommand {
    /// Topology configuration file (TOML).
    #[arg(long, value_name = "FILE")]
    pub(crate) config: Option<PathBuf>,

    /// Number of full peers that connect.
    #[arg(long, default_value_t = 32, value_name = "COUNT")]
    pub(crate) peers: usize,

    /// Number of light nodes that connect.
    #[arg(long, default_value_t = 0, value_name = "COUNT")]
    pub(crate) light: usize,

    /// Probability that a connecting peer cannot be reached.
    #[arg(long, default_value_t = 0.0, value_parser = parse_probability, value_name = "RATE")]
    pub(crate) fail_rate: f64,

    /// Neighbourhood depth to report.
    #[arg(long, default_value_t = 0, value_name = "PO")]
    pub(crate) depth: u8,

    /// Seed for generated addresses and failures.
    #[arg(long, value_name = "SEED")]
    pub(crate) seed: Option<u64>,

    /// State database keeping known peers across runs.
    #[arg(long, value_name = "FILE")]
    pub(crate) state: Option<PathBuf>,

    /// Pretty-print the snapshot.
    #[arg(long)]
    pub(crate) pretty: bool,

    #[command(flatten)]
    pub(crate) topology: TopologyArgs,
}

fn parse_probability(s: &str) -> Result<f64, String> {
    let rate: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(format!("{rate} is not between 0 and 1"))
    }
}
