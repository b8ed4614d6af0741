//! Command line arguments for the topology.

use std::time::Duration;

use clap::Args;

use crate::TopologyConfig;

/// Topology configuration overrides.
///
/// Unset arguments keep the value from the configuration file.
#[derive(Debug, Clone, Default, Args, PartialEq, Eq)]
#[command(next_help_heading = "Topology")]
pub struct TopologyArgs {
    /// Minimum neighbourhood size reported in snapshots.
    #[arg(long = "topology.low-watermark", value_name = "PEERS")]
    pub low_watermark: Option<usize>,

    /// Do not introduce newly connected light nodes to each other.
    #[arg(long = "topology.no-light-announce")]
    pub no_light_announce: bool,

    /// Upper bound for introducing the network to a new peer (e.g. "30s").
    #[arg(
        long = "topology.introduction-timeout",
        value_name = "DURATION",
        value_parser = humantime::parse_duration
    )]
    pub introduction_timeout: Option<Duration>,

    /// Grace period for outstanding gossip at shutdown (e.g. "5s").
    #[arg(
        long = "topology.drain-timeout",
        value_name = "DURATION",
        value_parser = humantime::parse_duration
    )]
    pub drain_timeout: Option<Duration>,
}

impl TopologyArgs {
    /// Apply the arguments on top of `config`.
    pub fn apply(&self, mut config: TopologyConfig) -> TopologyConfig {
        if let Some(low_watermark) = self.low_watermark {
            config.low_watermark = low_watermark;
        }
        if self.no_light_announce {
            config.announce_light_nodes = false;
        }
        if let Some(timeout) = self.introduction_timeout {
            config.announce.introduction_timeout = timeout;
        }
        if let Some(timeout) = self.drain_timeout {
            config.announce.drain_timeout = timeout;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        topology: TopologyArgs,
    }

    #[test]
    fn test_no_args_keeps_config() {
        let cli = Cli::parse_from(["vertex"]);
        let config = TopologyConfig::default().with_low_watermark(7);
        assert_eq!(cli.topology.apply(config.clone()), config);
    }

    #[test]
    fn test_args_override_config() {
        let cli = Cli::parse_from([
            "vertex",
            "--topology.low-watermark",
            "5",
            "--topology.no-light-announce",
            "--topology.drain-timeout",
            "250ms",
        ]);

        let config = cli.topology.apply(TopologyConfig::default());
        assert_eq!(config.low_watermark, 5);
        assert!(!config.announce_light_nodes);
        assert_eq!(config.announce.drain_timeout, Duration::from_millis(250));
        assert_eq!(
            config.announce.introduction_timeout,
            crate::config::DEFAULT_INTRODUCTION_TIMEOUT
        );
    }
}
