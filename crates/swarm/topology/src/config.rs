//! Topology configuration.
//!
//! # Settings
//!
//! - **Low watermark** (`low_watermark`, default 3): minimum neighbourhood size
//!   used by the routing layer to derive depth. The topology only reports it.
//!
//! - **Light node announcements** (`announce_light_nodes`, default on): newly
//!   connected light nodes are introduced to the other connected light nodes.
//!   Light nodes are never announced to full peers.
//!
//! - **Introduction timeout** (`announce.introduction_timeout`, default 30s):
//!   upper bound for introducing the connected network to a new peer.
//!
//! - **Drain timeout** (`announce.drain_timeout`, default 5s): grace period for
//!   outstanding gossip at shutdown.
//!
//! Durations are written as humantime strings in TOML (`"5s"`, `"1m 30s"`).

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{TopologyError, TopologyResult};

/// Default minimum neighbourhood size reported in snapshots.
pub const DEFAULT_LOW_WATERMARK: usize = 3;

/// Default bound for introducing the network to a new peer.
pub const DEFAULT_INTRODUCTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Default grace period for outstanding gossip at shutdown.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = vertex_tasks::DEFAULT_DRAIN_TIMEOUT;

/// Configuration for the topology driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Minimum neighbourhood size, reported as `nnLowWatermark`.
    pub low_watermark: usize,

    /// Introduce newly connected light nodes to the other light nodes.
    pub announce_light_nodes: bool,

    /// Announce protocol settings.
    pub announce: AnnounceConfig,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            low_watermark: DEFAULT_LOW_WATERMARK,
            announce_light_nodes: true,
            announce: AnnounceConfig::default(),
        }
    }
}

impl TopologyConfig {
    /// Parse a configuration from TOML. Missing fields take their defaults.
    pub fn from_toml_str(s: &str) -> TopologyResult<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> TopologyResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| {
            TopologyError::ConfigRead {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Self::from_toml_str(&contents)
    }

    /// Set the low watermark.
    pub fn with_low_watermark(mut self, count: usize) -> Self {
        self.low_watermark = count;
        self
    }

    /// Enable or disable light node announcements.
    pub fn with_announce_light_nodes(mut self, enabled: bool) -> Self {
        self.announce_light_nodes = enabled;
        self
    }

    /// Set the announce protocol settings.
    pub fn with_announce(mut self, announce: AnnounceConfig) -> Self {
        self.announce = announce;
        self
    }
}

/// Configuration for the [`Announcer`](crate::Announcer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnounceConfig {
    /// Upper bound for the synchronous introduction of a new peer.
    /// Elapsing counts as a failed introduction.
    #[serde(with = "humantime_duration")]
    pub introduction_timeout: Duration,

    /// Grace period for outstanding gossip at shutdown.
    #[serde(with = "humantime_duration")]
    pub drain_timeout: Duration,
}

impl Default for AnnounceConfig {
    fn default() -> Self {
        Self {
            introduction_timeout: DEFAULT_INTRODUCTION_TIMEOUT,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

impl AnnounceConfig {
    /// Set the introduction timeout.
    pub fn with_introduction_timeout(mut self, timeout: Duration) -> Self {
        self.introduction_timeout = timeout;
        self
    }

    /// Set the drain grace period.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }
}

mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&humantime::format_duration(*d))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(d)?;
        humantime::parse_duration(&s).map_err(D::Error::custom)
    }
}
