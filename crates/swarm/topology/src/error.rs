//! Error types for topology operations.

use std::{path::PathBuf, time::Duration};

use vertex_swarm_primitives::OverlayAddress;
use vertex_tasks::DrainError;

/// Failure reported by a [`Discovery`](crate::Discovery) transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiscoveryError {
    /// The transport could not deliver the message.
    #[error("failed to deliver peers to {peer}: {reason}")]
    Delivery {
        /// The intended recipient.
        peer: OverlayAddress,
        /// Transport-specific description.
        reason: String,
    },
}

/// Failure reported by [`ConnectionControl::disconnect`](crate::ConnectionControl::disconnect).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to disconnect {peer}: {reason}")]
pub struct DisconnectError {
    /// The peer that could not be disconnected.
    pub peer: OverlayAddress,
    /// Transport-specific description.
    pub reason: String,
}

/// Failure to introduce the existing network to a newly connected peer.
///
/// The connection to the peer has already been torn down when this is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnnounceError {
    /// The discovery transport rejected the introduction.
    #[error("failed to introduce connected peers to {peer}")]
    Introduction {
        /// The newly connected peer.
        peer: OverlayAddress,
        /// The transport failure.
        #[source]
        source: DiscoveryError,
    },
    /// The introduction did not complete within the configured timeout.
    #[error("introducing connected peers to {peer} timed out after {timeout:?}")]
    Timeout {
        /// The newly connected peer.
        peer: OverlayAddress,
        /// The timeout that elapsed.
        timeout: Duration,
    },
}

impl AnnounceError {
    /// The peer whose introduction failed.
    pub fn peer(&self) -> OverlayAddress {
        match self {
            Self::Introduction { peer, .. } | Self::Timeout { peer, .. } => *peer,
        }
    }
}

/// Top-level error for the topology crate.
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    /// Announcing a new connection failed.
    #[error(transparent)]
    Announce(#[from] AnnounceError),
    /// Outstanding gossip did not finish within the grace period.
    #[error(transparent)]
    Drain(#[from] DrainError),
    /// A snapshot could not be serialized for presentation.
    #[error("failed to serialize topology snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        /// Path of the configuration file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration file is not valid TOML for [`TopologyConfig`](crate::TopologyConfig).
    #[error("invalid topology config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Result type for topology operations.
pub type TopologyResult<T> = Result<T, TopologyError>;
