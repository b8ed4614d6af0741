//! Swarm overlay topology.
//!
//! Tracks which peers this node knows and is connected to, gossips new
//! connections to the rest of the network, and produces point-in-time
//! snapshots for observability.
//!
//! # Components
//!
//! - [`PSlice`]: proximity-bucketed set of overlay addresses
//! - [`PeerMembership`]: connected/disconnected tracking in a single bin, used for light nodes
//! - [`Announcer`]: push gossip on new connections
//! - [`Kademlia`]: driver tying the above to connection lifecycle events
//! - [`TopologySnapshot`]: serializable view of the topology
//!
//! The network layer is reached through the [`Discovery`] and
//! [`ConnectionControl`] capabilities. [`MemoryTransport`] implements both
//! in memory for tests and simulation.

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod config;

mod announce;
mod args;
mod discovery;
mod error;
mod kademlia;
mod membership;
mod memory;
mod pslice;
mod snapshot;

pub use announce::{ANNOUNCE_BIN_ORDER, Announcer};
pub use args::TopologyArgs;
pub use config::{AnnounceConfig, TopologyConfig};
pub use discovery::{ConnectionControl, Discovery};
pub use error::{AnnounceError, DisconnectError, DiscoveryError, TopologyError, TopologyResult};
pub use kademlia::{Kademlia, TopologyStats};
pub use membership::{DEFAULT_BIN, PeerMembership};
pub use memory::{Broadcast, MemoryTransport};
pub use pslice::{BinOrder, PSlice, Visit};
pub use snapshot::{BinInfo, Bins, SnapshotProvider, TopologySnapshot};

pub use vertex_swarm_primitives::{MAX_BINS, MAX_PO, OverlayAddress, PeerKind};
