//! Connected and disconnected peer tracking without proximity bucketing.
//!
//! [`PeerMembership`] keeps every peer in a single default bin; the routing
//! table that buckets by proximity lives in [`Kademlia`](crate::Kademlia).
//! The topology driver uses it as the light node container.

use tracing::trace;
use vertex_swarm_primitives::OverlayAddress;

use crate::{BinInfo, PSlice};

/// The bin every peer is stored in.
pub const DEFAULT_BIN: u8 = 0;

/// Tracks which peers are connected and which were connected before.
///
/// A peer is never in both sets, provided `connected`/`disconnected` calls
/// for the same peer do not race each other.
#[derive(Debug, Default)]
pub struct PeerMembership {
    connected: PSlice,
    disconnected: PSlice,
}

impl PeerMembership {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `peer` connected.
    pub fn connected(&self, peer: OverlayAddress) {
        self.connected.add(peer, DEFAULT_BIN);
        self.disconnected.remove(&peer, DEFAULT_BIN);
        trace!(%peer, connected = self.connected.len(), "membership: peer connected");
    }

    /// Record that `peer` disconnected.
    ///
    /// Ignored unless the peer is currently connected, so spurious or repeated
    /// notifications never add peers to the disconnected set.
    pub fn disconnected(&self, peer: &OverlayAddress) {
        if self.connected.exists(peer) {
            self.connected.remove(peer, DEFAULT_BIN);
            self.disconnected.add(*peer, DEFAULT_BIN);
            trace!(%peer, "membership: peer disconnected");
        }
    }

    /// Forget `peer` in both sets. Returns whether it was tracked.
    pub fn remove(&self, peer: &OverlayAddress) -> bool {
        let connected = self.connected.remove(peer, DEFAULT_BIN);
        let disconnected = self.disconnected.remove(peer, DEFAULT_BIN);
        connected || disconnected
    }

    /// Whether `peer` is currently connected.
    pub fn is_connected(&self, peer: &OverlayAddress) -> bool {
        self.connected.exists(peer)
    }

    /// The connected peers index.
    pub fn connected_peers(&self) -> &PSlice {
        &self.connected
    }

    /// The previously connected peers index.
    pub fn disconnected_peers(&self) -> &PSlice {
        &self.disconnected
    }

    /// Aggregate view of both sets.
    ///
    /// `population` reports the connected count, the same as `connected`.
    pub fn bin_info(&self) -> BinInfo {
        let connected = self.connected.len();
        BinInfo {
            population: connected,
            connected,
            disconnected_peers: to_strings(&self.disconnected),
            connected_peers: to_strings(&self.connected),
        }
    }
}

fn to_strings(pslice: &PSlice) -> Vec<String> {
    pslice.peers().iter().map(ToString::to_string).collect()
}
