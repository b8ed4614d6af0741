//! Kademlia topology driver.
//!
//! Routes connection lifecycle events into the proximity indices, announces
//! new connections and builds [`TopologySnapshot`]s.
//!
//! The driver maintains two proximity indices of full peers, bucketed by
//! proximity to the base address:
//! - `known`: every full peer discovered or ever connected
//! - `connected`: full peers with an open connection
//!
//! Light nodes are tracked separately in a [`PeerMembership`] and are
//! announced to each other unless [`TopologyConfig::announce_light_nodes`] is
//! cleared. An address is tracked under one kind at a time; connecting under
//! the other kind moves it.
//!
//! Depth is computed elsewhere and handed in through [`Kademlia::set_depth`].

use std::{
    convert::Infallible,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
};

use chrono::Utc;
use tracing::{debug, info, trace, warn};
use vertex_swarm_primitives::{MAX_PO, OverlayAddress, PeerKind};
use vertex_tasks::DrainError;

use crate::{
    AnnounceError, Announcer, ConnectionControl, Discovery, PSlice, PeerMembership,
    SnapshotProvider, TopologyConfig, TopologySnapshot, Visit,
};

/// Kademlia-style topology of the local node.
pub struct Kademlia {
    base: OverlayAddress,
    known: PSlice,
    connected: PSlice,
    light: PeerMembership,
    announcer: Announcer,
    depth: AtomicU8,
    config: TopologyConfig,
}

impl fmt::Debug for Kademlia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kademlia")
            .field("base", &self.base)
            .field("depth", &self.depth())
            .field("known", &self.known.len())
            .field("connected", &self.connected.len())
            .field("light", &self.light.connected_peers().len())
            .finish_non_exhaustive()
    }
}

impl Kademlia {
    /// Create a topology for the node at `base`.
    pub fn new(
        base: OverlayAddress,
        config: TopologyConfig,
        discovery: Arc<dyn Discovery>,
        p2p: Arc<dyn ConnectionControl>,
    ) -> Arc<Self> {
        Arc::new(Self {
            base,
            known: PSlice::new(),
            connected: PSlice::new(),
            light: PeerMembership::new(),
            announcer: Announcer::new(discovery, p2p, config.announce),
            depth: AtomicU8::new(0),
            config,
        })
    }

    pub fn base(&self) -> OverlayAddress {
        self.base
    }

    pub fn config(&self) -> &TopologyConfig {
        &self.config
    }

    /// The announcer, e.g. to rebind its collaborators.
    pub fn announcer(&self) -> &Announcer {
        &self.announcer
    }

    /// Discovered and previously connected full peers.
    pub fn known_peers(&self) -> &PSlice {
        &self.known
    }

    /// Connected full peers.
    pub fn connected_peers(&self) -> &PSlice {
        &self.connected
    }

    /// Light node container.
    pub fn light_nodes(&self) -> &PeerMembership {
        &self.light
    }

    /// Current neighbourhood depth.
    pub fn depth(&self) -> u8 {
        self.depth.load(Ordering::Relaxed)
    }

    /// Update the neighbourhood depth, capped at [`MAX_PO`].
    pub fn set_depth(&self, depth: u8) {
        let new_depth = depth.min(MAX_PO);
        let old_depth = self.depth.swap(new_depth, Ordering::Relaxed);
        if old_depth != new_depth {
            info!(old_depth, new_depth, "kademlia depth changed");
            self.log_status();
        }
    }

    fn proximity(&self, peer: &OverlayAddress) -> u8 {
        self.base.proximity(peer)
    }

    /// Record discovered full peers. The base address is ignored.
    pub fn add_peers(&self, peers: &[OverlayAddress]) {
        let mut added = 0;
        for peer in peers.iter().filter(|peer| **peer != self.base) {
            if self.known.add(*peer, self.proximity(peer)) {
                added += 1;
            }
        }

        if added > 0 {
            debug!(added, total = self.known.len(), "added known peers");
        }
    }

    /// Handle a new connection and announce it.
    ///
    /// If the announcement fails the connection has been torn down and the
    /// peer is no longer counted as connected.
    pub async fn connected(&self, peer: OverlayAddress, kind: PeerKind) -> Result<(), AnnounceError> {
        if peer == self.base {
            warn!(%peer, "ignoring connection to self");
            return Ok(());
        }

        match kind {
            PeerKind::Full => self.full_connected(peer).await,
            PeerKind::Light => self.light_connected(peer).await,
        }
    }

    async fn full_connected(&self, peer: OverlayAddress) -> Result<(), AnnounceError> {
        if self.light.remove(&peer) {
            debug!(%peer, "light node reconnected as full peer");
        }

        let po = self.proximity(&peer);
        self.known.add(peer, po);
        if !self.connected.add(peer, po) {
            trace!(%peer, "peer already connected");
        }

        debug!(%peer, po, connected = self.connected.len(), "peer connected");

        if let Err(err) = self.announcer.announce(&self.connected, peer).await {
            self.connected.remove(&peer, po);
            return Err(err);
        }
        Ok(())
    }

    async fn light_connected(&self, peer: OverlayAddress) -> Result<(), AnnounceError> {
        if let Some(po) = self.connected.get_po(&peer) {
            self.connected.remove(&peer, po);
            debug!(%peer, po, "full peer reconnected as light node");
        }

        self.light.connected(peer);
        debug!(%peer, light = self.light.connected_peers().len(), "light node connected");

        if !self.config.announce_light_nodes {
            return Ok(());
        }

        if let Err(err) = self.announcer.announce(self.light.connected_peers(), peer).await {
            self.light.disconnected(&peer);
            return Err(err);
        }
        Ok(())
    }

    /// Handle a closed connection.
    pub fn disconnected(&self, peer: &OverlayAddress) {
        if let Some(po) = self.connected.get_po(peer) {
            self.connected.remove(peer, po);
            debug!(%peer, po, connected = self.connected.len(), "peer disconnected");
        }
        self.light.disconnected(peer);
    }

    /// Take a snapshot of the current topology.
    pub fn snapshot(&self) -> TopologySnapshot {
        let mut snapshot = TopologySnapshot::new(Utc::now());
        snapshot.set_base(&self.base);
        snapshot.set_population(self.known.len());
        snapshot.set_connected(self.connected.len());
        snapshot.set_nn_low_watermark(self.config.low_watermark);
        snapshot.set_depth(self.depth());

        // connected first, so known peers that are connected are not listed twice
        let Ok(()) = self.connected.each_bin(|peer, po| {
            snapshot.record_connected_bin(peer, po);
            Ok::<_, Infallible>(Visit::Continue)
        });
        let Ok(()) = self.known.each_bin(|peer, po| {
            snapshot.record_disconnected_bin(peer, po);
            Ok::<_, Infallible>(Visit::Continue)
        });

        snapshot.set_light_nodes(self.light.bin_info());
        snapshot
    }

    /// Get statistics about the topology.
    pub fn stats(&self) -> TopologyStats {
        TopologyStats {
            known_peers: self.known.len(),
            connected_peers: self.connected.len(),
            light_nodes: self.light.connected_peers().len(),
            depth: self.depth(),
            pending_announcements: self.announcer.pending(),
        }
    }

    /// Log the current topology status showing bin populations.
    ///
    /// Format: `po:connected/known` for non-empty bins, depth bin in brackets.
    pub fn log_status(&self) {
        let connected_bins = self.connected.bin_sizes();
        let known_bins = self.known.bin_sizes();
        let depth = self.depth();

        let mut bin_status = String::new();
        for (po, (c, k)) in connected_bins.iter().zip(known_bins.iter()).enumerate() {
            if *c == 0 && *k == 0 {
                continue;
            }
            if !bin_status.is_empty() {
                bin_status.push(' ');
            }
            if po == depth as usize {
                bin_status.push_str(&format!("[{po}:{c}/{k}]"));
            } else {
                bin_status.push_str(&format!("{po}:{c}/{k}"));
            }
        }

        if bin_status.is_empty() {
            bin_status = "(empty)".to_string();
        }

        debug!(
            depth,
            connected = self.connected.len(),
            known = self.known.len(),
            light = self.light.connected_peers().len(),
            bins = %bin_status,
            "kademlia topology"
        );
    }

    /// Wait for outstanding announcements within the configured grace period.
    pub async fn shutdown(&self) -> Result<(), DrainError> {
        let pending = self.announcer.pending();
        if pending > 0 {
            info!(pending, "draining outstanding announcements");
        }
        self.announcer.drain().await
    }
}

impl SnapshotProvider for Kademlia {
    fn snapshot(&self) -> TopologySnapshot {
        Kademlia::snapshot(self)
    }
}

/// Statistics about the topology state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyStats {
    /// Number of known full peers, connected or not.
    pub known_peers: usize,
    /// Number of connected full peers.
    pub connected_peers: usize,
    /// Number of connected light nodes.
    pub light_nodes: usize,
    /// Current neighbourhood depth.
    pub depth: u8,
    /// Gossip notifications still in flight.
    pub pending_announcements: usize,
}
