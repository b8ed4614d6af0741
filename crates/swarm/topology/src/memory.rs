//! In-memory transport (does not touch the network).
//!
//! Records every broadcast and disconnect so callers can inspect what the
//! topology asked the network to do. Used by tests and by the `vertex topology`
//! simulation.

use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::trace;
use vertex_swarm_primitives::OverlayAddress;

use crate::{ConnectionControl, Discovery, DiscoveryError, DisconnectError};

/// A recorded [`Discovery::broadcast_peers`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcast {
    /// The recipient.
    pub to: OverlayAddress,
    /// The peers sent.
    pub peers: Vec<OverlayAddress>,
    /// Whether delivery succeeded.
    pub delivered: bool,
}

/// In-memory [`Discovery`] and [`ConnectionControl`].
#[derive(Debug, Default)]
pub struct MemoryTransport {
    broadcasts: Mutex<Vec<Broadcast>>,
    disconnects: Mutex<Vec<OverlayAddress>>,
    unreachable: RwLock<HashSet<OverlayAddress>>,
    latency: RwLock<HashMap<OverlayAddress, Duration>>,
}

impl MemoryTransport {
    /// Create a transport that delivers everything immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make deliveries to `peer` fail.
    pub fn set_unreachable(&self, peer: OverlayAddress) {
        self.unreachable.write().insert(peer);
    }

    /// Make deliveries to `peer` succeed again.
    pub fn set_reachable(&self, peer: &OverlayAddress) {
        self.unreachable.write().remove(peer);
    }

    /// Delay every delivery to `peer` by `latency`.
    pub fn set_latency(&self, peer: OverlayAddress, latency: Duration) {
        self.latency.write().insert(peer, latency);
    }

    /// All broadcast attempts, in completion order.
    pub fn broadcasts(&self) -> Vec<Broadcast> {
        self.broadcasts.lock().clone()
    }

    /// Broadcast attempts addressed to `peer`.
    pub fn broadcasts_to(&self, peer: &OverlayAddress) -> Vec<Broadcast> {
        self.broadcasts
            .lock()
            .iter()
            .filter(|b| b.to == *peer)
            .cloned()
            .collect()
    }

    /// Peers disconnected so far, in call order.
    pub fn disconnects(&self) -> Vec<OverlayAddress> {
        self.disconnects.lock().clone()
    }

    /// Forget recorded broadcasts and disconnects.
    pub fn clear(&self) {
        self.broadcasts.lock().clear();
        self.disconnects.lock().clear();
    }
}

#[async_trait]
impl Discovery for MemoryTransport {
    async fn broadcast_peers(
        &self,
        to: OverlayAddress,
        peers: &[OverlayAddress],
    ) -> Result<(), DiscoveryError> {
        let latency = self.latency.read().get(&to).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let delivered = !self.unreachable.read().contains(&to);
        trace!(%to, count = peers.len(), delivered, "memory broadcast");

        self.broadcasts.lock().push(Broadcast {
            to,
            peers: peers.to_vec(),
            delivered,
        });

        if delivered {
            Ok(())
        } else {
            Err(DiscoveryError::Delivery {
                peer: to,
                reason: "peer unreachable".into(),
            })
        }
    }
}

#[async_trait]
impl ConnectionControl for MemoryTransport {
    async fn disconnect(&self, peer: &OverlayAddress) -> Result<(), DisconnectError> {
        trace!(%peer, "memory disconnect");
        self.disconnects.lock().push(*peer);
        Ok(())
    }
}
