//! Capabilities the topology consumes from the network layer.

use async_trait::async_trait;
use vertex_swarm_primitives::OverlayAddress;

use crate::{DiscoveryError, DisconnectError};

/// Peer discovery transport (the hive protocol).
#[async_trait]
pub trait Discovery: Send + Sync + 'static {
    /// Tell `to` about `peers`.
    ///
    /// Cancelled by dropping the returned future.
    async fn broadcast_peers(
        &self,
        to: OverlayAddress,
        peers: &[OverlayAddress],
    ) -> Result<(), DiscoveryError>;
}

/// Control over established connections.
#[async_trait]
pub trait ConnectionControl: Send + Sync + 'static {
    /// Forcibly close the connection to `peer`.
    async fn disconnect(&self, peer: &OverlayAddress) -> Result<(), DisconnectError>;
}
