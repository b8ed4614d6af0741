//! Announcing newly connected peers.
//!
//! When a peer connects, every already connected peer is told about it and
//! the new peer is told about all of them:
//!
//! - Each existing peer gets its own detached notification, tracked by a
//!   [`TaskGroup`]. These are best effort: failures are logged and counted,
//!   never returned, and they keep running if the caller is cancelled.
//! - The new peer gets the whole list in a single call made from the caller's
//!   future. If that fails or times out the connection is torn down and the
//!   error is returned.

use std::{convert::Infallible, fmt, sync::Arc};

use metrics::Counter;
use parking_lot::RwLock;
use tracing::{debug, trace, warn};
use vertex_swarm_primitives::OverlayAddress;
use vertex_tasks::{DrainError, TaskGroup};

use crate::{AnnounceConfig, AnnounceError, BinOrder, ConnectionControl, Discovery, PSlice, Visit};

/// Order in which connected bins are walked when collecting peers to introduce.
///
/// Deepest bins first, so the new peer hears about its closest neighbours
/// before distant peers.
pub const ANNOUNCE_BIN_ORDER: BinOrder = BinOrder::Descending;

#[derive(Clone)]
struct AnnounceMetrics {
    gossip_sent: Counter,
    gossip_failed: Counter,
    introductions_sent: Counter,
    introductions_failed: Counter,
}

impl AnnounceMetrics {
    fn new() -> Self {
        Self {
            gossip_sent: metrics::counter!("topology.announce.gossip_sent"),
            gossip_failed: metrics::counter!("topology.announce.gossip_failed"),
            introductions_sent: metrics::counter!("topology.announce.introductions_sent"),
            introductions_failed: metrics::counter!("topology.announce.introductions_failed"),
        }
    }
}

/// Gossips new connections to the rest of the network.
pub struct Announcer {
    discovery: RwLock<Arc<dyn Discovery>>,
    p2p: RwLock<Arc<dyn ConnectionControl>>,
    config: AnnounceConfig,
    tasks: TaskGroup,
    metrics: AnnounceMetrics,
}

impl fmt::Debug for Announcer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Announcer")
            .field("config", &self.config)
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

impl Announcer {
    /// Create an announcer over the given collaborators.
    pub fn new(
        discovery: Arc<dyn Discovery>,
        p2p: Arc<dyn ConnectionControl>,
        config: AnnounceConfig,
    ) -> Self {
        Self {
            discovery: RwLock::new(discovery),
            p2p: RwLock::new(p2p),
            config,
            tasks: TaskGroup::new("announce"),
            metrics: AnnounceMetrics::new(),
        }
    }

    /// Replace the discovery transport used by subsequent announcements.
    pub fn set_discovery(&self, discovery: Arc<dyn Discovery>) {
        *self.discovery.write() = discovery;
    }

    /// Replace the connection control used by subsequent announcements.
    pub fn set_connection_control(&self, p2p: Arc<dyn ConnectionControl>) {
        *self.p2p.write() = p2p;
    }

    pub fn config(&self) -> &AnnounceConfig {
        &self.config
    }

    /// Number of detached notifications still in flight.
    pub fn pending(&self) -> usize {
        self.tasks.active()
    }

    /// Announce `peer` to the peers in `connected` and introduce them to it.
    ///
    /// `peer` itself is skipped if already present in `connected`. With no
    /// other peers this succeeds without contacting anyone.
    ///
    /// Dropping the returned future cancels the introduction without
    /// disconnecting the peer; notifications already dispatched keep running.
    pub async fn announce(
        &self,
        connected: &PSlice,
        peer: OverlayAddress,
    ) -> Result<(), AnnounceError> {
        let mut peers = Vec::with_capacity(connected.len());
        let Ok(()) = connected.each_bin_in(ANNOUNCE_BIN_ORDER, |addr, _| {
            if *addr != peer {
                peers.push(*addr);
            }
            Ok::<_, Infallible>(Visit::Continue)
        });

        let discovery = self.discovery.read().clone();
        for &to in &peers {
            self.gossip(discovery.clone(), to, peer);
        }

        if peers.is_empty() {
            trace!(%peer, "no connected peers to introduce");
            return Ok(());
        }

        let timeout = self.config.introduction_timeout;
        let result =
            match tokio::time::timeout(timeout, discovery.broadcast_peers(peer, &peers)).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(source)) => Err(AnnounceError::Introduction { peer, source }),
                Err(_) => Err(AnnounceError::Timeout { peer, timeout }),
            };

        match result {
            Ok(()) => {
                self.metrics.introductions_sent.increment(1);
                debug!(%peer, count = peers.len(), "introduced connected peers");
                Ok(())
            }
            Err(err) => {
                self.metrics.introductions_failed.increment(1);
                warn!(%peer, error = %err, "introduction failed, disconnecting");
                self.disconnect(&peer).await;
                Err(err)
            }
        }
    }

    /// Wait up to the configured drain timeout for outstanding notifications.
    pub async fn drain(&self) -> Result<(), DrainError> {
        self.tasks.drain(self.config.drain_timeout).await
    }

    fn gossip(&self, discovery: Arc<dyn Discovery>, to: OverlayAddress, about: OverlayAddress) {
        let metrics = self.metrics.clone();
        self.tasks.spawn(async move {
            match discovery.broadcast_peers(to, &[about]).await {
                Ok(()) => {
                    metrics.gossip_sent.increment(1);
                    trace!(%to, peer = %about, "gossiped new peer");
                }
                Err(err) => {
                    metrics.gossip_failed.increment(1);
                    debug!(%to, peer = %about, error = %err, "gossip failed");
                }
            }
        });
    }

    async fn disconnect(&self, peer: &OverlayAddress) {
        let p2p = self.p2p.read().clone();
        if let Err(err) = p2p.disconnect(peer).await {
            warn!(%peer, error = %err, "failed to disconnect peer");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DiscoveryError, MemoryTransport};
    use std::time::Duration;
    use tokio::time::Instant;

    fn addr_from_byte(b: u8) -> OverlayAddress {
        let mut bytes = [0u8; 32];
        bytes[0] = b;
        OverlayAddress::from(bytes)
    }

    fn base() -> OverlayAddress {
        OverlayAddress::ZERO
    }

    fn connect(pslice: &PSlice, peer: OverlayAddress) {
        pslice.add(peer, base().proximity(&peer));
    }

    fn announcer(transport: &Arc<MemoryTransport>, config: AnnounceConfig) -> Announcer {
        Announcer::new(transport.clone(), transport.clone(), config)
    }

    #[tokio::test]
    async fn test_no_connected_peers() {
        let transport = Arc::new(MemoryTransport::new());
        let announcer = announcer(&transport, AnnounceConfig::default());
        let connected = PSlice::new();

        announcer.announce(&connected, addr_from_byte(0x80)).await.unwrap();
        announcer.drain().await.unwrap();

        assert!(transport.broadcasts().is_empty());
        assert!(transport.disconnects().is_empty());
    }

    #[tokio::test]
    async fn test_only_self_connected() {
        let transport = Arc::new(MemoryTransport::new());
        let announcer = announcer(&transport, AnnounceConfig::default());
        let connected = PSlice::new();
        let peer = addr_from_byte(0x80);
        connect(&connected, peer);

        announcer.announce(&connected, peer).await.unwrap();
        announcer.drain().await.unwrap();

        assert!(transport.broadcasts().is_empty());
    }

    #[tokio::test]
    async fn test_gossip_and_introduction() {
        let transport = Arc::new(MemoryTransport::new());
        let announcer = announcer(&transport, AnnounceConfig::default());
        let connected = PSlice::new();

        let p1 = addr_from_byte(0x80);
        let p2 = addr_from_byte(0x40);
        let p3 = addr_from_byte(0x20);
        connect(&connected, p1);
        connect(&connected, p2);

        announcer.announce(&connected, p3).await.unwrap();
        announcer.drain().await.unwrap();

        assert_eq!(transport.broadcasts().len(), 3);
        for existing in [p1, p2] {
            let sent = transport.broadcasts_to(&existing);
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].peers, vec![p3]);
        }

        let intro = transport.broadcasts_to(&p3);
        assert_eq!(intro.len(), 1);
        // p2 (po 1) is deeper than p1 (po 0)
        assert_eq!(intro[0].peers, vec![p2, p1]);
        assert!(transport.disconnects().is_empty());
    }

    #[tokio::test]
    async fn test_failed_introduction_disconnects() {
        let transport = Arc::new(MemoryTransport::new());
        let announcer = announcer(&transport, AnnounceConfig::default());
        let connected = PSlice::new();

        let p1 = addr_from_byte(0x80);
        let p2 = addr_from_byte(0x40);
        let p3 = addr_from_byte(0x20);
        connect(&connected, p1);
        connect(&connected, p2);
        transport.set_unreachable(p3);

        let err = announcer.announce(&connected, p3).await.unwrap_err();
        announcer.drain().await.unwrap();

        assert_eq!(
            err,
            AnnounceError::Introduction {
                peer: p3,
                source: DiscoveryError::Delivery {
                    peer: p3,
                    reason: "peer unreachable".into(),
                },
            }
        );
        assert_eq!(transport.disconnects(), vec![p3]);
        // gossip to the existing peers is unaffected
        assert_eq!(transport.broadcasts_to(&p1).len(), 1);
        assert_eq!(transport.broadcasts_to(&p2).len(), 1);
    }

    #[tokio::test]
    async fn test_failed_gossip_is_ignored() {
        let transport = Arc::new(MemoryTransport::new());
        let announcer = announcer(&transport, AnnounceConfig::default());
        let connected = PSlice::new();

        let p1 = addr_from_byte(0x80);
        let p2 = addr_from_byte(0x40);
        connect(&connected, p1);
        transport.set_unreachable(p1);

        announcer.announce(&connected, p2).await.unwrap();
        announcer.drain().await.unwrap();

        let gossip = transport.broadcasts_to(&p1);
        assert_eq!(gossip.len(), 1);
        assert!(!gossip[0].delivered);
        assert!(transport.disconnects().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_peer_does_not_delay_caller() {
        let transport = Arc::new(MemoryTransport::new());
        let config = AnnounceConfig::default().with_drain_timeout(Duration::from_secs(5));
        let announcer = announcer(&transport, config);
        let connected = PSlice::new();

        let slow = addr_from_byte(0x80);
        let peer = addr_from_byte(0x40);
        connect(&connected, slow);
        transport.set_latency(slow, Duration::from_secs(60));

        let start = Instant::now();
        announcer.announce(&connected, peer).await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(60));
        assert_eq!(announcer.pending(), 1);

        let err = announcer.drain().await.unwrap_err();
        assert_eq!(
            err,
            DrainError::Timeout {
                group: "announce",
                remaining: 1,
                timeout: Duration::from_secs(5),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_introduction_timeout_disconnects() {
        let transport = Arc::new(MemoryTransport::new());
        let timeout = Duration::from_secs(1);
        let config = AnnounceConfig::default().with_introduction_timeout(timeout);
        let announcer = announcer(&transport, config);
        let connected = PSlice::new();

        let p1 = addr_from_byte(0x80);
        let p2 = addr_from_byte(0x40);
        connect(&connected, p1);
        transport.set_latency(p2, Duration::from_secs(60));

        let err = announcer.announce(&connected, p2).await.unwrap_err();

        assert_eq!(err, AnnounceError::Timeout { peer: p2, timeout });
        assert_eq!(err.peer(), p2);
        assert_eq!(transport.disconnects(), vec![p2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_caller_keeps_gossip() {
        let transport = Arc::new(MemoryTransport::new());
        let announcer = announcer(&transport, AnnounceConfig::default());
        let connected = PSlice::new();

        let p1 = addr_from_byte(0x80);
        let p2 = addr_from_byte(0x40);
        connect(&connected, p1);
        transport.set_latency(p1, Duration::from_secs(1));
        transport.set_latency(p2, Duration::from_secs(10));

        let cancelled = tokio::time::timeout(
            Duration::from_millis(100),
            announcer.announce(&connected, p2),
        )
        .await;
        assert!(cancelled.is_err());

        announcer.drain().await.unwrap();

        assert_eq!(transport.broadcasts_to(&p1).len(), 1);
        assert!(transport.broadcasts_to(&p2).is_empty());
        assert!(transport.disconnects().is_empty());
    }

    #[tokio::test]
    async fn test_set_discovery_replaces_transport() {
        let first = Arc::new(MemoryTransport::new());
        let second = Arc::new(MemoryTransport::new());
        let announcer = announcer(&first, AnnounceConfig::default());
        let connected = PSlice::new();

        let p1 = addr_from_byte(0x80);
        connect(&connected, p1);

        announcer.set_discovery(second.clone());
        announcer.set_connection_control(second.clone());
        second.set_unreachable(addr_from_byte(0x40));

        assert!(announcer.announce(&connected, addr_from_byte(0x40)).await.is_err());
        announcer.drain().await.unwrap();

        assert!(first.broadcasts().is_empty());
        assert!(first.disconnects().is_empty());
        assert_eq!(second.broadcasts().len(), 2);
        assert_eq!(second.disconnects(), vec![addr_from_byte(0x40)]);
    }
}
