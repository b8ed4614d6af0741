//! The `topology` command.
//!
//! Connects generated peers to a [`Kademlia`] topology over an in-memory
//! network and prints the resulting snapshot as JSON.

use std::sync::Arc;

use eyre::{Result, WrapErr};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{debug, info, warn};
use vertex_storage::StateStoreExt;
use vertex_storage_redb::RedbStateStore;
use vertex_swarm_primitives::{OverlayAddress, PeerKind};
use vertex_swarm_topology::{Kademlia, MemoryTransport, TopologyConfig, TopologySnapshot};

use crate::cli::TopologyCommand;

/// State key holding the known full peers.
const KNOWN_PEERS_KEY: &str = "topology_known_peers";

/// Run the command and print the snapshot.
pub(crate) async fn run(cmd: TopologyCommand) -> Result<()> {
    let pretty = cmd.pretty;
    let snapshot = simulate(cmd).await?;

    let json = if pretty {
        snapshot.to_json_pretty()?
    } else {
        snapshot.to_json()?
    };
    println!("{json}");
    Ok(())
}

async fn simulate(cmd: TopologyCommand) -> Result<TopologySnapshot> {
    let config = match &cmd.config {
        Some(path) => TopologyConfig::load(path)
            .wrap_err_with(|| format!("failed to load topology config: {}", path.display()))?,
        None => TopologyConfig::default(),
    };
    let config = cmd.topology.apply(config);
    debug!(?config, "topology config");

    let mut rng = match cmd.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let base = random_address(&mut rng);

    let transport = Arc::new(MemoryTransport::new());
    let kademlia = Kademlia::new(base, config, transport.clone(), transport.clone());
    info!(%base, "topology started");

    let store = match &cmd.state {
        Some(path) => Some(
            RedbStateStore::open(path)
                .wrap_err_with(|| format!("failed to open state database: {}", path.display()))?,
        ),
        None => None,
    };

    if let Some(store) = &store {
        let known: Vec<OverlayAddress> = store.get_opt(KNOWN_PEERS_KEY)?.unwrap_or_default();
        info!(count = known.len(), "loaded known peers");
        kademlia.add_peers(&known);
    }

    let mut failed = 0;
    for (kind, count) in [(PeerKind::Full, cmd.peers), (PeerKind::Light, cmd.light)] {
        for _ in 0..count {
            let peer = random_address(&mut rng);
            if rng.random_bool(cmd.fail_rate) {
                transport.set_unreachable(peer);
            }
            if kind.is_full() {
                kademlia.add_peers(&[peer]);
            }
            if let Err(err) = kademlia.connected(peer, kind).await {
                debug!(%peer, %kind, error = %err, "connection dropped");
                failed += 1;
            }
        }
    }

    kademlia.set_depth(cmd.depth);

    if let Err(err) = kademlia.shutdown().await {
        warn!(error = %err, "announcements still outstanding");
    }

    if let Some(store) = &store {
        let known = kademlia.known_peers().peers();
        store.put(KNOWN_PEERS_KEY, &known)?;
        debug!(count = known.len(), "saved known peers");
    }

    kademlia.log_status();
    let stats = kademlia.stats();
    info!(
        known = stats.known_peers,
        connected = stats.connected_peers,
        light = stats.light_nodes,
        failed,
        gossip = transport.broadcasts().len(),
        "topology finished"
    );

    Ok(kademlia.snapshot())
}

fn random_address<R: Rng>(rng: &mut R) -> OverlayAddress {
    OverlayAddress::from(rng.random::<[u8; 32]>())
}
