//! End-to-end flows through the topology driver.

use std::{io::Write, sync::Arc, time::Duration};

use serde_json::Value;
use vertex_swarm_topology::{
    AnnounceError, Kademlia, MAX_BINS, MemoryTransport, OverlayAddress, PeerKind, TopologyConfig,
};

fn addr(first: u8, second: u8) -> OverlayAddress {
    let mut bytes = [0u8; 32];
    bytes[0] = first;
    bytes[1] = second;
    OverlayAddress::from(bytes)
}

fn setup(config: TopologyConfig) -> (Arc<Kademlia>, Arc<MemoryTransport>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("vertex_swarm_topology=debug")
        .with_test_writer()
        .try_init();

    let transport = Arc::new(MemoryTransport::new());
    let kad = Kademlia::new(OverlayAddress::ZERO, config, transport.clone(), transport.clone());
    (kad, transport)
}

#[tokio::test]
async fn every_connected_peer_learns_about_newcomer() {
    let (kad, transport) = setup(TopologyConfig::default());
    let peers: Vec<_> = (0..6).map(|i| addr(0x80 >> i, 0)).collect();

    for peer in &peers {
        kad.connected(*peer, PeerKind::Full).await.unwrap();
    }
    kad.shutdown().await.unwrap();

    for (i, peer) in peers.iter().enumerate() {
        let received = transport.broadcasts_to(peer);
        // one introduction (unless first) plus one gossip per later peer
        let expected = usize::from(i > 0) + (peers.len() - i - 1);
        assert_eq!(received.len(), expected, "peer {i}");
    }

    // the last peer is introduced to all others, closest first
    let last = peers[5];
    let intro = transport
        .broadcasts_to(&last)
        .into_iter()
        .find(|b| b.peers.len() > 1)
        .unwrap();
    let mut expected: Vec<_> = peers[..5].to_vec();
    expected.reverse();
    assert_eq!(intro.peers, expected);
}

#[tokio::test]
async fn introduction_failure_tears_down_connection() {
    let (kad, transport) = setup(TopologyConfig::default());
    let p1 = addr(0x80, 0);
    let p2 = addr(0x40, 0);
    let p3 = addr(0x20, 0);

    kad.connected(p1, PeerKind::Full).await.unwrap();
    kad.connected(p2, PeerKind::Full).await.unwrap();
    transport.clear();
    transport.set_unreachable(p3);

    let err = kad.connected(p3, PeerKind::Full).await.unwrap_err();
    kad.shutdown().await.unwrap();

    assert!(matches!(err, AnnounceError::Introduction { peer, .. } if peer == p3));
    assert_eq!(transport.disconnects(), vec![p3]);
    assert_eq!(transport.broadcasts_to(&p1).len(), 1);
    assert_eq!(transport.broadcasts_to(&p2).len(), 1);
    assert_eq!(kad.connected_peers().len(), 2);

    // the peer becomes reachable and reconnects
    transport.set_reachable(&p3);
    kad.connected(p3, PeerKind::Full).await.unwrap();
    assert_eq!(kad.connected_peers().len(), 3);
}

#[tokio::test]
async fn snapshot_json_contract() {
    let (kad, _) = setup(TopologyConfig::default().with_low_watermark(2));
    let connected = addr(0x80, 0);
    let known = addr(0x01, 0);
    let light = addr(0x40, 1);

    kad.add_peers(&[known]);
    kad.connected(connected, PeerKind::Full).await.unwrap();
    kad.connected(light, PeerKind::Light).await.unwrap();
    kad.set_depth(3);

    let json: Value = serde_json::from_str(&kad.snapshot().to_json().unwrap()).unwrap();

    assert_eq!(json["baseAddr"], Value::String(OverlayAddress::ZERO.to_string()));
    assert_eq!(json["population"], 2);
    assert_eq!(json["connected"], 1);
    assert_eq!(json["nnLowWatermark"], 2);
    assert_eq!(json["depth"], 3);
    assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));

    let bins = json["bins"].as_object().unwrap();
    assert_eq!(bins.len(), MAX_BINS);
    assert_eq!(bins["bin_0"]["connectedPeers"][0], connected.to_string());
    assert_eq!(bins["bin_0"]["disconnectedPeers"], Value::Array(vec![]));
    assert_eq!(bins["bin_7"]["population"], 1);
    assert_eq!(bins["bin_7"]["disconnectedPeers"][0], known.to_string());
    assert_eq!(bins["bin_15"]["connectedPeers"], Value::Array(vec![]));

    assert_eq!(json["lightNodes"]["population"], 1);
    assert_eq!(json["lightNodes"]["connected"], 1);
    assert_eq!(json["lightNodes"]["connectedPeers"][0], light.to_string());
}

#[tokio::test]
async fn config_file_disables_light_node_announcements() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        announce_light_nodes = false

        [announce]
        introduction_timeout = "10s"
        "#
    )
    .unwrap();

    let config = TopologyConfig::load(file.path()).unwrap();
    assert_eq!(config.announce.introduction_timeout, Duration::from_secs(10));

    let (kad, transport) = setup(config);
    let l1 = addr(0x80, 0);
    let l2 = addr(0x40, 0);
    kad.connected(l1, PeerKind::Light).await.unwrap();
    kad.connected(l2, PeerKind::Light).await.unwrap();
    kad.shutdown().await.unwrap();

    assert!(transport.broadcasts().is_empty());
    assert_eq!(kad.light_nodes().connected_peers().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_connections_on_disjoint_peers() {
    const TASKS: u8 = 8;
    const PEERS: u8 = 16;

    let (kad, transport) = setup(TopologyConfig::default());

    let handles: Vec<_> = (1..=TASKS)
        .map(|task| {
            let kad = kad.clone();
            tokio::spawn(async move {
                for i in 0..PEERS {
                    let kind = if i % 2 == 0 { PeerKind::Full } else { PeerKind::Light };
                    let peer = addr(task, i);
                    kad.connected(peer, kind).await.unwrap();
                    if i % 4 < 2 {
                        kad.disconnected(&peer);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }
    kad.shutdown().await.unwrap();

    // per task: 8 full and 8 light peers, half of each disconnected
    let tasks = TASKS as usize;
    let stats = kad.stats();
    assert_eq!(stats.known_peers, tasks * 8);
    assert_eq!(stats.connected_peers, tasks * 4);
    assert_eq!(stats.light_nodes, tasks * 4);
    assert_eq!(kad.light_nodes().disconnected_peers().len(), tasks * 4);
    assert!(transport.disconnects().is_empty());

    for peer in kad.light_nodes().connected_peers().peers() {
        assert!(!kad.light_nodes().disconnected_peers().exists(&peer));
        assert!(!kad.connected_peers().exists(&peer));
    }
    for peer in kad.connected_peers().peers() {
        assert!(!kad.light_nodes().connected_peers().exists(&peer));
    }
}
