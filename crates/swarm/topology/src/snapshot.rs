//! Point-in-time view of the overlay for observability.
//!
//! A [`TopologySnapshot`] is filled in once by the topology driver and then
//! handed unchanged to a presentation layer. Field names in the serialized
//! form are consumed by existing tooling and must not change.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer, ser::SerializeMap};
use vertex_swarm_primitives::{MAX_BINS, OverlayAddress};

use crate::TopologyResult;

/// Aggregate for one bin (or for the light nodes).
///
/// Empty peer lists serialize as `[]`, never `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BinInfo {
    /// Known peers in the bin.
    pub population: usize,
    /// Connected peers in the bin.
    pub connected: usize,
    /// Known peers that are not connected.
    pub disconnected_peers: Vec<String>,
    /// Connected peers.
    pub connected_peers: Vec<String>,
}

/// Per-bin aggregates, serialized as `bin_0` .. `bin_15`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bins([BinInfo; MAX_BINS]);

impl Bins {
    /// The aggregate for bin `po`, if addressable.
    pub fn get(&self, po: u8) -> Option<&BinInfo> {
        self.0.get(po as usize)
    }

    fn get_mut(&mut self, po: u8) -> Option<&mut BinInfo> {
        self.0.get_mut(po as usize)
    }

    /// Iterate over `(po, info)` pairs, shallowest first.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &BinInfo)> {
        self.0.iter().enumerate().map(|(po, info)| (po as u8, info))
    }
}

impl Serialize for Bins {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(MAX_BINS))?;
        for (po, info) in self.iter() {
            map.serialize_entry(&format!("bin_{po}"), info)?;
        }
        map.end()
    }
}

/// Snapshot of the topology.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologySnapshot {
    /// Hex encoded overlay address of this node.
    pub base_addr: String,
    /// Known peers.
    pub population: usize,
    /// Connected peers.
    pub connected: usize,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
    /// Minimum neighbourhood size used for depth.
    pub nn_low_watermark: usize,
    /// Current neighbourhood depth.
    pub depth: u8,
    /// Per-bin aggregates.
    pub bins: Bins,
    /// Light node aggregate.
    pub light_nodes: BinInfo,
}

impl TopologySnapshot {
    /// An empty snapshot taken at `timestamp`.
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            base_addr: String::new(),
            population: 0,
            connected: 0,
            timestamp,
            nn_low_watermark: 0,
            depth: 0,
            bins: Bins::default(),
            light_nodes: BinInfo::default(),
        }
    }

    pub fn set_base(&mut self, base: &OverlayAddress) {
        self.base_addr = base.to_string();
    }

    pub fn set_population(&mut self, population: usize) {
        self.population = population;
    }

    pub fn set_connected(&mut self, connected: usize) {
        self.connected = connected;
    }

    pub fn set_nn_low_watermark(&mut self, low_watermark: usize) {
        self.nn_low_watermark = low_watermark;
    }

    pub fn set_depth(&mut self, depth: u8) {
        self.depth = depth;
    }

    pub fn set_light_nodes(&mut self, light_nodes: BinInfo) {
        self.light_nodes = light_nodes;
    }

    /// Count `peer` as connected in bin `po`.
    ///
    /// Returns `false` and records nothing if `po` is out of range.
    pub fn record_connected_bin(&mut self, peer: &OverlayAddress, po: u8) -> bool {
        let Some(bin) = self.bins.get_mut(po) else {
            return false;
        };
        bin.connected += 1;
        bin.connected_peers.push(peer.to_string());
        true
    }

    /// Count `peer` as known in bin `po`.
    ///
    /// Listed as disconnected unless already listed as connected in the same
    /// bin. Returns `false` and records nothing if `po` is out of range.
    pub fn record_disconnected_bin(&mut self, peer: &OverlayAddress, po: u8) -> bool {
        let Some(bin) = self.bins.get_mut(po) else {
            return false;
        };
        bin.population += 1;
        let peer = peer.to_string();
        if !bin.connected_peers.contains(&peer) {
            bin.disconnected_peers.push(peer);
        }
        true
    }

    /// Serialize for presentation.
    pub fn to_json(&self) -> TopologyResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize for presentation, indented.
    pub fn to_json_pretty(&self) -> TopologyResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Source of topology snapshots for presentation layers.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait SnapshotProvider: Send + Sync {
    /// Take a snapshot of the current state.
    fn snapshot(&self) -> TopologySnapshot;
}
