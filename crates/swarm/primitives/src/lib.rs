//! Core primitive types for the Swarm overlay topology.
//!
//! This crate provides fundamental types used across the topology stack,
//! kept separate to avoid circular dependencies.

mod address;

pub use address::{
    ADDRESS_SIZE, AddressParseError, MAX_BINS, MAX_PO, OverlayAddress, proximity,
};

/// Role of a connected peer in the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, strum::Display, strum::FromRepr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum PeerKind {
    /// Participates in the routing table and is bucketed by proximity.
    #[default]
    Full = 0,

    /// Connected without routing responsibilities.
    /// Tracked as a separate aggregate rather than per bin.
    Light = 1,
}

impl PeerKind {
    /// Returns true if the peer takes part in proximity routing.
    pub fn is_full(self) -> bool {
        matches!(self, PeerKind::Full)
    }
}
