//! Proximity-ordered peer storage (PSlice).
//!
//! Peers are organized into bins based on their proximity order (PO).
//! The base address is not stored here - callers provide the PO when adding peers.
//!
//! # Implementation
//!
//! A fixed array of insertion-ordered bins, plus an address to PO map for
//! O(1) membership checks. A single lock covers both, so a traversal sees a
//! consistent view of the whole index.
//!
//! # Re-entrancy
//!
//! Traversals hold the read lock while the visitor runs. A visitor must not
//! call [`PSlice::add`] or [`PSlice::remove`] on the same instance: doing so
//! deadlocks. Collect addresses during the traversal and mutate afterwards.

use std::{collections::HashMap, fmt};

use hashlink::LinkedHashSet;
use parking_lot::RwLock;
use vertex_swarm_primitives::{MAX_BINS, MAX_PO, OverlayAddress};

/// Visitor decision for [`PSlice`] traversals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Continue with the next address.
    Continue,
    /// Abandon the rest of the current bin and continue with the next bin.
    SkipBin,
    /// Halt the whole traversal.
    Stop,
}

/// Direction in which bins are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOrder {
    /// Shallowest (most distant) bin first.
    Ascending,
    /// Deepest (closest) bin first.
    Descending,
}

#[derive(Default)]
struct Bins {
    bins: [LinkedHashSet<OverlayAddress>; MAX_BINS],
    /// Maps peer address to its proximity order.
    index: HashMap<OverlayAddress, u8>,
}

/// Proximity-ordered peer storage.
///
/// An address occupies at most one position in the whole index. Adding and
/// removing are idempotent; neither can fail.
#[derive(Default)]
pub struct PSlice {
    inner: RwLock<Bins>,
}

impl fmt::Debug for PSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PSlice")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// Bins beyond the deepest one fold into it.
fn clamp(po: u8) -> u8 {
    po.min(MAX_PO)
}

impl PSlice {
    /// Create a new empty PSlice.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a peer with its proximity order.
    ///
    /// No effect if the peer is already present in any bin.
    /// Returns `true` if the peer was added.
    pub fn add(&self, peer: OverlayAddress, po: u8) -> bool {
        let po = clamp(po);
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        if inner.index.contains_key(&peer) {
            return false;
        }

        match inner.bins.get_mut(po as usize) {
            Some(bin) => {
                bin.insert(peer);
                inner.index.insert(peer, po);
                true
            }
            None => false,
        }
    }

    /// Remove a peer from bin `po`.
    ///
    /// No effect if the peer is not present in that bin.
    /// Returns `true` if the peer was present and removed.
    pub fn remove(&self, peer: &OverlayAddress, po: u8) -> bool {
        let po = clamp(po);
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        if inner.index.get(peer) != Some(&po) {
            return false;
        }

        inner.index.remove(peer);
        if let Some(bin) = inner.bins.get_mut(po as usize) {
            bin.remove(peer);
        }
        true
    }

    /// Check if a peer exists in any bin.
    pub fn exists(&self, peer: &OverlayAddress) -> bool {
        self.inner.read().index.contains_key(peer)
    }

    /// Get the proximity order of a peer, if present.
    pub fn get_po(&self, peer: &OverlayAddress) -> Option<u8> {
        self.inner.read().index.get(peer).copied()
    }

    /// Get the total number of peers across all bins.
    pub fn len(&self) -> usize {
        self.inner.read().index.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().index.is_empty()
    }

    /// Get the number of peers in a specific bin.
    pub fn bin_size(&self, po: u8) -> usize {
        self.inner
            .read()
            .bins
            .get(po as usize)
            .map_or(0, LinkedHashSet::len)
    }

    /// Get bin sizes as an array.
    pub fn bin_sizes(&self) -> [usize; MAX_BINS] {
        let inner = self.inner.read();
        std::array::from_fn(|i| inner.bins.get(i).map_or(0, LinkedHashSet::len))
    }

    /// All peers, shallowest bin first, each bin in insertion order.
    pub fn peers(&self) -> Vec<OverlayAddress> {
        let inner = self.inner.read();
        inner.bins.iter().flatten().copied().collect()
    }

    /// Visit every peer, shallowest bin first, each bin in insertion order.
    ///
    /// See [`Visit`] for the visitor's control signals. An error returned by
    /// the visitor aborts the traversal and is returned.
    pub fn each_bin<E, F>(&self, visit: F) -> Result<(), E>
    where
        F: FnMut(&OverlayAddress, u8) -> Result<Visit, E>,
    {
        self.each_bin_in(BinOrder::Ascending, visit)
    }

    /// Like [`each_bin`](Self::each_bin), deepest bin first.
    pub fn each_bin_rev<E, F>(&self, visit: F) -> Result<(), E>
    where
        F: FnMut(&OverlayAddress, u8) -> Result<Visit, E>,
    {
        self.each_bin_in(BinOrder::Descending, visit)
    }

    /// Visit every peer with bins taken in `order`.
    pub fn each_bin_in<E, F>(&self, order: BinOrder, mut visit: F) -> Result<(), E>
    where
        F: FnMut(&OverlayAddress, u8) -> Result<Visit, E>,
    {
        let inner = self.inner.read();
        let bins = inner.bins.iter().enumerate();

        match order {
            BinOrder::Ascending => walk(bins, &mut visit),
            BinOrder::Descending => walk(bins.rev(), &mut visit),
        }
    }
}

fn walk<'a, E, F>(
    bins: impl Iterator<Item = (usize, &'a LinkedHashSet<OverlayAddress>)>,
    visit: &mut F,
) -> Result<(), E>
where
    F: FnMut(&OverlayAddress, u8) -> Result<Visit, E>,
{
    for (po, bin) in bins {
        for peer in bin {
            match visit(peer, po as u8)? {
                Visit::Continue => {}
                Visit::SkipBin => break,
                Visit::Stop => return Ok(()),
            }
        }
    }
    Ok(())
}
