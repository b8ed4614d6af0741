//! Overlay addresses and proximity.

use core::{fmt, str::FromStr};

use alloy_primitives::{B256, hex};

/// Size of an overlay address in bytes.
pub const ADDRESS_SIZE: usize = 32;

/// Deepest proximity order tracked by the topology.
///
/// Proximity beyond this value is folded into the deepest bin.
pub const MAX_PO: u8 = 15;

/// Number of proximity bins (one for each PO value `0..=MAX_PO`).
pub const MAX_BINS: usize = MAX_PO as usize + 1;

/// Error returned when parsing an [`OverlayAddress`] from a string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    /// The input is not valid hex.
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    /// The input decoded to the wrong number of bytes.
    #[error("overlay address must be {ADDRESS_SIZE} bytes, got {0}")]
    Length(usize),
}

/// Logical identifier of a node in the overlay network.
///
/// Distinct from any transport address. The canonical string form is the
/// full lowercase hex encoding without a `0x` prefix.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OverlayAddress(B256);

impl OverlayAddress {
    /// The all-zero address.
    pub const ZERO: Self = Self(B256::ZERO);

    /// Wrap raw bytes.
    pub const fn new(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self(B256::new(bytes))
    }

    /// Borrow the raw bytes.
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }

    /// Proximity order between `self` and `other`, capped at [`MAX_PO`].
    pub fn proximity(&self, other: &Self) -> u8 {
        proximity(self, other)
    }
}

/// Number of leading bits shared by `a` and `b`, capped at [`MAX_PO`].
///
/// Higher values mean the addresses are closer in the overlay.
pub fn proximity(a: &OverlayAddress, b: &OverlayAddress) -> u8 {
    let mut po = 0u32;
    for (x, y) in a.as_slice().iter().zip(b.as_slice()) {
        let xor = x ^ y;
        if xor != 0 {
            po += xor.leading_zeros();
            break;
        }
        po += 8;
        if po > MAX_PO as u32 {
            break;
        }
    }
    po.min(MAX_PO as u32) as u8
}

impl From<[u8; ADDRESS_SIZE]> for OverlayAddress {
    fn from(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self::new(bytes)
    }
}

impl From<B256> for OverlayAddress {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl From<OverlayAddress> for B256 {
    fn from(value: OverlayAddress) -> Self {
        value.0
    }
}

impl AsRef<[u8]> for OverlayAddress {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Display for OverlayAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0.as_slice()))
    }
}

impl fmt::Debug for OverlayAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OverlayAddress({self})")
    }
}

impl FromStr for OverlayAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let bytes: [u8; ADDRESS_SIZE] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AddressParseError::Length(bytes.len()))?;
        Ok(Self::new(bytes))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for OverlayAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for OverlayAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
