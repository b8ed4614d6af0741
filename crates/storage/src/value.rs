//! Value codecs.

use serde::{Serialize, de::DeserializeOwned};

use crate::StoreResult;

/// A value that can be kept in a [`StateStore`](crate::StateStore).
pub trait StateValue: Sized {
    /// Encode for storage.
    fn marshal(&self) -> StoreResult<Vec<u8>>;

    /// Decode a stored value.
    fn unmarshal(bytes: &[u8]) -> StoreResult<Self>;
}

/// Marker for values stored as JSON.
///
/// Implement this instead of [`StateValue`] for types without a binary
/// encoding of their own.
pub trait JsonStateValue: Serialize + DeserializeOwned {}

impl<T: JsonStateValue> StateValue for T {
    fn marshal(&self) -> StoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    fn unmarshal(bytes: &[u8]) -> StoreResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl JsonStateValue for String {}
impl JsonStateValue for bool {}
impl JsonStateValue for u64 {}
impl<T: Serialize + DeserializeOwned> JsonStateValue for Vec<T> {}
