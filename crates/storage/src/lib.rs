//! Key-value state store.
//!
//! [`StateStore`] is the byte level contract every backend implements. Typed
//! access goes through [`StateStoreExt`], which encodes values with their
//! [`StateValue`] codec: a type with a binary encoding implements
//! [`StateValue`] directly, anything else opts into JSON through
//! [`JsonStateValue`].

mod error;
mod memory;
mod value;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStateStore;
pub use value::{JsonStateValue, StateValue};

use auto_impl::auto_impl;

/// Visitor for [`StateStore::iterate`]. Returning `Ok(true)` stops the iteration.
pub type IterFn<'a> = dyn FnMut(&str, &[u8]) -> StoreResult<bool> + 'a;

/// Byte level key-value store.
#[auto_impl(&, Box, Arc)]
pub trait StateStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// Returns [`StoreError::NotFound`] if there is none.
    fn get_bytes(&self, key: &str) -> StoreResult<Vec<u8>>;

    /// Store `value` under `key`, replacing any previous value.
    fn put_bytes(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> StoreResult<()>;

    /// Visit all entries whose key starts with `prefix`, in key order.
    ///
    /// The first error, from the backend or the visitor, ends the iteration
    /// and is returned.
    fn iterate(&self, prefix: &str, visit: &mut IterFn<'_>) -> StoreResult<()>;
}

/// Typed access on top of any [`StateStore`].
pub trait StateStoreExt: StateStore {
    /// Read and decode the value stored under `key`.
    fn get<T: StateValue>(&self, key: &str) -> StoreResult<T> {
        T::unmarshal(&self.get_bytes(key)?)
    }

    /// Encode and store `value` under `key`.
    fn put<T: StateValue>(&self, key: &str, value: &T) -> StoreResult<()> {
        self.put_bytes(key, &value.marshal()?)
    }

    /// Read and decode the value under `key`, mapping a missing key to `None`.
    fn get_opt<T: StateValue>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.get(key) {
            Ok(value) => Ok(Some(value)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

impl<S: StateStore + ?Sized> StateStoreExt for S {}
