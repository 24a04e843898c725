//! Key-value state store contract.
//!
//! Small pieces of node state (blocklist entries, bookkeeping records) are
//! persisted through a [`StateStore`]: string keys, opaque byte values, and
//! prefix iteration so that one store can host several key namespaces.
//! Encoding of values is the caller's concern.

mod memory;

pub use memory::MemoryStateStore;

use auto_impl::auto_impl;

/// State store error type.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No value is stored under the requested key.
    #[error("not found")]
    NotFound,
    /// A stored key or value could not be encoded or decoded.
    #[error("codec error: {_0}")]
    Codec(String),
    /// The storage backend failed.
    #[error("{_0}")]
    Backend(String),
}

impl StoreError {
    /// Returns true for [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Visitor passed to [`StateStore::iterate`].
///
/// Returning `Ok(true)` stops the iteration early; an error stops it and is
/// returned from `iterate`.
pub type Visitor<'a> = dyn FnMut(&str, &[u8]) -> Result<bool, StoreError> + 'a;

/// Key-value persistence with prefix iteration.
///
/// Implementations must let `iterate` run concurrently with `put` and
/// `delete`, and must allow the visitor to call back into the store.
#[auto_impl(&, Box, Arc)]
pub trait StateStore: Send + Sync {
    /// Get the value stored under `key`, or [`StoreError::NotFound`].
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Remove `key`. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Visit every entry whose key starts with `prefix`, in key order.
    fn iterate(&self, prefix: &str, visit: &mut Visitor<'_>) -> Result<(), StoreError>;
}
