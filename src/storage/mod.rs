//! Key-value persistence for snapshot histories.
//!
//! The store keeps one record per form namespace. Backends only move
//! strings; encoding of the snapshot list lives in [`PayloadEncoding`].
//!
//! - [`MemoryStorage`]: process-local map, the default for tests and
//!   embedding.
//! - [`FileStorage`]: one checksummed file per key, fronted by an LRU
//!   read cache.

mod codec;
mod file;
mod memory;

pub use codec::PayloadEncoding;
pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::error::Result;
use std::sync::Arc;

/// A key-value persistence provider.
///
/// No arbitration between concurrent writers is provided; the last write
/// to a key wins.
pub trait KvStorage: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

impl<T: KvStorage + ?Sized> KvStorage for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}
