//! Boundary to the external key/value store.
//!
//! The index only needs three primitives: read a set of keys, atomically
//! apply a batch of writes and removals, and report how many bytes are in use.
//! Values are JSON documents.

mod memory;
mod schema;
mod sqlite;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Errors reported by a store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite failures from [`SqliteStore`].
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store refused or failed the request.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Writes and removals applied together or not at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    puts: BTreeMap<String, Value>,
    deletes: BTreeSet<String>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, cancelling an earlier delete of that key.
    pub fn put(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        self.deletes.remove(&key);
        self.puts.insert(key, value);
    }

    /// Removes `key`, cancelling an earlier put of that key.
    pub fn delete(&mut self, key: impl Into<String>) {
        let key = key.into();
        self.puts.remove(&key);
        self.deletes.insert(key);
    }

    pub fn is_empty(&self) -> bool {
        self.puts.is_empty() && self.deletes.is_empty()
    }

    /// Number of keys touched.
    pub fn len(&self) -> usize {
        self.puts.len() + self.deletes.len()
    }

    pub fn puts(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.puts.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn deletes(&self) -> impl Iterator<Item = &str> + '_ {
        self.deletes.iter().map(String::as_str)
    }
}

/// Asynchronous key/value store consumed by the index.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetches `keys`. Keys that are not stored are absent from the result.
    async fn get(&self, keys: &[String]) -> Result<HashMap<String, Value>, StoreError>;

    /// Applies every put and delete of `batch` atomically.
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// Bytes currently used by stored keys and values.
    async fn bytes_in_use(&self) -> Result<u64, StoreError>;
}

#[async_trait]
impl<S: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<S> {
    async fn get(&self, keys: &[String]) -> Result<HashMap<String, Value>, StoreError> {
        (**self).get(keys).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        (**self).commit(batch).await
    }

    async fn bytes_in_use(&self) -> Result<u64, StoreError> {
        (**self).bytes_in_use().await
    }
}

/// Size accounting shared by the bundled stores: key length plus the length
/// of the compact JSON encoding of the value.
pub(crate) fn entry_size(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}
