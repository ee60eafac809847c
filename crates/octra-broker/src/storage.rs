//! The persistent-storage boundary.
//!
//! The broker treats storage as an opaque async blob store, never as a
//! query engine. Durable state is small: the connection set and at most one
//! pending request record per request class (so an approval survives UI
//! navigation).

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use octra_core::{ProtocolError, ProtocolResult};

/// Opaque async key-value storage.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a value.
    async fn get(&self, key: &str) -> ProtocolResult<Option<Vec<u8>>>;

    /// Write a value.
    async fn set(&self, key: &str, value: Vec<u8>) -> ProtocolResult<()>;

    /// Delete a value. Deleting a missing key is not an error.
    async fn remove(&self, key: &str) -> ProtocolResult<()>;
}

/// In-memory store for tests and single-process embeddings.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryKvStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> ProtocolResult<Option<Vec<u8>>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| ProtocolError::transport(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> ProtocolResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| ProtocolError::transport(e.to_string()))?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> ProtocolResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| ProtocolError::transport(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryKvStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", b"value".to_vec()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"value".to_vec()));

        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);

        // Removing again is fine.
        store.remove("k").await.unwrap();
    }
}
