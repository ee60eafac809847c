//! The connection registry.
//!
//! One connection per origin. Updates are immutable: each change builds the
//! new connection set first, swaps it in, then persists the whole set as an
//! opaque blob - so the "one per origin" invariant is checkable at every
//! step and a crash never leaves a half-applied mutation on disk.

use std::collections::HashMap;
use std::sync::RwLock;

use octra_core::{Connection, Origin, ProtocolError, ProtocolResult};

use crate::storage::KvStore;

const CONNECTIONS_KEY: &str = "connections";

/// Holds the approved page-wallet connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<Origin, Connection>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the persisted connection set.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the blob is unreadable or corrupt.
    pub async fn hydrate(&self, storage: &dyn KvStore) -> ProtocolResult<()> {
        let Some(bytes) = storage.get(CONNECTIONS_KEY).await? else {
            return Ok(());
        };
        let list: Vec<Connection> = serde_json::from_slice(&bytes)
            .map_err(|e| ProtocolError::transport(format!("corrupt connection set: {e}")))?;
        let mut connections = self
            .connections
            .write()
            .map_err(|e| ProtocolError::transport(e.to_string()))?;
        *connections = list.into_iter().map(|c| (c.origin.clone(), c)).collect();
        Ok(())
    }

    /// The connection for an origin, if any.
    #[must_use]
    pub fn get(&self, origin: &Origin) -> Option<Connection> {
        self.connections.read().ok()?.get(origin).cloned()
    }

    /// Insert (or replace) the connection for its origin, then persist.
    ///
    /// # Errors
    ///
    /// Returns a transport error if persisting fails; the in-memory set is
    /// only swapped after the new set serializes cleanly.
    pub async fn upsert(&self, connection: Connection, storage: &dyn KvStore) -> ProtocolResult<()> {
        let next = {
            let connections = self
                .connections
                .read()
                .map_err(|e| ProtocolError::transport(e.to_string()))?;
            let mut next = connections.clone();
            next.insert(connection.origin.clone(), connection);
            next
        };
        self.persist_and_swap(next, storage).await
    }

    /// Remove the connection for an origin, then persist.
    ///
    /// Returns the removed connection, if one existed.
    ///
    /// # Errors
    ///
    /// Returns a transport error if persisting fails.
    pub async fn remove(
        &self,
        origin: &Origin,
        storage: &dyn KvStore,
    ) -> ProtocolResult<Option<Connection>> {
        let (next, removed) = {
            let connections = self
                .connections
                .read()
                .map_err(|e| ProtocolError::transport(e.to_string()))?;
            let mut next = connections.clone();
            let removed = next.remove(origin);
            (next, removed)
        };
        self.persist_and_swap(next, storage).await?;
        Ok(removed)
    }

    /// All connections, sorted by origin.
    #[must_use]
    pub fn all(&self) -> Vec<Connection> {
        let Ok(connections) = self.connections.read() else {
            return Vec::new();
        };
        let mut list: Vec<Connection> = connections.values().cloned().collect();
        list.sort_by(|a, b| a.origin.as_str().cmp(b.origin.as_str()));
        list
    }

    async fn persist_and_swap(
        &self,
        next: HashMap<Origin, Connection>,
        storage: &dyn KvStore,
    ) -> ProtocolResult<()> {
        let mut list: Vec<&Connection> = next.values().collect();
        list.sort_by(|a, b| a.origin.as_str().cmp(b.origin.as_str()));
        let bytes = serde_json::to_vec(&list)
            .map_err(|e| ProtocolError::transport(e.to_string()))?;
        storage.set(CONNECTIONS_KEY, bytes).await?;

        let mut connections = self
            .connections
            .write()
            .map_err(|e| ProtocolError::transport(e.to_string()))?;
        *connections = next;
        Ok(())
    }
}
