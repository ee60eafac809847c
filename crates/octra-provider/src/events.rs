//! Provider events.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use octra_capabilities::Capability;
use octra_core::{CapabilityId, Connection, Origin};

/// Event families a listener can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A connection was approved.
    Connect,
    /// The connection was torn down.
    Disconnect,
    /// A capability was granted.
    CapabilityGranted,
    /// A capability was revoked.
    CapabilityRevoked,
    /// The active branch changed.
    BranchChanged,
    /// The active epoch changed.
    EpochChanged,
}

/// An event delivered to listeners.
#[derive(Debug, Clone)]
pub enum WalletEvent {
    /// A connection was approved.
    Connect(Connection),
    /// The connection was torn down.
    Disconnect {
        /// The origin that disconnected.
        origin: Origin,
    },
    /// A capability was granted.
    CapabilityGranted(Box<Capability>),
    /// A capability was revoked.
    CapabilityRevoked(CapabilityId),
    /// The active branch changed.
    BranchChanged(String),
    /// The active epoch changed.
    EpochChanged(u64),
}

impl WalletEvent {
    /// The family this event belongs to.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connect(_) => EventKind::Connect,
            Self::Disconnect { .. } => EventKind::Disconnect,
            Self::CapabilityGranted(_) => EventKind::CapabilityGranted,
            Self::CapabilityRevoked(_) => EventKind::CapabilityRevoked,
            Self::BranchChanged(_) => EventKind::BranchChanged,
            Self::EpochChanged(_) => EventKind::EpochChanged,
        }
    }
}

/// Handle identifying one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn Fn(&WalletEvent) + Send + Sync>;

/// Listener registry with exact removal by handle.
#[derive(Default)]
pub struct EventEmitter {
    next_id: AtomicU64,
    listeners: RwLock<HashMap<EventKind, Vec<(ListenerId, Listener)>>>,
}

impl EventEmitter {
    /// Create an empty emitter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for an event family.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&WalletEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut listeners) = self.listeners.write() {
            listeners
                .entry(kind)
                .or_default()
                .push((id, Box::new(listener)));
        }
        id
    }

    /// Remove exactly the listener registered under `id`.
    ///
    /// Returns `false` if it was not registered (or already removed).
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        let Ok(mut listeners) = self.listeners.write() else {
            return false;
        };
        let Some(entries) = listeners.get_mut(&kind) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    /// Deliver an event to every listener of its family.
    pub fn emit(&self, event: &WalletEvent) {
        let Ok(listeners) = self.listeners.read() else {
            return;
        };
        if let Some(entries) = listeners.get(&event.kind()) {
            for (_, listener) in entries {
                listener(event);
            }
        }
    }

    /// Number of listeners registered for a family.
    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .read()
            .ok()
            .and_then(|l| l.get(&kind).map(Vec::len))
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let total: usize = self
            .listeners
            .read()
            .map(|l| l.values().map(Vec::len).sum())
            .unwrap_or(0);
        f.debug_struct("EventEmitter")
            .field("listeners", &total)
            .finish()
    }
}
