//! Capability storage.
//!
//! The store is owned by a single context (the authorization process);
//! other contexts reach it only through message passing, so the interior
//! locks here guard against nothing more exotic than reentrancy from the
//! owner's own async tasks.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use octra_core::{CapabilityId, Origin};

use crate::capability::{Capability, CapabilityState};
use crate::error::{CapabilityError, CapabilityResult};

/// Default per-origin live-capability limit.
const DEFAULT_MAX_PER_ORIGIN: usize = 100;

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Hard cap on live capabilities per origin.
    pub max_per_origin: usize,
    /// Whether to evict the oldest entry when an origin is at capacity.
    /// When disabled, inserts at capacity fail with `CapacityExceeded`.
    pub evict_oldest: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_per_origin: DEFAULT_MAX_PER_ORIGIN,
            evict_oldest: true,
        }
    }
}

/// Holds issued capabilities and tracks their lifecycle.
pub struct CapabilityStore {
    capabilities: RwLock<HashMap<CapabilityId, Capability>>,
    /// Revocation is terminal; ids stay here even after removal.
    revoked: RwLock<HashSet<CapabilityId>>,
    config: StoreConfig,
}

impl CapabilityStore {
    /// Create a store with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create a store with explicit configuration.
    #[must_use]
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            capabilities: RwLock::new(HashMap::new()),
            revoked: RwLock::new(HashSet::new()),
            config,
        }
    }

    /// Add a capability presented by an origin, verifying signature, expiry,
    /// and origin binding first.
    ///
    /// # Errors
    ///
    /// Returns the specific validation failure, or
    /// [`CapabilityError::CapacityExceeded`] if the origin is at capacity
    /// and eviction is disabled.
    pub fn add(&self, capability: Capability, presenter: &Origin) -> CapabilityResult<()> {
        capability.validate_for(presenter)?;
        self.insert(capability)
    }

    /// Add a capability from a trusted source, skipping verification.
    ///
    /// Issuer-side only: the broker inserts capabilities it has just signed
    /// itself. Capabilities arriving from any other context go through
    /// [`CapabilityStore::add`].
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::CapacityExceeded`] if the origin is at
    /// capacity and eviction is disabled.
    pub fn add_trusted(&self, capability: Capability) -> CapabilityResult<()> {
        self.insert(capability)
    }

    fn insert(&self, capability: Capability) -> CapabilityResult<()> {
        let mut capabilities = self
            .capabilities
            .write()
            .map_err(|e| CapabilityError::Storage(e.to_string()))?;

        let origin = capability.app_origin.clone();
        let stored = |caps: &HashMap<CapabilityId, Capability>| {
            caps.values().filter(|c| c.app_origin == origin).count()
        };

        if stored(&capabilities) >= self.config.max_per_origin {
            // Expired entries go first.
            let expired: Vec<CapabilityId> = capabilities
                .values()
                .filter(|c| c.app_origin == origin && c.is_expired())
                .map(|c| c.id)
                .collect();
            for id in expired {
                capabilities.remove(&id);
            }
        }

        if stored(&capabilities) >= self.config.max_per_origin {
            if !self.config.evict_oldest {
                return Err(CapabilityError::CapacityExceeded {
                    origin: origin.as_str().to_string(),
                    limit: self.config.max_per_origin,
                });
            }
            let oldest = capabilities
                .values()
                .filter(|c| c.app_origin == origin)
                .min_by_key(|c| c.issued_at)
                .map(|c| c.id);
            if let Some(id) = oldest {
                tracing::warn!(origin = %origin, evicted = %id, "capability capacity reached, evicting oldest");
                capabilities.remove(&id);
            }
        }

        capabilities.insert(capability.id, capability);
        Ok(())
    }

    /// Get a capability by id.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::Revoked`] for a revoked id, or
    /// [`CapabilityError::Storage`] on a poisoned lock.
    pub fn get(&self, id: CapabilityId) -> CapabilityResult<Option<Capability>> {
        if self.is_revoked(id)? {
            return Err(CapabilityError::Revoked { id: id.to_string() });
        }
        let capabilities = self
            .capabilities
            .read()
            .map_err(|e| CapabilityError::Storage(e.to_string()))?;
        Ok(capabilities.get(&id).cloned())
    }

    /// The lifecycle state of an id known to this store.
    ///
    /// Returns `None` for ids never seen (or removed without revocation).
    #[must_use]
    pub fn state(&self, id: CapabilityId) -> Option<CapabilityState> {
        if self.is_revoked(id).unwrap_or(false) {
            return Some(CapabilityState::Revoked);
        }
        let capabilities = self.capabilities.read().ok()?;
        capabilities.get(&id).map(|c| {
            if c.is_expired() {
                CapabilityState::Expired
            } else {
                CapabilityState::Active
            }
        })
    }

    /// Remove a capability without marking it revoked.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::Storage`] on a poisoned lock.
    pub fn remove(&self, id: CapabilityId) -> CapabilityResult<Option<Capability>> {
        let mut capabilities = self
            .capabilities
            .write()
            .map_err(|e| CapabilityError::Storage(e.to_string()))?;
        Ok(capabilities.remove(&id))
    }

    /// Revoke a capability. Terminal: the id can never become active again.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::Storage`] on a poisoned lock.
    pub fn revoke(&self, id: CapabilityId) -> CapabilityResult<()> {
        {
            let mut revoked = self
                .revoked
                .write()
                .map_err(|e| CapabilityError::Storage(e.to_string()))?;
            revoked.insert(id);
        }
        let mut capabilities = self
            .capabilities
            .write()
            .map_err(|e| CapabilityError::Storage(e.to_string()))?;
        capabilities.remove(&id);
        tracing::debug!(capability = %id, "capability revoked");
        Ok(())
    }

    /// All active capabilities, purging expired entries as a side effect.
    ///
    /// Expiry is a derived property detected on read; there is no
    /// background timer.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::Storage`] on a poisoned lock.
    pub fn get_active(&self) -> CapabilityResult<Vec<Capability>> {
        let mut capabilities = self
            .capabilities
            .write()
            .map_err(|e| CapabilityError::Storage(e.to_string()))?;
        capabilities.retain(|_, c| !c.is_expired());
        Ok(capabilities.values().cloned().collect())
    }

    /// Active capabilities bound to one origin, purging expired entries.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::Storage`] on a poisoned lock.
    pub fn active_for_origin(&self, origin: &Origin) -> CapabilityResult<Vec<Capability>> {
        Ok(self
            .get_active()?
            .into_iter()
            .filter(|c| c.app_origin == *origin)
            .collect())
    }

    /// Whether a method is granted by an active, non-revoked capability.
    ///
    /// Fail-closed: unknown, revoked, and expired ids all answer `false`.
    #[must_use]
    pub fn is_method_allowed(&self, id: CapabilityId, method: &str) -> bool {
        match self.get(id) {
            Ok(Some(cap)) => !cap.is_expired() && cap.allows_method(method),
            _ => false,
        }
    }

    fn is_revoked(&self, id: CapabilityId) -> CapabilityResult<bool> {
        let revoked = self
            .revoked
            .read()
            .map_err(|e| CapabilityError::Storage(e.to_string()))?;
        Ok(revoked.contains(&id))
    }
}

impl Default for CapabilityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CapabilityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.capabilities.read().map(|c| c.len()).unwrap_or(0);
        let revoked = self.revoked.read().map(|r| r.len()).unwrap_or(0);
        f.debug_struct("CapabilityStore")
            .field("capabilities", &count)
            .field("revoked", &revoked)
            .field("config", &self.config)
            .finish()
    }
}
