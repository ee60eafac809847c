//! Per-capability monotonic nonce tracking.
//!
//! Nonce state lives only in process memory for the lifetime of a session.
//! It is seeded from the capability's nonce base at (re)issuance and must
//! advance in lockstep with dispatch: an advance without a successful
//! dispatch is undone by [`NonceManager::rollback`], and a dispatch without
//! an advance is impossible because [`NonceManager::next_nonce`] is the only
//! source of invocation nonces.

use std::collections::HashMap;
use std::sync::RwLock;

use octra_core::CapabilityId;

use crate::error::{CapabilityError, CapabilityResult};

/// Tracks the last nonce issued (caller side) or accepted (verifier side)
/// per capability.
#[derive(Debug, Default)]
pub struct NonceManager {
    watermarks: RwLock<HashMap<CapabilityId, u64>>,
}

impl NonceManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed (or re-seed) a capability's watermark to its nonce base.
    ///
    /// Called at issuance; a re-issued capability starts a fresh sequence.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::Storage`] if the table lock is poisoned.
    pub fn reset(&self, id: CapabilityId, base: u64) -> CapabilityResult<()> {
        let mut watermarks = self
            .watermarks
            .write()
            .map_err(|e| CapabilityError::Storage(e.to_string()))?;
        watermarks.insert(id, base);
        Ok(())
    }

    /// Advance the watermark and return the next nonce to use.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::NotFound`] if the capability was never
    /// seeded (nonces only exist for issued capabilities), or
    /// [`CapabilityError::Storage`] on a poisoned lock.
    pub fn next_nonce(&self, id: CapabilityId) -> CapabilityResult<u64> {
        let mut watermarks = self
            .watermarks
            .write()
            .map_err(|e| CapabilityError::Storage(e.to_string()))?;
        let current = watermarks
            .get(&id)
            .copied()
            .ok_or_else(|| CapabilityError::NotFound { id: id.to_string() })?;
        let next = current.saturating_add(1);
        watermarks.insert(id, next);
        Ok(next)
    }

    /// Accept an incoming nonce if it is strictly greater than the last
    /// accepted one, recording it as the new watermark.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::NonceViolation`] for a replayed or
    /// out-of-order nonce, [`CapabilityError::NotFound`] for an unseeded
    /// capability, or [`CapabilityError::Storage`] on a poisoned lock.
    pub fn validate(&self, id: CapabilityId, nonce: u64) -> CapabilityResult<()> {
        let mut watermarks = self
            .watermarks
            .write()
            .map_err(|e| CapabilityError::Storage(e.to_string()))?;
        let last = watermarks
            .get(&id)
            .copied()
            .ok_or_else(|| CapabilityError::NotFound { id: id.to_string() })?;
        if nonce <= last {
            return Err(CapabilityError::NonceViolation {
                last_accepted: last,
                got: nonce,
            });
        }
        watermarks.insert(id, nonce);
        Ok(())
    }

    /// Check an incoming nonce without recording it.
    ///
    /// Used to fail fast before side effects; the matching
    /// [`NonceManager::validate`] call records the nonce once the
    /// invocation is actually dispatched.
    ///
    /// # Errors
    ///
    /// Same as [`NonceManager::validate`], but never mutates state.
    pub fn check(&self, id: CapabilityId, nonce: u64) -> CapabilityResult<()> {
        let watermarks = self
            .watermarks
            .read()
            .map_err(|e| CapabilityError::Storage(e.to_string()))?;
        let last = watermarks
            .get(&id)
            .copied()
            .ok_or_else(|| CapabilityError::NotFound { id: id.to_string() })?;
        if nonce <= last {
            return Err(CapabilityError::NonceViolation {
                last_accepted: last,
                got: nonce,
            });
        }
        Ok(())
    }

    /// Undo an advance whose dispatch failed, so the sequence number is not
    /// permanently burned.
    ///
    /// Compare-and-swap semantics: the watermark only moves back if it still
    /// equals `issued` - a rollback racing a newer advance is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::Storage`] if the table lock is poisoned.
    pub fn rollback(&self, id: CapabilityId, issued: u64) -> CapabilityResult<()> {
        let mut watermarks = self
            .watermarks
            .write()
            .map_err(|e| CapabilityError::Storage(e.to_string()))?;
        if watermarks.get(&id).copied() == Some(issued) {
            watermarks.insert(id, issued.saturating_sub(1));
        }
        Ok(())
    }

    /// The current watermark for a capability, if seeded.
    #[must_use]
    pub fn last(&self, id: CapabilityId) -> Option<u64> {
        self.watermarks.read().ok()?.get(&id).copied()
    }

    /// Drop a capability's nonce state (on revocation or removal).
    pub fn forget(&self, id: CapabilityId) {
        if let Ok(mut watermarks) = self.watermarks.write() {
            watermarks.remove(&id);
        }
    }
}
