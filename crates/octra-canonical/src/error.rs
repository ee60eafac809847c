//! Canonical encoding errors.

use thiserror::Error;

/// Errors raised while constructing canonical values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CanonicalError {
    /// NaN and infinities have no canonical decimal rendering.
    #[error("non-finite numbers cannot be canonicalized")]
    NonFiniteNumber,
}

/// Result type for canonical operations.
pub type CanonicalResult<T> = Result<T, CanonicalError>;
