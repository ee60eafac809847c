//! The cross-context transport seam.
//!
//! A page context talks to the authorization process only through this
//! trait. The trusted relay implements it by stamping the sender's true
//! origin onto every request before forwarding; test doubles implement it
//! in-process.

use async_trait::async_trait;

use crate::error::ProtocolResult;
use crate::wire::{RequestEnvelope, ResponseEnvelope};

/// One request-response exchange across contexts.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request envelope and await the correlated response.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Transport`](crate::ProtocolError::Transport)
    /// when the channel itself fails; protocol-level failures arrive inside
    /// the [`ResponseEnvelope`].
    async fn send(&self, envelope: RequestEnvelope) -> ProtocolResult<ResponseEnvelope>;
}
