//! The trusted relay.
//!
//! The relay is the only path from a page context to the broker. It derives
//! the sender's true origin from the channel itself (never from message
//! content) and stamps it onto every forwarded request, which is what makes
//! the broker's claimed-vs-actual origin check meaningful.

use std::sync::Arc;

use async_trait::async_trait;

use octra_core::{
    Origin, ProtocolResult, RequestEnvelope, ResponseEnvelope, SOURCE_RELAY, Transport,
};

use crate::broker::Broker;

/// In-process relay binding one page origin to a broker.
pub struct Relay {
    broker: Arc<Broker>,
    /// The origin of the page this relay instance serves, derived from the
    /// page context at relay construction, not from any message.
    true_origin: Origin,
}

impl Relay {
    /// Create a relay for a page at `true_origin`.
    #[must_use]
    pub fn new(broker: Arc<Broker>, true_origin: Origin) -> Self {
        Self {
            broker,
            true_origin,
        }
    }
}

#[async_trait]
impl Transport for Relay {
    async fn send(&self, envelope: RequestEnvelope) -> ProtocolResult<ResponseEnvelope> {
        let forwarded = RequestEnvelope {
            source: SOURCE_RELAY.to_string(),
            ..envelope
        };
        Ok(self.broker.handle_request(forwarded, &self.true_origin).await)
    }
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("true_origin", &self.true_origin)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::AutoApproveSurface;
    use crate::broker::BrokerConfig;
    use crate::executor::EchoExecutor;
    use crate::storage::MemoryKvStore;
    use octra_core::{CircleId, ConnectParams, Connection, MessageKind, ProtocolError};
    use octra_crypto::SoftwareVault;

    fn broker() -> Arc<Broker> {
        Arc::new(Broker::new(
            Arc::new(SoftwareVault::generate()),
            Arc::new(AutoApproveSurface),
            Arc::new(EchoExecutor),
            Arc::new(MemoryKvStore::new()),
            BrokerConfig::default(),
        ))
    }

    fn connect_envelope(claimed: &str) -> RequestEnvelope {
        RequestEnvelope::page(
            MessageKind::ConnectionRequest,
            &ConnectParams {
                app_origin: Origin::parse(claimed).unwrap(),
                circle: CircleId::new("demo").unwrap(),
                app_name: "Demo".into(),
                app_icon: None,
                network: None,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_relay_stamps_source_and_origin() {
        let relay = Relay::new(broker(), Origin::parse("https://app.example").unwrap());

        let response = relay.send(connect_envelope("https://app.example")).await.unwrap();
        let connection: Connection = response.into_result().unwrap();
        assert_eq!(connection.origin.as_str(), "https://app.example");
    }

    #[tokio::test]
    async fn test_relay_cannot_launder_origins() {
        // The page claims victim.example, but this relay serves
        // attacker.example; the broker rejects the disagreement.
        let relay = Relay::new(broker(), Origin::parse("https://attacker.example").unwrap());

        let response = relay.send(connect_envelope("https://victim.example")).await.unwrap();
        assert!(matches!(
            response.into_result::<Connection>().unwrap_err(),
            ProtocolError::OriginMismatch { .. }
        ));
    }
}
