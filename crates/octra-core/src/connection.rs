//! Approved page-wallet connections.

use serde::{Deserialize, Serialize};

use crate::ids::{CircleId, SessionId};
use crate::origin::Origin;
use crate::scope::Network;
use crate::time::Timestamp;

/// An approved link between an origin and the wallet.
///
/// One connection exists per origin. Capabilities reference a connection's
/// circle but have an independent lifetime: revoking a capability does not
/// tear down the connection, and disconnecting does not rewrite history for
/// capabilities already expired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    /// The circle this connection is scoped to.
    pub circle: CircleId,
    /// Session identifier minted at approval time.
    pub session_id: SessionId,
    /// The wallet's public key, hex-encoded.
    pub wallet_pubkey: String,
    /// Optional derived secondary-chain address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_address: Option<String>,
    /// The network the connection operates on.
    pub network: Network,
    /// The exact origin the connection is bound to.
    pub origin: Origin,
    /// When the connection was approved.
    pub connected_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_serde_roundtrip() {
        let conn = Connection {
            circle: CircleId::new("demo").unwrap(),
            session_id: SessionId::new(),
            wallet_pubkey: "ab".repeat(32),
            secondary_address: None,
            network: Network::default(),
            origin: Origin::parse("https://app.example").unwrap(),
            connected_at: Timestamp::now(),
        };
        let json = serde_json::to_string(&conn).unwrap();
        let back: Connection = serde_json::from_str(&json).unwrap();
        assert_eq!(back.session_id, conn.session_id);
        assert_eq!(back.origin, conn.origin);
        // absent optional field is omitted entirely
        assert!(!json.contains("secondary_address"));
    }
}
