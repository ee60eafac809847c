//! Cross-context message envelopes.
//!
//! Requests flow page -> relay -> broker as [`RequestEnvelope`]; responses
//! flow back as [`ResponseEnvelope`] correlated by the original request id.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProtocolError, ProtocolResult};
use crate::ids::{CapabilityId, CircleId, RequestId};
use crate::origin::Origin;
use crate::scope::{Network, Scope};

/// Envelope `source` tag for page-originated messages.
pub const SOURCE_PAGE: &str = "octra-page";
/// Envelope `source` tag for relay-forwarded messages.
pub const SOURCE_RELAY: &str = "octra-relay";

/// Message discriminator shared by both envelope directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// Page asks to connect.
    ConnectionRequest,
    /// Broker acknowledges a connection request is pending.
    ConnectionResponse,
    /// Terminal connection outcome.
    ConnectionResult,
    /// Page asks for a capability grant.
    CapabilityRequest,
    /// Broker acknowledges a capability request is pending.
    CapabilityResponse,
    /// Terminal capability outcome.
    CapabilityResult,
    /// Page submits an invocation under an existing capability.
    InvokeRequest,
    /// Broker acknowledges an invocation is pending.
    InvokeResponse,
    /// Terminal invocation outcome.
    InvokeResult,
    /// Page asks to disconnect.
    DisconnectRequest,
    /// Terminal disconnect acknowledgement.
    DisconnectResponse,
}

impl MessageKind {
    /// The terminal result kind paired with a request kind.
    #[must_use]
    pub fn result_kind(&self) -> MessageKind {
        match self {
            Self::ConnectionRequest | Self::ConnectionResponse | Self::ConnectionResult => {
                Self::ConnectionResult
            }
            Self::CapabilityRequest | Self::CapabilityResponse | Self::CapabilityResult => {
                Self::CapabilityResult
            }
            Self::InvokeRequest | Self::InvokeResponse | Self::InvokeResult => Self::InvokeResult,
            Self::DisconnectRequest | Self::DisconnectResponse => Self::DisconnectResponse,
        }
    }
}

/// A structured request, tagged with its id and a claimed origin in `data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Which context emitted the envelope.
    pub source: String,
    /// Message discriminator.
    pub kind: MessageKind,
    /// Correlation id; the response carries the same id.
    pub request_id: RequestId,
    /// Kind-specific parameters.
    pub data: Value,
}

impl RequestEnvelope {
    /// Build a page-originated request envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Validation`] if `data` cannot be serialized.
    pub fn page<T: Serialize>(kind: MessageKind, data: &T) -> ProtocolResult<Self> {
        Ok(Self {
            source: SOURCE_PAGE.to_string(),
            kind,
            request_id: RequestId::new(),
            data: serde_json::to_value(data)
                .map_err(|e| ProtocolError::validation(e.to_string()))?,
        })
    }

    /// Deserialize the kind-specific parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Validation`] if `data` does not match `T`.
    pub fn params<T: for<'de> Deserialize<'de>>(&self) -> ProtocolResult<T> {
        serde_json::from_value(self.data.clone())
            .map_err(|e| ProtocolError::validation(format!("malformed {:?} data: {e}", self.kind)))
    }
}

/// A response correlated with its request by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// The id of the request this resolves.
    pub request_id: RequestId,
    /// Message discriminator (a `*Result`/`*Response` kind).
    pub kind: MessageKind,
    /// Whether the request succeeded.
    pub success: bool,
    /// Kind-specific result; present iff `success`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// The failure; present iff `!success`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ProtocolError>,
}

impl ResponseEnvelope {
    /// A successful response.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Validation`] if `result` cannot be serialized.
    pub fn ok<T: Serialize>(
        request_id: RequestId,
        kind: MessageKind,
        result: &T,
    ) -> ProtocolResult<Self> {
        Ok(Self {
            request_id,
            kind,
            success: true,
            result: Some(
                serde_json::to_value(result)
                    .map_err(|e| ProtocolError::validation(e.to_string()))?,
            ),
            error: None,
        })
    }

    /// A failed response.
    #[must_use]
    pub fn err(request_id: RequestId, kind: MessageKind, error: ProtocolError) -> Self {
        Self {
            request_id,
            kind,
            success: false,
            result: None,
            error: Some(error),
        }
    }

    /// Unwrap into `Result`, deserializing the success payload.
    ///
    /// # Errors
    ///
    /// Returns the carried [`ProtocolError`], or a validation error if the
    /// payload does not match `T`.
    pub fn into_result<T: for<'de> Deserialize<'de>>(self) -> ProtocolResult<T> {
        if self.success {
            let value = self.result.unwrap_or(Value::Null);
            serde_json::from_value(value)
                .map_err(|e| ProtocolError::validation(format!("malformed result: {e}")))
        } else {
            Err(self
                .error
                .unwrap_or_else(|| ProtocolError::transport("response carried no error")))
        }
    }
}

/// Parameters of a `CONNECTION_REQUEST`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectParams {
    /// The origin the page claims to be.
    pub app_origin: Origin,
    /// The circle the page wants to connect to.
    pub circle: CircleId,
    /// Human-readable application name for the approval surface.
    pub app_name: String,
    /// Optional icon URL for the approval surface.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_icon: Option<String>,
    /// Requested network; broker default if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,
}

/// Parameters of a `CAPABILITY_REQUEST`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityParams {
    /// The origin the page claims to be.
    pub app_origin: Origin,
    /// The circle the capability is scoped to.
    pub circle: CircleId,
    /// Requested method names.
    pub methods: Vec<String>,
    /// Requested permission tier.
    pub scope: Scope,
    /// Whether payloads must stay opaque.
    pub encrypted: bool,
    /// Requested lifetime in milliseconds.
    pub ttl_ms: i64,
    /// Human-readable application name for the approval surface.
    pub app_name: String,
    /// Optional icon URL for the approval surface.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_icon: Option<String>,
}

/// Parameters of an `INVOKE_REQUEST`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeParams {
    /// The origin the page claims to be.
    pub app_origin: Origin,
    /// The capability the invocation runs under.
    pub capability_id: CapabilityId,
    /// The method to invoke.
    pub method: String,
    /// The signed invocation envelope, serialized.
    pub invocation: Value,
    /// The payload in wire form, if the call carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

/// Parameters of a `DISCONNECT_REQUEST`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisconnectParams {
    /// The origin the page claims to be.
    pub app_origin: Origin,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_names() {
        let json = serde_json::to_string(&MessageKind::CapabilityRequest).unwrap();
        assert_eq!(json, "\"CAPABILITY_REQUEST\"");
        let json = serde_json::to_string(&MessageKind::InvokeResult).unwrap();
        assert_eq!(json, "\"INVOKE_RESULT\"");
    }

    #[test]
    fn test_result_kind_pairing() {
        assert_eq!(
            MessageKind::ConnectionRequest.result_kind(),
            MessageKind::ConnectionResult
        );
        assert_eq!(
            MessageKind::InvokeRequest.result_kind(),
            MessageKind::InvokeResult
        );
        assert_eq!(
            MessageKind::DisconnectRequest.result_kind(),
            MessageKind::DisconnectResponse
        );
    }

    #[test]
    fn test_request_envelope_params_roundtrip() {
        let params = ConnectParams {
            app_origin: Origin::parse("https://app.example").unwrap(),
            circle: CircleId::new("demo").unwrap(),
            app_name: "Demo".into(),
            app_icon: None,
            network: None,
        };
        let envelope = RequestEnvelope::page(MessageKind::ConnectionRequest, &params).unwrap();
        assert_eq!(envelope.source, SOURCE_PAGE);

        let back: ConnectParams = envelope.params().unwrap();
        assert_eq!(back.app_origin, params.app_origin);
        assert_eq!(back.app_name, "Demo");
    }

    #[test]
    fn test_request_envelope_rejects_wrong_shape() {
        let envelope = RequestEnvelope {
            source: SOURCE_PAGE.into(),
            kind: MessageKind::ConnectionRequest,
            request_id: RequestId::new(),
            data: serde_json::json!({"nonsense": true}),
        };
        assert!(envelope.params::<ConnectParams>().is_err());
    }

    #[test]
    fn test_response_ok_err() {
        let id = RequestId::new();
        let ok = ResponseEnvelope::ok(id, MessageKind::InvokeResult, &serde_json::json!(42))
            .unwrap();
        assert!(ok.success);
        let value: i64 = ok.into_result().unwrap();
        assert_eq!(value, 42);

        let err = ResponseEnvelope::err(id, MessageKind::InvokeResult, ProtocolError::UserRejected);
        assert!(!err.success);
        assert_eq!(
            err.into_result::<i64>().unwrap_err(),
            ProtocolError::UserRejected
        );
    }
}
