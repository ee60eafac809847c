//! End-to-end flows: page provider -> trusted relay -> broker -> vault.

use std::sync::Arc;
use std::time::Duration;

use octra_broker::{
    AutoApproveSurface, AutoDenySurface, Broker, BrokerConfig, EchoExecutor, MemoryKvStore, Relay,
    SilentSurface,
};
use octra_capabilities::CapabilitySpec;
use octra_core::{
    CapabilityId, CircleId, InvocationPayload, InvokeParams, MessageKind, Origin, ProtocolError,
    RequestEnvelope, Scope, Transport,
};
use octra_crypto::{Digest, SoftwareVault};
use octra_provider::{EventKind, WalletProvider};

const APP_ORIGIN: &str = "https://app.example";

fn broker_with_surface(surface: Arc<dyn octra_broker::ApprovalSurface>) -> Arc<Broker> {
    Arc::new(Broker::new(
        Arc::new(SoftwareVault::generate()),
        surface,
        Arc::new(EchoExecutor),
        Arc::new(MemoryKvStore::new()),
        BrokerConfig::default(),
    ))
}

fn provider_for(broker: &Arc<Broker>, origin: &str) -> WalletProvider {
    let page_origin = Origin::parse(origin).unwrap();
    let relay = Arc::new(Relay::new(Arc::clone(broker), page_origin.clone()));
    WalletProvider::new(relay, page_origin, "Demo App")
}

fn demo_spec() -> CapabilitySpec {
    CapabilitySpec {
        circle: CircleId::new("demo").unwrap(),
        // Deliberately unsorted; the issued capability must come back sorted.
        methods: vec!["submit_input".into(), "read_stats".into()],
        scope: Scope::Compute,
        encrypted: false,
        ttl_ms: 60_000,
    }
}

#[tokio::test]
async fn grant_and_invoke_round_trip() {
    let broker = broker_with_surface(Arc::new(AutoApproveSurface));
    let provider = provider_for(&broker, APP_ORIGIN);

    let connection = provider.connect(CircleId::new("demo").unwrap()).await.unwrap();
    assert_eq!(connection.origin.as_str(), APP_ORIGIN);

    let capability = provider.request_capability(demo_spec()).await.unwrap();
    assert_eq!(capability.methods, vec!["read_stats", "submit_input"]);
    assert!(capability.verify_signature().is_ok());

    // The id is usable immediately.
    let result = provider.invoke(capability.id, "read_stats", None).await.unwrap();
    assert_eq!(result["method"], "read_stats");
    assert_eq!(result["circle"], "demo");

    // A method outside the grant fails with the specific violation.
    let err = provider
        .invoke(capability.id, "unlisted_method", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ProtocolError::ScopeViolation { .. }));
}

#[tokio::test]
async fn sequential_invokes_carry_increasing_nonces() {
    let broker = broker_with_surface(Arc::new(AutoApproveSurface));
    let provider = provider_for(&broker, APP_ORIGIN);

    provider.connect(CircleId::new("demo").unwrap()).await.unwrap();
    let capability = provider.request_capability(demo_spec()).await.unwrap();

    let mut nonces = Vec::new();
    for _ in 0..3 {
        let result = provider.invoke(capability.id, "read_stats", None).await.unwrap();
        nonces.push(result["nonce"].as_u64().unwrap());
    }
    let expected: Vec<u64> = (1..=3).map(|i| capability.nonce.saturating_add(i)).collect();
    assert_eq!(nonces, expected);
}

#[tokio::test]
async fn concurrent_invokes_do_not_collide() {
    let broker = broker_with_surface(Arc::new(AutoApproveSurface));
    let provider = Arc::new(provider_for(&broker, APP_ORIGIN));

    provider.connect(CircleId::new("demo").unwrap()).await.unwrap();
    let capability = provider.request_capability(demo_spec()).await.unwrap();

    let (a, b) = tokio::join!(
        provider.invoke(capability.id, "read_stats", None),
        provider.invoke(capability.id, "read_stats", None),
    );
    let nonce_a = a.unwrap()["nonce"].as_u64().unwrap();
    let nonce_b = b.unwrap()["nonce"].as_u64().unwrap();
    assert_ne!(nonce_a, nonce_b);
    assert_eq!(
        {
            let mut sorted = vec![nonce_a, nonce_b];
            sorted.sort_unstable();
            sorted
        },
        vec![
            capability.nonce.saturating_add(1),
            capability.nonce.saturating_add(2)
        ]
    );
}

#[tokio::test]
async fn opaque_payload_is_hashed_never_inspected() {
    let broker = broker_with_surface(Arc::new(AutoApproveSurface));
    let provider = provider_for(&broker, APP_ORIGIN);

    provider.connect(CircleId::new("demo").unwrap()).await.unwrap();
    let mut spec = demo_spec();
    spec.encrypted = true;
    let capability = provider.request_capability(spec).await.unwrap();
    assert!(capability.encrypted);

    let ciphertext = vec![0xde, 0xad, 0xbe, 0xef];
    let payload = InvocationPayload::Opaque {
        scheme: "tfhe-v1".into(),
        ciphertext: ciphertext.clone(),
        metadata: serde_json::json!({"slots": 4}),
    };
    let result = provider
        .invoke(capability.id, "submit_input", Some(payload))
        .await
        .unwrap();

    // The executor only ever saw the ciphertext digest.
    assert_eq!(
        result["payload_hash"].as_str().unwrap(),
        Digest::hash(&ciphertext).to_hex()
    );
}

#[tokio::test]
async fn falsified_origin_claim_is_rejected() {
    let broker = broker_with_surface(Arc::new(AutoApproveSurface));

    // A legitimate page gets a capability.
    let victim = provider_for(&broker, APP_ORIGIN);
    victim.connect(CircleId::new("demo").unwrap()).await.unwrap();
    let capability = victim.request_capability(demo_spec()).await.unwrap();

    // An attacker page on another origin replays the capability id and
    // claims the victim's origin in its own request. The relay stamps the
    // attacker's true origin, so the broker rejects the claim outright.
    let attacker_origin = Origin::parse("https://attacker.example").unwrap();
    let attacker_relay = Arc::new(Relay::new(Arc::clone(&broker), attacker_origin));
    let invocation = octra_capabilities::SignedInvocation::build(
        &capability.circle,
        &capability.app_origin,
        0,
        "main",
        capability.id,
        "read_stats",
        capability.nonce.saturating_add(1),
        None,
    );
    let envelope = RequestEnvelope::page(
        MessageKind::InvokeRequest,
        &InvokeParams {
            app_origin: capability.app_origin.clone(), // falsified claim
            capability_id: capability.id,
            method: "read_stats".into(),
            invocation: serde_json::to_value(&invocation).unwrap(),
            payload: None,
        },
    )
    .unwrap();

    let response = attacker_relay.send(envelope).await.unwrap();
    let err = response.into_result::<serde_json::Value>().unwrap_err();
    assert!(matches!(err, ProtocolError::OriginMismatch { .. }));
    assert!(err.is_security_fault());

    // The victim is unaffected and can still invoke.
    assert!(victim.invoke(capability.id, "read_stats", None).await.is_ok());
}

#[tokio::test]
async fn rejection_and_timeout_are_recoverable_outcomes() {
    // Denial.
    let denying = broker_with_surface(Arc::new(AutoDenySurface));
    let provider = provider_for(&denying, APP_ORIGIN);
    let err = provider
        .connect(CircleId::new("demo").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err, ProtocolError::UserRejected);
    assert!(err.is_recoverable());
    assert!(!err.is_security_fault());

    // Timeout.
    let silent = Arc::new(Broker::new(
        Arc::new(SoftwareVault::generate()),
        Arc::new(SilentSurface),
        Arc::new(EchoExecutor),
        Arc::new(MemoryKvStore::new()),
        BrokerConfig {
            connection_timeout: Duration::from_millis(20),
            ..BrokerConfig::default()
        },
    ));
    let provider = provider_for(&silent, APP_ORIGIN);
    let err = provider
        .connect(CircleId::new("demo").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, ProtocolError::Timeout { .. }));
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn validation_happens_before_dispatch() {
    let broker = broker_with_surface(Arc::new(AutoApproveSurface));
    let provider = provider_for(&broker, APP_ORIGIN);
    provider.connect(CircleId::new("demo").unwrap()).await.unwrap();

    let mut empty_methods = demo_spec();
    empty_methods.methods.clear();
    assert!(matches!(
        provider.request_capability(empty_methods).await.unwrap_err(),
        ProtocolError::Validation { .. }
    ));

    let mut bad_ttl = demo_spec();
    bad_ttl.ttl_ms = -5;
    assert!(matches!(
        provider.request_capability(bad_ttl).await.unwrap_err(),
        ProtocolError::Validation { .. }
    ));
}

#[tokio::test]
async fn capability_requires_connection_first() {
    let broker = broker_with_surface(Arc::new(AutoApproveSurface));
    let provider = provider_for(&broker, APP_ORIGIN);

    assert_eq!(
        provider.request_capability(demo_spec()).await.unwrap_err(),
        ProtocolError::NotConnected
    );
    let err = provider
        .invoke(CapabilityId::new(), "read_stats", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ProtocolError::Capability { .. }));
}

#[tokio::test]
async fn events_fire_on_lifecycle_transitions() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let broker = broker_with_surface(Arc::new(AutoApproveSurface));
    let provider = provider_for(&broker, APP_ORIGIN);

    let connects = Arc::new(AtomicUsize::new(0));
    let grants = Arc::new(AtomicUsize::new(0));
    let revokes = Arc::new(AtomicUsize::new(0));

    let c = Arc::clone(&connects);
    provider.on(EventKind::Connect, move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    let g = Arc::clone(&grants);
    provider.on(EventKind::CapabilityGranted, move |_| {
        g.fetch_add(1, Ordering::SeqCst);
    });
    let r = Arc::clone(&revokes);
    let revoke_listener = provider.on(EventKind::CapabilityRevoked, move |_| {
        r.fetch_add(1, Ordering::SeqCst);
    });

    provider.connect(CircleId::new("demo").unwrap()).await.unwrap();
    let capability = provider.request_capability(demo_spec()).await.unwrap();
    provider.revoke_capability(capability.id).unwrap();

    assert_eq!(connects.load(Ordering::SeqCst), 1);
    assert_eq!(grants.load(Ordering::SeqCst), 1);
    assert_eq!(revokes.load(Ordering::SeqCst), 1);

    // A revoked capability is unusable.
    let err = provider.invoke(capability.id, "read_stats", None).await.unwrap_err();
    assert_eq!(err, ProtocolError::CapabilityRevoked);

    // Removed listeners stay silent.
    provider.off(EventKind::CapabilityRevoked, revoke_listener);
}
