use meshmeet_client::{MeshError, MeshEvent, SessionPhase, SignalingError};
use serde_json::json;

use crate::integration::init_tracing;
use crate::utils::harness::TestMesh;

#[tokio::test]
async fn test_lost_relay_is_reported_not_retried() {
    init_tracing();
    let mesh = TestMesh::new();
    let (mut alice, mut bob) = mesh.connected_pair("demo123", 2).await.unwrap();

    bob.sever_signaling();
    bob.wait_event("signaling lost", |e| *e == MeshEvent::SignalingLost)
        .await
        .unwrap();
    assert_eq!(bob.snapshot().phase, SessionPhase::Disconnected);

    let err = bob.handle.broadcast_signal(json!("ping")).await.unwrap_err();
    assert!(matches!(
        err,
        MeshError::Signaling(SignalingError::TransportDisconnected)
    ));

    // The relay drops the dead session and the others let go of bob.
    alice
        .wait_event("bob dropping", |e| {
            matches!(e, MeshEvent::PeerLeft(id) if id.as_str() == "bob")
        })
        .await
        .unwrap();
    assert!(mesh.network.is_closed("alice", "bob"));

    // Recovery is an explicit rejoin on a fresh session.
    let mut bob = mesh.participant("bob").await.unwrap();
    bob.handle.join_room("demo123", "").await.unwrap();
    bob.wait_connected("alice").await.unwrap();
    alice.wait_connected("bob").await.unwrap();

    alice.handle.send_text("welcome back").await.unwrap();
    bob.wait_event("chat", |e| {
        matches!(e, MeshEvent::TextMessage(m) if m.text == "welcome back")
    })
    .await
    .unwrap();
}
