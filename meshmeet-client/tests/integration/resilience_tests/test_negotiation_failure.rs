use meshmeet_client::peer::PeerState;
use meshmeet_client::{MeshError, PeerError};
use meshmeet_core::{Identity, RoomOptions};

use crate::integration::init_tracing;
use crate::utils::harness::TestMesh;

#[tokio::test]
async fn test_failed_offer_is_contained_and_retried() {
    init_tracing();
    let mesh = TestMesh::new();
    mesh.network.fail_offers_for("alice", true);

    let mut alice = mesh.participant("alice").await.unwrap();
    let mut bob = mesh.participant("bob").await.unwrap();
    alice
        .handle
        .create_room_with("demo123", RoomOptions::with_capacity(2))
        .await
        .unwrap();
    bob.handle.join_room("demo123", "").await.unwrap();

    let bob_id = Identity::from("bob");
    alice
        .wait_state("link to bob", |s| {
            s.peers.get(&bob_id) == Some(&PeerState::Negotiating)
        })
        .await
        .unwrap();

    let report = alice.handle.send_text("anyone?").await.unwrap();
    assert!(report.delivered.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, bob_id);
    assert!(matches!(report.failed[0].1, PeerError::ChannelNotOpen(_)));

    mesh.network.fail_offers_for("alice", false);
    alice.handle.renegotiate(&bob_id).await.unwrap();

    alice.wait_connected("bob").await.unwrap();
    bob.wait_connected("alice").await.unwrap();
    assert_eq!(mesh.network.link_count("alice", "bob"), 2);
    assert!(!mesh.network.is_closed("alice", "bob"));

    let err = alice
        .handle
        .renegotiate(&Identity::from("mallory"))
        .await
        .unwrap_err();
    assert!(matches!(err, MeshError::UnknownPeer(id) if id.as_str() == "mallory"));
}
