use meshmeet_client::{MeshError, MeshEvent, SessionPhase};
use meshmeet_core::{Identity, RoomOptions};

use crate::integration::init_tracing;
use crate::utils::harness::TestMesh;

#[tokio::test]
async fn test_one_link_per_identity() {
    init_tracing();
    let mesh = TestMesh::new();
    let mut alice = mesh.participant("alice").await.unwrap();
    let mut bob = mesh.participant("bob").await.unwrap();
    let mut carol = mesh.participant("carol").await.unwrap();

    alice
        .handle
        .create_room_with("trio", RoomOptions::with_capacity(3))
        .await
        .unwrap();
    bob.handle.join_room("trio", "").await.unwrap();
    bob.wait_connected("alice").await.unwrap();
    carol.handle.join_room("trio", "").await.unwrap();

    alice.wait_connected("carol").await.unwrap();
    bob.wait_connected("carol").await.unwrap();
    carol.wait_connected("alice").await.unwrap();
    carol.wait_connected("bob").await.unwrap();

    for (a, b) in [("alice", "bob"), ("alice", "carol"), ("bob", "carol")] {
        assert_eq!(mesh.network.link_count(a, b), 1, "{a} -> {b}");
        assert_eq!(mesh.network.link_count(b, a), 1, "{b} -> {a}");
    }
    assert_eq!(alice.handle.peer_states().await.unwrap().len(), 2);

    carol.handle.leave_room().await.unwrap();
    assert_eq!(carol.snapshot().phase, SessionPhase::Ended);
    assert!(matches!(
        carol.handle.send_text("bye").await,
        Err(MeshError::SessionEnded)
    ));

    alice
        .wait_event("carol leaving", |e| {
            matches!(e, MeshEvent::PeerLeft(id) if id.as_str() == "carol")
        })
        .await
        .unwrap();
    let state = alice
        .wait_state("carol gone", |s| s.participants.len() == 2)
        .await
        .unwrap();
    assert!(!state.peers.contains_key(&Identity::from("carol")));

    let peers = alice.handle.peer_states().await.unwrap();
    assert_eq!(peers.keys().collect::<Vec<_>>(), vec![&Identity::from("bob")]);
    assert!(mesh.network.is_closed("alice", "carol"));

    bob.wait_state("carol gone", |s| {
        !s.peers.contains_key(&Identity::from("carol"))
    })
    .await
    .unwrap();
    assert_eq!(bob.handle.peer_states().await.unwrap().len(), 1);
}
