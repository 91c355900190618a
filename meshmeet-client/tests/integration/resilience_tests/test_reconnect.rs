use meshmeet_client::MeshEvent;
use meshmeet_core::Identity;

use crate::integration::{init_tracing, names};
use crate::utils::harness::TestMesh;

#[tokio::test]
async fn test_rejoin_replaces_the_old_link() {
    init_tracing();
    let mesh = TestMesh::new();
    let (mut alice, bob) = mesh.connected_pair("demo123", 2).await.unwrap();

    // Vanish without leaving; the relay notices the dropped session.
    bob.handle.shutdown().await.unwrap();
    alice
        .wait_event("bob dropping", |e| {
            matches!(e, MeshEvent::PeerLeft(id) if id.as_str() == "bob")
        })
        .await
        .unwrap();
    assert!(alice.snapshot().peers.is_empty());

    let mut bob = mesh.participant("bob").await.unwrap();
    let room = bob.handle.join_room("demo123", "").await.unwrap();
    assert_eq!(names(&room.participants), vec!["alice", "bob"]);

    alice.wait_connected("bob").await.unwrap();
    bob.wait_connected("alice").await.unwrap();

    assert_eq!(mesh.network.link_count("alice", "bob"), 2);
    let peers = alice.handle.peer_states().await.unwrap();
    assert_eq!(peers.keys().collect::<Vec<_>>(), vec![&Identity::from("bob")]);

    alice.handle.send_text("welcome back").await.unwrap();
    bob.wait_event("chat", |e| matches!(e, MeshEvent::TextMessage(m) if m.text == "welcome back"))
        .await
        .unwrap();
}
