use meshmeet_client::peer::PeerState;
use meshmeet_client::{MeshEvent, SessionPhase};
use meshmeet_core::{Identity, RoomOptions};
use serde_json::json;

use crate::integration::{init_tracing, names};
use crate::utils::harness::TestMesh;

#[tokio::test]
async fn test_two_peers_connect_and_chat() {
    init_tracing();
    let mesh = TestMesh::new();
    let mut alice = mesh.participant("alice").await.unwrap();
    let mut bob = mesh.participant("bob").await.unwrap();

    let participants = alice
        .handle
        .create_room_with("demo123", RoomOptions::with_capacity(2))
        .await
        .unwrap();
    assert_eq!(names(&participants), vec!["alice"]);
    assert_eq!(alice.snapshot().phase, SessionPhase::InRoom);

    let room = bob.handle.join_room("demo123", "").await.unwrap();
    assert_eq!(names(&room.participants), vec!["alice", "bob"]);
    assert_eq!(room.host, Identity::from("alice"));

    alice
        .wait_event("bob joining", |e| {
            matches!(e, MeshEvent::PeerJoined(id) if id.as_str() == "bob")
        })
        .await
        .unwrap();

    let state = alice.wait_connected("bob").await.unwrap();
    assert_eq!(names(&state.participants), vec!["alice", "bob"]);
    bob.wait_connected("alice").await.unwrap();
    assert!(mesh.network.is_connected("alice", "bob"));
    assert!(mesh.network.applied_candidates("bob", "alice") >= 1);

    let report = alice.handle.send_text("hello bob").await.unwrap();
    assert_eq!(report.delivered, vec![Identity::from("bob")]);
    assert!(report.is_complete());

    let MeshEvent::TextMessage(message) = bob
        .wait_event("chat", |e| matches!(e, MeshEvent::TextMessage(_)))
        .await
        .unwrap()
    else {
        unreachable!()
    };
    assert_eq!(message.from, Identity::from("alice"));
    assert_eq!(message.text, "hello bob");

    let state = bob
        .wait_state("alice's video", |s| {
            s.remote_streams.contains_key(&Identity::from("alice"))
        })
        .await
        .unwrap();
    assert_eq!(state.messages.len(), 1);
    assert_eq!(state.peers.get(&Identity::from("alice")), Some(&PeerState::Connected));

    let own = alice.snapshot().messages;
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].from, Identity::from("alice"));
}

#[tokio::test]
async fn test_room_broadcast_reaches_peers() {
    init_tracing();
    let mesh = TestMesh::new();
    let (alice, mut bob) = mesh.connected_pair("demo123", 2).await.unwrap();

    let delivered = alice
        .handle
        .broadcast_signal(json!({ "reaction": "wave" }))
        .await
        .unwrap();
    assert_eq!(delivered, 1);

    let event = bob
        .wait_event("broadcast", |e| matches!(e, MeshEvent::Broadcast { .. }))
        .await
        .unwrap();
    assert_eq!(
        event,
        MeshEvent::Broadcast {
            from: Identity::from("alice"),
            payload: json!({ "reaction": "wave" }),
        }
    );
}
