use meshmeet_client::SessionPhase;
use meshmeet_core::ErrorCode;

use crate::integration::{init_tracing, names};
use crate::utils::harness::TestMesh;

#[tokio::test]
async fn test_third_participant_gets_room_full() {
    init_tracing();
    let mesh = TestMesh::new();
    let (alice, bob) = mesh.connected_pair("demo123", 2).await.unwrap();

    let carol = mesh.participant("carol").await.unwrap();
    let err = carol.handle.join_room("demo123", "").await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::RoomFull));

    assert_eq!(names(&alice.snapshot().participants), vec!["alice", "bob"]);
    assert_eq!(names(&bob.snapshot().participants), vec!["alice", "bob"]);
    assert_eq!(carol.snapshot().phase, SessionPhase::Idle);
    assert_eq!(carol.devices.acquisitions(), 0);
    assert_eq!(mesh.network.link_count("alice", "carol"), 0);
}

#[tokio::test]
async fn test_unknown_room_and_wrong_password() {
    init_tracing();
    let mesh = TestMesh::new();
    let alice = mesh.participant("alice").await.unwrap();
    let bob = mesh.participant("bob").await.unwrap();

    let err = bob.handle.join_room("nowhere", "").await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::RoomNotFound));

    alice
        .handle
        .create_room_with(
            "locked",
            meshmeet_core::RoomOptions::with_capacity(4).password("hunter2"),
        )
        .await
        .unwrap();
    assert!(alice.snapshot().room.unwrap().has_password);

    let err = bob.handle.join_room("locked", "guess").await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::InvalidPassword));

    let room = bob.handle.join_room("locked", "hunter2").await.unwrap();
    assert_eq!(names(&room.participants), vec!["alice", "bob"]);
}
