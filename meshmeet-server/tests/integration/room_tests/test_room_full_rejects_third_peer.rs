use meshmeet_core::{ErrorCode, ParticipantList, SignalRequest};

use crate::integration::{begin_join, create_room, create_test_service, init_tracing};
use crate::utils::TestClient;

#[tokio::test]
async fn test_room_full_rejects_third_peer() {
    init_tracing();
    let service = create_test_service();

    let mut alice = TestClient::bound(&service, "alice").await.unwrap();
    let _: ParticipantList = alice.call(create_room("demo123", 2, None)).await.unwrap();

    let mut bob = TestClient::bound(&service, "bob").await.unwrap();
    bob.request(begin_join("demo123", "")).await.unwrap().unwrap();
    bob.request(SignalRequest::CompleteJoinRoom("demo123".into()))
        .await
        .unwrap()
        .unwrap();
    alice.next_event().await.unwrap();

    let mut carol = TestClient::bound(&service, "carol").await.unwrap();
    let fault = carol
        .request(begin_join("demo123", ""))
        .await
        .unwrap()
        .unwrap_err();
    assert_eq!(fault.code, ErrorCode::RoomFull);

    let info = service.rooms().info("demo123").unwrap();
    let names: Vec<&str> = info.participants.iter().map(|p| p.identity.as_str()).collect();
    assert_eq!(names, vec!["alice", "bob"]);

    alice.expect_silence(100).await.unwrap();
    bob.expect_silence(100).await.unwrap();
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    init_tracing();
    let service = create_test_service();

    let mut alice = TestClient::bound(&service, "alice").await.unwrap();
    let _: ParticipantList = alice
        .call(create_room("locked", 4, Some("hunter2")))
        .await
        .unwrap();

    let mut bob = TestClient::bound(&service, "bob").await.unwrap();
    let fault = bob.request(begin_join("locked", "guess")).await.unwrap().unwrap_err();
    assert_eq!(fault.code, ErrorCode::InvalidPassword);

    bob.request(begin_join("locked", "hunter2")).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_duplicate_room_name() {
    init_tracing();
    let service = create_test_service();

    let mut alice = TestClient::bound(&service, "alice").await.unwrap();
    alice.request(create_room("r", 2, None)).await.unwrap().unwrap();

    let mut bob = TestClient::bound(&service, "bob").await.unwrap();
    let fault = bob.request(create_room("r", 2, None)).await.unwrap().unwrap_err();
    assert_eq!(fault.code, ErrorCode::RoomAlreadyExists);
}
