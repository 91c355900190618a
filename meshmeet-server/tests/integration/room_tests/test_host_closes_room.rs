use meshmeet_core::{ErrorCode, LeaveAck, PeerLeft, SignalEvent, SignalRequest};

use crate::integration::{begin_join, create_room, create_test_service, init_tracing};
use crate::utils::TestClient;

async fn room_with_alice_and_bob(service: &meshmeet_server::SignalingService) -> (TestClient, TestClient) {
    let mut alice = TestClient::bound(service, "alice").await.unwrap();
    alice.request(create_room("demo123", 4, None)).await.unwrap().unwrap();

    let mut bob = TestClient::bound(service, "bob").await.unwrap();
    bob.request(begin_join("demo123", "")).await.unwrap().unwrap();
    bob.request(SignalRequest::CompleteJoinRoom("demo123".into()))
        .await
        .unwrap()
        .unwrap();
    alice.next_event().await.unwrap();
    (alice, bob)
}

#[tokio::test]
async fn test_host_closes_room() {
    init_tracing();
    let service = create_test_service();
    let (mut alice, mut bob) = room_with_alice_and_bob(&service).await;

    let fault = bob
        .request(SignalRequest::CloseRoom("demo123".into()))
        .await
        .unwrap()
        .unwrap_err();
    assert_eq!(fault.code, ErrorCode::NotHost);

    alice
        .request(SignalRequest::CloseRoom("demo123".into()))
        .await
        .unwrap()
        .unwrap();

    let event = bob.next_event().await.unwrap();
    assert!(matches!(event, SignalEvent::RoomClosed(_)));
    let name: String = event.decode().unwrap();
    assert_eq!(name, "demo123");
    assert!(service.rooms().info("demo123").is_none());
}

#[tokio::test]
async fn test_leave_notifies_remaining_members() {
    init_tracing();
    let service = create_test_service();
    let (mut alice, mut bob) = room_with_alice_and_bob(&service).await;

    let ack: LeaveAck = bob
        .call(SignalRequest::LeaveRoom("demo123".into()))
        .await
        .unwrap();
    assert_eq!(ack.participants.len(), 1);

    let left: PeerLeft = alice.next_event().await.unwrap().decode().unwrap();
    assert_eq!(left.identity.as_str(), "bob");
    assert_eq!(left.session_id, bob.session_id);

    let fault = bob
        .request(SignalRequest::LeaveRoom("demo123".into()))
        .await
        .unwrap()
        .unwrap_err();
    assert_eq!(fault.code, ErrorCode::NotInRoom);
}
