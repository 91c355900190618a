use meshmeet_core::{JoinAck, PeerLeft, SignalEvent, SignalRequest};

use crate::integration::{begin_join, create_room, create_test_service, init_tracing};
use crate::utils::TestClient;

#[tokio::test]
async fn test_disconnect_triggers_leave() {
    init_tracing();
    let service = create_test_service();

    let mut alice = TestClient::bound(&service, "alice").await.unwrap();
    alice.request(create_room("demo123", 2, None)).await.unwrap().unwrap();

    let mut bob = TestClient::bound(&service, "bob").await.unwrap();
    bob.request(begin_join("demo123", "")).await.unwrap().unwrap();
    bob.request(SignalRequest::CompleteJoinRoom("demo123".into()))
        .await
        .unwrap()
        .unwrap();
    alice.next_event().await.unwrap();

    let bob_session = bob.session_id.clone();
    bob.disconnect();

    let event = alice.next_event().await.unwrap();
    assert!(matches!(event, SignalEvent::OtherLeave(_)));
    let left: PeerLeft = event.decode().unwrap();
    assert_eq!(left.identity.as_str(), "bob");
    assert_eq!(left.session_id, bob_session);
    assert_eq!(left.participants.len(), 1);
}

#[tokio::test]
async fn test_reconnect_reclaims_seat() {
    init_tracing();
    let service = create_test_service();

    let mut alice = TestClient::bound(&service, "alice").await.unwrap();
    alice.request(create_room("demo123", 2, None)).await.unwrap().unwrap();

    let mut bob_first = TestClient::bound(&service, "bob").await.unwrap();
    bob_first.request(begin_join("demo123", "")).await.unwrap().unwrap();

    // Second transport for the same identity while the first is still open.
    let mut bob_second = TestClient::bound(&service, "bob").await.unwrap();
    let ack: JoinAck = bob_second.call(begin_join("demo123", "")).await.unwrap();
    assert_eq!(ack.participants.len(), 2);
    assert_eq!(ack.participants[1].session_id, bob_second.session_id);

    // The stale transport going away must not evict the new one.
    bob_first.disconnect();
    alice.expect_silence(200).await.unwrap();
    let info = service.rooms().info("demo123").unwrap();
    assert_eq!(info.participants.len(), 2);
}
