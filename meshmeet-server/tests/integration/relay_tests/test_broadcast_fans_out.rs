use meshmeet_core::{
    BroadcastRequest, DeliveryAck, ErrorCode, MessageReceived, RelayedMessage, SignalRequest,
};
use serde_json::json;

use crate::integration::{begin_join, create_room, create_test_service, init_tracing};
use crate::utils::TestClient;

#[tokio::test]
async fn test_broadcast_fans_out() {
    init_tracing();
    let service = create_test_service();

    let mut alice = TestClient::bound(&service, "alice").await.unwrap();
    alice.request(create_room("r", 4, None)).await.unwrap().unwrap();

    let mut others = Vec::new();
    for name in ["bob", "carol"] {
        let mut client = TestClient::bound(&service, name).await.unwrap();
        client.request(begin_join("r", "")).await.unwrap().unwrap();
        others.push(client);
    }

    let ack: DeliveryAck = alice
        .call(SignalRequest::BroadcastMessage(BroadcastRequest {
            room_name: "r".into(),
            message: json!({"kind": "raise-hand"}),
        }))
        .await
        .unwrap();
    assert_eq!(ack.delivered, 2);

    for client in &mut others {
        let received: MessageReceived = client.next_event().await.unwrap().decode().unwrap();
        assert_eq!(received.identity.as_str(), "alice");
        assert_eq!(
            received.message,
            RelayedMessage::Broadcast(json!({"kind": "raise-hand"}))
        );
    }
    alice.expect_silence(100).await.unwrap();
}

#[tokio::test]
async fn test_broadcast_requires_membership() {
    init_tracing();
    let service = create_test_service();

    let mut alice = TestClient::bound(&service, "alice").await.unwrap();
    alice.request(create_room("r", 4, None)).await.unwrap().unwrap();

    let mut eve = TestClient::bound(&service, "eve").await.unwrap();
    let fault = eve
        .request(SignalRequest::BroadcastMessage(BroadcastRequest {
            room_name: "r".into(),
            message: json!("hi"),
        }))
        .await
        .unwrap()
        .unwrap_err();
    assert_eq!(fault.code, ErrorCode::NotInRoom);
}
