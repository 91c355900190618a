use meshmeet_core::{
    DeliveryAck, DirectMessageRequest, ErrorCode, IceCandidate, MessageReceived,
    NegotiationMessage, RelayedMessage, ServerFrame, SessionDescription, SessionId, SignalRequest,
};

use crate::integration::{create_test_service, init_tracing};
use crate::utils::TestClient;

#[tokio::test]
async fn test_direct_message_relay() {
    init_tracing();
    let service = create_test_service();

    let mut alice = TestClient::bound(&service, "alice").await.unwrap();
    let mut bob = TestClient::bound(&service, "bob").await.unwrap();

    let offer = NegotiationMessage::Offer(SessionDescription::new("v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\n"));
    let ack: DeliveryAck = alice
        .call(SignalRequest::SendMessage(DirectMessageRequest {
            target_session_id: bob.session_id.clone(),
            message: offer.clone(),
        }))
        .await
        .unwrap();
    assert_eq!(ack.delivered, 1);

    let received: MessageReceived = bob.next_event().await.unwrap().decode().unwrap();
    assert_eq!(received.identity.as_str(), "alice");
    assert_eq!(received.session_id, alice.session_id);
    assert_eq!(received.message, RelayedMessage::Direct(offer));
}

#[tokio::test]
async fn test_candidate_fields_survive_relay() {
    init_tracing();
    let service = create_test_service();

    let mut alice = TestClient::bound(&service, "alice").await.unwrap();
    let mut bob = TestClient::bound(&service, "bob").await.unwrap();

    let candidate = NegotiationMessage::Candidate(IceCandidate {
        candidate: "candidate:1 1 udp 2130706431 192.168.1.4 54321 typ host".into(),
        sdp_mid: Some("0".into()),
        sdp_m_line_index: Some(0),
    });
    alice
        .request(SignalRequest::SendMessage(DirectMessageRequest {
            target_session_id: bob.session_id.clone(),
            message: candidate.clone(),
        }))
        .await
        .unwrap()
        .unwrap();

    let received: MessageReceived = bob.next_event().await.unwrap().decode().unwrap();
    assert_eq!(received.message, RelayedMessage::Direct(candidate));
}

#[tokio::test]
async fn test_unknown_target_is_rejected() {
    init_tracing();
    let service = create_test_service();

    let mut alice = TestClient::bound(&service, "alice").await.unwrap();
    let fault = alice
        .request(SignalRequest::SendMessage(DirectMessageRequest {
            target_session_id: SessionId::from("ghost"),
            message: NegotiationMessage::Answer(SessionDescription::new("v=0")),
        }))
        .await
        .unwrap()
        .unwrap_err();
    assert_eq!(fault.code, ErrorCode::PeerNotFound);
}

#[tokio::test]
async fn test_malformed_frame_is_rejected_with_its_id() {
    init_tracing();
    let service = create_test_service();

    let mut alice = TestClient::connect(&service);
    alice
        .send_raw(r#"{"id":42,"request":{"op":"teleport","d":null}}"#)
        .unwrap();

    match alice.next_frame().await.unwrap() {
        ServerFrame::Reject { id, fault } => {
            assert_eq!(id.0, 42);
            assert_eq!(fault.code, ErrorCode::MalformedRequest);
        }
        other => panic!("expected reject, got {other:?}"),
    }
}
