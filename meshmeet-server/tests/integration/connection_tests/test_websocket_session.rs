use futures::{SinkExt, StreamExt};
use meshmeet_core::{Identity, RequestFrame, RequestId, ServerFrame, SignalRequest};
use meshmeet_server::{ServerConfig, serve_on};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::integration::init_tracing;

#[tokio::test]
async fn test_websocket_session() {
    init_tracing();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(serve_on(listener, ServerConfig::default()));

    let (mut ws, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("Failed to connect to relay");

    let frame = RequestFrame {
        id: RequestId(1),
        request: SignalRequest::BindIdentity(Identity::from("alice")),
    };
    ws.send(Message::Text(serde_json::to_string(&frame).unwrap()))
        .await
        .unwrap();

    let reply = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("no reply from relay")
        .expect("socket closed")
        .unwrap();
    let Message::Text(text) = reply else {
        panic!("expected text frame, got {reply:?}");
    };
    match serde_json::from_str::<ServerFrame>(&text).unwrap() {
        ServerFrame::Ack { id, payload } => {
            assert_eq!(id, RequestId(1));
            assert_eq!(payload, "\"alice\"");
        }
        other => panic!("expected ack, got {other:?}"),
    }

    ws.close(None).await.unwrap();
    server.abort();
}
