use crate::error::SignalingError;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Raw text transport to the relay: one outbound and one inbound queue.
///
/// The inbound queue ending means the transport is gone.
pub struct SignalingConnection {
    pub(crate) outgoing: mpsc::UnboundedSender<String>,
    pub(crate) incoming: mpsc::UnboundedReceiver<String>,
}

impl SignalingConnection {
    /// Wraps an already established pair of queues, e.g. an in-process relay session.
    pub fn from_parts(
        outgoing: mpsc::UnboundedSender<String>,
        incoming: mpsc::UnboundedReceiver<String>,
    ) -> Self {
        Self { outgoing, incoming }
    }

    /// Opens a WebSocket to the relay.
    pub async fn connect(url: &str) -> Result<Self, SignalingError> {
        info!("Connecting to signaling server: {}", url);
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| SignalingError::Connect {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        info!("Connected to signaling server");

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<String>();
        let (incoming_tx, incoming) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            while let Some(text) = outgoing_rx.recv().await {
                if let Err(e) = ws_sender.send(Message::Text(text)).await {
                    warn!("Failed to send to signaling server: {}", e);
                    break;
                }
            }
            let _ = ws_sender.close().await;
            debug!("Signaling sender task ended");
        });

        tokio::spawn(async move {
            while let Some(msg) = ws_receiver.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if incoming_tx.send(text).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        info!("Signaling server closed the connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Signaling socket error: {}", e);
                        break;
                    }
                }
            }
            debug!("Signaling receiver task ended");
        });

        Ok(Self { outgoing, incoming })
    }
}
