use crate::signaling::SignalingService;
use meshmeet_core::SessionId;
use tokio::sync::mpsc;
use tracing::debug;

/// An in-process session: the same frames a WebSocket would carry, over channels.
///
/// Dropping `outgoing` is the equivalent of closing the socket.
pub struct LocalSession {
    pub session_id: SessionId,
    pub outgoing: mpsc::UnboundedSender<String>,
    pub incoming: mpsc::UnboundedReceiver<String>,
}

impl SignalingService {
    pub fn connect_local(&self) -> LocalSession {
        let (server_tx, incoming) = mpsc::unbounded_channel();
        let (outgoing, mut client_rx) = mpsc::unbounded_channel::<String>();
        let session_id = self.register(server_tx);

        let service = self.clone();
        let sid = session_id.clone();
        tokio::spawn(async move {
            while let Some(text) = client_rx.recv().await {
                service.handle_text(&sid, &text);
            }
            debug!("Local session {} closed", sid);
            service.unregister(&sid);
        });

        LocalSession {
            session_id,
            outgoing,
            incoming,
        }
    }
}
