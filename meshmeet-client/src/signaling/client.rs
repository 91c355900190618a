use crate::error::SignalingError;
use crate::signaling::{SignalingConnection, SignalingHandlers};
use meshmeet_core::{
    BroadcastRequest, CompleteJoinAck, CreateRoomRequest, DeliveryAck, DirectMessageRequest,
    Identity, JoinAck, JoinRoomRequest, LeaveAck, MessageReceived, NegotiationMessage,
    ParticipantList, PeerJoined, PeerLeft, RequestFrame, RequestId, RoomInfo, RoomOptions,
    ServerFrame, SessionId, SignalEvent, SignalRequest,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

type Reply = Result<String, SignalingError>;

struct ClientInner {
    outgoing: Mutex<Option<mpsc::UnboundedSender<String>>>,
    pending: Mutex<HashMap<RequestId, oneshot::Sender<Reply>>>,
    handlers: Mutex<SignalingHandlers>,
    next_id: AtomicU64,
    connected: AtomicBool,
    closing: AtomicBool,
    timeout: Duration,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl ClientInner {
    fn fail_pending(&self) {
        let drained: Vec<_> = lock(&self.pending).drain().collect();
        if !drained.is_empty() {
            debug!("Failing {} pending requests", drained.len());
        }
        for (_, tx) in drained {
            let _ = tx.send(Err(SignalingError::TransportDisconnected));
        }
    }

    fn resolve(&self, id: RequestId, reply: Reply) {
        match lock(&self.pending).remove(&id) {
            Some(tx) => {
                let _ = tx.send(reply);
            }
            None => debug!("Reply for unknown or expired request {}", id.0),
        }
    }

    fn dispatch(&self, event: SignalEvent) {
        let handlers = lock(&self.handlers).clone();
        let name = event.name();
        let result = match event {
            SignalEvent::OtherJoin(_) => event.decode::<PeerJoined>().map(|body| {
                if let Some(h) = &handlers.on_peer_joined {
                    h(body);
                }
            }),
            SignalEvent::OtherLeave(_) => event.decode::<PeerLeft>().map(|body| {
                if let Some(h) = &handlers.on_peer_left {
                    h(body);
                }
            }),
            SignalEvent::RoomClosed(_) => event.decode::<String>().map(|room| {
                if let Some(h) = &handlers.on_room_closed {
                    h(room);
                }
            }),
            SignalEvent::ReceiveMessage(_) => event.decode::<MessageReceived>().map(|body| {
                if let Some(h) = &handlers.on_message_received {
                    h(body);
                }
            }),
        };
        if let Err(e) = result {
            warn!("Dropping undecodable '{}' event: {}", name, e);
        }
    }

    fn on_frame(&self, text: &str) {
        match serde_json::from_str::<ServerFrame>(text) {
            Ok(ServerFrame::Ack { id, payload }) => self.resolve(id, Ok(payload)),
            Ok(ServerFrame::Reject { id, fault }) => {
                self.resolve(id, Err(SignalingError::Rejected(fault)))
            }
            Ok(ServerFrame::Event { event }) => self.dispatch(event),
            Err(e) => warn!("Invalid frame from signaling server: {}", e),
        }
    }
}

/// Typed RPC surface of the relay plus push-event dispatch.
///
/// Cheap to clone; all clones share one transport. There is no automatic
/// reconnect: once disconnected every call fails with
/// [`SignalingError::TransportDisconnected`].
#[derive(Clone)]
pub struct SignalingClient {
    inner: Arc<ClientInner>,
}

impl SignalingClient {
    pub fn new(connection: SignalingConnection, timeout: Duration) -> Self {
        let SignalingConnection {
            outgoing,
            mut incoming,
        } = connection;

        let inner = Arc::new(ClientInner {
            outgoing: Mutex::new(Some(outgoing)),
            pending: Mutex::new(HashMap::new()),
            handlers: Mutex::new(SignalingHandlers::default()),
            next_id: AtomicU64::new(1),
            connected: AtomicBool::new(true),
            closing: AtomicBool::new(false),
            timeout,
        });

        let reader = inner.clone();
        tokio::spawn(async move {
            while let Some(text) = incoming.recv().await {
                reader.on_frame(&text);
            }

            reader.connected.store(false, Ordering::SeqCst);
            lock(&reader.outgoing).take();
            reader.fail_pending();

            if reader.closing.load(Ordering::SeqCst) {
                debug!("Signaling transport closed");
                return;
            }
            warn!("Signaling transport lost");
            let handler = lock(&reader.handlers).on_disconnected.clone();
            if let Some(h) = handler {
                h();
            }
        });

        Self { inner }
    }

    /// Opens a WebSocket connection and wraps it.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, SignalingError> {
        let connection = SignalingConnection::connect(url).await?;
        Ok(Self::new(connection, timeout))
    }

    /// Replaces the whole handler set.
    pub fn set_handlers(&self, handlers: SignalingHandlers) {
        *lock(&self.inner.handlers) = handlers;
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Closes the transport. Pending calls fail; `on_disconnected` is not invoked.
    pub fn disconnect(&self) {
        self.inner.closing.store(true, Ordering::SeqCst);
        self.inner.connected.store(false, Ordering::SeqCst);
        if lock(&self.inner.outgoing).take().is_some() {
            info!("Disconnecting from signaling server");
        }
        self.inner.fail_pending();
    }

    async fn call<T: DeserializeOwned>(&self, request: SignalRequest) -> Result<T, SignalingError> {
        let op = request.op();
        let id = RequestId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        let json = serde_json::to_string(&RequestFrame { id, request })?;

        let (tx, rx) = oneshot::channel();
        lock(&self.inner.pending).insert(id, tx);

        let sent = lock(&self.inner.outgoing)
            .as_ref()
            .is_some_and(|out| out.send(json).is_ok());
        if !sent {
            lock(&self.inner.pending).remove(&id);
            return Err(SignalingError::TransportDisconnected);
        }
        debug!("-> {} (#{})", op, id.0);

        let payload = match tokio::time::timeout(self.inner.timeout, rx).await {
            Ok(Ok(reply)) => reply?,
            Ok(Err(_)) => return Err(SignalingError::TransportDisconnected),
            Err(_) => {
                lock(&self.inner.pending).remove(&id);
                return Err(SignalingError::Timeout { op });
            }
        };
        Ok(serde_json::from_str(&payload)?)
    }

    /// Must precede every other call.
    pub async fn bind_identity(&self, identity: &Identity) -> Result<Identity, SignalingError> {
        self.call(SignalRequest::BindIdentity(identity.clone())).await
    }

    pub async fn create_room(&self, room_name: &str) -> Result<ParticipantList, SignalingError> {
        self.call(SignalRequest::CreateRoom(CreateRoomRequest {
            room_name: room_name.to_string(),
            capacity: None,
            password: None,
        }))
        .await
    }

    pub async fn create_room_with(
        &self,
        room_name: &str,
        options: &RoomOptions,
    ) -> Result<ParticipantList, SignalingError> {
        self.call(SignalRequest::CreateRoom(CreateRoomRequest {
            room_name: room_name.to_string(),
            capacity: Some(options.capacity),
            password: options.password.clone(),
        }))
        .await
    }

    /// First join phase: the relay checks password and capacity and seats us,
    /// but does not announce us yet.
    pub async fn begin_join(&self, room_name: &str, password: &str) -> Result<JoinAck, SignalingError> {
        self.call(SignalRequest::BeginJoinRoom(JoinRoomRequest {
            room_name: room_name.to_string(),
            password: password.to_string(),
        }))
        .await
    }

    /// Second join phase: existing members get `other-join` and start offering.
    pub async fn complete_join(&self, room_name: &str) -> Result<CompleteJoinAck, SignalingError> {
        self.call(SignalRequest::CompleteJoinRoom(room_name.to_string()))
            .await
    }

    pub async fn leave_room(&self, room_name: &str) -> Result<LeaveAck, SignalingError> {
        self.call(SignalRequest::LeaveRoom(room_name.to_string())).await
    }

    pub async fn close_room(&self, room_name: &str) -> Result<Option<RoomInfo>, SignalingError> {
        self.call(SignalRequest::CloseRoom(room_name.to_string())).await
    }

    pub async fn relay_to_peer(
        &self,
        target: &SessionId,
        message: NegotiationMessage,
    ) -> Result<DeliveryAck, SignalingError> {
        self.call(SignalRequest::SendMessage(DirectMessageRequest {
            target_session_id: target.clone(),
            message,
        }))
        .await
    }

    pub async fn broadcast(
        &self,
        room_name: &str,
        payload: serde_json::Value,
    ) -> Result<DeliveryAck, SignalingError> {
        self.call(SignalRequest::BroadcastMessage(BroadcastRequest {
            room_name: room_name.to_string(),
            message: payload,
        }))
        .await
    }
}
