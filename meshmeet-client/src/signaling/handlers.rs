use meshmeet_core::{MessageReceived, PeerJoined, PeerLeft};
use std::fmt;
use std::sync::Arc;

pub type PeerJoinedHandler = Arc<dyn Fn(PeerJoined) + Send + Sync>;
pub type PeerLeftHandler = Arc<dyn Fn(PeerLeft) + Send + Sync>;
pub type RoomClosedHandler = Arc<dyn Fn(String) + Send + Sync>;
pub type MessageReceivedHandler = Arc<dyn Fn(MessageReceived) + Send + Sync>;
pub type DisconnectedHandler = Arc<dyn Fn() + Send + Sync>;

/// One handler per event type. Installing a new set replaces the old one.
#[derive(Clone, Default)]
pub struct SignalingHandlers {
    pub on_peer_joined: Option<PeerJoinedHandler>,
    pub on_peer_left: Option<PeerLeftHandler>,
    pub on_room_closed: Option<RoomClosedHandler>,
    pub on_message_received: Option<MessageReceivedHandler>,
    /// Transport lost without a local `disconnect`.
    pub on_disconnected: Option<DisconnectedHandler>,
}

impl SignalingHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_peer_joined(mut self, f: impl Fn(PeerJoined) + Send + Sync + 'static) -> Self {
        self.on_peer_joined = Some(Arc::new(f));
        self
    }

    pub fn on_peer_left(mut self, f: impl Fn(PeerLeft) + Send + Sync + 'static) -> Self {
        self.on_peer_left = Some(Arc::new(f));
        self
    }

    pub fn on_room_closed(mut self, f: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.on_room_closed = Some(Arc::new(f));
        self
    }

    pub fn on_message_received(
        mut self,
        f: impl Fn(MessageReceived) + Send + Sync + 'static,
    ) -> Self {
        self.on_message_received = Some(Arc::new(f));
        self
    }

    pub fn on_disconnected(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_disconnected = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for SignalingHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalingHandlers")
            .field("on_peer_joined", &self.on_peer_joined.is_some())
            .field("on_peer_left", &self.on_peer_left.is_some())
            .field("on_room_closed", &self.on_room_closed.is_some())
            .field("on_message_received", &self.on_message_received.is_some())
            .field("on_disconnected", &self.on_disconnected.is_some())
            .finish()
    }
}
